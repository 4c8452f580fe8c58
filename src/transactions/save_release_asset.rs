use std::{
    fmt::Debug,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

/// Saves downloaded asset bytes into a directory, creating the directory if needed.
///
/// The asset name is sanitized, so names coming from a release cannot escape the directory. An existing file with the
/// same name is overwritten.
///
/// # Errors
///
/// Returns an [`std::io::Error`] if the directory cannot be created or the file cannot be written.
pub async fn save_release_asset<P>(name: &str, bytes: &[u8], dir: P) -> std::io::Result<PathBuf>
where
    P: AsRef<Path> + Send + Sync + Debug,
{
    let file_name = match sanitize_filename::sanitize(name) {
        sanitized if sanitized.is_empty() => String::from("asset"),
        sanitized => sanitized,
    };
    let path = dir.as_ref().join(file_name);
    debug!("saving {name} to {path:?}…");

    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(&path, bytes).await?;

    info!("saved {name} ({} bytes) to {path:?}", bytes.len());
    Ok(path)
}
