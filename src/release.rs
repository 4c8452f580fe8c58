//! Releases from GitHub REST API and their assets.

use std::fmt::Display;

use futures::TryStreamExt as _;
use reqwest::{Method, Url};
use serde::Deserialize;
use sha2::Digest as _;
use tokio_util::bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

use crate::{
    error::{ApiError, BuildError},
    github::GitHubClient,
    repository::ScratchRepository,
};

/// Represents a release from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    pub name: Option<String>,
    pub html_url: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// Represents a release asset from GitHub REST API.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    /// The API URL of the asset, which serves the bytes to authenticated requests.
    pub url: String,
    /// The public download URL of the asset.
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
    pub content_type: Option<String>,
    /// The digest of the asset, as `sha256:<hex>`.
    pub digest: Option<String>,
}

impl Display for ReleaseAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} at {})", self.name, self.id, self.browser_download_url)
    }
}

impl Release {
    /// The first asset in the order GitHub lists them.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NoAsset`] if the release has no assets.
    pub fn first_asset(&self) -> Result<&ReleaseAsset, BuildError> {
        self.assets.first().ok_or_else(|| BuildError::NoAsset {
            tag: self.tag_name.clone(),
        })
    }
}

/// Fetches the latest release of the scratch repository.
///
/// # Errors
///
/// Returns [`BuildError::NoRelease`] if there is no release or it cannot be fetched.
pub async fn latest_release(
    client: &GitHubClient,
    repository: &ScratchRepository,
) -> Result<Release, BuildError> {
    let url = client.url([
        "repos",
        &repository.owner,
        &repository.name,
        "releases",
        "latest",
    ]);
    debug!("fetching latest release of {repository}…");

    let release: Release = client
        .json(client.request(Method::GET, url))
        .await
        .map_err(BuildError::NoRelease)?;
    info!(
        "fetched release {} of {repository} with {} assets",
        release.tag_name,
        release.assets.len()
    );
    Ok(release)
}

/// Downloads the bytes of a release asset with the client's token, so private repositories work too.
///
/// When the asset carries a SHA-256 digest, the downloaded bytes are checked against it.
///
/// # Errors
///
/// Returns [`BuildError::AssetDownload`] if the download fails or the digest does not match.
pub async fn download_asset(
    client: &GitHubClient,
    asset: &ReleaseAsset,
) -> Result<Bytes, BuildError> {
    let failed = |reason: String| BuildError::AssetDownload {
        name: asset.name.clone(),
        reason,
    };

    let url = asset
        .url
        .parse::<Url>()
        .map_err(|err| failed(format!("invalid asset url {}: {err}", asset.url)))?;
    debug!("requesting download from {}…", asset.url);

    let response = client
        .send(client.request_accepting(Method::GET, url, "application/octet-stream"))
        .await
        .map_err(|err| failed(err.to_string()))?;

    let mut hasher = sha2::Sha256::new();
    let bytes = response
        .bytes_stream()
        .map_err(ApiError::from)
        .try_fold(BytesMut::new(), |mut buf, chunk| {
            hasher.update(&chunk);
            buf.extend_from_slice(&chunk);
            futures::future::ready(Ok(buf))
        })
        .await
        .map_err(|err| failed(err.to_string()))?
        .freeze();

    match asset.digest.as_deref().and_then(|digest| digest.strip_prefix("sha256:")) {
        Some(expected) => {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(failed(format!(
                    "broken asset: expected sha256 {expected}, got {actual}"
                )));
            }
        }
        None => warn!("digest not provided for {asset}"),
    }

    info!("downloaded {asset} ({} bytes)", bytes.len());
    Ok(bytes)
}
