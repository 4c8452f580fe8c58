//! Runs a whole build: provision, upload, dispatch, poll, resolve the release, clean up.

use std::sync::Arc;

use tokio_util::bytes::Bytes;
use tracing::{error, info, warn};

use crate::{
    error::BuildError,
    github::GitHubClient,
    progress::{Progress, ProgressSink},
    release::{download_asset, latest_release},
    repository::{
        ProvisionRequest, Provisioning, ScratchRepository, delete_repository, provision,
        scratch_repository_name, upload_artifact,
    },
    request::{AssetMode, BuildRequest},
    workflow::{WorkflowRun, dispatch_workflow, wait_for_run},
};

/// The release asset handed back by a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPayload {
    /// The public download URL.
    Link(String),
    /// The downloaded bytes.
    Bytes(Bytes),
}

/// What happened to the scratch repository at the end of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    /// Deletion was not requested; the repository is still there.
    Skipped,
    /// The repository was deleted.
    Deleted,
    /// Deletion was requested but failed; the repository may still be there.
    Failed(String),
}

/// The result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// The scratch repository.
    pub repository: ScratchRepository,
    /// How the scratch repository was provisioned.
    pub provisioning: Provisioning,
    /// The web URL of the scratch repository.
    pub repository_url: String,
    /// The web URL of the release.
    pub release_url: String,
    /// The name of the selected asset.
    pub asset_name: String,
    /// The asset, as a link or as bytes depending on [`AssetMode`].
    pub asset: AssetPayload,
    /// The successful workflow run.
    pub run: WorkflowRun,
    /// What happened to the scratch repository.
    pub cleanup: Cleanup,
}

/// Builds an artifact through GitHub Actions in a disposable repository.
///
/// Stages run strictly in order; every failure except cleanup aborts the build, leaving whatever was already created
/// on GitHub in place.
#[derive(Debug, Clone, Default)]
pub struct RemoteBuildOrchestrator {
    progress: Progress,
}

impl RemoteBuildOrchestrator {
    /// Creates an orchestrator without a progress sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends progress messages to `sink`.
    pub fn with_progress<S>(mut self, sink: S) -> Self
    where
        S: ProgressSink + 'static,
    {
        self.progress = Progress::new(Some(Arc::new(sink)));
        self
    }

    /// Sends progress messages to a shared `sink`.
    pub fn with_shared_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Progress::new(Some(sink));
        self
    }

    /// Runs a build.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] before any network call if the request is incomplete, otherwise the
    /// error of the first stage that fails. Cleanup failures are reported in [`BuildOutcome::cleanup`] instead.
    pub async fn run(&self, request: &BuildRequest) -> Result<BuildOutcome, BuildError> {
        request.validate()?;
        let client = GitHubClient::new(&request.api_base, &request.token)?;
        let progress = &self.progress;

        let name = scratch_repository_name(&request.repository_prefix);
        let provisioned = provision(
            &client,
            &ProvisionRequest {
                template_owner: &request.template_owner,
                template_repo: &request.template_repo,
                owner: &request.owner,
                name: &name,
                private: request.private,
            },
            progress,
        )
        .await?;
        let repository = provisioned.repository;

        progress.report(&format!(
            "uploading {} to {repository}…",
            request.artifact_name
        ));
        upload_artifact(&client, &repository, &request.artifact_name, &request.artifact).await?;
        progress.report("artifact uploaded");

        let git_ref = request
            .dispatch_ref
            .as_deref()
            .unwrap_or(&repository.default_branch);
        dispatch_workflow(&client, &repository, &request.workflow, git_ref).await?;
        progress.report("workflow dispatched, waiting for the run to finish…");

        let run = wait_for_run(&client, &repository, &request.poll, progress).await?;
        progress.report("workflow succeeded, resolving release asset…");

        let release = latest_release(&client, &repository).await?;
        let asset = release.first_asset()?;
        progress.report(&format!("found release asset {}", asset.name));

        let payload = match request.asset_mode {
            AssetMode::Link => {
                if request.private && request.auto_delete {
                    warn!("the link to {asset} will not work once {repository} is deleted");
                }
                AssetPayload::Link(asset.browser_download_url.clone())
            }
            AssetMode::Download => {
                progress.report(&format!("downloading {}…", asset.name));
                AssetPayload::Bytes(download_asset(&client, asset).await?)
            }
        };

        let cleanup = if request.auto_delete {
            delete_scratch_repository(&client, &repository, progress).await
        } else {
            Cleanup::Skipped
        };

        let release_url = release
            .html_url
            .clone()
            .unwrap_or_else(|| format!("{}/releases/latest", repository.html_url));
        info!("build in {repository} finished with asset {}", asset.name);

        Ok(BuildOutcome {
            repository_url: repository.html_url.clone(),
            release_url,
            asset_name: asset.name.clone(),
            asset: payload,
            run,
            cleanup,
            provisioning: provisioned.provisioning,
            repository,
        })
    }
}

async fn delete_scratch_repository(
    client: &GitHubClient,
    repository: &ScratchRepository,
    progress: &Progress,
) -> Cleanup {
    progress.report(&format!("deleting scratch repository {repository}…"));
    match delete_repository(client, &repository.owner, &repository.name).await {
        Ok(()) => {
            progress.report("scratch repository deleted");
            Cleanup::Deleted
        }
        Err(err) => {
            error!("failed to delete {repository}: {err}");
            progress.report("failed to delete scratch repository");
            Cleanup::Failed(err.to_string())
        }
    }
}
