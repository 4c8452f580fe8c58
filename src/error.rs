//! Errors raised by the build pipeline.
//!
//! [`ApiError`] describes a single failed call to the GitHub REST API. [`BuildError`] is the terminal failure of a
//! whole [`crate::RemoteBuildOrchestrator::run`] call.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

use crate::workflow::Conclusion;

/// A failed call to the GitHub REST API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The service answered with an unexpected status.
    #[error("{status}: {body}")]
    Status {
        /// The response status.
        status: StatusCode,
        /// The response body, as text.
        body: String,
    },

    /// The request could not be sent, or the response could not be read or decoded.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// The terminal failure of a build.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BuildError {
    /// A required input is missing or invalid. Raised before any network call.
    #[error("invalid build request: {0}")]
    Configuration(String),

    /// Neither template generation nor plain repository creation worked.
    #[error("failed to provision scratch repository (generate: {generate}; fallback: {fallback})")]
    Provisioning {
        /// Why template generation failed.
        generate: String,
        /// Why the fallback creation failed.
        fallback: String,
    },

    /// The artifact could not be written into the scratch repository.
    #[error("failed to upload artifact: {0}")]
    Upload(#[source] ApiError),

    /// The workflow dispatch was not accepted.
    #[error("failed to dispatch workflow: {0}")]
    Dispatch(#[source] ApiError),

    /// The workflow run finished without succeeding.
    #[error("workflow finished with conclusion: {conclusion}")]
    WorkflowFailed {
        /// The terminal conclusion of the run.
        conclusion: Conclusion,
    },

    /// The workflow run did not finish within the attempt ceiling.
    #[error("workflow did not complete successfully within {attempts} attempts")]
    WorkflowTimeout {
        /// The number of poll attempts made.
        attempts: u32,
    },

    /// The latest release could not be fetched.
    #[error("failed to fetch latest release: {0}")]
    NoRelease(#[source] ApiError),

    /// The latest release carries no assets.
    #[error("latest release {tag} has no assets")]
    NoAsset {
        /// The tag of the release.
        tag: String,
    },

    /// The release asset could not be downloaded or failed verification.
    #[error("failed to download release asset {name}: {reason}")]
    AssetDownload {
        /// The name of the asset.
        name: String,
        /// What went wrong.
        reason: String,
    },
}

impl BuildError {
    pub(crate) fn configuration<D>(message: D) -> Self
    where
        D: fmt::Display,
    {
        Self::Configuration(message.to_string())
    }
}
