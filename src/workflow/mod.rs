//! GitHub Actions workflows: dispatching and watching runs.

mod run;

pub use run::*;

use std::fmt::Display;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{ApiError, BuildError},
    github::{GitHubClient, status_error},
    repository::ScratchRepository,
};

/// The lifecycle status of a workflow run.
#[non_exhaustive]
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Requested,
    Queued,
    Pending,
    Waiting,
    InProgress,
    Completed,
    /// A status this crate does not know about.
    #[serde(other)]
    Unknown,
}

/// The terminal conclusion of a workflow run.
#[non_exhaustive]
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    TimedOut,
    ActionRequired,
    Neutral,
    Skipped,
    Stale,
    StartupFailure,
    /// A conclusion this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Requested => "requested",
            Self::Queued => "queued",
            Self::Pending => "pending",
            Self::Waiting => "waiting",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        })
    }
}

impl Display for Conclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
            Self::ActionRequired => "action_required",
            Self::Neutral => "neutral",
            Self::Skipped => "skipped",
            Self::Stale => "stale",
            Self::StartupFailure => "startup_failure",
            Self::Unknown => "unknown",
        })
    }
}

/// Represents a GitHub Actions workflow run from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: Option<String>,
    pub status: Option<RunStatus>,
    /// [`None`] while the run is pending.
    pub conclusion: Option<Conclusion>,
    pub html_url: Option<String>,
}

impl Display for WorkflowRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.id),
            None => write!(f, "run {}", self.id),
        }
    }
}

/// Represents a page of workflow runs from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowRuns {
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Serialize)]
struct DispatchBody<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
}

/// The statuses GitHub uses to accept a dispatch for asynchronous execution.
const ACCEPTED: [StatusCode; 3] = [StatusCode::NO_CONTENT, StatusCode::CREATED, StatusCode::ACCEPTED];

/// Dispatches a workflow on a ref of the scratch repository.
///
/// # Errors
///
/// Returns [`BuildError::Dispatch`] unless GitHub answers 201, 202 or 204.
pub async fn dispatch_workflow(
    client: &GitHubClient,
    repository: &ScratchRepository,
    workflow: &str,
    git_ref: &str,
) -> Result<(), BuildError> {
    let url = client.url([
        "repos",
        &repository.owner,
        &repository.name,
        "actions",
        "workflows",
        workflow,
        "dispatches",
    ]);
    debug!("dispatching {workflow} on {repository}@{git_ref}…");

    let response = client
        .request(Method::POST, url)
        .json(&DispatchBody { git_ref })
        .send()
        .await
        .map_err(|err| BuildError::Dispatch(ApiError::from(err)))?;

    if ACCEPTED.contains(&response.status()) {
        info!("dispatched {workflow} on {repository}@{git_ref}");
        Ok(())
    } else {
        Err(BuildError::Dispatch(status_error(response).await))
    }
}
