use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{FALLBACK_BRANCH, RepositoryResponse, ScratchRepository, put_contents};
use crate::{error::ApiError, github::GitHubClient};

/// The outcome of copying a template into a blank repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateCopyReport {
    /// The template branch the files were read from.
    pub branch: String,
    /// The paths copied.
    pub copied: Vec<String>,
    /// The paths that failed and were skipped.
    pub skipped: Vec<String>,
}

/// Represents a git tree from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Tree {
    pub sha: String,
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// Represents an entry of a git tree from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

/// Represents a git blob from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Blob {
    pub content: String,
    pub encoding: String,
}

impl Blob {
    /// The blob content as a single-line base64 string, as the contents endpoint expects it.
    pub fn to_base64(&self) -> String {
        match self.encoding.as_str() {
            "base64" => self.content.split_whitespace().collect(),
            _ => STANDARD.encode(self.content.as_bytes()),
        }
    }
}

/// Copies every file of a template repository into `target`, one commit per file.
///
/// This never fails: an unreadable template tree skips the whole copy, and each file that cannot be read or written
/// is logged and recorded in [`TemplateCopyReport::skipped`].
pub async fn copy_template(
    client: &GitHubClient,
    template_owner: &str,
    template_repo: &str,
    target: &ScratchRepository,
) -> TemplateCopyReport {
    let branch = resolve_default_branch(client, template_owner, template_repo).await;
    let mut report = TemplateCopyReport {
        branch,
        ..Default::default()
    };

    let tree = match fetch_tree(client, template_owner, template_repo, &report.branch).await {
        Ok(tree) => tree,
        Err(err) => {
            warn!(
                "failed to fetch tree of {template_owner}/{template_repo}@{}, skipping template copy: {err}",
                report.branch
            );
            return report;
        }
    };
    if tree.truncated {
        warn!("tree of {template_owner}/{template_repo} is truncated, some files will be missing");
    }

    let blobs = tree.tree.into_iter().filter(|entry| entry.kind == "blob");
    for entry in blobs {
        match copy_blob(client, template_owner, template_repo, target, &entry).await {
            Ok(()) => {
                debug!("copied template file {}", entry.path);
                report.copied.push(entry.path);
            }
            Err(err) => {
                warn!("failed to copy template file {}: {err}", entry.path);
                report.skipped.push(entry.path);
            }
        }
    }

    info!(
        "copied {} files from {template_owner}/{template_repo} into {target}",
        report.copied.len()
    );
    report
}

async fn resolve_default_branch(client: &GitHubClient, owner: &str, repo: &str) -> String {
    let url = client.url(["repos", owner, repo]);
    match client
        .json::<RepositoryResponse>(client.request(Method::GET, url))
        .await
    {
        Ok(RepositoryResponse {
            default_branch: Some(branch),
            ..
        }) => branch,
        Ok(_) => FALLBACK_BRANCH.to_owned(),
        Err(err) => {
            warn!("failed to look up {owner}/{repo}, assuming branch {FALLBACK_BRANCH}: {err}");
            FALLBACK_BRANCH.to_owned()
        }
    }
}

async fn fetch_tree(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    branch: &str,
) -> Result<Tree, ApiError> {
    let mut url = client.url(["repos", owner, repo, "git", "trees", branch]);
    url.query_pairs_mut().append_pair("recursive", "1");
    client.json(client.request(Method::GET, url)).await
}

async fn copy_blob(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    target: &ScratchRepository,
    entry: &TreeEntry,
) -> Result<(), ApiError> {
    let url = client.url(["repos", owner, repo, "git", "blobs", &entry.sha]);
    let blob: Blob = client.json(client.request(Method::GET, url)).await?;

    put_contents(
        client,
        &target.owner,
        &target.name,
        &entry.path,
        &format!("Add template file {}", entry.path),
        &blob.to_base64(),
    )
    .await
}
