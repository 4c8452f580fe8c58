//! Scratch repositories: naming, provisioning, file writes and deletion.

mod provision;
mod template;

pub use provision::*;
pub use template::*;

use std::{
    fmt::Display,
    sync::atomic::{AtomicU64, Ordering},
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{ApiError, BuildError},
    github::GitHubClient,
};

/// The branch assumed when a repository does not report one.
pub const FALLBACK_BRANCH: &str = "main";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A repository created for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchRepository {
    /// The login owning the repository.
    pub owner: String,
    /// The repository name.
    pub name: String,
    /// The web URL of the repository.
    pub html_url: String,
    /// The default branch of the repository.
    pub default_branch: String,
}

impl ScratchRepository {
    /// Missing fields fall back to the requested name, the web URL derived from the client and [`FALLBACK_BRANCH`].
    pub(crate) fn from_response(
        client: &GitHubClient,
        owner: &str,
        name: &str,
        response: RepositoryResponse,
    ) -> Self {
        let name = response.name.unwrap_or_else(|| name.to_owned());
        Self {
            owner: owner.to_owned(),
            html_url: response
                .html_url
                .unwrap_or_else(|| client.web_url([owner, name.as_str()]).to_string()),
            name,
            default_branch: response
                .default_branch
                .unwrap_or_else(|| FALLBACK_BRANCH.to_owned()),
        }
    }
}

impl Display for ScratchRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Represents a repository from GitHub REST API. Only the fields in use are kept.
#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryResponse {
    pub name: Option<String>,
    pub html_url: Option<String>,
    pub default_branch: Option<String>,
}

/// Generates a scratch repository name that is unique per call.
///
/// The name embeds a UTC timestamp, a random part and a process-wide sequence number, so two calls in the same
/// process never collide and concurrent processes are very unlikely to.
pub fn scratch_repository_name(prefix: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let random = Uuid::new_v4().simple().to_string();
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{timestamp}-{}-{sequence}", &random[..8])
}

#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: &'a str,
}

/// Writes a file into a repository in a single commit via the contents endpoint.
///
/// `content` must already be base64-encoded. Nested paths are split into percent-encoded segments.
///
/// # Errors
///
/// Returns an [`ApiError`] if the write is rejected.
pub async fn put_contents(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    path: &str,
    message: &str,
    content: &str,
) -> Result<(), ApiError> {
    let url = client.url(
        ["repos", owner, repo, "contents"]
            .into_iter()
            .chain(path.split('/')),
    );
    debug!("writing {path} to {owner}/{repo}…");

    client
        .send(
            client
                .request(Method::PUT, url)
                .json(&PutContents { message, content }),
        )
        .await?;
    Ok(())
}

/// Uploads the artifact into the scratch repository.
///
/// The whole payload is base64-encoded at once. The upload is not retried.
///
/// # Errors
///
/// Returns [`BuildError::Upload`] if the contents endpoint rejects the write.
pub async fn upload_artifact(
    client: &GitHubClient,
    repository: &ScratchRepository,
    name: &str,
    bytes: &[u8],
) -> Result<(), BuildError> {
    info!("uploading {name} ({} bytes) to {repository}…", bytes.len());
    let content = STANDARD.encode(bytes);

    put_contents(
        client,
        &repository.owner,
        &repository.name,
        name,
        &format!("Upload {name}"),
        &content,
    )
    .await
    .map_err(BuildError::Upload)?;

    info!("uploaded {name} to {repository}");
    Ok(())
}

/// Deletes a repository.
///
/// # Errors
///
/// Returns an [`ApiError`] if the deletion is rejected.
pub async fn delete_repository(client: &GitHubClient, owner: &str, repo: &str) -> Result<(), ApiError> {
    debug!("deleting {owner}/{repo}…");
    let url = client.url(["repos", owner, repo]);
    client.send(client.request(Method::DELETE, url)).await?;
    info!("deleted {owner}/{repo}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    use super::*;

    fn scratch(server: &MockServer) -> (GitHubClient, ScratchRepository) {
        let client = GitHubClient::new(&server.uri(), "ghp_test").unwrap();
        let repository = ScratchRepository {
            owner: String::from("octocat"),
            name: String::from("scratch"),
            html_url: String::from("https://github.com/octocat/scratch"),
            default_branch: String::from("main"),
        };
        (client, repository)
    }

    #[test]
    fn names_are_unique_in_a_tight_loop() {
        let names: HashSet<String> = (0..1_000)
            .map(|_| scratch_repository_name("packager-temp"))
            .collect();
        assert_eq!(names.len(), 1_000);
        assert!(names.iter().all(|name| name.starts_with("packager-temp-")));
    }

    #[test]
    fn missing_fields_fall_back() {
        let missing = || RepositoryResponse {
            name: None,
            html_url: None,
            default_branch: None,
        };

        let client = GitHubClient::new("https://api.github.com", "t").unwrap();
        let repository = ScratchRepository::from_response(&client, "octocat", "scratch", missing());
        assert_eq!(repository.html_url, "https://github.com/octocat/scratch");
        assert_eq!(repository.default_branch, FALLBACK_BRANCH);
        assert_eq!(repository.to_string(), "octocat/scratch");

        let client = GitHubClient::new("https://ghe.example.com/api/v3", "t").unwrap();
        let repository = ScratchRepository::from_response(&client, "octocat", "scratch", missing());
        assert_eq!(repository.html_url, "https://ghe.example.com/octocat/scratch");
    }

    #[tokio::test]
    async fn uploads_base64_content() {
        let server = MockServer::start().await;
        let (client, repository) = scratch(&server);

        Mock::given(method("PUT"))
            .and(path("/repos/octocat/scratch/contents/game.sb3"))
            .and(header("authorization", "Bearer ghp_test"))
            .and(body_partial_json(json!({
                "message": "Upload game.sb3",
                "content": "AAEC/w==",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        upload_artifact(&client, &repository, "game.sb3", &[0, 1, 2, 255])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_upload_carries_status_and_body() {
        let server = MockServer::start().await;
        let (client, repository) = scratch(&server);

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409).set_body_string("conflict"))
            .mount(&server)
            .await;

        let err = upload_artifact(&client, &repository, "game.sb3", b"payload")
            .await
            .unwrap_err();
        match err {
            BuildError::Upload(ApiError::Status { status, body }) => {
                assert_eq!(status.as_u16(), 409);
                assert_eq!(body, "conflict");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn nested_paths_keep_their_slashes() {
        let server = MockServer::start().await;
        let (client, _) = scratch(&server);

        Mock::given(method("PUT"))
            .and(path("/repos/octocat/scratch/contents/.github/workflows/main.yml"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        put_contents(
            &client,
            "octocat",
            "scratch",
            ".github/workflows/main.yml",
            "Add template file",
            "bmFtZTogYnVpbGQ=",
        )
        .await
        .unwrap();
    }
}
