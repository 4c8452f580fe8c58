use reqwest::Method;
use serde::Serialize;
use tracing::{info, warn};

use super::{RepositoryResponse, ScratchRepository, TemplateCopyReport, copy_template};
use crate::{
    error::{ApiError, BuildError},
    github::GitHubClient,
    progress::Progress,
};

const DESCRIPTION: &str = "Temporary repository created by ci-relay";

/// What to provision.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionRequest<'a> {
    /// The owner of the template repository.
    pub template_owner: &'a str,
    /// The name of the template repository.
    pub template_repo: &'a str,
    /// The login that will own the scratch repository.
    pub owner: &'a str,
    /// The name of the scratch repository.
    pub name: &'a str,
    /// Whether the scratch repository is private.
    pub private: bool,
}

/// How a scratch repository came to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioning {
    /// Generated from the template.
    Template,
    /// Created blank, then filled with a best-effort copy of the template.
    Fallback(TemplateCopyReport),
}

/// A provisioned scratch repository.
#[derive(Debug, Clone)]
pub struct Provisioned {
    /// The repository.
    pub repository: ScratchRepository,
    /// How it was provisioned.
    pub provisioning: Provisioning,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    owner: &'a str,
    name: &'a str,
    description: &'a str,
    private: bool,
    include_all_branches: bool,
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    auto_init: bool,
}

/// Creates the scratch repository, preferring template generation.
///
/// If generation fails for any reason, a blank auto-initialized repository is created under the authenticated user
/// and the template's files are copied into it one by one. The copy is best-effort: files that fail are skipped.
///
/// # Errors
///
/// Returns [`BuildError::Provisioning`] carrying both failures if neither path works.
pub async fn provision(
    client: &GitHubClient,
    request: &ProvisionRequest<'_>,
    progress: &Progress,
) -> Result<Provisioned, BuildError> {
    progress.report(&format!(
        "generating scratch repository {}/{} from template {}/{}…",
        request.owner, request.name, request.template_owner, request.template_repo
    ));

    let generate_error = match generate_from_template(client, request).await {
        Ok(repository) => {
            progress.report(&format!(
                "repository generated from template: {}",
                repository.html_url
            ));
            return Ok(Provisioned {
                repository,
                provisioning: Provisioning::Template,
            });
        }
        Err(err) => err,
    };

    warn!(
        "failed to generate {}/{} from template: {generate_error}",
        request.owner, request.name
    );
    progress.report("template generation failed, creating a blank scratch repository…");

    let repository = create_repository(client, request)
        .await
        .map_err(|fallback_error| BuildError::Provisioning {
            generate: generate_error.to_string(),
            fallback: fallback_error.to_string(),
        })?;
    info!("created {repository} at {}", repository.html_url);

    let report = copy_template(
        client,
        request.template_owner,
        request.template_repo,
        &repository,
    )
    .await;
    progress.report(&format!(
        "copied {} template files into {repository} ({} skipped)",
        report.copied.len(),
        report.skipped.len()
    ));

    Ok(Provisioned {
        repository,
        provisioning: Provisioning::Fallback(report),
    })
}

async fn generate_from_template(
    client: &GitHubClient,
    request: &ProvisionRequest<'_>,
) -> Result<ScratchRepository, ApiError> {
    let url = client.url([
        "repos",
        request.template_owner,
        request.template_repo,
        "generate",
    ]);
    let body = GenerateBody {
        owner: request.owner,
        name: request.name,
        description: DESCRIPTION,
        private: request.private,
        include_all_branches: false,
    };

    let response: RepositoryResponse = client
        .json(client.request(Method::POST, url).json(&body))
        .await?;
    Ok(ScratchRepository::from_response(
        client,
        request.owner,
        request.name,
        response,
    ))
}

async fn create_repository(
    client: &GitHubClient,
    request: &ProvisionRequest<'_>,
) -> Result<ScratchRepository, ApiError> {
    let url = client.url(["user", "repos"]);
    let body = CreateBody {
        name: request.name,
        description: DESCRIPTION,
        private: request.private,
        auto_init: true,
    };

    let response: RepositoryResponse = client
        .json(client.request(Method::POST, url).json(&body))
        .await?;
    Ok(ScratchRepository::from_response(
        client,
        request.owner,
        request.name,
        response,
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method, path},
    };

    use super::*;

    const REQUEST: ProvisionRequest<'static> = ProvisionRequest {
        template_owner: "templates",
        template_repo: "packager",
        owner: "octocat",
        name: "packager-temp-1",
        private: false,
    };

    #[tokio::test]
    async fn prefers_template_generation() {
        let server = MockServer::start().await;
        let client = GitHubClient::new(&server.uri(), "t").unwrap();

        Mock::given(method("POST"))
            .and(path("/repos/templates/packager/generate"))
            .and(body_partial_json(json!({
                "owner": "octocat",
                "name": "packager-temp-1",
                "private": false,
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "name": "packager-temp-1",
                "html_url": "https://github.com/octocat/packager-temp-1",
                "default_branch": "trunk",
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/repos"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let provisioned = provision(&client, &REQUEST, &Progress::default())
            .await
            .unwrap();
        assert_eq!(provisioned.provisioning, Provisioning::Template);
        assert_eq!(provisioned.repository.default_branch, "trunk");
        assert_eq!(
            provisioned.repository.html_url,
            "https://github.com/octocat/packager-temp-1"
        );
    }

    #[tokio::test]
    async fn both_failures_are_reported() {
        let server = MockServer::start().await;
        let client = GitHubClient::new(&server.uri(), "t").unwrap();

        Mock::given(method("POST"))
            .and(path("/repos/templates/packager/generate"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not a template"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/repos"))
            .and(body_partial_json(json!({ "auto_init": true })))
            .respond_with(ResponseTemplate::new(422).set_body_string("name already exists"))
            .expect(1)
            .mount(&server)
            .await;

        match provision(&client, &REQUEST, &Progress::default()).await {
            Err(BuildError::Provisioning { generate, fallback }) => {
                assert!(generate.contains("not a template"), "{generate}");
                assert!(fallback.contains("name already exists"), "{fallback}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
