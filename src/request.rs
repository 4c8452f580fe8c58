//! The inputs of a build.

use std::{fmt, time::Duration};

use tokio_util::bytes::Bytes;

use crate::{error::BuildError, framework::PollSchedule};

/// The public GitHub REST API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// The default poll interval, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
/// The default poll attempt ceiling.
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;
/// The default delay before the first poll, in milliseconds.
pub const DEFAULT_FIRST_POLL_DELAY_MS: u64 = 2_000;

/// The default template owner.
pub const DEFAULT_TEMPLATE_OWNER: &str = "Deep-sea-lab";
/// The default template repository.
pub const DEFAULT_TEMPLATE_REPO: &str = "02packager-template";
/// The default workflow file.
pub const DEFAULT_WORKFLOW: &str = "main.yml";
/// The default prefix of scratch repository names.
pub const DEFAULT_REPOSITORY_PREFIX: &str = "packager-temp";

/// How the release asset is handed back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssetMode {
    /// Return the public download URL. The scratch repository has to stay public and alive for the URL to work.
    #[default]
    Link,
    /// Download the asset bytes with the build token, which also works for private repositories.
    Download,
}

/// Everything a build needs. Immutable for the duration of the build.
#[derive(Clone)]
pub struct BuildRequest {
    /// The binary payload to push into the scratch repository.
    pub artifact: Bytes,
    /// The path of the payload inside the scratch repository.
    pub artifact_name: String,
    /// The login owning the scratch repository.
    pub owner: String,
    /// The token used for every call.
    pub token: String,
    /// The owner of the template repository.
    pub template_owner: String,
    /// The name of the template repository.
    pub template_repo: String,
    /// The workflow file to dispatch, e.g. `main.yml`.
    pub workflow: String,
    /// The ref to dispatch the workflow on. Defaults to the scratch repository's default branch.
    pub dispatch_ref: Option<String>,
    /// Whether to delete the scratch repository once the asset is resolved.
    pub auto_delete: bool,
    /// Whether the scratch repository is private.
    pub private: bool,
    /// The prefix of the generated scratch repository name.
    pub repository_prefix: String,
    /// How the workflow run is polled.
    pub poll: PollSchedule,
    /// How the release asset is handed back.
    pub asset_mode: AssetMode,
    /// The base URL of the GitHub REST API.
    pub api_base: String,
}

impl BuildRequest {
    /// Creates a [`BuildRequestBuilder`] with defaults.
    pub fn builder() -> BuildRequestBuilder {
        BuildRequestBuilder::default()
    }

    /// Checks that every required input is present.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] naming the first missing or invalid input.
    pub fn validate(&self) -> Result<(), BuildError> {
        let required = [
            ("owner", &self.owner),
            ("token", &self.token),
            ("artifact name", &self.artifact_name),
            ("template owner", &self.template_owner),
            ("template repository", &self.template_repo),
            ("workflow", &self.workflow),
            ("repository prefix", &self.repository_prefix),
            ("api base", &self.api_base),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(BuildError::configuration(format_args!("missing {field}")));
        }

        if self.artifact.is_empty() {
            return Err(BuildError::configuration("missing artifact payload"));
        }
        if self
            .artifact_name
            .split('/')
            .any(|segment| matches!(segment, "" | "." | ".."))
        {
            return Err(BuildError::configuration(format_args!(
                "artifact name {} is not a file path",
                self.artifact_name
            )));
        }
        if self.poll.max_attempts == 0 {
            return Err(BuildError::configuration(
                "poll attempt ceiling must be at least 1",
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for BuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildRequest")
            .field("artifact", &format_args!("{} bytes", self.artifact.len()))
            .field("artifact_name", &self.artifact_name)
            .field("owner", &self.owner)
            .field("token", &"<redacted>")
            .field("template_owner", &self.template_owner)
            .field("template_repo", &self.template_repo)
            .field("workflow", &self.workflow)
            .field("dispatch_ref", &self.dispatch_ref)
            .field("auto_delete", &self.auto_delete)
            .field("private", &self.private)
            .field("repository_prefix", &self.repository_prefix)
            .field("poll", &self.poll)
            .field("asset_mode", &self.asset_mode)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Builds a [`BuildRequest`].
///
/// Unset values fall back to the environment (see [`crate::env`]) and then to the crate defaults.
#[derive(Debug, Default)]
pub struct BuildRequestBuilder {
    artifact: Option<Bytes>,
    artifact_name: Option<String>,
    owner: Option<String>,
    token: Option<String>,
    template_owner: Option<String>,
    template_repo: Option<String>,
    workflow: Option<String>,
    dispatch_ref: Option<String>,
    auto_delete: bool,
    private: bool,
    repository_prefix: Option<String>,
    first_poll_delay: Option<Duration>,
    poll_interval: Option<Duration>,
    poll_max_attempts: Option<u32>,
    asset_mode: AssetMode,
    api_base: Option<String>,
}

impl BuildRequestBuilder {
    /// Sets the payload and its path inside the scratch repository.
    pub fn artifact<B, S>(mut self, name: S, bytes: B) -> Self
    where
        B: Into<Bytes>,
        S: Into<String>,
    {
        self.artifact_name = Some(name.into());
        self.artifact = Some(bytes.into());
        self
    }

    /// Sets the login owning the scratch repository.
    pub fn owner<S: Into<String>>(mut self, owner: S) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets the token.
    pub fn token<S: Into<String>>(mut self, token: S) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the template repository.
    pub fn template<O, R>(mut self, owner: O, repo: R) -> Self
    where
        O: Into<String>,
        R: Into<String>,
    {
        self.template_owner = Some(owner.into());
        self.template_repo = Some(repo.into());
        self
    }

    /// Sets the workflow file to dispatch.
    pub fn workflow<S: Into<String>>(mut self, workflow: S) -> Self {
        self.workflow = Some(workflow.into());
        self
    }

    /// Sets the ref to dispatch the workflow on.
    pub fn dispatch_ref<S: Into<String>>(mut self, git_ref: S) -> Self {
        self.dispatch_ref = Some(git_ref.into());
        self
    }

    /// Sets whether to delete the scratch repository at the end.
    pub fn auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    /// Sets whether the scratch repository is private.
    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Sets the prefix of the scratch repository name.
    pub fn repository_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.repository_prefix = Some(prefix.into());
        self
    }

    /// Sets the delay before the first poll.
    pub fn first_poll_delay(mut self, delay: Duration) -> Self {
        self.first_poll_delay = Some(delay);
        self
    }

    /// Sets the delay between later polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the poll attempt ceiling.
    pub fn poll_max_attempts(mut self, max_attempts: u32) -> Self {
        self.poll_max_attempts = Some(max_attempts);
        self
    }

    /// Sets how the release asset is handed back.
    pub fn asset_mode(mut self, mode: AssetMode) -> Self {
        self.asset_mode = mode;
        self
    }

    /// Sets the base URL of the GitHub REST API.
    pub fn api_base<S: Into<String>>(mut self, api_base: S) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Finishes the request.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] if a required input is missing.
    ///
    /// See: [`BuildRequest::validate`]
    pub fn build(self) -> Result<BuildRequest, BuildError> {
        let request = BuildRequest {
            artifact: self.artifact.unwrap_or_default(),
            artifact_name: self.artifact_name.unwrap_or_default(),
            owner: self.owner.unwrap_or_default(),
            token: self.token.or_else(default_token).unwrap_or_default(),
            template_owner: self
                .template_owner
                .unwrap_or_else(|| DEFAULT_TEMPLATE_OWNER.to_owned()),
            template_repo: self
                .template_repo
                .unwrap_or_else(|| DEFAULT_TEMPLATE_REPO.to_owned()),
            workflow: self.workflow.unwrap_or_else(|| DEFAULT_WORKFLOW.to_owned()),
            dispatch_ref: self.dispatch_ref,
            auto_delete: self.auto_delete,
            private: self.private,
            repository_prefix: self
                .repository_prefix
                .unwrap_or_else(|| DEFAULT_REPOSITORY_PREFIX.to_owned()),
            poll: PollSchedule {
                first_delay: self
                    .first_poll_delay
                    .unwrap_or(Duration::from_millis(DEFAULT_FIRST_POLL_DELAY_MS)),
                interval: self.poll_interval.unwrap_or_else(default_poll_interval),
                max_attempts: self
                    .poll_max_attempts
                    .unwrap_or_else(default_poll_max_attempts),
            },
            asset_mode: self.asset_mode,
            api_base: self
                .api_base
                .map(|base| base.trim_end_matches('/').to_owned())
                .unwrap_or_else(default_api_base),
        };

        request.validate()?;
        Ok(request)
    }
}

#[cfg(feature = "env_github_token")]
fn default_token() -> Option<String> {
    crate::env::GITHUB_TOKEN.clone()
}

#[cfg(not(feature = "env_github_token"))]
fn default_token() -> Option<String> {
    None
}

#[cfg(feature = "env_api_url")]
fn default_api_base() -> String {
    crate::env::GITHUB_API_URL.clone()
}

#[cfg(not(feature = "env_api_url"))]
fn default_api_base() -> String {
    DEFAULT_API_URL.to_owned()
}

#[cfg(feature = "env_poll")]
fn default_poll_interval() -> Duration {
    Duration::from_millis(*crate::env::POLL_INTERVAL_MS)
}

#[cfg(not(feature = "env_poll"))]
fn default_poll_interval() -> Duration {
    Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
}

#[cfg(feature = "env_poll")]
fn default_poll_max_attempts() -> u32 {
    *crate::env::POLL_MAX_ATTEMPTS
}

#[cfg(not(feature = "env_poll"))]
fn default_poll_max_attempts() -> u32 {
    DEFAULT_POLL_MAX_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> BuildRequestBuilder {
        BuildRequest::builder()
            .artifact("game.sb3", vec![1_u8, 2, 3])
            .owner("octocat")
            .token("ghp_test")
            .api_base("http://127.0.0.1:9/")
    }

    fn assert_configuration_error(result: Result<BuildRequest, BuildError>, needle: &str) {
        match result {
            Err(BuildError::Configuration(message)) => assert!(
                message.contains(needle),
                "expected {needle:?} in {message:?}"
            ),
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn fills_defaults() {
        let request = complete().build().unwrap();
        assert_eq!(request.template_owner, DEFAULT_TEMPLATE_OWNER);
        assert_eq!(request.template_repo, DEFAULT_TEMPLATE_REPO);
        assert_eq!(request.workflow, DEFAULT_WORKFLOW);
        assert_eq!(request.repository_prefix, DEFAULT_REPOSITORY_PREFIX);
        assert_eq!(
            request.poll.first_delay,
            Duration::from_millis(DEFAULT_FIRST_POLL_DELAY_MS)
        );
        assert!(!request.auto_delete);
        assert!(!request.private);
        assert_eq!(request.asset_mode, AssetMode::Link);
        assert_eq!(request.api_base, "http://127.0.0.1:9");
    }

    #[test]
    fn missing_owner_is_rejected() {
        let mut request = complete().build().unwrap();
        request.owner = String::new();
        match request.validate() {
            Err(BuildError::Configuration(message)) => assert_eq!(message, "missing owner"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_token_is_rejected() {
        let mut request = complete().build().unwrap();
        request.token = String::from("  ");
        assert!(matches!(
            request.validate(),
            Err(BuildError::Configuration(message)) if message == "missing token"
        ));
    }

    #[test]
    fn missing_payload_is_rejected() {
        assert_configuration_error(
            complete().artifact("game.sb3", Vec::<u8>::new()).build(),
            "payload",
        );
    }

    #[test]
    fn missing_artifact_name_is_rejected() {
        assert_configuration_error(
            complete().artifact("", vec![1_u8]).build(),
            "artifact name",
        );
    }

    #[test]
    fn artifact_name_needs_plain_segments() {
        for name in ["/game.sb3", "game.sb3/", "games//game.sb3", "games/../game.sb3"] {
            assert_configuration_error(
                complete().artifact(name, vec![1_u8]).build(),
                "is not a file path",
            );
        }
        assert!(complete().artifact("games/game.sb3", vec![1_u8]).build().is_ok());
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert_configuration_error(complete().poll_max_attempts(0).build(), "attempt");
    }

    #[test]
    fn debug_hides_token() {
        let request = complete().build().unwrap();
        let debug = format!("{request:?}");
        assert!(!debug.contains("ghp_test"));
        assert!(debug.contains("3 bytes"));
    }
}
