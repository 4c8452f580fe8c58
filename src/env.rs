//! Defines the environment variables to use.
//!
//! Every variable is read once, on first access. Values set explicitly on a [`crate::BuildRequestBuilder`] take
//! precedence.

#![cfg(feature = "env")]

/// Parses an environment variable from [`String`] to something else, wrapping any error in [`anyhow::Error`].
#[macro_export]
macro_rules! parse_env {
    ($key:expr => |$var:ident| $expr:expr) => {
        std::env::var($key)
            .map_err(|e| anyhow::anyhow!(e))
            .and_then(|$var| $expr)
    };
    ($key:expr => |$var:ident| $expr:expr; anyhow) => {
        parse_env!($key => |$var| $expr.map_err(|e| anyhow::anyhow!(e)))
    };
}

pub use parse_env;

#[cfg(feature = "env_github_token")]
crate::static_lazy_lock! {
    /// The GitHub token, if `GITHUB_TOKEN` is set and not empty.
    pub GITHUB_TOKEN: Option<String> = std::env::var("GITHUB_TOKEN").ok().filter(|token| !token.is_empty());
}

#[cfg(feature = "env_api_url")]
crate::static_lazy_lock! {
    /// The base URL of the GitHub REST API, for GitHub Enterprise or test servers.
    pub GITHUB_API_URL: String = parse_env!("GITHUB_API_URL" => |s| {
        let s = s.trim().trim_end_matches('/').to_owned();
        if s.is_empty() {
            Err(anyhow::anyhow!("GITHUB_API_URL is empty"))
        } else {
            Ok(s)
        }
    })
    .unwrap_or_else(|_| crate::request::DEFAULT_API_URL.to_owned());
}

#[cfg(feature = "env_poll")]
crate::static_lazy_lock! {
    /// The interval between workflow run polls, in milliseconds.
    pub POLL_INTERVAL_MS: u64 = parse_env!("POLL_INTERVAL_MS" => |s| s.parse::<u64>(); anyhow)
        .unwrap_or(crate::request::DEFAULT_POLL_INTERVAL_MS);
}

#[cfg(feature = "env_poll")]
crate::static_lazy_lock! {
    /// The maximum number of workflow run polls.
    pub POLL_MAX_ATTEMPTS: u32 = parse_env!("POLL_MAX_ATTEMPTS" => |s| s.parse::<u32>(); anyhow)
        .unwrap_or(crate::request::DEFAULT_POLL_MAX_ATTEMPTS);
}
