//! A thin client for the GitHub REST API.

use std::fmt;

use reqwest::{Method, RequestBuilder, Response, Url, header};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ApiError, BuildError};

/// The API version every request pins.
pub const API_VERSION: &str = "2022-11-28";

const USER_AGENT: &str = concat!("ci-relay/", env!("CARGO_PKG_VERSION"));

const PUBLIC_API_HOST: &str = "api.github.com";
const PUBLIC_WEB_HOST: &str = "github.com";
/// The path GitHub Enterprise Server serves its REST API under.
const ENTERPRISE_API_PATH: &str = "/api/v3";

/// An authenticated GitHub REST API client bound to one base URL.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl GitHubClient {
    /// Creates a client for the API at `base`, authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] if `base` is not an absolute HTTP(S) URL.
    pub fn new(base: &str, token: &str) -> Result<Self, BuildError> {
        let base = Url::parse(base.trim_end_matches('/'))
            .map_err(|err| BuildError::configuration(format_args!("invalid api base {base}: {err}")))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(BuildError::configuration(format_args!(
                "invalid api base {base}: not an http(s) url"
            )));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            token: token.to_owned(),
        })
    }

    /// Builds the URL of an endpoint, percent-encoding every segment.
    pub fn url<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Builds the web URL of a page on the GitHub instance serving this API.
    ///
    /// `api.github.com` maps to `github.com`; a GitHub Enterprise Server base drops its `/api/v3` path.
    pub fn web_url<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base.clone();
        if url.host_str() == Some(PUBLIC_API_HOST) && url.set_host(Some(PUBLIC_WEB_HOST)).is_ok() {
            url.set_path("");
        } else {
            let path = url.path().trim_end_matches('/');
            let path = path.strip_suffix(ENTERPRISE_API_PATH).unwrap_or(path).to_owned();
            url.set_path(&path);
        }

        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Builds a request for the GitHub REST API.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.request_accepting(method, url, "application/vnd.github+json")
    }

    /// Builds a request for the GitHub REST API that accepts `accept` instead of the JSON media type.
    ///
    /// `reqwest` appends headers, so the media type is set exactly once here.
    pub fn request_accepting(&self, method: Method, url: Url, accept: &'static str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(header::ACCEPT, accept)
            .bearer_auth(&self.token)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(header::USER_AGENT, USER_AGENT)
    }

    /// Sends a request, turning every non-success status into [`ApiError::Status`].
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the status is not a success.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        debug!("{} answered {}", response.url(), response.status());

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }

    /// Sends a request and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails, the status is not a success, or the body does not decode.
    pub async fn json<T>(&self, request: RequestBuilder) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        Ok(self.send(request).await?.json::<T>().await?)
    }
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

/// Consumes a response into an [`ApiError::Status`], keeping the body text for diagnostics.
pub async fn status_error(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ApiError::Status { status, body }
}
