//! Shared HTTP transport, application context, and error types for the CLI.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use sluice_panel::{
    ApiError, ApiRequest, ApiResponse, HttpTransport, Method, PanelApi, TransportError,
};
use tracing::debug;
use url::Url;
use uuid::Uuid;

pub(crate) const HEADER_API_KEY: &str = "x-sluice-api-key";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ApiError> for CliError {
    /// Client-side mistakes reported by the server map to validation errors; everything else
    /// is an operational failure.
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Application {
                status: 400 | 404 | 409 | 422,
                message,
                ..
            } => Self::Validation(message),
            ApiError::Application {
                status, message, ..
            } if (200..300).contains(&status) => Self::Failure(anyhow!(message)),
            ApiError::Application {
                path,
                status,
                message,
            } => Self::Failure(anyhow!("{path} returned {status}: {message}")),
            other => Self::Failure(anyhow::Error::new(other)),
        }
    }
}

/// [`HttpTransport`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub(crate) struct ReqwestTransport {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ReqwestTransport {
    /// Build a client that tags every request with `trace_id` and gives up after `timeout`.
    pub(crate) fn new(
        base_url: Url,
        api_key: Option<String>,
        timeout: Duration,
        trace_id: &str,
    ) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        Ok(Self::with_client(client, base_url, api_key))
    }

    pub(crate) fn with_client(client: Client, base_url: Url, api_key: Option<String>) -> Self {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Resolve an API path below the base URL, keeping any path prefix the base carries.
    fn endpoint(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{}", request.path))
            .map_err(|err| TransportError::new(format!("invalid request URL: {err}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.endpoint(&request)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        debug!(method = request.method.as_str(), %url, "sending request");

        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header(HEADER_API_KEY, key);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::new(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::new(format!("failed to read response body: {err}")))?;
        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) api: PanelApi,
}

impl AppContext {
    pub(crate) fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            api: PanelApi::new(Arc::clone(&transport)),
            transport,
        }
    }
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    let url = input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported URL scheme '{other}' in '{input}'")),
    }
}

/// Fresh request identifier for one CLI invocation.
pub(crate) fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Split a comma-separated identifier list, rejecting blanks.
pub(crate) fn parse_ids(raw: &[String]) -> CliResult<Vec<String>> {
    let ids: Vec<String> = raw
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        return Err(CliError::validation("at least one item id is required"));
    }
    Ok(ids)
}
