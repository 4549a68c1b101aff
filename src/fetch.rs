//! Fetching specification documents over HTTP

use crate::error::{IngestError, Result};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("api-harmony/", env!("CARGO_PKG_VERSION"));

/// Longest server-provided error message passed on to users
const MAX_SERVER_MESSAGE_LEN: usize = 300;

/// Fetcher settings
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Endpoint that relays the request, receiving the target as `?url=`
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Response body of a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub text: String,
    pub content_type: Option<String>,
}

/// HTTP client for specification documents
#[derive(Debug, Clone)]
pub struct SpecFetcher {
    client: Client,
    proxy: Option<Url>,
    timeout: Duration,
}

impl SpecFetcher {
    pub fn new(options: FetchOptions) -> Result<Self> {
        let proxy = options
            .proxy
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| IngestError::Fetch {
                status: None,
                message: format!("invalid proxy endpoint: {}", e),
            })?;

        let client = ClientBuilder::new()
            .timeout(options.timeout)
            .user_agent(options.user_agent)
            .build()
            .map_err(|e| IngestError::Fetch {
                status: None,
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            proxy,
            timeout: options.timeout,
        })
    }

    /// URL actually requested, routed through the proxy when one is configured
    pub fn request_url(&self, target: &Url) -> Url {
        match &self.proxy {
            Some(proxy) => {
                let mut url = proxy.clone();
                url.query_pairs_mut().append_pair("url", target.as_str());
                url
            }
            None => target.clone(),
        }
    }

    /// GET a document, translating failures into readable messages
    pub async fn fetch(&self, target: &Url) -> Result<FetchedDocument> {
        let request_url = self.request_url(target);
        tracing::debug!(url = %target, via = %request_url, "Fetching specification");

        let response = self
            .client
            .get(request_url)
            .send()
            .await
            .map_err(|e| self.transport_error(target, e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(target, e))?;

        if !status.is_success() {
            let message = describe_failure(status, content_type.as_deref(), &text);
            tracing::info!(url = %target, status = status.as_u16(), "Specification fetch failed");
            return Err(IngestError::Fetch {
                status: Some(status.as_u16()),
                message,
            });
        }

        if looks_like_html(content_type.as_deref(), &text) {
            return Err(IngestError::Fetch {
                status: Some(status.as_u16()),
                message: format!(
                    "{} returned an HTML page instead of an OpenAPI document",
                    target
                ),
            });
        }

        Ok(FetchedDocument { text, content_type })
    }

    fn transport_error(&self, target: &Url, error: reqwest::Error) -> IngestError {
        let message = if error.is_timeout() {
            format!(
                "request to {} timed out after {}s",
                target,
                self.timeout.as_secs()
            )
        } else if error.is_connect() {
            format!("could not connect to {}", target)
        } else {
            format!("request to {} failed: {}", target, error)
        };
        IngestError::Fetch {
            status: error.status().map(|s| s.as_u16()),
            message,
        }
    }
}

/// Human-readable explanation of a non-2xx response
///
/// Distinguishes a missing document, an HTML error page, a JSON error body
/// with a `message` or `error` field, and anything else. Raw markup is never
/// echoed back.
pub fn describe_failure(status: StatusCode, content_type: Option<&str>, body: &str) -> String {
    let code = status.as_u16();

    if status == StatusCode::NOT_FOUND {
        return format!(
            "Specification not found (HTTP {}). Check that the URL points to an OpenAPI document",
            code
        );
    }

    if looks_like_html(content_type, body) {
        return format!(
            "Server returned an HTML error page (HTTP {} {})",
            code,
            status.canonical_reason().unwrap_or("")
        )
        .trim_end()
        .to_string();
    }

    if let Some(message) = json_error_message(body) {
        return format!("Server error (HTTP {}): {}", code, message);
    }

    format!(
        "Unrecognized response from server (HTTP {} {})",
        code,
        status.canonical_reason().unwrap_or("")
    )
    .trim_end()
    .to_string()
}

fn looks_like_html(content_type: Option<&str>, body: &str) -> bool {
    let declared = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false);
    let head: String = body
        .trim_start()
        .chars()
        .take(64)
        .collect::<String>()
        .to_ascii_lowercase();
    declared || head.starts_with("<!doctype html") || head.starts_with("<html")
}

fn json_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    let message = ["message", "error"].iter().find_map(|key| match object.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        // {"error": {"message": "..."}}
        Value::Object(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string()),
        _ => None,
    })?;

    Some(message.chars().take(MAX_SERVER_MESSAGE_LEN).collect())
}
