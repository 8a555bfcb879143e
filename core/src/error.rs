//! Error types for the ops manager client.
//!
//! # Design
//! Every failure is returned to the caller; the client neither logs nor
//! retries. `Error` separates the place a call went wrong: configuring the
//! client, encoding the request, moving bytes over the network, the caller's
//! context ending, the server rejecting the request, or decoding the reply.
//! Server rejections are `ApiError` values built by [`check_response`], which
//! runs on every executed request before any success decoding.

use std::fmt;
use std::io::Read;

use serde::Deserialize;
use thiserror::Error;

use crate::context::ContextError;
use crate::http::{HttpMethod, Response};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by `Client` and the resource services.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("invalid argument {name}: {reason}")]
    Argument { name: &'static str, reason: &'static str },

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// Copying a binary response body into the caller's sink failed.
    #[error("failed to copy response body: {0}")]
    Copy(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn argument(name: &'static str) -> Self {
        Error::Argument {
            name,
            reason: "must be set",
        }
    }

    /// The server's error reply, if this is an API error.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Problems with how the client or its transport is configured.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base URL must have a trailing slash, but {0:?} does not")]
    MissingTrailingSlash(String),

    #[error("transport does not accept TLS settings")]
    TlsUnsupported,

    #[error("invalid CA bundle: {0}")]
    InvalidCaBundle(String),
}

/// Problems turning caller input into a request.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("invalid request URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid query parameters: {0}")]
    Query(String),

    #[error("failed to serialize request body: {0}")]
    Json(#[source] serde_json::Error),
}

/// A non-2xx reply from the ops manager API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub method: HttpMethod,
    pub url: String,
    /// HTTP status of the response.
    pub status: u16,
    /// Machine-readable code such as `GROUP_NOT_FOUND`.
    pub error_code: String,
    pub reason: String,
    pub detail: String,
    /// Per-field details attached by the server.
    pub parameters: Vec<serde_json::Value>,
    pub response: Response,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {} {}", self.method, self.url, self.status, self.reason)?;
        if !self.error_code.is_empty() {
            write!(f, " ({})", self.error_code)?;
        }
        if !self.detail.is_empty() {
            write!(f, " {}", self.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Wire shape of an ops manager error body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    detail: String,
    #[serde(default)]
    parameters: Vec<serde_json::Value>,
}

/// Classify an executed request by its status.
///
/// Returns `Ok(())` for 2xx. Anything else becomes an `ApiError`, described
/// by the body when it parses as the server's error shape and by the status
/// text alone when the body is empty or malformed.
pub fn check_response(
    method: HttpMethod,
    url: &str,
    response: &Response,
    body: &mut dyn Read,
) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }

    let mut raw = Vec::new();
    let parsed = match body.read_to_end(&mut raw) {
        Ok(_) if !raw.is_empty() => serde_json::from_slice::<ErrorBody>(&raw).ok(),
        _ => None,
    };

    let mut err = ApiError {
        method,
        url: url.to_string(),
        status: response.status,
        error_code: String::new(),
        reason: status_text(response.status).to_string(),
        detail: String::new(),
        parameters: Vec::new(),
        response: response.clone(),
    };
    if let Some(parsed) = parsed {
        err.error_code = parsed.error_code;
        if !parsed.reason.is_empty() {
            err.reason = parsed.reason;
        }
        err.detail = parsed.detail;
        err.parameters = parsed.parameters;
    }
    Err(err)
}

fn status_text(status: u16) -> &'static str {
    ureq::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status")
}
