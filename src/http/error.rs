use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use reqwest::header::InvalidHeaderValue;
use reqwest::{Error as ReqwestError, StatusCode};
use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;
use url::ParseError as UrlError;

use super::{LightMethod, RouteKey};
use crate::internal::prelude::*;

/// How a failed attempt is treated by the retry policy.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FailureKind {
    /// Connection failure, timeout, DNS failure. Retried.
    Network,
    /// HTTP 429. Retried after honouring `Retry-After`.
    RateLimited,
    /// HTTP 500, 502, 503 or 504. Retried.
    ServerError,
    /// Any other unsuccessful status. Never retried.
    ApiError,
    /// The request could not be built. Never sent.
    Programmer,
}

impl FailureKind {
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::ServerError)
    }
}

/// The error body the API sends along with unsuccessful responses.
///
/// `code` is kept as a string, whether the API sent a number or a string. `errors` maps the path
/// of each invalid field (`embeds.0.title`) to its messages.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[non_exhaustive]
pub struct DiscordJsonError {
    /// The error code.
    #[serde(default, deserialize_with = "deserialize_code")]
    pub code: String,
    /// The error message.
    #[serde(default)]
    pub message: String,
    /// The full explained errors with their path in the request body.
    #[serde(default, deserialize_with = "deserialize_errors")]
    pub errors: BTreeMap<String, Vec<String>>,
}

/// An unsuccessful response, kept for diagnostics.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct ErrorResponse {
    pub status_code: StatusCode,
    pub url: String,
    pub method: LightMethod,
    pub error: DiscordJsonError,
}

impl ErrorResponse {
    /// Builds an error response from the raw response parts.
    ///
    /// A body that is not the API's error shape keeps its text as the message.
    #[must_use]
    pub fn from_parts(status_code: StatusCode, method: LightMethod, url: String, body: &[u8]) -> Self {
        let error = serde_json::from_slice(body).unwrap_or_else(|_| DiscordJsonError {
            code: String::new(),
            message: if body.is_empty() {
                status_code.canonical_reason().unwrap_or_default().to_string()
            } else {
                String::from_utf8_lossy(body).into_owned()
            },
            errors: BTreeMap::new(),
        });

        Self {
            status_code,
            url,
            method,
            error,
        }
    }
}

/// A request exhausted its retry budget while being ratelimited.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct RateLimitError {
    /// How long the API asked to wait before retrying.
    pub retry_after: Duration,
    /// Whether the limit hit was the global one rather than the route's bucket.
    pub global: bool,
    pub route: RouteKey,
    pub message: String,
}

/// A request that can't be sent as described.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum InvalidRequest {
    /// The path still contains a `{param}` or `:param` placeholder.
    MissingRouteParameter { path: String },
    /// The path must be non-empty and start with `/`.
    InvalidPath { path: String },
    /// The route key has an empty template.
    EmptyRouteKey,
    /// Files were attached to a request whose JSON body is not an object.
    PayloadNotAnObject,
}

impl fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRouteParameter { path } => {
                write!(f, "Path {path} is missing a route parameter")
            },
            Self::InvalidPath { path } => write!(f, "Path {path:?} must start with '/'"),
            Self::EmptyRouteKey => f.write_str("Route key template is empty"),
            Self::PayloadNotAnObject => {
                f.write_str("A request with files must have a JSON object as body")
            },
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// When a non-successful status code was received for a request.
    UnsuccessfulRequest(ErrorResponse),
    /// When the retry budget ran out while the request was being ratelimited.
    RateLimited(RateLimitError),
    /// When the decoding of a ratelimit header could not be properly decoded into an `i64` or
    /// `f64`.
    RateLimitI64F64,
    /// When the decoding of a ratelimit header could not be properly decoded from UTF-8.
    RateLimitUtf8,
    /// When parsing an URL failed due to invalid input.
    Url(UrlError),
    /// Header value contains invalid input.
    InvalidHeader(InvalidHeaderValue),
    /// Reqwest's Error contain information on why sending a request failed.
    Request(ReqwestError),
    /// The network attempt took longer than the configured timeout.
    Timeout(Duration),
    /// The request was malformed and never sent.
    InvalidRequest(InvalidRequest),
    /// The task running the network attempt was torn down before it completed.
    Aborted,
}

impl HttpError {
    /// Returns true when the error was caused by an unsuccessful response.
    #[must_use]
    pub fn is_unsuccessful_request(&self) -> bool {
        matches!(self, Self::UnsuccessfulRequest(_))
    }

    /// Returns the status code of the response that caused the error, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::UnsuccessfulRequest(res) => Some(res.status_code),
            Self::RateLimited(_) => Some(StatusCode::TOO_MANY_REQUESTS),
            _ => None,
        }
    }

    /// How the retry policy classifies this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnsuccessfulRequest(res) if is_transient(res.status_code) => {
                FailureKind::ServerError
            },
            Self::UnsuccessfulRequest(_) => FailureKind::ApiError,
            Self::RateLimited(_) => FailureKind::RateLimited,
            Self::Request(_) | Self::Timeout(_) | Self::Aborted => FailureKind::Network,
            Self::RateLimitI64F64
            | Self::RateLimitUtf8
            | Self::Url(_)
            | Self::InvalidHeader(_)
            | Self::InvalidRequest(_) => FailureKind::Programmer,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Server errors worth another attempt. Others, like 501 Not Implemented, won't go away.
fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

impl From<ErrorResponse> for HttpError {
    fn from(error: ErrorResponse) -> Self {
        Self::UnsuccessfulRequest(error)
    }
}

impl From<ReqwestError> for HttpError {
    fn from(error: ReqwestError) -> Self {
        Self::Request(error)
    }
}

impl From<InvalidHeaderValue> for HttpError {
    fn from(error: InvalidHeaderValue) -> Self {
        Self::InvalidHeader(error)
    }
}

impl From<InvalidRequest> for HttpError {
    fn from(error: InvalidRequest) -> Self {
        Self::InvalidRequest(error)
    }
}

impl From<UrlError> for HttpError {
    fn from(error: UrlError) -> Self {
        Self::Url(error)
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsuccessfulRequest(e) => {
                write!(f, "{} {} failed with {}", e.method, e.url, e.status_code)?;
                if !e.error.message.is_empty() {
                    write!(f, ": {}", e.error.message)?;
                }
                if !e.error.code.is_empty() {
                    write!(f, " (code {})", e.error.code)?;
                }
                Ok(())
            },
            Self::RateLimited(e) => {
                let scope = if e.global { "globally" } else { "on route" };
                write!(f, "Ratelimited {scope} {} for {:?}", e.route, e.retry_after)
            },
            Self::RateLimitI64F64 => f.write_str("Error decoding a header into an i64 or f64"),
            Self::RateLimitUtf8 => f.write_str("Error decoding a header from UTF-8"),
            Self::Url(_) => f.write_str("Provided URL is incorrect."),
            Self::InvalidHeader(_) => f.write_str("Provided value is an invalid header value."),
            Self::Request(_) => f.write_str("Error while sending HTTP request."),
            Self::Timeout(after) => write!(f, "Request timed out after {after:?}"),
            Self::InvalidRequest(e) => fmt::Display::fmt(e, f),
            Self::Aborted => f.write_str("Request attempt was aborted"),
        }
    }
}

impl StdError for HttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Url(inner) => Some(inner),
            Self::Request(inner) => Some(inner),
            Self::InvalidHeader(inner) => Some(inner),
            _ => None,
        }
    }
}

fn deserialize_code<'de, D: Deserializer<'de>>(deserializer: D) -> StdResult<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(code) => Ok(code),
        Value::Number(code) => Ok(code.to_string()),
        other => Err(DeError::custom(format!("invalid error code: {other}"))),
    }
}

/// Accepts both the flat `{"field": ["message"]}` form and the nested form the API uses, where
/// each level is keyed by a field name or array index and leaves are
/// `{"_errors": [{"code": .., "message": ..}]}`.
fn deserialize_errors<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> StdResult<BTreeMap<String, Vec<String>>, D::Error> {
    let map = Value::deserialize(deserializer)?;

    let mut errors = BTreeMap::new();
    let mut path = Vec::new();
    loop_errors(&map, &mut errors, &mut path);

    Ok(errors)
}

fn loop_errors<'a>(
    value: &'a Value,
    errors: &mut BTreeMap<String, Vec<String>>,
    path: &mut Vec<&'a str>,
) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                if key == "_errors" {
                    loop_errors(value, errors, path);
                } else {
                    path.push(key);
                    loop_errors(value, errors, path);
                    path.pop();
                }
            }
        },
        Value::Array(items) => {
            for item in items {
                let message = match item {
                    Value::String(message) => message.clone(),
                    Value::Object(error) => match error.get("message").and_then(Value::as_str) {
                        Some(message) => message.to_string(),
                        None => continue,
                    },
                    _ => continue,
                };

                errors.entry(path.join(".")).or_default().push(message);
            }
        },
        _ => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::json;

    #[test]
    fn parse_flat_error_body() {
        let body = json!({
            "message": "Invalid Form Body",
            "code": "50035",
            "errors": {"content": ["Must be 2000 or fewer in length."]},
        });

        let res = ErrorResponse::from_parts(
            StatusCode::BAD_REQUEST,
            LightMethod::Post,
            "https://discord.com/api/v10/channels/1/messages".to_string(),
            body.to_string().as_bytes(),
        );

        assert_eq!(res.error.code, "50035");
        assert_eq!(res.error.message, "Invalid Form Body");
        assert_eq!(res.error.errors["content"], ["Must be 2000 or fewer in length."]);
    }

    #[test]
    fn parse_nested_error_body() {
        let body = json!({
            "message": "Invalid Form Body",
            "code": 50035,
            "errors": {
                "embeds": {"0": {"title": {"_errors": [
                    {"code": "BASE_TYPE_MAX_LENGTH", "message": "Too long."}
                ]}}},
                "_errors": [{"code": "X", "message": "Top level."}],
            },
        });

        let res = ErrorResponse::from_parts(
            StatusCode::BAD_REQUEST,
            LightMethod::Post,
            String::new(),
            body.to_string().as_bytes(),
        );

        assert_eq!(res.error.code, "50035");
        assert_eq!(res.error.errors["embeds.0.title"], ["Too long."]);
        assert_eq!(res.error.errors[""], ["Top level."]);
    }

    #[test]
    fn non_json_body_is_kept_as_message() {
        let res = ErrorResponse::from_parts(
            StatusCode::BAD_GATEWAY,
            LightMethod::Get,
            String::new(),
            b"<html>bad gateway</html>",
        );
        assert_eq!(res.error.message, "<html>bad gateway</html>");

        let res =
            ErrorResponse::from_parts(StatusCode::NOT_FOUND, LightMethod::Get, String::new(), b"");
        assert_eq!(res.error.message, "Not Found");
    }

    #[test]
    fn kinds() {
        let res = |status| {
            HttpError::UnsuccessfulRequest(ErrorResponse::from_parts(
                status,
                LightMethod::Get,
                String::new(),
                b"",
            ))
        };

        assert_eq!(res(StatusCode::INTERNAL_SERVER_ERROR).kind(), FailureKind::ServerError);
        assert_eq!(res(StatusCode::NOT_FOUND).kind(), FailureKind::ApiError);
        for status in [StatusCode::BAD_GATEWAY, StatusCode::SERVICE_UNAVAILABLE, StatusCode::GATEWAY_TIMEOUT] {
            assert!(res(status).is_retryable());
        }
        assert_eq!(res(StatusCode::NOT_IMPLEMENTED).kind(), FailureKind::ApiError);
        assert!(!res(StatusCode::HTTP_VERSION_NOT_SUPPORTED).is_retryable());
        assert!(!res(StatusCode::FORBIDDEN).is_retryable());
        assert!(HttpError::Timeout(Duration::from_secs(15)).is_retryable());
        assert_eq!(
            HttpError::InvalidRequest(InvalidRequest::EmptyRouteKey).kind(),
            FailureKind::Programmer
        );
    }
}
