use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Request as ReqwestRequest, StatusCode};
use tracing::{debug, trace};

use super::ratelimiting::{self, Ratelimiter};
use super::{ErrorResponse, HttpError, RateLimitError, Request};
use crate::internal::prelude::*;

/// A response as read off the wire.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// Sends a single request over the network.
///
/// [`ReqwestTransport`] is used unless another transport is given to
/// [`HttpBuilder::transport`](super::HttpBuilder::transport).
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends the request and reads the whole response. Errors are failures to get a response at
    /// all; unsuccessful statuses are returned as responses.
    async fn send(&self, request: ReqwestRequest) -> StdResult<RawResponse, HttpError>;
}

/// Transport backed by a [`reqwest::Client`].
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ReqwestRequest) -> StdResult<RawResponse, HttpError> {
        let response = self.client.execute(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// The result of one network attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// A 2xx response.
    Success(RawResponse),
    /// A failure worth retrying: ratelimited, server error, or no response.
    Retryable(HttpError),
    /// A failure retrying won't fix.
    Fatal(Error),
}

/// Performs single attempts of requests.
///
/// Every response received, whatever its status, updates the [`Ratelimiter`] before the attempt
/// is classified.
#[derive(Debug)]
pub struct Executor {
    client: Client,
    transport: Arc<dyn Transport>,
    ratelimiter: Arc<Ratelimiter>,
    base_url: String,
    timeout: Duration,
}

impl Executor {
    #[must_use]
    pub fn new(
        client: Client,
        transport: Arc<dyn Transport>,
        ratelimiter: Arc<Ratelimiter>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            transport,
            ratelimiter,
            base_url: base_url.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `request` once, with `token` as its `Authorization` header.
    #[cfg_attr(feature = "tracing_instrument", instrument(skip(self, token)))]
    pub async fn attempt(&self, request: &Request, token: Option<&str>) -> AttemptOutcome {
        let built = match request.build(&self.client, &self.base_url, token) {
            Ok(built) => built,
            Err(why) => return AttemptOutcome::Fatal(why),
        };
        let url = built.url().to_string();

        trace!("Sending {} {url}", request.method());
        let response = match tokio::time::timeout(self.timeout, self.transport.send(built)).await {
            Ok(Ok(response)) => response,
            Ok(Err(why)) if why.is_retryable() => return AttemptOutcome::Retryable(why),
            Ok(Err(why)) => return AttemptOutcome::Fatal(why.into()),
            Err(_) => return AttemptOutcome::Retryable(HttpError::Timeout(self.timeout)),
        };

        self.classify(request, url, response)
    }

    fn classify(&self, request: &Request, url: String, response: RawResponse) -> AttemptOutcome {
        let key = request.route_key();
        self.ratelimiter.update_from_headers(key, &response.headers);

        let status = response.status;
        if status.is_success() {
            return AttemptOutcome::Success(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body: Option<Value> = serde_json::from_slice(&response.body).ok();
            let retry_after = ratelimiting::retry_after(&response.headers, body.as_ref());
            let global = ratelimiting::is_global(&response.headers, body.as_ref());
            self.ratelimiter.ratelimited(key, retry_after, global);

            let message = body
                .as_ref()
                .and_then(|body| body.get("message"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            return AttemptOutcome::Retryable(HttpError::RateLimited(RateLimitError {
                retry_after,
                global,
                route: key.clone(),
                message,
            }));
        }

        let error = ErrorResponse::from_parts(status, request.method(), url, &response.body);
        debug!("{} {} failed with {status}", error.method, error.url);

        let error = HttpError::from(error);
        if error.is_retryable() {
            AttemptOutcome::Retryable(error)
        } else {
            AttemptOutcome::Fatal(error.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use reqwest::header::HeaderValue;

    use super::*;
    use crate::http::{FailureKind, LightMethod, ManualClock, RouteKey};
    use crate::json::json;

    #[derive(Debug)]
    struct Canned(Mutex<Option<StdResult<RawResponse, HttpError>>>);

    impl Canned {
        fn new(status: u16, headers: &[(&'static str, &'static str)], body: &'static str) -> Self {
            let mut map = HeaderMap::new();
            for &(name, value) in headers {
                map.insert(name, HeaderValue::from_static(value));
            }
            let response = RawResponse::new(StatusCode::from_u16(status).unwrap(), map, body);
            Self(Mutex::new(Some(Ok(response))))
        }
    }

    #[async_trait]
    impl Transport for Canned {
        async fn send(&self, _: ReqwestRequest) -> StdResult<RawResponse, HttpError> {
            self.0.lock().take().unwrap()
        }
    }

    #[derive(Debug)]
    struct Hang;

    #[async_trait]
    impl Transport for Hang {
        async fn send(&self, _: ReqwestRequest) -> StdResult<RawResponse, HttpError> {
            futures::future::pending().await
        }
    }

    const NOW: u64 = 1_700_000_000_000;

    fn executor(transport: impl Transport + 'static) -> (Executor, Arc<Ratelimiter>) {
        let ratelimiter = Arc::new(Ratelimiter::new(Arc::new(ManualClock::new(NOW))));
        let executor = Executor::new(
            Client::new(),
            Arc::new(transport),
            Arc::clone(&ratelimiter),
            "https://discord.com/api/v10",
            Duration::from_secs(15),
        );
        (executor, ratelimiter)
    }

    fn request() -> Request {
        Request::raw(LightMethod::Get, "/channels/1", "/channels/1").build()
    }

    fn key() -> RouteKey {
        RouteKey::new(LightMethod::Get, "/channels/1")
    }

    #[tokio::test]
    async fn success_records_headers() {
        let (executor, ratelimiter) = executor(Canned::new(
            200,
            &[
                ("x-ratelimit-limit", "5"),
                ("x-ratelimit-remaining", "0"),
                ("x-ratelimit-reset", "1700000003"),
            ],
            r#"{"id": "1"}"#,
        ));

        let outcome = executor.attempt(&request(), Some("Bot token")).await;
        assert!(matches!(outcome, AttemptOutcome::Success(ref r) if r.body == r#"{"id": "1"}"#));
        assert_eq!(ratelimiter.wait_time(&key()), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn rate_limited_on_route() {
        let (executor, ratelimiter) = executor(Canned::new(
            429,
            &[("retry-after", "2")],
            r#"{"message": "You are being rate limited.", "retry_after": 2.0, "global": false}"#,
        ));

        let AttemptOutcome::Retryable(HttpError::RateLimited(why)) =
            executor.attempt(&request(), None).await
        else {
            panic!("expected a ratelimit");
        };

        assert_eq!(why.retry_after, Duration::from_secs(2));
        assert!(!why.global);
        assert_eq!(why.route, key());
        assert_eq!(why.message, "You are being rate limited.");
        assert_eq!(ratelimiter.wait_time(&key()), Duration::from_secs(2));
        assert_eq!(ratelimiter.global_reset(), None);
    }

    #[tokio::test]
    async fn rate_limited_globally() {
        let (executor, ratelimiter) = executor(Canned::new(
            429,
            &[("x-ratelimit-global", "true")],
            r#"{"message": "You are being rate limited.", "retry_after": 0.5, "global": true}"#,
        ));

        let outcome = executor.attempt(&request(), None).await;
        assert!(matches!(outcome, AttemptOutcome::Retryable(HttpError::RateLimited(ref e)) if e.global));
        assert_eq!(ratelimiter.global_reset(), Some(NOW + 500));
        assert!(ratelimiter.routes().get(&key()).is_none());
    }

    #[tokio::test]
    async fn server_error_is_retryable() {
        let (executor, _) = executor(Canned::new(502, &[], "Bad Gateway"));

        let AttemptOutcome::Retryable(why) = executor.attempt(&request(), None).await else {
            panic!("expected a retryable failure");
        };
        assert_eq!(why.kind(), FailureKind::ServerError);
    }

    #[tokio::test]
    async fn permanent_server_error_is_fatal() {
        let (executor, _) = executor(Canned::new(501, &[], "Not Implemented"));

        let outcome = executor.attempt(&request(), None).await;
        assert!(matches!(
            outcome,
            AttemptOutcome::Fatal(Error::Http(HttpError::UnsuccessfulRequest(ref why)))
                if why.status_code == StatusCode::NOT_IMPLEMENTED
        ));
    }

    #[tokio::test]
    async fn client_error_is_fatal() {
        let (executor, ratelimiter) = executor(Canned::new(
            404,
            &[
                ("x-ratelimit-limit", "5"),
                ("x-ratelimit-remaining", "4"),
                ("x-ratelimit-reset", "1700000003"),
            ],
            r#"{"message": "Unknown Channel", "code": 10003}"#,
        ));

        let AttemptOutcome::Fatal(Error::Http(HttpError::UnsuccessfulRequest(why))) =
            executor.attempt(&request(), None).await
        else {
            panic!("expected an api error");
        };

        assert_eq!(why.status_code, StatusCode::NOT_FOUND);
        assert_eq!(why.error.code, "10003");
        assert_eq!(why.url, "https://discord.com/api/v10/channels/1");
        assert_eq!(ratelimiter.routes().get(&key()).unwrap().remaining(), 4);
    }

    #[tokio::test]
    async fn invalid_body_is_fatal_without_sending() {
        let (executor, _) = executor(Hang);
        let request = Request::raw(LightMethod::Post, "/channels/1/messages", "/channels/1/messages")
            .json(json!(1))
            .files([crate::builder::CreateAttachment::bytes(vec![1], "a.bin")])
            .build();

        let outcome = executor.attempt(&request, None).await;
        assert!(matches!(outcome, AttemptOutcome::Fatal(Error::Http(HttpError::InvalidRequest(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_retryable_network_failure() {
        let (executor, _) = executor(Hang);

        let AttemptOutcome::Retryable(why) = executor.attempt(&request(), None).await else {
            panic!("expected a timeout");
        };
        assert!(matches!(why, HttpError::Timeout(d) if d == Duration::from_secs(15)));
        assert_eq!(why.kind(), FailureKind::Network);
    }
}
