use std::borrow::Cow;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::header::{
    HeaderMap as Headers,
    HeaderValue,
    AUTHORIZATION,
    CONTENT_LENGTH,
    CONTENT_TYPE,
    USER_AGENT,
};
use reqwest::{Client, Request as ReqwestRequest, Url};

use super::multipart::Multipart;
use super::{HttpError, InvalidRequest, LightMethod, Route, RouteKey};
use crate::builder::CreateAttachment;
use crate::constants;
use crate::internal::prelude::*;
use crate::json;

const AUDIT_LOG_REASON: &str = "x-audit-log-reason";

/// Builds a [`Request`]. Obtained through [`Request::builder`] for a typed [`Route`], or
/// [`Request::raw`] for any other endpoint.
#[derive(Clone, Debug)]
#[must_use]
pub struct RequestBuilder {
    method: LightMethod,
    route: RouteKey,
    path: String,
    body: Option<Value>,
    files: Vec<CreateAttachment>,
    auth: bool,
    reason: Option<String>,
    params: Vec<(String, String)>,
}

impl RequestBuilder {
    fn new(method: LightMethod, route: RouteKey, path: String) -> Self {
        Self {
            method,
            route,
            path,
            body: None,
            files: Vec::new(),
            auth: true,
            reason: None,
            params: Vec::new(),
        }
    }

    /// Sets the JSON body. When files are attached, it's sent as the `payload_json` form field
    /// and must be an object.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches files, sending the request as `multipart/form-data`.
    pub fn files(mut self, files: impl IntoIterator<Item = CreateAttachment>) -> Self {
        self.files = files.into_iter().collect();
        self
    }

    /// Whether to send the `Authorization` header. Defaults to `true`.
    pub fn auth(mut self, auth: bool) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the reason shown in the guild's audit log for the action performed by the request.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Adds query parameters.
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn build(self) -> Request {
        let RequestBuilder {
            method,
            route,
            path,
            body,
            files,
            auth,
            reason,
            params,
        } = self;

        Request {
            method,
            route,
            path,
            body,
            files,
            auth,
            reason,
            params,
        }
    }
}

/// A single logical request: what to send, and which ratelimit bucket it counts towards.
///
/// Requests are immutable once built. The token is not part of the request; it's read by the
/// client at the time of each attempt.
#[derive(Clone, Debug)]
pub struct Request {
    method: LightMethod,
    route: RouteKey,
    path: String,
    body: Option<Value>,
    files: Vec<CreateAttachment>,
    auth: bool,
    reason: Option<String>,
    params: Vec<(String, String)>,
}

impl Request {
    /// Starts a request to a typed route. Its path and route key are both derived from `route`.
    pub fn builder(route: Route<'_>, method: LightMethod) -> RequestBuilder {
        RequestBuilder::new(method, route.route_key(method), route.path())
    }

    /// Starts a request to an endpoint given by hand: the route key template shared by requests
    /// counting towards the same ratelimit bucket, and the fully substituted path.
    ///
    /// ```rust
    /// use serenade::http::{LightMethod, Request};
    ///
    /// let request = Request::raw(LightMethod::Get, "/channels/7/messages/:id", "/channels/7/messages/8")
    ///     .build();
    /// assert_eq!(request.route_key().to_string(), "GET /channels/7/messages/:id");
    /// ```
    pub fn raw(
        method: LightMethod,
        route_key: impl Into<Cow<'static, str>>,
        path: impl Into<String>,
    ) -> RequestBuilder {
        RequestBuilder::new(method, RouteKey::new(method, route_key), path.into())
    }

    #[must_use]
    pub fn method(&self) -> LightMethod {
        self.method
    }

    #[must_use]
    pub fn route_key(&self) -> &RouteKey {
        &self.route
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn files(&self) -> &[CreateAttachment] {
        &self.files
    }

    #[must_use]
    pub fn auth(&self) -> bool {
        self.auth
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Checks that the request can be sent as described.
    ///
    /// # Errors
    ///
    /// Returns the [`InvalidRequest`] describing the first problem found.
    pub fn validate(&self) -> StdResult<(), InvalidRequest> {
        if self.route.template().is_empty() {
            return Err(InvalidRequest::EmptyRouteKey);
        }

        if !self.path.starts_with('/') {
            return Err(InvalidRequest::InvalidPath {
                path: self.path.clone(),
            });
        }

        let unfilled = self.path.contains(['{', '}'])
            || self.path.split('/').any(|segment| segment.starts_with(':'));
        if unfilled {
            return Err(InvalidRequest::MissingRouteParameter {
                path: self.path.clone(),
            });
        }

        if !self.files.is_empty() && self.body.as_ref().is_some_and(|body| !body.is_object()) {
            return Err(InvalidRequest::PayloadNotAnObject);
        }

        Ok(())
    }

    /// Builds the network request. `token` is sent as the `Authorization` header, unless the
    /// request was built with `auth(false)`.
    #[cfg_attr(feature = "tracing_instrument", instrument(skip(self, client, token)))]
    pub(super) fn build(
        &self,
        client: &Client,
        base_url: &str,
        token: Option<&str>,
    ) -> Result<ReqwestRequest> {
        let mut url = Url::parse(&format!("{base_url}{}", self.path)).map_err(HttpError::Url)?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.params);
        }

        let mut builder = client.request(self.method.reqwest_method(), url);

        let mut headers = Headers::with_capacity(4);
        headers.insert(USER_AGENT, HeaderValue::from_static(constants::USER_AGENT));

        if let Some(token) = token.filter(|_| self.auth) {
            let mut value = HeaderValue::from_str(token).map_err(HttpError::InvalidHeader)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        if let Some(reason) = &self.reason {
            let encoded = utf8_percent_encode(reason, NON_ALPHANUMERIC).to_string();
            headers.insert(
                AUDIT_LOG_REASON,
                HeaderValue::from_str(&encoded).map_err(HttpError::InvalidHeader)?,
            );
        }

        if self.files.is_empty() {
            // The API answers 400 to a content type without a body.
            if let Some(body) = &self.body {
                let bytes = json::to_vec(body)?;
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                builder = builder.body(bytes);
            } else {
                headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
            }
        } else {
            let multipart = Multipart {
                files: &self.files,
                payload_json: self.body.as_ref(),
            };
            // Setting multipart adds the content type and length headers
            builder = builder.multipart(multipart.build_form()?);
        }

        Ok(builder.headers(headers).build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::json;
    use crate::model::id::{ChannelId, MessageId};

    const BASE: &str = "https://discord.com/api/v10";

    #[test]
    fn typed_route() {
        let request = Request::builder(
            Route::ChannelMessage {
                channel_id: ChannelId::new(1),
                message_id: MessageId::new(2),
            },
            LightMethod::Delete,
        )
        .build();

        assert_eq!(request.path(), "/channels/1/messages/2");
        assert_eq!(request.route_key().to_string(), "DELETE /channels/1/messages/:id");
        assert!(request.auth());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn validation() {
        let check = |template: &'static str, path: &str| {
            Request::raw(LightMethod::Get, template, path).build().validate()
        };

        assert_eq!(check("", "/gateway"), Err(InvalidRequest::EmptyRouteKey));
        assert!(matches!(check("/gateway", ""), Err(InvalidRequest::InvalidPath { .. })));
        assert!(matches!(check("/gateway", "gateway"), Err(InvalidRequest::InvalidPath { .. })));
        assert!(matches!(
            check("/channels/:id", "/channels/:id"),
            Err(InvalidRequest::MissingRouteParameter { .. })
        ));
        assert!(matches!(
            check("/channels/{channel_id}", "/channels/{channel_id}/messages"),
            Err(InvalidRequest::MissingRouteParameter { .. })
        ));
        assert_eq!(check("/users/@me", "/users/@me"), Ok(()));

        let request = Request::raw(LightMethod::Post, "/channels/1/messages", "/channels/1/messages")
            .json(json!("text"))
            .files([CreateAttachment::bytes(vec![0], "a.bin")])
            .build();
        assert_eq!(request.validate(), Err(InvalidRequest::PayloadNotAnObject));
    }

    #[test]
    fn builds_json_request() {
        let request = Request::raw(LightMethod::Post, "/channels/1/messages", "/channels/1/messages")
            .json(json!({"content": "hi"}))
            .reason("cleaning up spam")
            .params([("limit", "10")])
            .build();

        let built = request.build(&Client::new(), BASE, Some("Bot abc")).unwrap();
        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(built.url().as_str(), "https://discord.com/api/v10/channels/1/messages?limit=10");

        let headers = built.headers();
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[AUTHORIZATION], "Bot abc");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers[AUDIT_LOG_REASON], "cleaning%20up%20spam");
        assert_eq!(headers[USER_AGENT], constants::USER_AGENT);

        let body = built.body().and_then(reqwest::Body::as_bytes).unwrap();
        assert_eq!(json::from_slice::<Value>(body).unwrap(), json!({"content": "hi"}));
    }

    #[test]
    fn unauthenticated_request_has_no_token() {
        let request = Request::raw(LightMethod::Get, "/gateway", "/gateway").auth(false).build();

        let built = request.build(&Client::new(), BASE, Some("Bot abc")).unwrap();
        assert!(built.headers().get(AUTHORIZATION).is_none());
        assert_eq!(built.headers()[CONTENT_LENGTH], "0");
        assert!(built.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn multipart_request() {
        let request = Request::raw(LightMethod::Post, "/channels/1/messages", "/channels/1/messages")
            .json(json!({"content": "file"}))
            .files([CreateAttachment::bytes(b"abc".to_vec(), "a.txt")])
            .build();

        let built = request.build(&Client::new(), BASE, Some("Bot abc")).unwrap();
        let content_type = built.headers()[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
    }
}
