use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use super::{
    AttemptOutcome,
    Clock,
    ErrorResponse,
    Executor,
    HttpError,
    LightMethod,
    RatelimitInfo,
    Ratelimiter,
    RawResponse,
    ReqwestTransport,
    Request,
    Route,
    Sleeper,
    SystemClock,
    TokioSleeper,
    Transport,
};
use crate::builder::CreateAttachment;
use crate::constants;
use crate::internal::prelude::*;
use crate::json;
use crate::model::channel::PermissionOverwrite;
use crate::model::id::{ChannelId, GuildId, MessageId, TargetId, UserId};

/// A builder to construct an [`Http`] client.
///
/// ```rust
/// use std::time::Duration;
///
/// use serenade::http::HttpBuilder;
///
/// # fn run() -> serenade::Result<()> {
/// let http = HttpBuilder::new("token").retries(5).timeout(Duration::from_secs(30)).build()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct HttpBuilder {
    client: Option<Client>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    ratelimit_callback: Option<Box<dyn Fn(RatelimitInfo) + Send + Sync>>,
    token: SecretString,
    retries: u32,
    timeout: Duration,
    base_url: String,
}

impl HttpBuilder {
    /// Construct a new builder to call methods on for the HTTP construction. The `token` will
    /// automatically be prefixed "Bot " if not already, unless it's a "Bearer " token.
    pub fn new(token: impl AsRef<str>) -> Self {
        Self {
            client: None,
            transport: None,
            clock: None,
            sleeper: None,
            ratelimit_callback: None,
            token: SecretString::new(parse_token(token.as_ref())),
            retries: constants::DEFAULT_RETRIES,
            timeout: constants::DEFAULT_TIMEOUT,
            base_url: constants::API_BASE.to_string(),
        }
    }

    /// Sets a token for the bot. If the token is not prefixed "Bot " or "Bearer ", this method
    /// will automatically do so.
    pub fn token(mut self, token: impl AsRef<str>) -> Self {
        self.token = SecretString::new(parse_token(token.as_ref()));
        self
    }

    /// Sets the total number of attempts made for a request before its last failure is
    /// returned. Defaults to 3. A budget of 0 is treated as 1.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets how long a single network attempt may take before it counts as a network failure.
    /// Defaults to 15 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the base URL requests are sent to, such as a proxy in front of the API. Paths are
    /// appended to it as is, so it must not end with a `/`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the [`reqwest::Client`]. If one isn't provided, a default one will be used.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the transport requests are sent through. Defaults to sending them with the client.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the clock ratelimit windows are measured with. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets how requests wait out ratelimits. Defaults to the tokio timer.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Sets a callback to be called whenever a request has to wait for a ratelimit.
    pub fn ratelimit_callback(
        mut self,
        callback: impl Fn(RatelimitInfo) + Send + Sync + 'static,
    ) -> Self {
        self.ratelimit_callback = Some(Box::new(callback));
        self
    }

    /// Use the given configuration to build the `Http` client.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Request`] if no client was given and the default one can't be
    /// created, such as when the TLS backend can't be initialised.
    pub fn build(self) -> Result<Http> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().build()?,
        };

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new(client.clone())));

        let ratelimiter = Ratelimiter::new(self.clock.unwrap_or_else(|| Arc::new(SystemClock)));
        if let Some(callback) = self.ratelimit_callback {
            ratelimiter.set_ratelimit_callback(callback);
        }
        let ratelimiter = Arc::new(ratelimiter);

        let executor = Executor::new(
            client,
            transport,
            Arc::clone(&ratelimiter),
            self.base_url,
            self.timeout,
        );

        Ok(Http {
            executor: Arc::new(executor),
            ratelimiter,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
            token: RwLock::new(self.token),
            retries: self.retries.max(1),
        })
    }
}

fn parse_token(token: &str) -> String {
    let token = token.trim();

    if token.is_empty() || token.starts_with("Bot ") || token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bot {token}")
    }
}

/// Where a single logical request is in its lifecycle.
#[derive(Debug)]
enum RequestState {
    /// Blocked until the ratelimiter allows the request to be sent.
    Waiting,
    /// A network attempt is outstanding.
    InFlight,
    /// The last attempt failed in a way worth retrying, within budget.
    Retrying(HttpError),
    Done(RawResponse),
    Failed(Error),
}

impl RequestState {
    fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::InFlight => "in flight",
            Self::Retrying(_) => "retrying",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }
}

/// The client performing requests to the API, and the owner of the retry policy.
///
/// Every request first waits for the ratelimits of its route and the global ratelimit, then is
/// sent once. Ratelimited attempts, server errors and network failures are retried until the
/// attempt budget set with [`HttpBuilder::retries`] is spent, after which the last failure is
/// returned. Any other failure is returned immediately.
///
/// Requests to the same route are not queued behind each other beyond the ratelimit wait they
/// share, so callers that need ordering must await their requests in order.
pub struct Http {
    executor: Arc<Executor>,
    ratelimiter: Arc<Ratelimiter>,
    sleeper: Arc<dyn Sleeper>,
    token: RwLock<SecretString>,
    retries: u32,
}

impl std::fmt::Debug for Http {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http")
            .field("executor", &self.executor)
            .field("ratelimiter", &self.ratelimiter)
            .field("sleeper", &self.sleeper)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl Http {
    /// Creates a client with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`HttpBuilder::build`].
    pub fn new(token: &str) -> Result<Self> {
        HttpBuilder::new(token).build()
    }

    /// Replaces the token. Attempts started after this, including retries of requests already
    /// in progress, use the new token.
    pub fn set_token(&self, token: &str) {
        *self.token.write() = SecretString::new(parse_token(token));
    }

    /// The ratelimiter shared by every request made through this client.
    #[must_use]
    pub fn ratelimiter(&self) -> &Ratelimiter {
        &self.ratelimiter
    }

    /// The total number of attempts made for a request.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn current_token(&self) -> Option<SecretString> {
        let token = self.token.read();
        let token = token.expose_secret();
        (!token.is_empty()).then(|| SecretString::new(token.clone()))
    }

    /// Performs a request, retrying it as needed, and returns the successful response as is.
    ///
    /// Dropping the returned future cancels the request. If an attempt is in flight at that
    /// point, it still runs to completion so its ratelimit headers are recorded, but its result
    /// is discarded.
    ///
    /// # Errors
    ///
    /// - [`HttpError::InvalidRequest`] if the request is malformed. Nothing is sent.
    /// - [`HttpError::UnsuccessfulRequest`] for a 4xx other than 429 or a 5xx other than 500,
    ///   502, 503 and 504, without retrying, or for the last of those once the attempts are spent.
    /// - [`HttpError::RateLimited`] if the last attempt was ratelimited.
    /// - [`HttpError::Request`] or [`HttpError::Timeout`] if the last attempt got no response.
    #[cfg_attr(feature = "tracing_instrument", instrument(skip(self)))]
    pub async fn execute_raw(&self, request: Request) -> Result<RawResponse> {
        request.validate().map_err(HttpError::from)?;

        let request = Arc::new(request);
        let key = request.route_key().clone();
        let mut attempts = 0;
        let mut state = RequestState::Waiting;

        loop {
            state = match state {
                RequestState::Waiting => {
                    let wait = self.ratelimiter.reserve(&key);
                    if wait.is_zero() {
                        RequestState::InFlight
                    } else {
                        // The wait may have changed while sleeping, so check it again.
                        self.sleeper.sleep(wait).await;
                        RequestState::Waiting
                    }
                },
                RequestState::InFlight => {
                    attempts += 1;
                    match self.attempt(Arc::clone(&request)).await? {
                        AttemptOutcome::Success(response) => RequestState::Done(response),
                        AttemptOutcome::Retryable(why) if attempts < self.retries => {
                            RequestState::Retrying(why)
                        },
                        AttemptOutcome::Retryable(why) => {
                            warn!("{key} failed after {attempts} attempts: {why}");
                            RequestState::Failed(why.into())
                        },
                        AttemptOutcome::Fatal(why) => RequestState::Failed(why),
                    }
                },
                RequestState::Retrying(why) => {
                    debug!("Attempt {attempts} of {key} failed, retrying: {why}");
                    RequestState::Waiting
                },
                RequestState::Done(response) => return Ok(response),
                RequestState::Failed(why) => return Err(why),
            };

            trace!("{key} is {}", state.name());
        }
    }

    /// Runs one attempt in its own task, reading the token as it is now.
    async fn attempt(&self, request: Arc<Request>) -> Result<AttemptOutcome> {
        let executor = Arc::clone(&self.executor);
        let token = self.current_token();

        let handle = tokio::spawn(async move {
            let token = token.as_ref().map(|token| token.expose_secret().as_str());
            executor.attempt(&request, token).await
        });

        match handle.await {
            Ok(outcome) => Ok(outcome),
            Err(why) if why.is_panic() => std::panic::resume_unwind(why.into_panic()),
            Err(_) => Err(HttpError::Aborted.into()),
        }
    }

    /// Performs a request and returns its JSON body, or `None` if the body was empty.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`]. Also returns [`Error::Json`] if a non-empty body isn't JSON.
    pub async fn execute(&self, request: Request) -> Result<Option<Value>> {
        let response = self.execute_raw(request).await?;

        if response.body.is_empty() {
            return Ok(None);
        }

        json::from_slice(&response.body).map(Some)
    }

    /// Fires off a request, deserializing the response body into the given type.
    ///
    /// An empty body is deserialized from `null`, which suits `()` and `Option`s.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`]. Also returns [`Error::Json`] if the body can't be deserialized
    /// into `T`.
    pub async fn fire<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = self.execute_raw(request).await?;

        if response.body.is_empty() {
            json::from_value(Value::Null)
        } else {
            json::from_slice(&response.body)
        }
    }

    /// Performs a request, expecting a successful response with the given status code, and
    /// discards its body.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`]. Also returns [`HttpError::UnsuccessfulRequest`] if the request
    /// succeeded with a different status code.
    pub async fn wind(&self, expected: u16, request: Request) -> Result<()> {
        let method = request.method();
        let url = format!("{}{}", self.executor.base_url(), request.path());

        let response = self.execute_raw(request).await?;
        if response.status.as_u16() == expected {
            return Ok(());
        }

        debug!("Expected {expected}, got {}", response.status);
        Err(HttpError::from(ErrorResponse::from_parts(response.status, method, url, &response.body))
            .into())
    }

    /// Gets a channel.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`].
    pub async fn get_channel(&self, channel_id: ChannelId) -> Result<Value> {
        self.fire(
            Request::builder(
                Route::Channel {
                    channel_id,
                },
                LightMethod::Get,
            )
            .build(),
        )
        .await
    }

    /// Sends a message to a channel, with files if any are given.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`]. Returns [`HttpError::InvalidRequest`] if files are given and
    /// `map` is not a JSON object.
    pub async fn create_message(
        &self,
        channel_id: ChannelId,
        map: Value,
        files: Vec<CreateAttachment>,
    ) -> Result<Value> {
        let request = Request::builder(
            Route::ChannelMessages {
                channel_id,
            },
            LightMethod::Post,
        )
        .json(map)
        .files(files);

        self.fire(request.build()).await
    }

    /// Deletes a message.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`].
    pub async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        audit_log_reason: Option<&str>,
    ) -> Result<()> {
        let mut request = Request::builder(
            Route::ChannelMessage {
                channel_id,
                message_id,
            },
            LightMethod::Delete,
        );
        if let Some(reason) = audit_log_reason {
            request = request.reason(reason);
        }

        self.wind(204, request.build()).await
    }

    /// Creates or replaces the permission overwrite of a role or member in a channel.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`].
    pub async fn create_permission(
        &self,
        channel_id: ChannelId,
        overwrite: &PermissionOverwrite,
        audit_log_reason: Option<&str>,
    ) -> Result<()> {
        let mut request = Request::builder(
            Route::ChannelPermission {
                channel_id,
                target_id: overwrite.target_id(),
            },
            LightMethod::Put,
        )
        .json(json::to_value(overwrite)?);
        if let Some(reason) = audit_log_reason {
            request = request.reason(reason);
        }

        self.wind(204, request.build()).await
    }

    /// Deletes the permission overwrite of a role or member in a channel.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`].
    pub async fn delete_permission(
        &self,
        channel_id: ChannelId,
        target_id: TargetId,
        audit_log_reason: Option<&str>,
    ) -> Result<()> {
        let mut request = Request::builder(
            Route::ChannelPermission {
                channel_id,
                target_id,
            },
            LightMethod::Delete,
        );
        if let Some(reason) = audit_log_reason {
            request = request.reason(reason);
        }

        self.wind(204, request.build()).await
    }

    /// Shows the "typing" indicator in a channel for about 10 seconds.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`].
    pub async fn broadcast_typing(&self, channel_id: ChannelId) -> Result<()> {
        self.wind(
            204,
            Request::builder(
                Route::ChannelTyping {
                    channel_id,
                },
                LightMethod::Post,
            )
            .build(),
        )
        .await
    }

    /// Gets the roles of a guild.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`].
    pub async fn get_guild_roles(&self, guild_id: GuildId) -> Result<Vec<Value>> {
        self.fire(
            Request::builder(
                Route::GuildRoles {
                    guild_id,
                },
                LightMethod::Get,
            )
            .build(),
        )
        .await
    }

    /// Gets a member of a guild.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`].
    pub async fn get_member(&self, guild_id: GuildId, user_id: UserId) -> Result<Value> {
        self.fire(
            Request::builder(
                Route::GuildMember {
                    guild_id,
                    user_id,
                },
                LightMethod::Get,
            )
            .build(),
        )
        .await
    }

    /// Gets the user the token belongs to.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`].
    pub async fn get_current_user(&self) -> Result<Value> {
        self.fire(Request::builder(Route::UserMe, LightMethod::Get).build()).await
    }

    /// Gets the gateway URL along with the recommended shard count and session start limits.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_raw`].
    pub async fn get_gateway_bot(&self) -> Result<Value> {
        self.fire(Request::builder(Route::GatewayBot, LightMethod::Get).build()).await
    }
}

impl AsRef<Http> for Http {
    fn as_ref(&self) -> &Http {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_prefixed() {
        assert_eq!(parse_token("abc"), "Bot abc");
        assert_eq!(parse_token("  abc\n"), "Bot abc");
        assert_eq!(parse_token("Bot abc"), "Bot abc");
        assert_eq!(parse_token("Bearer abc"), "Bearer abc");
        assert_eq!(parse_token(""), "");
    }

    #[test]
    fn token_rotation() {
        let http = HttpBuilder::new("first").build().unwrap();
        assert_eq!(http.current_token().unwrap().expose_secret(), "Bot first");

        http.set_token("Bearer second");
        assert_eq!(http.current_token().unwrap().expose_secret(), "Bearer second");

        http.set_token("");
        assert!(http.current_token().is_none());
    }

    #[test]
    fn zero_retries_still_attempts_once() {
        let http = HttpBuilder::new("token").retries(0).build().unwrap();
        assert_eq!(http.retries(), 1);
    }

    #[test]
    fn states_have_names() {
        assert_eq!(RequestState::Waiting.name(), "waiting");
        assert_eq!(RequestState::Retrying(HttpError::Aborted).name(), "retrying");
    }
}
