//! Tracking of ratelimit state, per route and globally.
//!
//! Every response carrying a full set of `X-RateLimit-Limit`, `X-RateLimit-Remaining` and
//! `X-RateLimit-Reset` headers updates the bucket of its [`RouteKey`]; a 429 forces the bucket
//! (or, for a global limit, the whole client) to wait out its `Retry-After`. Before each attempt,
//! the request manager asks the [`Ratelimiter`] how long it has to wait.
//!
//! # Examples
//!
//! A bucket that ran dry keeps requests waiting until its reset time:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use serenade::http::{LightMethod, ManualClock, Ratelimiter, RouteKey};
//!
//! let clock = Arc::new(ManualClock::new(1_000_000));
//! let ratelimiter = Ratelimiter::new(clock.clone());
//! let key = RouteKey::new(LightMethod::Get, "/channels/7/messages");
//!
//! // limit 5, none remaining, resetting 2 seconds from now
//! ratelimiter.update_bucket(&key, 5, 0, 1_002.0);
//! assert_eq!(ratelimiter.wait_time(&key), Duration::from_secs(2));
//!
//! clock.advance(Duration::from_secs(2));
//! assert_eq!(ratelimiter.wait_time(&key), Duration::ZERO);
//! ```

use std::fmt;
use std::str::{self, FromStr};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use reqwest::header::HeaderMap;
use tracing::{debug, warn};

use super::{Clock, HttpError, LightMethod, RouteKey, SystemClock};
use crate::internal::prelude::*;

/// Passed to the [`Ratelimiter::set_ratelimit_callback`] callback whenever a request has to wait,
/// either pre-emptively or because the API answered with a 429.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct RatelimitInfo {
    pub timeout: Duration,
    pub limit: i64,
    pub method: LightMethod,
    pub path: String,
    pub global: bool,
}

/// Ratelimiter for requests to the API.
///
/// This keeps track of ratelimit data for known routes through the [`Ratelimit`] implementation
/// for each route: how many tickets are [`remaining`] until the user needs to wait for the known
/// [`reset`] time, and the [`limit`] of requests that can be made within that time.
///
/// When no tickets are available for some time, then the request waits until that time passes.
/// The mechanism is known as "pre-emptive ratelimiting".
///
/// Occasionally for very high traffic bots, a global ratelimit may be reached which blocks all
/// future requests until the global ratelimit is over, regardless of route.
///
/// Buckets are created the first time a response reports ratelimit state for their route and are
/// never removed. Each bucket is updated under its map entry's lock, so concurrent responses for
/// the same route can't interleave their updates.
///
/// [`limit`]: Ratelimit::limit
/// [`remaining`]: Ratelimit::remaining
/// [`reset`]: Ratelimit::reset
pub struct Ratelimiter {
    routes: DashMap<RouteKey, Ratelimit>,
    global: Mutex<Option<u64>>,
    clock: Arc<dyn Clock>,
    ratelimit_callback: RwLock<Box<dyn Fn(RatelimitInfo) + Send + Sync>>,
}

impl fmt::Debug for Ratelimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ratelimiter")
            .field("routes", &self.routes)
            .field("global", &self.global)
            .field("clock", &self.clock)
            .field("ratelimit_callback", &"Fn(RatelimitInfo)")
            .finish()
    }
}

impl Default for Ratelimiter {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Ratelimiter {
    /// Creates a new ratelimiter reading the time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            routes: DashMap::new(),
            global: Mutex::new(None),
            clock,
            ratelimit_callback: RwLock::new(Box::new(|_| {})),
        }
    }

    /// Sets a callback to be called when a route is rate limited.
    pub fn set_ratelimit_callback(
        &self,
        ratelimit_callback: Box<dyn Fn(RatelimitInfo) + Send + Sync>,
    ) {
        *self.ratelimit_callback.write() = ratelimit_callback;
    }

    /// The routes map of each [`RouteKey`] and their respective ratelimit information.
    ///
    /// See the documentation for [`Ratelimit`] for more information on how the library handles
    /// ratelimiting.
    #[must_use]
    pub fn routes(&self) -> &DashMap<RouteKey, Ratelimit> {
        &self.routes
    }

    /// The current time according to the ratelimiter's clock, in unix milliseconds.
    #[must_use]
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// How long a request to `key` has to wait before it may be sent.
    ///
    /// This is the longer of the global wait and the bucket's wait. A bucket only makes requests
    /// wait while it has no requests remaining and its reset time is still ahead.
    #[must_use]
    pub fn wait_time(&self, key: &RouteKey) -> Duration {
        let now = self.clock.now_millis();
        let global = self.global_wait(now);
        let bucket = self.routes.get(key).map_or(Duration::ZERO, |bucket| bucket.wait(now));

        global.max(bucket)
    }

    /// Like [`Self::wait_time`], but when no wait is needed a request is also taken out of the
    /// bucket, so that concurrent requests to one route don't all spend the same last ticket.
    ///
    /// A bucket whose reset time has passed is refilled to its limit first.
    #[cfg_attr(feature = "tracing_instrument", instrument(skip(self)))]
    pub fn reserve(&self, key: &RouteKey) -> Duration {
        let now = self.clock.now_millis();
        let global = self.global_wait(now);

        if !global.is_zero() {
            debug!("Global ratelimit hit, {key} waits {}ms", global.as_millis());
            self.notify(RatelimitInfo {
                timeout: global,
                limit: 0,
                method: key.method(),
                path: key.template().to_string(),
                global: true,
            });

            return global;
        }

        let Some(mut bucket) = self.routes.get_mut(key) else { return Duration::ZERO };

        if bucket.reset.is_some_and(|reset| reset <= now) {
            bucket.remaining = bucket.limit;
            bucket.reset = None;
        }

        let delay = bucket.wait(now);
        if delay.is_zero() {
            bucket.remaining = bucket.remaining.saturating_sub(1);
            return delay;
        }

        let limit = bucket.limit;
        drop(bucket);

        debug!("Pre-emptive ratelimit on route {key} for {}ms", delay.as_millis());
        self.notify(RatelimitInfo {
            timeout: delay,
            limit,
            method: key.method(),
            path: key.template().to_string(),
            global: false,
        });

        delay
    }

    /// Overwrites the bucket of `key` with a limit, a remaining count and a reset time given in
    /// unix seconds.
    ///
    /// `remaining` is clamped to `limit`. A reset time that is negative or not finite leaves the
    /// bucket untouched.
    pub fn update_bucket(&self, key: &RouteKey, limit: i64, remaining: i64, reset: f64) {
        if !reset.is_finite() || reset < 0.0 {
            warn!("Ignoring invalid ratelimit reset {reset} for {key}");
            return;
        }
        // Saturating float to int cast; rounding keeps `.423` from becoming 422ms.
        let reset = (reset * 1000.0).round() as u64;

        let mut bucket = self.routes.entry(key.clone()).or_default();
        bucket.limit = limit;
        bucket.remaining = remaining.min(limit);
        bucket.reset = Some(reset);
    }

    /// Updates the bucket of `key` from the ratelimit headers of a response.
    ///
    /// The bucket is only updated when all three of `X-RateLimit-Limit`, `X-RateLimit-Remaining`
    /// and `X-RateLimit-Reset` are present and valid; a partial or malformed set is ignored.
    /// Returns whether the bucket was updated.
    pub fn update_from_headers(&self, key: &RouteKey, headers: &HeaderMap) -> bool {
        match parse_ratelimit_headers(headers) {
            Ok((Some(limit), Some(remaining), Some(reset))) => {
                self.update_bucket(key, limit, remaining, reset);
                true
            },
            Ok(_) => false,
            Err(why) => {
                warn!("Ignoring ratelimit headers for {key}: {why}");
                false
            },
        }
    }

    /// Forces the bucket of `key` to wait for `retry_after`, as told by a 429 response.
    pub fn update_from_retry_after(&self, key: &RouteKey, retry_after: Duration) {
        let reset_at = self.clock.now_millis().saturating_add(millis(retry_after));

        let mut bucket = self.routes.entry(key.clone()).or_default();
        bucket.remaining = 0;
        bucket.reset = Some(reset_at);
    }

    /// Records that a request was ratelimited for `retry_after`, globally or on its route, and
    /// lets the ratelimit callback know.
    pub(super) fn ratelimited(&self, key: &RouteKey, retry_after: Duration, global: bool) {
        debug!(
            "Ratelimited {} {key} for {}ms",
            if global { "globally on" } else { "on route" },
            retry_after.as_millis()
        );

        let limit = if global {
            let reset_at = self.clock.now_millis().saturating_add(millis(retry_after));
            self.set_global_reset(reset_at);
            0
        } else {
            self.update_from_retry_after(key, retry_after);
            self.routes.get(key).map_or(0, |bucket| bucket.limit)
        };

        self.notify(RatelimitInfo {
            timeout: retry_after,
            limit,
            method: key.method(),
            path: key.template().to_string(),
            global,
        });
    }

    /// Blocks every route until `reset_at`, in unix milliseconds.
    pub fn set_global_reset(&self, reset_at: u64) {
        *self.global.lock() = Some(reset_at);
    }

    /// The time until which every route is blocked, in unix milliseconds.
    #[must_use]
    pub fn global_reset(&self) -> Option<u64> {
        *self.global.lock()
    }

    fn global_wait(&self, now: u64) -> Duration {
        self.global_reset()
            .map_or(Duration::ZERO, |reset| Duration::from_millis(reset.saturating_sub(now)))
    }

    fn notify(&self, info: RatelimitInfo) {
        (self.ratelimit_callback.read())(info);
    }
}

/// A set of data containing information about the ratelimits for a particular [`RouteKey`],
/// which is stored in the [`Ratelimiter`].
///
/// See the [Discord docs] on ratelimits for more information.
///
/// **Note**: You should _not_ mutate any of the fields, as this can help cause 429s.
///
/// [Discord docs]: https://discord.com/developers/docs/topics/rate-limits
#[derive(Debug)]
pub struct Ratelimit {
    /// The total number of requests that can be made in a period of time.
    limit: i64,
    /// The number of requests remaining in the period of time.
    remaining: i64,
    /// The absolute time in unix milliseconds when the interval resets.
    reset: Option<u64>,
}

impl Ratelimit {
    fn wait(&self, now: u64) -> Duration {
        match self.reset {
            Some(reset) if self.remaining <= 0 && reset > now => Duration::from_millis(reset - now),
            _ => Duration::ZERO,
        }
    }

    /// The total number of requests that can be made in a period of time.
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.limit
    }

    /// The number of requests remaining in the period of time.
    #[must_use]
    pub const fn remaining(&self) -> i64 {
        self.remaining
    }

    /// The absolute time in unix milliseconds when the interval resets.
    #[must_use]
    pub const fn reset(&self) -> Option<u64> {
        self.reset
    }
}

impl Default for Ratelimit {
    fn default() -> Self {
        Self {
            limit: i64::MAX,
            remaining: i64::MAX,
            reset: None,
        }
    }
}

/// Reads how long a 429 asked to wait: the `Retry-After` header if present, else the body's
/// `retry_after`. Both are seconds and may be fractional. Anything unreadable or negative counts
/// as no wait, and numbers past [`MAX_RETRY_AFTER`] are capped to it, so a malformed response can
/// never block a route forever.
#[must_use]
pub fn retry_after(headers: &HeaderMap, body: Option<&Value>) -> Duration {
    let seconds = match parse_header::<f64>(headers, "retry-after") {
        Ok(Some(seconds)) => Some(seconds),
        _ => body.and_then(|body| body.get("retry_after")).and_then(Value::as_f64),
    };

    match seconds {
        Some(s) if s > 0.0 => Duration::from_secs_f64(s.min(MAX_RETRY_AFTER.as_secs_f64())),
        _ => Duration::ZERO,
    }
}

/// The longest wait a single 429 can impose.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60 * 60);

/// Whether a 429 was for the global ratelimit, told by the `X-RateLimit-Global` header or the
/// body's `global` flag.
#[must_use]
pub fn is_global(headers: &HeaderMap, body: Option<&Value>) -> bool {
    headers.contains_key("x-ratelimit-global")
        || body.and_then(|body| body.get("global")).and_then(Value::as_bool).unwrap_or(false)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[allow(clippy::type_complexity)]
fn parse_ratelimit_headers(
    headers: &HeaderMap,
) -> StdResult<(Option<i64>, Option<i64>, Option<f64>), HttpError> {
    Ok((
        parse_header(headers, "x-ratelimit-limit")?,
        parse_header(headers, "x-ratelimit-remaining")?,
        parse_header(headers, "x-ratelimit-reset")?,
    ))
}

fn parse_header<T: FromStr>(headers: &HeaderMap, header: &str) -> StdResult<Option<T>, HttpError> {
    let Some(header) = headers.get(header) else { return Ok(None) };

    let unicode = str::from_utf8(header.as_bytes()).map_err(|_| HttpError::RateLimitUtf8)?;

    let num = unicode.parse().map_err(|_| HttpError::RateLimitI64F64)?;

    Ok(Some(num))
}
