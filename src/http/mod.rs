//! The HTTP module which provides functions for performing requests to endpoints in the API.
//!
//! An important function of the REST API is ratelimiting. Requests to endpoints are ratelimited to
//! prevent spam, and once ratelimited the platform will stop performing requests. The library
//! implements protection to pre-emptively ratelimit, to ensure that no wasted requests are made.
//!
//! Every request passes through three layers:
//!
//! - the [`Ratelimiter`], which tracks per-route buckets and the global limit and answers how
//! long a request must wait;
//! - the [`Executor`], which performs exactly one network attempt and classifies its outcome;
//! - the [`Http`] client, which owns the retry policy: it waits, sends, and retries rate limited,
//! server and network failures up to [`HttpBuilder::retries`] attempts.
//!
//! Errors the API reports as the caller's fault (4xx other than 429) are never retried.

mod client;
mod clock;
mod error;
mod executor;
mod multipart;
pub mod ratelimiting;
mod request;
pub mod routing;

use std::fmt;

use reqwest::Method;

pub use self::client::*;
pub use self::clock::*;
pub use self::error::*;
pub use self::executor::*;
pub use self::multipart::*;
pub use self::ratelimiting::{RatelimitInfo, Ratelimiter};
pub use self::request::*;
pub use self::routing::{Route, RouteKey};

/// An method used for ratelimiting special routes.
///
/// This is needed because [`reqwest`]'s [`Method`] enum does not derive Copy.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LightMethod {
    /// Indicates that a route is for the `DELETE` method only.
    Delete,
    /// Indicates that a route is for the `GET` method only.
    Get,
    /// Indicates that a route is for the `PATCH` method only.
    Patch,
    /// Indicates that a route is for the `POST` method only.
    Post,
    /// Indicates that a route is for the `PUT` method only.
    Put,
}

impl LightMethod {
    #[must_use]
    pub const fn reqwest_method(self) -> Method {
        match self {
            Self::Delete => Method::DELETE,
            Self::Get => Method::GET,
            Self::Patch => Method::PATCH,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Patch => "PATCH",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for LightMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
