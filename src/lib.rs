//! Serenade is a REST core for the Discord API and API-compatible chat platforms.
//!
//! It covers the two parts of a client SDK where mistakes are the most expensive:
//!
//! - **Rate-limit aware request scheduling**: every request goes through the [`Http`] request
//!   manager, which consults the [`Ratelimiter`] before sending, retries rate limited, server and
//!   network failures within a configured budget, and surfaces everything else immediately.
//! - **Permission computation**: [`compute_permissions`] resolves the effective [`Permissions`]
//!   of a member in a channel from their role permissions, the channel's
//!   [`PermissionOverwrite`]s and owner status.
//!
//! Gateway connections, voice, caching and the mapping of API payloads into rich model types are
//! out of scope: responses are handed back as JSON [`Value`]s (or deserialized into whatever type
//! the caller asks for via [`Http::fire`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use serenade::http::{HttpBuilder, LightMethod, Request, Route};
//! use serenade::model::id::ChannelId;
//!
//! # async fn run() -> serenade::Result<()> {
//! let http = HttpBuilder::new("my-bot-token").retries(5).build()?;
//!
//! let channel_id = ChannelId::new(381880193700069377);
//! let request = Request::builder(Route::ChannelMessages { channel_id }, LightMethod::Post)
//!     .json(serenade::json::json!({ "content": "hello" }))
//!     .build();
//!
//! let message = http.execute(request).await?;
//! println!("{message:?}");
//! # Ok(())
//! # }
//! ```
//!
//! [`Http`]: crate::http::Http
//! [`Http::fire`]: crate::http::Http::fire
//! [`Ratelimiter`]: crate::http::Ratelimiter
//! [`compute_permissions`]: crate::model::permissions::compute_permissions
//! [`Permissions`]: crate::model::permissions::Permissions
//! [`PermissionOverwrite`]: crate::model::channel::PermissionOverwrite
//! [`Value`]: crate::json::Value
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![forbid(unsafe_code)]
#![warn(
    unused,
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::clone_on_ref_ptr,
    clippy::non_ascii_literal,
    clippy::fallible_impl_from,
    clippy::let_underscore_must_use,
    clippy::format_push_string,
    clippy::pedantic
)]
#![allow(
    // Allowed as they are too pedantic
    clippy::cast_possible_truncation,
    clippy::module_name_repetitions,
    clippy::unreadable_literal,
    clippy::cast_possible_wrap,
    clippy::wildcard_imports,
    clippy::cast_sign_loss,
    clippy::too_many_lines,
    clippy::doc_markdown,
    clippy::missing_panics_doc,
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

#[macro_use]
extern crate serde;

#[cfg(feature = "tracing_instrument")]
#[macro_use]
extern crate tracing;

mod internal;

pub mod constants;
pub mod json;
pub mod model;
pub mod prelude;

#[cfg(feature = "http")]
pub mod builder;
#[cfg(feature = "http")]
pub mod http;

mod error;

pub use crate::error::{Error, Result};

// Re-exports of crates used internally which are already publically exposed.
pub use async_trait::async_trait;
pub use {futures, nonmax};
