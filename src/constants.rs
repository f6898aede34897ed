//! A set of constants used by the library.

use std::time::Duration;

/// The API version that the library supports and uses.
pub const API_VERSION: u8 = 10;

/// The base URI of the versioned REST API. Requests are sent to this base unless
/// [`HttpBuilder::base_url`] overrides it.
///
/// [`HttpBuilder::base_url`]: crate::http::HttpBuilder::base_url
pub const API_BASE: &str = "https://discord.com/api/v10";

/// The user agent sent along with every request.
pub const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/serenade-rs/serenade, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// How many attempts a single logical request gets before its last failure is surfaced.
pub const DEFAULT_RETRIES: u32 = 3;

/// Timeout of a single network attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// The first second of 2015, the epoch snowflake timestamps count from, in unix milliseconds.
pub const DISCORD_EPOCH: u64 = 1_420_070_400_000;
