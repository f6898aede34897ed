//! A set of exports which can be helpful to use.
//!
//! Note that the `SerenadeError` re-export is equivalent to [`serenade::Error`], although is
//! re-exported as a separate name to remove likely ambiguity with other crate error enums.
//!
//! # Examples
//!
//! Import all of the exports:
//!
//! ```rust
//! use serenade::prelude::*;
//! ```
//!
//! [`serenade::Error`]: crate::Error

pub use crate::error::Error as SerenadeError;
#[cfg(feature = "http")]
pub use crate::http::{Http, HttpBuilder, HttpError, LightMethod, Request, Route};
pub use crate::model::permissions::{compute_permissions, has_permission, Permissions};
