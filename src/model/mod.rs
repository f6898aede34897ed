//! Mappings of the platform's objects needed by the request core and the permission resolver.
//!
//! Only ids, permission bitfields and channel permission overwrites live here. Richer payloads are
//! returned as JSON [`Value`]s by the [`http`] module, or deserialized into caller-provided types.
//!
//! [`Value`]: crate::json::Value
//! [`http`]: crate::http

pub mod channel;
pub mod id;
pub mod permissions;

pub mod prelude {
    //! The model prelude re-exports all types in the model sub-modules.
    //!
    //! This allows for quick and easy access to all of the model types.
    //!
    //! # Examples
    //!
    //! Import all model types into scope:
    //!
    //! ```rust,no_run
    //! use serenade::model::prelude::*;
    //! ```

    #[doc(inline)]
    pub use super::{channel::*, id::*, permissions::*};
}

pub use self::permissions::Permissions;
