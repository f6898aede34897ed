//! A collection of newtypes defining type-strong IDs.

use std::fmt;

use nonmax::NonMaxU64;
use serde::de::{Deserializer, Error as DeError, Visitor};
use serde::ser::Serializer;

use crate::constants::DISCORD_EPOCH;

macro_rules! id_u64 {
    ($($name:ident;)*) => {
        $(
            impl $name {
                #[doc = concat!("Creates a new ", stringify!($name), " from a u64.")]
                /// # Panics
                /// Panics if `id` is u64::MAX.
                #[inline]
                #[must_use]
                #[track_caller]
                pub const fn new(id: u64) -> Self {
                    match NonMaxU64::new(id) {
                        Some(inner) => Self(inner),
                        None => panic!(concat!("Attempted to call ", stringify!($name), "::new with invalid (u64::MAX) value"))
                    }
                }

                /// Retrieves the inner `id` as a [`u64`].
                #[inline]
                #[must_use]
                pub const fn get(self) -> u64 {
                    self.0.get()
                }

                /// Retrieves the time that the Id was created at, in unix milliseconds.
                #[must_use]
                pub const fn created_at(self) -> u64 {
                    (self.get() >> 22) + DISCORD_EPOCH
                }
            }

            impl From<u64> for $name {
                fn from(id: u64) -> $name {
                    $name::new(id)
                }
            }

            impl From<$name> for u64 {
                fn from(id: $name) -> u64 {
                    id.get()
                }
            }

            impl PartialEq<u64> for $name {
                fn eq(&self, u: &u64) -> bool {
                    self.get() == *u
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Display::fmt(&self.get(), f)
                }
            }

            impl<'de> serde::Deserialize<'de> for $name {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let id = deserializer.deserialize_any(SnowflakeVisitor)?;
                    NonMaxU64::new(id).map(Self).ok_or_else(|| DeError::custom("invalid snowflake"))
                }
            }

            impl serde::Serialize for $name {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(&self.get())
                }
            }
        )*
    }
}

/// An identifier for an Application.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ApplicationId(NonMaxU64);

/// An identifier for a Channel
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ChannelId(NonMaxU64);

/// An identifier for a Guild
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct GuildId(NonMaxU64);

/// An identifier for an Interaction
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct InteractionId(NonMaxU64);

/// An identifier for a Message
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct MessageId(NonMaxU64);

/// An identifier for a Role
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct RoleId(NonMaxU64);

/// An identifier for a User
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct UserId(NonMaxU64);

/// An identifier for a webhook.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct WebhookId(NonMaxU64);

/// An identifier for the target of a [`PermissionOverwrite`]: either a [`RoleId`] or a
/// [`UserId`].
///
/// [`PermissionOverwrite`]: super::channel::PermissionOverwrite
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TargetId(NonMaxU64);

id_u64! {
    ApplicationId;
    ChannelId;
    GuildId;
    InteractionId;
    MessageId;
    RoleId;
    UserId;
    WebhookId;
    TargetId;
}

impl From<RoleId> for TargetId {
    fn from(id: RoleId) -> TargetId {
        TargetId(id.0)
    }
}

impl From<UserId> for TargetId {
    fn from(id: UserId) -> TargetId {
        TargetId(id.0)
    }
}

impl From<GuildId> for RoleId {
    /// The `@everyone` role of a guild shares the guild's Id.
    fn from(id: GuildId) -> RoleId {
        RoleId(id.0)
    }
}

/// Snowflakes are sent as strings by the API, but integers are accepted too.
struct SnowflakeVisitor;

impl<'de> Visitor<'de> for SnowflakeVisitor {
    type Value = u64;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a string or integer snowflake")
    }

    fn visit_i64<E: DeError>(self, value: i64) -> Result<Self::Value, E> {
        u64::try_from(value).map_err(|_| E::custom("snowflake must be positive"))
    }

    fn visit_u64<E: DeError>(self, value: u64) -> Result<Self::Value, E> {
        Ok(value)
    }

    fn visit_str<E: DeError>(self, value: &str) -> Result<Self::Value, E> {
        value.parse().map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelId, GuildId, RoleId, TargetId, UserId};

    #[test]
    fn test_created_at() {
        // The id is from discord's snowflake docs
        let id = GuildId::new(175928847299117063);
        assert_eq!(id.created_at(), 1462015105796);
    }

    #[test]
    fn test_id_serde() {
        let id: ChannelId = serde_json::from_str("\"381880193700069377\"").unwrap();
        assert_eq!(id, 381880193700069377);

        let id: ChannelId = serde_json::from_str("381880193700069377").unwrap();
        assert_eq!(id, ChannelId::new(381880193700069377));

        assert_eq!(serde_json::to_string(&id).unwrap(), "\"381880193700069377\"");
        assert!(serde_json::from_str::<ChannelId>("\"abc\"").is_err());
        assert!(serde_json::from_str::<ChannelId>("-4").is_err());
    }

    #[test]
    fn test_conversions() {
        let guild_id = GuildId::new(7);
        assert_eq!(RoleId::from(guild_id).get(), 7);
        assert_eq!(TargetId::from(UserId::new(9)), TargetId::new(9));
    }
}
