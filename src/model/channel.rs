//! Channel-level permission overwrites.

use serde::de::{Deserializer, Error as DeError};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use super::id::{RoleId, TargetId, UserId};
use super::permissions::Permissions;
use crate::internal::prelude::*;

#[derive(Deserialize)]
#[serde(untagged)]
enum OverwriteKind {
    Int(u8),
    Str(String),
}

#[derive(Deserialize)]
struct PermissionOverwriteData {
    allow: Permissions,
    deny: Permissions,
    id: TargetId,
    #[serde(rename = "type")]
    kind: OverwriteKind,
}

/// A channel-specific permission overwrite for a member or role.
///
/// Overwrites are snapshots of channel configuration; the permission resolver borrows them and
/// never keeps them around.
///
/// [Discord docs](https://discord.com/developers/docs/resources/channel#overwrite-object).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PermissionOverwrite {
    pub allow: Permissions,
    pub deny: Permissions,
    pub kind: PermissionOverwriteType,
}

impl PermissionOverwrite {
    /// The Id of the role or member this overwrite targets.
    #[must_use]
    pub fn target_id(&self) -> TargetId {
        match self.kind {
            PermissionOverwriteType::Member(id) => id.into(),
            PermissionOverwriteType::Role(id) => id.into(),
        }
    }
}

impl<'de> Deserialize<'de> for PermissionOverwrite {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> StdResult<Self, D::Error> {
        let data = PermissionOverwriteData::deserialize(deserializer)?;

        let kind = match data.kind {
            OverwriteKind::Int(0) => PermissionOverwriteType::Role(RoleId::new(data.id.get())),
            OverwriteKind::Int(1) => PermissionOverwriteType::Member(UserId::new(data.id.get())),
            OverwriteKind::Str(kind) if kind == "role" => {
                PermissionOverwriteType::Role(RoleId::new(data.id.get()))
            },
            OverwriteKind::Str(kind) if kind == "member" => {
                PermissionOverwriteType::Member(UserId::new(data.id.get()))
            },
            _ => return Err(DeError::custom("Unknown PermissionOverwriteType")),
        };

        Ok(PermissionOverwrite {
            allow: data.allow,
            deny: data.deny,
            kind,
        })
    }
}

impl Serialize for PermissionOverwrite {
    fn serialize<S: Serializer>(&self, serializer: S) -> StdResult<S::Ok, S::Error> {
        let kind: u8 = match self.kind {
            PermissionOverwriteType::Role(_) => 0,
            PermissionOverwriteType::Member(_) => 1,
        };

        let mut state = serializer.serialize_struct("PermissionOverwrite", 4)?;
        state.serialize_field("allow", &self.allow)?;
        state.serialize_field("deny", &self.deny)?;
        state.serialize_field("id", &self.target_id())?;
        state.serialize_field("type", &kind)?;

        state.end()
    }
}

/// The type of edit being made to a Channel's permissions.
///
/// This is for use with methods such as [`Http::create_permission`].
///
/// [`Http::create_permission`]: crate::http::Http::create_permission
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum PermissionOverwriteType {
    /// A member which is having its permission overwrites edited.
    Member(UserId),
    /// A role which is having its permission overwrites edited.
    Role(RoleId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::{self, json};

    #[test]
    fn deserialize_overwrite() {
        let value = json!({
            "id": "80351110224678912",
            "type": 1,
            "allow": "2048",
            "deny": "0",
        });

        let overwrite: PermissionOverwrite = json::from_value(value).unwrap();
        assert_eq!(overwrite.kind, PermissionOverwriteType::Member(UserId::new(80351110224678912)));
        assert_eq!(overwrite.allow, Permissions::SEND_MESSAGES);
        assert_eq!(overwrite.deny, Permissions::empty());

        let legacy = json!({"id": 4, "type": "role", "allow": 0, "deny": 2048});
        let overwrite: PermissionOverwrite = json::from_value(legacy).unwrap();
        assert_eq!(overwrite.kind, PermissionOverwriteType::Role(RoleId::new(4)));
        assert_eq!(overwrite.deny, Permissions::SEND_MESSAGES);

        let unknown = json!({"id": 4, "type": 7, "allow": 0, "deny": 0});
        assert!(json::from_value::<PermissionOverwrite>(unknown).is_err());
    }

    #[test]
    fn serialize_overwrite() {
        let overwrite = PermissionOverwrite {
            allow: Permissions::VIEW_CHANNEL,
            deny: Permissions::SEND_MESSAGES,
            kind: PermissionOverwriteType::Role(RoleId::new(3)),
        };

        assert_eq!(
            serde_json::to_value(&overwrite).unwrap(),
            json!({"allow": "1024", "deny": "2048", "id": "3", "type": 0})
        );
    }
}
