//! A set of permissions for a role or user. These can be assigned directly to a role or as a
//! channel's permission overrides.
//!
//! For convenience, methods for each permission are available, which can be used to test if the
//! set of permissions contains a single permission. These methods honour [Administrator]: a set
//! containing it answers `true` for every permission.
//!
//! The effective permissions of a member in a channel are computed with [`compute_permissions`].
//! The calculation goes as follows:
//!
//! - The owner of a guild has every permission;
//! - Otherwise, start from the union of the permissions of the member's roles;
//! - Apply each [`PermissionOverwrite`] targeting one of the member's roles or the member itself,
//! in the order given, first clearing its denied bits and then setting its allowed bits;
//! - If the result contains [Administrator], the member has every permission.
//!
//! **Note**: The platform's own clients apply role overwrites (`@everyone` first) before member
//! overwrites. The resolver does no reordering, so callers wanting that precedence must pass the
//! overwrites in that order.
//!
//! [Administrator]: Permissions::ADMINISTRATOR

use std::fmt;

use serde::de::{Deserializer, Error as DeError, Visitor};
use serde::ser::Serializer;

use super::channel::{PermissionOverwrite, PermissionOverwriteType};
use super::id::{RoleId, UserId};

/// This macro generates the `Permissions::get_permission_names` method and one query method per
/// permission.
///
/// It is invoked by passing the names of all methods used to check for permissions along with
/// their flags and the names displayed inside Discord.
macro_rules! generate_permission_methods {
    {$ ($perm_upper:ident, $perm_lower:ident, $name:expr);* $(;)?} => {
        impl Permissions {
            $(
                #[doc = concat!("Shorthand for checking that the set of permissions contains the [", $name, "] permission.")]
                #[doc = ""]
                #[doc = concat!("[", $name, "]: Self::", stringify!($perm_upper))]
                #[must_use]
                pub fn $perm_lower(self) -> bool {
                    has_permission(self, Self::$perm_upper)
                }
            )*

            /// Returns a list of names of all contained permissions.
            #[must_use]
            pub fn get_permission_names(self) -> Vec<&'static str> {
                let mut names = Vec::new();

                $(
                    if self.contains(Self::$perm_upper) {
                        names.push($name);
                    }
                )*

                names
            }
        }
    }
}

bitflags::bitflags! {
    /// A set of permissions that can be assigned to users and roles via
    /// [`PermissionOverwrite`]s, roles globally in a guild, and to guild channels.
    ///
    /// Permission bits extend past bit 32, so the set is backed by a [`u64`].
    ///
    /// [Discord docs](https://discord.com/developers/docs/topics/permissions#permissions-bitwise-permission-flags).
    #[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
    pub struct Permissions: u64 {
        /// Allows for the creation of invites.
        const CREATE_INSTANT_INVITE = 1 << 0;
        /// Allows for the kicking of guild members.
        const KICK_MEMBERS = 1 << 1;
        /// Allows the banning of guild members.
        const BAN_MEMBERS = 1 << 2;
        /// Allows all permissions, bypassing channel permission overwrites.
        const ADMINISTRATOR = 1 << 3;
        /// Allows management and editing of guild channels.
        const MANAGE_CHANNELS = 1 << 4;
        /// Allows management and editing of the guild.
        const MANAGE_GUILD = 1 << 5;
        /// Users with this permission can add new reactions to a message.
        const ADD_REACTIONS = 1 << 6;
        /// Allows viewing a guild's audit logs.
        const VIEW_AUDIT_LOG = 1 << 7;
        /// Allows the use of priority speaking in voice channels.
        const PRIORITY_SPEAKER = 1 << 8;
        /// Allows the user to go live.
        const STREAM = 1 << 9;
        /// Allows guild members to view a channel, which includes reading messages in text
        /// channels and joining voice channels.
        const VIEW_CHANNEL = 1 << 10;
        /// Allows sending messages in a guild channel.
        const SEND_MESSAGES = 1 << 11;
        /// Allows the sending of text-to-speech messages in a channel.
        const SEND_TTS_MESSAGES = 1 << 12;
        /// Allows the deleting of other messages in a guild channel.
        const MANAGE_MESSAGES = 1 << 13;
        /// Links sent by users with this permission will be auto-embedded.
        const EMBED_LINKS = 1 << 14;
        /// Allows uploading of files.
        const ATTACH_FILES = 1 << 15;
        /// Allows the reading of a channel's message history.
        const READ_MESSAGE_HISTORY = 1 << 16;
        /// Allows the usage of the `@everyone` mention, which will notify all users in a channel.
        /// The `@here` mention will also be available, and can be used to mention all non-offline
        /// users.
        const MENTION_EVERYONE = 1 << 17;
        /// Allows the usage of custom emojis from other guilds.
        const USE_EXTERNAL_EMOJIS = 1 << 18;
        /// Allows for viewing guild insights.
        const VIEW_GUILD_INSIGHTS = 1 << 19;
        /// Allows the joining of a voice channel.
        const CONNECT = 1 << 20;
        /// Allows the user to speak in a voice channel.
        const SPEAK = 1 << 21;
        /// Allows the muting of members in a voice channel.
        const MUTE_MEMBERS = 1 << 22;
        /// Allows the deafening of members in a voice channel.
        const DEAFEN_MEMBERS = 1 << 23;
        /// Allows the moving of members from one voice channel to another.
        const MOVE_MEMBERS = 1 << 24;
        /// Allows the usage of voice-activity-detection in a voice channel.
        ///
        /// If this is disabled, then users must use push-to-talk.
        const USE_VAD = 1 << 25;
        /// Allows members to change their own nickname in the guild.
        const CHANGE_NICKNAME = 1 << 26;
        /// Allows members to change other members' nicknames.
        const MANAGE_NICKNAMES = 1 << 27;
        /// Allows management and editing of roles below their own.
        const MANAGE_ROLES = 1 << 28;
        /// Allows management of webhooks.
        const MANAGE_WEBHOOKS = 1 << 29;
        /// Allows for editing and deleting emojis, stickers, and soundboard sounds created by all
        /// users.
        const MANAGE_GUILD_EXPRESSIONS = 1 << 30;
        /// Allows members to use application commands, including slash commands and context menu
        /// commands.
        const USE_APPLICATION_COMMANDS = 1 << 31;
        /// Allows for requesting to speak in stage channels.
        const REQUEST_TO_SPEAK = 1 << 32;
        /// Allows for editing, and deleting scheduled events created by all users.
        const MANAGE_EVENTS = 1 << 33;
        /// Allows for deleting and archiving threads, and viewing all private threads.
        const MANAGE_THREADS = 1 << 34;
        /// Allows for creating threads.
        const CREATE_PUBLIC_THREADS = 1 << 35;
        /// Allows for creating private threads.
        const CREATE_PRIVATE_THREADS = 1 << 36;
        /// Allows the usage of custom stickers from other servers.
        const USE_EXTERNAL_STICKERS = 1 << 37;
        /// Allows for sending messages in threads
        const SEND_MESSAGES_IN_THREADS = 1 << 38;
        /// Allows for launching activities in a voice channel
        const USE_EMBEDDED_ACTIVITIES = 1 << 39;
        /// Allows for timing out users to prevent them from sending or reacting to messages in
        /// chat and threads, and from speaking in voice and stage channels.
        const MODERATE_MEMBERS = 1 << 40;
        /// Allows for viewing role subscription insights.
        const VIEW_CREATOR_MONETIZATION_ANALYTICS = 1 << 41;
        /// Allows for using soundboard in a voice channel.
        const USE_SOUNDBOARD = 1 << 42;
        /// Allows for creating emojis, stickers, and soundboard sounds, and editing and deleting
        /// those created by the current user.
        const CREATE_GUILD_EXPRESSIONS = 1 << 43;
        /// Allows for creating scheduled events, and editing and deleting those created by the
        /// current user.
        const CREATE_EVENTS = 1 << 44;
        /// Allows the usage of custom soundboard sounds from other servers.
        const USE_EXTERNAL_SOUNDS = 1 << 45;
        /// Allows sending voice messages.
        const SEND_VOICE_MESSAGES = 1 << 46;
        /// Allows setting the status of a voice channel.
        const SET_VOICE_CHANNEL_STATUS = 1 << 48;
        /// Allows sending polls.
        const SEND_POLLS = 1 << 49;
        /// Allows user-installed apps to send public responses.
        const USE_EXTERNAL_APPS = 1 << 50;
    }
}

generate_permission_methods! {
    CREATE_INSTANT_INVITE, create_instant_invite, "Create Invites";
    KICK_MEMBERS, kick_members, "Kick Members";
    BAN_MEMBERS, ban_members, "Ban Members";
    ADMINISTRATOR, administrator, "Administrator";
    MANAGE_CHANNELS, manage_channels, "Manage Channels";
    MANAGE_GUILD, manage_guild, "Manage Guild";
    ADD_REACTIONS, add_reactions, "Add Reactions";
    VIEW_AUDIT_LOG, view_audit_log, "View Audit Log";
    PRIORITY_SPEAKER, priority_speaker, "Priority Speaker";
    STREAM, stream, "Stream";
    VIEW_CHANNEL, view_channel, "View Channel";
    SEND_MESSAGES, send_messages, "Send Messages";
    SEND_TTS_MESSAGES, send_tts_messages, "Send TTS Messages";
    MANAGE_MESSAGES, manage_messages, "Manage Messages";
    EMBED_LINKS, embed_links, "Embed Links";
    ATTACH_FILES, attach_files, "Attach Files";
    READ_MESSAGE_HISTORY, read_message_history, "Read Message History";
    MENTION_EVERYONE, mention_everyone, "Mention Everyone";
    USE_EXTERNAL_EMOJIS, use_external_emojis, "Use External Emojis";
    VIEW_GUILD_INSIGHTS, view_guild_insights, "View Guild Insights";
    CONNECT, connect, "Connect";
    SPEAK, speak, "Speak";
    MUTE_MEMBERS, mute_members, "Mute Members";
    DEAFEN_MEMBERS, deafen_members, "Deafen Members";
    MOVE_MEMBERS, move_members, "Move Members";
    USE_VAD, use_vad, "Use Voice Activity";
    CHANGE_NICKNAME, change_nickname, "Change Nickname";
    MANAGE_NICKNAMES, manage_nicknames, "Manage Nicknames";
    MANAGE_ROLES, manage_roles, "Manage Roles";
    MANAGE_WEBHOOKS, manage_webhooks, "Manage Webhooks";
    MANAGE_GUILD_EXPRESSIONS, manage_guild_expressions, "Manage Guild Expressions";
    USE_APPLICATION_COMMANDS, use_application_commands, "Use Application Commands";
    REQUEST_TO_SPEAK, request_to_speak, "Request To Speak";
    MANAGE_EVENTS, manage_events, "Manage Events";
    MANAGE_THREADS, manage_threads, "Manage Threads";
    CREATE_PUBLIC_THREADS, create_public_threads, "Create Public Threads";
    CREATE_PRIVATE_THREADS, create_private_threads, "Create Private Threads";
    USE_EXTERNAL_STICKERS, use_external_stickers, "Use External Stickers";
    SEND_MESSAGES_IN_THREADS, send_messages_in_threads, "Send Messages in Threads";
    USE_EMBEDDED_ACTIVITIES, use_embedded_activities, "Use Embedded Activities";
    MODERATE_MEMBERS, moderate_members, "Moderate Members";
    VIEW_CREATOR_MONETIZATION_ANALYTICS, view_creator_monetization_analytics, "View Creator Monetization Analytics";
    USE_SOUNDBOARD, use_soundboard, "Use Soundboard";
    CREATE_GUILD_EXPRESSIONS, create_guild_expressions, "Create Guild Expressions";
    CREATE_EVENTS, create_events, "Create Events";
    USE_EXTERNAL_SOUNDS, use_external_sounds, "Use External Sounds";
    SEND_VOICE_MESSAGES, send_voice_messages, "Send Voice Messages";
    SET_VOICE_CHANNEL_STATUS, set_voice_channel_status, "Set Voice Channel Status";
    SEND_POLLS, send_polls, "Send Polls";
    USE_EXTERNAL_APPS, use_external_apps, "Use External Apps";
}

impl Permissions {
    /// Every bit of the field set, including bits not named by this version.
    ///
    /// Owners and administrators resolve to this rather than [`Permissions::all`], so permissions
    /// added to the platform later are granted to them too.
    pub const EVERYTHING: Self = Self::from_bits_retain(u64::MAX);
}

impl Default for Permissions {
    fn default() -> Self {
        Self::empty()
    }
}

/// Computes the effective permissions of a member in a channel.
///
/// `base` is the union of the permissions of the member's roles, `@everyone` included. Each
/// overwrite whose target is one of `member_roles` or `member_id` is applied in slice order.
///
/// The result is never cached; callers holding on to it are responsible for refreshing it.
///
/// # Examples
///
/// ```rust
/// use serenade::model::channel::{PermissionOverwrite, PermissionOverwriteType};
/// use serenade::model::id::{RoleId, UserId};
/// use serenade::model::permissions::{compute_permissions, Permissions};
///
/// let muted = RoleId::new(2);
/// let overwrites = [PermissionOverwrite {
///     allow: Permissions::empty(),
///     deny: Permissions::SEND_MESSAGES,
///     kind: PermissionOverwriteType::Role(muted),
/// }];
///
/// let perms = compute_permissions(
///     Permissions::SEND_MESSAGES | Permissions::VIEW_CHANNEL,
///     &overwrites,
///     &[muted],
///     UserId::new(1),
///     false,
/// );
/// assert!(!perms.send_messages());
/// assert!(perms.view_channel());
/// ```
#[must_use]
pub fn compute_permissions(
    base: Permissions,
    overwrites: &[PermissionOverwrite],
    member_roles: &[RoleId],
    member_id: UserId,
    is_owner: bool,
) -> Permissions {
    if is_owner {
        return Permissions::EVERYTHING;
    }

    let mut permissions = base;

    for overwrite in overwrites {
        let applies = match overwrite.kind {
            PermissionOverwriteType::Role(role_id) => member_roles.contains(&role_id),
            PermissionOverwriteType::Member(user_id) => user_id == member_id,
        };

        if applies {
            permissions.remove(overwrite.deny);
            permissions.insert(overwrite.allow);
        }
    }

    // Administrators have all permissions in any channel, even ones an overwrite tried to deny.
    if permissions.contains(Permissions::ADMINISTRATOR) {
        return Permissions::EVERYTHING;
    }

    permissions
}

/// Checks whether `permissions` grants `permission`.
///
/// [Administrator] grants everything, so the check also holds for raw role unions that never went
/// through [`compute_permissions`]. When `permission` contains several bits, all of them must be
/// granted.
///
/// [Administrator]: Permissions::ADMINISTRATOR
#[must_use]
pub fn has_permission(permissions: Permissions, permission: Permissions) -> bool {
    permissions.contains(Permissions::ADMINISTRATOR) || permissions.contains(permission)
}

impl fmt::Display for Permissions {
    /// Generates a comma-separated list of the contained permission names.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.get_permission_names();

        let total = names.len();
        for (i, &name) in names.iter().enumerate() {
            if i > 0 && i != total - 1 {
                f.write_str(", ")?;
            }

            if total > 1 && i == total - 1 {
                f.write_str(" and ")?;
            }

            f.write_str(name)?;
        }

        Ok(())
    }
}

/// Permission values are sent as strings, since they do not fit into a 32-bit integer. Integers
/// are accepted too.
struct PermissionsVisitor;

impl<'de> Visitor<'de> for PermissionsVisitor {
    type Value = Permissions;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a permission bitfield as string or integer")
    }

    fn visit_u64<E: DeError>(self, value: u64) -> Result<Self::Value, E> {
        Ok(Permissions::from_bits_retain(value))
    }

    fn visit_i64<E: DeError>(self, value: i64) -> Result<Self::Value, E> {
        u64::try_from(value)
            .map(Permissions::from_bits_retain)
            .map_err(|_| E::custom("permission bitfield must be positive"))
    }

    fn visit_str<E: DeError>(self, value: &str) -> Result<Self::Value, E> {
        value.parse().map(Permissions::from_bits_retain).map_err(E::custom)
    }
}

impl<'de> serde::Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PermissionsVisitor)
    }
}

impl serde::Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLE: RoleId = RoleId::new(1);
    const MEMBER: UserId = UserId::new(7);

    fn role_overwrite(role: RoleId, allow: Permissions, deny: Permissions) -> PermissionOverwrite {
        PermissionOverwrite {
            allow,
            deny,
            kind: PermissionOverwriteType::Role(role),
        }
    }

    fn member_overwrite(user: UserId, allow: Permissions, deny: Permissions) -> PermissionOverwrite {
        PermissionOverwrite {
            allow,
            deny,
            kind: PermissionOverwriteType::Member(user),
        }
    }

    #[test]
    fn owner_bypasses_everything() {
        let perms = compute_permissions(Permissions::empty(), &[], &[], MEMBER, true);
        assert_eq!(perms, Permissions::EVERYTHING);
        assert!(perms.contains(Permissions::all()));

        let deny_all = [member_overwrite(MEMBER, Permissions::empty(), Permissions::EVERYTHING)];
        let perms = compute_permissions(Permissions::empty(), &deny_all, &[], MEMBER, true);
        assert_eq!(perms, Permissions::EVERYTHING);
    }

    #[test]
    fn role_overwrite_denies() {
        let overwrites = [role_overwrite(ROLE, Permissions::empty(), Permissions::SEND_MESSAGES)];

        let perms =
            compute_permissions(Permissions::SEND_MESSAGES, &overwrites, &[ROLE], MEMBER, false);
        assert!(!perms.contains(Permissions::SEND_MESSAGES));
        assert_eq!(perms.bits(), 0);
    }

    #[test]
    fn member_overwrite_allows_from_empty_base() {
        let overwrites = [member_overwrite(MEMBER, Permissions::SEND_MESSAGES, Permissions::empty())];

        let perms = compute_permissions(Permissions::empty(), &overwrites, &[], MEMBER, false);
        assert_eq!(perms, Permissions::SEND_MESSAGES);
    }

    #[test]
    fn overwrites_for_others_are_skipped() {
        let overwrites = [
            role_overwrite(RoleId::new(2), Permissions::empty(), Permissions::SEND_MESSAGES),
            member_overwrite(UserId::new(8), Permissions::empty(), Permissions::SEND_MESSAGES),
        ];

        let perms =
            compute_permissions(Permissions::SEND_MESSAGES, &overwrites, &[ROLE], MEMBER, false);
        assert_eq!(perms, Permissions::SEND_MESSAGES);
    }

    #[test]
    fn overwrites_apply_in_given_order() {
        let role = role_overwrite(ROLE, Permissions::empty(), Permissions::ATTACH_FILES);
        let member = member_overwrite(MEMBER, Permissions::ATTACH_FILES, Permissions::empty());

        let perms =
            compute_permissions(Permissions::empty(), &[role.clone(), member.clone()], &[ROLE], MEMBER, false);
        assert!(perms.attach_files());

        let perms = compute_permissions(Permissions::empty(), &[member, role], &[ROLE], MEMBER, false);
        assert!(!perms.attach_files());
    }

    #[test]
    fn administrator_is_promoted_after_overwrites() {
        let overwrites = [role_overwrite(ROLE, Permissions::empty(), Permissions::SEND_MESSAGES)];
        let base = Permissions::ADMINISTRATOR | Permissions::SEND_MESSAGES;

        let perms = compute_permissions(base, &overwrites, &[ROLE], MEMBER, false);
        assert_eq!(perms, Permissions::EVERYTHING);

        let grant = [member_overwrite(MEMBER, Permissions::ADMINISTRATOR, Permissions::empty())];
        let perms = compute_permissions(Permissions::empty(), &grant, &[], MEMBER, false);
        assert_eq!(perms, Permissions::EVERYTHING);
    }

    #[test]
    fn owner_and_administrator_keep_bits_past_named_ones() {
        let owner = compute_permissions(Permissions::empty(), &[], &[], MEMBER, true);
        assert!(owner.set_voice_channel_status());
        assert!(owner.contains(Permissions::from_bits_retain(1 << 47)));
        assert!(owner.contains(Permissions::from_bits_retain(1 << 53)));

        let base = Permissions::ADMINISTRATOR | Permissions::from_bits_retain(1 << 53);
        let admin = compute_permissions(base, &[], &[], MEMBER, false);
        assert!(admin.contains(base));
        assert!(admin.contains(Permissions::SET_VOICE_CHANNEL_STATUS));
        assert_eq!(admin.bits(), u64::MAX);
        assert_eq!(serde_json::to_string(&admin).unwrap(), "\"18446744073709551615\"");
    }

    #[test]
    fn administrator_short_circuits_queries() {
        for bit in Permissions::all().iter() {
            assert!(has_permission(Permissions::ADMINISTRATOR, bit));
        }

        assert!(Permissions::ADMINISTRATOR.manage_roles());
        assert!(has_permission(Permissions::SEND_MESSAGES, Permissions::SEND_MESSAGES));
        assert!(!has_permission(Permissions::SEND_MESSAGES, Permissions::MANAGE_ROLES));
        assert!(!has_permission(
            Permissions::SEND_MESSAGES,
            Permissions::SEND_MESSAGES | Permissions::ATTACH_FILES
        ));
    }

    #[test]
    fn high_bits_survive() {
        let base = Permissions::USE_EXTERNAL_APPS | Permissions::SEND_POLLS;
        let perms = compute_permissions(base, &[], &[], MEMBER, false);
        assert_eq!(perms.bits(), (1 << 50) | (1 << 49));

        // Bits not known to this version are kept through overwrite application.
        let unknown = Permissions::from_bits_retain(1 << 60);
        let overwrites = [role_overwrite(ROLE, Permissions::empty(), Permissions::SEND_MESSAGES)];
        let perms = compute_permissions(unknown, &overwrites, &[ROLE], MEMBER, false);
        assert_eq!(perms.bits(), 1 << 60);
    }

    #[test]
    fn serde_as_string() {
        let perms: Permissions = serde_json::from_str("\"2048\"").unwrap();
        assert_eq!(perms, Permissions::SEND_MESSAGES);

        let perms: Permissions = serde_json::from_str("2048").unwrap();
        assert_eq!(perms, Permissions::SEND_MESSAGES);

        let large = Permissions::USE_EXTERNAL_APPS;
        assert_eq!(serde_json::to_string(&large).unwrap(), "\"1125899906842624\"");
    }

    #[test]
    fn display_names() {
        let perms = Permissions::SEND_MESSAGES | Permissions::ADD_REACTIONS | Permissions::SPEAK;
        assert_eq!(perms.to_string(), "Add Reactions, Send Messages and Speak");
        assert_eq!(Permissions::empty().to_string(), "");
    }
}
