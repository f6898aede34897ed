//! Routes are used for ratelimiting. These are to differentiate between the different _types_ of
//! routes - such as getting the current user's channels - for the most part, with the exception
//! being major parameters.
//!
//! [Taken from] the Discord docs, major parameters are:
//!
//! > Additionally, rate limits take into account major parameters in the URL. For example,
//! > `/channels/:channel_id` and `/channels/:channel_id/messages/:message_id` both take
//! > `channel_id` into account when generating rate limits since it's the major parameter. The
//! > only current major parameters are `channel_id`, `guild_id` and `webhook_id`.
//!
//! A [`RouteKey`] is therefore the HTTP method plus the path _template_ of a request, with major
//! parameters filled in and every other parameter left as `:id`. `GET /channels/10/messages/11`
//! and `GET /channels/10/messages/12` share the key `GET /channels/10/messages/:id` and count
//! towards the same bucket, while `GET /channels/4/messages/7` is keyed separately.
//!
//! [Taken from]: https://discord.com/developers/docs/topics/rate-limits#rate-limits

use std::borrow::Cow;
use std::fmt;

use super::LightMethod;
use crate::model::id::*;

/// Identifies a ratelimit bucket: a method plus a path template.
///
/// Typed [`Route`]s derive their key through [`Route::route_key`]. Requests to endpoints without
/// a [`Route`] variant build one with [`RouteKey::new`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RouteKey {
    method: LightMethod,
    template: Cow<'static, str>,
}

impl RouteKey {
    #[must_use]
    pub fn new(method: LightMethod, template: impl Into<Cow<'static, str>>) -> Self {
        Self {
            method,
            template: template.into(),
        }
    }

    #[must_use]
    pub fn method(&self) -> LightMethod {
        self.method
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

/// A macro for defining routes as well as the bucket template they are ratelimited under. Takes
/// as input a list of route definitions, and generates a definition for the `Route` enum and
/// implements methods on it.
macro_rules! routes {
    ($lt:lifetime, {
        $(
            $name:ident $({ $($field_name:ident: $field_type:ty),* })?,
            $path:literal $(, $path_arg:ident)*;
            $bucket:literal $(, $bucket_arg:ident)*;
        )+
    }) => {
        #[derive(Clone, Copy, Debug)]
        #[non_exhaustive]
        pub enum Route<$lt> {
            $(
                $name $({ $($field_name: $field_type),* })?,
            )+
        }

        impl<$lt> Route<$lt> {
            /// The path of the route relative to the API base, with every parameter filled in.
            #[must_use]
            pub fn path(self) -> String {
                match self {
                    $(
                        Self::$name $({ $($field_name),* })? => format!($path $(, $path_arg)*),
                    )+
                }
            }

            /// The key of the ratelimit bucket this route falls into when requested with `method`.
            #[must_use]
            pub fn route_key(self, method: LightMethod) -> RouteKey {
                #[allow(unused_variables)]
                let template = match self {
                    $(
                        Self::$name $({ $($field_name),* })? => format!($bucket $(, $bucket_arg)*),
                    )+
                };

                RouteKey::new(method, template)
            }
        }
    };
}

// This macro takes as input a list of route definitions, represented in the following way:
// 1. The first line defines an enum variant representing an endpoint.
// 2. The second line provides the path for that endpoint and the fields filling it.
// 3. The third line provides the bucket template, with only the major parameter filled in.
routes! ('a, {
    Channel { channel_id: ChannelId },
    "/channels/{}", channel_id;
    "/channels/{}", channel_id;

    ChannelInvites { channel_id: ChannelId },
    "/channels/{}/invites", channel_id;
    "/channels/{}/invites", channel_id;

    ChannelMessage { channel_id: ChannelId, message_id: MessageId },
    "/channels/{}/messages/{}", channel_id, message_id;
    "/channels/{}/messages/:id", channel_id;

    ChannelMessages { channel_id: ChannelId },
    "/channels/{}/messages", channel_id;
    "/channels/{}/messages", channel_id;

    ChannelMessagesBulkDelete { channel_id: ChannelId },
    "/channels/{}/messages/bulk-delete", channel_id;
    "/channels/{}/messages/bulk-delete", channel_id;

    ChannelPermission { channel_id: ChannelId, target_id: TargetId },
    "/channels/{}/permissions/{}", channel_id, target_id;
    "/channels/{}/permissions/:id", channel_id;

    ChannelPin { channel_id: ChannelId, message_id: MessageId },
    "/channels/{}/pins/{}", channel_id, message_id;
    "/channels/{}/pins/:id", channel_id;

    ChannelPins { channel_id: ChannelId },
    "/channels/{}/pins", channel_id;
    "/channels/{}/pins", channel_id;

    ChannelThreads { channel_id: ChannelId },
    "/channels/{}/threads", channel_id;
    "/channels/{}/threads", channel_id;

    ChannelTyping { channel_id: ChannelId },
    "/channels/{}/typing", channel_id;
    "/channels/{}/typing", channel_id;

    ChannelWebhooks { channel_id: ChannelId },
    "/channels/{}/webhooks", channel_id;
    "/channels/{}/webhooks", channel_id;

    Gateway,
    "/gateway";
    "/gateway";

    GatewayBot,
    "/gateway/bot";
    "/gateway/bot";

    Guild { guild_id: GuildId },
    "/guilds/{}", guild_id;
    "/guilds/{}", guild_id;

    GuildAuditLogs { guild_id: GuildId },
    "/guilds/{}/audit-logs", guild_id;
    "/guilds/{}/audit-logs", guild_id;

    GuildBan { guild_id: GuildId, user_id: UserId },
    "/guilds/{}/bans/{}", guild_id, user_id;
    "/guilds/{}/bans/:id", guild_id;

    GuildBans { guild_id: GuildId },
    "/guilds/{}/bans", guild_id;
    "/guilds/{}/bans", guild_id;

    GuildChannels { guild_id: GuildId },
    "/guilds/{}/channels", guild_id;
    "/guilds/{}/channels", guild_id;

    GuildMember { guild_id: GuildId, user_id: UserId },
    "/guilds/{}/members/{}", guild_id, user_id;
    "/guilds/{}/members/:id", guild_id;

    GuildMemberRole { guild_id: GuildId, user_id: UserId, role_id: RoleId },
    "/guilds/{}/members/{}/roles/{}", guild_id, user_id, role_id;
    "/guilds/{}/members/:id/roles/:id", guild_id;

    GuildMembers { guild_id: GuildId },
    "/guilds/{}/members", guild_id;
    "/guilds/{}/members", guild_id;

    GuildRole { guild_id: GuildId, role_id: RoleId },
    "/guilds/{}/roles/{}", guild_id, role_id;
    "/guilds/{}/roles/:id", guild_id;

    GuildRoles { guild_id: GuildId },
    "/guilds/{}/roles", guild_id;
    "/guilds/{}/roles", guild_id;

    Guilds,
    "/guilds";
    "/guilds";

    InteractionResponse { interaction_id: InteractionId, token: &'a str },
    "/interactions/{}/{}/callback", interaction_id, token;
    "/interactions/{}/:token/callback", interaction_id;

    Commands { application_id: ApplicationId },
    "/applications/{}/commands", application_id;
    "/applications/{}/commands", application_id;

    GuildCommands { application_id: ApplicationId, guild_id: GuildId },
    "/applications/{}/guilds/{}/commands", application_id, guild_id;
    "/applications/{}/guilds/:id/commands", application_id;

    User { user_id: UserId },
    "/users/{}", user_id;
    "/users/:id";

    UserMe,
    "/users/@me";
    "/users/@me";

    UserMeDmChannels,
    "/users/@me/channels";
    "/users/@me/channels";

    UserMeGuilds,
    "/users/@me/guilds";
    "/users/@me/guilds";

    Webhook { webhook_id: WebhookId },
    "/webhooks/{}", webhook_id;
    "/webhooks/{}", webhook_id;

    WebhookWithToken { webhook_id: WebhookId, token: &'a str },
    "/webhooks/{}/{}", webhook_id, token;
    "/webhooks/{}/:token", webhook_id;

    WebhookMessage { webhook_id: WebhookId, token: &'a str, message_id: MessageId },
    "/webhooks/{}/{}/messages/{}", webhook_id, token, message_id;
    "/webhooks/{}/:token/messages/:id", webhook_id;
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_parameters_share_a_bucket() {
        let channel_id = ChannelId::new(10);
        let first = Route::ChannelMessage {
            channel_id,
            message_id: MessageId::new(11),
        };
        let second = Route::ChannelMessage {
            channel_id,
            message_id: MessageId::new(12),
        };

        assert_eq!(first.path(), "/channels/10/messages/11");
        assert_eq!(second.path(), "/channels/10/messages/12");
        assert_eq!(first.route_key(LightMethod::Get), second.route_key(LightMethod::Get));
        assert_eq!(
            first.route_key(LightMethod::Get).to_string(),
            "GET /channels/10/messages/:id"
        );
    }

    #[test]
    fn major_parameters_split_buckets() {
        let first = Route::ChannelMessages {
            channel_id: ChannelId::new(4),
        };
        let second = Route::ChannelMessages {
            channel_id: ChannelId::new(5),
        };

        assert_ne!(first.route_key(LightMethod::Post), second.route_key(LightMethod::Post));
    }

    #[test]
    fn methods_split_buckets() {
        let route = Route::Channel {
            channel_id: ChannelId::new(4),
        };

        assert_ne!(route.route_key(LightMethod::Get), route.route_key(LightMethod::Patch));
    }

    #[test]
    fn tokens_stay_out_of_keys() {
        let route = Route::WebhookWithToken {
            webhook_id: WebhookId::new(3),
            token: "s3cr3t",
        };

        assert_eq!(route.path(), "/webhooks/3/s3cr3t");
        assert_eq!(route.route_key(LightMethod::Post).template(), "/webhooks/3/:token");
    }
}
