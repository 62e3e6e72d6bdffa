//! The dispatch event-type registry.
//!
//! A static, append-only mapping from the server's event-name string to a
//! closed [`EventKind`]. Names the registry has never seen map to
//! [`EventKind::Unknown`] so new server-side event kinds never break
//! decoding; subscribers that want everything still see them.
//!
//! Several distinct names deliberately share a payload shape (the
//! auto-moderation rule family, the stage-instance family, …). Consumers
//! must discriminate by [`EventKind`], never by payload shape.

use serde_json::value::RawValue;

macro_rules! event_kinds {
    ($($variant:ident => $name:literal,)*) => {
        /// Kind of a dispatch event, derived from the envelope's `t` field.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventKind {
            $($variant,)*
            /// An event name the registry does not know.
            Unknown,
        }

        impl EventKind {
            /// Look up the kind for a wire event name.
            pub fn from_name(name: &str) -> EventKind {
                match name {
                    $($name => EventKind::$variant,)*
                    _ => EventKind::Unknown,
                }
            }

            /// Canonical wire name, empty for [`EventKind::Unknown`].
            pub fn name(self) -> &'static str {
                match self {
                    $(EventKind::$variant => $name,)*
                    EventKind::Unknown => "",
                }
            }

            /// Every registered kind, in registry order.
            pub const REGISTERED: &'static [EventKind] = &[$(EventKind::$variant,)*];
        }
    };
}

event_kinds! {
    Ready => "READY",
    Resumed => "RESUMED",
    ApplicationCommandPermissionsUpdate => "APPLICATION_COMMAND_PERMISSIONS_UPDATE",
    AutoModerationRuleCreate => "AUTO_MODERATION_RULE_CREATE",
    AutoModerationRuleUpdate => "AUTO_MODERATION_RULE_UPDATE",
    AutoModerationRuleDelete => "AUTO_MODERATION_RULE_DELETE",
    AutoModerationActionExecution => "AUTO_MODERATION_ACTION_EXECUTION",
    ChannelCreate => "CHANNEL_CREATE",
    ChannelUpdate => "CHANNEL_UPDATE",
    ChannelDelete => "CHANNEL_DELETE",
    ChannelPinsUpdate => "CHANNEL_PINS_UPDATE",
    ThreadCreate => "THREAD_CREATE",
    ThreadUpdate => "THREAD_UPDATE",
    ThreadDelete => "THREAD_DELETE",
    ThreadListSync => "THREAD_LIST_SYNC",
    ThreadMemberUpdate => "THREAD_MEMBER_UPDATE",
    ThreadMembersUpdate => "THREAD_MEMBERS_UPDATE",
    EntitlementCreate => "ENTITLEMENT_CREATE",
    EntitlementUpdate => "ENTITLEMENT_UPDATE",
    EntitlementDelete => "ENTITLEMENT_DELETE",
    GuildCreate => "GUILD_CREATE",
    GuildUpdate => "GUILD_UPDATE",
    GuildDelete => "GUILD_DELETE",
    GuildAuditLogEntryCreate => "GUILD_AUDIT_LOG_ENTRY_CREATE",
    GuildBanAdd => "GUILD_BAN_ADD",
    GuildBanRemove => "GUILD_BAN_REMOVE",
    GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE",
    GuildStickersUpdate => "GUILD_STICKERS_UPDATE",
    GuildIntegrationsUpdate => "GUILD_INTEGRATIONS_UPDATE",
    GuildMemberAdd => "GUILD_MEMBER_ADD",
    GuildMemberRemove => "GUILD_MEMBER_REMOVE",
    GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
    GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
    GuildRoleCreate => "GUILD_ROLE_CREATE",
    GuildRoleUpdate => "GUILD_ROLE_UPDATE",
    GuildRoleDelete => "GUILD_ROLE_DELETE",
    GuildScheduledEventCreate => "GUILD_SCHEDULED_EVENT_CREATE",
    GuildScheduledEventUpdate => "GUILD_SCHEDULED_EVENT_UPDATE",
    GuildScheduledEventDelete => "GUILD_SCHEDULED_EVENT_DELETE",
    GuildScheduledEventUserAdd => "GUILD_SCHEDULED_EVENT_USER_ADD",
    GuildScheduledEventUserRemove => "GUILD_SCHEDULED_EVENT_USER_REMOVE",
    IntegrationCreate => "INTEGRATION_CREATE",
    IntegrationUpdate => "INTEGRATION_UPDATE",
    IntegrationDelete => "INTEGRATION_DELETE",
    InteractionCreate => "INTERACTION_CREATE",
    InviteCreate => "INVITE_CREATE",
    InviteDelete => "INVITE_DELETE",
    MessageCreate => "MESSAGE_CREATE",
    MessageUpdate => "MESSAGE_UPDATE",
    MessageDelete => "MESSAGE_DELETE",
    MessageDeleteBulk => "MESSAGE_DELETE_BULK",
    MessageReactionAdd => "MESSAGE_REACTION_ADD",
    MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
    MessageReactionRemoveAll => "MESSAGE_REACTION_REMOVE_ALL",
    MessageReactionRemoveEmoji => "MESSAGE_REACTION_REMOVE_EMOJI",
    PresenceUpdate => "PRESENCE_UPDATE",
    StageInstanceCreate => "STAGE_INSTANCE_CREATE",
    StageInstanceUpdate => "STAGE_INSTANCE_UPDATE",
    StageInstanceDelete => "STAGE_INSTANCE_DELETE",
    TypingStart => "TYPING_START",
    UserUpdate => "USER_UPDATE",
    VoiceServerUpdate => "VOICE_SERVER_UPDATE",
    VoiceStateUpdate => "VOICE_STATE_UPDATE",
    WebhooksUpdate => "WEBHOOKS_UPDATE",
}

/// A decoded dispatch event, handed to subscribers.
///
/// An immutable snapshot: once delivered, the subscriber owns it and the
/// connection holds no reference. The payload stays raw JSON — resource
/// shapes are the application's concern, not the lifecycle's.
#[derive(Debug)]
pub struct DispatchEvent {
    /// Registry kind for the event name.
    pub kind: EventKind,
    /// The wire event name as received (meaningful when `kind` is
    /// [`EventKind::Unknown`]).
    pub name: String,
    /// Sequence number the envelope carried.
    pub seq: Option<u64>,
    /// Raw event payload.
    pub data: Option<Box<RawValue>>,
}
