//! Typed payloads for each channel.
//!
//! Field names are camelCase on the wire. Payloads only carry what control
//! flow needs; game-specific meaning stays with the callers.

use serde::{Deserialize, Serialize};

use super::channels;
use super::types::PlayerId;

/// A payload that knows which channel and envelope `type` it travels under.
pub trait ChannelPayload: Serialize {
    fn channel(&self) -> &'static str;
    fn kind(&self) -> &'static str;
}

macro_rules! fixed_channel {
    ($ty:ty, $channel:expr, $kind:expr) => {
        impl ChannelPayload for $ty {
            fn channel(&self) -> &'static str {
                $channel
            }

            fn kind(&self) -> &'static str {
                $kind
            }
        }
    };
}

// =============================================================================
// Chat
// =============================================================================

/// Which side of the bridge a chat line originated from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatSource {
    #[default]
    Minecraft,
    Discord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Not on the wire; receivers learn the source from the channel.
    #[serde(skip)]
    pub source: ChatSource,
    pub server: String,
    pub player: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<PlayerId>,
    pub message: String,
    pub timestamp: i64,
}

impl ChannelPayload for ChatMessage {
    fn channel(&self) -> &'static str {
        match self.source {
            ChatSource::Minecraft => channels::CHAT_MINECRAFT,
            ChatSource::Discord => channels::CHAT_DISCORD,
        }
    }

    fn kind(&self) -> &'static str {
        "chat"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossServerChat {
    pub origin_server: String,
    pub player: String,
    pub uuid: PlayerId,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    pub message: String,
    pub message_id: String,
    pub timestamp: i64,
}

fixed_channel!(CrossServerChat, channels::CHAT_CROSS_SERVER, "chat");

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub request_id: String,
    /// Server name or `all`.
    pub server: String,
}

fixed_channel!(StatusRequest, channels::STATUS_REQUEST, "request");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub request_id: String,
    pub server: String,
    pub online: bool,
    pub player_count: u32,
    pub max_players: u32,
    pub tps: f64,
}

fixed_channel!(StatusResponse, channels::STATUS_RESPONSE, "response");

// =============================================================================
// Economy
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EconomyAction {
    #[default]
    Deposit,
    Withdraw,
}

impl EconomyAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
        }
    }

    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "deposit" => Some(Self::Deposit),
            "withdraw" => Some(Self::Withdraw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomyRequest {
    /// Carried by the envelope `type`, not the fields.
    #[serde(skip)]
    pub action: EconomyAction,
    pub request_id: String,
    pub uuid: PlayerId,
    pub amount: f64,
    #[serde(default)]
    pub reason: String,
}

impl EconomyRequest {
    pub fn deposit(
        request_id: impl Into<String>,
        uuid: PlayerId,
        amount: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            action: EconomyAction::Deposit,
            request_id: request_id.into(),
            uuid,
            amount,
            reason: reason.into(),
        }
    }

    pub fn withdraw(
        request_id: impl Into<String>,
        uuid: PlayerId,
        amount: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            action: EconomyAction::Withdraw,
            ..Self::deposit(request_id, uuid, amount, reason)
        }
    }
}

impl ChannelPayload for EconomyRequest {
    fn channel(&self) -> &'static str {
        match self.action {
            EconomyAction::Deposit => channels::ECONOMY_DEPOSIT,
            EconomyAction::Withdraw => channels::ECONOMY_WITHDRAW,
        }
    }

    fn kind(&self) -> &'static str {
        self.action.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomyResponse {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<PlayerId>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fixed_channel!(EconomyResponse, channels::ECONOMY_RESPONSE, "response");

// =============================================================================
// Account linking
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkVerify {
    pub request_id: String,
    pub discord_id: String,
    pub uuid: PlayerId,
    pub username: String,
}

fixed_channel!(LinkVerify, channels::LINK_VERIFY, "verify");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkComplete {
    pub request_id: String,
    pub discord_id: String,
    pub uuid: PlayerId,
    pub username: String,
    pub success: bool,
}

fixed_channel!(LinkComplete, channels::LINK_COMPLETE, "complete");

// =============================================================================
// Player presence
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresenceEvent {
    #[default]
    Join,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPresence {
    #[serde(skip)]
    pub event: PresenceEvent,
    pub server: String,
    pub player: String,
    pub uuid: PlayerId,
    pub timestamp: i64,
}

impl ChannelPayload for PlayerPresence {
    fn channel(&self) -> &'static str {
        match self.event {
            PresenceEvent::Join => channels::PLAYER_JOIN,
            PresenceEvent::Quit => channels::PLAYER_QUIT,
        }
    }

    fn kind(&self) -> &'static str {
        match self.event {
            PresenceEvent::Join => "join",
            PresenceEvent::Quit => "quit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSwitch {
    pub from: String,
    pub to: String,
    pub player: String,
    pub uuid: PlayerId,
    pub timestamp: i64,
}

fixed_channel!(PlayerSwitch, channels::PLAYER_SWITCH, "switch");

// =============================================================================
// Changelog
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogAdd {
    pub request_id: String,
    pub version: String,
    pub platform: String,
    pub category: String,
    pub description: String,
    pub player_name: String,
}

fixed_channel!(ChangelogAdd, channels::CHANGELOG_ADD, "add");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fixed_channel!(ChangelogResponse, channels::CHANGELOG_RESPONSE, "response");

// =============================================================================
// Console
// =============================================================================

/// A command executed with elevated privilege on every receiving backend.
/// The transport is unauthenticated, so only trusted publishers may emit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleCommand {
    pub command: String,
}

fixed_channel!(ConsoleCommand, channels::CONSOLE_COMMAND, "command");

// =============================================================================
// Bounties and deaths
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BountyPlaced {
    pub placer_name: String,
    pub placer_uuid: PlayerId,
    pub target_name: String,
    pub target_uuid: PlayerId,
    pub amount: f64,
    pub total: f64,
}

fixed_channel!(BountyPlaced, channels::BOUNTY_PLACED, "placed");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BountyClaimed {
    pub killer_name: String,
    pub killer_uuid: PlayerId,
    pub target_name: String,
    pub target_uuid: PlayerId,
    pub payout: f64,
}

fixed_channel!(BountyClaimed, channels::BOUNTY_CLAIMED, "claimed");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathStored {
    pub player_name: String,
    pub player_uuid: PlayerId,
    pub item_count: u32,
    pub buyback_cost: f64,
}

fixed_channel!(DeathStored, channels::DEATH_STORED, "stored");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathPurchased {
    pub player_name: String,
    pub player_uuid: PlayerId,
    pub cost: f64,
}

fixed_channel!(DeathPurchased, channels::DEATH_PURCHASED, "purchased");

// =============================================================================
// Moderation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PunishmentType {
    Ban,
    Tempban,
    Unban,
    Mute,
    Tempmute,
    Unmute,
    Kick,
    Warn,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationLog {
    pub target_name: String,
    pub target_uuid: PlayerId,
    pub staff_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_uuid: Option<PlayerId>,
    pub punishment_type: PunishmentType,
    pub reason: String,
    /// Human-readable duration for temporary punishments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

fixed_channel!(ModerationLog, channels::MODERATION_LOG, "punishment");

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAnnouncement {
    pub event_name: String,
    pub event_type: String,
    pub message: String,
}

fixed_channel!(EventAnnouncement, channels::EVENT_ANNOUNCEMENT, "announcement");

// =============================================================================
// Server control
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlAction {
    Restart,
    Shutdown,
}

impl ControlAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Restart => "RESTART",
            Self::Shutdown => "SHUTDOWN",
        }
    }

    pub const fn is_restart(self) -> bool {
        matches!(self, Self::Restart)
    }
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire form of a restart/shutdown order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerControlMessage {
    #[serde(rename = "type")]
    pub action: ControlAction,
    /// Server name or `all`.
    pub server: String,
    /// Countdown length in seconds.
    pub delay: u64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub staff_name: String,
}

fixed_channel!(ServerControlMessage, channels::SERVER_CONTROL, "control");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Envelope;
    use uuid::Uuid;

    #[test]
    fn test_economy_action_selects_channel_and_kind() {
        let player = Uuid::new_v4();
        let deposit = EconomyRequest::deposit("a", player, 5.0, "sale");
        let withdraw = EconomyRequest::withdraw("b", player, 5.0, "purchase");

        assert_eq!(deposit.channel(), channels::ECONOMY_DEPOSIT);
        assert_eq!(deposit.kind(), "deposit");
        assert_eq!(withdraw.channel(), channels::ECONOMY_WITHDRAW);
        assert_eq!(withdraw.kind(), "withdraw");
        assert_eq!(EconomyAction::from_kind("withdraw"), Some(EconomyAction::Withdraw));
        assert_eq!(EconomyAction::from_kind("refund"), None);
    }

    #[test]
    fn test_server_control_fields_match_wire_names() {
        let message = ServerControlMessage {
            action: ControlAction::Restart,
            server: "all".to_string(),
            delay: 10,
            reason: "patch".to_string(),
            staff_name: "Admin".to_string(),
        };
        let envelope = Envelope::from_payload(&message).unwrap();

        assert_eq!(envelope.field_str("type"), Some("RESTART"));
        assert_eq!(envelope.field_str("server"), Some("all"));
        assert_eq!(envelope.field_i64("delay"), Some(10));
        assert_eq!(envelope.field_str("staffName"), Some("Admin"));
    }

    #[test]
    fn test_unknown_punishment_type_decodes_as_other() {
        let raw = serde_json::json!({
            "targetName": "Steve",
            "targetUuid": Uuid::new_v4(),
            "staffName": "Mod",
            "punishmentType": "SHADOWBAN",
            "reason": "spam"
        });
        let log: ModerationLog = serde_json::from_value(raw).unwrap();
        assert_eq!(log.punishment_type, PunishmentType::Other);
        assert!(log.duration.is_none());
    }

    #[test]
    fn test_presence_event_selects_channel() {
        let mut presence = PlayerPresence {
            event: PresenceEvent::Join,
            server: "lobby".to_string(),
            player: "Alex".to_string(),
            uuid: Uuid::new_v4(),
            timestamp: 0,
        };
        assert_eq!(presence.channel(), channels::PLAYER_JOIN);
        presence.event = PresenceEvent::Quit;
        assert_eq!(presence.channel(), channels::PLAYER_QUIT);
        assert_eq!(presence.kind(), "quit");
    }
}
