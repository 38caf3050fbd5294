// Protocol module: channel names, the wire envelope, and typed payloads

pub mod channels;
pub mod envelope;
pub mod payloads;
pub mod types;

pub use envelope::{DecodeError, Envelope};

pub use payloads::{
    BountyClaimed, BountyPlaced, ChangelogAdd, ChangelogResponse, ChannelPayload, ChatMessage,
    ChatSource, ConsoleCommand, ControlAction, CrossServerChat, DeathPurchased, DeathStored,
    EconomyAction, EconomyRequest, EconomyResponse, EventAnnouncement, LinkComplete, LinkVerify,
    ModerationLog, PlayerPresence, PlayerSwitch, PresenceEvent, PunishmentType,
    ServerControlMessage, StatusRequest, StatusResponse,
};

pub use types::PlayerId;
