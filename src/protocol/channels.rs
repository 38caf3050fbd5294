//! Channel names shared by every process in the cluster.

pub const CHAT_MINECRAFT: &str = "chat.minecraft";
pub const CHAT_DISCORD: &str = "chat.discord";
pub const CHAT_CROSS_SERVER: &str = "chat.crossserver";

pub const STATUS_REQUEST: &str = "status.request";
pub const STATUS_RESPONSE: &str = "status.response";

pub const ECONOMY_DEPOSIT: &str = "economy.deposit";
pub const ECONOMY_WITHDRAW: &str = "economy.withdraw";
pub const ECONOMY_RESPONSE: &str = "economy.response";

pub const LINK_VERIFY: &str = "link.verify";
pub const LINK_COMPLETE: &str = "link.complete";

pub const PLAYER_JOIN: &str = "player.join";
pub const PLAYER_QUIT: &str = "player.quit";
pub const PLAYER_SWITCH: &str = "player.switch";

pub const CHANGELOG_ADD: &str = "changelog.add";
pub const CHANGELOG_RESPONSE: &str = "changelog.response";

pub const CONSOLE_COMMAND: &str = "console.command";

pub const BOUNTY_PLACED: &str = "bounty.placed";
pub const BOUNTY_CLAIMED: &str = "bounty.claimed";

pub const DEATH_STORED: &str = "death.stored";
pub const DEATH_PURCHASED: &str = "death.purchased";

pub const MODERATION_LOG: &str = "moderation.log";

pub const EVENT_ANNOUNCEMENT: &str = "event.announcement";

pub const SERVER_CONTROL: &str = "server.control";

/// Every channel the cluster speaks, in table order.
pub const ALL_CHANNELS: &[&str] = &[
    CHAT_MINECRAFT,
    CHAT_DISCORD,
    CHAT_CROSS_SERVER,
    STATUS_REQUEST,
    STATUS_RESPONSE,
    ECONOMY_DEPOSIT,
    ECONOMY_WITHDRAW,
    ECONOMY_RESPONSE,
    LINK_VERIFY,
    LINK_COMPLETE,
    PLAYER_JOIN,
    PLAYER_QUIT,
    PLAYER_SWITCH,
    CHANGELOG_ADD,
    CHANGELOG_RESPONSE,
    CONSOLE_COMMAND,
    BOUNTY_PLACED,
    BOUNTY_CLAIMED,
    DEATH_STORED,
    DEATH_PURCHASED,
    MODERATION_LOG,
    EVENT_ANNOUNCEMENT,
    SERVER_CONTROL,
];

/// Response channels resolved through the request correlation table.
pub const RESPONSE_CHANNELS: &[&str] = &[
    STATUS_RESPONSE,
    ECONOMY_RESPONSE,
    LINK_COMPLETE,
    CHANGELOG_RESPONSE,
];

/// Target value that addresses every process at once.
pub const TARGET_ALL: &str = "all";

pub fn is_known_channel(channel: &str) -> bool {
    ALL_CHANNELS.contains(&channel)
}
