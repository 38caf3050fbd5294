//! Root configuration types.

use super::broker::BrokerConfig;
use super::control::{ControlConfig, NotificationConfig, TransferConfig};
use super::defaults::default_server_name;
use super::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Root configuration struct for one cluster process.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// This process's name; matched against `server.control` and `player.switch` targets
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            broker: BrokerConfig::default(),
            control: ControlConfig::default(),
            transfer: TransferConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
