use clap::Parser;
use std::time::Duration;

use crate::registry::RegistryConfig;
use crate::rules::{RuleSettings, DEFAULT_KOMI};

/// Server settings. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "stoneroom", version, about = "Five-in-a-row and capture Go rooms over WebSockets")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "STONEROOM_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Seconds an empty room survives before it is deleted
    #[arg(long, env = "STONEROOM_GRACE_PERIOD_SECS", default_value_t = 60)]
    pub grace_period_secs: u64,

    /// Compensation added to white's score in capture Go
    #[arg(long, env = "STONEROOM_KOMI", default_value_t = DEFAULT_KOMI)]
    pub komi: f64,

    /// Seconds between connection/room statistics log lines (0 disables)
    #[arg(long, env = "STONEROOM_STATS_INTERVAL_SECS", default_value_t = 60)]
    pub stats_interval_secs: u64,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            grace_period: Duration::from_secs(self.grace_period_secs),
            rules: RuleSettings { komi: self.komi },
        }
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}
