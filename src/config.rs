use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;

use crate::models::{KEEPALIVE_RANGE, PING_INTERVAL_RANGE};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Display names for peers, keyed by public key.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_true")]
    pub autostart: bool,
    /// Delay before the first cycle after start().
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
    /// "wg" or "awg".
    #[serde(default = "default_wg_command")]
    pub wg_command: String,
    /// Upper bound for a single probe; the effective timeout is also capped at half the ping interval.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Max probes in flight during one cycle.
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
    /// Number of trailing probes used for ping_success_rate.
    #[serde(default = "default_success_window")]
    pub success_window: usize,
    /// Handshake younger than this counts as current.
    #[serde(default = "default_online_threshold_secs")]
    pub online_threshold_secs: u64,
    /// Handshake older than this counts as offline; such peers are not probed.
    #[serde(default = "default_offline_threshold_secs")]
    pub offline_threshold_secs: u64,
    #[serde(default = "default_endpoint_changed_decay_secs")]
    pub endpoint_changed_decay_secs: u64,
    #[serde(default = "default_ping_interval")]
    pub default_ping_interval: u64,
    #[serde(default = "default_keepalive")]
    pub default_keepalive: u64,
    #[serde(default = "default_true")]
    pub default_set_keepalive: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            autostart: true,
            startup_delay_secs: default_startup_delay_secs(),
            wg_command: default_wg_command(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_concurrency: default_probe_concurrency(),
            success_window: default_success_window(),
            online_threshold_secs: default_online_threshold_secs(),
            offline_threshold_secs: default_offline_threshold_secs(),
            endpoint_changed_decay_secs: default_endpoint_changed_decay_secs(),
            default_ping_interval: default_ping_interval(),
            default_keepalive: default_keepalive(),
            default_set_keepalive: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_startup_delay_secs() -> u64 {
    15
}

fn default_wg_command() -> String {
    "wg".into()
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_probe_concurrency() -> usize {
    16
}

fn default_success_window() -> usize {
    20
}

fn default_online_threshold_secs() -> u64 {
    180
}

fn default_offline_threshold_secs() -> u64 {
    900
}

fn default_endpoint_changed_decay_secs() -> u64 {
    60
}

fn default_ping_interval() -> u64 {
    30
}

fn default_keepalive() -> u64 {
    25
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path))?;
        Self::load_from_str(&s).with_context(|| format!("loading config file {}", path))
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        let m = &self.monitor;
        anyhow::ensure!(
            m.wg_command == "wg" || m.wg_command == "awg",
            "monitor.wg_command must be \"wg\" or \"awg\", got {:?}",
            m.wg_command
        );
        anyhow::ensure!(
            m.probe_timeout_ms > 0,
            "monitor.probe_timeout_ms must be > 0, got {}",
            m.probe_timeout_ms
        );
        anyhow::ensure!(
            m.probe_concurrency > 0,
            "monitor.probe_concurrency must be > 0, got {}",
            m.probe_concurrency
        );
        anyhow::ensure!(
            m.success_window > 0,
            "monitor.success_window must be > 0, got {}",
            m.success_window
        );
        anyhow::ensure!(
            m.online_threshold_secs > 0,
            "monitor.online_threshold_secs must be > 0, got {}",
            m.online_threshold_secs
        );
        anyhow::ensure!(
            m.online_threshold_secs < m.offline_threshold_secs,
            "monitor.online_threshold_secs ({}) must be below monitor.offline_threshold_secs ({})",
            m.online_threshold_secs,
            m.offline_threshold_secs
        );
        anyhow::ensure!(
            PING_INTERVAL_RANGE.contains(&m.default_ping_interval),
            "monitor.default_ping_interval must be within {:?}, got {}",
            PING_INTERVAL_RANGE,
            m.default_ping_interval
        );
        anyhow::ensure!(
            KEEPALIVE_RANGE.contains(&m.default_keepalive),
            "monitor.default_keepalive must be within {:?}, got {}",
            KEEPALIVE_RANGE,
            m.default_keepalive
        );
        Ok(())
    }
}
