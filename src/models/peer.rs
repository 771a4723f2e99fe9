// Per-peer health record

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::tracker::SuccessWindow;

/// Liveness classification; only the tracker assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    /// Current handshake and the last probe answered.
    Online,
    /// Current handshake but probes go unanswered (ICMP filtered).
    Unpingable,
    /// Handshake is getting old, or no probe has completed yet.
    Recent,
    /// Handshake past the offline threshold; not probed.
    Offline,
    /// Never completed a handshake.
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerHealthRecord {
    pub interface: String,
    pub public_key: String,
    pub name: String,
    pub vpn_ip: Option<String>,
    pub status: PeerStatus,
    pub is_pingable: bool,
    pub last_ping_success: bool,
    /// RTT of the last successful probe; absent until one succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_rtt_ms: Option<f64>,
    pub ping_success_rate: f64,
    pub last_ping_time: Option<DateTime<Utc>>,
    pub last_endpoint: String,
    pub endpoint_changed: bool,
    pub last_handshake_time: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// PersistentKeepalive currently set on the live interface.
    pub persistent_keepalive: Option<u64>,
    #[serde(skip)]
    pub endpoint_changed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub window: SuccessWindow,
    /// Probe cadence of the owning interface; zero until a cycle has seen the peer.
    #[serde(skip)]
    pub ping_interval: TimeDelta,
}

impl PeerHealthRecord {
    pub fn new(interface: &str, public_key: &str, window_size: usize) -> Self {
        Self {
            interface: interface.to_string(),
            public_key: public_key.to_string(),
            name: String::new(),
            vpn_ip: None,
            status: PeerStatus::Unknown,
            is_pingable: false,
            last_ping_success: false,
            ping_rtt_ms: None,
            ping_success_rate: 0.0,
            last_ping_time: None,
            last_endpoint: String::new(),
            endpoint_changed: false,
            last_handshake_time: None,
            consecutive_failures: 0,
            persistent_keepalive: None,
            endpoint_changed_at: None,
            window: SuccessWindow::new(window_size),
            ping_interval: TimeDelta::zero(),
        }
    }

    /// Short key prefix for log lines.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            let end = self
                .public_key
                .char_indices()
                .nth(8)
                .map_or(self.public_key.len(), |(i, _)| i);
            &self.public_key[..end]
        } else {
            &self.name
        }
    }
}
