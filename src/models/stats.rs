// Monitor-wide counters, status snapshot and cycle report

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{InterfaceSnapshot, PeerHealthRecord};

/// Process-wide counters. Reset on start().
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStats {
    pub total_pings: u64,
    pub successful_pings: u64,
    pub failed_pings: u64,
    /// Peers not probed because they never handshaked or went offline.
    pub skipped_offline: u64,
    pub endpoint_updates: u64,
    pub keepalive_updates: u64,
    pub keepalive_failures: u64,
    /// Failed `wg show` invocations.
    pub query_failures: u64,
    pub cycles: u64,
    pub last_cycle_time: Option<DateTime<Utc>>,
    pub last_cycle_duration_ms: f64,
}

/// Body of `GET /api/health/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub peers: BTreeMap<String, PeerHealthRecord>,
    pub interfaces: BTreeMap<String, InterfaceSnapshot>,
    pub stats: MonitorStats,
}

/// Outcome of one health cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub checked: u32,
    pub online: u32,
    pub unpingable: u32,
    pub recent: u32,
    pub offline: u32,
    pub unknown: u32,
    pub probed: u32,
    pub pingable: u32,
    pub endpoint_changes: u32,
    pub keepalive_updates: u32,
    pub duration_ms: f64,
}
