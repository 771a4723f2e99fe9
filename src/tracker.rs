// Peer state tracker: folds handshake/endpoint observations and probe outcomes into PeerHealthRecord.
// All functions take `now` explicitly; nothing here reads the clock.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::VecDeque;

use crate::config::MonitorConfig;
use crate::models::{PeerHealthRecord, PeerStatus};
use crate::prober::ProbeOutcome;
use crate::wg_repo::{WgPeer, vpn_ip};

#[derive(Debug, Clone, Copy)]
pub struct TrackerSettings {
    /// Handshakes younger than this are current.
    pub online_threshold: TimeDelta,
    /// Handshakes older than this mean offline.
    pub offline_threshold: TimeDelta,
    /// How long `endpoint_changed` stays set after a roam.
    pub endpoint_changed_decay: TimeDelta,
    pub window_size: usize,
}

impl TrackerSettings {
    pub fn from_config(m: &MonitorConfig) -> Self {
        Self {
            online_threshold: secs(m.online_threshold_secs),
            offline_threshold: secs(m.offline_threshold_secs),
            endpoint_changed_decay: secs(m.endpoint_changed_decay_secs),
            window_size: m.success_window,
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

fn secs(s: u64) -> TimeDelta {
    TimeDelta::seconds(i64::try_from(s).unwrap_or(i64::MAX / 1000))
}

/// Trailing window of probe outcomes; old samples fall out so a recovering peer visibly recovers.
#[derive(Debug, Clone)]
pub struct SuccessWindow {
    samples: VecDeque<bool>,
    capacity: usize,
}

impl SuccessWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, success: bool) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(success);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Percentage of successful samples, one decimal. 0 when empty.
    pub fn rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let ok = self.samples.iter().filter(|&&s| s).count();
        let pct = ok as f64 * 100.0 / self.samples.len() as f64;
        (pct * 10.0).round() / 10.0
    }
}

/// Status from handshake age and the outcome of the last probe inside the probe window.
/// First match wins: unknown, offline, recent (aging handshake), recent (not probed yet), unpingable, online.
pub fn derive_status(
    handshake_age: Option<TimeDelta>,
    last_probe: Option<bool>,
    settings: &TrackerSettings,
) -> PeerStatus {
    let Some(age) = handshake_age else {
        return PeerStatus::Unknown;
    };
    if age > settings.offline_threshold {
        return PeerStatus::Offline;
    }
    if age > settings.online_threshold {
        return PeerStatus::Recent;
    }
    match last_probe {
        None => PeerStatus::Recent,
        Some(false) => PeerStatus::Unpingable,
        Some(true) => PeerStatus::Online,
    }
}

pub fn handshake_age(record: &PeerHealthRecord, now: DateTime<Utc>) -> Option<TimeDelta> {
    record
        .last_handshake_time
        .map(|t| (now - t).max(TimeDelta::zero()))
}

/// Slack on top of the ping interval: one scheduler pause before the next probe lands.
const PROBE_WINDOW_GRACE_SECS: i64 = 30;

/// How long a probe result stays current: the online threshold, or one ping interval
/// plus grace when the interface probes less often than that.
pub fn probe_window(record: &PeerHealthRecord, settings: &TrackerSettings) -> TimeDelta {
    settings
        .online_threshold
        .max(record.ping_interval + TimeDelta::seconds(PROBE_WINDOW_GRACE_SECS))
}

/// Last probe result, if it is still inside the probe window.
fn last_probe_in_window(
    record: &PeerHealthRecord,
    now: DateTime<Utc>,
    settings: &TrackerSettings,
) -> Option<bool> {
    let window = probe_window(record, settings);
    record
        .last_ping_time
        .filter(|&t| now - t <= window)
        .map(|_| record.last_ping_success)
}

pub fn refresh_status(record: &mut PeerHealthRecord, now: DateTime<Utc>, settings: &TrackerSettings) {
    let status = derive_status(
        handshake_age(record, now),
        last_probe_in_window(record, now, settings),
        settings,
    );
    if matches!(status, PeerStatus::Offline | PeerStatus::Unknown) {
        record.is_pingable = false;
    }
    record.status = status;
}

/// Folds one `wg show` observation into the record. Returns true when the endpoint roamed.
pub fn observe(
    record: &mut PeerHealthRecord,
    peer: &WgPeer,
    name: Option<&str>,
    now: DateTime<Utc>,
    settings: &TrackerSettings,
) -> bool {
    record.vpn_ip = vpn_ip(&peer.allowed_ips).map(|ip| ip.to_string());
    record.name = name.unwrap_or_default().to_string();
    record.persistent_keepalive = peer.persistent_keepalive;
    if let Some(ts) = peer.latest_handshake {
        record.last_handshake_time = DateTime::from_timestamp(ts, 0);
    }

    let roamed = match peer.endpoint.as_deref() {
        Some(ep) => !record.last_endpoint.is_empty() && record.last_endpoint != ep,
        None => false,
    };
    if roamed {
        record.endpoint_changed = true;
        record.endpoint_changed_at = Some(now);
    } else if record.endpoint_changed
        && record
            .endpoint_changed_at
            .is_none_or(|t| now - t >= settings.endpoint_changed_decay)
    {
        record.endpoint_changed = false;
        record.endpoint_changed_at = None;
    }
    if let Some(ep) = &peer.endpoint {
        record.last_endpoint.clone_from(ep);
    }

    refresh_status(record, now, settings);
    roamed
}

/// Whether the record should be probed now: it has a tunnel address, its handshake is not
/// older than the offline threshold, and `interval` has passed since the last probe.
pub fn due_for_probe(
    record: &PeerHealthRecord,
    interval: TimeDelta,
    now: DateTime<Utc>,
    settings: &TrackerSettings,
) -> bool {
    if !is_probeable(record, now, settings) {
        return false;
    }
    record.last_ping_time.is_none_or(|t| now - t >= interval)
}

/// Has a tunnel address and a handshake within the offline threshold.
pub fn is_probeable(record: &PeerHealthRecord, now: DateTime<Utc>, settings: &TrackerSettings) -> bool {
    record.vpn_ip.is_some()
        && handshake_age(record, now).is_some_and(|age| age <= settings.offline_threshold)
}

pub fn apply_probe(
    record: &mut PeerHealthRecord,
    outcome: ProbeOutcome,
    now: DateTime<Utc>,
    settings: &TrackerSettings,
) {
    record.last_ping_time = Some(now);
    record.last_ping_success = outcome.success;
    if outcome.success {
        if outcome.rtt_ms.is_some() {
            record.ping_rtt_ms = outcome.rtt_ms.map(|r| (r * 100.0).round() / 100.0);
        }
        record.consecutive_failures = 0;
        record.is_pingable = true;
    } else {
        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        record.is_pingable = false;
    }
    record.window.push(outcome.success);
    record.ping_success_rate = record.window.rate();
    refresh_status(record, now, settings);
}
