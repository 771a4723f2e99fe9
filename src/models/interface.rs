// Per-interface health configuration

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::error::MonitorError;

/// Allowed ping interval, seconds.
pub const PING_INTERVAL_RANGE: RangeInclusive<u64> = 10..=300;
/// Allowed PersistentKeepalive value, seconds.
pub const KEEPALIVE_RANGE: RangeInclusive<u64> = 10..=120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub enabled: bool,
    #[serde(rename = "ping_interval")]
    pub ping_interval_seconds: u64,
    #[serde(rename = "keepalive_value")]
    pub keepalive_seconds: u64,
    /// Push PersistentKeepalive to the live interface.
    pub set_keepalive: bool,
}

impl InterfaceConfig {
    /// Forces numeric fields into their allowed ranges (used for values read from disk).
    pub fn clamped(self) -> Self {
        Self {
            ping_interval_seconds: self
                .ping_interval_seconds
                .clamp(*PING_INTERVAL_RANGE.start(), *PING_INTERVAL_RANGE.end()),
            keepalive_seconds: self
                .keepalive_seconds
                .clamp(*KEEPALIVE_RANGE.start(), *KEEPALIVE_RANGE.end()),
            ..self
        }
    }

    /// Merges a validated patch. Fields absent from the patch are left alone.
    pub fn apply(&mut self, patch: &InterfaceConfigPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(v) = patch.ping_interval {
            self.ping_interval_seconds = v as u64;
        }
        if let Some(v) = patch.keepalive_value {
            self.keepalive_seconds = v as u64;
        }
        if let Some(set) = patch.set_keepalive {
            self.set_keepalive = set;
        }
    }
}

/// Partial update body for `POST /api/health/config/{iface}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceConfigPatch {
    pub enabled: Option<bool>,
    pub ping_interval: Option<i64>,
    pub keepalive_value: Option<i64>,
    pub set_keepalive: Option<bool>,
}

impl InterfaceConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.ping_interval.is_none()
            && self.keepalive_value.is_none()
            && self.set_keepalive.is_none()
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.is_empty() {
            return Err(MonitorError::Validation(
                "at least one of enabled, ping_interval, keepalive_value, set_keepalive is required"
                    .into(),
            ));
        }
        if let Some(v) = self.ping_interval {
            check_range("ping_interval", v, &PING_INTERVAL_RANGE)?;
        }
        if let Some(v) = self.keepalive_value {
            check_range("keepalive_value", v, &KEEPALIVE_RANGE)?;
        }
        Ok(())
    }
}

fn check_range(field: &str, value: i64, range: &RangeInclusive<u64>) -> Result<(), MonitorError> {
    let ok = u64::try_from(value).is_ok_and(|v| range.contains(&v));
    if ok {
        Ok(())
    } else {
        Err(MonitorError::Validation(format!(
            "{} must be between {} and {}, got {}",
            field,
            range.start(),
            range.end(),
            value
        )))
    }
}

/// Interface entry as reported by the status read.
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceSnapshot {
    #[serde(flatten)]
    pub config: InterfaceConfig,
    /// Interface is currently listed by the WireGuard tool.
    pub interface_active: bool,
}
