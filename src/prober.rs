// Liveness probes against a peer's tunnel address.
// Every failure mode (timeout, unreachable, spawn error) is reported as an unsuccessful probe.

use std::net::IpAddr;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{Duration, Instant, timeout};

/// Grace period on top of ping's own deadline before the child is killed.
const SPAWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub success: bool,
    pub rtt_ms: Option<f64>,
}

impl ProbeOutcome {
    pub fn failed() -> Self {
        Self {
            success: false,
            rtt_ms: None,
        }
    }

    pub fn ok(rtt_ms: f64) -> Self {
        Self {
            success: true,
            rtt_ms: Some(rtt_ms),
        }
    }
}

#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, ip: IpAddr, timeout: Duration) -> ProbeOutcome;
}

/// Probe timeout for an interface: the configured cap, but never more than half the ping interval.
pub fn probe_timeout(probe_timeout_ms: u64, ping_interval_secs: u64) -> Duration {
    let half_interval_ms = ping_interval_secs.saturating_mul(1000) / 2;
    Duration::from_millis(probe_timeout_ms.min(half_interval_ms).max(1))
}

/// ICMP echo through the system `ping` binary (one packet, numeric output).
pub struct PingProber {
    command: String,
}

impl Default for PingProber {
    fn default() -> Self {
        Self::new("ping")
    }
}

impl PingProber {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait::async_trait]
impl Prober for PingProber {
    async fn probe(&self, ip: IpAddr, limit: Duration) -> ProbeOutcome {
        // ping's -W only takes whole seconds
        let wait_secs = limit.as_secs_f64().ceil().max(1.0) as u64;
        let started = Instant::now();
        let child = Command::new(&self.command)
            .args(["-n", "-c", "1", "-W", &wait_secs.to_string(), &ip.to_string()])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match timeout(limit + SPAWN_GRACE, child).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, %ip, "ping spawn failed");
                return ProbeOutcome::failed();
            }
            Err(_) => {
                tracing::debug!(%ip, "ping timed out");
                return ProbeOutcome::failed();
            }
        };
        if !output.status.success() {
            return ProbeOutcome::failed();
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let rtt = parse_rtt_ms(&stdout)
            .unwrap_or_else(|| started.elapsed().as_secs_f64() * 1000.0);
        ProbeOutcome::ok(rtt)
    }
}

/// Extracts the round trip from a reply line such as `64 bytes from 10.0.0.2: icmp_seq=1 ttl=64 time=23.4 ms`.
pub fn parse_rtt_ms(output: &str) -> Option<f64> {
    let start = output.find("time=")? + "time=".len();
    let rest = &output[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}
