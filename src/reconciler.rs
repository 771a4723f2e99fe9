// Keeps PersistentKeepalive on the live interface in line with the interface's health config.

use crate::models::InterfaceConfig;
use crate::wg_repo::{WgPeer, WgTool};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepaliveReport {
    pub updated: u32,
    pub failed: u32,
}

/// Writes `keepalive_seconds` to every peer whose live value differs. No-op when
/// `set_keepalive` is off or every peer already matches. Failures are logged and counted.
pub async fn reconcile_keepalive(
    tool: &dyn WgTool,
    interface: &str,
    config: &InterfaceConfig,
    peers: &[WgPeer],
) -> KeepaliveReport {
    let mut report = KeepaliveReport::default();
    if !config.set_keepalive {
        return report;
    }
    let wanted = config.keepalive_seconds;
    for peer in peers.iter().filter(|p| p.persistent_keepalive != Some(wanted)) {
        match tool
            .set_persistent_keepalive(interface, &peer.public_key, wanted)
            .await
        {
            Ok(()) => {
                report.updated += 1;
                tracing::debug!(
                    interface,
                    peer = %peer.public_key,
                    keepalive = wanted,
                    "persistent keepalive set"
                );
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    error = %e,
                    interface,
                    operation = "set_persistent_keepalive",
                    "failed to set persistent keepalive"
                );
            }
        }
    }
    report
}
