// Background scheduling loop: one per start(), exits on stop() or when superseded by a newer start().

use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

use super::HealthMonitor;

/// Upper bound on the pause between cycles.
const MAX_CYCLE_PAUSE: Duration = Duration::from_secs(30);

#[tracing::instrument(level = "debug", name = "health_scheduler", skip(monitor, shutdown_rx))]
pub(super) async fn run(
    monitor: Arc<HealthMonitor>,
    generation: u64,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    monitor.apply_pending_stats_reset().await;

    let delay = Duration::from_secs(monitor.settings.startup_delay_secs);
    tokio::select! {
        _ = sleep(delay) => {}
        _ = &mut shutdown_rx => {
            tracing::debug!("scheduler stopped before first cycle");
            return;
        }
    }

    loop {
        {
            let _cycle = monitor.cycle_guard.lock().await;
            // stop() may have landed while waiting on a forced cycle
            if !monitor.is_current(generation) {
                break;
            }
            monitor.run_cycle().await;
        }

        let pause = monitor.next_pause();
        tokio::select! {
            _ = sleep(pause) => {}
            _ = &mut shutdown_rx => break,
        }
        if !monitor.is_current(generation) {
            break;
        }
    }
    tracing::debug!("scheduler shutting down");
}

impl HealthMonitor {
    /// Shortest ping interval among enabled interfaces, capped at MAX_CYCLE_PAUSE.
    fn next_pause(&self) -> Duration {
        self.state()
            .interfaces
            .values()
            .filter(|c| c.enabled)
            .map(|c| Duration::from_secs(c.ping_interval_seconds))
            .min()
            .map_or(MAX_CYCLE_PAUSE, |d| d.min(MAX_CYCLE_PAUSE))
    }
}
