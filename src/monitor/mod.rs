// Peer health monitor: owned state, control facade and snapshot reads.
// The scheduling loop lives in `scheduler`, a single health pass in `cycle`.

mod cycle;
mod scheduler;

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use crate::config::MonitorConfig;
use crate::config_repo::ConfigRepo;
use crate::error::MonitorError;
use crate::models::{
    CycleReport, InterfaceConfig, InterfaceConfigPatch, InterfaceSnapshot, MonitorStats,
    PeerHealthRecord, StatusSnapshot,
};
use crate::prober::{Prober, probe_timeout};
use crate::tracker::{self, TrackerSettings};
use crate::wg_repo::WgTool;

/// Collaborators of the monitor.
pub struct MonitorDeps {
    pub wg: Arc<dyn WgTool>,
    pub prober: Arc<dyn Prober>,
    /// Interface configs are persisted here when present.
    pub config_repo: Option<Arc<ConfigRepo>>,
}

#[derive(Default)]
struct MonitorState {
    running: bool,
    /// Bumped on every start(); a loop whose generation is stale exits.
    generation: u64,
    shutdown_tx: Option<oneshot::Sender<()>>,
    interfaces: BTreeMap<String, InterfaceConfig>,
    /// Interfaces listed by the tool at the last successful query.
    active: BTreeSet<String>,
    peers: BTreeMap<String, PeerHealthRecord>,
    stats: MonitorStats,
    /// start() landed while a cycle was running; the scheduler resets stats once it ends.
    stats_reset_pending: bool,
}

pub struct HealthMonitor {
    wg: Arc<dyn WgTool>,
    prober: Arc<dyn Prober>,
    config_repo: Option<Arc<ConfigRepo>>,
    settings: MonitorConfig,
    tracker: TrackerSettings,
    labels: HashMap<String, String>,
    state: Mutex<MonitorState>,
    /// Held for the whole duration of a cycle.
    cycle_guard: tokio::sync::Mutex<()>,
}

impl HealthMonitor {
    pub fn new(
        deps: MonitorDeps,
        settings: MonitorConfig,
        labels: HashMap<String, String>,
    ) -> Arc<Self> {
        let tracker = TrackerSettings::from_config(&settings);
        Arc::new(Self {
            wg: deps.wg,
            prober: deps.prober,
            config_repo: deps.config_repo,
            settings,
            tracker,
            labels,
            state: Mutex::new(MonitorState::default()),
            cycle_guard: tokio::sync::Mutex::new(()),
        })
    }

    /// Loads persisted interface configs. Returns how many were restored.
    pub async fn restore_configs(&self) -> anyhow::Result<usize> {
        let Some(repo) = &self.config_repo else {
            return Ok(0);
        };
        let stored = repo.load_all().await?;
        let n = stored.len();
        for (name, cfg) in &stored {
            tracing::info!(
                interface = %name,
                enabled = cfg.enabled,
                ping_interval = cfg.ping_interval_seconds,
                "restored health config"
            );
        }
        self.state().interfaces.extend(stored);
        Ok(n)
    }

    // Every critical section leaves the state consistent, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn default_interface_config(&self) -> InterfaceConfig {
        InterfaceConfig {
            enabled: true,
            ping_interval_seconds: self.settings.default_ping_interval,
            keepalive_seconds: self.settings.default_keepalive,
            set_keepalive: self.settings.default_set_keepalive,
        }
        .clamped()
    }

    async fn persist(&self, name: &str, cfg: &InterfaceConfig) {
        if let Some(repo) = &self.config_repo
            && let Err(e) = repo.save(name, cfg).await
        {
            tracing::warn!(
                error = %e,
                interface = name,
                operation = "save_interface_config",
                "failed to persist health config"
            );
        }
    }

    /// Starts the scheduling loop. Returns false (and does nothing) if already running.
    /// Statistics are reset; peer records are kept. If a forced cycle is in flight the
    /// reset waits for it, so its counters never leak into the new statistics.
    pub fn start(self: &Arc<Self>) -> bool {
        let (tx, rx) = oneshot::channel();
        let idle = self.cycle_guard.try_lock().ok();
        let generation = {
            let mut st = self.state();
            if st.running {
                tracing::warn!("peer health monitor already running");
                return false;
            }
            st.running = true;
            st.generation += 1;
            if idle.is_some() {
                st.stats = MonitorStats::default();
                st.stats_reset_pending = false;
            } else {
                st.stats_reset_pending = true;
            }
            st.shutdown_tx = Some(tx);
            st.generation
        };
        drop(idle);
        tokio::spawn(scheduler::run(self.clone(), generation, rx));
        tracing::info!(
            startup_delay_secs = self.settings.startup_delay_secs,
            "peer health monitor started"
        );
        true
    }

    /// Stops scheduling. A cycle already in progress completes. Returns false if not running.
    pub fn stop(&self) -> bool {
        let tx = {
            let mut st = self.state();
            if !st.running {
                return false;
            }
            st.running = false;
            st.shutdown_tx.take()
        };
        if let Some(tx) = tx {
            let _ = tx.send(());
        }
        tracing::info!("peer health monitor stopped");
        true
    }

    /// Applies a reset deferred by start(). Waits for the running cycle to finish.
    async fn apply_pending_stats_reset(&self) {
        if !self.state().stats_reset_pending {
            return;
        }
        let _cycle = self.cycle_guard.lock().await;
        let mut st = self.state();
        if st.stats_reset_pending {
            st.stats = MonitorStats::default();
            st.stats_reset_pending = false;
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    fn is_current(&self, generation: u64) -> bool {
        let st = self.state();
        st.running && st.generation == generation
    }

    /// Copy of the last committed state. Never waits for a cycle in progress.
    /// Peers of interfaces that are down or disabled are left out; their records
    /// are no longer refreshed.
    pub fn status(&self) -> StatusSnapshot {
        let st = self.state();
        let monitored = |iface: &str| {
            st.active.contains(iface) && st.interfaces.get(iface).is_some_and(|c| c.enabled)
        };
        StatusSnapshot {
            running: st.running,
            peers: st
                .peers
                .iter()
                .filter(|(_, rec)| monitored(&rec.interface))
                .map(|(key, rec)| (key.clone(), rec.clone()))
                .collect(),
            interfaces: st
                .interfaces
                .iter()
                .map(|(name, cfg)| {
                    (
                        name.clone(),
                        InterfaceSnapshot {
                            config: *cfg,
                            interface_active: st.active.contains(name),
                        },
                    )
                })
                .collect(),
            stats: st.stats.clone(),
        }
    }

    pub fn stats(&self) -> MonitorStats {
        self.state().stats.clone()
    }

    pub fn peer(&self, public_key: &str) -> Result<PeerHealthRecord, MonitorError> {
        self.state()
            .peers
            .get(public_key)
            .cloned()
            .ok_or_else(|| MonitorError::PeerNotFound(public_key.to_string()))
    }

    pub fn interface_config(&self, name: &str) -> Result<InterfaceConfig, MonitorError> {
        self.state()
            .interfaces
            .get(name)
            .copied()
            .ok_or_else(|| MonitorError::InterfaceNotFound(name.to_string()))
    }

    /// Runs one cycle now, whether or not the loop is running.
    /// Rejected with `Busy` while another cycle is in progress.
    pub async fn force_cycle(&self) -> Result<CycleReport, MonitorError> {
        let _guard = self
            .cycle_guard
            .try_lock()
            .map_err(|_| MonitorError::Busy)?;
        tracing::info!("forced health cycle");
        Ok(self.run_cycle().await)
    }

    /// Probes one peer outside the timer. Peers without a handshake, past the offline
    /// threshold or without a tunnel address are returned unchanged.
    pub async fn ping_peer(&self, public_key: &str) -> Result<PeerHealthRecord, MonitorError> {
        let (ip, limit) = {
            let st = self.state();
            let rec = st
                .peers
                .get(public_key)
                .ok_or_else(|| MonitorError::PeerNotFound(public_key.to_string()))?;
            let ip = rec.vpn_ip.as_deref().and_then(|s| s.parse().ok());
            let ip = match ip {
                Some(ip) if tracker::is_probeable(rec, Utc::now(), &self.tracker) => ip,
                _ => {
                    tracing::debug!(peer = rec.label(), status = ?rec.status, "peer not probeable, skipping ping");
                    return Ok(rec.clone());
                }
            };
            let interval = st
                .interfaces
                .get(&rec.interface)
                .map_or(self.settings.default_ping_interval, |c| {
                    c.ping_interval_seconds
                });
            (ip, probe_timeout(self.settings.probe_timeout_ms, interval))
        };

        let outcome = self.prober.probe(ip, limit).await;

        let mut guard = self.state();
        let st = &mut *guard;
        st.stats.record_probe(outcome.success);
        let rec = st
            .peers
            .get_mut(public_key)
            .ok_or_else(|| MonitorError::PeerNotFound(public_key.to_string()))?;
        tracker::apply_probe(rec, outcome, Utc::now(), &self.tracker);
        tracing::debug!(
            peer = rec.label(),
            success = outcome.success,
            rtt_ms = ?outcome.rtt_ms,
            "on-demand ping"
        );
        Ok(rec.clone())
    }

    /// Merges `patch` into the interface's config and persists it. Nothing changes on error.
    pub async fn update_interface_config(
        &self,
        name: &str,
        patch: &InterfaceConfigPatch,
    ) -> Result<InterfaceConfig, MonitorError> {
        patch.validate()?;

        let known = {
            let st = self.state();
            st.interfaces.contains_key(name) || st.active.contains(name)
        };
        if !known {
            // The interface may have come up since the last cycle.
            let live = self.wg.list_interfaces().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, operation = "list_interfaces", "wg query failed");
                Vec::new()
            });
            if !live.iter().any(|n| n == name) {
                return Err(MonitorError::InterfaceNotFound(name.to_string()));
            }
        }

        let cfg = {
            let default = self.default_interface_config();
            let mut st = self.state();
            let entry = st.interfaces.entry(name.to_string()).or_insert(default);
            entry.apply(patch);
            *entry
        };
        tracing::info!(
            interface = name,
            enabled = cfg.enabled,
            ping_interval = cfg.ping_interval_seconds,
            set_keepalive = cfg.set_keepalive,
            keepalive = cfg.keepalive_seconds,
            "updated health config"
        );
        self.persist(name, &cfg).await;
        Ok(cfg)
    }
}

impl MonitorStats {
    fn record_probe(&mut self, success: bool) {
        self.total_pings += 1;
        if success {
            self.successful_pings += 1;
        } else {
            self.failed_pings += 1;
        }
    }
}
