// One health pass over every enabled, live interface.

use chrono::{TimeDelta, Utc};
use futures_util::{StreamExt, stream};
use std::collections::{BTreeSet, HashSet};
use std::net::IpAddr;
use tokio::time::{Duration, Instant};

use super::HealthMonitor;
use crate::models::{CycleReport, InterfaceConfig, PeerHealthRecord, PeerStatus};
use crate::prober::{ProbeOutcome, probe_timeout};
use crate::reconciler::reconcile_keepalive;
use crate::tracker;

struct ProbeTarget {
    public_key: String,
    ip: IpAddr,
    timeout: Duration,
}

impl HealthMonitor {
    /// Caller must hold `cycle_guard`.
    pub(super) async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        let work = self.refresh_interfaces().await;

        let mut targets = Vec::new();
        for (iface, cfg) in &work {
            targets.extend(self.observe_interface(iface, cfg, &mut report).await);
        }

        let concurrency = self.settings.probe_concurrency;
        let outcomes: Vec<(String, ProbeOutcome)> = stream::iter(targets)
            .map(|t| {
                let prober = self.prober.clone();
                async move {
                    let outcome = prober.probe(t.ip, t.timeout).await;
                    (t.public_key, outcome)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let worked: BTreeSet<&str> = work.iter().map(|(n, _)| n.as_str()).collect();
        let now = Utc::now();
        let mut guard = self.state();
        let st = &mut *guard;

        for (key, outcome) in outcomes {
            report.probed += 1;
            st.stats.record_probe(outcome.success);
            if let Some(rec) = st.peers.get_mut(&key) {
                tracker::apply_probe(rec, outcome, now, &self.tracker);
            }
        }

        let interfaces = &st.interfaces;
        st.peers
            .retain(|_, rec| interfaces.contains_key(&rec.interface));

        for rec in st.peers.values().filter(|r| worked.contains(r.interface.as_str())) {
            tally(&mut report, rec);
        }

        let duration_ms = (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
        report.duration_ms = duration_ms;
        st.stats.cycles += 1;
        st.stats.last_cycle_time = Some(Utc::now());
        st.stats.last_cycle_duration_ms = duration_ms;

        tracing::debug!(
            checked = report.checked,
            probed = report.probed,
            online = report.online,
            endpoint_changes = report.endpoint_changes,
            duration_ms,
            "health cycle complete"
        );
        report
    }

    /// Queries live interfaces, registers newly discovered ones and returns the enabled live set.
    async fn refresh_interfaces(&self) -> Vec<(String, InterfaceConfig)> {
        let live = match self.wg.list_interfaces().await {
            Ok(l) => Some(l),
            Err(e) => {
                tracing::warn!(error = %e, operation = "list_interfaces", "wg query failed");
                self.state().stats.query_failures += 1;
                None
            }
        };

        let mut discovered = Vec::new();
        let work: Vec<(String, InterfaceConfig)> = {
            let mut guard = self.state();
            let st = &mut *guard;
            if let Some(live) = live {
                for name in &live {
                    if !st.interfaces.contains_key(name) {
                        let cfg = self.default_interface_config();
                        st.interfaces.insert(name.clone(), cfg);
                        discovered.push((name.clone(), cfg));
                    }
                }
                st.active = live.into_iter().collect();
            }
            st.interfaces
                .iter()
                .filter(|(name, cfg)| cfg.enabled && st.active.contains(*name))
                .map(|(name, cfg)| (name.clone(), *cfg))
                .collect()
        };

        for (name, cfg) in &discovered {
            tracing::info!(interface = %name, "discovered interface, using default health config");
            self.persist(name, cfg).await;
        }
        work
    }

    /// Reconciles records and keepalive for one interface; returns peers due for a probe.
    async fn observe_interface(
        &self,
        iface: &str,
        cfg: &InterfaceConfig,
        report: &mut CycleReport,
    ) -> Vec<ProbeTarget> {
        let peers = match self.wg.dump(iface).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, interface = iface, operation = "dump", "wg query failed");
                self.state().stats.query_failures += 1;
                return Vec::new();
            }
        };

        let keepalive = reconcile_keepalive(self.wg.as_ref(), iface, cfg, &peers).await;
        report.keepalive_updates += keepalive.updated;

        let limit = probe_timeout(self.settings.probe_timeout_ms, cfg.ping_interval_seconds);
        let interval = TimeDelta::seconds(cfg.ping_interval_seconds as i64);
        let now = Utc::now();

        let mut guard = self.state();
        let st = &mut *guard;
        st.stats.keepalive_updates += u64::from(keepalive.updated);
        st.stats.keepalive_failures += u64::from(keepalive.failed);

        let present: HashSet<&str> = peers.iter().map(|p| p.public_key.as_str()).collect();
        st.peers
            .retain(|key, rec| rec.interface != iface || present.contains(key.as_str()));

        let mut targets = Vec::new();
        for peer in &peers {
            let rec = st
                .peers
                .entry(peer.public_key.clone())
                .or_insert_with(|| {
                    PeerHealthRecord::new(iface, &peer.public_key, self.tracker.window_size)
                });
            rec.interface = iface.to_string();
            rec.ping_interval = interval;
            let label = self.labels.get(&peer.public_key).map(String::as_str);
            if tracker::observe(rec, peer, label, now, &self.tracker) {
                report.endpoint_changes += 1;
                st.stats.endpoint_updates += 1;
                tracing::info!(
                    interface = iface,
                    peer = rec.label(),
                    endpoint = %rec.last_endpoint,
                    "peer endpoint changed"
                );
            }

            if !tracker::is_probeable(rec, now, &self.tracker) {
                st.stats.skipped_offline += 1;
                continue;
            }
            if tracker::due_for_probe(rec, interval, now, &self.tracker)
                && let Some(ip) = rec.vpn_ip.as_deref().and_then(|s| s.parse().ok())
            {
                targets.push(ProbeTarget {
                    public_key: peer.public_key.clone(),
                    ip,
                    timeout: limit,
                });
            }
        }
        targets
    }
}

fn tally(report: &mut CycleReport, rec: &PeerHealthRecord) {
    report.checked += 1;
    match rec.status {
        PeerStatus::Online => report.online += 1,
        PeerStatus::Unpingable => report.unpingable += 1,
        PeerStatus::Recent => report.recent += 1,
        PeerStatus::Offline => report.offline += 1,
        PeerStatus::Unknown => report.unknown += 1,
    }
    if rec.is_pingable {
        report.pingable += 1;
    }
}
