// Shared test helpers: scriptable WireGuard tool and prober

#![allow(dead_code)]

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use wghealth::config::MonitorConfig;
use wghealth::monitor::{HealthMonitor, MonitorDeps};
use wghealth::prober::{ProbeOutcome, Prober};
use wghealth::wg_repo::{WgPeer, WgTool};

pub const KEY_A: &str = "xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=";
pub const KEY_B: &str = "TrMvSoP4jYQlY6RIzBgbssQqY3vxI2Pi+y71lOWWXX0=";
/// Contains '+' and '/' so it has to be percent-encoded in a path.
pub const KEY_SLASH: &str = "a+b/cdEFghIJklMNopQRstUVwxYZ0123456789+/ab=";

#[derive(Default)]
pub struct FakeWg {
    interfaces: Mutex<Vec<String>>,
    peers: Mutex<HashMap<String, Vec<WgPeer>>>,
    pub keepalive_writes: Mutex<Vec<(String, String, u64)>>,
    pub dump_calls: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_dump: AtomicBool,
    pub fail_keepalive: AtomicBool,
}

impl FakeWg {
    pub fn with_interface(name: &str, peers: Vec<WgPeer>) -> Arc<Self> {
        let wg = Self::default();
        wg.set_peers(name, peers);
        Arc::new(wg)
    }

    /// Replaces the peer list of `name`, bringing the interface up if needed.
    pub fn set_peers(&self, name: &str, peers: Vec<WgPeer>) {
        let mut ifaces = self.interfaces.lock().unwrap();
        if !ifaces.iter().any(|i| i == name) {
            ifaces.push(name.to_string());
        }
        self.peers.lock().unwrap().insert(name.to_string(), peers);
    }

    pub fn bring_down(&self, name: &str) {
        self.interfaces.lock().unwrap().retain(|i| i != name);
    }

    pub fn keepalive_write_count(&self) -> usize {
        self.keepalive_writes.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl WgTool for FakeWg {
    async fn list_interfaces(&self) -> anyhow::Result<Vec<String>> {
        if self.fail_list.load(Ordering::SeqCst) {
            anyhow::bail!("wg show interfaces failed: permission denied");
        }
        Ok(self.interfaces.lock().unwrap().clone())
    }

    async fn dump(&self, interface: &str) -> anyhow::Result<Vec<WgPeer>> {
        self.dump_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_dump.load(Ordering::SeqCst) {
            anyhow::bail!("wg show {} dump failed: No such device", interface);
        }
        Ok(self
            .peers
            .lock()
            .unwrap()
            .get(interface)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_persistent_keepalive(
        &self,
        interface: &str,
        public_key: &str,
        seconds: u64,
    ) -> anyhow::Result<()> {
        if self.fail_keepalive.load(Ordering::SeqCst) {
            anyhow::bail!("wg set failed: Operation not permitted");
        }
        self.keepalive_writes.lock().unwrap().push((
            interface.to_string(),
            public_key.to_string(),
            seconds,
        ));
        if let Some(peers) = self.peers.lock().unwrap().get_mut(interface) {
            for p in peers.iter_mut().filter(|p| p.public_key == public_key) {
                p.persistent_keepalive = Some(seconds);
            }
        }
        Ok(())
    }
}

/// Returns scripted outcomes in order, then the fallback. Counts every call.
pub struct ScriptedProber {
    script: Mutex<VecDeque<ProbeOutcome>>,
    fallback: ProbeOutcome,
    delay: Duration,
    calls: AtomicUsize,
    pub targets: Mutex<Vec<IpAddr>>,
}

impl ScriptedProber {
    pub fn always(outcome: ProbeOutcome) -> Arc<Self> {
        Self::with_delay(outcome, Duration::ZERO)
    }

    pub fn with_delay(outcome: ProbeOutcome, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: outcome,
            delay,
            calls: AtomicUsize::new(0),
            targets: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, outcome: ProbeOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, ip: IpAddr, _timeout: Duration) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.targets.lock().unwrap().push(ip);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}

/// Peer with a /32 tunnel address and a handshake `handshake_ago_secs` in the past.
pub fn peer(
    key: &str,
    ip: &str,
    endpoint: Option<&str>,
    handshake_ago_secs: Option<i64>,
) -> WgPeer {
    WgPeer {
        public_key: key.to_string(),
        endpoint: endpoint.map(str::to_string),
        allowed_ips: vec![format!("{}/32", ip)],
        latest_handshake: handshake_ago_secs.map(|ago| Utc::now().timestamp() - ago),
        persistent_keepalive: Some(25),
    }
}

pub fn test_monitor_config() -> MonitorConfig {
    MonitorConfig {
        autostart: false,
        startup_delay_secs: 0,
        ..MonitorConfig::default()
    }
}

pub fn monitor_with(
    wg: Arc<FakeWg>,
    prober: Arc<ScriptedProber>,
    config: MonitorConfig,
) -> Arc<HealthMonitor> {
    HealthMonitor::new(
        MonitorDeps {
            wg,
            prober,
            config_repo: None,
        },
        config,
        HashMap::new(),
    )
}

pub fn monitor(wg: Arc<FakeWg>, prober: Arc<ScriptedProber>) -> Arc<HealthMonitor> {
    monitor_with(wg, prober, test_monitor_config())
}
