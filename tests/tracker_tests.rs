// Status derivation, success window and endpoint tracking

use chrono::{DateTime, TimeDelta, Utc};
use wghealth::models::{PeerHealthRecord, PeerStatus};
use wghealth::prober::ProbeOutcome;
use wghealth::tracker::{
    SuccessWindow, TrackerSettings, apply_probe, derive_status, due_for_probe, observe,
    probe_window,
};
use wghealth::wg_repo::WgPeer;

const KEY: &str = "xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=";

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_750_000_000, 0).unwrap()
}

fn mins(m: i64) -> Option<TimeDelta> {
    Some(TimeDelta::minutes(m))
}

fn wg_peer(endpoint: Option<&str>, handshake_ago_secs: Option<i64>) -> WgPeer {
    WgPeer {
        public_key: KEY.into(),
        endpoint: endpoint.map(str::to_string),
        allowed_ips: vec!["10.8.0.5/32".into(), "192.168.50.0/24".into()],
        latest_handshake: handshake_ago_secs.map(|a| now().timestamp() - a),
        persistent_keepalive: None,
    }
}

#[test]
fn test_derive_status_priority() {
    let s = TrackerSettings::default();
    assert_eq!(derive_status(None, Some(true), &s), PeerStatus::Unknown);
    assert_eq!(derive_status(mins(16), Some(true), &s), PeerStatus::Offline);
    assert_eq!(derive_status(mins(10), Some(true), &s), PeerStatus::Recent);
    assert_eq!(derive_status(mins(10), Some(false), &s), PeerStatus::Recent);
    assert_eq!(derive_status(mins(2), None, &s), PeerStatus::Recent);
    assert_eq!(derive_status(mins(2), Some(false), &s), PeerStatus::Unpingable);
    assert_eq!(derive_status(mins(1), Some(true), &s), PeerStatus::Online);
}

#[test]
fn test_derive_status_uses_configured_thresholds() {
    let s = TrackerSettings {
        online_threshold: TimeDelta::seconds(30),
        offline_threshold: TimeDelta::seconds(60),
        ..TrackerSettings::default()
    };
    assert_eq!(derive_status(mins(2), Some(true), &s), PeerStatus::Offline);
    assert_eq!(
        derive_status(Some(TimeDelta::seconds(45)), Some(true), &s),
        PeerStatus::Recent
    );
    assert_eq!(
        derive_status(Some(TimeDelta::seconds(10)), Some(true), &s),
        PeerStatus::Online
    );
}

#[test]
fn test_success_window_is_bounded() {
    let mut w = SuccessWindow::new(20);
    assert_eq!(w.rate(), 0.0);
    for _ in 0..100 {
        w.push(false);
    }
    assert_eq!(w.len(), 20);
    assert_eq!(w.rate(), 0.0);
    for _ in 0..20 {
        w.push(true);
    }
    assert_eq!(w.rate(), 100.0);
}

#[test]
fn test_success_window_rate_stays_in_range() {
    let mut w = SuccessWindow::new(7);
    for i in 0..50u32 {
        w.push(i % 3 != 0);
        let r = w.rate();
        assert!((0.0..=100.0).contains(&r), "rate {r} out of range");
    }
    w = SuccessWindow::new(3);
    w.push(true);
    w.push(false);
    w.push(false);
    assert_eq!(w.rate(), 33.3);
}

#[test]
fn test_observe_fills_record_from_dump() {
    let s = TrackerSettings::default();
    let mut rec = PeerHealthRecord::new("wg0", KEY, 20);
    let roamed = observe(
        &mut rec,
        &wg_peer(Some("1.2.3.4:51820"), Some(120)),
        Some("laptop"),
        now(),
        &s,
    );

    assert!(!roamed);
    assert_eq!(rec.vpn_ip.as_deref(), Some("10.8.0.5"));
    assert_eq!(rec.name, "laptop");
    assert_eq!(rec.last_endpoint, "1.2.3.4:51820");
    assert_eq!(rec.status, PeerStatus::Recent);
    assert_eq!(
        rec.last_handshake_time,
        Some(now() - TimeDelta::seconds(120))
    );
}

#[test]
fn test_observe_detects_roam_and_decays_flag() {
    let s = TrackerSettings::default();
    let mut rec = PeerHealthRecord::new("wg0", KEY, 20);
    observe(&mut rec, &wg_peer(Some("1.2.3.4:51820"), Some(5)), None, now(), &s);

    let t1 = now() + TimeDelta::seconds(30);
    assert!(observe(&mut rec, &wg_peer(Some("5.6.7.8:51820"), Some(5)), None, t1, &s));
    assert!(rec.endpoint_changed);
    assert_eq!(rec.last_endpoint, "5.6.7.8:51820");

    // still inside the decay window
    let t2 = t1 + TimeDelta::seconds(30);
    assert!(!observe(&mut rec, &wg_peer(Some("5.6.7.8:51820"), Some(5)), None, t2, &s));
    assert!(rec.endpoint_changed);

    let t3 = t1 + TimeDelta::seconds(61);
    observe(&mut rec, &wg_peer(Some("5.6.7.8:51820"), Some(5)), None, t3, &s);
    assert!(!rec.endpoint_changed);
}

#[test]
fn test_observe_ignores_missing_endpoint() {
    let s = TrackerSettings::default();
    let mut rec = PeerHealthRecord::new("wg0", KEY, 20);
    observe(&mut rec, &wg_peer(Some("1.2.3.4:51820"), Some(5)), None, now(), &s);
    assert!(!observe(&mut rec, &wg_peer(None, Some(5)), None, now(), &s));
    assert_eq!(rec.last_endpoint, "1.2.3.4:51820");
    assert!(!rec.endpoint_changed);
}

#[test]
fn test_apply_probe_keeps_last_good_rtt() {
    let s = TrackerSettings::default();
    let mut rec = PeerHealthRecord::new("wg0", KEY, 20);
    observe(&mut rec, &wg_peer(None, Some(5)), None, now(), &s);

    apply_probe(&mut rec, ProbeOutcome::ok(12.341), now(), &s);
    assert_eq!(rec.ping_rtt_ms, Some(12.34));
    assert_eq!(rec.status, PeerStatus::Online);

    apply_probe(&mut rec, ProbeOutcome::failed(), now(), &s);
    assert_eq!(rec.ping_rtt_ms, Some(12.34));
    assert_eq!(rec.status, PeerStatus::Unpingable);
    assert_eq!(rec.ping_success_rate, 50.0);
    assert!(!rec.is_pingable);
}

#[test]
fn test_probe_outside_window_counts_as_not_probed() {
    let s = TrackerSettings::default();
    let mut rec = PeerHealthRecord::new("wg0", KEY, 20);
    observe(&mut rec, &wg_peer(None, Some(5)), None, now(), &s);
    apply_probe(&mut rec, ProbeOutcome::ok(1.0), now(), &s);

    let later = now() + TimeDelta::minutes(10);
    let mut fresh = wg_peer(None, None);
    fresh.latest_handshake = Some(later.timestamp() - 5);
    observe(&mut rec, &fresh, None, later, &s);
    assert_eq!(rec.status, PeerStatus::Recent);
}

#[test]
fn test_slow_interval_keeps_probe_result_current() {
    let s = TrackerSettings::default();
    let mut rec = PeerHealthRecord::new("wg0", KEY, 20);
    rec.ping_interval = TimeDelta::seconds(300);
    observe(&mut rec, &wg_peer(None, Some(5)), None, now(), &s);
    apply_probe(&mut rec, ProbeOutcome::ok(4.0), now(), &s);
    assert_eq!(rec.status, PeerStatus::Online);

    // between two probes, handshake still fresh
    let t1 = now() + TimeDelta::seconds(210);
    let mut fresh = wg_peer(None, None);
    fresh.latest_handshake = Some(t1.timestamp() - 10);
    observe(&mut rec, &fresh, None, t1, &s);
    assert!(!due_for_probe(&rec, rec.ping_interval, t1, &s));
    assert_eq!(rec.status, PeerStatus::Online);

    // next probe is overdue past interval plus one cycle pause
    let t2 = now() + TimeDelta::seconds(400);
    fresh.latest_handshake = Some(t2.timestamp() - 10);
    observe(&mut rec, &fresh, None, t2, &s);
    assert_eq!(rec.status, PeerStatus::Recent);
}

#[test]
fn test_probe_window_never_below_online_threshold() {
    let s = TrackerSettings::default();
    let mut rec = PeerHealthRecord::new("wg0", KEY, 20);
    assert_eq!(probe_window(&rec, &s), TimeDelta::seconds(180));
    rec.ping_interval = TimeDelta::seconds(30);
    assert_eq!(probe_window(&rec, &s), TimeDelta::seconds(180));
    rec.ping_interval = TimeDelta::seconds(300);
    assert_eq!(probe_window(&rec, &s), TimeDelta::seconds(330));
}

#[test]
fn test_due_for_probe_respects_interval() {
    let s = TrackerSettings::default();
    let interval = TimeDelta::seconds(30);
    let mut rec = PeerHealthRecord::new("wg0", KEY, 20);
    observe(&mut rec, &wg_peer(None, Some(5)), None, now(), &s);
    assert!(due_for_probe(&rec, interval, now(), &s));

    apply_probe(&mut rec, ProbeOutcome::ok(1.0), now(), &s);
    assert!(!due_for_probe(&rec, interval, now() + TimeDelta::seconds(10), &s));
    assert!(due_for_probe(&rec, interval, now() + TimeDelta::seconds(30), &s));
}

#[test]
fn test_peer_status_serializes_lowercase() {
    let json = serde_json::to_string(&PeerStatus::Unpingable).unwrap();
    assert_eq!(json, "\"unpingable\"");
}

#[test]
fn test_record_omits_rtt_until_first_success() {
    let rec = PeerHealthRecord::new("wg0", KEY, 20);
    let json = serde_json::to_value(&rec).unwrap();
    assert!(json.get("ping_rtt_ms").is_none());
    assert_eq!(json["status"], "unknown");
    assert!(json.get("window").is_none());
}
