// Parsing of `wg show <iface> dump` output.
//
// The first line describes the interface (private-key, public-key, listen-port, fwmark).
// Every following line is a peer, tab separated:
// public-key, preshared-key, endpoint, allowed-ips, latest-handshake, transfer-rx, transfer-tx, persistent-keepalive

use std::net::IpAddr;

const INTERFACE_FIELDS: usize = 4;
const PEER_FIELDS: usize = 8;

/// One peer as reported by the WireGuard tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WgPeer {
    pub public_key: String,
    /// `None` when the tool reports `(none)`.
    pub endpoint: Option<String>,
    pub allowed_ips: Vec<String>,
    /// Unix seconds of the latest handshake; `None` when it never happened.
    pub latest_handshake: Option<i64>,
    /// `None` when keepalive is off.
    pub persistent_keepalive: Option<u64>,
}

pub fn parse_dump(output: &str) -> Vec<WgPeer> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            match fields.len() {
                INTERFACE_FIELDS => None,
                PEER_FIELDS => Some(parse_peer(&fields)),
                n => {
                    tracing::debug!(fields = n, "skipping unrecognised wg dump line");
                    None
                }
            }
        })
        .collect()
}

fn parse_peer(f: &[&str]) -> WgPeer {
    let endpoint = match f[2] {
        "" | "(none)" => None,
        e => Some(e.to_string()),
    };
    let allowed_ips = match f[3] {
        "" | "(none)" => Vec::new(),
        ips => ips.split(',').map(|s| s.trim().to_string()).collect(),
    };
    let latest_handshake = f[4].parse::<i64>().ok().filter(|&ts| ts > 0);
    let persistent_keepalive = f[7].parse::<u64>().ok().filter(|&k| k > 0);
    WgPeer {
        public_key: f[0].to_string(),
        endpoint,
        allowed_ips,
        latest_handshake,
        persistent_keepalive,
    }
}

/// Tunnel address of a peer: the first single-host entry (/32 or /128) in its allowed-ips.
pub fn vpn_ip(allowed_ips: &[String]) -> Option<IpAddr> {
    allowed_ips.iter().find_map(|entry| {
        let (addr, prefix) = match entry.split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (entry.as_str(), None),
        };
        let ip: IpAddr = addr.trim().parse().ok()?;
        let host_prefix = if ip.is_ipv4() { 32 } else { 128 };
        match prefix.map(|p| p.trim().parse::<u8>()) {
            None => Some(ip),
            Some(Ok(p)) if p == host_prefix => Some(ip),
            _ => None,
        }
    })
}
