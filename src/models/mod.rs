// Domain models: interface configs, peer records, statistics

mod interface;
mod peer;
mod stats;

pub use interface::{
    InterfaceConfig, InterfaceConfigPatch, InterfaceSnapshot, KEEPALIVE_RANGE, PING_INTERVAL_RANGE,
};
pub use peer::{PeerHealthRecord, PeerStatus};
pub use stats::{CycleReport, MonitorStats, StatusSnapshot};
