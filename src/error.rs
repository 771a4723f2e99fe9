// Errors returned by the control facade

/// Caller-facing failures. Probe failures and platform tool errors are never surfaced here.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("{0}")]
    Validation(String),
    #[error("interface {0} not found")]
    InterfaceNotFound(String),
    #[error("peer {0} not found")]
    PeerNotFound(String),
    #[error("a health cycle is already in progress")]
    Busy,
}
