/// Errors surfaced by a [`Bus`](crate::Bus) implementation.
///
/// `Connection` is the only variant that is fatal (it can only happen while
/// the client is being built). Everything else is a steady-state failure the
/// SDK logs and recovers from, except `Timeout`, which is handed back to the
/// caller of a request as a distinct result.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("connect to '{url}': {detail}")]
    Connection { url: String, detail: String },

    #[error("subscribe to '{subject}': {detail}")]
    Subscribe { subject: String, detail: String },

    #[error("send to '{subject}': {detail}")]
    Send { subject: String, detail: String },

    #[error("request to '{subject}' timed out after {timeout_ms} ms")]
    Timeout { subject: String, timeout_ms: u64 },

    #[error("bus is not connected")]
    NotConnected,

    #[error("bus is closed")]
    Closed,
}

impl BusError {
    pub fn send(subject: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        BusError::Send { subject: subject.into(), detail: detail.to_string() }
    }

    pub fn subscribe(subject: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        BusError::Subscribe { subject: subject.into(), detail: detail.to_string() }
    }

    pub fn timeout(subject: impl Into<String>, timeout: std::time::Duration) -> Self {
        BusError::Timeout {
            subject: subject.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// True for the request/response deadline case.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BusError::Timeout { .. })
    }
}
