use thiserror::Error;

/// Top-level error type for the `netpulse-probe` crate.
///
/// Every failure a single probe can hit: deadline expiry, transport
/// failures (connect, TLS, DNS, HTTP), external tool invocation, and
/// parsing of tool output. `netpulse-core` records these into sub-test
/// results; they never escape a diagnostic run.
#[derive(Debug, Error)]
pub enum ProbeError {
    // ── Deadlines ───────────────────────────────────────────────────
    /// The probe did not complete within its budget.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    // ── Transport ───────────────────────────────────────────────────
    /// TCP connect refused, unreachable, etc.
    #[error("connection to {target} failed: {reason}")]
    Connect { target: String, reason: String },

    /// TLS setup, handshake or certificate verification failure.
    #[error("TLS handshake with {server} failed: {reason}")]
    Tls { server: String, reason: String },

    /// Name resolution failure (NXDOMAIN, no resolver, no A records).
    #[error("DNS lookup for {name} failed: {reason}")]
    Dns { name: String, reason: String },

    /// HTTP transport error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // ── External tools ──────────────────────────────────────────────
    /// An OS utility could not be spawned or exited unusably.
    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    /// Tool output did not have the expected shape.
    #[error("failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    pub(crate) fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub(crate) fn parse(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error represents a deadline expiry rather than a hard failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
