// ── Core error types ──
//
// Expected conditions (no telemetry, failed probes, partial data) are
// reported through status markers in results, never through this type.
// `CoreError` covers the genuinely exceptional: unreadable stores and I/O.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Telemetry store ──────────────────────────────────────────────
    #[error("Telemetry store error: {message}")]
    Store { message: String },

    // ── I/O ──────────────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
