// ── Domain model ──
//
// Immutable value types produced by one analysis pass. JSON shape is a
// boundary concern: every type derives serde with snake_case enums.

pub mod diagnostic;
pub mod fleet;
pub mod incident;
pub mod quality;
pub mod telemetry;

// ── Re-exports ──────────────────────────────────────────────────────

pub use diagnostic::{DiagnosticReport, Layer, LayerResult, Status, TestResult};
pub use fleet::{FleetReport, FleetSummary, MachineReport, MachineStatus};
pub use incident::{
    AccessPoint, CandidateIncident, ConnectionType, CorrelatedFactor, Direction, FactorCategory,
    MetricChange, Severity, SlowdownIncident,
};
pub use quality::{Codec, QualityResult, Rating};
pub use telemetry::{
    HostTelemetry, PingSample, SpeedTestSample, TelemetrySample, TimeWindow, WifiSample,
};
