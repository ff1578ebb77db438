// netpulse-core: Host diagnostics, call-quality scoring and fleet incident analysis.

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod fleet;
pub mod incident;
pub mod model;
pub mod quality;
pub mod store;

use std::sync::Arc;

use netpulse_probe::Probe;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    CorrelatorConfig, DetectorConfig, DiagnosticConfig, DiagnosticThresholds, FleetConfig,
    QualityConfig, TcpTarget,
};
pub use diagnostic::DiagnosticEngine;
pub use error::CoreError;
pub use fleet::{FleetAggregator, MachineAnalyzer, fleet_health_score};
pub use incident::{IncidentCorrelator, IncidentDetector};
pub use quality::QualityScorer;
pub use store::{LoadStats, MemoryStore, TelemetryStore};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Diagnostics
    DiagnosticReport, Layer, LayerResult, Status, TestResult,
    // Telemetry
    HostTelemetry, PingSample, SpeedTestSample, TelemetrySample, TimeWindow, WifiSample,
    // Incidents
    AccessPoint, CandidateIncident, ConnectionType, CorrelatedFactor, Direction, FactorCategory,
    MetricChange, Severity, SlowdownIncident,
    // Fleet
    FleetReport, FleetSummary, MachineReport, MachineStatus,
    // Quality
    Codec, QualityResult, Rating,
};

// ── Entry points ────────────────────────────────────────────────────

/// One diagnostic run with a freshly built engine.
pub async fn run_diagnostic<P: Probe>(probe: P, config: DiagnosticConfig) -> DiagnosticReport {
    DiagnosticEngine::new(probe, config).run().await
}

/// Single-host incident analysis with default heuristics.
pub fn analyze_machine(
    host_id: &str,
    telemetry: &HostTelemetry,
    window: &TimeWindow,
) -> MachineReport {
    MachineAnalyzer::default().analyze(host_id, telemetry, window)
}

/// Fleet analysis over `hosts`, or every host in `store` when `hosts` is
/// empty.
pub async fn analyze_fleet<S: TelemetryStore>(
    store: Arc<S>,
    hosts: &[String],
    window: TimeWindow,
    analyzer: MachineAnalyzer,
    config: FleetConfig,
) -> Result<FleetReport, CoreError> {
    let aggregator = FleetAggregator::new(store, analyzer, config);
    if hosts.is_empty() {
        aggregator.analyze_all(window).await
    } else {
        Ok(aggregator.analyze(hosts, window).await)
    }
}
