//! Seven-layer host diagnostics.
//!
//! [`DiagnosticEngine`] runs every sub-test of every layer concurrently
//! against a [`Probe`], then grades the complete set: per-layer status,
//! the waterfall (the lowest failing layer blocks everything above it),
//! and the weighted health score. A run never fails; probe errors,
//! timeouts and cancellation all end up as sub-test results.

mod checks;
mod context;
pub mod scoring;

use chrono::Utc;
use netpulse_probe::Probe;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::DiagnosticConfig;
use crate::model::{DiagnosticReport, Layer};
use context::RunContext;

pub use scoring::{aggregate_status, apply_waterfall, health_score, overall_status};

pub struct DiagnosticEngine<P: Probe> {
    probe: P,
    config: DiagnosticConfig,
}

impl<P: Probe> DiagnosticEngine<P> {
    pub fn new(probe: P, config: DiagnosticConfig) -> Self {
        Self { probe, config }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn config(&self) -> &DiagnosticConfig {
        &self.config
    }

    pub async fn run(&self) -> DiagnosticReport {
        self.run_with_cancel(&CancellationToken::new()).await
    }

    /// Run all layers. Sub-tests still pending when `cancel` fires or the
    /// run deadline elapses are recorded as cancelled.
    pub async fn run_with_cancel(&self, cancel: &CancellationToken) -> DiagnosticReport {
        let timestamp = Utc::now();
        let started = tokio::time::Instant::now();
        let ctx = RunContext::new(&self.probe, &self.config, cancel.child_token());

        let (l1, l2, l3, l4, l5, l6, l7) = tokio::join!(
            checks::physical(&ctx),
            checks::data_link(&ctx),
            checks::network(&ctx),
            checks::transport(&ctx),
            checks::session(&ctx),
            checks::presentation(&ctx),
            checks::application(&ctx),
        );

        let mut layers: Vec<_> = Layer::ALL
            .into_iter()
            .zip([l1, l2, l3, l4, l5, l6, l7])
            .map(|(layer, tests)| scoring::layer_result(layer, tests))
            .collect();
        let blocked_above = apply_waterfall(&mut layers);

        let report = DiagnosticReport {
            host: self.config.host_label.clone(),
            timestamp,
            overall_status: overall_status(&layers),
            health_score: health_score(&layers),
            layers,
            blocked_above,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            host = %report.host,
            status = %report.overall_status,
            health = report.health_score,
            blocked_above = ?report.blocked_above,
            duration_ms = report.duration_ms,
            "diagnostic run complete"
        );
        report
    }
}
