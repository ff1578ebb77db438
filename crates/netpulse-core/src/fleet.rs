// ── Fleet aggregation ──
//
// Runs detection and correlation for every host of a fleet and rolls the
// per-host results up into one report. Work is CPU-bound, so each host is
// analysed on the blocking pool; the reduction does not depend on the
// order in which hosts finish.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{CorrelatorConfig, DetectorConfig, FleetConfig};
use crate::error::CoreError;
use crate::incident::{IncidentCorrelator, IncidentDetector};
use crate::model::{
    FleetReport, FleetSummary, HostTelemetry, MachineReport, MachineStatus, TimeWindow,
};
use crate::store::TelemetryStore;

/// Single-host analysis: detection followed by correlation of every
/// candidate. Pure; owns no I/O.
#[derive(Debug, Clone, Default)]
pub struct MachineAnalyzer {
    detector: IncidentDetector,
    correlator: IncidentCorrelator,
}

impl MachineAnalyzer {
    pub fn new(detector: DetectorConfig, correlator: CorrelatorConfig) -> Self {
        Self {
            detector: IncidentDetector::new(detector),
            correlator: IncidentCorrelator::new(correlator),
        }
    }

    /// `window` widened by the correlation margins, so incidents near its
    /// edges still see their WiFi and ping context.
    pub fn context_window(&self, window: &TimeWindow) -> TimeWindow {
        let cfg = self.correlator.config();
        TimeWindow::new(
            window.start - Duration::minutes(cfg.before_window_mins.max(0)),
            window.end + Duration::minutes(cfg.factor_margin_mins.max(0)),
        )
    }

    /// Analyse the speed tests of `telemetry` that fall inside `window`.
    /// WiFi and ping samples outside the window are still used as
    /// correlation context.
    pub fn analyze(
        &self,
        host_id: &str,
        telemetry: &HostTelemetry,
        window: &TimeWindow,
    ) -> MachineReport {
        let mut speed_tests: Vec<_> = telemetry
            .speed_tests
            .iter()
            .filter(|s| window.contains(s.timestamp))
            .cloned()
            .collect();
        if speed_tests.is_empty() {
            return MachineReport::marker(host_id, MachineStatus::NoData);
        }
        speed_tests.sort_by_key(|s| s.timestamp);

        let incidents: Vec<_> = self
            .detector
            .detect(host_id, &speed_tests)
            .into_iter()
            .map(|candidate| {
                self.correlator
                    .correlate(candidate, &telemetry.wifi, &telemetry.pings)
            })
            .collect();

        let status = if incidents.is_empty() {
            MachineStatus::Ok
        } else {
            MachineStatus::Degraded
        };
        MachineReport {
            host_id: host_id.to_owned(),
            status,
            samples_analyzed: speed_tests.len(),
            avg_download: mean(speed_tests.iter().map(|s| s.download_mbps)),
            avg_upload: mean(speed_tests.iter().map(|s| s.upload_mbps)),
            avg_ping: mean(speed_tests.iter().filter_map(|s| s.ping_ms)),
            incident_count: incidents.len(),
            incidents,
            error: None,
        }
    }
}

pub struct FleetAggregator<S: TelemetryStore> {
    store: Arc<S>,
    analyzer: Arc<MachineAnalyzer>,
    config: FleetConfig,
}

impl<S: TelemetryStore> FleetAggregator<S> {
    pub fn new(store: Arc<S>, analyzer: MachineAnalyzer, config: FleetConfig) -> Self {
        Self {
            store,
            analyzer: Arc::new(analyzer),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn analyze_machine(
        &self,
        host_id: &str,
        telemetry: &HostTelemetry,
        window: &TimeWindow,
    ) -> MachineReport {
        self.analyzer.analyze(host_id, telemetry, window)
    }

    /// Analyse every host the store knows about.
    pub async fn analyze_all(&self, window: TimeWindow) -> Result<FleetReport, CoreError> {
        let hosts = self.store.hosts()?;
        Ok(self.analyze(&hosts, window).await)
    }

    /// Analyse `hosts` over `window`. Per-host failures and deadline
    /// expiry are reported as machine statuses; the batch always completes.
    pub async fn analyze(&self, hosts: &[String], window: TimeWindow) -> FleetReport {
        let started = std::time::Instant::now();
        let mut pending: BTreeSet<String> = hosts.iter().cloned().collect();
        let context = self.analyzer.context_window(&window);

        let mut tasks = JoinSet::new();
        for host in &pending {
            let host = host.clone();
            let store = Arc::clone(&self.store);
            let analyzer = Arc::clone(&self.analyzer);
            tasks.spawn_blocking(move || {
                let report = match store.query(&host, &context) {
                    Ok(telemetry) => analyzer.analyze(&host, &telemetry, &window),
                    Err(e) => {
                        warn!(host = %host, error = %e, "telemetry query failed");
                        MachineReport {
                            error: Some(e.to_string()),
                            ..MachineReport::marker(host.as_str(), MachineStatus::Error)
                        }
                    }
                };
                (host, report)
            });
        }

        let mut reports = Vec::with_capacity(pending.len());
        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((host, report)) => {
                        debug!(host = %host, status = %report.status, "host analysed");
                        pending.remove(&host);
                        reports.push(report);
                    }
                    Err(e) => warn!(error = %e, "host analysis task failed"),
                }
            }
        };
        let timed_out = match self.config.deadline() {
            Some(deadline) => tokio::time::timeout(deadline, collect).await.is_err(),
            None => {
                collect.await;
                false
            }
        };
        if timed_out {
            warn!(remaining = pending.len(), "fleet analysis deadline elapsed");
        }

        for host in pending {
            let report = if timed_out {
                MachineReport::marker(host, MachineStatus::TimedOut)
            } else {
                MachineReport {
                    error: Some("analysis task failed".to_owned()),
                    ..MachineReport::marker(host, MachineStatus::Error)
                }
            };
            reports.push(report);
        }
        reports.sort_by(|a, b| a.host_id.cmp(&b.host_id));

        let report = rollup(reports, &window);
        info!(
            machines = report.total_machines,
            analysed = report.machines_analyzed,
            incidents = report.total_incidents,
            health = report.fleet_summary.health_score,
            elapsed_ms = started.elapsed().as_millis(),
            "fleet analysis complete"
        );
        report
    }
}

/// Fold per-host reports (already sorted) into a fleet report.
pub fn rollup(machine_reports: Vec<MachineReport>, window: &TimeWindow) -> FleetReport {
    let analyzed: Vec<&MachineReport> = machine_reports
        .iter()
        .filter(|r| r.status.is_analyzed())
        .collect();
    let with_issues = analyzed.iter().filter(|r| r.incident_count > 0).count();
    let total_incidents = analyzed.iter().map(|r| r.incident_count).sum();

    let fleet_summary = FleetSummary {
        avg_download: mean(analyzed.iter().filter_map(|r| r.avg_download)),
        avg_upload: mean(analyzed.iter().filter_map(|r| r.avg_upload)),
        avg_ping: mean(analyzed.iter().filter_map(|r| r.avg_ping)),
        health_score: fleet_health_score(analyzed.len(), with_issues, total_incidents),
    };

    FleetReport {
        analysis_time: Utc::now(),
        period_hours: window.hours(),
        total_machines: machine_reports.len(),
        machines_analyzed: analyzed.len(),
        machines_with_issues: with_issues,
        total_incidents,
        fleet_summary,
        machine_reports,
    }
}

/// `100 - 40 * (hosts with incidents / hosts analysed) - min(30, 5 * incidents)`,
/// rounded and clamped to 0..=100. Zero when nothing was analysed.
pub fn fleet_health_score(analyzed: usize, with_incidents: usize, total_incidents: usize) -> u8 {
    if analyzed == 0 {
        return 0;
    }
    let affected = with_incidents.min(analyzed) as f64 / analyzed as f64;
    let incident_penalty = (5.0 * total_incidents as f64).min(30.0);
    let score = (100.0 - 40.0 * affected - incident_penalty).round();
    score.clamp(0.0, 100.0) as u8
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0_u32), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / f64::from(count))
}
