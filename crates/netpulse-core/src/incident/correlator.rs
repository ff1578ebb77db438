// ── Cross-signal incident correlation ──
//
// Attaches WiFi and ping context to a candidate incident: connection type,
// dominant access point, threshold factors around the incident, and a
// before/during delta per metric. Missing telemetry only shortens the
// factor and change lists.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::recommend;
use crate::config::CorrelatorConfig;
use crate::model::{
    AccessPoint, CandidateIncident, ConnectionType, CorrelatedFactor, Direction, FactorCategory,
    MetricChange, PingSample, Severity, SlowdownIncident, TimeWindow, WifiSample,
};

#[derive(Debug, Clone, Default)]
pub struct IncidentCorrelator {
    config: CorrelatorConfig,
}

impl IncidentCorrelator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    pub fn correlate(
        &self,
        candidate: CandidateIncident,
        wifi: &[WifiSample],
        pings: &[PingSample],
    ) -> SlowdownIncident {
        let cfg = &self.config;
        let during = TimeWindow::new(candidate.start_time, candidate.end_time);
        let around = during.expand(Duration::minutes(cfg.factor_margin_mins));
        let before = TimeWindow::new(
            candidate.start_time - Duration::minutes(cfg.before_window_mins),
            candidate.start_time - Duration::minutes(cfg.before_gap_mins),
        );

        let wifi_during: Vec<&WifiSample> = in_window(wifi, &during, |s| s.timestamp);
        let connection_type = self.connection_type(&wifi_during);
        let access_point =
            (connection_type == ConnectionType::Wifi).then(|| dominant_access_point(&wifi_during));

        let mut factors = self.wifi_factors(
            connection_type,
            &in_window(wifi, &around, |s| s.timestamp),
        );
        factors.extend(self.ping_factors(&in_window(pings, &around, |s| s.timestamp)));
        factors.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });

        let tracked_changes = self.metric_changes(wifi, pings, &before, &during);
        let trigger_factors = trigger_factors(&tracked_changes, &factors);
        let metric_changes: Vec<MetricChange> =
            tracked_changes.into_iter().map(|(_, change)| change).collect();

        let categories: BTreeSet<FactorCategory> = factors
            .iter()
            .map(|f| f.category)
            .chain(
                metric_changes
                    .iter()
                    .filter(|c| c.is_significant)
                    .map(|c| c.category),
            )
            .collect();
        let recommendations = recommend::recommendations(connection_type, &categories);
        let summary = recommend::summary(
            &candidate,
            connection_type,
            access_point.as_ref(),
            &categories,
        );

        debug!(
            host = %candidate.host_id,
            connection = %connection_type,
            factors = factors.len(),
            changes = metric_changes.len(),
            "incident correlated"
        );

        SlowdownIncident {
            host_id: candidate.host_id,
            start_time: candidate.start_time,
            end_time: candidate.end_time,
            samples: candidate.samples,
            avg_download: candidate.avg_download,
            avg_upload: candidate.avg_upload,
            avg_ping: candidate.avg_ping,
            connection_type,
            access_point,
            factors,
            metric_changes,
            trigger_factors,
            summary,
            recommendations,
        }
    }

    // ── Connection type ──────────────────────────────────────────────

    fn connection_type(&self, wifi_during: &[&WifiSample]) -> ConnectionType {
        if wifi_during.is_empty() {
            return ConnectionType::Ethernet;
        }
        let wired = wifi_during.iter().any(|s| {
            s.ssid.as_deref().is_some_and(|ssid| {
                let ssid = ssid.to_lowercase();
                self.config
                    .wired_labels
                    .iter()
                    .any(|label| ssid.contains(&label.to_lowercase()))
            })
        });
        if wired {
            ConnectionType::Ethernet
        } else if wifi_during.iter().any(|s| s.rssi.is_some_and(|r| r < 0.0)) {
            ConnectionType::Wifi
        } else {
            ConnectionType::Unknown
        }
    }

    // ── Factors ──────────────────────────────────────────────────────

    fn wifi_factors(
        &self,
        connection: ConnectionType,
        wifi: &[&WifiSample],
    ) -> Vec<CorrelatedFactor> {
        let cfg = &self.config;
        let mut out = Vec::new();

        if connection != ConnectionType::Ethernet {
            let weak: Vec<(DateTime<Utc>, f64)> = wifi
                .iter()
                .filter_map(|s| s.rssi.map(|r| (s.timestamp, r)))
                .filter(|(_, r)| r.is_finite() && *r < cfg.rssi_warning_dbm)
                .collect();
            out.extend(worst(&weak, Extreme::Min).map(|(ts, rssi)| {
                let severity = if rssi < cfg.rssi_critical_dbm {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                factor(
                    FactorCategory::WifiSignal,
                    format!(
                        "Weak WiFi signal: {rssi:.0} dBm ({} samples below {:.0} dBm)",
                        weak.len(),
                        cfg.rssi_warning_dbm
                    ),
                    severity,
                    ts,
                    "rssi",
                    rssi,
                    weak.len(),
                )
            }));
        }

        let poor: Vec<(DateTime<Utc>, f64)> = wifi
            .iter()
            .filter_map(|s| s.quality_score.map(|q| (s.timestamp, q)))
            .filter(|(_, q)| q.is_finite() && *q < cfg.quality_warning)
            .collect();
        out.extend(worst(&poor, Extreme::Min).map(|(ts, quality)| {
            factor(
                FactorCategory::WifiQuality,
                format!(
                    "Low WiFi link quality: {quality:.0} ({} samples below {:.0})",
                    poor.len(),
                    cfg.quality_warning
                ),
                Severity::Warning,
                ts,
                "quality_score",
                quality,
                poor.len(),
            )
        }));

        let noisy: Vec<(DateTime<Utc>, f64)> = wifi
            .iter()
            .filter_map(|s| s.effective_snr().map(|snr| (s.timestamp, snr)))
            .filter(|(_, snr)| snr.is_finite() && *snr < cfg.snr_warning_db)
            .collect();
        out.extend(worst(&noisy, Extreme::Min).map(|(ts, snr)| {
            factor(
                FactorCategory::Interference,
                format!(
                    "Low signal-to-noise ratio: {snr:.0} dB ({} samples below {:.0} dB)",
                    noisy.len(),
                    cfg.snr_warning_db
                ),
                Severity::Warning,
                ts,
                "snr",
                snr,
                noisy.len(),
            )
        }));

        for sample in wifi {
            let Some(message) = sample.message.as_deref() else {
                continue;
            };
            let lowered = message.to_lowercase();
            if cfg
                .event_keywords
                .iter()
                .any(|k| lowered.contains(&k.to_lowercase()))
            {
                let mut metrics = BTreeMap::new();
                if let Some(rssi) = sample.rssi {
                    metrics.insert("rssi".to_owned(), rssi);
                }
                out.push(CorrelatedFactor {
                    category: FactorCategory::WifiEvent,
                    description: format!("WiFi event: {message}"),
                    severity: Severity::Warning,
                    timestamp: sample.timestamp,
                    metrics,
                });
            }
        }

        out
    }

    fn ping_factors(&self, pings: &[&PingSample]) -> Vec<CorrelatedFactor> {
        let cfg = &self.config;
        let mut out = Vec::new();

        let latencies: Vec<(DateTime<Utc>, f64)> = pings
            .iter()
            .map(|p| (p.timestamp, p.latency_ms))
            .filter(|(_, l)| l.is_finite())
            .collect();

        let slow: Vec<_> = latencies
            .iter()
            .copied()
            .filter(|(_, l)| *l > cfg.internet_latency_warning_ms)
            .collect();
        out.extend(worst(&slow, Extreme::Max).map(|(ts, latency)| {
            let severity = if latency > cfg.internet_latency_critical_ms {
                Severity::Critical
            } else {
                Severity::Warning
            };
            factor(
                FactorCategory::InternetLatency,
                format!(
                    "High internet latency: {latency:.0} ms ({} samples above {:.0} ms)",
                    slow.len(),
                    cfg.internet_latency_warning_ms
                ),
                severity,
                ts,
                "latency_ms",
                latency,
                slow.len(),
            )
        }));

        let elevated: Vec<_> = latencies
            .iter()
            .copied()
            .filter(|(_, l)| {
                *l > cfg.gateway_latency_info_ms && *l <= cfg.internet_latency_warning_ms
            })
            .collect();
        out.extend(worst(&elevated, Extreme::Max).map(|(ts, latency)| {
            factor(
                FactorCategory::GatewayLatency,
                format!(
                    "Elevated latency: {latency:.0} ms ({} samples above {:.0} ms)",
                    elevated.len(),
                    cfg.gateway_latency_info_ms
                ),
                Severity::Info,
                ts,
                "latency_ms",
                latency,
                elevated.len(),
            )
        }));

        let lossy: Vec<(DateTime<Utc>, f64)> = pings
            .iter()
            .filter_map(|p| p.packet_loss_percent.map(|l| (p.timestamp, l)))
            .filter(|(_, l)| l.is_finite() && *l > cfg.loss_warning_percent)
            .collect();
        out.extend(worst(&lossy, Extreme::Max).map(|(ts, loss)| {
            let severity = if loss > cfg.loss_critical_percent {
                Severity::Critical
            } else {
                Severity::Warning
            };
            factor(
                FactorCategory::PacketLoss,
                format!(
                    "Packet loss: {loss:.1}% ({} samples above {:.0}%)",
                    lossy.len(),
                    cfg.loss_warning_percent
                ),
                severity,
                ts,
                "packet_loss_percent",
                loss,
                lossy.len(),
            )
        }));

        out
    }

    // ── Delta analysis ───────────────────────────────────────────────

    fn metric_changes(
        &self,
        wifi: &[WifiSample],
        pings: &[PingSample],
        before: &TimeWindow,
        during: &TimeWindow,
    ) -> Vec<(DeltaMetric, MetricChange)> {
        let cfg = &self.config;
        let tracked = [
            TrackedMetric {
                kind: DeltaMetric::Rssi,
                label: "RSSI",
                unit: " dBm",
                category: FactorCategory::WifiSignal,
                deadband: cfg.rssi_deadband_dbm,
            },
            TrackedMetric {
                kind: DeltaMetric::QualityScore,
                label: "WiFi quality",
                unit: "",
                category: FactorCategory::WifiQuality,
                deadband: cfg.quality_deadband,
            },
            TrackedMetric {
                kind: DeltaMetric::Latency,
                label: "Latency",
                unit: " ms",
                category: FactorCategory::InternetLatency,
                deadband: cfg.latency_deadband_ms,
            },
            TrackedMetric {
                kind: DeltaMetric::PacketLoss,
                label: "Packet loss",
                unit: "%",
                category: FactorCategory::PacketLoss,
                deadband: cfg.loss_deadband_pp,
            },
        ];

        let mut out = Vec::new();
        for metric in tracked {
            let series: Vec<(DateTime<Utc>, f64)> = match metric.kind {
                DeltaMetric::Rssi => wifi
                    .iter()
                    .filter_map(|s| s.rssi.map(|v| (s.timestamp, v)))
                    .collect(),
                DeltaMetric::QualityScore => wifi
                    .iter()
                    .filter_map(|s| s.quality_score.map(|v| (s.timestamp, v)))
                    .collect(),
                DeltaMetric::Latency => {
                    pings.iter().map(|p| (p.timestamp, p.latency_ms)).collect()
                }
                DeltaMetric::PacketLoss => pings
                    .iter()
                    .filter_map(|p| p.packet_loss_percent.map(|v| (p.timestamp, v)))
                    .collect(),
            };
            let (Some(before_value), Some(during_value)) =
                (mean_in(&series, before), mean_in(&series, during))
            else {
                continue;
            };

            let change_amount = during_value - before_value;
            let change_percent = if before_value.abs() > f64::EPSILON {
                change_amount / before_value.abs() * 100.0
            } else {
                0.0
            };
            let direction = if change_amount > metric.deadband {
                Direction::Increased
            } else if change_amount < -metric.deadband {
                Direction::Decreased
            } else {
                Direction::Stable
            };
            let is_significant = match metric.kind {
                DeltaMetric::Rssi => change_amount < -cfg.rssi_drop_significant_dbm,
                DeltaMetric::QualityScore => {
                    change_percent < -cfg.quality_drop_significant_percent
                }
                DeltaMetric::Latency => change_amount > cfg.latency_increase_significant_ms,
                DeltaMetric::PacketLoss => change_amount > cfg.loss_increase_significant_pp,
            };
            let unit = metric.unit;
            let description = match direction {
                Direction::Stable => {
                    format!("{} stable at {during_value:.1}{unit}", metric.label)
                }
                _ => format!(
                    "{} {direction} from {before_value:.1}{unit} to {during_value:.1}{unit} ({change_amount:+.1}{unit})",
                    metric.label
                ),
            };

            let change = MetricChange {
                metric_name: metric.kind.name().to_owned(),
                category: metric.category,
                before_value,
                during_value,
                change_amount,
                change_percent,
                direction,
                is_significant,
                description,
            };
            out.push((metric.kind, change));
        }
        out
    }
}

/// Metrics compared before and during an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeltaMetric {
    Rssi,
    QualityScore,
    Latency,
    PacketLoss,
}

impl DeltaMetric {
    fn name(self) -> &'static str {
        match self {
            Self::Rssi => "rssi",
            Self::QualityScore => "quality_score",
            Self::Latency => "latency",
            Self::PacketLoss => "packet_loss",
        }
    }
}

struct TrackedMetric {
    kind: DeltaMetric,
    label: &'static str,
    unit: &'static str,
    category: FactorCategory,
    deadband: f64,
}

#[derive(Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

/// Worst offender; ties keep the earliest sample.
fn worst(offenders: &[(DateTime<Utc>, f64)], extreme: Extreme) -> Option<(DateTime<Utc>, f64)> {
    offenders.iter().copied().reduce(|best, next| {
        let better = match extreme {
            Extreme::Min => next.1 < best.1,
            Extreme::Max => next.1 > best.1,
        };
        if better { next } else { best }
    })
}

fn factor(
    category: FactorCategory,
    description: String,
    severity: Severity,
    timestamp: DateTime<Utc>,
    metric: &str,
    value: f64,
    samples_affected: usize,
) -> CorrelatedFactor {
    CorrelatedFactor {
        category,
        description,
        severity,
        timestamp,
        metrics: BTreeMap::from([
            (metric.to_owned(), value),
            ("samples_affected".to_owned(), samples_affected as f64),
        ]),
    }
}

fn in_window<'a, T>(
    items: &'a [T],
    window: &TimeWindow,
    timestamp: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<&'a T> {
    items
        .iter()
        .filter(|item| window.contains(timestamp(item)))
        .collect()
}

fn mean_in(series: &[(DateTime<Utc>, f64)], window: &TimeWindow) -> Option<f64> {
    let values: Vec<f64> = series
        .iter()
        .filter(|(ts, v)| window.contains(*ts) && v.is_finite())
        .map(|(_, v)| *v)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn dominant_access_point(wifi: &[&WifiSample]) -> AccessPoint {
    let ssid = most_frequent(wifi.iter().filter_map(|s| s.ssid.clone()));
    let bssid = most_frequent(wifi.iter().filter_map(|s| s.bssid.clone()));
    let channel = most_frequent(wifi.iter().filter_map(|s| s.channel));

    AccessPoint {
        ssid,
        bssid,
        channel,
        avg_rssi: mean(wifi.iter().filter_map(|s| s.rssi).filter(|r| *r < 0.0)),
        avg_snr: mean(wifi.iter().filter_map(|s| s.snr).filter(|s| *s > 0.0)),
        tx_rate: mean(wifi.iter().filter_map(|s| s.tx_rate).filter(|t| *t > 0.0)),
    }
}

/// Mode of `values`; ties go to the value seen first.
fn most_frequent<T: PartialEq>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    let top = counts.iter().map(|(_, n)| *n).max()?;
    counts.into_iter().find(|(_, n)| *n == top).map(|(v, _)| v)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0_u32), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / f64::from(n))
}

fn trigger_factors(
    changes: &[(DeltaMetric, MetricChange)],
    factors: &[CorrelatedFactor],
) -> Vec<String> {
    let mut out: Vec<String> = changes
        .iter()
        .filter(|(_, c)| c.is_significant)
        .map(|(kind, c)| match kind {
            DeltaMetric::Rssi => format!(
                "WiFi signal degradation: RSSI dropped from {:.1} dBm to {:.1} dBm",
                c.before_value, c.during_value
            ),
            DeltaMetric::QualityScore => format!(
                "WiFi quality degradation: quality score fell {:.0}% ({:.1} to {:.1})",
                -c.change_percent, c.before_value, c.during_value
            ),
            DeltaMetric::Latency => format!(
                "Latency increase: ping rose from {:.1} ms to {:.1} ms",
                c.before_value, c.during_value
            ),
            DeltaMetric::PacketLoss => format!(
                "Packet loss increase: loss rose from {:.1}% to {:.1}%",
                c.before_value, c.during_value
            ),
        })
        .collect();
    out.extend(
        factors
            .iter()
            .filter(|f| f.category == FactorCategory::WifiEvent)
            .map(|f| f.description.clone()),
    );
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use crate::model::SpeedTestSample;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 14, 0, 0).unwrap()
    }

    fn at(min: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(min)
    }

    /// Incident spanning minutes 0..=20.
    fn candidate() -> CandidateIncident {
        let samples: Vec<SpeedTestSample> = [0, 10, 20]
            .into_iter()
            .map(|m| SpeedTestSample {
                timestamp: at(m),
                download_mbps: 8.0,
                upload_mbps: 4.0,
                ping_ms: Some(40.0),
            })
            .collect();
        CandidateIncident {
            host_id: "host-7".into(),
            start_time: at(0),
            end_time: at(20),
            samples,
            avg_download: 8.0,
            avg_upload: 4.0,
            avg_ping: Some(40.0),
        }
    }

    fn wifi(min: i64, rssi: f64) -> WifiSample {
        WifiSample {
            timestamp: at(min),
            rssi: Some(rssi),
            ssid: Some("HomeNet".into()),
            bssid: Some("aa:bb:cc:00:00:01".into()),
            channel: Some(36),
            ..WifiSample::default()
        }
    }

    fn ping(min: i64, latency: f64, loss: f64) -> PingSample {
        PingSample {
            timestamp: at(min),
            latency_ms: latency,
            packet_loss_percent: Some(loss),
        }
    }

    #[test]
    fn rssi_drop_is_significant_and_triggers() {
        let samples = vec![
            wifi(-12, -56.0),
            wifi(-6, -54.0),
            wifi(2, -77.0),
            wifi(10, -79.0),
            wifi(18, -78.0),
        ];
        let incident = IncidentCorrelator::default().correlate(candidate(), &samples, &[]);

        assert_eq!(incident.connection_type, ConnectionType::Wifi);
        let rssi = incident
            .metric_changes
            .iter()
            .find(|c| c.metric_name == "rssi")
            .unwrap();
        assert!((rssi.before_value + 55.0).abs() < 1e-9);
        assert!((rssi.during_value + 78.0).abs() < 1e-9);
        assert_eq!(rssi.direction, Direction::Decreased);
        assert!(rssi.is_significant);
        assert!(
            incident
                .trigger_factors
                .iter()
                .any(|t| t.contains("signal degradation"))
        );
        assert!(
            incident
                .recommendations
                .iter()
                .any(|r| r.contains("move closer / reduce obstructions"))
        );
    }

    #[test]
    fn access_point_uses_mode_and_valid_averages() {
        let mut a = wifi(2, -60.0);
        a.tx_rate = Some(400.0);
        let mut b = wifi(8, -70.0);
        b.bssid = Some("aa:bb:cc:00:00:02".into());
        b.tx_rate = Some(0.0);
        let mut c = wifi(14, -65.0);
        c.channel = Some(149);
        c.snr = Some(30.0);
        let incident = IncidentCorrelator::default().correlate(candidate(), &[a, b, c], &[]);

        let ap = incident.access_point.unwrap();
        assert_eq!(ap.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(ap.bssid.as_deref(), Some("aa:bb:cc:00:00:01"));
        assert_eq!(ap.channel, Some(36));
        assert!((ap.avg_rssi.unwrap() + 65.0).abs() < 1e-9);
        assert_eq!(ap.avg_snr, Some(30.0));
        assert_eq!(ap.tx_rate, Some(400.0));
    }

    #[test]
    fn wired_label_or_missing_wifi_means_ethernet() {
        let correlator = IncidentCorrelator::default();
        let none = correlator.correlate(candidate(), &[], &[]);
        assert_eq!(none.connection_type, ConnectionType::Ethernet);
        assert!(none.access_point.is_none());
        assert!(none.factors.is_empty());
        assert!(none.metric_changes.is_empty());
        assert!(
            none.recommendations
                .iter()
                .any(|r| r.contains("check cable/port/switch"))
        );

        let mut wired = wifi(5, -40.0);
        wired.ssid = Some("Wired Connection 1".into());
        let labelled = correlator.correlate(candidate(), &[wired], &[]);
        assert_eq!(labelled.connection_type, ConnectionType::Ethernet);
    }

    #[test]
    fn wired_link_with_only_quality_factor_still_gets_advice() {
        let mut wired = wifi(5, -40.0);
        wired.ssid = Some("Wired connection".into());
        wired.quality_score = Some(30.0);
        let incident = IncidentCorrelator::default().correlate(candidate(), &[wired], &[]);

        assert_eq!(incident.connection_type, ConnectionType::Ethernet);
        let categories: Vec<_> = incident.factors.iter().map(|f| f.category).collect();
        assert_eq!(categories, vec![FactorCategory::WifiQuality]);
        assert!(!incident.recommendations.is_empty());
        assert!(
            incident
                .recommendations
                .iter()
                .any(|r| r.contains("check cable/port/switch"))
        );
    }

    #[test]
    fn delta_metric_names_match_wire_names() {
        let names: Vec<_> = [
            DeltaMetric::Rssi,
            DeltaMetric::QualityScore,
            DeltaMetric::Latency,
            DeltaMetric::PacketLoss,
        ]
        .into_iter()
        .map(DeltaMetric::name)
        .collect();
        assert_eq!(names, vec!["rssi", "quality_score", "latency", "packet_loss"]);
    }

    #[test]
    fn samples_without_negative_rssi_are_unknown() {
        let sample = WifiSample {
            timestamp: at(5),
            ssid: Some("Cafe".into()),
            ..WifiSample::default()
        };
        let incident = IncidentCorrelator::default().correlate(candidate(), &[sample], &[]);
        assert_eq!(incident.connection_type, ConnectionType::Unknown);
    }

    #[test]
    fn factors_are_ranked_by_severity_then_time() {
        let samples = vec![wifi(-3, -72.0), wifi(4, -84.0), wifi(12, -75.0)];
        let pings = vec![ping(1, 60.0, 0.0), ping(6, 250.0, 8.0), ping(22, 30.0, 25.0)];
        let incident = IncidentCorrelator::default().correlate(candidate(), &samples, &pings);

        let summary: Vec<(FactorCategory, Severity)> = incident
            .factors
            .iter()
            .map(|f| (f.category, f.severity))
            .collect();
        assert_eq!(
            summary,
            vec![
                (FactorCategory::WifiSignal, Severity::Critical),
                (FactorCategory::InternetLatency, Severity::Critical),
                (FactorCategory::PacketLoss, Severity::Critical),
                (FactorCategory::GatewayLatency, Severity::Info),
            ]
        );

        let signal = &incident.factors[0];
        assert_eq!(signal.timestamp, at(4));
        assert!((signal.metrics["samples_affected"] - 3.0).abs() < f64::EPSILON);
        assert!((incident.factors[2].metrics["packet_loss_percent"] - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wifi_signal_factor_skipped_on_ethernet() {
        let mut weak = wifi(5, -85.0);
        weak.ssid = Some("ethernet".into());
        let incident = IncidentCorrelator::default().correlate(candidate(), &[weak], &[]);
        assert!(
            incident
                .factors
                .iter()
                .all(|f| f.category != FactorCategory::WifiSignal)
        );
    }

    #[test]
    fn wifi_events_emit_one_factor_each() {
        let mut roam = wifi(3, -60.0);
        roam.message = Some("Roamed to aa:bb:cc:00:00:02".into());
        let mut lost = wifi(9, -61.0);
        lost.message = Some("Disconnected: reason 4".into());
        let quiet = WifiSample {
            message: Some("scan complete".into()),
            ..wifi(12, -60.0)
        };

        let incident =
            IncidentCorrelator::default().correlate(candidate(), &[roam, lost, quiet], &[]);
        let events: Vec<_> = incident
            .factors
            .iter()
            .filter(|f| f.category == FactorCategory::WifiEvent)
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(
            incident
                .trigger_factors
                .iter()
                .filter(|t| t.starts_with("WiFi event"))
                .count(),
            2
        );
        assert!(
            incident
                .recommendations
                .iter()
                .any(|r| r.contains("investigate stability"))
        );
    }

    #[test]
    fn latency_and_loss_deltas_use_deadbands() {
        let pings = vec![
            ping(-10, 20.0, 0.0),
            ping(-4, 22.0, 0.0),
            ping(5, 24.0, 0.4),
            ping(15, 22.0, 0.4),
        ];
        let incident = IncidentCorrelator::default().correlate(candidate(), &[], &pings);

        let latency = incident
            .metric_changes
            .iter()
            .find(|c| c.metric_name == "latency")
            .unwrap();
        assert_eq!(latency.direction, Direction::Stable);
        assert!(!latency.is_significant);

        let loss = incident
            .metric_changes
            .iter()
            .find(|c| c.metric_name == "packet_loss")
            .unwrap();
        assert_eq!(loss.direction, Direction::Stable);
        assert!((loss.change_percent).abs() < f64::EPSILON);
    }

    #[test]
    fn quality_drop_uses_percentage() {
        let with_quality = |min, q| WifiSample {
            quality_score: Some(q),
            ..wifi(min, -60.0)
        };
        let samples = vec![with_quality(-8, 80.0), with_quality(6, 60.0)];
        let incident = IncidentCorrelator::default().correlate(candidate(), &samples, &[]);

        let quality = incident
            .metric_changes
            .iter()
            .find(|c| c.metric_name == "quality_score")
            .unwrap();
        assert!((quality.change_percent + 25.0).abs() < 1e-9);
        assert!(quality.is_significant);
        assert!(
            incident
                .trigger_factors
                .iter()
                .any(|t| t.starts_with("WiFi quality degradation"))
        );
    }

    #[test]
    fn correlation_is_deterministic() {
        let samples = vec![wifi(-10, -50.0), wifi(5, -75.0)];
        let pings = vec![ping(-5, 20.0, 0.0), ping(5, 150.0, 6.0)];
        let correlator = IncidentCorrelator::default();
        assert_eq!(
            correlator.correlate(candidate(), &samples, &pings),
            correlator.correlate(candidate(), &samples, &pings)
        );
    }
}
