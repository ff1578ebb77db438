// ── Slow-streak detection ──
//
// One left-to-right pass over a host's speed tests. A run of at least
// `min_streak` consecutive slow samples becomes a candidate incident.

use tracing::debug;

use crate::config::DetectorConfig;
use crate::model::{CandidateIncident, SpeedTestSample};

#[derive(Debug, Clone, Default)]
pub struct IncidentDetector {
    config: DetectorConfig,
}

impl IncidentDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn is_slow(&self, sample: &SpeedTestSample) -> bool {
        sample.download_mbps < self.config.download_threshold_mbps
            || sample.upload_mbps < self.config.upload_threshold_mbps
    }

    /// Scan time-ordered `samples` for sustained slowdowns.
    ///
    /// Samples with non-finite speeds are ignored: they neither extend nor
    /// break a streak.
    pub fn detect(&self, host_id: &str, samples: &[SpeedTestSample]) -> Vec<CandidateIncident> {
        let min_streak = self.config.effective_min_streak();
        let mut incidents = Vec::new();
        let mut streak: Vec<&SpeedTestSample> = Vec::new();

        for sample in samples {
            if !sample.download_mbps.is_finite() || !sample.upload_mbps.is_finite() {
                continue;
            }
            if self.is_slow(sample) {
                streak.push(sample);
                continue;
            }
            if streak.len() >= min_streak {
                incidents.push(materialize(host_id, &streak));
            }
            streak.clear();
        }
        if streak.len() >= min_streak {
            incidents.push(materialize(host_id, &streak));
        }

        debug!(
            host = host_id,
            samples = samples.len(),
            incidents = incidents.len(),
            "detection pass"
        );
        incidents
    }
}

fn materialize(host_id: &str, streak: &[&SpeedTestSample]) -> CandidateIncident {
    let n = streak.len() as f64;
    let pings: Vec<f64> = streak
        .iter()
        .filter_map(|s| s.ping_ms)
        .filter(|p| p.is_finite())
        .collect();
    let avg_ping = if pings.is_empty() {
        None
    } else {
        Some(pings.iter().sum::<f64>() / pings.len() as f64)
    };

    // `streak` is non-empty whenever this is called.
    let start_time = streak.first().map(|s| s.timestamp).unwrap_or_default();
    let end_time = streak.last().map(|s| s.timestamp).unwrap_or_default();

    CandidateIncident {
        host_id: host_id.to_owned(),
        start_time,
        end_time,
        samples: streak.iter().map(|s| (*s).clone()).collect(),
        avg_download: streak.iter().map(|s| s.download_mbps).sum::<f64>() / n,
        avg_upload: streak.iter().map(|s| s.upload_mbps).sum::<f64>() / n,
        avg_ping,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()
    }

    fn series(downloads: &[f64]) -> Vec<SpeedTestSample> {
        downloads
            .iter()
            .enumerate()
            .map(|(i, d)| SpeedTestSample {
                timestamp: base() + Duration::minutes(10 * i64::try_from(i).unwrap()),
                download_mbps: *d,
                upload_mbps: 10.0,
                ping_ms: Some(20.0),
            })
            .collect()
    }

    #[test]
    fn fast_samples_yield_nothing() {
        let detector = IncidentDetector::default();
        assert!(detector.detect("h1", &series(&[25.0, 25.0, 25.0])).is_empty());
    }

    #[test]
    fn streak_followed_by_fast_sample() {
        let detector = IncidentDetector::default();
        let samples = series(&[10.0, 8.0, 9.0, 25.0]);
        let incidents = detector.detect("h1", &samples);

        assert_eq!(incidents.len(), 1);
        let inc = &incidents[0];
        assert_eq!(inc.start_time, samples[0].timestamp);
        assert_eq!(inc.end_time, samples[2].timestamp);
        assert_eq!(inc.samples.len(), 3);
        assert!((inc.avg_download - 9.0).abs() < 1e-9);
        assert_eq!(inc.avg_ping, Some(20.0));
    }

    #[test]
    fn short_streaks_are_ignored() {
        let detector = IncidentDetector::default();
        let incidents = detector.detect("h1", &series(&[10.0, 10.0, 30.0, 5.0, 30.0, 1.0, 2.0]));
        assert!(incidents.is_empty());
    }

    #[test]
    fn streak_at_end_of_input_is_materialized() {
        let detector = IncidentDetector::default();
        let incidents = detector.detect("h1", &series(&[30.0, 1.0, 2.0, 3.0, 4.0]));
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].samples.len(), 4);
    }

    #[test]
    fn slow_upload_alone_counts() {
        let detector = IncidentDetector::default();
        let mut samples = series(&[50.0, 50.0, 50.0]);
        for s in &mut samples {
            s.upload_mbps = 2.0;
        }
        assert_eq!(detector.detect("h1", &samples).len(), 1);
    }

    #[test]
    fn non_finite_samples_are_skipped() {
        let detector = IncidentDetector::default();
        let incidents = detector.detect("h1", &series(&[10.0, f64::NAN, 8.0, 9.0, 25.0]));
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].samples.len(), 3);
    }

    #[test]
    fn detection_is_idempotent() {
        let detector = IncidentDetector::default();
        let samples = series(&[1.0, 2.0, 3.0, 40.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(detector.detect("h1", &samples), detector.detect("h1", &samples));
    }

    #[test]
    fn configurable_min_streak() {
        let detector = IncidentDetector::new(DetectorConfig {
            min_streak: 1,
            ..DetectorConfig::default()
        });
        assert_eq!(detector.detect("h1", &series(&[1.0, 30.0, 2.0])).len(), 2);
    }
}
