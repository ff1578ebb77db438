// ── Historical telemetry samples ──

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestSample {
    pub timestamp: DateTime<Utc>,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    #[serde(default)]
    pub ping_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WifiSample {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub rssi: Option<f64>,
    #[serde(default)]
    pub snr: Option<f64>,
    #[serde(default)]
    pub noise: Option<f64>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub bssid: Option<String>,
    #[serde(default)]
    pub channel: Option<u32>,
    #[serde(default)]
    pub tx_rate: Option<f64>,
    /// Free-form event text from the collector (disconnects, roams).
    #[serde(default)]
    pub message: Option<String>,
}

impl WifiSample {
    /// Signal-to-noise ratio, derived from RSSI and noise floor when both are known.
    pub fn effective_snr(&self) -> Option<f64> {
        match (self.rssi, self.noise) {
            (Some(rssi), Some(noise)) => Some(rssi - noise),
            _ => self.snr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingSample {
    pub timestamp: DateTime<Utc>,
    pub latency_ms: f64,
    #[serde(default)]
    pub packet_loss_percent: Option<f64>,
}

/// One raw telemetry record, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetrySample {
    SpeedTest(SpeedTestSample),
    Wifi(WifiSample),
    Ping(PingSample),
}

impl TelemetrySample {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SpeedTest(s) => s.timestamp,
            Self::Wifi(s) => s.timestamp,
            Self::Ping(s) => s.timestamp,
        }
    }
}

/// All telemetry for one host, each series ordered by time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostTelemetry {
    pub speed_tests: Vec<SpeedTestSample>,
    pub wifi: Vec<WifiSample>,
    pub pings: Vec<PingSample>,
}

impl HostTelemetry {
    pub fn push(&mut self, sample: TelemetrySample) {
        match sample {
            TelemetrySample::SpeedTest(s) => self.speed_tests.push(s),
            TelemetrySample::Wifi(s) => self.wifi.push(s),
            TelemetrySample::Ping(s) => self.pings.push(s),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.speed_tests.is_empty() && self.wifi.is_empty() && self.pings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.speed_tests.len() + self.wifi.len() + self.pings.len()
    }

    /// Stable sort of every series by timestamp.
    pub fn sort(&mut self) {
        self.speed_tests.sort_by_key(|s| s.timestamp);
        self.wifi.sort_by_key(|s| s.timestamp);
        self.pings.sort_by_key(|s| s.timestamp);
    }

    /// Copy of the samples inside `window`, sorted.
    pub fn within(&self, window: &TimeWindow) -> Self {
        let mut out = Self {
            speed_tests: self
                .speed_tests
                .iter()
                .filter(|s| window.contains(s.timestamp))
                .cloned()
                .collect(),
            wifi: self
                .wifi
                .iter()
                .filter(|s| window.contains(s.timestamp))
                .cloned()
                .collect(),
            pings: self
                .pings
                .iter()
                .filter(|s| window.contains(s.timestamp))
                .cloned()
                .collect(),
        };
        out.sort();
        out
    }
}

/// Closed time interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// The `hours` leading up to `end`.
    pub fn ending_at(end: DateTime<Utc>, hours: u32) -> Self {
        Self::new(end - Duration::hours(i64::from(hours)), end)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Widen both edges by `margin`.
    pub fn expand(&self, margin: Duration) -> Self {
        Self::new(self.start - margin, self.end + margin)
    }

    pub fn hours(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 3600.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(min)
    }

    #[test]
    fn sample_tag_round_trips_through_json() {
        let json = r#"{"type":"speed_test","timestamp":"2026-03-01T12:00:00Z","download_mbps":12,"upload_mbps":3.5}"#;
        let sample: TelemetrySample = serde_json::from_str(json).unwrap();
        let TelemetrySample::SpeedTest(st) = &sample else {
            panic!("expected speed test, got {sample:?}");
        };
        assert!((st.download_mbps - 12.0).abs() < f64::EPSILON);
        assert_eq!(st.ping_ms, None);

        let back = serde_json::to_value(&sample).unwrap();
        assert_eq!(back["type"], "speed_test");
    }

    #[test]
    fn within_filters_inclusively_and_sorts() {
        let mut telemetry = HostTelemetry::default();
        for min in [10, 0, 5, 20] {
            telemetry.push(TelemetrySample::Ping(PingSample {
                timestamp: at(min),
                latency_ms: 10.0,
                packet_loss_percent: None,
            }));
        }

        let slice = telemetry.within(&TimeWindow::new(at(0), at(10)));
        let stamps: Vec<_> = slice.pings.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![at(0), at(5), at(10)]);
    }

    #[test]
    fn snr_prefers_rssi_minus_noise() {
        let sample = WifiSample {
            timestamp: at(0),
            rssi: Some(-60.0),
            noise: Some(-95.0),
            snr: Some(10.0),
            ..WifiSample::default()
        };
        assert_eq!(sample.effective_snr(), Some(35.0));
    }

    #[test]
    fn window_normalises_reversed_bounds() {
        let w = TimeWindow::new(at(60), at(0));
        assert_eq!(w.start, at(0));
        assert!((w.hours() - 1.0).abs() < f64::EPSILON);
    }
}
