// ── Sibling telemetry cache ──
//
// Latest WiFi and ping readings published by sibling collectors. One
// writer per cell, any number of readers; reads never block.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::types::{PingSnapshot, WifiSnapshot};

/// Freshness is judged by the reader; the cache only keeps the latest value.
#[derive(Debug)]
pub struct SnapshotCache {
    wifi: ArcSwapOption<WifiSnapshot>,
    ping: ArcSwapOption<PingSnapshot>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            wifi: ArcSwapOption::empty(),
            ping: ArcSwapOption::empty(),
        }
    }

    pub fn store_wifi(&self, snapshot: WifiSnapshot) {
        self.wifi.store(Some(Arc::new(snapshot)));
    }

    pub fn store_ping(&self, snapshot: PingSnapshot) {
        self.ping.store(Some(Arc::new(snapshot)));
    }

    pub fn wifi(&self) -> Option<WifiSnapshot> {
        self.wifi.load_full().map(|s| (*s).clone())
    }

    pub fn ping(&self) -> Option<PingSnapshot> {
        self.ping.load_full().map(|s| *s)
    }

    pub fn clear(&self) {
        self.wifi.store(None);
        self.ping.store(None);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn latest_write_wins() {
        let cache = SnapshotCache::new();
        assert!(cache.ping().is_none());

        for latency in [12.0, 48.5] {
            cache.store_ping(PingSnapshot {
                latency_ms: latency,
                packet_loss_percent: None,
                timestamp: Utc::now(),
            });
        }
        assert!((cache.ping().unwrap().latency_ms - 48.5).abs() < f64::EPSILON);

        cache.clear();
        assert!(cache.ping().is_none());
        assert!(cache.wifi().is_none());
    }

    #[test]
    fn readers_on_other_threads_see_writes() {
        let cache = Arc::new(SnapshotCache::new());
        cache.store_wifi(WifiSnapshot {
            ssid: Some("lab".into()),
            bssid: None,
            rssi: Some(-58.0),
            snr: None,
            channel: Some(11),
            tx_rate: None,
            timestamp: Utc::now(),
        });

        let reader = Arc::clone(&cache);
        let ssid = std::thread::spawn(move || reader.wifi().and_then(|w| w.ssid))
            .join()
            .unwrap();
        assert_eq!(ssid.as_deref(), Some("lab"));
    }
}
