// ── Slowdown incidents ──
//
// `IncidentDetector` finds sustained slow speed-test streaks;
// `IncidentCorrelator` explains them with WiFi and ping context.

pub mod correlator;
pub mod detector;
pub mod recommend;

pub use correlator::IncidentCorrelator;
pub use detector::IncidentDetector;
