// ── Per-run shared state ──
//
// Several sub-tests read the same probe data (link state, WiFi reading,
// TLS handshake, session attempts). Each is fetched once per run through a
// `OnceCell`; if the sub-test doing the fetch is cut short, the next reader
// takes over the initialisation.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use netpulse_probe::{LinkInfo, Probe, ProbeError, TcpOutcome, TlsOutcome, WifiSnapshot};
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DiagnosticConfig;
use crate::model::{Layer, Status, TestResult};

/// A WiFi reading and where it came from.
#[derive(Debug, Clone)]
pub(crate) struct WifiReading {
    pub snapshot: WifiSnapshot,
    pub cached: bool,
}

pub(crate) struct RunContext<'a, P> {
    pub probe: &'a P,
    pub config: &'a DiagnosticConfig,
    /// Per-sub-test budget.
    pub limit: Duration,
    deadline: Instant,
    cancel: CancellationToken,
    link: OnceCell<Result<LinkInfo, ProbeError>>,
    wifi: OnceCell<Result<Option<WifiReading>, String>>,
    tls: OnceCell<Result<TlsOutcome, ProbeError>>,
    sessions: OnceCell<Vec<Result<TcpOutcome, ProbeError>>>,
}

impl<'a, P: Probe> RunContext<'a, P> {
    pub fn new(probe: &'a P, config: &'a DiagnosticConfig, cancel: CancellationToken) -> Self {
        Self {
            probe,
            config,
            limit: config.subtest_timeout(),
            deadline: Instant::now() + config.run_deadline(),
            cancel,
            link: OnceCell::new(),
            wifi: OnceCell::new(),
            tls: OnceCell::new(),
            sessions: OnceCell::new(),
        }
    }

    pub async fn link(&self) -> Result<&LinkInfo, &ProbeError> {
        self.link
            .get_or_init(|| self.probe.link_info())
            .await
            .as_ref()
    }

    /// WiFi state of the primary interface. `Ok(None)` for wired links and
    /// unassociated radios. A sufficiently fresh sibling reading is used
    /// instead of querying the radio.
    pub async fn wifi(&self) -> Result<Option<&WifiReading>, &str> {
        self.wifi
            .get_or_init(|| self.load_wifi())
            .await
            .as_ref()
            .map(Option::as_ref)
            .map_err(String::as_str)
    }

    async fn load_wifi(&self) -> Result<Option<WifiReading>, String> {
        let link = self.link().await;
        if let Ok(link) = link {
            if !link.is_wireless {
                return Ok(None);
            }
        }
        let max_age = chrono::Duration::seconds(self.config.wifi_cache_max_age_secs);
        if let Some(snapshot) = self.probe.cached_wifi() {
            if Utc::now() - snapshot.timestamp <= max_age {
                return Ok(Some(WifiReading {
                    snapshot,
                    cached: true,
                }));
            }
        }
        let link = link.map_err(ToString::to_string)?;
        self.probe
            .wifi_status(&link.interface)
            .await
            .map(|s| {
                s.map(|snapshot| WifiReading {
                    snapshot,
                    cached: false,
                })
            })
            .map_err(|e| e.to_string())
    }

    pub async fn tls(&self) -> Result<&TlsOutcome, &ProbeError> {
        self.tls
            .get_or_init(|| {
                self.probe
                    .tls_handshake(&self.config.tls_host, self.config.tls_port, self.limit)
            })
            .await
            .as_ref()
    }

    /// Repeated connects to the session target, sequential, sharing one
    /// sub-test budget.
    pub async fn sessions(&self) -> &[Result<TcpOutcome, ProbeError>] {
        self.sessions
            .get_or_init(|| async {
                let attempts = self.config.session_attempts.max(1);
                let budget = (self.limit / attempts).max(Duration::from_millis(1));
                let target = &self.config.session_target;
                let mut out = Vec::new();
                for _ in 0..attempts {
                    out.push(
                        self.probe
                            .tcp_connect(&target.host, target.port, budget)
                            .await,
                    );
                }
                out
            })
            .await
    }

    /// Run one sub-test under its timeout, the run deadline and the
    /// caller's cancellation. Always yields a result.
    pub async fn guard<F>(&self, layer: Layer, name: &str, advisory: bool, check: F) -> TestResult
    where
        F: Future<Output = TestResult>,
    {
        let started = Instant::now();
        let mut result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => cancelled(name, advisory),
            () = tokio::time::sleep_until(self.deadline) => cancelled(name, advisory),
            outcome = tokio::time::timeout(self.limit, check) => match outcome {
                Ok(result) => result,
                Err(_) => timed_out(name, advisory, self.limit),
            },
        };
        if result.latency_ms.is_none() && result.error.is_none() {
            result.latency_ms = Some(elapsed_ms(started));
        }
        debug!(
            layer = layer.number(),
            test = name,
            status = %result.status,
            "sub-test finished"
        );
        result
    }
}

/// Fail, or Warning for advisory sub-tests.
pub(crate) fn failing(advisory: bool) -> Status {
    if advisory {
        Status::Warning
    } else {
        Status::Fail
    }
}

fn timed_out(name: &str, advisory: bool, limit: Duration) -> TestResult {
    TestResult::new(
        name,
        failing(advisory),
        format!("No result within {} ms", limit.as_millis()),
    )
    .with_error(format!("timed out after {}ms", limit.as_millis()))
}

fn cancelled(name: &str, advisory: bool) -> TestResult {
    TestResult::new(name, failing(advisory), "Cancelled before completion").with_error("cancelled")
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
