//! E-Model (ITU-T G.107) derived call-quality scoring.
//!
//! Pure and deterministic. [`QualityScorer::score`] applies the full
//! delay / equipment impairment model for a codec; [`QualityScorer::score_simple`]
//! uses fixed linear deductions for lightweight call sites. Both map the
//! resulting R-factor through the same MOS curve and rating thresholds.

use std::collections::BTreeMap;

use crate::config::QualityConfig;
use crate::model::{Codec, QualityResult, Rating};

/// Default transmission rating `R0`.
const R0: f64 = 93.2;
/// Simultaneous impairment `Is`.
const SIMULTANEOUS_IMPAIRMENT: f64 = 1.41;
/// Fixed codec/packetisation delay added to one-way latency.
const CODEC_DELAY_MS: f64 = 20.0;
const DELAY_KNEE_MS: f64 = 177.3;

const LATENCY_ADVICE_MS: f64 = 150.0;
const JITTER_ADVICE_MS: f64 = 30.0;
const LOSS_ADVICE_PERCENT: f64 = 1.0;
/// Codecs with a lower `Bpl` degrade quickly under loss.
const FRAGILE_BPL: f64 = 15.0;

#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    advantage_factor: f64,
}

impl QualityScorer {
    pub fn new(config: &QualityConfig) -> Self {
        Self {
            advantage_factor: sanitize(config.advantage_factor),
        }
    }

    pub fn score(
        &self,
        latency_ms: f64,
        jitter_ms: f64,
        packet_loss_percent: f64,
        codec: Codec,
    ) -> QualityResult {
        let latency = sanitize(latency_ms);
        let jitter = sanitize(jitter_ms);
        let loss = sanitize(packet_loss_percent).min(100.0);

        let ta = latency + 2.0 * jitter + CODEC_DELAY_MS;
        let id = delay_impairment(ta);
        let ie_eff = codec.ie() + (95.0 - codec.ie()) * loss / (loss + codec.bpl());
        let r = (R0 - SIMULTANEOUS_IMPAIRMENT - id - ie_eff + self.advantage_factor)
            .clamp(0.0, 100.0);

        let impairments = BTreeMap::from([
            ("delay".to_owned(), id),
            ("equipment".to_owned(), ie_eff),
            ("simultaneous".to_owned(), SIMULTANEOUS_IMPAIRMENT),
            ("advantage".to_owned(), self.advantage_factor),
        ]);

        build_result(r, impairments, advice(latency, jitter, loss, Some(codec)))
    }

    /// Codec-agnostic variant with linear latency and loss deductions.
    pub fn score_simple(
        &self,
        latency_ms: f64,
        jitter_ms: f64,
        packet_loss_percent: f64,
    ) -> QualityResult {
        let latency = sanitize(latency_ms);
        let jitter = sanitize(jitter_ms);
        let loss = sanitize(packet_loss_percent).min(100.0);

        let effective = latency + 2.0 * jitter + 10.0;
        let delay = if effective < 160.0 {
            effective / 40.0
        } else {
            (effective - 120.0) / 10.0
        };
        let loss_deduction = 2.5 * loss;
        let r = (R0 - delay - loss_deduction).clamp(0.0, 100.0);

        let impairments = BTreeMap::from([
            ("delay".to_owned(), delay),
            ("loss".to_owned(), loss_deduction),
        ]);

        build_result(r, impairments, advice(latency, jitter, loss, None))
    }
}

/// [`QualityScorer::score`] with no advantage factor.
pub fn score(
    latency_ms: f64,
    jitter_ms: f64,
    packet_loss_percent: f64,
    codec: Codec,
) -> QualityResult {
    QualityScorer::default().score(latency_ms, jitter_ms, packet_loss_percent, codec)
}

/// Map an R-factor onto the 1.0-5.0 MOS scale.
pub fn r_to_mos(r: f64) -> f64 {
    if r <= 0.0 {
        return 1.0;
    }
    if r >= 100.0 {
        return 4.5;
    }
    let mos = 1.0 + 0.035 * r + r * (r - 60.0) * (100.0 - r) * 7.0e-6;
    mos.clamp(1.0, 5.0)
}

fn delay_impairment(ta: f64) -> f64 {
    let base = 0.024 * ta;
    if ta <= DELAY_KNEE_MS {
        base
    } else {
        let excess = ta - DELAY_KNEE_MS;
        base + 0.11 * excess * (-excess / DELAY_KNEE_MS).exp()
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn build_result(
    r: f64,
    impairments: BTreeMap<String, f64>,
    recommendations: Vec<String>,
) -> QualityResult {
    let mos = r_to_mos(r);
    QualityResult {
        mos,
        r_factor: r,
        rating: Rating::from_mos(mos),
        impairments,
        recommendations,
    }
}

fn advice(latency: f64, jitter: f64, loss: f64, codec: Option<Codec>) -> Vec<String> {
    let mut out = Vec::new();
    if latency > LATENCY_ADVICE_MS {
        out.push(format!(
            "High latency ({latency:.0} ms): prefer closer servers or a wired connection"
        ));
    }
    if jitter > JITTER_ADVICE_MS {
        out.push(format!(
            "High jitter ({jitter:.0} ms): enable QoS for real-time traffic or reduce competing load"
        ));
    }
    if loss > LOSS_ADVICE_PERCENT {
        out.push(format!(
            "Packet loss of {loss:.1}%: check WiFi signal, cabling and upstream congestion"
        ));
    }
    if let Some(codec) = codec {
        if loss > 0.0 && codec.bpl() < FRAGILE_BPL {
            out.push(format!(
                "Codec {codec} tolerates packet loss poorly: prefer Opus or G.711 with loss concealment"
            ));
        }
    }
    if out.is_empty() {
        out.push("Call quality is good: no action needed".to_owned());
    }
    out
}
