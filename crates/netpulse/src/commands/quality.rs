//! `quality`: E-Model call-quality estimate.

use std::fmt::Write as _;

use serde::Serialize;

use netpulse_core::{Codec, QualityResult, QualityScorer};

use crate::cli::{CodecArg, QualityArgs};
use crate::error::CliError;
use crate::output::{self, Painter};

use super::Context;

impl From<CodecArg> for Codec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::G711 => Self::G711,
            CodecArg::G729 => Self::G729,
            CodecArg::Opus => Self::Opus,
            CodecArg::G7231 => Self::G7231,
            CodecArg::G722 => Self::G722,
        }
    }
}

/// Inputs echoed next to the score.
#[derive(Debug, Serialize)]
struct QualityOutput {
    latency_ms: f64,
    jitter_ms: f64,
    packet_loss_percent: f64,
    /// `None` for the codec-agnostic model.
    codec: Option<Codec>,
    #[serde(flatten)]
    result: QualityResult,
}

fn validate(args: &QualityArgs) -> Result<(), CliError> {
    for (field, value) in [
        ("latency", args.latency),
        ("jitter", args.jitter),
        ("loss", args.loss),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(CliError::Validation {
                field: field.into(),
                reason: format!("must be a non-negative number, got {value}"),
            });
        }
    }
    if args.loss > 100.0 {
        return Err(CliError::Validation {
            field: "loss".into(),
            reason: format!("is a percentage (0-100), got {}", args.loss),
        });
    }
    Ok(())
}

fn detail(q: &QualityOutput, painter: Painter) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "MOS:      {:.2}", q.result.mos);
    let _ = writeln!(out, "R-factor: {:.1}", q.result.r_factor);
    let _ = writeln!(out, "Rating:   {}", painter.rating(q.result.rating));
    let _ = writeln!(
        out,
        "Codec:    {}",
        q.codec.map_or_else(|| "simple model".into(), |c| c.to_string())
    );
    let _ = write!(out, "Impairments:");
    for (name, value) in &q.result.impairments {
        let _ = write!(out, "\n  {name:<13} {value:.2}");
    }
    if !q.result.recommendations.is_empty() {
        let _ = write!(out, "\nRecommendations:");
        for rec in &q.result.recommendations {
            let _ = write!(out, "\n  - {rec}");
        }
    }
    out
}

pub fn handle(args: &QualityArgs, ctx: &Context) -> Result<(), CliError> {
    validate(args)?;
    let scorer = QualityScorer::new(&ctx.config.quality);

    let (codec, result) = if args.simple {
        (None, scorer.score_simple(args.latency, args.jitter, args.loss))
    } else {
        let codec = args.codec.map_or(ctx.config.quality.codec, Codec::from);
        (
            Some(codec),
            scorer.score(args.latency, args.jitter, args.loss, codec),
        )
    };
    let report = QualityOutput {
        latency_ms: args.latency,
        jitter_ms: args.jitter,
        packet_loss_percent: args.loss,
        codec,
        result,
    };

    let painter = ctx.painter;
    let out = output::render_single(
        ctx.output,
        &report,
        |q| detail(q, painter),
        |q| format!("{:.2}", q.result.mos),
    )?;
    ctx.print(&out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(latency: f64, loss: f64) -> QualityArgs {
        QualityArgs {
            latency,
            jitter: 0.0,
            loss,
            codec: None,
            simple: false,
        }
    }

    #[test]
    fn rejects_out_of_range_inputs() {
        assert!(validate(&args(20.0, 0.5)).is_ok());
        assert!(validate(&args(-1.0, 0.0)).is_err());
        assert!(validate(&args(f64::NAN, 0.0)).is_err());
        assert!(validate(&args(20.0, 140.0)).is_err());
    }

    #[test]
    fn codec_args_map_onto_core_codecs() {
        assert_eq!(Codec::from(CodecArg::G7231), Codec::G7231);
        assert_eq!(Codec::from(CodecArg::Opus), Codec::Opus);
    }
}
