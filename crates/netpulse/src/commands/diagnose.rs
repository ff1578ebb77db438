//! `diagnose`: run the layered diagnostic against this host.

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::time::Duration;

use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use netpulse_core::{DiagnosticEngine, DiagnosticReport, LayerResult, Status};
use netpulse_probe::SystemProbe;

use crate::cli::{DiagnoseArgs, OutputFormat};
use crate::error::CliError;
use crate::output::{self, Painter};

use super::Context;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LayerRow {
    #[tabled(rename = "#")]
    number: u8,
    #[tabled(rename = "Layer")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Latency (ms)")]
    latency: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

impl LayerRow {
    fn new(layer: &LayerResult, painter: Painter) -> Self {
        Self {
            number: layer.layer_number,
            name: layer.layer_name.clone(),
            status: painter.status(layer.status),
            latency: output::opt_f64(layer.latency_ms),
            summary: layer.summary.clone(),
        }
    }
}

fn detail(report: &DiagnosticReport, painter: Painter) -> String {
    let rows: Vec<LayerRow> = report
        .layers
        .iter()
        .map(|l| LayerRow::new(l, painter))
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "Host:     {}", painter.bold(&report.host));
    let _ = writeln!(out, "Status:   {}", painter.status(report.overall_status));
    let _ = writeln!(out, "Health:   {}/100", painter.score(report.health_score));
    if let Some(layer) = report.blocked_above {
        let _ = writeln!(out, "Blocked:  everything above layer {layer}");
    }
    let _ = writeln!(out, "Duration: {} ms", report.duration_ms);
    let _ = writeln!(out);
    out.push_str(&output::render_table(&rows));

    // Only the sub-tests that need attention
    let findings: Vec<String> = report
        .layers
        .iter()
        .filter(|l| l.status != Status::Blocked)
        .flat_map(|l| l.tests.iter().map(move |t| (l, t)))
        .filter(|(_, t)| matches!(t.status, Status::Warning | Status::Fail))
        .map(|(l, t)| {
            let mut line = format!(
                "  {} L{} {}: {}",
                painter.status(t.status),
                l.layer_number,
                t.name,
                t.message
            );
            if let Some(ref err) = t.error {
                let _ = write!(line, " {}", painter.dim(&format!("({err})")));
            }
            line
        })
        .collect();
    if !findings.is_empty() {
        let _ = write!(out, "\n\nFindings:\n{}", findings.join("\n"));
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DiagnoseArgs, ctx: &Context) -> Result<(), CliError> {
    let mut config = ctx.config.diagnostic.clone();
    if let Some(label) = args.host_label {
        config.host_label = label;
    }
    let probe = SystemProbe::new(ctx.config.probe_config())?;
    let engine = DiagnosticEngine::new(probe, config);

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling pending checks");
                cancel.cancel();
            }
        }
    });

    let spinner = spinner(ctx);
    let report = engine.run_with_cancel(&cancel).await;
    interrupt.abort();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let painter = ctx.painter;
    let out = output::render_single(
        ctx.output,
        &report,
        |r| detail(r, painter),
        |r| format!("{} {}", r.overall_status, r.health_score),
    )?;
    ctx.print(&out);

    if args.fail_on_unhealthy && !report.is_healthy() {
        return Err(CliError::Unhealthy {
            host: report.host,
            health_score: report.health_score,
        });
    }
    Ok(())
}

/// Spinner on stderr, only for interactive table output.
fn spinner(ctx: &Context) -> Option<indicatif::ProgressBar> {
    if ctx.quiet || ctx.output != OutputFormat::Table || !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb.set_message("Running diagnostics...");
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}
