//! `incidents`: slowdown incidents for a single host.

use std::fmt::Write as _;

use tabled::Tabled;
use tracing::debug;

use netpulse_core::{MachineReport, SlowdownIncident, TelemetryStore};

use crate::cli::IncidentsArgs;
use crate::error::CliError;
use crate::output::{self, Painter};

use super::{Context, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct IncidentRow {
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "Minutes")]
    minutes: i64,
    #[tabled(rename = "Down")]
    download: String,
    #[tabled(rename = "Up")]
    upload: String,
    #[tabled(rename = "Ping")]
    ping: String,
    #[tabled(rename = "Link")]
    link: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

impl From<&SlowdownIncident> for IncidentRow {
    fn from(i: &SlowdownIncident) -> Self {
        Self {
            start: i.start_time.format("%Y-%m-%d %H:%M").to_string(),
            minutes: i.duration().num_minutes(),
            download: format!("{:.1}", i.avg_download),
            upload: format!("{:.1}", i.avg_upload),
            ping: output::opt_f64(i.avg_ping),
            link: i.connection_type.to_string(),
            summary: i.summary.clone(),
        }
    }
}

fn detail(report: &MachineReport, painter: Painter) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Host:      {}", painter.bold(&report.host_id));
    let _ = writeln!(out, "Status:    {}", painter.machine(report.status));
    let _ = writeln!(out, "Samples:   {}", report.samples_analyzed);
    let _ = writeln!(
        out,
        "Averages:  down {} / up {} Mbps, ping {} ms",
        output::opt_f64(report.avg_download),
        output::opt_f64(report.avg_upload),
        output::opt_f64(report.avg_ping)
    );
    let _ = write!(out, "Incidents: {}", report.incident_count);
    if report.incidents.is_empty() {
        return out;
    }

    let rows: Vec<IncidentRow> = report.incidents.iter().map(IncidentRow::from).collect();
    let _ = write!(out, "\n\n{}", output::render_table(&rows));

    for incident in &report.incidents {
        let _ = write!(
            out,
            "\n\n{}",
            painter.bold(&incident.start_time.format("%Y-%m-%d %H:%M").to_string())
        );
        for factor in &incident.factors {
            let _ = write!(
                out,
                "\n  [{}] {}",
                painter.severity(factor.severity),
                factor.description
            );
        }
        for rec in &incident.recommendations {
            let _ = write!(out, "\n  - {rec}");
        }
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: IncidentsArgs, ctx: &Context) -> Result<(), CliError> {
    let window = util::window(&args.window, ctx)?;
    let (store, path) = util::load_store(&args.window, ctx)?;

    let hosts = store.hosts()?;
    if !hosts.contains(&args.host) {
        return Err(CliError::UnknownHost {
            host: args.host,
            file: path.display().to_string(),
            available: if hosts.is_empty() {
                "(none)".into()
            } else {
                hosts.join(", ")
            },
        });
    }

    let analyzer = util::analyzer(ctx);
    let telemetry = store.query(&args.host, &analyzer.context_window(&window))?;
    debug!(host = %args.host, samples = telemetry.len(), "telemetry selected");
    let report = analyzer.analyze(&args.host, &telemetry, &window);

    let painter = ctx.painter;
    let out = output::render_single(
        ctx.output,
        &report,
        |r| detail(r, painter),
        |r| {
            r.incidents
                .iter()
                .map(|i| {
                    format!(
                        "{}\t{}\t{}",
                        i.start_time.to_rfc3339(),
                        i.end_time.to_rfc3339(),
                        i.summary
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    ctx.print(&out);
    Ok(())
}
