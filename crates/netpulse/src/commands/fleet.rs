//! `fleet`: incident rollup across every host in a telemetry file.

use std::fmt::Write as _;
use std::sync::Arc;

use tabled::Tabled;

use netpulse_core::{FleetReport, MachineReport};

use crate::cli::FleetArgs;
use crate::error::CliError;
use crate::output::{self, Painter};

use super::{Context, util};

#[derive(Tabled)]
struct MachineRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Down")]
    download: String,
    #[tabled(rename = "Up")]
    upload: String,
    #[tabled(rename = "Ping")]
    ping: String,
    #[tabled(rename = "Incidents")]
    incidents: usize,
}

impl MachineRow {
    fn new(m: &MachineReport, painter: Painter) -> Self {
        Self {
            host: m.host_id.clone(),
            status: painter.machine(m.status),
            samples: m.samples_analyzed,
            download: output::opt_f64(m.avg_download),
            upload: output::opt_f64(m.avg_upload),
            ping: output::opt_f64(m.avg_ping),
            incidents: m.incident_count,
        }
    }
}

fn detail(report: &FleetReport, painter: Painter) -> String {
    let summary = &report.fleet_summary;
    let mut out = String::new();
    let _ = writeln!(out, "Window:    {:.1} h", report.period_hours);
    let _ = writeln!(
        out,
        "Machines:  {} total, {} analyzed, {} with issues",
        report.total_machines, report.machines_analyzed, report.machines_with_issues
    );
    let _ = writeln!(out, "Incidents: {}", report.total_incidents);
    let _ = writeln!(
        out,
        "Averages:  down {} / up {} Mbps, ping {} ms",
        output::opt_f64(summary.avg_download),
        output::opt_f64(summary.avg_upload),
        output::opt_f64(summary.avg_ping)
    );
    let _ = write!(out, "Health:    {}/100", painter.score(summary.health_score));

    if !report.machine_reports.is_empty() {
        let rows: Vec<MachineRow> = report
            .machine_reports
            .iter()
            .map(|m| MachineRow::new(m, painter))
            .collect();
        let _ = write!(out, "\n\n{}", output::render_table(&rows));
    }
    for (host, error) in report
        .machine_reports
        .iter()
        .filter_map(|m| m.error.as_deref().map(|e| (&m.host_id, e)))
    {
        let _ = write!(out, "\n{}", painter.bad(&format!("{host}: {error}")));
    }
    out
}

pub async fn handle(args: &FleetArgs, ctx: &Context) -> Result<(), CliError> {
    let window = util::window(&args.window, ctx)?;
    let (store, _) = util::load_store(&args.window, ctx)?;

    let mut config = ctx.config.fleet.clone();
    if let Some(secs) = args.deadline {
        config.deadline_secs = Some(secs);
    }

    let report = netpulse_core::analyze_fleet(
        Arc::new(store),
        &args.hosts,
        window,
        util::analyzer(ctx),
        config,
    )
    .await?;

    let painter = ctx.painter;
    let out = output::render_single(
        ctx.output,
        &report,
        |r| detail(r, painter),
        |r| {
            r.machine_reports
                .iter()
                .map(|m| format!("{}\t{}\t{}", m.host_id, m.status, m.incident_count))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    ctx.print(&out);
    Ok(())
}
