//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits script-friendly lines.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use netpulse_core::{MachineStatus, Rating, Severity, Status};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Paints status-like labels: green for good, yellow for degraded, red for bad.
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn good(self, text: &str) -> String {
        if self.enabled { text.green().to_string() } else { text.to_owned() }
    }

    pub fn warn(self, text: &str) -> String {
        if self.enabled { text.yellow().to_string() } else { text.to_owned() }
    }

    pub fn bad(self, text: &str) -> String {
        if self.enabled { text.red().to_string() } else { text.to_owned() }
    }

    pub fn dim(self, text: &str) -> String {
        if self.enabled { text.dimmed().to_string() } else { text.to_owned() }
    }

    pub fn bold(self, text: &str) -> String {
        if self.enabled { text.bold().to_string() } else { text.to_owned() }
    }

    pub fn status(self, status: Status) -> String {
        let label = status.to_string().to_uppercase();
        match status {
            Status::Pass => self.good(&label),
            Status::Warning => self.warn(&label),
            Status::Fail => self.bad(&label),
            Status::Blocked | Status::Unknown => self.dim(&label),
        }
    }

    pub fn machine(self, status: MachineStatus) -> String {
        let label = status.to_string();
        match status {
            MachineStatus::Ok => self.good(&label),
            MachineStatus::Degraded => self.warn(&label),
            MachineStatus::Error | MachineStatus::TimedOut => self.bad(&label),
            MachineStatus::NoData => self.dim(&label),
        }
    }

    pub fn severity(self, severity: Severity) -> String {
        let label = severity.to_string();
        match severity {
            Severity::Info => self.dim(&label),
            Severity::Warning => self.warn(&label),
            Severity::Critical => self.bad(&label),
        }
    }

    pub fn rating(self, rating: Rating) -> String {
        let label = rating.to_string();
        match rating {
            Rating::Excellent | Rating::Good => self.good(&label),
            Rating::Fair | Rating::Poor => self.warn(&label),
            Rating::Bad | Rating::Unusable => self.bad(&label),
        }
    }

    /// A 0-100 score colored by band.
    pub fn score(self, score: u8) -> String {
        let label = score.to_string();
        match score {
            80.. => self.good(&label),
            50..80 => self.warn(&label),
            _ => self.bad(&label),
        }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single item. Table output uses `detail_fn` for a
/// pre-formatted detail view.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Plain => Ok(id_fn(data)),
        structured => render_structured(structured, data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_structured<T: serde::Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?.trim_end().to_owned(),
        OutputFormat::Json | OutputFormat::Table | OutputFormat::Plain => {
            serde_json::to_string_pretty(data)?
        }
    })
}

/// `12.3` or `-` for missing values.
pub fn opt_f64(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.1}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        name: &'static str,
        value: u32,
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "Name")]
        name: String,
    }

    fn items() -> Vec<Item> {
        vec![
            Item { name: "a", value: 1 },
            Item { name: "b", value: 2 },
        ]
    }

    fn render(format: OutputFormat) -> String {
        render_single(
            format,
            &items(),
            |items| {
                let rows: Vec<ItemRow> = items
                    .iter()
                    .map(|i| ItemRow {
                        name: i.name.into(),
                    })
                    .collect();
                render_table(&rows)
            },
            |items| items.iter().map(|i| i.name).collect::<Vec<_>>().join("\n"),
        )
        .unwrap()
    }

    #[test]
    fn formats() {
        assert_eq!(render(OutputFormat::Plain), "a\nb");
        assert_eq!(
            render(OutputFormat::JsonCompact),
            r#"[{"name":"a","value":1},{"name":"b","value":2}]"#
        );
        assert!(render(OutputFormat::Yaml).starts_with("- name: a"));
        let table = render(OutputFormat::Table);
        assert!(table.contains("Name") && table.contains('╭'));
    }

    #[test]
    fn painter_without_color_is_plain_text() {
        let p = Painter::new(false);
        assert_eq!(p.status(Status::Warning), "WARNING");
        assert_eq!(p.machine(MachineStatus::NoData), "no_data");
        assert_eq!(p.score(42), "42");
    }

    #[test]
    fn painter_with_color_emits_escapes() {
        assert!(Painter::new(true).status(Status::Fail).contains("\u{1b}["));
    }
}
