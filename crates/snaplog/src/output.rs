//! Output formatting: table or JSON.
//!
//! Renders data in the format selected by `--output`. Tables use `tabled`
//! with dynamic columns, since log headers are only known at runtime.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use snaplog_core::{LogSection, SessionReport, Value, log_file::render_field};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn title(text: &str, color: bool) -> String {
    if color {
        text.bold().cyan().to_string()
    } else {
        text.to_owned()
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render log sections, each paired with its 1-based session number.
pub fn render_sections(
    format: &OutputFormat,
    sections: &[(usize, LogSection)],
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(sections
            .iter()
            .map(|(number, section)| {
                let heading = format!("Session {number} ({} rows)", section.rows.len());
                format!("{}\n{}", title(&heading, color), section_table(section))
            })
            .collect::<Vec<_>>()
            .join("\n\n")),
        OutputFormat::Json => render_json(&sections_json(sections), false),
        OutputFormat::JsonCompact => render_json(&sections_json(sections), true),
    }
}

/// Render the summary of a finished recording.
pub fn render_report(
    format: &OutputFormat,
    report: &SessionReport,
    round_trips: u64,
    color: bool,
) -> Result<String, CliError> {
    #[derive(Serialize)]
    struct Summary<'a> {
        #[serde(flatten)]
        report: &'a SessionReport,
        round_trips: u64,
    }

    match format {
        OutputFormat::Table => {
            let rows = [
                ("elapsed", humantime::format_duration(truncate_ms(report.elapsed)).to_string()),
                ("refresh cycles", report.refresh_cycles.to_string()),
                ("refresh failures", report.refresh_failures.to_string()),
                ("callback failures", report.callback_failures.to_string()),
                ("rows written", report.rows_written.to_string()),
                ("rows lost", report.rows_lost.to_string()),
                ("ready timeouts", report.ready_timeouts.to_string()),
                ("device round trips", round_trips.to_string()),
            ];
            let mut builder = Builder::default();
            for (key, value) in rows {
                builder.push_record([key.to_owned(), value]);
            }
            let table = builder.build().with(Style::rounded()).to_string();
            Ok(format!("{}\n{table}", title("Recording finished", color)))
        }
        OutputFormat::Json => render_json(&Summary { report, round_trips }, false),
        OutputFormat::JsonCompact => render_json(&Summary { report, round_trips }, true),
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

fn section_table(section: &LogSection) -> String {
    let mut builder = Builder::default();
    builder.push_record(section.header.iter().cloned());
    for row in &section.rows {
        builder.push_record(
            section
                .header
                .iter()
                .map(|name| row.get(name).map_or_else(String::new, |v| render_field(v).into_owned())),
        );
    }
    builder.build().with(Style::rounded()).to_string()
}

fn sections_json(sections: &[(usize, LogSection)]) -> Vec<Value> {
    sections
        .iter()
        .map(|(number, section)| {
            serde_json::json!({
                "session": number,
                "header": section.header,
                "rows": section.rows,
            })
        })
        .collect()
}

fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(rendered)
}

fn truncate_ms(d: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use snaplog_core::log_file::parse_log;

    use super::*;

    fn sample_sections() -> Vec<(usize, LogSection)> {
        let text = "timestamp,temp,axes\n1000.5,21.5,\"[1,2]\"\n1001.5,,\"[1,3]\"\n";
        parse_log(text.as_bytes())
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, s)| (i + 1, s))
            .collect()
    }

    #[test]
    fn table_lists_header_and_blank_nulls() {
        let out = render_sections(&OutputFormat::Table, &sample_sections(), false).unwrap();
        assert!(out.starts_with("Session 1 (2 rows)"));
        assert!(out.contains("timestamp"));
        assert!(out.contains("[1,3]"));
        assert!(out.contains("21.5"));
    }

    #[test]
    fn json_keeps_column_order() {
        let out = render_sections(&OutputFormat::JsonCompact, &sample_sections(), false).unwrap();
        assert!(out.starts_with(r#"[{"session":1,"header":["timestamp","temp","axes"]"#));
        assert!(out.contains(r#""temp":null"#));
    }

    #[test]
    fn report_json_includes_round_trips() {
        let report = SessionReport {
            refresh_cycles: 3,
            rows_written: 2,
            ..SessionReport::default()
        };
        let out = render_report(&OutputFormat::JsonCompact, &report, 3, false).unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["refresh_cycles"], 3);
        assert_eq!(parsed["rows_written"], 2);
        assert_eq!(parsed["round_trips"], 3);
    }
}
