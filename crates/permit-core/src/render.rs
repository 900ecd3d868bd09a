//! Console and log-file rendering of validation reports.

use crate::report::ValidationReport;
use std::fmt::Write;

const WIDTH: usize = 70;

/// Render a report as plain text.
///
/// Layout: empty files, then files with errors (one message per line,
/// grouped by path), then the summary counts.
#[must_use = "returns the rendered report"]
pub fn render_text(report: &ValidationReport, title: &str) -> String {
    let heavy = "=".repeat(WIDTH);
    let light = "-".repeat(WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{heavy}");

    let _ = writeln!(out, "\n{light}");
    let _ = writeln!(out, "FILES WITH NO ROWS");
    let _ = writeln!(out, "{light}");
    let empty: Vec<_> = report.empty_files().collect();
    if empty.is_empty() {
        let _ = writeln!(out, "  None");
    } else {
        for file in &empty {
            let _ = writeln!(out, "  {}", file.path.display());
        }
        let _ = writeln!(out, "\nTotal: {} empty file(s)", empty.len());
    }

    let _ = writeln!(out, "\n{light}");
    let _ = writeln!(out, "VALIDATION ERRORS");
    let _ = writeln!(out, "{light}");
    let mut any = false;
    for file in report.files_with_errors() {
        any = true;
        let _ = writeln!(out, "\n{}:", file.path.display());
        for message in file.messages() {
            let _ = writeln!(out, "  {message}");
        }
    }
    if !any {
        let _ = writeln!(out, "  None");
    }

    let summary = &report.summary;
    let _ = writeln!(out, "\n{heavy}");
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "  Total files scanned: {}", summary.files_scanned);
    let _ = writeln!(out, "  Total rows: {}", summary.total_rows);
    let _ = writeln!(out, "  Empty files: {}", summary.empty_files);
    let _ = writeln!(out, "  Files with errors: {}", summary.files_with_errors);
    let _ = writeln!(out, "  Total validation errors: {}", summary.validation_errors);

    out
}

/// Render a report as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json(report: &ValidationReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
