// src/report/summary.rs
use super::Report;
use crate::checks::CheckStatus;
use colored::Colorize;
use std::fmt::Write;

/// Human-readable summary for the terminal.
pub fn render_summary(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Bring-up summary".bold());

    if !report.unit_results.is_empty() {
        let _ = writeln!(out, "\n{}", "Units".underline());
    }
    for unit in &report.unit_results {
        let (label, badge) = if unit.ready {
            ("READY", "READY".green())
        } else if unit.failed() {
            ("FAILED", "FAILED".red())
        } else {
            ("SKIPPED", "SKIPPED".yellow())
        };
        let _ = write!(
            out,
            "  {:<8} {} ({} attempts",
            badge,
            unit.display_name,
            unit.attempts.len()
        );
        if unit.start_invocations > 1 {
            let _ = write!(out, ", {} starts", unit.start_invocations);
        }
        out.push(')');
        if label != "READY" {
            if let Some(error) = &unit.final_error {
                let _ = write!(out, ": {}", error.to_string().dimmed());
            }
        }
        out.push('\n');
    }

    if !report.check_results.is_empty() {
        let _ = writeln!(out, "\n{}", "Checks".underline());
    }
    for check in &report.check_results {
        let status = match check.status {
            CheckStatus::Pass => "PASS".green(),
            CheckStatus::Fail => "FAIL".red(),
            CheckStatus::Warn => "WARN".yellow(),
        };
        let _ = write!(out, "  {:<8} {}", status, check.check_name);
        if check.status != CheckStatus::Pass && !check.detail.is_empty() {
            let _ = write!(out, ": {}", check.detail.dimmed());
        }
        out.push('\n');
    }

    let summary = &report.summary;
    let verdict = if report.ready() {
        "READY".green().bold()
    } else {
        "NOT READY".red().bold()
    };
    let _ = writeln!(
        out,
        "\n{} pass, {} fail, {} warn: {}",
        summary.pass_count, summary.fail_count, summary.warn_count, verdict
    );
    out
}
