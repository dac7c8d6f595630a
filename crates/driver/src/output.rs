/// Colored verdict output.
///
/// One line per routine on stderr:
///   [OK]      name (green)
///   [NOK]     name (red)
///   [UNKNOWN] name (yellow)
use colored::Colorize;

use crate::pipeline::{RoutineReport, RunReport, Verdict};

/// Render the status line of one routine, without trailing newline.
pub fn format_routine(report: &RoutineReport, verbose: bool) -> String {
    let tag = match report.verdict {
        Verdict::Ok => "[OK]".green().bold(),
        Verdict::Nok => "[NOK]".red().bold(),
        Verdict::Unknown => "[UNKNOWN]".yellow().bold(),
    };
    let mut line = format!("  {tag}  {}", report.name);
    if let Some(location) = &report.location {
        line.push_str(&format!(" at {location}"));
    }
    if verbose {
        line.push_str(&format!(" ({}ms)", report.duration_ms));
    }
    line
}

/// Render the summary line, e.g. `Summary: 2 OK, 1 NOK (total: 12ms)`.
pub fn format_summary(report: &RunReport) -> String {
    let mut parts = Vec::new();
    for (verdict, label) in [
        (Verdict::Ok, "OK".green()),
        (Verdict::Nok, "NOK".red()),
        (Verdict::Unknown, "UNKNOWN".yellow()),
    ] {
        let count = report.count(verdict);
        if count > 0 {
            parts.push(format!("{count} {label}"));
        }
    }
    if parts.is_empty() {
        return "Summary: no routines".to_string();
    }
    let total_ms: u64 = report.routines.iter().map(|r| r.duration_ms).sum();
    format!("Summary: {} (total: {total_ms}ms)", parts.join(", "))
}

/// Print every verdict and the summary to stderr.
pub fn print_run_report(report: &RunReport, verbose: bool) {
    if report.routines.is_empty() {
        eprintln!("{}", "No routines found.".dimmed());
        return;
    }
    if report.degraded {
        eprintln!(
            "{}",
            "warning: no prover available, verdicts below are unchecked"
                .yellow()
                .bold()
        );
    }
    eprintln!();
    for routine in &report.routines {
        eprintln!("{}", format_routine(routine, verbose));
    }
    eprintln!();
    eprintln!("{}", format_summary(report));
    eprintln!();
}

/// Print a header for the verification run.
pub fn print_header(file: &str, routines: usize) {
    eprintln!(
        "{}",
        format!("Verifying {routines} routine(s) from {file}").bold()
    );
}
