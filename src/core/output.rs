//! Console summaries printed by the binary, separate from the log stream.
//!
//! Red for errors, green for success, bright_black for details.

use crate::commands::sync::CycleReport;
use colored::*;

/// Prints an error message
///
/// # Format
/// ```text
///
/// ✕ Error: <message>
///
/// ```
pub fn print_error(message: &str) {
    eprintln!("\n{} {}\n", "✕ Error:".red(), message.white());
}

/// Prints a success message
///
/// # Format
/// ```text
///
/// ✓ <message>
/// ```
pub fn print_success(message: &str) {
    println!("\n{} {}", "✓".green(), message.white());
}

pub fn print_info(message: &str) {
    println!("\n{}\n", message.white());
}

/// One-line summary of a finished sync cycle
pub fn format_cycle_summary(report: &CycleReport) -> String {
    if report.affected() == 0 {
        return format!("No dashboard changes on {}", report.branch);
    }
    let action = match (report.committed, report.pushed) {
        (true, true) => "committed and pushed",
        (true, false) => "committed (not pushed)",
        (false, _) => "already up to date",
    };
    format!(
        "{} written, {} deleted on {}: {}",
        report.written, report.deleted, report.branch, action
    )
}

pub fn print_cycle_summary(report: &CycleReport) {
    print_success(&format_cycle_summary(report));
    println!(
        "  {}",
        format!("{} dashboards fetched", report.fetched).bright_black()
    );
}
