use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::reconcile::{Drift, Entry, Mode, Outcome, Report};

/// Render a colored terminal report.
pub fn render(report: &Report, path: &Path, verbose: bool, quiet: bool) -> Result<()> {
    if quiet {
        println!("{}", summary_line(report));
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "license-ledger".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Project: {}", path.display());
    println!(
        " Mode:    {}\n",
        match report.mode {
            Mode::Status => "status (cache not modified)",
            Mode::Cache => "cache",
        }
    );

    let outcome = match report.outcome {
        Outcome::Complete => "complete".green(),
        Outcome::Incomplete => "incomplete".yellow(),
        Outcome::Failed => "failed".red(),
    };

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Sources scanned   : {}", report.sources.join(", ")));
    println!(" │  {:<48} │", format!("Scan              : {}", outcome));
    for (status, symbol) in [
        (Drift::New, "+".green()),
        (Drift::Changed, "~".yellow()),
        (Drift::Removed, "-".red()),
        (Drift::Unchanged, "=".normal()),
    ] {
        println!(
            " │  {:<48} │",
            format!(
                "{}  {:<15}: {:>4}",
                symbol,
                capitalize(&status.to_string()),
                report.count(status)
            )
        );
    }
    println!(" └────────────────────────────────────────────────────┘\n");

    if !report.failures.is_empty() {
        println!(" {} Sources that could not be scanned:\n", "[FAILED]".red().bold());
        let mut table = new_table(&["Source", "Cause"]);
        for failure in &report.failures {
            table.add_row(vec![
                Cell::new(&failure.source_type),
                Cell::new(failure.cause.to_string()).fg(Color::Red),
            ]);
        }
        println!("{}\n", table);
    }

    let attention: Vec<&Entry> = report.entries.iter().filter(|e| e.needs_attention()).collect();
    if !attention.is_empty() {
        println!(" {} Dependencies requiring review:\n", "[REVIEW]".yellow().bold());
        render_table(&attention);
        println!();
        render_diffs(&attention);
    }

    if verbose {
        let rest: Vec<&Entry> = report.entries.iter().filter(|e| !e.needs_attention()).collect();
        if !rest.is_empty() {
            println!(" {} Accepted dependencies:\n", "[OK]".green().bold());
            render_table(&rest);
            println!();
        }
    }

    for warning in &report.warnings {
        println!(" {} {}", "warning:".yellow(), warning);
    }

    Ok(())
}

/// One-line summary used by `--quiet`.
pub fn summary_line(report: &Report) -> String {
    format!(
        "New: {}  Changed: {}  Removed: {}  Unchanged: {}  Failed sources: {}  Needs review: {}",
        report.count(Drift::New),
        report.count(Drift::Changed),
        report.count(Drift::Removed),
        report.count(Drift::Unchanged),
        report.failures.len(),
        report.entries.iter().filter(|e| e.needs_attention()).count(),
    )
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

fn render_table(entries: &[&Entry]) {
    let mut table = new_table(&["Type", "Name", "Version", "License", "Status", "Flags"]);

    for entry in entries {
        let status_color = match entry.status {
            Drift::New => Color::Green,
            Drift::Changed => Color::Yellow,
            Drift::Removed => Color::Red,
            Drift::Unchanged => Color::Reset,
        };

        let mut flags = Vec::new();
        if entry.reviewed {
            flags.push("reviewed");
        }
        if entry.ignored {
            flags.push("ignored");
        }
        if entry.stale {
            flags.push("stale");
        }
        if entry.error.is_some() {
            flags.push("write failed");
        }

        table.add_row(vec![
            Cell::new(&entry.source_type),
            Cell::new(&entry.name),
            Cell::new(&entry.version),
            Cell::new(entry.license.as_deref().unwrap_or("unknown")),
            Cell::new(entry.status.to_string())
                .fg(status_color)
                .set_alignment(CellAlignment::Center),
            Cell::new(flags.join(", ")),
        ]);
    }

    println!("{}", table);
}

fn render_diffs(entries: &[&Entry]) {
    for entry in entries.iter().filter(|e| !e.diff.is_empty()) {
        println!(" {} {}/{}", "~".yellow(), entry.source_type, entry.name.bold());
        for line in &entry.diff {
            let line = if line.trim_start().starts_with("+ ") {
                line.green()
            } else if line.trim_start().starts_with("- ") {
                line.red()
            } else {
                line.normal()
            };
            println!("     {}", line);
        }
        println!();
    }
    for entry in entries.iter().filter_map(|e| e.error.as_ref().map(|err| (e, err))) {
        println!(" {} {}/{}: {}", "✗".red(), entry.0.source_type, entry.0.name, entry.1);
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line_counts() {
        let report = Report {
            mode: Mode::Status,
            outcome: Outcome::Complete,
            sources: vec!["npm".to_string()],
            entries: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        };
        assert_eq!(
            summary_line(&report),
            "New: 0  Changed: 0  Removed: 0  Unchanged: 0  Failed sources: 0  Needs review: 0"
        );
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("unchanged"), "Unchanged");
        assert_eq!(capitalize(""), "");
    }
}
