use chrono::{DateTime, SecondsFormat, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, ContentArrangement, Table};

use crate::types::{CostReport, SavingsReport};

pub fn format_tokens(n: u64) -> String {
    // 999_950 would round to "1000.0k"
    if n >= 999_950 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

pub fn format_cost(cost: f64) -> String {
    if cost < 0.0 {
        format!("-${:.4}", -cost)
    } else {
        format!("${:.4}", cost)
    }
}

fn format_since(since_ms: i64) -> String {
    if since_ms <= 0 {
        return "Since: first run".to_string();
    }
    match DateTime::<Utc>::from_timestamp_millis(since_ms) {
        Some(dt) => format!("Since: {}", dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => format!("Since: {since_ms}"),
    }
}

fn report_row(label: &str, report: &CostReport) -> Vec<Cell> {
    vec![
        Cell::new(label),
        Cell::new(format_tokens(report.input_tokens)).set_alignment(CellAlignment::Right),
        Cell::new(format_tokens(report.output_tokens)).set_alignment(CellAlignment::Right),
        Cell::new(format_cost(report.baseline_cost)).set_alignment(CellAlignment::Right),
        Cell::new(format_cost(report.treated_cost)).set_alignment(CellAlignment::Right),
        Cell::new(format_cost(report.saved)).set_alignment(CellAlignment::Right),
    ]
}

pub fn render_table(report: &SavingsReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["", "Input", "Output", "Baseline", "Treated", "Saved"]);

    table.add_row(report_row("Period", &report.period));
    table.add_row(report_row("Lifetime", &report.lifetime));

    format!("{}\n{table}", format_since(report.since))
}

pub fn print_table(report: &SavingsReport) {
    println!("{}", render_table(report));
}

pub fn print_json(report: &SavingsReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
