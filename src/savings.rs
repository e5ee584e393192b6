use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::checkpoint;
use crate::config::Paths;
use crate::cost::{compute_costs, PricingTable};
use crate::pricing;
use crate::scan;
use crate::types::{Checkpoint, SavingsReport, ScanWindow, TokenTotals};

/// Whether a run persists its checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Commit,
    Peek,
}

fn build_report(
    prior: &Checkpoint,
    next: &Checkpoint,
    period: &TokenTotals,
    pricing: &PricingTable,
) -> SavingsReport {
    SavingsReport {
        period: compute_costs(period, pricing),
        lifetime: compute_costs(&next.lifetime(), pricing),
        since: prior.last_checkpoint_millis,
        checkpoint: next.last_checkpoint_millis,
        scan: None,
    }
}

/// One tracking run against an explicit pricing table.
///
/// Scans `[stored cursor, now_ms)`, folds the period into the lifetime totals
/// and, in `Commit` mode, persists the new checkpoint before the report is
/// handed back. A failed checkpoint write is an error; nothing is reported.
pub fn run_with_pricing(
    roots: &[PathBuf],
    checkpoint_path: &Path,
    pricing: &PricingTable,
    now_ms: i64,
    mode: RunMode,
) -> Result<SavingsReport> {
    let prior = checkpoint::load(checkpoint_path);
    let window = ScanWindow::new(prior.last_checkpoint_millis, now_ms);
    let result = scan::scan(roots, window);
    let next = checkpoint::advance(&prior, &result.tokens, now_ms);

    if mode == RunMode::Commit {
        checkpoint::save(checkpoint_path, &next)?;
    }

    info!(
        input = result.tokens.input_tokens,
        output = result.tokens.output_tokens,
        records = result.summary.records_counted,
        "period scanned"
    );

    let mut report = build_report(&prior, &next, &result.tokens, pricing);
    report.scan = Some(result.summary);
    Ok(report)
}

pub fn run(paths: &Paths, now_ms: i64, mode: RunMode) -> Result<SavingsReport> {
    let pricing = pricing::load_pricing(&paths.pricing);
    run_with_pricing(&paths.record_roots, &paths.checkpoint, &pricing, now_ms, mode)
}

/// Lifetime figures from the stored checkpoint alone; no scan, no write.
pub fn lifetime(paths: &Paths) -> SavingsReport {
    let pricing = pricing::load_pricing(&paths.pricing);
    let stored = checkpoint::load(&paths.checkpoint);
    SavingsReport {
        period: compute_costs(&TokenTotals::default(), &pricing),
        lifetime: compute_costs(&stored.lifetime(), &pricing),
        since: stored.last_checkpoint_millis,
        checkpoint: stored.last_checkpoint_millis,
        scan: None,
    }
}
