use std::ops::Add;

use serde::{Deserialize, Serialize};

/// One observed turn decoded from a session log line.
///
/// `timestamp_ms` is `None` when the line carried no usable timestamp; such
/// records never fall inside a scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecord {
    pub timestamp_ms: Option<i64>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Half-open time range `[start_ms, end_ms)` a scan counts records in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl ScanWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Everything from `start_ms` on, with no upper bound.
    pub fn since(start_ms: i64) -> Self {
        Self::new(start_ms, i64::MAX)
    }

    pub fn contains(&self, record: &UsageRecord) -> bool {
        record
            .timestamp_ms
            .is_some_and(|ts| ts >= self.start_ms && ts < self.end_ms)
    }
}

/// Input/output token sums. Summation is associative and commutative so
/// per-file totals can be reduced in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenTotals {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn accumulate(&mut self, record: &UsageRecord) {
        self.input_tokens = self.input_tokens.saturating_add(record.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(record.output_tokens);
    }
}

impl Add for TokenTotals {
    type Output = TokenTotals;

    fn add(self, rhs: TokenTotals) -> TokenTotals {
        TokenTotals {
            input_tokens: self.input_tokens.saturating_add(rhs.input_tokens),
            output_tokens: self.output_tokens.saturating_add(rhs.output_tokens),
        }
    }
}

/// Persisted aggregation cursor plus lifetime totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Checkpoint {
    pub last_checkpoint_millis: i64,
    pub lifetime_input_tokens: u64,
    pub lifetime_output_tokens: u64,
}

impl Checkpoint {
    pub fn lifetime(&self) -> TokenTotals {
        TokenTotals::new(self.lifetime_input_tokens, self.lifetime_output_tokens)
    }
}

/// Cost of a token mix under the baseline and treated price tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostReport {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub baseline_cost: f64,
    pub treated_cost: f64,
    /// `baseline_cost - treated_cost`; negative when the treated pricing is
    /// more expensive for this mix.
    pub saved: f64,
}

/// Counters describing what a scan touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub files_read: usize,
    pub files_skipped: usize,
    pub malformed_lines: usize,
    pub records_counted: usize,
}

impl Add for ScanSummary {
    type Output = ScanSummary;

    fn add(self, rhs: ScanSummary) -> ScanSummary {
        ScanSummary {
            files_read: self.files_read + rhs.files_read,
            files_skipped: self.files_skipped + rhs.files_skipped,
            malformed_lines: self.malformed_lines + rhs.malformed_lines,
            records_counted: self.records_counted + rhs.records_counted,
        }
    }
}

/// Period and lifetime figures for one tracking run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsReport {
    pub period: CostReport,
    pub lifetime: CostReport,
    /// Cutoff the period was scanned from; 0 on the first run.
    pub since: i64,
    /// Timestamp stored in the checkpoint after this run.
    pub checkpoint: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanSummary>,
}
