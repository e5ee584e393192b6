use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::atomic::write_atomic;
use crate::types::{Checkpoint, TokenTotals};

/// Read the stored checkpoint. A missing or undecodable file is a fresh
/// start, never an error.
pub fn load(path: &Path) -> Checkpoint {
    let Ok(data) = fs::read_to_string(path) else {
        debug!(path = %path.display(), "no checkpoint, starting fresh");
        return Checkpoint::default();
    };

    match serde_json::from_str(&data) {
        Ok(checkpoint) => checkpoint,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid checkpoint, starting fresh");
            Checkpoint::default()
        }
    }
}

/// Fold one period into the lifetime totals and move the cursor to `now_ms`.
///
/// This is the only place lifetime counters change. The cursor never moves
/// backwards, even if the clock does.
pub fn advance(prior: &Checkpoint, period: &TokenTotals, now_ms: i64) -> Checkpoint {
    Checkpoint {
        last_checkpoint_millis: prior.last_checkpoint_millis.max(now_ms),
        lifetime_input_tokens: prior
            .lifetime_input_tokens
            .saturating_add(period.input_tokens),
        lifetime_output_tokens: prior
            .lifetime_output_tokens
            .saturating_add(period.output_tokens),
    }
}

/// Persist atomically: write a sibling temp file, then rename it over the
/// target. Failures are returned, not retried.
pub fn save(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    let data = serde_json::to_string_pretty(checkpoint)?;
    write_atomic(path, data.as_bytes())?;

    info!(
        path = %path.display(),
        at = checkpoint.last_checkpoint_millis,
        "checkpoint saved"
    );
    Ok(())
}
