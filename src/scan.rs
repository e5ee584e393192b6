use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rayon::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::record::{self, LineError};
use crate::types::{ScanSummary, ScanWindow, TokenTotals};

const SESSIONS_DIR: &str = "sessions";
const RECORD_EXTENSION: &str = "jsonl";

pub(crate) struct DiscoveredFile {
    pub path: PathBuf,
    pub mtime_ms: i64,
}

/// Outcome of scanning the record store from a cutoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub tokens: TokenTotals,
    pub summary: ScanSummary,
}

impl std::ops::Add for ScanResult {
    type Output = ScanResult;

    fn add(self, rhs: ScanResult) -> ScanResult {
        ScanResult {
            tokens: self.tokens + rhs.tokens,
            summary: self.summary + rhs.summary,
        }
    }
}

pub(crate) fn discovered_file(path: &Path) -> Option<DiscoveredFile> {
    let meta = std::fs::metadata(path).ok()?;
    let mtime_ms = meta
        .modified()
        .ok()?
        .duration_since(SystemTime::UNIX_EPOCH)
        .ok()?
        .as_millis() as i64;
    Some(DiscoveredFile {
        path: path.to_path_buf(),
        mtime_ms,
    })
}

/// Immediate subdirectories of `dir`. Symlinks are not followed.
fn child_dirs(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
}

/// Collect `<root>/<agent>/sessions/*.jsonl`. Anything not matching that
/// shape is ignored.
pub(crate) fn discover_files(roots: &[PathBuf]) -> Vec<DiscoveredFile> {
    let mut files = Vec::new();

    for root in roots {
        if !root.is_dir() {
            debug!(root = %root.display(), "record root missing, skipping");
            continue;
        }
        for agent in child_dirs(root) {
            let sessions = agent.join(SESSIONS_DIR);
            if !sessions.is_dir() {
                debug!(agent = %agent.display(), "no sessions directory, skipping");
                continue;
            }
            for entry in WalkDir::new(&sessions)
                .min_depth(1)
                .max_depth(1)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == RECORD_EXTENSION)
                {
                    if let Some(df) = discovered_file(entry.path()) {
                        files.push(df);
                    }
                }
            }
        }
    }

    files
}

/// Sum the tokens of every record in one file stamped inside `window`.
/// Unreadable files and undecodable lines are skipped.
pub(crate) fn scan_file(path: &Path, window: ScanWindow) -> ScanResult {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot open session log");
            return ScanResult::default();
        }
    };

    let mut result = ScanResult::default();
    result.summary.files_read = 1;

    for chunk in BufReader::new(file).split(b'\n') {
        let bytes = match chunk {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "read failed, keeping partial totals");
                break;
            }
        };
        let Ok(line) = std::str::from_utf8(&bytes) else {
            result.summary.malformed_lines += 1;
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match record::parse_line(line) {
            Ok(rec) if window.contains(&rec) => {
                result.tokens.accumulate(&rec);
                result.summary.records_counted += 1;
            }
            Ok(_) | Err(LineError::NoUsage) => {}
            Err(LineError::Malformed) => result.summary.malformed_lines += 1,
        }
    }

    if result.summary.malformed_lines > 0 {
        debug!(
            path = %path.display(),
            malformed = result.summary.malformed_lines,
            "skipped malformed lines"
        );
    }

    result
}

/// Sum token usage across the record store for records stamped inside
/// `window`. Records at or past `window.end_ms` are left for the next run.
///
/// Files whose mtime is strictly before the window start are not opened.
/// Per-file parsing runs in parallel; the reduce is a plain sum.
pub fn scan(roots: &[PathBuf], window: ScanWindow) -> ScanResult {
    let files = discover_files(roots);
    let (fresh, stale): (Vec<_>, Vec<_>) = files
        .into_iter()
        .partition(|f| f.mtime_ms >= window.start_ms);

    let mut result = fresh
        .par_iter()
        .map(|f| scan_file(&f.path, window))
        .reduce(ScanResult::default, |a, b| a + b);
    result.summary.files_skipped = stale.len();

    debug!(
        files = result.summary.files_read,
        skipped = result.summary.files_skipped,
        records = result.summary.records_counted,
        "scan complete"
    );

    result
}

/// Default record-store roots: `$OPENCLAW_STATE_DIR/agents` when set,
/// otherwise the current and legacy home directories.
pub fn default_record_roots() -> Vec<PathBuf> {
    if let Ok(dir) = std::env::var("OPENCLAW_STATE_DIR") {
        return vec![PathBuf::from(dir).join("agents")];
    }

    let Some(home) = std::env::var_os("HOME").map(PathBuf::from) else {
        return Vec::new();
    };

    [".openclaw", ".clawdbot", ".moltbot"]
        .iter()
        .map(|dir| home.join(dir).join("agents"))
        .collect()
}
