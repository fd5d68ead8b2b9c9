//! Run-scoped console log buffer
//!
//! One ordered, append-only list of console entries exists per run,
//! owned by the browser session. Route attribution is post-hoc: entries
//! are matched to routes by the page URL recorded at capture time, which
//! is only correct because routes never overlap in time.

use parking_lot::Mutex;
use routeqa_common::types::{ConsoleLevel, ConsoleLogEntry};
use std::sync::Arc;

/// Shared handle to the run-scoped console stream
#[derive(Clone, Default)]
pub struct ConsoleBuffer {
    entries: Arc<Mutex<Vec<ConsoleLogEntry>>>,
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry; called from the agent stdout reader task
    pub fn push(&self, entry: ConsoleLogEntry) {
        self.entries.lock().push(entry);
    }

    /// Snapshot of the full run-scoped stream in capture order
    pub fn snapshot(&self) -> Vec<ConsoleLogEntry> {
        self.entries.lock().clone()
    }

    /// Total entries captured so far
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Entries at `level` captured so far
    pub fn count_level(&self, level: ConsoleLevel) -> usize {
        self.entries.lock().iter().filter(|e| e.level == level).count()
    }
}

/// Filter a console stream down to the entries captured on `route`.
///
/// Pure function over a snapshot; matching strips `base_url` from each
/// entry's captured URL, then compares the normalized path. Entries whose
/// URL carries a query string or fragment match on the path prefix.
pub fn filter_by_route(
    entries: &[ConsoleLogEntry],
    base_url: &str,
    route: &str,
) -> Vec<ConsoleLogEntry> {
    let want = normalize_path(route);
    entries
        .iter()
        .filter(|e| {
            let path = match e.source_url.strip_prefix(base_url) {
                Some(rest) => rest,
                // Entry captured on a different origin (redirects, about:blank)
                None => return false,
            };
            let (path, had_suffix) = split_suffix(path);
            let got = normalize_path(path);
            if had_suffix {
                got == want || got.starts_with(&format!("{}/", want))
            } else {
                got == want
            }
        })
        .cloned()
        .collect()
}

fn split_suffix(path: &str) -> (&str, bool) {
    if let Some(idx) = path.find(['?', '#']) {
        (&path[..idx], true)
    } else {
        (path, false)
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
