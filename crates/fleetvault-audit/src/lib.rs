// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only operator audit log.
//!
//! Every line has the form `[DD.MM.YYYY HH:MM:SS] - message` in local time.
//! Appends are serialized through a mutex so concurrent dispatch tasks never
//! interleave partial lines.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use fleetvault_core::FleetError;
use tracing::warn;

/// strftime pattern for the line prefix.
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Default number of lines returned by [`AuditLog::tail`] callers.
pub const DEFAULT_TAIL_LINES: usize = 25;

/// Timestamped, append-only log of operator actions and per-host results.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line.
    pub fn record(&self, message: &str) -> Result<(), FleetError> {
        let line = format_line(&Local::now().format(TIMESTAMP_FORMAT).to_string(), message);

        // A poisoned lock only means another writer panicked mid-append; the
        // file itself is still usable.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| FleetError::Audit { source })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| FleetError::Audit { source })?;
        file.write_all(line.as_bytes())
            .map_err(|source| FleetError::Audit { source })
    }

    /// Append a line, downgrading failure to a diagnostic.
    pub fn record_or_warn(&self, message: &str) {
        if let Err(e) = self.record(message) {
            warn!(path = %self.path.display(), error = %e, "failed to write audit log");
        }
    }

    /// [`record_or_warn`](Self::record_or_warn) on the blocking pool, for
    /// callers running on async worker threads.
    pub async fn record_async(self: &Arc<Self>, message: impl Into<String>) {
        let log = Arc::clone(self);
        let message = message.into();
        if let Err(e) = tokio::task::spawn_blocking(move || log.record_or_warn(&message)).await {
            warn!(path = %self.path.display(), error = %e, "audit writer task failed");
        }
    }

    /// The last `n` lines in original order. A missing log is empty.
    pub fn tail(&self, n: usize) -> Result<Vec<String>, FleetError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(FleetError::Audit { source }),
        };
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut window = VecDeque::with_capacity(n);
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| FleetError::Audit { source })?;
            if window.len() == n {
                window.pop_front();
            }
            window.push_back(line);
        }
        Ok(window.into())
    }
}

fn format_line(timestamp: &str, message: &str) -> String {
    // Keep one entry per line even if a message carries remote output.
    let message = message.replace(['\r', '\n'], " ");
    format!("[{timestamp}] - {message}\n")
}
