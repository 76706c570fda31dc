//! Per-run attempt log: a human-readable, millisecond-timestamped,
//! append-only text file recording every finalized attempt and the burst
//! summary. Every line is mirrored to tracing.
//!
//! The log is opened once per run, injected into the engine, and closed when
//! the run is over.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::{debug, error, info, warn, Level};

use crate::aggregate::BurstResult;
use crate::types::AttemptRecord;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub struct AttemptLog {
    path: Option<PathBuf>,
    file: Mutex<Option<BufWriter<File>>>,
}

impl AttemptLog {
    /// Open (or create) `path` for appending, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path: Some(path),
            file: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// A log that only reaches tracing.
    pub fn stdout_only() -> Self {
        Self {
            path: None,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write one free-form line at `level`.
    pub fn note(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            error!(target: "teetime::attempts", "{message}");
        } else if level == Level::WARN {
            warn!(target: "teetime::attempts", "{message}");
        } else if level == Level::INFO {
            info!(target: "teetime::attempts", "{message}");
        } else {
            debug!(target: "teetime::attempts", "{message}");
        }
        self.append(level, message);
    }

    pub fn record_attempt(&self, record: &AttemptRecord) {
        self.note(Level::INFO, &format_attempt(record));
        if let Some(ref detail) = record.error {
            self.note(Level::WARN, &format!("Error: {detail}"));
        }
    }

    pub fn record_summary(&self, result: &BurstResult) {
        for line in format_summary(result) {
            self.note(Level::INFO, &line);
        }
        self.flush();
    }

    /// Flush and release the file. Later lines still reach tracing.
    pub fn close(&self) -> io::Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut writer) = guard.take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn flush(&self) {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(writer) = guard.as_mut() {
            if let Err(e) = writer.flush() {
                warn!("attempt log flush failed: {e}");
            }
        }
    }

    fn append(&self, level: Level, message: &str) {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        let Some(writer) = guard.as_mut() else {
            return;
        };
        let line = format!(
            "{} - {} - {}\n",
            Local::now().format(TIMESTAMP_FORMAT),
            level,
            message
        );
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            warn!("attempt log write failed: {e}");
        }
    }
}

pub(crate) fn format_attempt(record: &AttemptRecord) -> String {
    let status = record
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "transport-error".to_string());
    format!(
        "Attempt at offset {:+}ms [{}]: Status={}, ResponseTime={:.2}ms, RTT={:.2}ms, Retries={}, Jitter={:+.2}ms, Outcome={}, Success={}",
        record.offset_ms,
        record.target,
        status,
        record.response_time_ms,
        record.round_trip_ms,
        record.retries,
        record.jitter_ms,
        record.outcome,
        record.success,
    )
}

pub(crate) fn format_summary(result: &BurstResult) -> Vec<String> {
    let s = &result.summary;
    let mut lines = vec![format!(
        "Burst Summary: {} successful, {} failed",
        s.success_count, s.failure_count
    )];

    if let Some(ref fastest) = s.fastest {
        lines.push(format!(
            "Fastest successful: {:.2}ms at offset {:+}ms [{}]",
            fastest.response_time_ms, fastest.offset_ms, fastest.target
        ));
    }
    if let Some(mean) = s.mean_response_ms {
        lines.push(format!("Average response time: {mean:.2}ms"));
    }
    if s.cutoff_count > 0 {
        lines.push(format!(
            "{} attempt(s) exhausted their retry budget",
            s.cutoff_count
        ));
    }
    if s.transport_error_count > 0 {
        lines.push(format!(
            "{} attempt(s) failed in transport",
            s.transport_error_count
        ));
    }
    if let (Some(mean), Some(max)) = (s.mean_jitter_ms, s.max_abs_jitter_ms) {
        lines.push(format!(
            "Scheduler jitter: mean {mean:+.2}ms, max {max:.2}ms"
        ));
    }
    lines
}
