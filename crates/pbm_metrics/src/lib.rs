//! Per-store-operation metrics recorder.
//!
//! One append-only, pipe-delimited log file per entity kind (`claim`,
//! `benefitplan`, ...). Never blocks the pipeline and never retries on I/O
//! failure: metrics loss is tolerated, claim loss is not.

use chrono::Utc;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One timed store operation, ready to be formatted into a log line.
#[derive(Debug, Clone, Copy)]
pub struct OperationSample {
    pub total_ms: f64,
    pub rows: u64,
    pub bytes: u64,
}

impl OperationSample {
    pub fn new(total_ms: f64, rows: u64, bytes: u64) -> Self {
        Self { total_ms, rows, bytes }
    }

    fn ms_per_row(&self) -> f64 {
        if self.rows == 0 { 0.0 } else { self.total_ms / self.rows as f64 }
    }

    fn rows_per_sec(&self) -> f64 {
        if self.total_ms <= 0.0 { 0.0 } else { self.rows as f64 / (self.total_ms / 1000.0) }
    }

    fn ms_per_kb(&self) -> f64 {
        let kb = self.bytes as f64 / 1024.0;
        if kb <= 0.0 { 0.0 } else { self.total_ms / kb }
    }

    fn mb_per_sec(&self) -> f64 {
        let secs = self.total_ms / 1000.0;
        if secs <= 0.0 { 0.0 } else { (self.bytes as f64 / 1_048_576.0) / secs }
    }

    fn bytes_per_row(&self) -> f64 {
        if self.rows == 0 { 0.0 } else { self.bytes as f64 / self.rows as f64 }
    }
}

/// Append-only writer for one entity's metrics log.
struct EntityLog {
    writer: BufWriter<File>,
}

impl EntityLog {
    fn open(dir: &Path, entity: &str, run_id: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{entity}_{run_id}.metrics.log"));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { writer: BufWriter::new(file) })
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

/// Records metrics for store operations across whatever entities the
/// pipeline touches, one log file per entity, created lazily on first use.
pub struct MetricsRecorder {
    dir: PathBuf,
    run_id: String,
    logs: Mutex<HashMap<String, EntityLog>>,
}

impl MetricsRecorder {
    pub fn new(dir: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            run_id: run_id.into(),
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// Record one operation against `entity`. Best-effort: an I/O failure is
    /// logged and swallowed rather than surfaced to the caller.
    pub fn record(&self, entity: &str, operation: &str, sample: OperationSample) {
        let line = format_line(entity, operation, &sample);
        let mut logs = self.logs.lock().expect("metrics recorder mutex poisoned");
        let log = match logs.get_mut(entity) {
            Some(log) => log,
            None => {
                match EntityLog::open(&self.dir, entity, &self.run_id) {
                    Ok(log) => logs.entry(entity.to_string()).or_insert(log),
                    Err(err) => {
                        tracing::warn!(entity, %err, "failed to open metrics log; dropping sample");
                        return;
                    }
                }
            }
        };
        if let Err(err) = log.write_line(&line) {
            tracing::warn!(entity, %err, "failed to write metrics sample; dropping");
        }
    }
}

fn format_line(entity: &str, operation: &str, sample: &OperationSample) -> String {
    format!(
        "{timestamp}|{entity}|{operation}|{total_ms:.3}|{rows}|{ms_per_row:.4}|{rows_per_sec:.2}|{bytes}|{ms_per_kb:.4}|{mb_per_sec:.4}|{bytes_per_row:.2}",
        timestamp = Utc::now().to_rfc3339(),
        entity = entity,
        operation = operation,
        total_ms = sample.total_ms,
        rows = sample.rows,
        ms_per_row = sample.ms_per_row(),
        rows_per_sec = sample.rows_per_sec(),
        bytes = sample.bytes,
        ms_per_kb = sample.ms_per_kb(),
        mb_per_sec = sample.mb_per_sec(),
        bytes_per_row = sample.bytes_per_row(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_line_has_eleven_pipe_delimited_fields() {
        let sample = OperationSample::new(100.0, 1000, 50_000);
        let line = format_line("claim", "insert_batch", &sample);
        assert_eq!(line.split('|').count(), 11);
    }

    #[test]
    fn record_creates_one_file_per_entity() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = MetricsRecorder::new(dir.path(), "run1");
        recorder.record("claim", "insert_batch", OperationSample::new(12.0, 1000, 40_000));
        recorder.record("benefitplan", "scan", OperationSample::new(3.0, 10, 500));
        assert!(dir.path().join("claim_run1.metrics.log").exists());
        assert!(dir.path().join("benefitplan_run1.metrics.log").exists());
    }

    #[test]
    fn zero_rows_does_not_divide_by_zero() {
        let sample = OperationSample::new(5.0, 0, 0);
        assert_eq!(sample.ms_per_row(), 0.0);
        assert_eq!(sample.rows_per_sec(), 0.0);
        assert_eq!(sample.bytes_per_row(), 0.0);
    }
}
