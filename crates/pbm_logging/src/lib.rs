//! Shared logging utilities for the simulator binary.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "pbm=info,pbm_ingest=info,pbm_db=info,pbm_engine=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration shared by the simulator binary.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with a rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("failed to ensure log directory")?;
    let file_writer = SharedRollingWriter::new(log_dir, config.app_name)
        .context("failed to initialize rolling log writer")?;

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // `info` always reaches the console: the coordinator's progress lines
    // and final report (spec.md §4.5/§6.2) are user-facing output, not
    // diagnostics. `--verbose` additionally surfaces per-module `debug`
    // spans that only the rolling file gets by default.
    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new(DEFAULT_LOG_FILTER)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .init();

    Ok(())
}

/// Get the simulator's home directory: `$PBM_HOME` or `~/.pbm_sim`.
pub fn pbm_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("PBM_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .expect("could not determine home directory")
        .join(".pbm_sim")
}

/// Get the logs directory: `<home>/logs`.
pub fn logs_dir() -> PathBuf {
    pbm_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("failed to create log directory: {}", logs.display()))?;
    Ok(logs)
}

struct RollingFileAppender {
    dir: PathBuf,
    base_name: String,
    max_files: usize,
    max_size: u64,
    file: Option<File>,
    current_size: u64,
}

impl RollingFileAppender {
    fn new(dir: PathBuf, base_name: &str, max_files: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let mut appender = Self {
            dir,
            base_name: sanitize_name(base_name),
            max_files: max_files.max(1),
            max_size,
            file: None,
            current_size: 0,
        };
        let (file, size) = appender.open_current_file()?;
        appender.file = Some(file);
        appender.current_size = size;
        if appender.current_size > appender.max_size {
            appender.rotate()?;
        }
        Ok(appender)
    }

    fn open_current_file(&self) -> io::Result<(File, u64)> {
        let path = self.current_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok((file, size))
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn rolled_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{index}", self.base_name))
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        for idx in (1..self.max_files).rev() {
            let src = self.rolled_path(idx);
            if src.exists() {
                let _ = fs::rename(&src, self.rolled_path(idx + 1));
            }
        }
        let current = self.current_path();
        if current.exists() {
            let _ = fs::rename(&current, self.rolled_path(1));
        }
        let (file, size) = self.open_current_file()?;
        self.file = Some(file);
        self.current_size = size;
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size >= self.max_size {
            self.rotate()?;
        }
        let file = self.file.as_mut().expect("file always present after init");
        let written = file.write(buf)?;
        self.current_size += written as u64;
        Ok(written)
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// `Clone`-able, `Send + Sync` wrapper so `tracing_subscriber::fmt::layer`
/// can share one rolling file across threads.
#[derive(Clone)]
struct SharedRollingWriter {
    inner: Arc<Mutex<RollingFileAppender>>,
}

impl SharedRollingWriter {
    fn new(dir: PathBuf, app_name: &str) -> io::Result<Self> {
        let appender = RollingFileAppender::new(dir, app_name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(appender)),
        })
    }
}

impl Write for SharedRollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .expect("rolling log writer mutex poisoned")
            .write_bytes(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRollingWriter {
    type Writer = SharedRollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn rolling_appender_rotates_past_max_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut appender =
            RollingFileAppender::new(dir.path().to_path_buf(), "test", 3, 16).unwrap();
        for _ in 0..10 {
            appender.write_bytes(b"0123456789").unwrap();
        }
        assert!(dir.path().join("test.log").exists());
        assert!(dir.path().join("test.log.1").exists());
    }

    #[test]
    fn sanitize_name_strips_path_separators() {
        assert_eq!(sanitize_name("pbm/sim claim"), "pbm_sim_claim");
    }
}
