//! Claim Source: streaming CSV ingestion of pharmacy claim records.
//!
//! Discovers input files matching a pattern, parses each data row into an
//! [`pbm_protocol::IngestedClaim`], and reports per-file/per-row progress.
//! Per-row parse failures are counted and skipped rather than aborting the
//! file; a missing required column or an unreadable directory is fatal.

mod discover;
mod parse;

use std::path::{Path, PathBuf};

use chrono::Utc;
use pbm_protocol::IngestedClaim;

pub use discover::{discover, IngestError};
pub use parse::ParseWarning;

/// Summary of one `load_all()` call, used to populate the final report.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestReport {
    pub files: usize,
    pub total_rows: u64,
    pub parsed: u64,
    pub warnings: u64,
}

/// Discovers and streams claim records out of a directory of delimited
/// files, in deterministic (lexicographic-by-filename) order.
pub struct ClaimSource {
    dir: PathBuf,
    pattern: String,
}

impl ClaimSource {
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self { dir: dir.into(), pattern: pattern.into() }
    }

    /// Deterministic, sorted list of files matching the configured pattern.
    pub fn discover(&self) -> Result<Vec<PathBuf>, IngestError> {
        discover::discover(&self.dir, &self.pattern)
    }

    /// Opens every discovered file in order and parses every row into an
    /// [`IngestedClaim`]. Returns the full in-memory sequence plus a report
    /// of rows seen/parsed/warned about.
    pub fn load_all(&self) -> Result<(Vec<IngestedClaim>, IngestReport), IngestError> {
        let files = self.discover()?;
        let mut claims = Vec::new();
        let mut report = IngestReport { files: files.len(), ..Default::default() };

        for (idx, path) in files.iter().enumerate() {
            let before = claims.len();
            load_file(path, &mut claims, &mut report)?;
            let loaded_from_file = claims.len() - before;
            tracing::info!(
                file = %path.display(),
                "Loaded {} claims from file {}",
                loaded_from_file,
                idx + 1
            );
        }

        Ok((claims, report))
    }
}

fn load_file(
    path: &Path,
    claims: &mut Vec<IngestedClaim>,
    report: &mut IngestReport,
) -> Result<(), IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| IngestError::Csv { file: path.to_path_buf(), source: err })?;

    let header_index = parse::header_index(&mut reader, path)?;

    for result in reader.records() {
        let record = result.map_err(|err| IngestError::Csv { file: path.to_path_buf(), source: err })?;
        report.total_rows += 1;
        let received_timestamp = Utc::now();
        match parse::parse_row(&record, &header_index, received_timestamp) {
            Ok(claim) => {
                claims.push(claim);
                report.parsed += 1;
            }
            Err(warning) => {
                tracing::warn!(file = %path.display(), row = report.total_rows, %warning, "skipping unparseable row");
                report.warnings += 1;
            }
        }
    }

    Ok(())
}
