//! File discovery: finds input shards matching a glob-like pattern and
//! returns them in deterministic filename order.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("no files in {dir} matched pattern {pattern}")]
    NoFilesMatched { dir: PathBuf, pattern: String },

    #[error("failed to read directory {dir}: {source}")]
    ReadDir { dir: PathBuf, source: walkdir::Error },

    #[error("{file}: {source}")]
    Csv { file: PathBuf, source: csv::Error },

    #[error("{file}: missing required column {column}")]
    MissingColumn { file: PathBuf, column: &'static str },
}

/// Discover files directly under `dir` whose filename matches `pattern`, a
/// glob restricted to at most one `*` wildcard (e.g.
/// `pharmacy_claims_simulation_*.csv`), sorted lexicographically by
/// filename so split-file shards are consumed in natural order.
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut matches = Vec::new();
    for entry in walkdir::WalkDir::new(dir).max_depth(1).into_iter() {
        let entry = entry.map_err(|source| IngestError::ReadDir { dir: dir.to_path_buf(), source })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if matches_pattern(&name, pattern) {
            matches.push(entry.into_path());
        }
    }

    if matches.is_empty() {
        return Err(IngestError::NoFilesMatched { dir: dir.to_path_buf(), pattern: pattern.to_string() });
    }

    matches.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(matches)
}

/// Matches `name` against a glob restricted to a single `*` wildcard. A
/// pattern with no `*` is an exact match.
fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
        None => name == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_prefix_star_suffix() {
        assert!(matches_pattern(
            "pharmacy_claims_simulation_0.csv",
            "pharmacy_claims_simulation_*.csv"
        ));
        assert!(!matches_pattern("other_file.csv", "pharmacy_claims_simulation_*.csv"));
    }

    #[test]
    fn exact_pattern_without_wildcard() {
        assert!(matches_pattern("claims.csv", "claims.csv"));
        assert!(!matches_pattern("claims2.csv", "claims.csv"));
    }

    #[test]
    fn discover_sorts_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["shard_10.csv", "shard_2.csv", "shard_1.csv"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let found = discover(dir.path(), "shard_*.csv").unwrap();
        let names: Vec<_> = found.iter().map(|p| p.file_name().unwrap().to_string_lossy().to_string()).collect();
        // Lexicographic, not numeric: "10" sorts before "2".
        assert_eq!(names, vec!["shard_1.csv", "shard_10.csv", "shard_2.csv"]);
    }
}
