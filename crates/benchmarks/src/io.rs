// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! I/O operations for trial outcomes.
//!
//! This module provides the file-backed result store (one JSON record per
//! trial key) and the writers for the combined outputs in the reports
//! directory. Every file is written atomically: the bytes go to a hidden
//! temporary file in the same directory, are synced, then renamed over the
//! destination, so readers only ever see a complete record or none.

use crate::aggregate::AggregateReport;
use crate::result::TrialOutcome;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use streambench_core::{Error, Result, TrialKey};
use tracing::{debug, warn};

/// Combined JSON file in the reports directory.
pub const ALL_RESULTS_FILE: &str = "all_results.json";

/// Aggregate JSON file in the reports directory.
pub const AGGREGATE_FILE: &str = "aggregate.json";

/// CSV export in the reports directory.
pub const CSV_FILE: &str = "results.csv";

/// Markdown report in the reports directory.
pub const REPORT_FILE: &str = "report.md";

/// Write `bytes` to `path` via a temporary file and rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("record");
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.tmp.{}.{}", name, std::process::id(), nanos));

    let write = || -> io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Durable, overwrite-by-key store of trial outcomes.
#[derive(Debug, Clone)]
pub struct FileResultStore {
    root: PathBuf,
}

impl FileResultStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the records.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for `key`.
    pub fn record_path(&self, key: &TrialKey) -> PathBuf {
        self.root.join(key.record_file_name())
    }

    /// Persist an outcome, replacing any earlier record with the same key.
    pub fn put(&self, outcome: &TrialOutcome) -> Result<PathBuf> {
        let key = outcome.key();
        let path = self.record_path(&key);
        let json = serde_json::to_vec_pretty(outcome)?;
        atomic_write(&path, &json).map_err(|source| Error::StoreWrite {
            key: key.to_string(),
            source,
        })?;
        debug!(key = %key, path = %path.display(), "Stored trial outcome");
        Ok(path)
    }

    /// Read the record for `key`, if present.
    pub fn get(&self, key: &TrialKey) -> Result<Option<TrialOutcome>> {
        let path = self.record_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read every record, ordered by file name.
    ///
    /// Temporary files are ignored; records that fail to parse are skipped
    /// with a warning.
    pub fn scan(&self) -> Result<Vec<TrialOutcome>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(true, |n| n.starts_with('.'));
                !hidden && path.extension().is_some_and(|ext| ext == "json")
            })
            .collect();
        paths.sort();

        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let parsed = fs::read(&path)
                .map_err(Error::from)
                .and_then(|bytes| serde_json::from_slice::<TrialOutcome>(&bytes).map_err(Error::from));
            match parsed {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }
        Ok(outcomes)
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize> {
        Ok(self.scan()?.len())
    }

    /// Whether the store has no records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Write outcomes to a combined JSON file.
pub fn write_results_json(outcomes: &[TrialOutcome], path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_vec_pretty(outcomes)?;
    atomic_write(path.as_ref(), &json)?;
    Ok(())
}

/// Write the aggregate report as JSON.
pub fn write_aggregate_json(report: &AggregateReport, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    atomic_write(path.as_ref(), &json)?;
    Ok(())
}

/// Render outcomes as CSV, one row per trial.
pub fn outcomes_to_csv(outcomes: &[TrialOutcome]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    let to_io = |e: csv::Error| Error::Io(io::Error::new(io::ErrorKind::Other, e));

    wtr.write_record([
        "model",
        "classification_model",
        "inference_interval",
        "num_streams",
        "device",
        "status",
        "duration",
        "fps",
        "cpu_usage",
        "memory_usage",
        "timestamp",
    ])
    .map_err(to_io)?;

    for outcome in outcomes {
        let spec = &outcome.spec;
        wtr.write_record([
            spec.detection_model.to_string(),
            spec.classification_model
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            spec.inference_interval.to_string(),
            spec.num_streams.to_string(),
            spec.device.to_string(),
            outcome.status.to_string(),
            outcome.duration.to_string(),
            outcome
                .fps
                .map(|fps| format!("{fps:.2}"))
                .unwrap_or_else(|| crate::markdown::NOT_AVAILABLE.to_string()),
            outcome.cpu_usage.to_string(),
            outcome.memory_usage.to_string(),
            outcome.timestamp.to_rfc3339(),
        ])
        .map_err(to_io)?;
    }

    wtr.into_inner()
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
}

/// Write outcomes as CSV.
pub fn write_csv(outcomes: &[TrialOutcome], path: impl AsRef<Path>) -> Result<()> {
    let bytes = outcomes_to_csv(outcomes)?;
    atomic_write(path.as_ref(), &bytes)?;
    Ok(())
}

/// Paths of the files written by [`write_all_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifacts {
    /// Combined outcome JSON.
    pub all_results: PathBuf,
    /// Aggregate JSON.
    pub aggregate: PathBuf,
    /// CSV export.
    pub csv: PathBuf,
    /// Markdown report.
    pub report: PathBuf,
}

/// Write every report artifact into `reports_dir`.
pub fn write_all_outputs(
    reports_dir: &Path,
    report: &AggregateReport,
    outcomes: &[TrialOutcome],
    markdown: &str,
) -> Result<ReportArtifacts> {
    fs::create_dir_all(reports_dir)?;
    let artifacts = ReportArtifacts {
        all_results: reports_dir.join(ALL_RESULTS_FILE),
        aggregate: reports_dir.join(AGGREGATE_FILE),
        csv: reports_dir.join(CSV_FILE),
        report: reports_dir.join(REPORT_FILE),
    };

    write_results_json(outcomes, &artifacts.all_results)?;
    write_aggregate_json(report, &artifacts.aggregate)?;
    write_csv(outcomes, &artifacts.csv)?;
    atomic_write(&artifacts.report, markdown.as_bytes())?;

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::fixtures::outcome;

    #[test]
    fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::open(dir.path().join("results")).unwrap();

        let first = outcome(2, Some(30.0), 50.0);
        let path = store.put(&first).unwrap();
        assert_eq!(path.file_name().unwrap(), "det__1_2_CPU.json");
        assert_eq!(store.get(&first.key()).unwrap(), Some(first));
    }

    #[test]
    fn test_same_key_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::open(dir.path()).unwrap();

        let first = outcome(2, Some(30.0), 50.0);
        let second = outcome(2, Some(12.5), 91.0);
        store.put(&first).unwrap();
        store.put(&second).unwrap();

        let all = store.scan().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].fps, Some(12.5));
        assert_eq!(all[0].cpu_usage.value(), 91.0);
    }

    #[test]
    fn test_scan_is_sorted_and_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::open(dir.path()).unwrap();

        store.put(&outcome(8, Some(5.0), 99.0)).unwrap();
        store.put(&outcome(1, Some(30.0), 20.0)).unwrap();
        fs::write(dir.path().join(".det__1_4_CPU.json.tmp.1.2"), b"{partial").unwrap();
        fs::write(dir.path().join("broken.json"), b"not json").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let all = store.scan().unwrap();
        let streams: Vec<u32> = all.iter().map(|o| o.spec.num_streams.get()).collect();
        assert_eq!(streams, vec![1, 8]);
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.json");
        atomic_write(&path, b"{}").unwrap();
        atomic_write(&path, b"{\"a\":1}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}");
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_csv_marks_absent_fps() {
        let csv = outcomes_to_csv(&[outcome(1, None, 10.0), outcome(2, Some(0.0), 10.0)]).unwrap();
        let text = String::from_utf8(csv).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("model,classification_model"));
        assert!(lines[1].contains(",N/A,"));
        assert!(lines[2].contains(",0.00,"));
    }
}
