// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trial outcomes, result store and reporting for streambench.
//!
//! # Quick Start
//!
//! ```no_run
//! use streambench_benchmarks::{io::FileResultStore, summarize};
//!
//! let store = FileResultStore::open("benchmark_results/results")?;
//! let summary = summarize(&store)?;
//! println!("{}", summary.markdown);
//! # Ok::<(), streambench_core::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`result`] - The `TrialOutcome` record and its status types
//! - [`io`] - Atomic result store and report writers
//! - [`aggregate`] - Best run, bottleneck and saturation analysis
//! - [`markdown`] - Markdown report generation

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod io;
pub mod markdown;
pub mod result;

pub use aggregate::{aggregate, AggregateReport, Bottleneck};
pub use io::FileResultStore;
pub use result::{Percentage, SystemInfo, TrialOutcome, TrialStatus};

use std::path::Path;
use streambench_core::Result;

/// Aggregate and rendered report for the current store contents.
#[derive(Debug, Clone)]
pub struct Summary {
    /// Outcomes in scan order.
    pub outcomes: Vec<TrialOutcome>,
    /// Derived aggregate.
    pub report: AggregateReport,
    /// Rendered markdown.
    pub markdown: String,
}

/// Scan the store, aggregate and render.
///
/// Only reads the store; calling it repeatedly on an unchanged store yields
/// the same aggregate and text.
pub fn summarize(store: &FileResultStore) -> Result<Summary> {
    let outcomes = store.scan()?;
    let report = aggregate(&outcomes);
    let markdown = markdown::render_report(&report, &outcomes);
    Ok(Summary {
        outcomes,
        report,
        markdown,
    })
}

/// Summarize the store and write every report artifact into `reports_dir`.
///
/// When `host` is given, a host section is appended to the markdown report.
pub fn summarize_and_write(
    store: &FileResultStore,
    reports_dir: &Path,
    host: Option<&SystemInfo>,
) -> Result<(Summary, io::ReportArtifacts)> {
    let mut summary = summarize(store)?;
    if let Some(info) = host {
        summary.markdown.push('\n');
        summary.markdown.push_str(&markdown::render_host_section(info));
    }
    let artifacts =
        io::write_all_outputs(reports_dir, &summary.report, &summary.outcomes, &summary.markdown)?;
    tracing::info!(
        trials = summary.report.total_trials,
        report = %artifacts.report.display(),
        "Wrote reports"
    );
    Ok((summary, artifacts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::fixtures::outcome;

    #[test]
    fn test_summarize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::open(dir.path().join("results")).unwrap();
        store.put(&outcome(1, Some(30.0), 85.0)).unwrap();
        store.put(&outcome(2, None, 85.0)).unwrap();

        let first = summarize(&store).unwrap();
        let second = summarize(&store).unwrap();
        assert_eq!(first.report, second.report);
        assert_eq!(first.markdown, second.markdown);
        assert_eq!(first.report.bottleneck, Bottleneck::CpuBound);
    }

    #[test]
    fn test_summarize_and_write_creates_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::open(dir.path().join("results")).unwrap();
        store.put(&outcome(1, Some(30.0), 20.0)).unwrap();

        let reports = dir.path().join("reports");
        let (summary, artifacts) = summarize_and_write(&store, &reports, None).unwrap();
        assert_eq!(summary.report.total_trials, 1);
        for path in [
            &artifacts.all_results,
            &artifacts.aggregate,
            &artifacts.csv,
            &artifacts.report,
        ] {
            assert!(path.exists(), "{} missing", path.display());
        }

        let stored: Vec<TrialOutcome> =
            serde_json::from_slice(&std::fs::read(&artifacts.all_results).unwrap()).unwrap();
        assert_eq!(stored, summary.outcomes);
    }
}
