// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metric extraction from captured workload output.
//!
//! The instrumented instance prints lines such as
//!
//! ```text
//! last-message = rendered: 1816, dropped: 0, current: 29.97, average: 30.01
//! ```
//!
//! The FPS of a trial is the number following the last `current:` marker.

use crate::host::HostUsage;
use once_cell::sync::Lazy;
use regex::Regex;
use streambench_core::{Error, Result, TrialKey};

static FPS_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"current:\s*([0-9]+(?:\.[0-9]+)?)").expect("FPS marker pattern is valid")
});

/// Return the value of the last `current: <number>` marker, if any.
///
/// `Some(0.0)` means the pipeline reported a stall; `None` means no marker
/// was printed at all.
pub fn find_fps(output: &str) -> Option<f64> {
    FPS_MARKER
        .captures_iter(output)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .last()
}

/// Like [`find_fps`], but reports a missing marker as [`Error::Extraction`].
pub fn extract_fps(key: &TrialKey, output: &str) -> Result<f64> {
    find_fps(output).ok_or_else(|| Error::Extraction {
        key: key.to_string(),
    })
}

/// Structured metrics for one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialMetrics {
    /// Extracted FPS, `None` when absent.
    pub fps: Option<f64>,
    /// Host utilization sample.
    pub usage: HostUsage,
}

impl TrialMetrics {
    /// Extract metrics from captured output and a host sample.
    ///
    /// A missing FPS marker is logged and recorded as absent.
    pub fn from_output(key: &TrialKey, output: &str, usage: HostUsage) -> Self {
        let fps = match extract_fps(key, output) {
            Ok(fps) => Some(fps),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "FPS not found; recording as absent");
                None
            }
        };
        Self { fps, usage }
    }
}
