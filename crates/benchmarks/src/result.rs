// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trial outcome types.
//!
//! This module provides the `TrialOutcome` record written once per executed
//! trial, together with the status and percentage types it carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use streambench_core::{TrialKey, TrialSpec};

/// How a trial ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    /// The workload exited cleanly before the deadline.
    Success,
    /// The deadline elapsed and the isolation boundary was killed.
    Timeout,
    /// The workload could not be started or exited with a failure.
    ProcessError,
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrialStatus::Success => "success",
            TrialStatus::Timeout => "timeout",
            TrialStatus::ProcessError => "process_error",
        })
    }
}

/// A utilization percentage, stored as a string such as `"85.3%"`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Percentage(f64);

impl Percentage {
    /// Create a percentage, clamped to `[0, 100]` and rounded to one decimal
    /// so that the stored string reads back to the same value.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self((value.clamp(0.0, 100.0) * 10.0).round() / 10.0)
    }

    /// The raw value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl std::str::FromStr for Percentage {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        number.parse::<f64>().map(Percentage::new)
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(d)? {
            Raw::Number(n) => Ok(Percentage::new(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Result of executing one [`TrialSpec`].
///
/// Written exactly once per execution and never modified. `fps` is `None`
/// when no FPS marker was found in the captured output, which is distinct
/// from a measured FPS of zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    /// Trial identity.
    #[serde(flatten)]
    pub spec: TrialSpec,
    /// How the trial ended.
    pub status: TrialStatus,
    /// Wall-clock duration in whole seconds.
    pub duration: u64,
    /// Last measured FPS of the instrumented instance.
    pub fps: Option<f64>,
    /// Host-wide CPU utilization point sample.
    pub cpu_usage: Percentage,
    /// Host-wide memory utilization point sample.
    pub memory_usage: Percentage,
    /// Exit code of the boundary process, when it exited on its own.
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Path of the raw log capture.
    pub log: PathBuf,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
}

impl TrialOutcome {
    /// Create a new builder.
    pub fn builder(spec: TrialSpec, status: TrialStatus) -> TrialOutcomeBuilder {
        TrialOutcomeBuilder {
            spec,
            status,
            duration: Duration::ZERO,
            fps: None,
            cpu_usage: Percentage::default(),
            memory_usage: Percentage::default(),
            exit_code: None,
            log: PathBuf::new(),
            timestamp: None,
        }
    }

    /// Canonical key of the trial.
    pub fn key(&self) -> TrialKey {
        self.spec.key()
    }

    /// Whether an FPS value was extracted.
    pub fn has_fps(&self) -> bool {
        self.fps.is_some()
    }
}

/// Builder for [`TrialOutcome`] instances.
#[derive(Debug)]
pub struct TrialOutcomeBuilder {
    spec: TrialSpec,
    status: TrialStatus,
    duration: Duration,
    fps: Option<f64>,
    cpu_usage: Percentage,
    memory_usage: Percentage,
    exit_code: Option<i32>,
    log: PathBuf,
    timestamp: Option<DateTime<Utc>>,
}

impl TrialOutcomeBuilder {
    /// Set the elapsed wall-clock time.
    pub fn duration(mut self, elapsed: Duration) -> Self {
        self.duration = elapsed;
        self
    }

    /// Set the extracted FPS.
    pub fn fps(mut self, fps: Option<f64>) -> Self {
        self.fps = fps;
        self
    }

    /// Set host CPU and memory utilization.
    pub fn usage(mut self, cpu: Percentage, memory: Percentage) -> Self {
        self.cpu_usage = cpu;
        self.memory_usage = memory;
        self
    }

    /// Set the exit code.
    pub fn exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Set the raw log path.
    pub fn log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log = path.into();
        self
    }

    /// Set the completion timestamp (default: now).
    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Build the outcome. Durations are rounded to the nearest second.
    pub fn build(self) -> TrialOutcome {
        TrialOutcome {
            spec: self.spec,
            status: self.status,
            duration: self.duration.as_secs_f64().round() as u64,
            fps: self.fps,
            cpu_usage: self.cpu_usage,
            memory_usage: self.memory_usage,
            exit_code: self.exit_code,
            log: self.log,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

/// Static description of the benchmark host, rendered into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Host name.
    pub host_name: String,
    /// Operating system name and version.
    pub os: String,
    /// Kernel version.
    pub kernel: String,
    /// CPU brand string.
    pub cpu_brand: String,
    /// Physical core count, when the platform reports it.
    #[serde(default)]
    pub physical_cores: Option<usize>,
    /// Logical CPU count.
    pub logical_cores: usize,
    /// Current frequency of the first CPU.
    #[serde(default)]
    pub cpu_frequency_mhz: u64,
    /// Installed memory.
    pub total_memory_bytes: u64,
    /// Memory available for new allocations at collection time.
    #[serde(default)]
    pub available_memory_bytes: u64,
    /// When this description was collected.
    pub collected_at: DateTime<Utc>,
}
