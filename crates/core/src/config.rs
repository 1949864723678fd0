// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark configuration.
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. built-in defaults ([`BenchConfig::default`]),
//! 2. an optional TOML/YAML/JSON file,
//! 3. `STREAMBENCH__*` environment variables (`__` separates sections, lists
//!    are comma-separated), e.g. `STREAMBENCH__RUNTIME__DEADLINE_SECS=30` or
//!    `STREAMBENCH__MATRIX__STREAM_COUNTS=1,2,4`.
//!
//! The loaded [`BenchConfig`] is immutable and passed by reference into the
//! planner, runner and orchestrator.

use crate::{Error, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "STREAMBENCH";

/// Keys whose environment values are parsed as comma-separated lists.
const LIST_KEYS: &[&str] = &[
    "matrix.detection_models",
    "matrix.classification_models",
    "matrix.inference_intervals",
    "matrix.stream_counts",
    "acquisition.downloader",
    "runtime.container_cli",
];

/// The trial matrix: every combination becomes one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Detection models to benchmark.
    pub detection_models: Vec<String>,
    /// Classification models; a "none" variant is always added by the planner.
    #[serde(default)]
    pub classification_models: Vec<String>,
    /// Inference intervals (run inference every n-th frame).
    pub inference_intervals: Vec<u32>,
    /// Concurrent stream counts.
    pub stream_counts: Vec<u32>,
    /// Device tag handed to the inference elements.
    pub device: String,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            detection_models: vec![
                "person-detection-retail-0013".to_string(),
                "person-vehicle-bike-detection-2004".to_string(),
            ],
            classification_models: vec!["person-attributes-recognition-crossroad-0230".to_string()],
            inference_intervals: vec![1, 3],
            stream_counts: vec![1, 2, 4, 8],
            device: "CPU".to_string(),
        }
    }
}

/// How trials are isolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxKind {
    /// One `docker run` container per trial.
    Docker,
    /// One local process group per trial.
    Local,
}

impl std::str::FromStr for SandboxKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "local" => Ok(Self::Local),
            other => Err(Error::configuration(format!(
                "unknown sandbox '{other}' (expected docker or local)"
            ))),
        }
    }
}

/// Execution settings for each trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Isolation boundary implementation.
    pub sandbox: SandboxKind,
    /// Container image used by the docker sandbox.
    pub image: String,
    /// Container CLI argv prefix, e.g. `["docker"]`, `["sudo", "docker"]`
    /// or `["podman"]`.
    pub container_cli: Vec<String>,
    /// Hard wall-clock deadline per trial.
    pub deadline_secs: u64,
    /// Period between host utilization samples while a trial runs.
    pub sample_interval_secs: u64,
    /// Pause between consecutive trials so the host settles.
    pub cooldown_secs: u64,
    /// Model precision directory (`FP16`, `FP32`, ...).
    pub precision: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxKind::Docker,
            image: "intel/dlstreamer:latest".to_string(),
            container_cli: vec!["docker".to_string()],
            deadline_secs: 60,
            sample_interval_secs: 5,
            cooldown_secs: 2,
            precision: "FP16".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Per-trial deadline.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Host sampling period.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    /// Pause between trials.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Command templates for the workload launched inside the boundary.
///
/// Placeholders: `{video}`, `{detection_model}`, `{classification_model}`,
/// `{device}`, `{interval}`, `{classification}` (the expanded
/// `classification_stage`, empty without a classification model) and
/// `{sink}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Program launching one pipeline instance.
    pub launcher: String,
    /// Extra launcher flags for the instrumented instance only.
    pub measured_flags: String,
    /// Pipeline description.
    pub pipeline: String,
    /// Fragment inserted for `{classification}` when a model is configured.
    pub classification_stage: String,
    /// Sink of the instrumented instance; must print `current: <fps>`.
    pub measured_sink: String,
    /// Sink of the background load instances.
    pub background_sink: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            launcher: "gst-launch-1.0".to_string(),
            measured_flags: "-v".to_string(),
            pipeline: "filesrc location={video} ! decodebin ! videoconvert ! \
                       gvadetect model={detection_model} device={device} inference-interval={interval} ! \
                       queue ! {classification}{sink}"
                .to_string(),
            classification_stage: "gvaclassify model={classification_model} device={device} \
                                   inference-interval={interval} ! queue ! "
                .to_string(),
            measured_sink: "gvafpscounter ! fpsdisplaysink video-sink=fakesink text-overlay=false sync=false"
                .to_string(),
            background_sink: "fakesink sync=false".to_string(),
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root for `results/`, `logs/` and `reports/`.
    pub output_dir: PathBuf,
    /// Model cache (`<models>/intel/<model>/<precision>/<model>.xml`).
    pub models_dir: PathBuf,
    /// Sample video decoded by every instance.
    pub video: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("benchmark_results"),
            models_dir: PathBuf::from("models"),
            video: PathBuf::from("videos/sample.mp4"),
        }
    }
}

/// Model acquisition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Skip acquisition entirely and trust the model cache.
    pub enabled: bool,
    /// Downloader argv prefix; `--name`, `--precisions` and `--output_dir`
    /// are appended.
    pub downloader: Vec<String>,
    /// Base URL for direct downloads when the downloader fails.
    pub fallback_base_url: String,
    /// Timeout for each fallback HTTP request.
    pub http_timeout_secs: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            downloader: vec!["omz_downloader".to_string()],
            fallback_base_url:
                "https://storage.openvinotoolkit.org/repositories/open_model_zoo/2023.0/models_bin/1"
                    .to_string(),
            http_timeout_secs: 120,
        }
    }
}

/// Complete benchmark configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Trial matrix.
    #[serde(default)]
    pub matrix: MatrixConfig,
    /// Per-trial execution settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Workload command templates.
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Filesystem layout.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Model acquisition.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
}

impl BenchConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&BenchConfig::default())?);

        if let Some(path) = file {
            if !path.exists() {
                return Err(Error::configuration(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path).required(true));
        }

        let mut env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",");
        for key in LIST_KEYS {
            env = env.with_list_parse_key(key);
        }
        builder = builder.add_source(env);

        let config: BenchConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            sandbox = ?config.runtime.sandbox,
            deadline_secs = config.runtime.deadline_secs,
            output_dir = %config.paths.output_dir.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Check runtime settings. The matrix itself is validated by the planner.
    pub fn validate(&self) -> Result<()> {
        if self.runtime.deadline_secs == 0 {
            return Err(Error::configuration("runtime.deadline_secs must be positive"));
        }
        if self.runtime.sample_interval_secs == 0 {
            return Err(Error::configuration(
                "runtime.sample_interval_secs must be positive",
            ));
        }
        if self.runtime.sandbox == SandboxKind::Docker && self.runtime.image.trim().is_empty() {
            return Err(Error::configuration(
                "runtime.image is required for the docker sandbox",
            ));
        }
        if self.runtime.sandbox == SandboxKind::Docker && self.runtime.container_cli.is_empty() {
            return Err(Error::configuration(
                "runtime.container_cli must name a program for the docker sandbox",
            ));
        }
        if self.runtime.precision.trim().is_empty() {
            return Err(Error::configuration("runtime.precision must not be empty"));
        }
        if self.workload.launcher.trim().is_empty() {
            return Err(Error::configuration("workload.launcher must not be empty"));
        }
        if self.acquisition.enabled && self.acquisition.downloader.is_empty() {
            return Err(Error::configuration(
                "acquisition.downloader must name a program when acquisition is enabled",
            ));
        }
        Ok(())
    }

    /// Directory holding one JSON record per trial.
    pub fn results_dir(&self) -> PathBuf {
        self.paths.output_dir.join("results")
    }

    /// Directory holding one raw log per trial.
    pub fn logs_dir(&self) -> PathBuf {
        self.paths.output_dir.join("logs")
    }

    /// Directory holding rendered reports.
    pub fn reports_dir(&self) -> PathBuf {
        self.paths.output_dir.join("reports")
    }
}
