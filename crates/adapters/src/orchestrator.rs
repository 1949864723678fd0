// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequential execution of a trial plan.
//!
//! Trials never overlap: each one gets the whole machine, and the only
//! state shared between trials is the result store. A failing trial is
//! recorded and the run moves on; only configuration problems and a missing
//! sample video stop a run, and both are detected before the first trial.

use crate::acquisition::{ModelAcquirer, ModelLayout};
use crate::host::SysinfoSampler;
use crate::metrics::TrialMetrics;
use crate::runner::ProcessRunner;
use crate::sandbox;
use crate::workload::Workload;
use std::time::Duration;
use streambench_benchmarks::aggregate::StatusCounts;
use streambench_benchmarks::{FileResultStore, TrialOutcome};
use streambench_core::{BenchConfig, Error, Planner, Result, TrialSpec};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Fail unless the sample video exists.
pub fn check_assets(config: &BenchConfig) -> Result<()> {
    if config.paths.video.is_file() {
        Ok(())
    } else {
        Err(Error::asset_missing(&config.paths.video))
    }
}

/// Validate the matrix and, when enabled, acquire its models.
///
/// Models that cannot be acquired are dropped from the plan with a warning.
pub async fn prepare_plan(config: &BenchConfig) -> Result<Planner> {
    let planner = Planner::new(&config.matrix)?;
    if !config.acquisition.enabled {
        info!("Model acquisition disabled; trusting the model cache");
        return Ok(planner);
    }

    let acquirer = ModelAcquirer::from_config(config)?;
    let report = acquirer.acquire_all(&planner.models()).await;
    let planner = planner.without_models(&report.unavailable_ids())?;
    info!(
        available = report.available.len(),
        unavailable = report.unavailable.len(),
        trials = planner.len(),
        "Plan ready"
    );
    Ok(planner)
}

/// Progress notifications emitted while a plan executes.
#[derive(Debug)]
pub enum TrialEvent<'a> {
    /// A trial is about to start.
    Started {
        /// Zero-based position in the plan.
        index: usize,
        /// Plan length.
        total: usize,
        /// The trial.
        spec: &'a TrialSpec,
    },
    /// A trial's outcome is final.
    Finished {
        /// Zero-based position in the plan.
        index: usize,
        /// Plan length.
        total: usize,
        /// The recorded outcome.
        outcome: &'a TrialOutcome,
    },
}

/// What happened during one [`Orchestrator::execute`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Run identifier used in boundary names.
    pub run_id: String,
    /// Trials executed.
    pub attempted: usize,
    /// Outcomes per status.
    pub counts: StatusCounts,
    /// Outcomes that could not be persisted.
    pub store_failures: usize,
}

/// Drives a [`ProcessRunner`] over a plan and records every outcome.
pub struct Orchestrator {
    runner: ProcessRunner,
    store: FileResultStore,
    cooldown: Duration,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(runner: ProcessRunner, store: FileResultStore, cooldown: Duration) -> Self {
        Self {
            runner,
            store,
            cooldown,
        }
    }

    /// Wire the configured sandbox, workload, sampler and store together.
    pub fn from_config(config: &BenchConfig) -> Result<Self> {
        let sandbox = sandbox::from_config(config)?;
        let workload = Workload::new(
            config.workload.clone(),
            ModelLayout::new(sandbox.models_root(), &config.runtime.precision),
            sandbox.video_path(),
        );
        let run_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let runner = ProcessRunner::new(
            sandbox,
            workload,
            Box::new(SysinfoSampler::new()),
            config.logs_dir(),
            run_id,
            &config.runtime,
        );
        let store = FileResultStore::open(config.results_dir())?;
        Ok(Self::new(runner, store, config.runtime.cooldown()))
    }

    /// The result store outcomes are written to.
    pub fn store(&self) -> &FileResultStore {
        &self.store
    }

    /// Run one trial and build its outcome. Does not persist it.
    pub async fn run_trial(&mut self, spec: &TrialSpec) -> TrialOutcome {
        let key = spec.key();
        let report = self.runner.run(spec).await;
        let metrics = TrialMetrics::from_output(&key, &report.output, report.usage);

        TrialOutcome::builder(spec.clone(), report.status)
            .duration(report.elapsed)
            .fps(metrics.fps)
            .usage(metrics.usage.cpu, metrics.usage.memory)
            .exit_code(report.exit_code)
            .log(report.log_path)
            .build()
    }

    /// Execute `plan` in order, persisting each outcome as soon as it exists.
    pub async fn execute<F>(&mut self, plan: &[TrialSpec], mut observe: F) -> RunSummary
    where
        F: FnMut(TrialEvent<'_>),
    {
        let total = plan.len();
        let mut summary = RunSummary {
            run_id: self.runner.run_id().to_string(),
            ..RunSummary::default()
        };
        info!(
            run_id = %summary.run_id,
            trials = total,
            sandbox = self.runner.sandbox().name(),
            deadline_secs = self.runner.deadline().as_secs(),
            "Starting benchmark run"
        );

        for (index, spec) in plan.iter().enumerate() {
            if index > 0 && !self.cooldown.is_zero() {
                tokio::time::sleep(self.cooldown).await;
            }
            info!(trial = index + 1, total, spec = %spec, "Running trial");
            observe(TrialEvent::Started { index, total, spec });

            let outcome = self.run_trial(spec).await;
            summary.attempted += 1;
            summary.counts.record(outcome.status);

            match self.store.put(&outcome) {
                Ok(path) => info!(
                    key = %outcome.key(),
                    status = %outcome.status,
                    fps = ?outcome.fps,
                    record = %path.display(),
                    "Recorded trial"
                ),
                Err(e) => {
                    summary.store_failures += 1;
                    error!(key = %outcome.key(), error = %e, "Continuing without this record");
                }
            }
            observe(TrialEvent::Finished {
                index,
                total,
                outcome: &outcome,
            });
        }

        if summary.counts.timeout > 0 || summary.counts.process_error > 0 {
            warn!(
                timeouts = summary.counts.timeout,
                process_errors = summary.counts.process_error,
                "Some trials did not complete cleanly"
            );
        }
        info!(run_id = %summary.run_id, attempted = summary.attempted, "Benchmark run finished");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_video_is_fatal() {
        let mut config = BenchConfig::default();
        config.paths.video = PathBuf::from("/nonexistent/streambench/sample.mp4");
        let err = check_assets(&config).unwrap_err();
        assert!(matches!(err, Error::AssetMissing { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_prepare_plan_without_acquisition() {
        let mut config = BenchConfig::default();
        config.acquisition.enabled = false;
        let planner = prepare_plan(&config).await.unwrap();
        // 2 detection x (none + 1 classification) x 2 intervals x 4 stream counts
        assert_eq!(planner.len(), 32);
    }

    #[tokio::test]
    async fn test_prepare_plan_rejects_invalid_matrix_before_acquiring() {
        let mut config = BenchConfig::default();
        config.matrix.stream_counts = vec![0];
        let err = prepare_plan(&config).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
