// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Time-bounded execution of one trial.
//!
//! [`ProcessRunner::run`] starts the trial's launch script inside a fresh
//! sandbox boundary, sends its combined stdout and stderr to
//! `logs/<key>.log`, samples the host while it runs and enforces the hard
//! deadline. When the deadline fires the whole boundary is killed, so no
//! background instance outlives its trial. The boundary is also torn down
//! after a normal exit.

use crate::host::{HostSampler, HostUsage};
use crate::sandbox::Sandbox;
use crate::workload::Workload;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use streambench_benchmarks::TrialStatus;
use streambench_core::config::RuntimeConfig;
use streambench_core::{Error, TrialSpec};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Everything observed while running one trial.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Final status.
    pub status: TrialStatus,
    /// Exit code of the instrumented instance, when it exited on its own.
    pub exit_code: Option<i32>,
    /// Wall-clock time from spawn to termination.
    pub elapsed: Duration,
    /// Raw log location.
    pub log_path: PathBuf,
    /// Captured output, lossily decoded.
    pub output: String,
    /// Last host sample taken during the run.
    pub usage: HostUsage,
}

enum Ending {
    Exited(std::io::Result<ExitStatus>),
    DeadlineExpired,
}

/// Runs trials one at a time inside a [`Sandbox`].
pub struct ProcessRunner {
    sandbox: Box<dyn Sandbox>,
    workload: Workload,
    sampler: Box<dyn HostSampler>,
    logs_dir: PathBuf,
    run_id: String,
    deadline: Duration,
    sample_interval: Duration,
}

impl ProcessRunner {
    /// Create a runner.
    pub fn new(
        sandbox: Box<dyn Sandbox>,
        workload: Workload,
        sampler: Box<dyn HostSampler>,
        logs_dir: impl Into<PathBuf>,
        run_id: impl Into<String>,
        runtime: &RuntimeConfig,
    ) -> Self {
        Self {
            sandbox,
            workload,
            sampler,
            logs_dir: logs_dir.into(),
            run_id: run_id.into(),
            deadline: runtime.deadline(),
            sample_interval: runtime.sample_interval(),
        }
    }

    /// Identifier shared by every boundary of this run.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Sandbox in use.
    pub fn sandbox(&self) -> &dyn Sandbox {
        self.sandbox.as_ref()
    }

    /// Hard per-trial deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    fn open_log(&self, path: &Path) -> std::io::Result<(File, File)> {
        std::fs::create_dir_all(&self.logs_dir)?;
        let stdout = File::create(path)?;
        let stderr = stdout.try_clone()?;
        Ok((stdout, stderr))
    }

    /// Run one trial to completion or deadline.
    ///
    /// Never fails: spawn problems are reported as
    /// [`TrialStatus::ProcessError`] and an expired deadline as
    /// [`TrialStatus::Timeout`].
    pub async fn run(&mut self, spec: &TrialSpec) -> RunReport {
        let key = spec.key();
        let boundary = key.boundary_name(&self.run_id);
        let log_path = self.logs_dir.join(key.log_file_name());
        let script = self.workload.script(spec);
        debug!(key = %key, boundary = %boundary, script = %script, "Launching trial");

        let started = Instant::now();
        let (stdout, stderr) = match self.open_log(&log_path) {
            Ok(files) => files,
            Err(e) => {
                warn!(key = %key, log = %log_path.display(), error = %e, "Cannot open trial log");
                return self.failed(log_path, started, String::new());
            }
        };

        let mut command = self.sandbox.command(&boundary, &script, &spec.device);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(key = %key, sandbox = self.sandbox.name(), error = %e, "Failed to spawn trial");
                let message = format!("failed to spawn {} sandbox: {e}\n", self.sandbox.name());
                if let Err(e) = std::fs::write(&log_path, &message) {
                    debug!(error = %e, "Cannot record spawn failure in log");
                }
                return self.failed(log_path, started, message);
            }
        };
        let pid = child.id();

        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval(self.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; sample only once time has passed.
        ticker.tick().await;
        let mut usage = None;

        let ending = loop {
            tokio::select! {
                status = child.wait() => break Ending::Exited(status),
                _ = &mut deadline => break Ending::DeadlineExpired,
                _ = ticker.tick() => {
                    let sample = self.sampler.sample();
                    debug!(key = %key, cpu = %sample.cpu, memory = %sample.memory, "Host sample");
                    usage = Some(sample);
                }
            }
        };

        let (status, exit_code) = match ending {
            Ending::DeadlineExpired => {
                let timeout = Error::ProcessTimeout {
                    key: key.to_string(),
                    deadline: self.deadline,
                };
                warn!(key = %key, error = %timeout, "Terminating trial boundary");
                let found = self.sandbox.terminate(&boundary, pid).await;
                if let Err(e) = child.kill().await {
                    debug!(key = %key, error = %e, "Child already reaped");
                }
                if !found {
                    // The boundary may still have been starting up when it was killed.
                    warn!(key = %key, boundary = %boundary, "Boundary not found at deadline, removing leftovers");
                    self.sandbox.cleanup(&boundary).await;
                }
                (TrialStatus::Timeout, None)
            }
            Ending::Exited(Ok(exit)) => {
                // Siblings may still be running after the measured instance exits.
                self.sandbox.terminate(&boundary, pid).await;
                let status = if exit.success() {
                    TrialStatus::Success
                } else {
                    TrialStatus::ProcessError
                };
                (status, exit.code())
            }
            Ending::Exited(Err(e)) => {
                warn!(key = %key, error = %e, "Failed to wait for trial");
                self.sandbox.terminate(&boundary, pid).await;
                (TrialStatus::ProcessError, None)
            }
        };
        let elapsed = started.elapsed();
        let usage = usage.unwrap_or_else(|| self.sampler.sample());

        let output = match tokio::fs::read(&log_path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(key = %key, error = %e, "Cannot read trial log");
                String::new()
            }
        };

        info!(
            key = %key,
            status = %status,
            exit_code = ?exit_code,
            elapsed_ms = elapsed.as_millis() as u64,
            "Trial finished"
        );
        RunReport {
            status,
            exit_code,
            elapsed,
            log_path,
            output,
            usage,
        }
    }

    fn failed(&mut self, log_path: PathBuf, started: Instant, output: String) -> RunReport {
        RunReport {
            status: TrialStatus::ProcessError,
            exit_code: None,
            elapsed: started.elapsed(),
            log_path,
            output,
            usage: self.sampler.sample(),
        }
    }
}
