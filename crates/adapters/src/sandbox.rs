// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Isolation boundaries for trial workloads.
//!
//! Every process belonging to one trial lives inside a single boundary so
//! the whole trial can be terminated at once:
//!
//! - [`DockerSandbox`]: one named container (`docker kill <name>`, then
//!   `docker rm -f <name>` when the kill found nothing at the deadline)
//! - [`LocalSandbox`]: one process group on the host (`kill -KILL -- -<pgid>`)

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use streambench_core::config::{BenchConfig, SandboxKind};
use streambench_core::{DeviceTag, Error, Result};
use tokio::process::Command;
use tracing::{debug, warn};

/// Models mount point inside the container.
pub const CONTAINER_MODELS_DIR: &str = "/home/dlstreamer/models";

/// Videos mount point inside the container.
pub const CONTAINER_VIDEOS_DIR: &str = "/home/dlstreamer/videos";

/// How often [`DockerSandbox::cleanup`] looks for a leftover container.
const CLEANUP_ATTEMPTS: u32 = 3;

/// Pause between cleanup attempts, covering a create still in flight.
const CLEANUP_RETRY: Duration = Duration::from_millis(500);

/// An isolation boundary able to run a shell script and kill all of it.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Models root as seen by the workload.
    fn models_root(&self) -> PathBuf;

    /// Sample video as seen by the workload.
    fn video_path(&self) -> PathBuf;

    /// Command running `script` inside a fresh boundary named `boundary`.
    ///
    /// Output redirection is left to the caller.
    fn command(&self, boundary: &str, script: &str, device: &DeviceTag) -> Command;

    /// Kill every process inside the boundary.
    ///
    /// `pid` is the id of the spawned child, when known. Returns whether a
    /// live boundary was found; terminating one that has already exited is
    /// not an error.
    async fn terminate(&self, boundary: &str, pid: Option<u32>) -> bool;

    /// Remove whatever is left of a boundary that [`Sandbox::terminate`]
    /// could not find, once the launching child has been reaped.
    async fn cleanup(&self, _boundary: &str) {}
}

/// Build the sandbox selected in `config`.
pub fn from_config(config: &BenchConfig) -> Result<Box<dyn Sandbox>> {
    match config.runtime.sandbox {
        SandboxKind::Docker => Ok(Box::new(DockerSandbox::new(config)?)),
        SandboxKind::Local => Ok(Box::new(LocalSandbox::new(config)?)),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Runs each trial in its own `docker run --rm --init` container.
#[derive(Debug, Clone)]
pub struct DockerSandbox {
    cli: Vec<String>,
    image: String,
    models_dir: PathBuf,
    videos_dir: PathBuf,
    video_file: PathBuf,
}

impl DockerSandbox {
    /// Create a sandbox mounting the configured models and video directories.
    pub fn new(config: &BenchConfig) -> Result<Self> {
        let video = absolute(&config.paths.video)?;
        let video_file = video
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| Error::configuration("paths.video must name a file"))?;
        let videos_dir = video
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::configuration("paths.video has no parent directory"))?;

        if config.runtime.container_cli.is_empty() {
            return Err(Error::configuration("runtime.container_cli is empty"));
        }

        Ok(Self {
            cli: config.runtime.container_cli.clone(),
            image: config.runtime.image.clone(),
            models_dir: absolute(&config.paths.models_dir)?,
            videos_dir,
            video_file,
        })
    }

    fn cli(&self) -> Command {
        let mut cmd = Command::new(&self.cli[0]);
        cmd.args(&self.cli[1..]);
        cmd
    }

    /// Arguments passed to the container CLI.
    pub fn args(&self, boundary: &str, script: &str, device: &DeviceTag) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            boundary.to_string(),
            "--init".to_string(),
        ];
        if device.wants_gpu() {
            args.push("--device".to_string());
            args.push("/dev/dri".to_string());
        }
        args.push("-v".to_string());
        args.push(format!("{}:{CONTAINER_MODELS_DIR}:ro", self.models_dir.display()));
        args.push("-v".to_string());
        args.push(format!("{}:{CONTAINER_VIDEOS_DIR}:ro", self.videos_dir.display()));
        args.push(self.image.clone());
        args.push("bash".to_string());
        args.push("-c".to_string());
        args.push(script.to_string());
        args
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn models_root(&self) -> PathBuf {
        PathBuf::from(CONTAINER_MODELS_DIR)
    }

    fn video_path(&self) -> PathBuf {
        Path::new(CONTAINER_VIDEOS_DIR).join(&self.video_file)
    }

    fn command(&self, boundary: &str, script: &str, device: &DeviceTag) -> Command {
        let mut cmd = self.cli();
        cmd.args(self.args(boundary, script, device));
        cmd
    }

    async fn terminate(&self, boundary: &str, _pid: Option<u32>) -> bool {
        let result = self
            .cli()
            .args(["kill", boundary])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match result {
            Ok(status) if status.success() => {
                debug!(boundary, "Killed container");
                true
            }
            // Already gone after a normal exit, or not created yet.
            Ok(_) => {
                debug!(boundary, "No container to kill");
                false
            }
            Err(e) => {
                warn!(boundary, error = %e, "Failed to run container kill");
                false
            }
        }
    }

    /// `docker rm -f` is idempotent and prints the name of each container it
    /// removed, so an empty stdout means nothing was there yet.
    async fn cleanup(&self, boundary: &str) {
        for attempt in 1..=CLEANUP_ATTEMPTS {
            let output = self
                .cli()
                .args(["rm", "-f", boundary])
                .stdin(Stdio::null())
                .output()
                .await;
            match output {
                Ok(out) if out.status.success() && !out.stdout.is_empty() => {
                    warn!(boundary, attempt, "Removed container left behind at deadline");
                    return;
                }
                Ok(out) => debug!(
                    boundary,
                    attempt,
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "No container to remove"
                ),
                Err(e) => {
                    warn!(boundary, error = %e, "Failed to run container rm");
                    return;
                }
            }
            if attempt < CLEANUP_ATTEMPTS {
                tokio::time::sleep(CLEANUP_RETRY).await;
            }
        }
    }
}

/// Runs each trial as a process group on the host.
///
/// Intended for development and tests; the workload must be installed on
/// the host.
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    models_dir: PathBuf,
    video: PathBuf,
}

impl LocalSandbox {
    /// Create a sandbox using the configured host paths directly.
    pub fn new(config: &BenchConfig) -> Result<Self> {
        Ok(Self {
            models_dir: absolute(&config.paths.models_dir)?,
            video: absolute(&config.paths.video)?,
        })
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    fn name(&self) -> &'static str {
        "local"
    }

    fn models_root(&self) -> PathBuf {
        self.models_dir.clone()
    }

    fn video_path(&self) -> PathBuf {
        self.video.clone()
    }

    fn command(&self, boundary: &str, script: &str, _device: &DeviceTag) -> Command {
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd.env("STREAMBENCH_BOUNDARY", boundary);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // The child leads a new group whose id equals its pid.
            cmd.process_group(0);
        }
        Command::from(cmd)
    }

    async fn terminate(&self, boundary: &str, pid: Option<u32>) -> bool {
        let Some(pgid) = pid else {
            return false;
        };
        let result = Command::new("kill")
            .args(["-KILL", "--", &format!("-{pgid}")])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match result {
            Ok(status) if status.success() => {
                debug!(boundary, pgid, "Killed process group");
                true
            }
            Ok(_) => {
                debug!(boundary, pgid, "Process group already gone");
                false
            }
            Err(e) => {
                warn!(boundary, pgid, error = %e, "Failed to kill process group");
                false
            }
        }
    }
}
