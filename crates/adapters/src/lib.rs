// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trial execution for streambench.
//!
//! This crate connects the pure planning and reporting crates to the outside
//! world: container and process sandboxes, the workload launch script, host
//! sampling, FPS extraction and model acquisition.
//!
//! # Example
//!
//! ```no_run
//! use streambench_adapters::orchestrator::{check_assets, prepare_plan, Orchestrator};
//! use streambench_core::BenchConfig;
//!
//! # async fn demo() -> streambench_core::Result<()> {
//! let config = BenchConfig::load(None)?;
//! check_assets(&config)?;
//! let plan = prepare_plan(&config).await?.plan();
//! let mut orchestrator = Orchestrator::from_config(&config)?;
//! let summary = orchestrator.execute(&plan, |_| {}).await;
//! println!("{} trials", summary.attempted);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod acquisition;
pub mod host;
pub mod metrics;
pub mod orchestrator;
pub mod runner;
pub mod sandbox;
pub mod workload;

pub use acquisition::{ModelAcquirer, ModelLayout, ModelSource};
pub use host::{HostSampler, HostUsage, SysinfoSampler};
pub use metrics::{extract_fps, find_fps, TrialMetrics};
pub use orchestrator::{Orchestrator, RunSummary, TrialEvent};
pub use runner::{ProcessRunner, RunReport};
pub use sandbox::{DockerSandbox, LocalSandbox, Sandbox};
pub use workload::Workload;
