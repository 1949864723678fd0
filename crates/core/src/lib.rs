// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core types for the streambench orchestration engine.
//!
//! - [`config`] - Layered, immutable benchmark configuration
//! - [`error`] - Error taxonomy and fatal/per-trial classification
//! - [`trial`] - `TrialSpec` and its canonical `TrialKey`
//! - [`plan`] - Cartesian trial planner

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod plan;
pub mod trial;

pub use config::BenchConfig;
pub use error::{Error, Result};
pub use plan::Planner;
pub use trial::{DeviceTag, ModelId, TrialKey, TrialSpec};
