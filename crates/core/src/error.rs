// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for benchmark orchestration.
//!
//! Only [`Error::Configuration`] and [`Error::AssetMissing`] abort a run.
//! Every other variant is scoped to a single trial or model and the
//! orchestrator records it and moves on to the next trial.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the orchestration engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The trial matrix or runtime settings are invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required input asset (such as the sample video) does not exist.
    #[error("Required asset missing: {}", path.display())]
    AssetMissing {
        /// Path that was expected to exist.
        path: PathBuf,
    },

    /// Both the downloader and the direct-URL fallback failed for a model.
    #[error("Failed to acquire model {model}: {reason}")]
    Acquisition {
        /// Model that could not be fetched.
        model: String,
        /// Combined failure description.
        reason: String,
    },

    /// A trial exceeded its deadline and its isolation boundary was killed.
    #[error("Trial {key} exceeded its deadline of {}s", deadline.as_secs())]
    ProcessTimeout {
        /// Canonical key of the trial.
        key: String,
        /// Deadline that elapsed.
        deadline: Duration,
    },

    /// No FPS marker could be extracted from a trial's captured output.
    #[error("No FPS marker found in output of trial {key}")]
    Extraction {
        /// Canonical key of the trial.
        key: String,
    },

    /// A trial record could not be persisted.
    #[error("Failed to store result for {key}: {source}")]
    StoreWrite {
        /// Canonical key of the trial.
        key: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Generic I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create an asset-missing error.
    pub fn asset_missing(path: impl Into<PathBuf>) -> Self {
        Error::AssetMissing { path: path.into() }
    }

    /// Create an acquisition error.
    pub fn acquisition(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Acquisition {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must halt the entire run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::AssetMissing { .. })
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_and_assets_are_fatal() {
        assert!(Error::configuration("empty stream list").is_fatal());
        assert!(Error::asset_missing("videos/sample.mp4").is_fatal());

        assert!(!Error::acquisition("yolo", "404").is_fatal());
        assert!(!Error::ProcessTimeout {
            key: "k".into(),
            deadline: Duration::from_secs(60),
        }
        .is_fatal());
        assert!(!Error::Extraction { key: "k".into() }.is_fatal());
        assert!(!Error::StoreWrite {
            key: "k".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        }
        .is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::asset_missing("videos/sample.mp4");
        assert_eq!(err.to_string(), "Required asset missing: videos/sample.mp4");

        let err = Error::ProcessTimeout {
            key: "a__1_1_CPU".into(),
            deadline: Duration::from_secs(2),
        };
        assert!(err.to_string().contains("2s"));
    }
}
