// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trial planner.
//!
//! Expands a [`MatrixConfig`] into the ordered Cartesian product of
//! detection models × (none + classification models) × inference intervals
//! × stream counts. The order is fixed (outermost loop first, "none" before
//! any classification model) so repeated runs produce the same plan.

use crate::config::MatrixConfig;
use crate::trial::{DeviceTag, ModelId, TrialSpec};
use crate::{Error, Result};
use std::collections::HashSet;
use std::num::NonZeroU32;

/// Validated trial matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Planner {
    detection_models: Vec<ModelId>,
    classification_models: Vec<ModelId>,
    intervals: Vec<NonZeroU32>,
    stream_counts: Vec<NonZeroU32>,
    device: DeviceTag,
}

fn parse_models(kind: &str, raw: &[String]) -> Result<Vec<ModelId>> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|name| {
            let id = ModelId::parse(name.trim())?;
            if !seen.insert(id.clone()) {
                return Err(Error::configuration(format!("duplicate {kind} '{id}'")));
            }
            Ok(id)
        })
        .collect()
}

fn parse_positive(kind: &str, raw: &[u32]) -> Result<Vec<NonZeroU32>> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|&n| {
            let value = NonZeroU32::new(n)
                .ok_or_else(|| Error::configuration(format!("{kind} must be positive, got 0")))?;
            if !seen.insert(value) {
                return Err(Error::configuration(format!("duplicate {kind} {n}")));
            }
            Ok(value)
        })
        .collect()
}

impl Planner {
    /// Validate a matrix. Fails with [`Error::Configuration`] before any
    /// trial can run.
    pub fn new(matrix: &MatrixConfig) -> Result<Self> {
        if matrix.detection_models.is_empty() {
            return Err(Error::configuration("matrix.detection_models must not be empty"));
        }
        if matrix.inference_intervals.is_empty() {
            return Err(Error::configuration(
                "matrix.inference_intervals must not be empty",
            ));
        }
        if matrix.stream_counts.is_empty() {
            return Err(Error::configuration("matrix.stream_counts must not be empty"));
        }

        let planner = Self {
            detection_models: parse_models("detection model", &matrix.detection_models)?,
            classification_models: parse_models(
                "classification model",
                &matrix.classification_models,
            )?,
            intervals: parse_positive("inference interval", &matrix.inference_intervals)?,
            stream_counts: parse_positive("stream count", &matrix.stream_counts)?,
            device: DeviceTag::parse(matrix.device.trim())?,
        };
        Ok(planner)
    }

    /// Every distinct model referenced by the matrix, detection first.
    pub fn models(&self) -> Vec<ModelId> {
        let mut out = self.detection_models.clone();
        for model in &self.classification_models {
            if !out.contains(model) {
                out.push(model.clone());
            }
        }
        out
    }

    /// Remove models that could not be acquired.
    ///
    /// Dropping every detection model is a configuration error: there would
    /// be nothing left to run.
    pub fn without_models(mut self, unavailable: &[ModelId]) -> Result<Self> {
        if unavailable.is_empty() {
            return Ok(self);
        }
        self.detection_models.retain(|m| !unavailable.contains(m));
        self.classification_models
            .retain(|m| !unavailable.contains(m));
        if self.detection_models.is_empty() {
            return Err(Error::configuration(
                "no detection model is available after acquisition",
            ));
        }
        Ok(self)
    }

    /// Number of trials [`Planner::plan`] produces.
    pub fn len(&self) -> usize {
        self.detection_models.len()
            * (self.classification_models.len() + 1)
            * self.intervals.len()
            * self.stream_counts.len()
    }

    /// Whether the plan is empty. Never true for a validated matrix.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produce the ordered trial plan.
    pub fn plan(&self) -> Vec<TrialSpec> {
        let classification: Vec<Option<&ModelId>> = std::iter::once(None)
            .chain(self.classification_models.iter().map(Some))
            .collect();

        let mut trials = Vec::with_capacity(self.len());
        for detection in &self.detection_models {
            for cls in &classification {
                for &interval in &self.intervals {
                    for &streams in &self.stream_counts {
                        trials.push(TrialSpec {
                            detection_model: detection.clone(),
                            classification_model: cls.cloned(),
                            inference_interval: interval,
                            num_streams: streams,
                            device: self.device.clone(),
                        });
                    }
                }
            }
        }
        trials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn matrix(det: &[&str], cls: &[&str], intervals: &[u32], streams: &[u32]) -> MatrixConfig {
        MatrixConfig {
            detection_models: det.iter().map(|s| s.to_string()).collect(),
            classification_models: cls.iter().map(|s| s.to_string()).collect(),
            inference_intervals: intervals.to_vec(),
            stream_counts: streams.to_vec(),
            device: "CPU".to_string(),
        }
    }

    #[test]
    fn test_plan_size_is_full_product() {
        let cases = [
            matrix(&["a"], &[], &[1], &[1]),
            matrix(&["a", "b"], &["c"], &[1, 3], &[1, 2, 4, 8]),
            matrix(&["a", "b", "c"], &["x", "y"], &[1, 2, 5], &[1, 16]),
        ];
        for m in cases {
            let planner = Planner::new(&m).unwrap();
            let expected = m.detection_models.len()
                * (m.classification_models.len() + 1)
                * m.inference_intervals.len()
                * m.stream_counts.len();
            let trials = planner.plan();
            assert_eq!(trials.len(), expected);
            assert_eq!(planner.len(), expected);

            let unique: HashSet<_> = trials.iter().collect();
            assert_eq!(unique.len(), expected);

            let keys: HashSet<_> = trials.iter().map(|t| t.key()).collect();
            assert_eq!(keys.len(), expected, "canonical keys must not collide");
        }
    }

    #[test]
    fn test_plan_order_is_deterministic() {
        let m = matrix(&["a", "b"], &["c"], &[1, 3], &[1, 2]);
        let first = Planner::new(&m).unwrap().plan();
        let second = Planner::new(&m).unwrap().plan();
        assert_eq!(first, second);

        let keys: Vec<String> = first.iter().take(5).map(|t| t.key().to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "a__1_1_CPU",
                "a__1_2_CPU",
                "a__3_1_CPU",
                "a__3_2_CPU",
                "a_c_1_1_CPU",
            ]
        );
    }

    #[test]
    fn test_rejects_invalid_matrix() {
        let bad = [
            matrix(&[], &[], &[1], &[1]),
            matrix(&["a"], &[], &[], &[1]),
            matrix(&["a"], &[], &[1], &[]),
            matrix(&["a"], &[], &[0], &[1]),
            matrix(&["a"], &[], &[1], &[0, 2]),
            matrix(&["a", "a"], &[], &[1], &[1]),
            matrix(&["a"], &[], &[1], &[2, 2]),
            matrix(&["bad_name"], &[], &[1], &[1]),
        ];
        for m in bad {
            let err = Planner::new(&m).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{m:?} -> {err}");
        }
    }

    #[test]
    fn test_without_models_prunes_plan() {
        let planner = Planner::new(&matrix(&["a", "b"], &["c"], &[1], &[1])).unwrap();
        let pruned = planner
            .without_models(&[ModelId::parse("c").unwrap()])
            .unwrap();
        assert_eq!(pruned.len(), 2);
        assert!(pruned
            .plan()
            .iter()
            .all(|t| t.classification_model.is_none()));
    }

    #[test]
    fn test_without_all_detection_models_fails() {
        let planner = Planner::new(&matrix(&["a"], &[], &[1], &[1])).unwrap();
        let err = planner
            .without_models(&[ModelId::parse("a").unwrap()])
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_models_lists_each_model_once() {
        let planner = Planner::new(&matrix(&["a", "b"], &["b", "c"], &[1], &[1])).unwrap();
        let names: Vec<String> = planner.models().iter().map(|m| m.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
