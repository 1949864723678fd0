// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Aggregation and bottleneck analysis.
//!
//! Everything here is derived from the stored outcomes and nothing else: no
//! clocks, no hash-ordered iteration, no live processes. Calling
//! [`aggregate`] twice on the same slice yields equal reports.
//!
//! The bottleneck classification is deliberately coarse. It compares the
//! mean of host-wide CPU point samples against a fixed threshold and is an
//! approximation, not a statistical model of where the pipeline saturates.

use crate::result::{TrialOutcome, TrialStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use streambench_core::TrialSpec;

/// Mean CPU utilization above which a run is labelled CPU-bound.
pub const CPU_BOUND_THRESHOLD: f64 = 80.0;

/// Per-stream FPS ratio below which the next stream count is considered
/// past the saturation point.
pub const SATURATION_DROP_RATIO: f64 = 0.8;

/// Coarse label for the dominant constrained resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bottleneck {
    /// Mean CPU strictly above [`CPU_BOUND_THRESHOLD`].
    CpuBound,
    /// Anything else (I/O, GPU, decode, or undetermined).
    IoOther,
}

impl Bottleneck {
    /// Classify from a mean CPU percentage. Exactly 80% is not CPU-bound.
    pub fn classify(mean_cpu: Option<f64>) -> Self {
        match mean_cpu {
            Some(cpu) if cpu > CPU_BOUND_THRESHOLD => Bottleneck::CpuBound,
            _ => Bottleneck::IoOther,
        }
    }
}

impl fmt::Display for Bottleneck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bottleneck::CpuBound => "CPU-bound",
            Bottleneck::IoOther => "IO/Other",
        })
    }
}

/// The best-performing trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestRun {
    /// Its FPS.
    pub fps: f64,
    /// Its configuration.
    pub spec: TrialSpec,
}

/// Outcome counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Clean exits.
    pub success: usize,
    /// Deadline expiries.
    pub timeout: usize,
    /// Spawn failures and non-zero exits.
    pub process_error: usize,
}

impl StatusCounts {
    /// Count one outcome with `status`.
    pub fn record(&mut self, status: TrialStatus) {
        match status {
            TrialStatus::Success => self.success += 1,
            TrialStatus::Timeout => self.timeout += 1,
            TrialStatus::ProcessError => self.process_error += 1,
        }
    }
}

/// Where one series of trials stops scaling with more streams.
///
/// A series is every trial sharing device, models and interval. The
/// saturation point is the last stream count before the measured per-stream
/// FPS drops below [`SATURATION_DROP_RATIO`] of the previous step, or the
/// largest measured stream count if it never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaturationPoint {
    /// Device tag.
    pub device: String,
    /// Detection model.
    pub detection_model: String,
    /// Classification model or `none`.
    pub classification_model: String,
    /// Inference interval.
    pub inference_interval: u32,
    /// Stream count at the saturation point.
    pub streams: u32,
    /// Per-stream FPS at the saturation point.
    pub fps_per_stream: f64,
    /// Whether a drop was observed (otherwise the series never saturated
    /// within the measured range).
    pub drop_observed: bool,
}

/// Best run, scale and bottleneck for the outcomes of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// Outcomes recorded for the device.
    pub trials: usize,
    /// Highest FPS on the device.
    pub best: Option<BestRun>,
    /// Largest stream count tried on the device.
    pub max_streams: Option<u32>,
    /// Mean host CPU utilization during the device's trials.
    pub mean_cpu: Option<f64>,
    /// Coarse bottleneck label for the device.
    pub bottleneck: Bottleneck,
}

/// Summary derived from all stored outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Number of outcomes considered.
    pub total_trials: usize,
    /// Outcomes per status.
    pub counts: StatusCounts,
    /// Highest FPS among outcomes with an FPS value.
    pub best: Option<BestRun>,
    /// Largest stream count across all outcomes regardless of status.
    pub max_streams: Option<u32>,
    /// Mean host CPU utilization.
    pub mean_cpu: Option<f64>,
    /// Mean host memory utilization.
    pub mean_memory: Option<f64>,
    /// Coarse bottleneck label.
    pub bottleneck: Bottleneck,
    /// Saturation point per series.
    pub saturation: Vec<SaturationPoint>,
    /// The same figures split by device tag, so CPU and GPU runs sharing a
    /// results directory can be compared.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceSummary>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn best_of<'a>(outcomes: impl IntoIterator<Item = &'a TrialOutcome>) -> Option<BestRun> {
    let mut best: Option<BestRun> = None;
    for outcome in outcomes {
        let Some(fps) = outcome.fps else { continue };
        // strictly greater: ties keep the first outcome in scan order
        if best.as_ref().map_or(true, |b| fps > b.fps) {
            best = Some(BestRun {
                fps,
                spec: outcome.spec.clone(),
            });
        }
    }
    best
}

fn device_summaries(outcomes: &[TrialOutcome]) -> BTreeMap<String, DeviceSummary> {
    let mut by_device: BTreeMap<String, Vec<&TrialOutcome>> = BTreeMap::new();
    for outcome in outcomes {
        by_device
            .entry(outcome.spec.device.to_string())
            .or_default()
            .push(outcome);
    }

    by_device
        .into_iter()
        .map(|(device, group)| {
            let mean_cpu = mean(group.iter().map(|o| o.cpu_usage.value()));
            let summary = DeviceSummary {
                trials: group.len(),
                best: best_of(group.iter().copied()),
                max_streams: group.iter().map(|o| o.spec.num_streams.get()).max(),
                mean_cpu,
                bottleneck: Bottleneck::classify(mean_cpu),
            };
            (device, summary)
        })
        .collect()
}

type SeriesKey = (String, String, String, u32);

fn saturation_points(outcomes: &[TrialOutcome]) -> Vec<SaturationPoint> {
    let mut series: BTreeMap<SeriesKey, Vec<(u32, f64)>> = BTreeMap::new();
    for outcome in outcomes {
        let Some(fps) = outcome.fps else { continue };
        let spec = &outcome.spec;
        series
            .entry((
                spec.device.to_string(),
                spec.detection_model.to_string(),
                spec.classification_label().to_string(),
                spec.inference_interval.get(),
            ))
            .or_default()
            .push((spec.num_streams.get(), fps));
    }

    series
        .into_iter()
        .filter_map(|((device, detection_model, classification_model, inference_interval), mut points)| {
            points.sort_by_key(|(streams, _)| *streams);
            let mut knee = *points.last()?;
            let mut drop_observed = false;
            for pair in points.windows(2) {
                let (prev, curr) = (pair[0], pair[1]);
                if curr.1 < prev.1 * SATURATION_DROP_RATIO {
                    knee = prev;
                    drop_observed = true;
                    break;
                }
            }
            Some(SaturationPoint {
                device,
                detection_model,
                classification_model,
                inference_interval,
                streams: knee.0,
                fps_per_stream: knee.1,
                drop_observed,
            })
        })
        .collect()
}

/// Aggregate outcomes given in scan order.
pub fn aggregate(outcomes: &[TrialOutcome]) -> AggregateReport {
    let mut counts = StatusCounts::default();
    for outcome in outcomes {
        counts.record(outcome.status);
    }

    let mean_cpu = mean(outcomes.iter().map(|o| o.cpu_usage.value()));
    let mean_memory = mean(outcomes.iter().map(|o| o.memory_usage.value()));

    AggregateReport {
        total_trials: outcomes.len(),
        counts,
        best: best_of(outcomes),
        max_streams: outcomes.iter().map(|o| o.spec.num_streams.get()).max(),
        mean_cpu,
        mean_memory,
        bottleneck: Bottleneck::classify(mean_cpu),
        saturation: saturation_points(outcomes),
        devices: device_summaries(outcomes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::fixtures::{outcome, outcome_on, spec};

    #[test]
    fn test_best_ignores_absent_fps_and_keeps_first_tie() {
        let outcomes = vec![
            outcome(1, None, 10.0),
            outcome(2, Some(25.0), 10.0),
            outcome(4, Some(25.0), 10.0),
            outcome(8, Some(3.0), 10.0),
        ];
        let report = aggregate(&outcomes);
        let best = report.best.unwrap();
        assert_eq!(best.fps, 25.0);
        assert_eq!(best.spec.num_streams.get(), 2);
    }

    #[test]
    fn test_max_streams_counts_failed_trials() {
        let failed = TrialOutcome::builder(spec("det", None, 1, 16), TrialStatus::Timeout).build();
        let outcomes = vec![outcome(2, Some(25.0), 10.0), failed];
        let report = aggregate(&outcomes);
        assert_eq!(report.max_streams, Some(16));
        assert_eq!(report.counts.timeout, 1);
        assert_eq!(report.counts.success, 1);
        assert_eq!(report.total_trials, 2);
    }

    #[test]
    fn test_bottleneck_classification() {
        let cpu_bound = vec![outcome(1, Some(1.0), 80.0), outcome(2, Some(1.0), 90.0)];
        assert_eq!(aggregate(&cpu_bound).bottleneck, Bottleneck::CpuBound);

        let light = vec![outcome(1, Some(1.0), 30.0), outcome(2, Some(1.0), 50.0)];
        assert_eq!(aggregate(&light).bottleneck, Bottleneck::IoOther);

        let boundary = vec![outcome(1, Some(1.0), 80.0)];
        let report = aggregate(&boundary);
        assert_eq!(report.mean_cpu, Some(80.0));
        assert_eq!(report.bottleneck, Bottleneck::IoOther);
    }

    #[test]
    fn test_empty_input() {
        let report = aggregate(&[]);
        assert_eq!(report.total_trials, 0);
        assert!(report.best.is_none());
        assert!(report.max_streams.is_none());
        assert!(report.mean_cpu.is_none());
        assert_eq!(report.bottleneck, Bottleneck::IoOther);
        assert!(report.saturation.is_empty());
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let outcomes = vec![
            outcome(1, Some(30.0), 40.0),
            outcome(2, Some(29.0), 60.0),
            outcome(4, None, 95.0),
        ];
        assert_eq!(aggregate(&outcomes), aggregate(&outcomes));
    }

    #[test]
    fn test_saturation_knee() {
        let outcomes = vec![
            outcome(1, Some(30.0), 40.0),
            outcome(2, Some(28.0), 60.0),
            outcome(4, Some(20.0), 85.0),
            outcome(8, Some(9.0), 99.0),
        ];
        let points = aggregate(&outcomes).saturation;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].streams, 2);
        assert_eq!(points[0].fps_per_stream, 28.0);
        assert!(points[0].drop_observed);
        assert_eq!(points[0].classification_model, "none");
    }

    #[test]
    fn test_saturation_without_drop_uses_largest_count() {
        let outcomes = vec![outcome(1, Some(30.0), 40.0), outcome(4, Some(27.0), 40.0)];
        let points = aggregate(&outcomes).saturation;
        assert_eq!(points[0].streams, 4);
        assert!(!points[0].drop_observed);
    }

    #[test]
    fn test_devices_are_summarized_separately() {
        let outcomes = vec![
            outcome_on("CPU", 1, Some(30.0), 95.0),
            outcome_on("CPU", 4, Some(12.0), 99.0),
            outcome_on("GPU", 1, Some(60.0), 20.0),
            outcome_on("GPU", 8, None, 30.0),
        ];
        let report = aggregate(&outcomes);

        // global figures still span every device
        assert_eq!(report.best.as_ref().unwrap().fps, 60.0);
        assert_eq!(report.max_streams, Some(8));

        assert_eq!(report.devices.keys().collect::<Vec<_>>(), vec!["CPU", "GPU"]);
        let cpu = &report.devices["CPU"];
        assert_eq!(cpu.trials, 2);
        assert_eq!(cpu.best.as_ref().unwrap().fps, 30.0);
        assert_eq!(cpu.max_streams, Some(4));
        assert_eq!(cpu.mean_cpu, Some(97.0));
        assert_eq!(cpu.bottleneck, Bottleneck::CpuBound);

        let gpu = &report.devices["GPU"];
        assert_eq!(gpu.trials, 2);
        assert_eq!(gpu.best.as_ref().unwrap().spec.device.as_str(), "GPU");
        assert_eq!(gpu.max_streams, Some(8));
        assert_eq!(gpu.bottleneck, Bottleneck::IoOther);
    }
}
