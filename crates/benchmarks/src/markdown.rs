// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown output generation for benchmark results.
//!
//! Rendering is pure: the same aggregate and outcomes always produce the
//! same text.

use crate::aggregate::AggregateReport;
use crate::result::{SystemInfo, TrialOutcome};
use std::fmt::{self, Write};

/// Marker rendered when no FPS value was extracted.
pub const NOT_AVAILABLE: &str = "N/A";

fn fps_cell(fps: Option<f64>) -> String {
    fps.map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn write_summary(out: &mut String, report: &AggregateReport) -> fmt::Result {
    writeln!(out, "## Executive Summary")?;
    writeln!(out)?;
    writeln!(out, "| Metric | Value |")?;
    writeln!(out, "|--------|-------|")?;
    writeln!(
        out,
        "| Peak FPS | {} |",
        fps_cell(report.best.as_ref().map(|b| b.fps))
    )?;
    match &report.best {
        Some(best) => writeln!(out, "| Best configuration | {} |", best.spec)?,
        None => writeln!(out, "| Best configuration | {NOT_AVAILABLE} |")?,
    }
    match report.max_streams {
        Some(streams) => writeln!(out, "| Max streams | {streams} |")?,
        None => writeln!(out, "| Max streams | {NOT_AVAILABLE} |")?,
    }
    writeln!(out, "| Bottleneck | {} |", report.bottleneck)?;
    match report.mean_cpu {
        Some(cpu) => writeln!(out, "| Mean CPU | {cpu:.1}% |")?,
        None => writeln!(out, "| Mean CPU | {NOT_AVAILABLE} |")?,
    }
    if let Some(memory) = report.mean_memory {
        writeln!(out, "| Mean memory | {memory:.1}% |")?;
    }
    writeln!(
        out,
        "| Trials | {} (success {}, timeout {}, process error {}) |",
        report.total_trials,
        report.counts.success,
        report.counts.timeout,
        report.counts.process_error
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "> Bottleneck is a coarse heuristic: a mean host CPU above 80% is reported as \
         CPU-bound, anything else as IO/Other. CPU and memory figures are host-wide \
         point samples, not per-container accounting."
    )?;
    writeln!(out)
}

fn write_devices(out: &mut String, report: &AggregateReport) -> fmt::Result {
    if report.devices.is_empty() {
        return Ok(());
    }
    writeln!(out, "## Per-Device Summary")?;
    writeln!(out)?;
    writeln!(
        out,
        "| Device | Trials | Peak FPS | Best configuration | Max streams | Mean CPU | Bottleneck |"
    )?;
    writeln!(
        out,
        "|--------|--------|----------|--------------------|-------------|----------|------------|"
    )?;
    for (device, summary) in &report.devices {
        let best_config = summary
            .best
            .as_ref()
            .map(|b| b.spec.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let max_streams = summary
            .max_streams
            .map(|s| s.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let mean_cpu = summary
            .mean_cpu
            .map(|c| format!("{c:.1}%"))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        writeln!(
            out,
            "| {device} | {} | {} | {best_config} | {max_streams} | {mean_cpu} | {} |",
            summary.trials,
            fps_cell(summary.best.as_ref().map(|b| b.fps)),
            summary.bottleneck
        )?;
    }
    writeln!(out)
}

fn write_saturation(out: &mut String, report: &AggregateReport) -> fmt::Result {
    if report.saturation.is_empty() {
        return Ok(());
    }
    writeln!(out, "## Saturation")?;
    writeln!(out)?;
    writeln!(
        out,
        "| Device | Detection | Classification | Interval | Streams | FPS/stream | Drop observed |"
    )?;
    writeln!(
        out,
        "|--------|-----------|----------------|----------|---------|------------|---------------|"
    )?;
    for point in &report.saturation {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {:.2} | {} |",
            point.device,
            point.detection_model,
            point.classification_model,
            point.inference_interval,
            point.streams,
            point.fps_per_stream,
            if point.drop_observed { "yes" } else { "no" }
        )?;
    }
    writeln!(out)
}

fn write_trials(out: &mut String, outcomes: &[TrialOutcome]) -> fmt::Result {
    writeln!(out, "## Trials")?;
    writeln!(out)?;
    writeln!(
        out,
        "| Model | Classification | Interval | Streams | Device | Status | Duration (s) | FPS | CPU | Memory |"
    )?;
    writeln!(
        out,
        "|-------|----------------|----------|---------|--------|--------|--------------|-----|-----|--------|"
    )?;
    for outcome in outcomes {
        let spec = &outcome.spec;
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            spec.detection_model,
            spec.classification_label(),
            spec.inference_interval,
            spec.num_streams,
            spec.device,
            outcome.status,
            outcome.duration,
            fps_cell(outcome.fps),
            outcome.cpu_usage,
            outcome.memory_usage
        )?;
    }
    writeln!(out)?;
    writeln!(out, "---")?;
    writeln!(out, "Total trials: {}", outcomes.len())
}

fn build_report(report: &AggregateReport, outcomes: &[TrialOutcome]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "# Streambench Report")?;
    writeln!(out)?;
    write_summary(&mut out, report)?;
    write_devices(&mut out, report)?;
    write_saturation(&mut out, report)?;
    write_trials(&mut out, outcomes)?;
    Ok(out)
}

/// Generate the markdown report from an aggregate and its outcomes.
pub fn render_report(report: &AggregateReport, outcomes: &[TrialOutcome]) -> String {
    // writing into a String cannot fail
    build_report(report, outcomes).unwrap_or_default()
}

/// Generate a markdown section describing the benchmark host.
pub fn render_host_section(info: &SystemInfo) -> String {
    let mut out = String::new();
    let _ = write_host(&mut out, info);
    out
}

fn gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

fn write_host(out: &mut String, info: &SystemInfo) -> fmt::Result {
    writeln!(out, "## Host")?;
    writeln!(out)?;
    writeln!(out, "| Property | Value |")?;
    writeln!(out, "|----------|-------|")?;
    writeln!(out, "| Host name | {} |", info.host_name)?;
    writeln!(out, "| OS | {} |", info.os)?;
    writeln!(out, "| Kernel | {} |", info.kernel)?;
    writeln!(out, "| CPU | {} |", info.cpu_brand)?;
    match info.physical_cores {
        Some(cores) => writeln!(out, "| Physical cores | {cores} |")?,
        None => writeln!(out, "| Physical cores | {NOT_AVAILABLE} |")?,
    }
    writeln!(out, "| Logical cores | {} |", info.logical_cores)?;
    writeln!(out, "| CPU frequency | {} MHz |", info.cpu_frequency_mhz)?;
    writeln!(out, "| Memory | {:.1} GiB |", gib(info.total_memory_bytes))?;
    writeln!(
        out,
        "| Available memory | {:.1} GiB |",
        gib(info.available_memory_bytes)
    )?;
    writeln!(out, "| Generated | {} |", info.collected_at.to_rfc3339())?;
    writeln!(out)
}
