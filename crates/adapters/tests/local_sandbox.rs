// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs through the local process-group sandbox with `sh`.

#![cfg(target_os = "linux")]

use std::num::NonZeroU32;
use std::path::Path;
use std::time::{Duration, Instant};
use streambench_adapters::{
    HostSampler, HostUsage, LocalSandbox, ModelLayout, Orchestrator, ProcessRunner, TrialEvent,
    Workload,
};
use streambench_benchmarks::{summarize_and_write, FileResultStore, Percentage, TrialStatus};
use streambench_core::config::SandboxKind;
use streambench_core::{BenchConfig, DeviceTag, ModelId, TrialSpec};

struct FixedSampler;

impl HostSampler for FixedSampler {
    fn sample(&mut self) -> HostUsage {
        HostUsage {
            cpu: Percentage::new(90.0),
            memory: Percentage::new(30.0),
        }
    }
}

fn spec(interval: u32, streams: u32) -> TrialSpec {
    TrialSpec {
        detection_model: ModelId::parse("det").unwrap(),
        classification_model: None,
        inference_interval: NonZeroU32::new(interval).unwrap(),
        num_streams: NonZeroU32::new(streams).unwrap(),
        device: DeviceTag::parse("CPU").unwrap(),
    }
}

/// Every instance runs `sh -c <body>`; `{interval}` in the body is
/// substituted per trial.
fn orchestrator(dir: &Path, body: &str) -> Orchestrator {
    let mut config = BenchConfig::default();
    config.runtime.sandbox = SandboxKind::Local;
    config.runtime.deadline_secs = 2;
    config.runtime.sample_interval_secs = 1;
    config.paths.output_dir = dir.join("out");
    config.paths.models_dir = dir.join("models");
    config.paths.video = dir.join("video.mp4");
    config.workload.launcher = "sh -c".to_string();
    config.workload.measured_flags = String::new();
    config.workload.pipeline = format!("'{body}'");

    let workload = Workload::new(
        config.workload.clone(),
        ModelLayout::new(&config.paths.models_dir, "FP16"),
        &config.paths.video,
    );
    let runner = ProcessRunner::new(
        Box::new(LocalSandbox::new(&config).unwrap()),
        workload,
        Box::new(FixedSampler),
        config.logs_dir(),
        "itest",
        &config.runtime,
    );
    let store = FileResultStore::open(config.results_dir()).unwrap();
    Orchestrator::new(runner, store, Duration::ZERO)
}

fn is_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // state follows the parenthesised command name; zombies count as dead
        Ok(stat) => stat
            .rfind(')')
            .and_then(|i| stat[i + 1..].trim_start().chars().next())
            .is_some_and(|state| state != 'Z'),
        Err(_) => false,
    }
}

fn wait_until_dead(pid: u32) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(3) {
        if !is_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[tokio::test]
async fn test_timeout_kills_every_sibling_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let pids = dir.path().join("pids");
    let body = format!(
        "echo $$ >> {}; echo current: 7; if [ {{interval}} -gt 1 ]; then sleep 10; fi",
        pids.display()
    );
    let mut orchestrator = orchestrator(dir.path(), &body);
    let plan = vec![spec(3, 3), spec(1, 1)];

    let mut finished = Vec::new();
    let started = Instant::now();
    let summary = orchestrator
        .execute(&plan, |event| {
            if let TrialEvent::Finished { outcome, .. } = event {
                finished.push(outcome.status);
            }
        })
        .await;
    let wall = started.elapsed();

    assert_eq!(finished, vec![TrialStatus::Timeout, TrialStatus::Success]);
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.counts.timeout, 1);
    assert_eq!(summary.counts.success, 1);
    assert_eq!(summary.store_failures, 0);
    assert!(wall < Duration::from_secs(9), "run took {wall:?}");

    let timed_out = orchestrator.store().get(&plan[0].key()).unwrap().unwrap();
    assert_eq!(timed_out.status, TrialStatus::Timeout);
    assert!((2..=3).contains(&timed_out.duration), "duration {}", timed_out.duration);
    assert_eq!(timed_out.fps, Some(7.0));
    assert_eq!(timed_out.exit_code, None);
    assert_eq!(timed_out.cpu_usage, Percentage::new(90.0));

    let next = orchestrator.store().get(&plan[1].key()).unwrap().unwrap();
    assert_eq!(next.status, TrialStatus::Success);
    assert_eq!(next.exit_code, Some(0));

    let recorded: Vec<u32> = std::fs::read_to_string(&pids)
        .unwrap()
        .lines()
        .map(|line| line.trim().parse().unwrap())
        .collect();
    // three instances of the first trial, one of the second
    assert_eq!(recorded.len(), 4);
    for pid in recorded {
        assert!(wait_until_dead(pid), "instance {pid} outlived its trial");
    }
}

#[tokio::test]
async fn test_absent_fps_is_not_zero_in_records_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let body = "if [ {interval} -gt 1 ]; then echo current: 0.0; else echo pipeline failed >&2; exit 1; fi";
    let mut orchestrator = orchestrator(dir.path(), body);
    let plan = vec![spec(1, 1), spec(3, 1)];

    let summary = orchestrator.execute(&plan, |_| {}).await;
    assert_eq!(summary.counts.process_error, 1);
    assert_eq!(summary.counts.success, 1);

    let failed = orchestrator.store().get(&plan[0].key()).unwrap().unwrap();
    assert_eq!(failed.status, TrialStatus::ProcessError);
    assert_eq!(failed.exit_code, Some(1));
    assert_eq!(failed.fps, None);
    let log = std::fs::read_to_string(&failed.log).unwrap();
    assert!(log.contains("pipeline failed"));

    let stalled = orchestrator.store().get(&plan[1].key()).unwrap().unwrap();
    assert_eq!(stalled.fps, Some(0.0));

    let reports = dir.path().join("out").join("reports");
    let (report, artifacts) = summarize_and_write(orchestrator.store(), &reports, None).unwrap();
    assert_eq!(report.report.total_trials, 2);
    let best = report.report.best.as_ref().unwrap();
    assert_eq!(best.fps, 0.0);
    assert_eq!(best.spec, plan[1]);
    assert!(report.markdown.contains("N/A"));
    assert!(artifacts.csv.exists());
}

#[tokio::test]
async fn test_rerun_overwrites_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = orchestrator(dir.path(), "echo current: 5");
    let plan = vec![spec(1, 2)];

    orchestrator.execute(&plan, |_| {}).await;
    orchestrator.execute(&plan, |_| {}).await;

    assert_eq!(orchestrator.store().len().unwrap(), 1);
    let outcome = orchestrator.store().get(&plan[0].key()).unwrap().unwrap();
    assert_eq!(outcome.status, TrialStatus::Success);
    assert_eq!(outcome.fps, Some(5.0));
}

#[tokio::test]
async fn test_unwritable_record_is_counted_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = orchestrator(dir.path(), "echo current: 3");
    let plan = vec![spec(1, 1), spec(1, 2)];
    // a directory where the first record file belongs cannot be replaced
    let blocked = dir.path().join("out/results").join(plan[0].key().record_file_name());
    std::fs::create_dir_all(&blocked).unwrap();

    let summary = orchestrator.execute(&plan, |_| {}).await;

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.counts.success, 2);
    assert_eq!(summary.store_failures, 1);
    assert!(blocked.is_dir());

    let stored = orchestrator.store().get(&plan[1].key()).unwrap().unwrap();
    assert_eq!(stored.status, TrialStatus::Success);
    assert_eq!(stored.fps, Some(3.0));
}
