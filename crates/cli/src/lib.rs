// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI for streambench.
//!
//! `streambench [--config FILE] [run|acquire|plan|report]`. Without a
//! subcommand the full benchmark matrix is run.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use streambench_adapters::host::system_info;
use streambench_adapters::orchestrator::{check_assets, prepare_plan};
use streambench_adapters::{ModelAcquirer, Orchestrator, TrialEvent};
use streambench_benchmarks::{summarize_and_write, FileResultStore, Summary};
use streambench_core::config::SandboxKind;
use streambench_core::{BenchConfig, Planner};
use tracing_subscriber::EnvFilter;

/// Streambench CLI.
#[derive(Parser, Debug)]
#[command(name = "streambench")]
#[command(author, version, about = "Benchmark orchestration for video-analytics pipelines", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, env = "STREAMBENCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings overriding the configuration file.
    #[command(flatten)]
    pub overrides: Overrides,

    /// Subcommand to run; defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Acquire models, run every trial of the matrix and write reports.
    ///
    /// Writes under the output directory:
    /// - results/<key>.json - one record per trial
    /// - logs/<key>.log - raw output of the instrumented instance
    /// - reports/ - aggregate.json, all_results.json, results.csv, report.md
    Run,

    /// Download missing models without running any trial.
    Acquire,

    /// Print the trial plan without running it.
    Plan,

    /// Rebuild reports from the stored trial records.
    Report,
}

/// Log formatter.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Output directory.
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Inference device, e.g. CPU or GPU.
    #[arg(long, global = true)]
    pub device: Option<String>,

    /// Isolation boundary: docker or local.
    #[arg(long, global = true)]
    pub sandbox: Option<SandboxKind>,

    /// Per-trial deadline in seconds.
    #[arg(long, global = true)]
    pub deadline: Option<u64>,

    /// Skip model acquisition.
    #[arg(long, global = true)]
    pub no_acquire: bool,
}

impl Overrides {
    /// Apply every given override and re-validate.
    pub fn apply(&self, config: &mut BenchConfig) -> Result<()> {
        if let Some(output) = &self.output {
            config.paths.output_dir = output.clone();
        }
        if let Some(device) = &self.device {
            config.matrix.device = device.clone();
        }
        if let Some(sandbox) = self.sandbox {
            config.runtime.sandbox = sandbox;
        }
        if let Some(deadline) = self.deadline {
            config.runtime.deadline_secs = deadline;
        }
        if self.no_acquire {
            config.acquisition.enabled = false;
        }
        config.validate()?;
        Ok(())
    }
}

/// Install the global tracing subscriber.
pub fn init_tracing(format: LogFormat, verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

impl Cli {
    /// Load the configuration this invocation describes.
    pub fn load_config(&self) -> Result<BenchConfig> {
        let mut config = BenchConfig::load(self.config.as_deref()).context("loading configuration")?;
        self.overrides.apply(&mut config)?;
        Ok(config)
    }

    /// Execute the selected command.
    pub async fn run(self) -> Result<()> {
        let config = self.load_config()?;
        match self.command.unwrap_or(Commands::Run) {
            Commands::Run => run_benchmarks(&config, self.log_format).await,
            Commands::Acquire => acquire(&config).await,
            Commands::Plan => print_plan(&config),
            Commands::Report => report(&config),
        }
    }
}

fn progress_bar(total: usize, format: LogFormat) -> ProgressBar {
    if format == LogFormat::Json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

async fn run_benchmarks(config: &BenchConfig, format: LogFormat) -> Result<()> {
    check_assets(config)?;
    let plan = prepare_plan(config).await?.plan();
    let mut orchestrator = Orchestrator::from_config(config)?;

    let pb = progress_bar(plan.len(), format);
    let run = orchestrator
        .execute(&plan, |event| match event {
            TrialEvent::Started { spec, .. } => pb.set_message(spec.to_string()),
            TrialEvent::Finished { .. } => pb.inc(1),
        })
        .await;
    pb.finish_and_clear();

    let host = system_info();
    let (summary, artifacts) =
        summarize_and_write(orchestrator.store(), &config.reports_dir(), Some(&host))?;

    println!(
        "{} {} trials in run {}",
        "Benchmark complete:".green().bold(),
        run.attempted,
        run.run_id
    );
    if run.store_failures > 0 {
        println!(
            "  {}",
            format!("{} records could not be stored", run.store_failures).yellow()
        );
    }
    print_summary(&summary);
    println!("  Report:       {}", artifacts.report.display());
    Ok(())
}

async fn acquire(config: &BenchConfig) -> Result<()> {
    let planner = Planner::new(&config.matrix)?;
    let acquirer = ModelAcquirer::from_config(config)?;
    let report = acquirer.acquire_all(&planner.models()).await;

    for model in &report.available {
        println!("  {} {model}", "ready".green());
    }
    for (model, err) in &report.unavailable {
        println!("  {} {model}: {err}", "missing".red());
    }
    println!(
        "{} of {} models available in {}",
        report.available.len(),
        report.available.len() + report.unavailable.len(),
        acquirer.layout().root().display()
    );
    Ok(())
}

fn print_plan(config: &BenchConfig) -> Result<()> {
    let planner = Planner::new(&config.matrix)?;
    for (index, spec) in planner.plan().iter().enumerate() {
        println!("{:>4}  {:<60}  {}", index + 1, spec.key().to_string(), spec);
    }
    println!(
        "{} trials, deadline {}s each",
        planner.len().to_string().bold(),
        config.runtime.deadline_secs
    );
    Ok(())
}

fn report(config: &BenchConfig) -> Result<()> {
    let store = FileResultStore::open(config.results_dir())?;
    let (summary, artifacts) = summarize_and_write(&store, &config.reports_dir(), None)?;
    print_summary(&summary);
    println!("  Report:       {}", artifacts.report.display());
    Ok(())
}

fn print_summary(summary: &Summary) {
    let report = &summary.report;
    println!(
        "  Trials:       {} ({} success, {} timeout, {} process error)",
        report.total_trials,
        report.counts.success.to_string().green(),
        report.counts.timeout.to_string().yellow(),
        report.counts.process_error.to_string().red()
    );
    match &report.best {
        Some(best) => println!("  Peak FPS:     {:.2} ({})", best.fps, best.spec),
        None => println!("  Peak FPS:     {}", "N/A".dimmed()),
    }
    if let Some(streams) = report.max_streams {
        println!("  Max streams:  {streams}");
    }
    let mean_cpu = report
        .mean_cpu
        .map(|cpu| format!(" (mean CPU {cpu:.1}%)"))
        .unwrap_or_default();
    println!("  Bottleneck:   {}{mean_cpu}", report.bottleneck.to_string().bold());
    if report.devices.len() > 1 {
        for (device, summary) in &report.devices {
            let peak = summary
                .best
                .as_ref()
                .map_or_else(|| "N/A".to_string(), |best| format!("{:.2}", best.fps));
            println!(
                "    {device:<8} peak FPS {peak}, {} trials, {}",
                summary.trials, summary.bottleneck
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["streambench"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.command.unwrap_or(Commands::Run), Commands::Run);
    }

    #[test]
    fn test_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "streambench",
            "plan",
            "--device",
            "GPU",
            "--sandbox",
            "local",
            "--deadline",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Commands::Plan));

        let mut config = BenchConfig::default();
        cli.overrides.apply(&mut config).unwrap();
        assert_eq!(config.matrix.device, "GPU");
        assert_eq!(config.runtime.sandbox, SandboxKind::Local);
        assert_eq!(config.runtime.deadline_secs, 30);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli = Cli::try_parse_from(["streambench", "--deadline", "0"]).unwrap();
        let mut config = BenchConfig::default();
        assert!(cli.overrides.apply(&mut config).is_err());
        assert!(Cli::try_parse_from(["streambench", "--sandbox", "vm"]).is_err());
    }
}
