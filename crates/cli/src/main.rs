// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Streambench CLI entry point.

use clap::Parser;
use colored::Colorize;
use streambench_cli::{init_tracing, Cli};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    if let Err(e) = cli.run().await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
