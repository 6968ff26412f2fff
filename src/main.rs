// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! tfw-harness entry point.
//!
//! Opens the two debug-link endpoints, sends the init packet and serves the
//! target until the suite finishes.
//!
//! ## Exit codes
//!
//! - `0` suite completed (individual test failures do not count)
//! - `1` stopped early by `--stop-on-error`
//! - `2` framing, encoding or event-format violation
//! - `3` endpoint could not be opened, link I/O error or read timeout

use std::process::ExitCode;

use clap::Parser;

use tfw_harness::config as tfw_config;
use tfw_harness::link::Channel;
use tfw_harness::telemetry;
use tfw_harness::{build_harness, HarnessError, Reporter};

#[derive(Debug, Parser)]
#[command(
    name = "tfw-harness",
    version,
    about = "Drive the kernel test suite over the debug serial link",
    after_help = "Endpoints, timing and logging are configured through TFW_* environment variables."
)]
struct Cli {
    /// Run nightly-only tests as well
    #[arg(long)]
    nightly: bool,

    /// Abort the suite on the first failure that was not skipped
    #[arg(long)]
    stop_on_error: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = tfw_config::load();

    if let Err(e) = telemetry::init_logging(&config.log) {
        eprintln!("Logging disabled: {}", e);
    }
    tracing::debug!(?config, nightly = cli.nightly, stop_on_error = cli.stop_on_error, "starting");

    let opened = Channel::open(&config.write_path, &config.read_path, config.read_policy).await;
    let channel = match opened {
        Ok(channel) => channel,
        Err(e) => {
            let err = HarnessError::from(e);
            eprintln!("Error: {}", err);
            return ExitCode::from(err.exit_code());
        }
    };

    let harness = build_harness(
        &config,
        channel,
        cli.nightly,
        cli.stop_on_error,
        Reporter::stdout(),
    );

    match harness.run().await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
