// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use bandtss_relayer::config;
use bandtss_relayer::context::RelayerContext;
use bandtss_relayer::evm::EvmBridgeClient;
use bandtss_relayer::pipeline::RelayPipeline;
use bandtss_relayer::probe;
use bandtss_relayer::retry::Poller;
use bandtss_relayer::service::RelayCycleScheduler;
use bandtss_relayer::source::BandLcdClient;
use structopt::StructOpt;
use tokio::signal::unix;

/// The BandTSS → EVM relayer Command-line interface.
#[derive(StructOpt)]
#[structopt(name = "BandTSS Relayer")]
struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    verbose: i32,
    /// Path to the relayer configuration file.
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Opts::from_args();
    setup_logger(args.verbose)?;
    match dotenv::dotenv() {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    let config = config::load(&args.config)
        .context("failed to load the relayer configuration")?;
    let ctx = RelayerContext::new(config);
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        started = true,
    );

    let source = BandLcdClient::new(&ctx.config.source)?;
    let destination = EvmBridgeClient::new(&ctx)?;
    let poller = Poller::new(
        Duration::from_millis(ctx.config.poll.attempt_interval_ms),
        ctx.config.poll.max_attempts,
    );
    let pipeline =
        RelayPipeline::new(source, ctx.config.request.clone(), poller);
    let scheduler = RelayCycleScheduler::new(
        pipeline,
        destination,
        Duration::from_secs(ctx.config.poll.cycle_interval_secs),
    );
    let shutdown = ctx.shutdown_signal();
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown));

    // watch for signals
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let mut quit_signal = unix::signal(unix::SignalKind::quit())?;
    let shutdown = || {
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Lifecycle,
            shutdown_signal = "received",
        );
        tracing::warn!("Shutting down...");
        // send shutdown signal to all of the application.
        ctx.shutdown();
        // also abort the relay loop task
        scheduler_handle.abort();
        std::thread::sleep(std::time::Duration::from_millis(300));
        tracing::info!("Clean Exit ..");
    };
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
            shutdown();
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
            shutdown();
        },
        _ = quit_signal.recv() => {
            tracing::warn!("Quitting ...");
            shutdown();
        },
    }
    Ok(())
}

/// Sets up the logger for the relayer, based on the verbosity level passed in.
///
/// Returns `Ok(())` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `verbosity` - An i32 integer representing the verbosity level.
fn setup_logger(verbosity: i32) -> anyhow::Result<()> {
    use tracing::Level;
    let log_level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("bandtss_relayer={}", log_level).parse()?);
    let logger = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter);
    let logger = logger.pretty();
    logger.init();
    Ok(())
}
