mod args;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use sqlcipher_pool_bench::run_all;

use crate::args::Args;
use crate::logging::OutputSinks;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let sinks = match OutputSinks::open(args.log.as_deref()) {
        Ok(sinks) => sinks,
        Err(err) => {
            eprintln!("failed to open log file: {err}");
            return ExitCode::FAILURE;
        }
    };
    let writer = match sinks.event_writer() {
        Ok(writer) => writer,
        Err(err) => {
            eprintln!("failed to share log file with the logger: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let (config, pool_sizes) = match args.bench_config().and_then(|config| {
        args.pool_sizes().map(|sizes| (config, sizes))
    }) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let reports = match run_all(&config, &pool_sizes).await {
        Ok(reports) => reports,
        Err(err) => {
            tracing::error!("run aborted: {err}");
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => {
                if let Err(err) = sinks.emit_reports(&json) {
                    tracing::error!("failed to write reports: {err}");
                    return ExitCode::FAILURE;
                }
            }
            Err(err) => {
                tracing::error!("failed to render reports: {err}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}
