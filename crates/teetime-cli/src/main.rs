use std::process::ExitCode;

use clap::Parser;
use teetime_core::config::{TeeTimeConfig, DEFAULT_CONFIG_FILE};
use teetime_trigger::{RunTime, TriggerEngine};
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

mod app;

/// Automated tee time booking with a burst-fire strategy
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON, or TOML by extension)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "TEETIME_CONFIG")]
    config: String,

    /// Run one booking burst now
    #[arg(long, conflicts_with = "schedule")]
    test: bool,

    /// Launch a burst every day at the configured run time (default)
    #[arg(long)]
    schedule: bool,

    /// Book this date instead of today + days_in_advance
    #[arg(long, value_name = "MM-DD-YYYY", value_parser = app::parse_target_date)]
    date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// One burst now, then exit.
    Once,
    /// A burst every day at `schedule.run_time` until Ctrl-C.
    Daily,
}

impl Args {
    fn mode(&self) -> Mode {
        match (self.test, self.schedule) {
            (true, false) => Mode::Once,
            // clap rejects --test together with --schedule
            _ => Mode::Daily,
        }
    }
}

/// Swap the configured level into the live filter. Returns whether it took
/// effect; on failure the current filter stays.
fn apply_level<S: 'static>(handle: &reload::Handle<EnvFilter, S>, level: &str) -> bool {
    let filter = match EnvFilter::try_new(level) {
        Ok(filter) => filter,
        Err(e) => {
            warn!(%level, "invalid log level ({e}), keeping info");
            return false;
        }
    };
    match handle.reload(filter) {
        Ok(()) => true,
        Err(e) => {
            warn!(%level, "could not apply log level ({e}), keeping info");
            false
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins; otherwise the configured level applies once the config is loaded
    let from_env = EnvFilter::try_from_default_env().ok();
    let overridden = from_env.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TeeTimeConfig::load_or_default(Some(&args.config));
    if !overridden {
        apply_level(&filter_handle, &config.logging.level);
    }

    match run(args, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: TeeTimeConfig) -> anyhow::Result<ExitCode> {
    for line in app::banner(&config) {
        println!("{line}");
    }

    if args.mode() == Mode::Once {
        println!("\nRunning test booking...");
        let outcome = app::run_once(&config, args.date.as_deref()).await?;
        return Ok(if outcome.is_aborted() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    let run_time = RunTime::parse(&config.schedule.run_time)?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    println!("\nBurst-fire tee time booking scheduled");
    println!("Run time: {run_time} daily");
    println!("Use --test to run immediately or check logs for results");
    println!("Scheduler started. Press Ctrl+C to exit.");

    let date = args.date.as_deref();
    TriggerEngine::new(run_time)
        .run(shutdown_rx, || {
            let config = config.clone();
            async move {
                if let Err(e) = app::run_once(&config, date).await {
                    error!("burst could not start: {e:#}");
                }
            }
        })
        .await;

    println!("\nScheduler stopped.");
    Ok(ExitCode::SUCCESS)
}
