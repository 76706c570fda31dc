//! Wiring between the loaded config and one burst run.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use teetime_burst::{
    AttemptLog, BurstOutcome, BurstRunner, Dispatcher, HttpBookingClient, MarkerClassifier,
};
use teetime_core::config::{TeeTimeConfig, TARGET_DATE_FORMAT};
use tracing::{info, warn};

/// clap value parser for `--date`.
pub fn parse_target_date(s: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(s, TARGET_DATE_FORMAT)
        .map(|d| d.format(TARGET_DATE_FORMAT).to_string())
        .map_err(|e| format!("expected MM-DD-YYYY: {e}"))
}

pub fn banner(config: &TeeTimeConfig) -> Vec<String> {
    let burst = &config.burst_config;
    vec![
        "Burst-Fire Tee Time Booking".to_string(),
        "=".repeat(40),
        format!("Burst offsets: {:?}", burst.burst_offsets),
        format!("Target times: {:?}", config.target_times),
        format!("Booking window: {}", burst.booking_window_time),
        format!("Retry interval: {}ms", burst.retry_interval_ms),
    ]
}

/// Attempt log for one run. A log file that cannot be opened downgrades to
/// tracing output only.
pub fn open_log(config: &TeeTimeConfig) -> Arc<AttemptLog> {
    let log = match config.logging.file.as_deref() {
        Some(path) => AttemptLog::open(path).unwrap_or_else(|e| {
            warn!(%path, "cannot open attempt log ({e}), logging to stdout only");
            AttemptLog::stdout_only()
        }),
        None => AttemptLog::stdout_only(),
    };
    Arc::new(log)
}

pub fn build_runner(config: &TeeTimeConfig, log: Arc<AttemptLog>) -> anyhow::Result<BurstRunner> {
    let burst = config.burst_config.clone();
    let client = HttpBookingClient::new(burst.request_timeout())?;
    let dispatcher = Dispatcher::new(
        Arc::new(client),
        Arc::new(MarkerClassifier::from_config(&burst)),
        &burst,
        &config.booking_settings,
        Arc::clone(&log),
    );
    let provider = teetime_session::build_provider(config);
    Ok(BurstRunner::new(provider, dispatcher, burst, log))
}

/// One complete burst around today's window, reported to stdout and the
/// attempt log.
pub async fn run_once(config: &TeeTimeConfig, date: Option<&str>) -> anyhow::Result<BurstOutcome> {
    let log = open_log(config);
    let runner = build_runner(config, Arc::clone(&log))?;

    let today = Local::now().date_naive();
    let target_date = date
        .map(str::to_string)
        .unwrap_or_else(|| config.target_date(today));
    let targets = config.targets_for(&target_date);
    info!(%target_date, targets = targets.len(), "starting burst");

    let outcome = runner.execute(today, &targets).await;
    match &outcome {
        BurstOutcome::Completed { result, .. } if result.summary.success_count > 0 => {
            info!("SUCCESS! Secured {} tee time(s)", result.summary.success_count);
            for record in result.successes() {
                info!("  - Booked at offset {:+}ms [{}]", record.offset_ms, record.target);
            }
        }
        BurstOutcome::Completed { .. } => warn!("No successful bookings in this burst"),
        BurstOutcome::Aborted { reason, .. } => warn!(code = reason.code(), "burst aborted: {reason}"),
    }
    for line in results(&outcome) {
        println!("{line}");
    }

    if let Err(e) = log.close() {
        warn!("attempt log close failed: {e}");
    }
    Ok(outcome)
}

pub fn results(outcome: &BurstOutcome) -> Vec<String> {
    let BurstOutcome::Completed { result, .. } = outcome else {
        let reason = outcome
            .reason()
            .map(ToString::to_string)
            .unwrap_or_default();
        return vec![format!("\nBurst aborted: {reason}")];
    };

    let summary = &result.summary;
    let mut lines = vec![format!(
        "\nResults: {}/{} successful bookings",
        summary.success_count, summary.total
    )];
    if summary.success_count > 0 {
        lines.push("Successful bookings:".to_string());
        lines.extend(result.successes().map(|r| {
            format!(
                "  - Offset {:+}ms [{}]: {:.2}ms response",
                r.offset_ms, r.target, r.response_time_ms
            )
        }));
    }
    lines
}
