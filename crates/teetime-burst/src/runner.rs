use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use teetime_core::{config::BurstConfig, BookingTarget};
use tracing::{info_span, Instrument, Level};
use uuid::Uuid;

use crate::aggregate::{BurstResult, BurstSummary};
use crate::dispatcher::Dispatcher;
use crate::error::BurstError;
use crate::recorder::AttemptLog;
use crate::schedule::Scheduler;
use crate::session::{Session, SessionProvider};
use crate::types::ScheduledJob;

/// How a burst run ended.
#[derive(Debug)]
pub enum BurstOutcome {
    /// Every scheduled job ran; the result may still hold zero successes.
    Completed {
        burst_id: Uuid,
        result: BurstResult,
        elapsed: Duration,
    },
    /// Nothing was scheduled: the session or the schedule could not be set up.
    Aborted { burst_id: Uuid, reason: BurstError },
}

impl BurstOutcome {
    pub fn burst_id(&self) -> Uuid {
        match self {
            Self::Completed { burst_id, .. } | Self::Aborted { burst_id, .. } => *burst_id,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    pub fn result(&self) -> Option<&BurstResult> {
        match self {
            Self::Completed { result, .. } => Some(result),
            Self::Aborted { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&BurstError> {
        match self {
            Self::Completed { .. } => None,
            Self::Aborted { reason, .. } => Some(reason),
        }
    }

    /// Summary of the run; an aborted run reports zero attempts.
    pub fn summary(&self) -> BurstSummary {
        self.result()
            .map(|r| r.summary.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
enum Window {
    /// The configured time of day on the given date.
    Configured(NaiveDate),
    /// An explicit instant.
    At(DateTime<Utc>),
}

/// Runs one complete burst: session, schedule, dispatch, summary.
///
/// Only a failed session or an unusable schedule ends a run early; every
/// other failure is recorded on its attempt and the run always produces a
/// summary.
pub struct BurstRunner {
    provider: Arc<dyn SessionProvider>,
    dispatcher: Dispatcher,
    config: BurstConfig,
    log: Arc<AttemptLog>,
}

impl BurstRunner {
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        dispatcher: Dispatcher,
        config: BurstConfig,
        log: Arc<AttemptLog>,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            config,
            log,
        }
    }

    /// Burst around the configured window-open time on `today`.
    pub async fn execute(&self, today: NaiveDate, targets: &[BookingTarget]) -> BurstOutcome {
        self.run(Window::Configured(today), targets).await
    }

    /// Burst around an explicit window-open instant.
    pub async fn execute_at(&self, window_open: DateTime<Utc>, targets: &[BookingTarget]) -> BurstOutcome {
        self.run(Window::At(window_open), targets).await
    }

    async fn run(&self, window: Window, targets: &[BookingTarget]) -> BurstOutcome {
        let burst_id = Uuid::new_v4();
        let span = info_span!("burst", %burst_id);
        self.run_in_span(burst_id, window, targets)
            .instrument(span)
            .await
    }

    async fn run_in_span(&self, burst_id: Uuid, window: Window, targets: &[BookingTarget]) -> BurstOutcome {
        self.log.note(
            Level::INFO,
            &format!("Initializing session via {} provider...", self.provider.name()),
        );

        let session = match self.provider.initialize().await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                let reason = BurstError::SessionInit(e);
                self.log
                    .note(Level::ERROR, &format!("Fatal error during booking: {reason}"));
                self.provider.close().await;
                return BurstOutcome::Aborted { burst_id, reason };
            }
        };
        self.log.note(Level::INFO, "Session initialized successfully");

        let outcome = self.fire(burst_id, session, window, targets).await;
        self.provider.close().await;
        outcome
    }

    async fn fire(
        &self,
        burst_id: Uuid,
        session: Arc<Session>,
        window: Window,
        targets: &[BookingTarget],
    ) -> BurstOutcome {
        let jobs = match self.plan(window, targets) {
            Ok(jobs) => jobs,
            Err(reason) => {
                self.log
                    .note(Level::ERROR, &format!("Cannot schedule burst: {reason}"));
                return BurstOutcome::Aborted { burst_id, reason };
            }
        };

        if let Some(first) = targets.first() {
            self.log.note(
                Level::INFO,
                &format!("Preparing burst strategy for {}", first.date),
            );
        }
        self.log.note(
            Level::INFO,
            &format!("Scheduled {} parallel booking attempts", jobs.len()),
        );

        let started = Instant::now();
        let records = self.dispatcher.dispatch(session, jobs).await;
        let elapsed = started.elapsed();

        let result = BurstResult::from_records(records);
        self.log.record_summary(&result);
        self.log.note(
            Level::INFO,
            &format!(
                "Total burst execution time: {:.2}ms",
                elapsed.as_secs_f64() * 1000.0
            ),
        );

        BurstOutcome::Completed {
            burst_id,
            result,
            elapsed,
        }
    }

    fn plan(&self, window: Window, targets: &[BookingTarget]) -> Result<Vec<ScheduledJob>, BurstError> {
        let scheduler = Scheduler::new(&self.config)?;
        match window {
            Window::Configured(today) => scheduler.plan(today, targets),
            Window::At(open) => scheduler.plan_at(open, targets),
        }
    }
}
