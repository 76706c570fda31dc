use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use teetime_core::config::{BookingSettings, BurstConfig};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::classify::{Classification, ClassifiedResponse, ResponseClassifier};
use crate::client::{BookingClient, BookingPayload};
use crate::recorder::AttemptLog;
use crate::retry::{RetryEngine, RetryPolicy, RetryState};
use crate::session::Session;
use crate::types::{AttemptOutcome, AttemptRecord, ScheduledJob};

/// State shared read-only by every unit of a burst.
struct Shared {
    client: Arc<dyn BookingClient>,
    classifier: Arc<dyn ResponseClassifier>,
    retry: RetryEngine,
    /// One permit per in-flight request.
    admission: Semaphore,
    party_size: u32,
    course: String,
}

impl Shared {
    /// Issue one request under admission control and classify the response.
    async fn issue(&self, session: &Session, payload: &BookingPayload) -> ClassifiedResponse {
        // The semaphore is never closed, so acquire cannot fail.
        let _permit = self.admission.acquire().await.ok();
        let response = self.client.submit(session, payload).await;
        self.classifier.classify(&response)
    }
}

/// Fans a burst's jobs out as independent concurrent units.
///
/// Every unit sleeps until its own fire instant, issues its request, hands a
/// "not open yet" rejection to the retry engine, and reports exactly one
/// finalized [`AttemptRecord`]. Units never wait on or cancel one another:
/// a success on one leaves its siblings running.
pub struct Dispatcher {
    shared: Arc<Shared>,
    log: Arc<AttemptLog>,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn BookingClient>,
        classifier: Arc<dyn ResponseClassifier>,
        burst: &BurstConfig,
        booking: &BookingSettings,
        log: Arc<AttemptLog>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                classifier,
                retry: RetryEngine::new(RetryPolicy::from_config(burst)),
                admission: Semaphore::new(burst.max_concurrent_requests.clamp(1, Semaphore::MAX_PERMITS)),
                party_size: booking.party_size,
                course: booking.course.clone(),
            }),
            log,
        }
    }

    /// Run every job and collect one record per job, in job order.
    ///
    /// Pre-fire sleeps are unbounded; only the network phase is subject to
    /// the `max_concurrent_requests` admission bound.
    pub async fn dispatch(&self, session: Arc<Session>, jobs: Vec<ScheduledJob>) -> Vec<AttemptRecord> {
        let anchor = ClockAnchor::now();
        let expected = jobs.len();
        let (tx, mut rx) = mpsc::unbounded_channel::<AttemptRecord>();

        info!(jobs = expected, "dispatching burst");

        for job in jobs {
            let wake_at = anchor.instant_for(job.fire_at);
            let shared = Arc::clone(&self.shared);
            let session = Arc::clone(&session);
            let tx = tx.clone();

            tokio::spawn(async move {
                let record = match AssertUnwindSafe(run_unit(&shared, &session, &job, wake_at))
                    .catch_unwind()
                    .await
                {
                    Ok(record) => record,
                    Err(panic) => {
                        let detail = format!("unit panicked: {}", panic_message(&*panic));
                        warn!(seq = job.seq, offset_ms = job.offset_ms, "{detail}");
                        AttemptRecord::crashed(&job, detail)
                    }
                };
                // the receiver only goes away if the dispatch future was dropped
                let _ = tx.send(record);
            });
        }
        drop(tx);

        let mut records = Vec::with_capacity(expected);
        while let Some(record) = rx.recv().await {
            self.log.record_attempt(&record);
            records.push(record);
        }
        if records.len() != expected {
            warn!(expected, received = records.len(), "some units did not report");
        }

        records.sort_by_key(|r| r.seq);
        records
    }
}

/// One unit of work: wait, fire, classify, maybe retry, finalize.
async fn run_unit(
    shared: &Shared,
    session: &Session,
    job: &ScheduledJob,
    wake_at: Instant,
) -> AttemptRecord {
    // no-op when the instant has already passed
    tokio::time::sleep_until(wake_at).await;

    let payload = BookingPayload::for_target(&job.target, shared.party_size, &shared.course);

    let (record, origin, first) = {
        let _permit = shared.admission.acquire().await.ok();
        let fired_at = Utc::now();
        let origin = Instant::now();
        let response = shared.client.submit(session, &payload).await;
        let mut record = AttemptRecord::begin(job, fired_at);
        record.response_time_ms = millis(origin.elapsed());
        (record, origin, shared.classifier.classify(&response))
    };

    debug!(
        seq = job.seq,
        offset_ms = job.offset_ms,
        slot = %job.target.slot,
        jitter_ms = record.jitter_ms,
        status = ?first.status,
        "first response"
    );

    let (last, outcome, retries) = match first.classification {
        Classification::RetryableRejection => {
            info!(
                offset_ms = job.offset_ms,
                slot = %job.target.slot,
                "booking not open yet, retrying"
            );
            let payload = &payload;
            let issue = move || shared.issue(session, payload);
            let retry = shared.retry.run(origin, first, issue).await;
            let outcome = match retry.state {
                RetryState::Success => AttemptOutcome::Booked,
                RetryState::TerminalFailure => outcome_of(&retry.last),
                RetryState::CutoffReached => AttemptOutcome::CutoffReached,
            };
            (retry.last, outcome, retry.retries)
        }
        _ => {
            let outcome = outcome_of(&first);
            (first, outcome, 0)
        }
    };

    record.finalize(last, outcome, retries, millis(origin.elapsed()))
}

fn outcome_of(response: &ClassifiedResponse) -> AttemptOutcome {
    match response.classification {
        Classification::Success => AttemptOutcome::Booked,
        Classification::TransportError => AttemptOutcome::TransportFailed,
        Classification::RetryableRejection | Classification::TerminalFailure => {
            AttemptOutcome::Rejected
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Maps wall-clock fire instants onto the monotonic clock, sampled once per
/// burst so every unit shares the same reference.
#[derive(Debug, Clone, Copy)]
struct ClockAnchor {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl ClockAnchor {
    fn now() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    /// Instants in the past map to "now".
    fn instant_for(&self, at: DateTime<Utc>) -> Instant {
        match (at - self.wall).to_std() {
            Ok(ahead) => self.mono + ahead,
            Err(_) => self.mono,
        }
    }
}
