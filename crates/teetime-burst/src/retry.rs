use std::future::Future;
use std::time::Duration;

use teetime_core::config::BurstConfig;
use tokio::time::Instant;
use tracing::debug;

use crate::classify::{Classification, ClassifiedResponse};

/// Detail prefix for a job that never got past "not open yet".
pub const BUDGET_EXHAUSTED: &str = "retry budget exhausted";

/// Fixed-interval retry bounds. No backoff: the interval is meant to be a few
/// tens of milliseconds so the server is probed rapidly as the window opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Measured from the job's own first request, not from the burst start.
    pub cutoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &BurstConfig) -> Self {
        Self {
            interval: config.retry_interval(),
            max_attempts: config.max_retry_attempts,
            cutoff: config.cutoff(),
        }
    }
}

/// Terminal state of the retry state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Success,
    TerminalFailure,
    CutoffReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
    pub state: RetryState,
    /// Requests re-issued after the first one.
    pub retries: u32,
    /// Response the job ends with. For `CutoffReached` its detail starts with
    /// [`BUDGET_EXHAUSTED`].
    pub last: ClassifiedResponse,
}

/// Re-issues a request that was rejected as "not open yet" until it resolves.
#[derive(Debug, Clone, Copy)]
pub struct RetryEngine {
    policy: RetryPolicy,
}

impl RetryEngine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Drive the retry loop for one job.
    ///
    /// `origin` is the instant the job's first request went out and `first`
    /// its (retryable) response. Each tick sleeps the interval, then calls
    /// `issue` and classifies. The loop stops at the first success, the first
    /// non-retryable response (transport errors included), or when either the
    /// retry count or the cutoff runs out. No request is issued once the
    /// cutoff has passed, so a job overruns its cutoff by at most one interval
    /// plus one request.
    pub async fn run<F, Fut>(
        &self,
        origin: Instant,
        first: ClassifiedResponse,
        mut issue: F,
    ) -> RetryOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClassifiedResponse>,
    {
        let deadline = origin + self.policy.cutoff;
        let mut retries = 0u32;
        let mut last = first;

        while retries < self.policy.max_attempts && Instant::now() < deadline {
            tokio::time::sleep(self.policy.interval).await;
            if Instant::now() >= deadline {
                break;
            }

            let response = issue().await;
            retries += 1;

            match response.classification {
                Classification::Success => {
                    debug!(retries, "retry succeeded");
                    return RetryOutcome {
                        state: RetryState::Success,
                        retries,
                        last: response,
                    };
                }
                Classification::RetryableRejection => {
                    last = response;
                }
                Classification::TerminalFailure | Classification::TransportError => {
                    debug!(retries, status = ?response.status, "retry ended with terminal failure");
                    return RetryOutcome {
                        state: RetryState::TerminalFailure,
                        retries,
                        last: response,
                    };
                }
            }
        }

        let elapsed_ms = origin.elapsed().as_millis();
        debug!(retries, elapsed_ms, "retry budget exhausted");
        RetryOutcome {
            state: RetryState::CutoffReached,
            retries,
            last: ClassifiedResponse {
                classification: Classification::RetryableRejection,
                status: last.status,
                detail: Some(format!(
                    "{BUDGET_EXHAUSTED} after {retries} retries ({elapsed_ms} ms)"
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn not_open() -> ClassifiedResponse {
        ClassifiedResponse {
            classification: Classification::RetryableRejection,
            status: Some(400),
            detail: Some("booking not open yet".into()),
        }
    }

    fn booked() -> ClassifiedResponse {
        ClassifiedResponse {
            classification: Classification::Success,
            status: Some(200),
            detail: None,
        }
    }

    fn engine(interval_ms: u64, max_attempts: u32, cutoff: Duration) -> RetryEngine {
        RetryEngine::new(RetryPolicy {
            interval: Duration::from_millis(interval_ms),
            max_attempts,
            cutoff,
        })
    }

    #[tokio::test]
    async fn always_not_open_hits_the_tighter_bound() {
        let engine = engine(20, 3, Duration::from_millis(50));
        let calls = AtomicU32::new(0);
        let origin = Instant::now();

        let outcome = engine
            .run(origin, not_open(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { not_open() }
            })
            .await;

        let elapsed = origin.elapsed();
        assert_eq!(outcome.state, RetryState::CutoffReached);
        assert!(outcome.retries <= 3);
        assert_eq!(outcome.retries, calls.load(Ordering::SeqCst));
        assert!(outcome.last.detail.unwrap().starts_with(BUDGET_EXHAUSTED));
        assert_eq!(outcome.last.status, Some(400));
        // cutoff 50 ms + one 20 ms interval, plus scheduling slack
        assert!(elapsed < Duration::from_millis(50 + 20 + 40), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn count_bound_stops_before_a_long_cutoff() {
        let engine = engine(5, 3, Duration::from_secs(30));
        let calls = AtomicU32::new(0);

        let outcome = engine
            .run(Instant::now(), not_open(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { not_open() }
            })
            .await;

        assert_eq!(outcome.state, RetryState::CutoffReached);
        assert_eq!(outcome.retries, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_once_the_window_opens() {
        let engine = engine(5, 50, Duration::from_secs(5));
        let calls = AtomicU32::new(0);

        let outcome = engine
            .run(Instant::now(), not_open(), || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        not_open()
                    } else {
                        booked()
                    }
                }
            })
            .await;

        assert_eq!(outcome.state, RetryState::Success);
        assert_eq!(outcome.retries, 3);
        assert_eq!(outcome.last.status, Some(200));
    }

    #[tokio::test]
    async fn terminal_response_stops_immediately() {
        let engine = engine(5, 50, Duration::from_secs(5));

        let outcome = engine
            .run(Instant::now(), not_open(), || async {
                ClassifiedResponse {
                    classification: Classification::TerminalFailure,
                    status: Some(409),
                    detail: Some("no availability".into()),
                }
            })
            .await;

        assert_eq!(outcome.state, RetryState::TerminalFailure);
        assert_eq!(outcome.retries, 1);
        assert_eq!(outcome.last.status, Some(409));
    }

    #[tokio::test]
    async fn transport_error_inside_the_loop_is_terminal() {
        let engine = engine(5, 50, Duration::from_secs(5));

        let outcome = engine
            .run(Instant::now(), not_open(), || async {
                ClassifiedResponse {
                    classification: Classification::TransportError,
                    status: None,
                    detail: Some("timeout error".into()),
                }
            })
            .await;

        assert_eq!(outcome.state, RetryState::TerminalFailure);
        assert_eq!(outcome.last.status, None);
    }

    #[tokio::test]
    async fn zero_budget_reports_cutoff_without_retrying() {
        let engine = engine(5, 0, Duration::from_secs(5));
        let outcome = engine
            .run(Instant::now(), not_open(), || async { booked() })
            .await;
        assert_eq!(outcome.state, RetryState::CutoffReached);
        assert_eq!(outcome.retries, 0);
    }

    #[tokio::test]
    async fn cutoff_counts_from_the_jobs_own_origin() {
        // origin already 100 ms in the past with a 50 ms cutoff: nothing is issued
        let engine = engine(5, 50, Duration::from_millis(50));
        let origin = Instant::now() - Duration::from_millis(100);
        let outcome = engine
            .run(origin, not_open(), || async { booked() })
            .await;
        assert_eq!(outcome.state, RetryState::CutoffReached);
        assert_eq!(outcome.retries, 0);
    }
}
