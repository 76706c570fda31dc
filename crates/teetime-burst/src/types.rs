use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teetime_core::BookingTarget;

use crate::classify::ClassifiedResponse;

/// One (offset, target) pair with its absolute fire instant.
///
/// Produced by the scheduler, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    /// Position in the offset × target cross product; records are returned in
    /// this order.
    pub seq: usize,
    pub offset_ms: i64,
    pub target: BookingTarget,
    pub fire_at: DateTime<Utc>,
}

/// How a job's attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The slot was secured.
    Booked,
    /// The server refused the booking for a reason other than "not open yet".
    Rejected,
    /// The request never completed (timeout, connection failure).
    TransportFailed,
    /// "Not open yet" until the retry count or the cutoff ran out.
    CutoffReached,
    /// The unit itself failed before producing a response.
    Crashed,
}

impl AttemptOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, AttemptOutcome::Booked)
    }
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttemptOutcome::Booked => "booked",
            AttemptOutcome::Rejected => "rejected",
            AttemptOutcome::TransportFailed => "transport_failed",
            AttemptOutcome::CutoffReached => "cutoff_reached",
            AttemptOutcome::Crashed => "crashed",
        };
        write!(f, "{s}")
    }
}

/// Final outcome of one scheduled job.
///
/// Exactly one record exists per [`ScheduledJob`]. Only the final response
/// is kept; intermediate retries are reflected in `retries` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub seq: usize,
    pub offset_ms: i64,
    pub target: BookingTarget,
    pub scheduled_at: DateTime<Utc>,
    /// Wall-clock instant the first request was issued.
    pub fired_at: DateTime<Utc>,
    /// `fired_at - scheduled_at`, in milliseconds.
    pub jitter_ms: f64,
    /// Latency of the first request.
    pub response_time_ms: f64,
    /// Time from the first request to the final outcome, retries included.
    pub round_trip_ms: f64,
    /// Final HTTP status; `None` when the request failed in transport.
    pub status: Option<u16>,
    pub success: bool,
    pub outcome: AttemptOutcome,
    pub retries: u32,
    pub error: Option<String>,
}

impl AttemptRecord {
    /// Open a record for `job` at the moment its first request goes out.
    pub(crate) fn begin(job: &ScheduledJob, fired_at: DateTime<Utc>) -> Self {
        Self {
            seq: job.seq,
            offset_ms: job.offset_ms,
            target: job.target.clone(),
            scheduled_at: job.fire_at,
            fired_at,
            jitter_ms: millis_between(job.fire_at, fired_at),
            response_time_ms: 0.0,
            round_trip_ms: 0.0,
            status: None,
            success: false,
            outcome: AttemptOutcome::Crashed,
            retries: 0,
            error: None,
        }
    }

    /// Close the record with the final response of its job.
    pub(crate) fn finalize(
        mut self,
        last: ClassifiedResponse,
        outcome: AttemptOutcome,
        retries: u32,
        round_trip_ms: f64,
    ) -> Self {
        self.status = last.status;
        self.success = outcome.is_success();
        self.outcome = outcome;
        self.error = last.detail;
        self.retries = retries;
        self.round_trip_ms = round_trip_ms;
        self
    }

    /// Record for a unit that died before producing a response. Its fire
    /// instant is the moment of the crash, so its jitter carries no timing
    /// information.
    pub(crate) fn crashed(job: &ScheduledJob, detail: String) -> Self {
        let mut record = Self::begin(job, Utc::now());
        record.error = Some(detail);
        record
    }
}

/// Signed milliseconds from `from` to `to`, with microsecond resolution.
pub(crate) fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => delta.num_milliseconds() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use chrono::TimeDelta;

    fn job() -> ScheduledJob {
        ScheduledJob {
            seq: 3,
            offset_ms: -40,
            target: BookingTarget::new("07-22-2025", "7:33"),
            fire_at: DateTime::parse_from_rfc3339("2025-07-20T23:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn begin_measures_jitter() {
        let job = job();
        let fired = job.fire_at + TimeDelta::microseconds(2_500);
        let record = AttemptRecord::begin(&job, fired);
        assert_eq!(record.seq, 3);
        assert!((record.jitter_ms - 2.5).abs() < 1e-9);
        assert!(!record.success);
    }

    #[test]
    fn early_fire_gives_negative_jitter() {
        let job = job();
        let record = AttemptRecord::begin(&job, job.fire_at - TimeDelta::milliseconds(3));
        assert!((record.jitter_ms + 3.0).abs() < 1e-9);
    }

    #[test]
    fn finalize_copies_last_response() {
        let job = job();
        let record = AttemptRecord::begin(&job, job.fire_at).finalize(
            ClassifiedResponse {
                classification: Classification::TerminalFailure,
                status: Some(409),
                detail: Some("no availability".into()),
            },
            AttemptOutcome::Rejected,
            2,
            81.0,
        );
        assert_eq!(record.status, Some(409));
        assert_eq!(record.outcome, AttemptOutcome::Rejected);
        assert_eq!(record.retries, 2);
        assert_eq!(record.error.as_deref(), Some("no availability"));
        assert!(!record.success);
    }

    #[test]
    fn crashed_record_is_a_failure_with_detail() {
        let record = AttemptRecord::crashed(&job(), "unit panicked: boom".into());
        assert_eq!(record.outcome, AttemptOutcome::Crashed);
        assert!(!record.success);
        assert_eq!(record.status, None);
    }
}
