//! Burst summary: a pure reduction over finalized attempt records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use teetime_core::BookingTarget;

use crate::types::{AttemptOutcome, AttemptRecord};

/// The successful attempt with the lowest response latency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FastestSuccess {
    pub seq: usize,
    pub offset_ms: i64,
    pub target: BookingTarget,
    pub response_time_ms: f64,
    pub fired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BurstSummary {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Failures that never got past "not open yet".
    pub cutoff_count: usize,
    pub transport_error_count: usize,
    /// Ties on latency go to the earliest actual fire.
    pub fastest: Option<FastestSuccess>,
    /// Mean first-request latency over every record, failures included.
    /// `None` for an empty burst.
    pub mean_response_ms: Option<f64>,
    /// Jitter over records that actually fired; crashed units are left out.
    pub mean_jitter_ms: Option<f64>,
    pub max_abs_jitter_ms: Option<f64>,
}

impl BurstSummary {
    pub fn from_records(records: &[AttemptRecord]) -> Self {
        let success_count = records.iter().filter(|r| r.success).count();
        let count_outcome =
            |outcome: AttemptOutcome| records.iter().filter(|r| r.outcome == outcome).count();
        let fired = || records.iter().filter(|r| r.outcome != AttemptOutcome::Crashed);

        let fastest = records
            .iter()
            .filter(|r| r.success)
            .min_by(|a, b| {
                a.response_time_ms
                    .total_cmp(&b.response_time_ms)
                    .then(a.fired_at.cmp(&b.fired_at))
            })
            .map(|r| FastestSuccess {
                seq: r.seq,
                offset_ms: r.offset_ms,
                target: r.target.clone(),
                response_time_ms: r.response_time_ms,
                fired_at: r.fired_at,
            });

        Self {
            total: records.len(),
            success_count,
            failure_count: records.len() - success_count,
            cutoff_count: count_outcome(AttemptOutcome::CutoffReached),
            transport_error_count: count_outcome(AttemptOutcome::TransportFailed),
            fastest,
            mean_response_ms: mean(records.iter().map(|r| r.response_time_ms)),
            mean_jitter_ms: mean(fired().map(|r| r.jitter_ms)),
            max_abs_jitter_ms: fired().map(|r| r.jitter_ms.abs()).reduce(f64::max),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Every record of one burst, in job order, plus its summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BurstResult {
    pub records: Vec<AttemptRecord>,
    pub summary: BurstSummary,
}

impl BurstResult {
    /// Input order does not matter: records are sorted by job sequence.
    pub fn from_records(mut records: Vec<AttemptRecord>) -> Self {
        records.sort_by_key(|r| r.seq);
        let summary = BurstSummary::from_records(&records);
        Self { records, summary }
    }

    /// Result of a burst that never scheduled anything.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.records.iter().filter(|r| r.success)
    }
}
