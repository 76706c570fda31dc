//! `teetime-burst` — burst-timing dispatch and retry engine.
//!
//! # Overview
//!
//! A burst fires one independent booking attempt per (offset, target) pair
//! around the instant a booking window opens. Attempts that arrive too early
//! are rejected with a "not open yet" response and retried at a fixed
//! interval until they succeed, fail for another reason, or run out of
//! budget.
//!
//! | Stage        | Module         | Produces                                  |
//! |--------------|----------------|-------------------------------------------|
//! | Plan         | [`schedule`]   | [`ScheduledJob`] per offset × target      |
//! | Fire         | [`dispatcher`] | one [`AttemptRecord`] per job             |
//! | Classify     | [`classify`]   | [`Classification`] of each response       |
//! | Retry        | [`retry`]      | final outcome of a "not open yet" job     |
//! | Summarise    | [`aggregate`]  | [`BurstResult`]                           |
//!
//! [`runner::BurstRunner`] wires the stages together behind a
//! [`session::SessionProvider`], and [`recorder::AttemptLog`] is the
//! per-run attempt log every stage writes to.

pub mod aggregate;
pub mod classify;
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod recorder;
pub mod retry;
pub mod runner;
pub mod schedule;
pub mod session;
pub mod types;

pub use aggregate::{BurstResult, BurstSummary, FastestSuccess};
pub use classify::{Classification, ClassifiedResponse, MarkerClassifier, ResponseClassifier};
pub use client::{
    BookingClient, BookingPayload, HttpBookingClient, RawResponse, TransportError, TransportErrorKind,
};
pub use dispatcher::Dispatcher;
pub use error::{BurstError, Result};
pub use recorder::AttemptLog;
pub use retry::{RetryEngine, RetryOutcome, RetryPolicy, RetryState};
pub use runner::{BurstOutcome, BurstRunner};
pub use schedule::Scheduler;
pub use session::{Session, SessionError, SessionProvider};
pub use types::{AttemptOutcome, AttemptRecord, ScheduledJob};
