//! `teetime-trigger` — launches the burst once a day at a fixed local time.
//!
//! # Overview
//!
//! [`engine::TriggerEngine`] sleeps until the next occurrence of the
//! configured [`schedule::RunTime`], runs the job to completion, and repeats
//! until its shutdown channel broadcasts `true`. Nothing is persisted: a
//! run missed while the process was down is simply skipped.

pub mod engine;
pub mod error;
pub mod schedule;

pub use engine::TriggerEngine;
pub use error::{Result, TriggerError};
pub use schedule::{next_daily_run, RunTime};
