//! `teetime-core` — configuration, shared value types and the core error type
//! used by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::TeeTimeConfig;
pub use error::{CoreError, Result};
pub use types::{parse_time_of_day, BookingTarget, Credentials};
