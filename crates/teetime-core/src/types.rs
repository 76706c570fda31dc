//! Shared value types for the booking engine.

use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

// ---------------------------------------------------------------------------
// BookingTarget
// ---------------------------------------------------------------------------

/// One slot the burst tries to secure.
///
/// Opaque to the engine: both fields are echoed into the request payload
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingTarget {
    /// Target date, already formatted for the booking endpoint (`MM-DD-YYYY`).
    pub date: String,
    /// Slot label, e.g. `"7:33"`.
    pub slot: String,
}

impl BookingTarget {
    pub fn new(date: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            slot: slot.into(),
        }
    }
}

impl fmt::Display for BookingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.slot)
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Login credentials handed to a session provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "USERNAME".to_string(),
            password: "PASSWORD".to_string(),
        }
    }
}

// Never print the password, not even at debug level.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Time of day
// ---------------------------------------------------------------------------

/// Parse a strict `HH:MM:SS` time of day.
///
/// Exactly three colon-separated numeric components are required; anything
/// else is [`CoreError::InvalidTime`].
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 3 {
        return Err(CoreError::InvalidTime(format!("'{s}' must have the form HH:MM:SS")));
    }

    let mut hms = [0u32; 3];
    for (slot, part) in hms.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| CoreError::InvalidTime(format!("'{s}': '{part}' is not a number")))?;
    }

    NaiveTime::from_hms_opt(hms[0], hms[1], hms[2])
        .ok_or_else(|| CoreError::InvalidTime(format!("'{s}' is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_and_unpadded_times() {
        assert_eq!(
            parse_time_of_day("23:00:00").unwrap(),
            NaiveTime::from_hms_opt(23, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day("7:05:09").unwrap(),
            NaiveTime::from_hms_opt(7, 5, 9).unwrap()
        );
    }

    #[test]
    fn rejects_missing_seconds() {
        assert!(parse_time_of_day("23:00").is_err());
    }

    #[test]
    fn rejects_garbage_and_out_of_range() {
        assert!(parse_time_of_day("ab:cd:ef").is_err());
        assert!(parse_time_of_day("25:00:00").is_err());
        assert!(parse_time_of_day("").is_err());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("alice"));
        assert!(!shown.contains("hunter2"));
    }
}
