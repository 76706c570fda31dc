use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, TimeZone};
use teetime_core::parse_time_of_day;

use crate::error::{Result, TriggerError};

/// Local time of day the daily burst is launched at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTime(NaiveTime);

impl RunTime {
    pub fn parse(s: &str) -> Result<Self> {
        parse_time_of_day(s)
            .map(Self)
            .map_err(|e| TriggerError::InvalidRunTime(e.to_string()))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for RunTime {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RunTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

/// Next occurrence of `run_time` strictly after `from`, in `from`'s timezone.
///
/// Today's occurrence if it is still ahead, tomorrow's otherwise. A day on
/// which the time falls into a DST gap is skipped; on a fold the earlier
/// instant is used.
pub fn next_daily_run<Tz: TimeZone>(run_time: RunTime, from: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = from.timezone();
    let mut day = from.date_naive();
    for _ in 0..3 {
        if let Some(candidate) = day.and_time(run_time.0).and_local_timezone(tz.clone()).earliest() {
            if candidate > from {
                return Some(candidate);
            }
        }
        day = day.succ_opt()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parse_accepts_only_hh_mm_ss() {
        assert_eq!(RunTime::parse("22:59:55").unwrap().to_string(), "22:59:55");
        assert!(RunTime::parse("22:59").is_err());
        assert!("late".parse::<RunTime>().is_err());
    }

    #[test]
    fn later_today_fires_today() {
        let run = RunTime::parse("22:59:55").unwrap();
        let next = next_daily_run(run, at("2025-07-20T10:00:00Z")).unwrap();
        assert_eq!(next, at("2025-07-20T22:59:55Z"));
    }

    #[test]
    fn passed_time_rolls_to_tomorrow() {
        let run = RunTime::parse("22:59:55").unwrap();
        let next = next_daily_run(run, at("2025-07-20T23:00:00Z")).unwrap();
        assert_eq!(next, at("2025-07-21T22:59:55Z"));
    }

    #[test]
    fn exact_instant_is_not_next() {
        let run = RunTime::parse("22:59:55").unwrap();
        let next = next_daily_run(run, at("2025-07-20T22:59:55Z")).unwrap();
        assert_eq!(next, at("2025-07-21T22:59:55Z"));
    }

    #[test]
    fn month_boundary() {
        let run = RunTime::parse("06:00:00").unwrap();
        let next = next_daily_run(run, at("2025-07-31T07:00:00Z")).unwrap();
        assert_eq!(next, at("2025-08-01T06:00:00Z"));
    }

    #[test]
    fn follows_the_source_timezone() {
        let tz = FixedOffset::west_opt(7 * 3600).unwrap();
        let from = tz.with_ymd_and_hms(2025, 7, 20, 21, 0, 0).unwrap();
        let next = next_daily_run(RunTime::parse("22:59:55").unwrap(), from).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2025, 7, 20, 22, 59, 55).unwrap());
        assert_eq!(next.with_timezone(&Utc), at("2025-07-21T05:59:55Z"));
    }
}
