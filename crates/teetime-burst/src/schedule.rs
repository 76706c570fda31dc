use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use teetime_core::{config::BurstConfig, parse_time_of_day, BookingTarget};

use crate::error::{BurstError, Result};
use crate::types::ScheduledJob;

/// Turns the configured window-open time and burst offsets into absolute fire
/// instants.
///
/// Offsets are taken as given: negative ones fire before the window opens
/// (their rejections are absorbed by the retry engine), positive ones hedge
/// against clock skew. Nothing is rejected or deduplicated.
#[derive(Debug, Clone)]
pub struct Scheduler {
    offsets: Vec<i64>,
    window_time: NaiveTime,
}

impl Scheduler {
    /// Fails only when `booking_window_time` is not `HH:MM:SS`.
    pub fn new(config: &BurstConfig) -> Result<Self> {
        let window_time = parse_time_of_day(&config.booking_window_time)?;
        Ok(Self {
            offsets: config.burst_offsets.clone(),
            window_time,
        })
    }

    /// Window-open instant on `today`, interpreting the time of day in the
    /// local timezone.
    pub fn window_open(&self, today: NaiveDate) -> Result<DateTime<Utc>> {
        window_open_in(&Local, today, self.window_time)
    }

    /// Plan the burst for `today`'s window.
    pub fn plan(&self, today: NaiveDate, targets: &[BookingTarget]) -> Result<Vec<ScheduledJob>> {
        self.plan_at(self.window_open(today)?, targets)
    }

    /// Cross product offsets × targets around an explicit window-open instant.
    /// The fire instant depends on the offset only, never on the target.
    /// An offset that overflows the calendar is a Config error.
    pub fn plan_at(&self, window_open: DateTime<Utc>, targets: &[BookingTarget]) -> Result<Vec<ScheduledJob>> {
        let mut jobs = Vec::with_capacity(self.offsets.len() * targets.len());
        for &offset_ms in &self.offsets {
            let fire_at = TimeDelta::try_milliseconds(offset_ms)
                .and_then(|delta| window_open.checked_add_signed(delta))
                .ok_or_else(|| BurstError::Config(format!("burst offset {offset_ms}ms is out of range")))?;
            for target in targets {
                jobs.push(ScheduledJob {
                    seq: jobs.len(),
                    offset_ms,
                    target: target.clone(),
                    fire_at,
                });
            }
        }
        Ok(jobs)
    }
}

fn window_open_in<Tz: TimeZone>(tz: &Tz, today: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>> {
    // Inside a DST gap the wall-clock time does not exist; on a fold, take the
    // earlier of the two instants.
    today
        .and_time(time)
        .and_local_timezone(tz.clone())
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            BurstError::Config(format!("{time} does not exist on {today} in the local timezone"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn config(offsets: Vec<i64>) -> BurstConfig {
        BurstConfig {
            burst_offsets: offsets,
            ..BurstConfig::default()
        }
    }

    fn targets() -> Vec<BookingTarget> {
        vec![
            BookingTarget::new("07-22-2025", "7:33"),
            BookingTarget::new("07-22-2025", "7:42"),
        ]
    }

    fn open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 20, 23, 0, 0).unwrap()
    }

    #[test]
    fn plan_is_full_cross_product() {
        let scheduler = Scheduler::new(&config(vec![-70, -40, -10, 10, 40, 70])).unwrap();
        let jobs = scheduler.plan_at(open(), &targets()).unwrap();
        assert_eq!(jobs.len(), 12);
        for (i, job) in jobs.iter().enumerate() {
            assert_eq!(job.seq, i);
        }
    }

    #[test]
    fn fire_instant_is_window_plus_offset_for_every_target() {
        let offsets = vec![-70, -1, 0, 1, 250];
        let scheduler = Scheduler::new(&config(offsets.clone())).unwrap();
        let jobs = scheduler.plan_at(open(), &targets()).unwrap();
        for job in &jobs {
            assert_eq!(job.fire_at, open() + TimeDelta::milliseconds(job.offset_ms));
        }
        // both targets of one offset share the same instant
        for pair in jobs.chunks(2) {
            assert_eq!(pair[0].fire_at, pair[1].fire_at);
            assert_ne!(pair[0].target, pair[1].target);
        }
    }

    #[test]
    fn duplicate_offsets_produce_duplicate_jobs() {
        let scheduler = Scheduler::new(&config(vec![10, 10])).unwrap();
        let jobs = scheduler.plan_at(open(), &targets()[..1]).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].fire_at, jobs[1].fire_at);
    }

    #[test]
    fn unparsable_window_time_is_a_config_error() {
        let cfg = BurstConfig {
            booking_window_time: "11pm".into(),
            ..BurstConfig::default()
        };
        assert!(matches!(Scheduler::new(&cfg), Err(BurstError::Config(_))));
    }

    #[test]
    fn overflowing_offsets_are_a_config_error() {
        for offset in [9_000_000_000_000_000, -9_000_000_000_000_000, i64::MIN] {
            let scheduler = Scheduler::new(&config(vec![-10, offset])).unwrap();
            let planned = scheduler.plan_at(Utc::now(), &targets());
            assert!(matches!(planned, Err(BurstError::Config(_))), "offset {offset}");
        }
    }

    #[test]
    fn window_open_uses_the_given_timezone() {
        let tz = FixedOffset::west_opt(7 * 3600).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 7, 20).unwrap();
        let open = window_open_in(&tz, today, NaiveTime::from_hms_opt(23, 0, 0).unwrap()).unwrap();
        assert_eq!(open, Utc.with_ymd_and_hms(2025, 7, 21, 6, 0, 0).unwrap());
    }

    #[test]
    fn window_open_has_millisecond_resolution() {
        let scheduler = Scheduler::new(&config(vec![-10])).unwrap();
        let today = Local::now().date_naive();
        let jobs = scheduler.plan(today, &targets()[..1]).unwrap();
        let open = scheduler.window_open(today).unwrap();
        assert_eq!((open - jobs[0].fire_at).num_milliseconds(), 10);
    }
}
