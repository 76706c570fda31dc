use std::path::Path;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::types::{parse_time_of_day, BookingTarget, Credentials};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const ENV_PREFIX: &str = "TEETIME_";

// Burst defaults: T-70ms, T-40ms, T-10ms, T+10ms, T+40ms, T+70ms
pub const DEFAULT_BURST_OFFSETS: [i64; 6] = [-70, -40, -10, 10, 40, 70];
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 35;
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 50;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;
pub const MAX_CONCURRENT_REQUESTS: usize = 4_096;
/// Offsets further than one day from the window are dropped.
pub const MAX_BURST_OFFSET_MS: u64 = 86_400_000;
pub const DEFAULT_BOOKING_WINDOW_TIME: &str = "23:00:00";
pub const DEFAULT_CUTOFF_SECONDS: f64 = 30.0;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REJECTED_STATUS: u16 = 400;
pub const DEFAULT_NOT_OPEN_MARKER: &str = "booking not open";

pub const DEFAULT_TARGET_TIMES: [&str; 2] = ["7:33", "7:42"];
pub const DEFAULT_DAYS_IN_ADVANCE: u32 = 2;
pub const DEFAULT_PARTY_SIZE: u32 = 1;
pub const DEFAULT_COURSE: &str = "default";
pub const DEFAULT_RUN_TIME: &str = "22:59:55"; // five seconds before the window
pub const DEFAULT_LOG_FILE: &str = "tee_time_booking.log";
pub const TARGET_DATE_FORMAT: &str = "%m-%d-%Y";

/// Top-level config (config.json or *.toml + TEETIME_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeeTimeConfig {
    #[serde(default)]
    pub burst_config: BurstConfig,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default = "default_target_times")]
    pub target_times: Vec<String>,
    #[serde(default)]
    pub booking_settings: BookingSettings,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TeeTimeConfig {
    fn default() -> Self {
        Self {
            burst_config: BurstConfig::default(),
            credentials: Credentials::default(),
            target_times: default_target_times(),
            booking_settings: BookingSettings::default(),
            session: SessionConfig::default(),
            schedule: ScheduleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Burst timing, retry and classification parameters.
///
/// Immutable once a burst starts: the engine receives a clone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BurstConfig {
    /// Signed millisecond offsets around the window-open instant.
    /// Duplicates are kept and produce duplicate jobs.
    pub burst_offsets: Vec<i64>,
    pub retry_interval_ms: u64,
    pub max_retry_attempts: u32,
    /// Admission bound on simultaneous in-flight booking requests.
    pub max_concurrent_requests: usize,
    /// Local time of day at which the booking window opens (HH:MM:SS).
    pub booking_window_time: String,
    /// Per-job retry cutoff, measured from that job's own first request.
    pub cutoff_seconds: f64,
    pub request_timeout_ms: u64,
    /// Status family a "not open yet" rejection arrives with.
    pub rejected_status: u16,
    /// Case-insensitive body marker identifying a "not open yet" rejection.
    pub not_open_marker: String,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            burst_offsets: DEFAULT_BURST_OFFSETS.to_vec(),
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            booking_window_time: DEFAULT_BOOKING_WINDOW_TIME.to_string(),
            cutoff_seconds: DEFAULT_CUTOFF_SECONDS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            rejected_status: DEFAULT_REJECTED_STATUS,
            not_open_marker: DEFAULT_NOT_OPEN_MARKER.to_string(),
        }
    }
}

impl BurstConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn cutoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.cutoff_seconds)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_CUTOFF_SECONDS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingSettings {
    pub days_in_advance: u32,
    pub party_size: u32,
    pub course: String,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            days_in_advance: DEFAULT_DAYS_IN_ADVANCE,
            party_size: DEFAULT_PARTY_SIZE,
            course: DEFAULT_COURSE.to_string(),
        }
    }
}

/// Where and how a session is acquired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Site root used for login; the booking endpoint shares its origin.
    pub base_url: String,
    pub login_path: String,
    pub booking_path: String,
    /// Pre-acquired `Cookie` header. When set, no login is performed.
    pub cookie: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://golf.com".to_string(),
            login_path: "/login".to_string(),
            booking_path: "/api/booking/book".to_string(),
            cookie: None,
        }
    }
}

/// Daily trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local time of day (HH:MM:SS) at which the daily burst is launched.
    pub run_time: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            run_time: DEFAULT_RUN_TIME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append-only attempt log. `None` keeps the log on stdout only.
    pub file: Option<String>,
    /// Default tracing filter when RUST_LOG is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: Some(DEFAULT_LOG_FILE.to_string()),
            level: "info".to_string(),
        }
    }
}

fn default_target_times() -> Vec<String> {
    DEFAULT_TARGET_TIMES.iter().map(|s| s.to_string()).collect()
}

impl TeeTimeConfig {
    /// Load config from a JSON (or `.toml`) file with TEETIME_* env var
    /// overrides. Nested keys use a double underscore:
    /// `TEETIME_BURST_CONFIG__RETRY_INTERVAL_MS=40`.
    ///
    /// A missing file is not an error: every key has a default.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_FILE);
        if !Path::new(path).exists() {
            warn!(%path, "configuration file not found, using default settings");
        }

        let figment = if path.ends_with(".toml") {
            Figment::new().merge(Toml::file(path))
        } else {
            Figment::new().merge(Json::file(path))
        };

        let config: TeeTimeConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        Ok(config.sanitize())
    }

    /// Like [`TeeTimeConfig::load`], but never fails: a malformed source
    /// logs a warning and yields the defaults.
    pub fn load_or_default(config_path: Option<&str>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Config load failed ({}), using defaults", e);
            Self::default()
        })
    }

    /// Replace semantically invalid values with their defaults, one warning
    /// per replaced field.
    pub fn sanitize(mut self) -> Self {
        let burst = &mut self.burst_config;

        let configured = burst.burst_offsets.len();
        burst
            .burst_offsets
            .retain(|offset| offset.unsigned_abs() <= MAX_BURST_OFFSET_MS);
        if burst.burst_offsets.len() < configured {
            warn!(
                dropped = configured - burst.burst_offsets.len(),
                "burst_offsets beyond one day of the window dropped"
            );
        }
        if burst.burst_offsets.is_empty() {
            warn!("burst_offsets is empty, using defaults");
            burst.burst_offsets = DEFAULT_BURST_OFFSETS.to_vec();
        }
        if burst.max_concurrent_requests == 0 {
            warn!("max_concurrent_requests must be at least 1, using default");
            burst.max_concurrent_requests = DEFAULT_MAX_CONCURRENT_REQUESTS;
        }
        if burst.max_concurrent_requests > MAX_CONCURRENT_REQUESTS {
            warn!(
                max_concurrent_requests = burst.max_concurrent_requests,
                "max_concurrent_requests too large, clamping to {MAX_CONCURRENT_REQUESTS}"
            );
            burst.max_concurrent_requests = MAX_CONCURRENT_REQUESTS;
        }
        if !burst.cutoff_seconds.is_finite() || burst.cutoff_seconds <= 0.0 {
            warn!(
                cutoff_seconds = burst.cutoff_seconds,
                "cutoff_seconds must be positive, using default"
            );
            burst.cutoff_seconds = DEFAULT_CUTOFF_SECONDS;
        }
        if burst.request_timeout_ms == 0 {
            warn!("request_timeout_ms must be positive, using default");
            burst.request_timeout_ms = DEFAULT_REQUEST_TIMEOUT_MS;
        }
        // A stalled request must never outlive the retry cutoff.
        let cutoff_ms = (burst.cutoff_seconds * 1000.0) as u64;
        if cutoff_ms > 0 && burst.request_timeout_ms >= cutoff_ms {
            let clamped = (cutoff_ms / 2).max(1);
            warn!(
                request_timeout_ms = burst.request_timeout_ms,
                clamped, "request timeout exceeds retry cutoff, clamping"
            );
            burst.request_timeout_ms = clamped;
        }
        if let Err(e) = parse_time_of_day(&burst.booking_window_time) {
            warn!("booking_window_time: {e}, using default");
            burst.booking_window_time = DEFAULT_BOOKING_WINDOW_TIME.to_string();
        }
        if burst.not_open_marker.trim().is_empty() {
            warn!("not_open_marker is empty, using default");
            burst.not_open_marker = DEFAULT_NOT_OPEN_MARKER.to_string();
        }

        if self.target_times.is_empty() {
            warn!("target_times is empty, using defaults");
            self.target_times = default_target_times();
        }
        if self.booking_settings.party_size == 0 {
            warn!("party_size must be at least 1, using default");
            self.booking_settings.party_size = DEFAULT_PARTY_SIZE;
        }
        if let Err(e) = parse_time_of_day(&self.schedule.run_time) {
            warn!("schedule.run_time: {e}, using default");
            self.schedule.run_time = DEFAULT_RUN_TIME.to_string();
        }

        self
    }

    /// The date being booked: `today + days_in_advance`, as `MM-DD-YYYY`.
    pub fn target_date(&self, today: NaiveDate) -> String {
        today
            .checked_add_days(Days::new(self.booking_settings.days_in_advance as u64))
            .unwrap_or(today)
            .format(TARGET_DATE_FORMAT)
            .to_string()
    }

    /// One [`BookingTarget`] per configured slot label, all on `date`.
    pub fn targets_for(&self, date: &str) -> Vec<BookingTarget> {
        self.target_times
            .iter()
            .map(|slot| BookingTarget::new(date, slot.clone()))
            .collect()
    }
}
