use thiserror::Error;

use crate::session::SessionError;

/// Burst-fatal errors. Everything else is recorded on an attempt and never
/// propagates out of the engine.
#[derive(Debug, Error)]
pub enum BurstError {
    /// The configuration could not be turned into a schedule.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No session could be acquired; nothing was scheduled.
    #[error("Session initialization failed: {0}")]
    SessionInit(#[from] SessionError),
}

impl BurstError {
    pub fn code(&self) -> &'static str {
        match self {
            BurstError::Config(_) => "CONFIG_ERROR",
            BurstError::SessionInit(_) => "SESSION_INIT_ERROR",
        }
    }
}

impl From<teetime_core::CoreError> for BurstError {
    fn from(e: teetime_core::CoreError) -> Self {
        match e {
            teetime_core::CoreError::Config(msg) => BurstError::Config(msg),
            other => BurstError::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BurstError>;
