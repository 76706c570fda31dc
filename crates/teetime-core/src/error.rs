use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid time of day {0}")]
    InvalidTime(String),
}

impl CoreError {
    /// Short error code string used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::InvalidTime(_) => "INVALID_TIME",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
