use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriggerError {
    /// The run time is not a valid `HH:MM:SS` time of day.
    #[error("Invalid run time: {0}")]
    InvalidRunTime(String),
}

pub type Result<T> = std::result::Result<T, TriggerError>;
