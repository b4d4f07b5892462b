use thiserror::Error;

pub const EMPTY_INPUT_MESSAGE: &str = "Enter a time (e.g., 25m or 1:30:00)";
pub const INVALID_INPUT_MESSAGE: &str = "Invalid time (try 25m or 1:30:00)";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TimerError {
    #[error("no recognizable duration in '{input}'")]
    InvalidFormat { input: String },
    #[error("duration must be a positive, finite number of seconds (got {value})")]
    InvalidDuration { value: f64 },
    #[error("history store {path}: {reason}")]
    Persistence { path: String, reason: String },
}

impl TimerError {
    /// Short message suitable for a notice shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            TimerError::InvalidFormat { input } if input.trim().is_empty() => {
                EMPTY_INPUT_MESSAGE.to_string()
            }
            TimerError::InvalidFormat { .. } | TimerError::InvalidDuration { .. } => {
                INVALID_INPUT_MESSAGE.to_string()
            }
            TimerError::Persistence { reason, .. } => {
                format!("History unavailable, continuing without it ({reason})")
            }
        }
    }
}
