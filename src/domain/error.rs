// Errors raised when an entity would violate its own invariants
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("channel '{name}' has min {min} greater than max {max}")]
    InvalidChannelRange { name: String, min: f64, max: f64 },

    #[error("time range start {start} is after end {end}")]
    InvalidTimerange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("channel '{channel}' has {actual} samples, expected {expected}")]
    SampleCountMismatch {
        channel: String,
        expected: usize,
        actual: usize,
    },
}
