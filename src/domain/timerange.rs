// Time span over which historical data may be queried
use super::error::DomainError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timerange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Timerange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::InvalidTimerange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The window of `length` ending at `end`. Negative lengths collapse to an instant; a
    /// length reaching past the earliest representable time starts there.
    pub fn ending_at(end: DateTime<Utc>, length: Duration) -> Self {
        let start = end
            .checked_sub_signed(length.max(Duration::zero()))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Inclusive on both ends.
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time <= self.end
    }

    pub fn clamp(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        time.clamp(self.start, self.end)
    }
}

impl fmt::Display for Timerange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
