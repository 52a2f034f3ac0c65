// Data view events - Kinds and typed payloads
use crate::domain::{ChannelId, HistoricalDataMap, SensorId, SensorMap, Timerange};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Closed set of event kinds a data view can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    SensorsChanged,
    HistoricalDataChanged,
    CurrentTimeChanged,
    CurrentSensorChanged,
    CurrentChannelChanged,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::SensorsChanged,
        EventKind::HistoricalDataChanged,
        EventKind::CurrentTimeChanged,
        EventKind::CurrentSensorChanged,
        EventKind::CurrentChannelChanged,
        EventKind::Error,
    ];

    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SensorsChanged => "sensors-changed",
            EventKind::HistoricalDataChanged => "historical-data-changed",
            EventKind::CurrentTimeChanged => "current-time-changed",
            EventKind::CurrentSensorChanged => "current-sensor-changed",
            EventKind::CurrentChannelChanged => "current-channel-changed",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Payload of the `error` event: a recoverable fetch failure in a backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    /// What the backend was doing, e.g. "list_sensors"
    pub operation: String,
    pub sensor_id: Option<SensorId>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl FetchFailure {
    pub fn new(
        operation: impl Into<String>,
        sensor_id: Option<SensorId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            sensor_id,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sensor_id {
            Some(id) => write!(f, "{} failed for sensor {}: {}", self.operation, id, self.message),
            None => write!(f, "{} failed: {}", self.operation, self.message),
        }
    }
}

/// Event emitted by a data view.
///
/// Every event signals that a previously returned accessor value may be stale. The payload
/// is a snapshot shaped like the accessor it invalidates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum DataViewEvent {
    SensorsChanged(SensorMap),
    HistoricalDataChanged {
        timerange: Timerange,
        data: HistoricalDataMap,
    },
    CurrentTimeChanged(DateTime<Utc>),
    CurrentSensorChanged(Option<SensorId>),
    CurrentChannelChanged(Option<ChannelId>),
    Error(FetchFailure),
}

impl DataViewEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DataViewEvent::SensorsChanged(_) => EventKind::SensorsChanged,
            DataViewEvent::HistoricalDataChanged { .. } => EventKind::HistoricalDataChanged,
            DataViewEvent::CurrentTimeChanged(_) => EventKind::CurrentTimeChanged,
            DataViewEvent::CurrentSensorChanged(_) => EventKind::CurrentSensorChanged,
            DataViewEvent::CurrentChannelChanged(_) => EventKind::CurrentChannelChanged,
            DataViewEvent::Error(_) => EventKind::Error,
        }
    }

    /// Short description for logging
    pub fn description(&self) -> String {
        match self {
            DataViewEvent::SensorsChanged(sensors) => format!("{} sensors", sensors.len()),
            DataViewEvent::HistoricalDataChanged { timerange, data } => {
                format!("{} series over {}", data.len(), timerange)
            }
            DataViewEvent::CurrentTimeChanged(time) => {
                format!("current time {}", time.to_rfc3339())
            }
            DataViewEvent::CurrentSensorChanged(Some(id)) => format!("sensor {}", id),
            DataViewEvent::CurrentSensorChanged(None) => "no sensor".to_string(),
            DataViewEvent::CurrentChannelChanged(Some(id)) => format!("channel {}", id),
            DataViewEvent::CurrentChannelChanged(None) => "no channel".to_string(),
            DataViewEvent::Error(failure) => failure.to_string(),
        }
    }
}
