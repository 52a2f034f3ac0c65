// Consistency checks over a captured data view state
use crate::application::data_view::DataView;
use crate::domain::{ChannelId, HistoricalDataMap, SensorId, SensorMap, Timerange};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A broken link between the selection state and the data collections.
///
/// Channel ranges and sample alignment are enforced by the entity constructors and are
/// not re-checked here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("historical data for sensor '{0}' has no matching sensor")]
    OrphanHistoricalData(SensorId),

    #[error("current time {time} is outside {timerange}")]
    CurrentTimeOutOfRange {
        time: DateTime<Utc>,
        timerange: Timerange,
    },

    #[error("current sensor '{0}' is not among the sensors")]
    UnknownCurrentSensor(SensorId),

    #[error("current channel '{channel}' is not a channel of sensor '{sensor}'")]
    UnknownCurrentChannel { sensor: SensorId, channel: ChannelId },

    #[error("current channel '{0}' is set while no sensor is selected")]
    ChannelWithoutSensor(ChannelId),
}

/// Everything a data view returns at one moment
#[derive(Debug, Clone)]
pub struct DataViewSnapshot {
    pub timerange: Timerange,
    pub sensors: SensorMap,
    pub historical_data: HistoricalDataMap,
    pub current_time: DateTime<Utc>,
    pub current_sensor_id: Option<SensorId>,
    pub current_channel_id: Option<ChannelId>,
}

impl DataViewSnapshot {
    pub fn capture(view: &dyn DataView) -> Self {
        Self {
            timerange: view.timerange(),
            sensors: view.sensors(),
            historical_data: view.historical_data(),
            current_time: view.current_time(),
            current_sensor_id: view.current_sensor_id(),
            current_channel_id: view.current_channel_id(),
        }
    }

    /// Every violated invariant, in a stable order
    pub fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        let mut history_ids: Vec<&SensorId> = self.historical_data.keys().collect();
        history_ids.sort();
        for id in history_ids {
            if !self.sensors.contains_key(id) {
                violations.push(Violation::OrphanHistoricalData(id.clone()));
            }
        }

        if !self.timerange.contains(self.current_time) {
            violations.push(Violation::CurrentTimeOutOfRange {
                time: self.current_time,
                timerange: self.timerange,
            });
        }

        match (&self.current_sensor_id, &self.current_channel_id) {
            (Some(sensor_id), channel) => match self.sensors.get(sensor_id) {
                None => violations.push(Violation::UnknownCurrentSensor(sensor_id.clone())),
                Some(sensor) => {
                    if let Some(channel_id) = channel {
                        if !sensor.model.has_channel(channel_id) {
                            violations.push(Violation::UnknownCurrentChannel {
                                sensor: sensor_id.clone(),
                                channel: channel_id.clone(),
                            });
                        }
                    }
                }
            },
            (None, Some(channel_id)) => {
                violations.push(Violation::ChannelWithoutSensor(channel_id.clone()))
            }
            (None, None) => {}
        }

        violations
    }

    pub fn is_consistent(&self) -> bool {
        self.violations().is_empty()
    }
}

/// Capture `view` and return its violations
pub fn check_consistency(view: &dyn DataView) -> Vec<Violation> {
    DataViewSnapshot::capture(view).violations()
}
