// Errors for rejected data view mutations
use crate::application::consistency::Violation;
use crate::domain::{ChannelId, DomainError, SensorId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataViewError {
    #[error("unknown sensor '{0}'")]
    UnknownSensor(SensorId),

    #[error("sensor '{sensor}' has no channel '{channel}'")]
    UnknownChannel { sensor: SensorId, channel: ChannelId },

    #[error("no sensor is selected")]
    NoSensorSelected,

    #[error(transparent)]
    Inconsistent(#[from] Violation),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
