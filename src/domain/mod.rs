// Domain layer - Sensor entities and their invariants
pub mod error;
pub mod historical;
pub mod sensor;
pub mod timerange;

pub use error::DomainError;
pub use historical::{HistoricalData, HistoricalDataMap};
pub use sensor::{Channel, ChannelId, Location, Model, Sensor, SensorId, SensorMap};
pub use timerange::Timerange;
