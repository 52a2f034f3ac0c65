// Repository trait for sensor data access
use crate::domain::{HistoricalData, Sensor, SensorMap, Timerange};
use async_trait::async_trait;

#[async_trait]
pub trait SensorRepository: Send + Sync {
    /// List the sensors that currently report data
    async fn list_sensors(&self) -> anyhow::Result<SensorMap>;

    /// Query the historical samples of one sensor's channels over `timerange`,
    /// downsampled to at most `max_points` samples
    async fn query_historical_data(
        &self,
        sensor_id: &str,
        sensor: &Sensor,
        timerange: &Timerange,
        max_points: usize,
    ) -> anyhow::Result<HistoricalData>;
}
