// Refresh service - Pulls sensor data out-of-band and publishes it through a data view
use crate::application::data_view::DataView;
use crate::application::events::FetchFailure;
use crate::application::memory_view::MemoryDataView;
use crate::application::sensor_repository::SensorRepository;
use crate::domain::{HistoricalDataMap, Timerange};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Summary of one refresh pass
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub sensor_count: usize,
    pub series_count: usize,
    pub failures: Vec<FetchFailure>,
}

#[derive(Clone)]
pub struct RefreshService {
    repository: Arc<dyn SensorRepository>,
    view: Arc<MemoryDataView>,
    window: Duration,
    max_points: usize,
}

impl RefreshService {
    pub fn new(
        repository: Arc<dyn SensorRepository>,
        view: Arc<MemoryDataView>,
        window: Duration,
        max_points: usize,
    ) -> Self {
        Self {
            repository,
            view,
            window,
            max_points,
        }
    }

    /// Refresh sensors, then move the window to end at `now` and refresh its history.
    ///
    /// When the sensor listing fails the history pass is skipped, so the view keeps
    /// showing the last known good data alongside the error.
    pub async fn refresh(&self, now: DateTime<Utc>) -> RefreshReport {
        let start_time = Instant::now();

        if let Err(failure) = self.refresh_sensors().await {
            return RefreshReport {
                sensor_count: self.view.sensors().len(),
                series_count: self.view.historical_data().len(),
                failures: vec![failure],
            };
        }

        let report = self.refresh_historical_data(now).await;
        tracing::info!(
            "Refreshed {} sensors, {} series, {} failures in {} ms",
            report.sensor_count,
            report.series_count,
            report.failures.len(),
            start_time.elapsed().as_millis()
        );
        report
    }

    /// Replace the view's sensors with the repository's current listing
    pub async fn refresh_sensors(&self) -> Result<(), FetchFailure> {
        match self.repository.list_sensors().await {
            Ok(sensors) => {
                tracing::debug!("Repository listed {} sensors", sensors.len());
                self.view.replace_sensors(sensors);
                Ok(())
            }
            Err(e) => {
                let failure = FetchFailure::new("list_sensors", None, format!("{:#}", e));
                self.view.report_error(failure.clone());
                Err(failure)
            }
        }
    }

    /// Query history for every sensor in the view over the window ending at `now`.
    ///
    /// A sensor whose query fails keeps its previous series.
    pub async fn refresh_historical_data(&self, now: DateTime<Utc>) -> RefreshReport {
        let timerange = Timerange::ending_at(now, self.window);
        let sensors = self.view.sensors();
        let previous = self.view.historical_data();

        let mut handles = Vec::with_capacity(sensors.len());
        for (sensor_id, sensor) in &sensors {
            let repo = self.repository.clone();
            let id = sensor_id.clone();
            let sensor = sensor.clone();
            let max_points = self.max_points;

            let handle = tokio::spawn(async move {
                repo.query_historical_data(&id, &sensor, &timerange, max_points)
                    .await
            });
            handles.push((sensor_id.clone(), handle));
        }

        let mut data = HashMap::with_capacity(handles.len());
        let mut failures = Vec::new();
        for (sensor_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("query task failed: {}", e)),
            };

            match result {
                Ok(series) => {
                    data.insert(sensor_id, series);
                }
                Err(e) => {
                    tracing::warn!("History query for sensor {} failed: {:#}", sensor_id, e);
                    if let Some(old) = previous.get(&sensor_id) {
                        data.insert(sensor_id.clone(), old.clone());
                    }
                    failures.push(FetchFailure::new(
                        "query_historical_data",
                        Some(sensor_id),
                        format!("{:#}", e),
                    ));
                }
            }
        }

        // Sensors may have been replaced while the queries were in flight
        let current = self.view.sensors();
        data.retain(|id, _| current.contains_key(id));

        let series_count = data.len();
        let published = self.publish(timerange, data);

        // Errors go out after the data so they are the most recent notice
        for failure in &failures {
            self.view.report_error(failure.clone());
        }
        if let Err(failure) = published {
            failures.push(failure);
        }

        RefreshReport {
            sensor_count: current.len(),
            series_count,
            failures,
        }
    }

    /// Hand a refreshed window to the view. A rejection is reported as an `error` event.
    fn publish(&self, timerange: Timerange, data: HistoricalDataMap) -> Result<(), FetchFailure> {
        self.view
            .replace_historical_data(timerange, data)
            .map_err(|e| {
                let failure = FetchFailure::new("replace_historical_data", None, e.to_string());
                self.view.report_error(failure.clone());
                failure
            })
    }

    /// Refresh on every tick of `interval` until the task is dropped
    pub async fn run(self, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.refresh(Utc::now()).await;
        }
    }
}
