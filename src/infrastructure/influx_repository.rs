// InfluxDB repository implementation
use crate::application::sensor_repository::SensorRepository;
use crate::domain::{ChannelId, HistoricalData, Sensor, SensorMap, Timerange};
use crate::infrastructure::config::{InfluxSettings, prepare_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct InfluxRepository {
    host: String,
    token: String,
    database: String,
    retention_policy: String,
    measurement: String,
    sensor_tag: String,
    history_query: String,
    catalog: SensorMap,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    #[allow(dead_code)]
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxRepository {
    /// `catalog` describes every sensor that may appear; the database only says which of
    /// them currently report data
    pub fn new(settings: InfluxSettings, catalog: SensorMap) -> Self {
        Self {
            host: settings.host.trim_end_matches('/').to_string(),
            token: settings.token,
            database: settings.database,
            retention_policy: settings.retention_policy,
            measurement: settings.measurement,
            sensor_tag: settings.sensor_tag,
            history_query: settings.history_query,
            catalog,
            client: reqwest::Client::new(),
        }
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&q={}",
            self.host, self.database, self.retention_policy, encoded_query
        )
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("Failed to parse InfluxDB response")?;

        // Check for errors in the response
        if let Some(result) = data.results.first() {
            if let Some(error) = &result.error {
                anyhow::bail!("InfluxDB query error: {}", error);
            }
        }

        Ok(data)
    }

    fn build_history_query(
        &self,
        sensor_id: &str,
        channels: &[&ChannelId],
        timerange: &Timerange,
        max_points: usize,
    ) -> String {
        let fields = channels
            .iter()
            .map(|c| format!("mean(\"{0}\") AS \"{0}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        let interval_secs = std::cmp::max(
            1,
            timerange.duration().num_seconds() / std::cmp::max(1, max_points) as i64,
        );

        let mut vars = HashMap::new();
        vars.insert("fields".to_string(), fields);
        vars.insert("measurement".to_string(), self.measurement.clone());
        vars.insert("sensor_tag".to_string(), self.sensor_tag.clone());
        vars.insert("sensor".to_string(), sensor_id.to_string());
        vars.insert(
            "start".to_string(),
            timerange.start().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        vars.insert(
            "end".to_string(),
            timerange.end().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        vars.insert("interval".to_string(), format!("{}s", interval_secs));
        prepare_query(&self.history_query, &vars)
    }
}

/// Values of a `SHOW TAG VALUES` response (rows are `[key, value]`)
fn parse_tag_values(response: &InfluxQLResponse) -> HashSet<String> {
    let mut values = HashSet::new();
    if let Some(result) = response.results.first() {
        if let Some(series) = &result.series {
            for s in series {
                for value_row in &s.values {
                    if value_row.len() >= 2 {
                        if let Some(value) = value_row[1].as_str() {
                            values.insert(value.to_string());
                        }
                    }
                }
            }
        }
    }
    values
}

/// Turn the first series of a response into synchronized samples.
///
/// Channels without a column are left out; null cells become NaN. Rows with an
/// unparseable timestamp are skipped as a whole so channels stay aligned.
fn parse_historical(
    response: &InfluxQLResponse,
    channels: &[&ChannelId],
) -> Result<HistoricalData> {
    let Some(series) = response
        .results
        .first()
        .and_then(|r| r.series.as_ref())
        .and_then(|s| s.first())
    else {
        return Ok(HistoricalData::empty());
    };

    let time_idx = series.columns.iter().position(|c| c == "time").unwrap_or(0);
    let columns: Vec<(ChannelId, usize)> = channels
        .iter()
        .filter_map(|channel| {
            series
                .columns
                .iter()
                .position(|c| c == *channel)
                .map(|idx| ((*channel).clone(), idx))
        })
        .collect();

    let mut timestamps = Vec::with_capacity(series.values.len());
    let mut values: HashMap<ChannelId, Vec<f64>> = columns
        .iter()
        .map(|(channel, _)| (channel.clone(), Vec::with_capacity(series.values.len())))
        .collect();

    for value_row in &series.values {
        let Some(time) = value_row
            .get(time_idx)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        else {
            continue;
        };
        timestamps.push(time.with_timezone(&Utc));

        for (channel, idx) in &columns {
            let value = value_row.get(*idx).and_then(|v| v.as_f64()).unwrap_or(f64::NAN);
            if let Some(samples) = values.get_mut(channel) {
                samples.push(value);
            }
        }
    }

    Ok(HistoricalData::new(timestamps, values)?)
}

#[async_trait]
impl SensorRepository for InfluxRepository {
    async fn list_sensors(&self) -> Result<SensorMap> {
        let query = format!(
            "SHOW TAG VALUES FROM \"{}\" WITH KEY = \"{}\"",
            self.measurement, self.sensor_tag
        );
        let response = self.execute_query(&query).await?;
        let reporting = parse_tag_values(&response);

        let sensors: SensorMap = self
            .catalog
            .iter()
            .filter(|(id, _)| reporting.contains(*id))
            .map(|(id, sensor)| (id.clone(), sensor.clone()))
            .collect();

        tracing::debug!(
            "{} of {} catalog sensors report data",
            sensors.len(),
            self.catalog.len()
        );
        Ok(sensors)
    }

    async fn query_historical_data(
        &self,
        sensor_id: &str,
        sensor: &Sensor,
        timerange: &Timerange,
        max_points: usize,
    ) -> Result<HistoricalData> {
        let mut channels: Vec<&ChannelId> = sensor.model.channels.keys().collect();
        channels.sort();
        if channels.is_empty() {
            return Ok(HistoricalData::empty());
        }

        let query = self.build_history_query(sensor_id, &channels, timerange, max_points);
        tracing::debug!("Executing history query: {}", query);
        let response = self.execute_query(&query).await?;

        let data = parse_historical(&response, &channels)
            .with_context(|| format!("Malformed history for sensor {}", sensor_id))?;
        Ok(data.downsample(max_points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::DEFAULT_HISTORY_QUERY;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn response(value: serde_json::Value) -> InfluxQLResponse {
        serde_json::from_value(value).unwrap()
    }

    fn repository() -> InfluxRepository {
        InfluxRepository::new(
            InfluxSettings {
                host: "http://influx:8086/".to_string(),
                token: "secret".to_string(),
                database: "building".to_string(),
                retention_policy: "autogen".to_string(),
                measurement: "readings".to_string(),
                sensor_tag: "sensor".to_string(),
                history_query: DEFAULT_HISTORY_QUERY.to_string(),
            },
            HashMap::new(),
        )
    }

    #[test]
    fn test_parse_tag_values() {
        let resp = response(json!({
            "results": [{
                "series": [{
                    "name": "readings",
                    "columns": ["key", "value"],
                    "values": [["sensor", "lobby"], ["sensor", "office"]]
                }]
            }]
        }));

        let values = parse_tag_values(&resp);
        assert_eq!(values.len(), 2);
        assert!(values.contains("lobby"));
        assert!(values.contains("office"));
    }

    #[test]
    fn test_parse_historical_aligns_channels() {
        let resp = response(json!({
            "results": [{
                "series": [{
                    "name": "readings",
                    "columns": ["time", "hum", "temp"],
                    "values": [
                        ["2024-05-01T10:00:00Z", 40.0, 21.5],
                        ["not a time", 41.0, 21.6],
                        ["2024-05-01T10:05:00Z", null, 21.7]
                    ]
                }]
            }]
        }));
        let temp = "temp".to_string();
        let hum = "hum".to_string();
        let co2 = "co2".to_string();

        let data = parse_historical(&resp, &[&co2, &hum, &temp]).unwrap();

        assert_eq!(data.count(), 2);
        assert_eq!(data.timestamps()[1], Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap());
        assert_eq!(data.channel("temp"), Some(&[21.5, 21.7][..]));
        assert!(data.channel("hum").unwrap()[1].is_nan());
        assert!(data.channel("co2").is_none());
    }

    #[test]
    fn test_parse_historical_without_series() {
        let resp = response(json!({ "results": [{}] }));
        let temp = "temp".to_string();
        assert!(parse_historical(&resp, &[&temp]).unwrap().is_empty());
    }

    #[test]
    fn test_history_query() {
        let repo = repository();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let range = Timerange::ending_at(end, Duration::hours(1));
        let hum = "hum".to_string();
        let temp = "temp".to_string();

        let query = repo.build_history_query("lobby", &[&hum, &temp], &range, 60);

        assert_eq!(
            query,
            "SELECT mean(\"hum\") AS \"hum\", mean(\"temp\") AS \"temp\" FROM \"readings\" \
             WHERE \"sensor\" = 'lobby' \
             AND time >= '2024-05-01T11:00:00Z' AND time <= '2024-05-01T12:00:00Z' \
             GROUP BY time(60s) fill(none)"
        );
    }

    #[test]
    fn test_query_url_trims_host() {
        let url = repository().build_query_url("SHOW MEASUREMENTS");
        assert_eq!(
            url,
            "http://influx:8086/query?db=building&rp=autogen&q=SHOW%20MEASUREMENTS"
        );
    }
}
