use crate::domain::{Channel, Location, Model, Sensor, SensorMap};
use anyhow::{Context, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_HISTORY_QUERY: &str = "SELECT ${fields} FROM \"${measurement}\" \
     WHERE \"${sensor_tag}\" = '${sensor}' AND time >= '${start}' AND time <= '${end}' \
     GROUP BY time(${interval}) fill(none)";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub influx: InfluxSettings,
    #[serde(default)]
    pub refresh: RefreshSettings,
    /// Standalone TOML catalog, used instead of `[catalog]` when set
    #[serde(default)]
    pub catalog_file: Option<String>,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    pub measurement: String,
    #[serde(default = "default_sensor_tag")]
    pub sensor_tag: String,
    #[serde(default = "default_history_query")]
    pub history_query: String,
}

fn default_sensor_tag() -> String {
    "sensor".to_string()
}

fn default_history_query() -> String {
    DEFAULT_HISTORY_QUERY.to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RefreshSettings {
    pub interval_secs: u64,
    pub window_hours: i64,
    pub max_points: usize,
}

impl RefreshSettings {
    /// History window length, rejecting values chrono cannot place before now
    pub fn window(&self) -> anyhow::Result<chrono::Duration> {
        let window = chrono::Duration::try_hours(self.window_hours)
            .filter(|w| *w >= chrono::Duration::zero())
            .with_context(|| format!("Invalid refresh window of {} hours", self.window_hours))?;
        if chrono::Utc::now().checked_sub_signed(window).is_none() {
            bail!(
                "Refresh window of {} hours reaches before the earliest representable time",
                self.window_hours
            );
        }
        Ok(window)
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            window_hours: 24,
            max_points: 150,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,
    #[serde(default)]
    pub sensors: HashMap<String, SensorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(rename = "type", default = "default_channel_type")]
    pub kind: String,
    #[serde(default)]
    pub unit: String,
    pub min: f64,
    pub max: f64,
}

fn default_channel_type() -> String {
    "double".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    pub model: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub location: LocationConfig,
    pub surface_db_id: Option<i64>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct LocationConfig {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl AppConfig {
    /// Build the sensor catalog from `catalog_file` if set, from `[catalog]` otherwise
    pub fn resolve_catalog(&self) -> anyhow::Result<SensorMap> {
        match &self.catalog_file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read catalog file {}", path))?;
                build_catalog(&parse_catalog(&text)?)
            }
            None => build_catalog(&self.catalog),
        }
    }
}

/// Load `<base>.toml` (or any format the config crate recognises) with `DATAVIEW__*`
/// environment overrides, e.g. `DATAVIEW__INFLUX__TOKEN`
pub fn load_config(base: &str) -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(base))
        .add_source(
            config::Environment::with_prefix("DATAVIEW")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn parse_catalog(text: &str) -> anyhow::Result<CatalogConfig> {
    toml::from_str(text).context("Failed to parse sensor catalog")
}

/// Turn catalog settings into sensors sharing their models
pub fn build_catalog(catalog: &CatalogConfig) -> anyhow::Result<SensorMap> {
    let mut models = HashMap::with_capacity(catalog.models.len());
    for (model_id, model_config) in &catalog.models {
        let mut channels = HashMap::with_capacity(model_config.channels.len());
        for (channel_id, c) in &model_config.channels {
            let channel = Channel::new(
                c.name.clone(),
                c.desc.clone(),
                c.kind.clone(),
                c.unit.clone(),
                c.min,
                c.max,
            )
            .with_context(|| format!("Invalid channel {}.{}", model_id, channel_id))?;
            channels.insert(channel_id.clone(), channel);
        }

        let model = Model::new(model_config.name.clone(), model_config.desc.clone(), channels);
        models.insert(model_id.clone(), Arc::new(model));
    }

    let mut sensors = HashMap::with_capacity(catalog.sensors.len());
    for (sensor_id, s) in &catalog.sensors {
        let Some(model) = models.get(&s.model) else {
            bail!("Sensor {} references unknown model {}", sensor_id, s.model);
        };

        sensors.insert(
            sensor_id.clone(),
            Sensor::new(
                model.clone(),
                s.name.clone(),
                s.desc.clone(),
                Location::new(s.location.x, s.location.y, s.location.z),
                s.surface_db_id,
            ),
        );
    }

    Ok(sensors)
}

/// Replace template variables in a query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[models.env]
name = "Environment"
desc = "Temperature and humidity"

[models.env.channels.temp]
name = "Temperature"
unit = "°C"
min = 18.0
max = 28.0

[models.env.channels.hum]
name = "Humidity"
type = "double"
unit = "%"
min = 0.0
max = 100.0

[sensors.lobby]
model = "env"
name = "Lobby"
location = { x = 1.0, y = 2.5, z = 0.0 }
surface_db_id = 42

[sensors.office]
model = "env"
name = "Office"
"#;

    #[test]
    fn test_prepare_query() {
        let mut vars = HashMap::new();
        vars.insert("sensor".to_string(), "lobby".to_string());
        vars.insert("interval".to_string(), "60s".to_string());

        let query = "SELECT mean(\"temp\") FROM readings \
                     WHERE \"sensor\" = '${sensor}' GROUP BY time(${interval})";
        let result = prepare_query(query, &vars);

        assert_eq!(
            result,
            "SELECT mean(\"temp\") FROM readings WHERE \"sensor\" = 'lobby' GROUP BY time(60s)"
        );
    }

    #[test]
    fn test_build_catalog_shares_models() {
        let sensors = build_catalog(&parse_catalog(CATALOG).unwrap()).unwrap();

        assert_eq!(sensors.len(), 2);
        let lobby = &sensors["lobby"];
        let office = &sensors["office"];
        assert!(Arc::ptr_eq(&lobby.model, &office.model));
        assert_eq!(lobby.surface_db_id, Some(42));
        assert_eq!(lobby.location, Location::new(1.0, 2.5, 0.0));
        assert_eq!(office.surface_db_id, None);
        assert_eq!(lobby.model.channels["temp"].kind(), "double");
        assert_eq!(lobby.model.channels["hum"].max(), 100.0);
    }

    #[test]
    fn test_build_catalog_rejects_unknown_model() {
        let mut catalog = parse_catalog(CATALOG).unwrap();
        catalog.sensors.get_mut("office").unwrap().model = "hvac".to_string();

        let err = build_catalog(&catalog).unwrap_err();
        assert!(err.to_string().contains("unknown model hvac"));
    }

    #[test]
    fn test_build_catalog_rejects_inverted_channel() {
        let mut catalog = parse_catalog(CATALOG).unwrap();
        let channel = catalog
            .models
            .get_mut("env")
            .unwrap()
            .channels
            .get_mut("temp")
            .unwrap();
        channel.min = 40.0;

        let err = build_catalog(&catalog).unwrap_err();
        assert!(err.to_string().contains("env.temp"));
    }

    #[test]
    fn test_refresh_window_validation() {
        let mut refresh = RefreshSettings::default();
        assert_eq!(refresh.window().unwrap(), chrono::Duration::hours(24));

        refresh.window_hours = -1;
        assert!(refresh.window().is_err());

        refresh.window_hours = i64::MAX;
        assert!(refresh.window().is_err());

        refresh.window_hours = 24 * 365 * 1_000_000;
        assert!(refresh.window().is_err());
    }

    #[test]
    fn test_refresh_defaults() {
        let refresh = RefreshSettings::default();
        assert_eq!(refresh.interval_secs, 60);
        assert_eq!(refresh.window_hours, 24);
        assert_eq!(refresh.max_points, 150);
    }
}
