// Sensor, model and channel domain models
use super::error::DomainError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub type SensorId = String;
pub type ChannelId = String;
pub type SensorMap = HashMap<SensorId, Sensor>;

/// A measurable quantity a sensor model can report, with its declared range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    name: String,
    desc: String,
    #[serde(rename = "type")]
    kind: String,
    unit: String,
    min: f64,
    max: f64,
}

impl Channel {
    pub fn new(
        name: String,
        desc: String,
        kind: String,
        unit: String,
        min: f64,
        max: f64,
    ) -> Result<Self, DomainError> {
        // Also rejects NaN bounds
        if !(min <= max) {
            return Err(DomainError::InvalidChannelRange { name, min, max });
        }

        Ok(Self {
            name,
            desc,
            kind,
            unit,
            min,
            max,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Descriptive type tag (e.g. "double"), not enforced here.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A sensor type definition: the set of channels any sensor of that type produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub name: String,
    pub desc: String,
    pub channels: HashMap<ChannelId, Channel>,
}

impl Model {
    pub fn new(name: String, desc: String, channels: HashMap<ChannelId, Channel>) -> Self {
        Self {
            name,
            desc,
            channels,
        }
    }

    pub fn has_channel(&self, channel_id: &str) -> bool {
        self.channels.contains_key(channel_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A placed instance of a model. The model is shared, never owned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensor {
    pub model: Arc<Model>,
    pub name: String,
    pub desc: String,
    pub location: Location,
    /// `None` means no renderable surface is associated with the sensor
    pub surface_db_id: Option<i64>,
}

impl Sensor {
    pub fn new(
        model: Arc<Model>,
        name: String,
        desc: String,
        location: Location,
        surface_db_id: Option<i64>,
    ) -> Self {
        Self {
            model,
            name,
            desc,
            location,
            surface_db_id,
        }
    }
}
