// Historical data: synchronized multi-channel samples for one sensor
use super::error::DomainError;
use super::sensor::{ChannelId, SensorId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

pub type HistoricalDataMap = HashMap<SensorId, HistoricalData>;

/// `count` samples indexed positionally: sample `i` has timestamp `timestamps[i]` and, for
/// every channel present, value `values[channel][i]`. Missing readings are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalData {
    count: usize,
    timestamps: Vec<DateTime<Utc>>,
    values: HashMap<ChannelId, Vec<f64>>,
}

impl HistoricalData {
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        values: HashMap<ChannelId, Vec<f64>>,
    ) -> Result<Self, DomainError> {
        let count = timestamps.len();
        for (channel, samples) in &values {
            if samples.len() != count {
                return Err(DomainError::SampleCountMismatch {
                    channel: channel.clone(),
                    expected: count,
                    actual: samples.len(),
                });
            }
        }

        Ok(Self {
            count,
            timestamps,
            values,
        })
    }

    pub fn empty() -> Self {
        Self {
            count: 0,
            timestamps: Vec::new(),
            values: HashMap::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn values(&self) -> &HashMap<ChannelId, Vec<f64>> {
        &self.values
    }

    pub fn channel(&self, channel_id: &str) -> Option<&[f64]> {
        self.values.get(channel_id).map(Vec::as_slice)
    }

    /// Timestamp and value of sample `index` on one channel.
    pub fn sample(&self, channel_id: &str, index: usize) -> Option<(DateTime<Utc>, f64)> {
        let time = *self.timestamps.get(index)?;
        let value = *self.values.get(channel_id)?.get(index)?;
        Some((time, value))
    }

    /// Latest sample at or before `time` on one channel, skipping missing readings.
    /// Timestamps are expected in ascending order.
    pub fn value_at(&self, channel_id: &str, time: DateTime<Utc>) -> Option<f64> {
        let samples = self.values.get(channel_id)?;
        let upto = self.timestamps.partition_point(|t| *t <= time);
        samples[..upto].iter().rev().copied().find(|v| !v.is_nan())
    }

    /// Downsample using bucket averaging across every channel.
    ///
    /// Each bucket keeps its middle timestamp. NaN samples are ignored inside a bucket; a
    /// bucket with no readings on a channel stays NaN for that channel.
    pub fn downsample(&self, max_points: usize) -> Self {
        if max_points == 0 || self.count <= max_points {
            return self.clone();
        }

        let bucket_size = (self.count as f64 / max_points as f64).ceil() as usize;
        let mut timestamps = Vec::with_capacity(max_points);
        let mut values: HashMap<ChannelId, Vec<f64>> = self
            .values
            .keys()
            .map(|k| (k.clone(), Vec::with_capacity(max_points)))
            .collect();

        for chunk_start in (0..self.count).step_by(bucket_size) {
            let chunk_end = std::cmp::min(chunk_start + bucket_size, self.count);
            let mid_idx = chunk_start + (chunk_end - chunk_start) / 2;
            timestamps.push(self.timestamps[mid_idx]);

            for (channel, samples) in &self.values {
                let readings: Vec<f64> = samples[chunk_start..chunk_end]
                    .iter()
                    .copied()
                    .filter(|v| !v.is_nan())
                    .collect();
                let avg = if readings.is_empty() {
                    f64::NAN
                } else {
                    readings.iter().sum::<f64>() / readings.len() as f64
                };
                if let Some(out) = values.get_mut(channel) {
                    out.push(avg);
                }
            }
        }

        Self {
            count: timestamps.len(),
            timestamps,
            values,
        }
    }
}

impl Default for HistoricalData {
    fn default() -> Self {
        Self::empty()
    }
}
