// Data view trait - The read-only query surface of a sensor data backend
use crate::application::event_bus::{Dispatch, EventBus, Listener};
use crate::application::events::{DataViewEvent, EventKind};
use crate::domain::{ChannelId, HistoricalDataMap, SensorId, SensorMap, Timerange};
use chrono::{DateTime, Utc};

/// Accessors a concrete sensor data backend must provide, plus the notification hooks that
/// tell consumers when a previously returned value is stale.
///
/// Every accessor returns a fresh snapshot. Consumers re-call accessors after the matching
/// event fires instead of polling or holding on to old results. Backends keep the following
/// relation true whenever an event is delivered:
///
/// - every key of `historical_data()` is a key of `sensors()`
/// - `current_time()` lies within `timerange()`
/// - `current_sensor_id()` is `None` or a key of `sensors()`
/// - `current_channel_id()` is `None` or a channel of the current sensor's model
///
/// Fetch failures are reported through [`EventKind::Error`] while the accessors keep
/// returning the last known good data.
pub trait DataView: Send + Sync {
    /// Span for which historical data may currently be queried
    fn timerange(&self) -> Timerange;

    /// All sensors currently in scope
    fn sensors(&self) -> SensorMap;

    /// Historical samples for the current time range, keyed by sensor
    fn historical_data(&self) -> HistoricalDataMap;

    /// Instant selected for "current value" display
    fn current_time(&self) -> DateTime<Utc>;

    /// Focused sensor, `None` when nothing is selected
    fn current_sensor_id(&self) -> Option<SensorId>;

    /// Focused channel of the focused sensor's model
    fn current_channel_id(&self) -> Option<ChannelId>;

    fn event_bus(&self) -> &EventBus;

    fn add_event_listener(&self, kind: EventKind, listener: Listener) -> bool {
        self.event_bus().add_event_listener(kind, listener)
    }

    fn remove_event_listener(&self, kind: EventKind, listener: &Listener) -> bool {
        self.event_bus().remove_event_listener(kind, listener)
    }

    fn trigger_event(&self, event: DataViewEvent) -> Dispatch {
        self.event_bus().trigger_event(&event)
    }
}
