// In-memory data view - Last known good state plus validating mutators
use crate::application::consistency::{DataViewSnapshot, Violation};
use crate::application::data_view::DataView;
use crate::application::error::DataViewError;
use crate::application::event_bus::EventBus;
use crate::application::events::{DataViewEvent, FetchFailure};
use crate::domain::{ChannelId, HistoricalDataMap, SensorId, SensorMap, Timerange};
use chrono::{DateTime, Utc};
use parking_lot::{ReentrantMutex, RwLock};
use std::collections::HashMap;

/// Every mutator either rejects the change or applies it together with the cascading
/// selection updates it implies, then triggers the matching events once the state lock is
/// released, so listeners can re-read the accessors from inside a callback.
///
/// Mutations are serialized from the state change through the end of their dispatch, so
/// listeners see events in the order the changes were applied even when several threads
/// mutate at once. The lock is reentrant: a listener may itself call a mutator.
pub struct MemoryDataView {
    state: RwLock<DataViewSnapshot>,
    bus: EventBus,
    ordering: ReentrantMutex<()>,
}

impl MemoryDataView {
    /// Empty view over `timerange`, with the current time at its end
    pub fn new(timerange: Timerange) -> Self {
        Self::with_sensors(timerange, HashMap::new())
    }

    pub fn with_sensors(timerange: Timerange, sensors: SensorMap) -> Self {
        Self {
            state: RwLock::new(DataViewSnapshot {
                timerange,
                sensors,
                historical_data: HashMap::new(),
                current_time: timerange.end(),
                current_sensor_id: None,
                current_channel_id: None,
            }),
            bus: EventBus::new(),
            ordering: ReentrantMutex::new(()),
        }
    }

    pub fn snapshot(&self) -> DataViewSnapshot {
        self.state.read().clone()
    }

    /// Replace the sensor set.
    ///
    /// Historical data of removed sensors is dropped, and a selection pointing at a removed
    /// sensor (or at a channel its new model lacks) is cleared.
    pub fn replace_sensors(&self, sensors: SensorMap) {
        let _ordering = self.ordering.lock();
        let events = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            state.sensors = sensors;
            let mut events = vec![DataViewEvent::SensorsChanged(state.sensors.clone())];

            let before = state.historical_data.len();
            let sensors = &state.sensors;
            state.historical_data.retain(|id, _| sensors.contains_key(id));
            if state.historical_data.len() != before {
                events.push(DataViewEvent::HistoricalDataChanged {
                    timerange: state.timerange,
                    data: state.historical_data.clone(),
                });
            }

            let selected = state
                .current_sensor_id
                .as_ref()
                .and_then(|id| state.sensors.get(id));
            match selected {
                None if state.current_sensor_id.is_some() => {
                    state.current_sensor_id = None;
                    events.push(DataViewEvent::CurrentSensorChanged(None));
                    if state.current_channel_id.take().is_some() {
                        events.push(DataViewEvent::CurrentChannelChanged(None));
                    }
                }
                Some(sensor) => {
                    let keeps_channel = state
                        .current_channel_id
                        .as_ref()
                        .is_none_or(|ch| sensor.model.has_channel(ch));
                    if !keeps_channel {
                        state.current_channel_id = None;
                        events.push(DataViewEvent::CurrentChannelChanged(None));
                    }
                }
                None => {}
            }

            events
        };

        self.dispatch(events);
    }

    /// Replace the time range and the historical data that covers it.
    ///
    /// Rejected if any series belongs to an unknown sensor. The current time is clamped
    /// into the new range.
    pub fn replace_historical_data(
        &self,
        timerange: Timerange,
        data: HistoricalDataMap,
    ) -> Result<(), DataViewError> {
        let _ordering = self.ordering.lock();
        let events = {
            let mut state = self.state.write();

            let mut orphans: Vec<&SensorId> = data
                .keys()
                .filter(|id| !state.sensors.contains_key(*id))
                .collect();
            orphans.sort();
            if let Some(orphan) = orphans.first() {
                return Err(Violation::OrphanHistoricalData((*orphan).clone()).into());
            }

            state.timerange = timerange;
            state.historical_data = data;
            let mut events = vec![DataViewEvent::HistoricalDataChanged {
                timerange,
                data: state.historical_data.clone(),
            }];

            let clamped = timerange.clamp(state.current_time);
            if clamped != state.current_time {
                state.current_time = clamped;
                events.push(DataViewEvent::CurrentTimeChanged(clamped));
            }

            events
        };

        self.dispatch(events);
        Ok(())
    }

    pub fn set_current_time(&self, time: DateTime<Utc>) -> Result<(), DataViewError> {
        let _ordering = self.ordering.lock();
        {
            let mut state = self.state.write();
            if !state.timerange.contains(time) {
                return Err(Violation::CurrentTimeOutOfRange {
                    time,
                    timerange: state.timerange,
                }
                .into());
            }
            if state.current_time == time {
                return Ok(());
            }
            state.current_time = time;
        }

        self.dispatch(vec![DataViewEvent::CurrentTimeChanged(time)]);
        Ok(())
    }

    /// Focus a sensor, or clear the focus with `None`.
    ///
    /// The current channel is kept when the new sensor's model has it, cleared otherwise.
    pub fn select_sensor(&self, sensor_id: Option<SensorId>) -> Result<(), DataViewError> {
        let _ordering = self.ordering.lock();
        let events = {
            let mut state = self.state.write();
            if state.current_sensor_id == sensor_id {
                return Ok(());
            }

            if let Some(id) = &sensor_id {
                if !state.sensors.contains_key(id) {
                    return Err(DataViewError::UnknownSensor(id.clone()));
                }
            }

            let keeps_channel = match (&sensor_id, &state.current_channel_id) {
                (_, None) => true,
                (None, Some(_)) => false,
                (Some(id), Some(channel)) => state
                    .sensors
                    .get(id)
                    .is_some_and(|sensor| sensor.model.has_channel(channel)),
            };

            state.current_sensor_id = sensor_id.clone();
            let mut events = vec![DataViewEvent::CurrentSensorChanged(sensor_id)];
            if !keeps_channel {
                state.current_channel_id = None;
                events.push(DataViewEvent::CurrentChannelChanged(None));
            }
            events
        };

        self.dispatch(events);
        Ok(())
    }

    /// Focus a channel of the current sensor, or clear the focus with `None`
    pub fn select_channel(&self, channel_id: Option<ChannelId>) -> Result<(), DataViewError> {
        let _ordering = self.ordering.lock();
        {
            let mut state = self.state.write();
            if state.current_channel_id == channel_id {
                return Ok(());
            }

            if let Some(channel) = &channel_id {
                let sensor_id = state
                    .current_sensor_id
                    .clone()
                    .ok_or(DataViewError::NoSensorSelected)?;
                let has_channel = state
                    .sensors
                    .get(&sensor_id)
                    .is_some_and(|sensor| sensor.model.has_channel(channel));
                if !has_channel {
                    return Err(DataViewError::UnknownChannel {
                        sensor: sensor_id,
                        channel: channel.clone(),
                    });
                }
            }

            state.current_channel_id = channel_id.clone();
        }

        self.dispatch(vec![DataViewEvent::CurrentChannelChanged(channel_id)]);
        Ok(())
    }

    /// Report a recoverable fetch failure. The data already held stays in place.
    pub fn report_error(&self, failure: FetchFailure) {
        let _ordering = self.ordering.lock();
        tracing::warn!("Data view fetch failure: {}", failure);
        self.dispatch(vec![DataViewEvent::Error(failure)]);
    }

    fn dispatch(&self, events: Vec<DataViewEvent>) {
        for event in events {
            self.bus.trigger_event(&event);
        }
    }
}

impl DataView for MemoryDataView {
    fn timerange(&self) -> Timerange {
        self.state.read().timerange
    }

    fn sensors(&self) -> SensorMap {
        self.state.read().sensors.clone()
    }

    fn historical_data(&self) -> HistoricalDataMap {
        self.state.read().historical_data.clone()
    }

    fn current_time(&self) -> DateTime<Utc> {
        self.state.read().current_time
    }

    fn current_sensor_id(&self) -> Option<SensorId> {
        self.state.read().current_sensor_id.clone()
    }

    fn current_channel_id(&self) -> Option<ChannelId> {
        self.state.read().current_channel_id.clone()
    }

    fn event_bus(&self) -> &EventBus {
        &self.bus
    }
}

impl std::fmt::Debug for MemoryDataView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryDataView")
            .field("timerange", &state.timerange)
            .field("sensors", &state.sensors.len())
            .field("historical_data", &state.historical_data.len())
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::consistency::check_consistency;
    use crate::application::event_bus::Listener;
    use crate::application::events::EventKind;
    use crate::domain::{Channel, HistoricalData, Location, Model, Sensor};
    use chrono::{Duration, TimeZone};
    use parking_lot::Mutex;
    use std::sync::{Arc, Weak};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn channel(name: &str) -> Channel {
        Channel::new(
            name.to_string(),
            String::new(),
            "double".to_string(),
            String::new(),
            0.0,
            100.0,
        )
        .unwrap()
    }

    fn model(channel_ids: &[&str]) -> Arc<Model> {
        let channels = channel_ids
            .iter()
            .map(|id| (id.to_string(), channel(id)))
            .collect();
        Arc::new(Model::new("Env".to_string(), String::new(), channels))
    }

    fn sensors(ids: &[&str], model: &Arc<Model>) -> SensorMap {
        ids.iter()
            .map(|id| {
                (
                    id.to_string(),
                    Sensor::new(
                        model.clone(),
                        id.to_string(),
                        String::new(),
                        Location::default(),
                        None,
                    ),
                )
            })
            .collect()
    }

    fn history(ids: &[&str]) -> HistoricalDataMap {
        ids.iter()
            .map(|id| {
                let mut values = HashMap::new();
                values.insert("temp".to_string(), vec![20.0, 21.0]);
                let timestamps = vec![at(9), at(9) + Duration::minutes(30)];
                let data = HistoricalData::new(timestamps, values).unwrap();
                (id.to_string(), data)
            })
            .collect()
    }

    fn view() -> MemoryDataView {
        let model = model(&["temp", "hum"]);
        MemoryDataView::with_sensors(
            Timerange::new(at(8), at(12)).unwrap(),
            sensors(&["s1", "s2"], &model),
        )
    }

    /// Records every event kind and checks consistency from inside each callback
    fn observe(view: &Arc<MemoryDataView>) -> Arc<Mutex<Vec<(EventKind, bool)>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let weak: Weak<MemoryDataView> = Arc::downgrade(view);
        let log_clone = log.clone();
        let listener = Listener::infallible(move |event| {
            if let Some(view) = weak.upgrade() {
                let consistent = check_consistency(view.as_ref()).is_empty();
                log_clone.lock().push((event.kind(), consistent));
            }
        });
        for kind in EventKind::ALL {
            view.add_event_listener(kind, listener.clone());
        }
        log
    }

    #[test]
    fn test_new_view_starts_at_range_end() {
        let view = MemoryDataView::new(Timerange::new(at(8), at(12)).unwrap());
        assert_eq!(view.current_time(), at(12));
        assert!(view.sensors().is_empty());
        assert!(check_consistency(&view).is_empty());
    }

    #[test]
    fn test_select_sensor_and_channel() {
        let view = Arc::new(view());
        let log = observe(&view);

        view.select_sensor(Some("s1".to_string())).unwrap();
        view.select_channel(Some("temp".to_string())).unwrap();

        assert_eq!(view.current_sensor_id().as_deref(), Some("s1"));
        assert_eq!(view.current_channel_id().as_deref(), Some("temp"));
        assert_eq!(
            log.lock().as_slice(),
            &[
                (EventKind::CurrentSensorChanged, true),
                (EventKind::CurrentChannelChanged, true),
            ]
        );
    }

    #[test]
    fn test_rejects_unknown_selection() {
        let view = view();
        assert_eq!(
            view.select_sensor(Some("s9".to_string())),
            Err(DataViewError::UnknownSensor("s9".to_string()))
        );
        assert_eq!(
            view.select_channel(Some("temp".to_string())),
            Err(DataViewError::NoSensorSelected)
        );

        view.select_sensor(Some("s1".to_string())).unwrap();
        assert_eq!(
            view.select_channel(Some("co2".to_string())),
            Err(DataViewError::UnknownChannel {
                sensor: "s1".to_string(),
                channel: "co2".to_string(),
            })
        );
        assert!(view.current_channel_id().is_none());
    }

    #[test]
    fn test_reselecting_is_silent() {
        let view = Arc::new(view());
        view.select_sensor(Some("s1".to_string())).unwrap();
        let log = observe(&view);

        view.select_sensor(Some("s1".to_string())).unwrap();
        view.set_current_time(view.current_time()).unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_removing_selected_sensor_clears_selection() {
        let view = Arc::new(view());
        view.select_sensor(Some("s1".to_string())).unwrap();
        view.select_channel(Some("temp".to_string())).unwrap();
        view.replace_historical_data(view.timerange(), history(&["s1", "s2"]))
            .unwrap();
        let log = observe(&view);

        view.replace_sensors(sensors(&["s2"], &model(&["temp"])));

        assert!(view.current_sensor_id().is_none());
        assert!(view.current_channel_id().is_none());
        assert_eq!(view.historical_data().keys().collect::<Vec<_>>(), vec!["s2"]);
        assert_eq!(
            log.lock().as_slice(),
            &[
                (EventKind::SensorsChanged, true),
                (EventKind::HistoricalDataChanged, true),
                (EventKind::CurrentSensorChanged, true),
                (EventKind::CurrentChannelChanged, true),
            ]
        );
    }

    #[test]
    fn test_model_change_drops_missing_channel() {
        let view = Arc::new(view());
        view.select_sensor(Some("s1".to_string())).unwrap();
        view.select_channel(Some("hum".to_string())).unwrap();
        let log = observe(&view);

        view.replace_sensors(sensors(&["s1"], &model(&["temp"])));

        assert_eq!(view.current_sensor_id().as_deref(), Some("s1"));
        assert!(view.current_channel_id().is_none());
        assert_eq!(
            log.lock().as_slice(),
            &[
                (EventKind::SensorsChanged, true),
                (EventKind::CurrentChannelChanged, true),
            ]
        );
    }

    #[test]
    fn test_switching_sensor_keeps_shared_channel() {
        let view = view();
        view.select_sensor(Some("s1".to_string())).unwrap();
        view.select_channel(Some("temp".to_string())).unwrap();

        view.select_sensor(Some("s2".to_string())).unwrap();
        assert_eq!(view.current_channel_id().as_deref(), Some("temp"));

        view.select_sensor(None).unwrap();
        assert!(view.current_channel_id().is_none());
    }

    #[test]
    fn test_rejects_orphan_historical_data() {
        let view = view();
        let err = view
            .replace_historical_data(view.timerange(), history(&["s1", "s3"]))
            .unwrap_err();

        assert_eq!(
            err,
            DataViewError::Inconsistent(Violation::OrphanHistoricalData("s3".to_string()))
        );
        assert!(view.historical_data().is_empty());
    }

    #[test]
    fn test_new_range_clamps_current_time() {
        let view = Arc::new(view());
        view.set_current_time(at(9)).unwrap();
        let log = observe(&view);

        view.replace_historical_data(Timerange::new(at(10), at(14)).unwrap(), history(&["s1"]))
            .unwrap();

        assert_eq!(view.current_time(), at(10));
        assert_eq!(
            log.lock().as_slice(),
            &[
                (EventKind::HistoricalDataChanged, true),
                (EventKind::CurrentTimeChanged, true),
            ]
        );
    }

    #[test]
    fn test_rejects_time_outside_range() {
        let view = view();
        let err = view.set_current_time(at(13)).unwrap_err();
        assert!(matches!(
            err,
            DataViewError::Inconsistent(Violation::CurrentTimeOutOfRange { .. })
        ));
        assert_eq!(view.current_time(), at(12));
    }

    #[test]
    fn test_error_keeps_last_known_good() {
        let view = Arc::new(view());
        view.replace_historical_data(view.timerange(), history(&["s1"]))
            .unwrap();
        let before = view.snapshot();

        let failures = Arc::new(Mutex::new(Vec::new()));
        let failures_clone = failures.clone();
        view.add_event_listener(
            EventKind::Error,
            Listener::infallible(move |event| {
                if let DataViewEvent::Error(failure) = event {
                    failures_clone.lock().push(failure.clone());
                }
            }),
        );

        view.report_error(FetchFailure::new("list_sensors", None, "connection refused"));

        assert_eq!(failures.lock().len(), 1);
        assert_eq!(failures.lock()[0].message, "connection refused");
        assert_eq!(view.historical_data(), before.historical_data);
        assert_eq!(view.sensors(), before.sensors);
    }

    #[test]
    fn test_concurrent_mutations_deliver_events_in_order() {
        let view = Arc::new(view());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        view.add_event_listener(
            EventKind::CurrentSensorChanged,
            Listener::infallible(move |event| {
                if let DataViewEvent::CurrentSensorChanged(id) = event {
                    seen_clone.lock().push(id.clone());
                }
            }),
        );
        let with_s1 = sensors(&["s1", "s2"], &model(&["temp"]));
        let without_s1 = sensors(&["s2"], &model(&["temp"]));

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..500 {
                    let _ = view.select_sensor(Some("s1".to_string()));
                    let _ = view.select_sensor(None);
                }
            });
            scope.spawn(|| {
                for _ in 0..500 {
                    view.replace_sensors(without_s1.clone());
                    view.replace_sensors(with_s1.clone());
                }
            });
        });

        let seen = seen.lock();
        assert!(seen.windows(2).all(|pair| pair[0] != pair[1]));
        let last = seen.last().cloned().flatten();
        assert_eq!(last, view.current_sensor_id());
    }

    #[test]
    fn test_listener_may_mutate_from_callback() {
        let view = Arc::new(view());
        let log = observe(&view);
        let weak = Arc::downgrade(&view);
        view.add_event_listener(
            EventKind::CurrentSensorChanged,
            Listener::new(move |event| {
                if let (DataViewEvent::CurrentSensorChanged(Some(_)), Some(view)) =
                    (event, weak.upgrade())
                {
                    view.select_channel(Some("temp".to_string()))?;
                }
                Ok(())
            }),
        );

        view.select_sensor(Some("s1".to_string())).unwrap();

        assert_eq!(view.current_channel_id().as_deref(), Some("temp"));
        assert_eq!(
            log.lock().as_slice(),
            &[
                (EventKind::CurrentSensorChanged, true),
                (EventKind::CurrentChannelChanged, true),
            ]
        );
    }

    #[test]
    fn test_accessors_return_snapshots() {
        let view = view();
        let mut sensors = view.sensors();
        sensors.clear();
        assert_eq!(view.sensors().len(), 2);
    }
}
