// Notice board - Transient fetch failure notices for API consumers
use crate::application::event_bus::Listener;
use crate::application::events::{DataViewEvent, EventKind, FetchFailure};
use parking_lot::Mutex;
use std::sync::Arc;

/// Holds the most recent fetch failure until fresh data arrives
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Mutex<Option<FetchFailure>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<FetchFailure> {
        self.current.lock().clone()
    }

    fn handle(&self, event: &DataViewEvent) {
        match event {
            DataViewEvent::Error(failure) => {
                *self.current.lock() = Some(failure.clone());
            }
            DataViewEvent::SensorsChanged(_) | DataViewEvent::HistoricalDataChanged { .. } => {
                self.current.lock().take();
            }
            _ => {}
        }
    }

    /// Subscriptions to hand to a [`DataViewBinding`](crate::application::DataViewBinding)
    pub fn subscriptions(self: &Arc<Self>) -> Vec<(EventKind, Listener)> {
        let board = self.clone();
        let listener = Listener::infallible(move |event| board.handle(event));
        vec![
            (EventKind::Error, listener.clone()),
            (EventKind::SensorsChanged, listener.clone()),
            (EventKind::HistoricalDataChanged, listener),
        ]
    }
}
