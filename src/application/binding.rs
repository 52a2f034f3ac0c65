// Data view binding - Host-side assignment of a consumer to a data view
use crate::application::data_view::DataView;
use crate::application::event_bus::Listener;
use crate::application::events::EventKind;
use parking_lot::Mutex;
use std::sync::Arc;

/// A fixed set of subscriptions pointed at whichever view the host assigns
pub struct DataViewBinding {
    subscriptions: Vec<(EventKind, Listener)>,
    current: Mutex<Option<Arc<dyn DataView>>>,
}

impl DataViewBinding {
    pub fn new(subscriptions: Vec<(EventKind, Listener)>) -> Self {
        Self {
            subscriptions,
            current: Mutex::new(None),
        }
    }

    /// Currently bound view
    pub fn data_view(&self) -> Option<Arc<dyn DataView>> {
        self.current.lock().clone()
    }

    /// Bind to `view`, detaching from the previously bound one.
    ///
    /// Returns the previous view. Assigning the view that is already bound changes nothing.
    pub fn set_data_view(&self, view: Option<Arc<dyn DataView>>) -> Option<Arc<dyn DataView>> {
        let mut current = self.current.lock();

        let unchanged = match (current.as_ref(), view.as_ref()) {
            (Some(old), Some(new)) => std::ptr::addr_eq(Arc::as_ptr(old), Arc::as_ptr(new)),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return current.clone();
        }

        if let Some(old) = current.as_ref() {
            for (kind, listener) in &self.subscriptions {
                old.remove_event_listener(*kind, listener);
            }
        }
        if let Some(new) = view.as_ref() {
            for (kind, listener) in &self.subscriptions {
                new.add_event_listener(*kind, listener.clone());
            }
        }

        tracing::debug!(
            "Data view binding moved {} subscriptions (bound: {})",
            self.subscriptions.len(),
            view.is_some()
        );
        std::mem::replace(&mut *current, view)
    }

    pub fn detach(&self) -> Option<Arc<dyn DataView>> {
        self.set_data_view(None)
    }
}

impl Drop for DataViewBinding {
    fn drop(&mut self) {
        self.detach();
    }
}
