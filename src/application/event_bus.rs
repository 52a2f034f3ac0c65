// Event bus - Listener registry for data view events
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::events::{DataViewEvent, EventKind};

type ListenerFn = dyn Fn(&DataViewEvent) -> anyhow::Result<()> + Send + Sync;

/// Shared handle to an event callback.
///
/// Identity is the identity of the wrapped closure: clones of a handle compare equal, two
/// handles built from separate closures never do.
#[derive(Clone)]
pub struct Listener(Arc<ListenerFn>);

impl Listener {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&DataViewEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Wrap a callback that cannot fail
    pub fn infallible<F>(callback: F) -> Self
    where
        F: Fn(&DataViewEvent) + Send + Sync + 'static,
    {
        Self::new(move |event| {
            callback(event);
            Ok(())
        })
    }

    fn call(&self, event: &DataViewEvent) -> anyhow::Result<()> {
        (self.0)(event)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// A listener that returned an error during dispatch
#[derive(Debug)]
pub struct ListenerFailure {
    /// Position of the listener in the dispatch snapshot
    pub position: usize,
    pub error: anyhow::Error,
}

/// Outcome of a single [`EventBus::trigger_event`] call
#[derive(Debug)]
pub struct Dispatch {
    pub kind: EventKind,
    /// Number of listeners invoked, failed ones included
    pub delivered: usize,
    pub failures: Vec<ListenerFailure>,
}

impl Dispatch {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Listeners grouped by [`EventKind`] with set semantics.
///
/// Dispatch is synchronous on the caller's thread and runs against a snapshot of the
/// registered listeners, so a listener may subscribe or unsubscribe during a pass without
/// disturbing it. A failing listener does not stop the dispatch; panics are not caught.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `kind`.
    ///
    /// Returns false if that exact listener was already registered for `kind`.
    pub fn add_event_listener(&self, kind: EventKind, listener: Listener) -> bool {
        let mut listeners = self.listeners.write();
        let slot = listeners.entry(kind).or_default();
        if slot.contains(&listener) {
            return false;
        }
        tracing::debug!("{:?} subscribed to {}", listener, kind);
        slot.push(listener);
        true
    }

    /// Unregister `listener` from `kind`.
    ///
    /// Returns true if the listener was found and removed.
    pub fn remove_event_listener(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut listeners = self.listeners.write();
        let Some(slot) = listeners.get_mut(&kind) else {
            return false;
        };

        let before = slot.len();
        slot.retain(|l| l != listener);
        let removed = slot.len() != before;
        if slot.is_empty() {
            listeners.remove(&kind);
        }
        if removed {
            tracing::debug!("{:?} unsubscribed from {}", listener, kind);
        }
        removed
    }

    /// Synchronously deliver `event` to every listener registered for its kind, in
    /// registration order.
    pub fn trigger_event(&self, event: &DataViewEvent) -> Dispatch {
        let kind = event.kind();
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut failures = Vec::new();
        for (position, listener) in snapshot.iter().enumerate() {
            if let Err(error) = listener.call(event) {
                tracing::warn!("Listener {} for {} failed: {:#}", position, kind, error);
                failures.push(ListenerFailure { position, error });
            }
        }

        if !snapshot.is_empty() {
            tracing::debug!(
                "Dispatched {} ({}) to {} listeners",
                kind,
                event.description(),
                snapshot.len()
            );
        }

        Dispatch {
            kind,
            delivered: snapshot.len(),
            failures,
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Total registrations across all kinds
    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().values().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
