//! Subscriber registry for stream events.
//!
//! Handlers are kept per event kind in registration order. Dispatch works on
//! a copy of the handler list, so a handler may subscribe or unsubscribe
//! (itself included) while it is being called.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::StreamError;

/// Named event kinds a subscriber can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A successfully parsed message.
    Data,
    /// Transport or parse diagnostics.
    Error,
    /// The transport ended (a reconnect will follow unless destroyed).
    Close,
    /// A transport was re-established after an earlier one had been open.
    Reconnect,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Data => "data",
            EventKind::Error => "error",
            EventKind::Close => "close",
            EventKind::Reconnect => "reconnect",
        };
        f.write_str(name)
    }
}

/// An event delivered to subscribers.
#[derive(Debug, Clone)]
pub enum StreamEvent<T> {
    Data(Arc<T>),
    Error(StreamError),
    Close,
    Reconnect,
}

impl<T> StreamEvent<T> {
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Data(_) => EventKind::Data,
            StreamEvent::Error(_) => EventKind::Error,
            StreamEvent::Close => EventKind::Close,
            StreamEvent::Reconnect => EventKind::Reconnect,
        }
    }
}

/// Callback invoked for each event of the kind it was registered for.
pub type Handler<T> = Arc<dyn Fn(&StreamEvent<T>) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    kind: EventKind,
    id: u64,
}

impl SubscriptionId {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

pub struct SubscriberRegistry<T> {
    handlers: DashMap<EventKind, Vec<(u64, Handler<T>)>>,
    next_id: AtomicU64,
}

impl<T> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self {
            handlers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T> SubscriberRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, handler: Handler<T>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.entry(kind).or_default().push((id, handler));
        SubscriptionId { kind, id }
    }

    /// Removes a registration. Returns false if it was not registered.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let Some(mut entry) = self.handlers.get_mut(&subscription.kind) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|(id, _)| *id != subscription.id);
        before != entry.len()
    }

    /// Number of handlers registered for `kind`.
    pub fn len(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.iter().all(|entry| entry.value().is_empty())
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }

    /// Copies the current handler list for `kind`. The map shard is released
    /// before the copy is returned.
    fn snapshot(&self, kind: EventKind) -> Vec<Handler<T>> {
        self.handlers
            .get(&kind)
            .map(|entry| entry.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    /// Calls every handler registered for the event's kind.
    ///
    /// Returns the number of handlers called.
    pub fn dispatch(&self, event: &StreamEvent<T>) -> usize {
        let handlers = self.snapshot(event.kind());
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_only_matching_kind() {
        let registry: SubscriberRegistry<u32> = SubscriberRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        registry.subscribe(
            EventKind::Data,
            Arc::new(move |event: &StreamEvent<u32>| {
                if let StreamEvent::Data(v) = event {
                    sink.lock().unwrap().push(**v);
                }
            }),
        );

        assert_eq!(registry.dispatch(&StreamEvent::Data(Arc::new(7))), 1);
        assert_eq!(registry.dispatch(&StreamEvent::Close), 0);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_unsubscribe() {
        let registry: SubscriberRegistry<u32> = SubscriberRegistry::new();
        let id = registry.subscribe(EventKind::Close, Arc::new(|_: &StreamEvent<u32>| {}));
        assert_eq!(registry.len(EventKind::Close), 1);

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert_eq!(registry.len(EventKind::Close), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handler_can_unsubscribe_itself_during_dispatch() {
        let registry: Arc<SubscriberRegistry<u32>> = Arc::new(SubscriberRegistry::new());
        let calls = Arc::new(AtomicU64::new(0));
        let own_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let reg = Arc::clone(&registry);
        let counter = Arc::clone(&calls);
        let slot = Arc::clone(&own_id);
        let id = registry.subscribe(
            EventKind::Data,
            Arc::new(move |_: &StreamEvent<u32>| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *slot.lock().unwrap() {
                    reg.unsubscribe(id);
                }
                // Registering during dispatch must not deadlock either
                reg.subscribe(EventKind::Close, Arc::new(|_: &StreamEvent<u32>| {}));
            }),
        );
        *own_id.lock().unwrap() = Some(id);

        registry.dispatch(&StreamEvent::Data(Arc::new(1)));
        registry.dispatch(&StreamEvent::Data(Arc::new(2)));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(EventKind::Close), 1);
    }
}
