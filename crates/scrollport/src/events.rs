#![forbid(unsafe_code)]

//! Typed notifications to host observers.
//!
//! Handlers are plain closures keyed by [`EventKind`]. They observe; they
//! cannot reach back into the scroll port, so a publish never re-enters a
//! pass.

use std::fmt;

use scrollport_core::ScrollState;

/// A notification published by the scroll port.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollPortEvent {
    /// Geometry was re-synced.
    Resize,
    /// The scroll position changed and the pass that followed has run.
    Scroll(ScrollState),
    /// Text arrived through paste or drop.
    Paste { text: String },
    Focus,
}

impl ScrollPortEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Resize => EventKind::Resize,
            Self::Scroll(_) => EventKind::Scroll,
            Self::Paste { .. } => EventKind::Paste,
            Self::Focus => EventKind::Focus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Resize,
    Scroll,
    Paste,
    Focus,
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&ScrollPortEvent)>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// Subscriber registry. Delivery follows subscription order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&ScrollPortEvent) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            kind,
            handler: Box::new(handler),
        });
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscriptions.iter().filter(|s| s.kind == kind).count()
    }

    /// Deliver `event` to every handler for its kind. Returns the number of
    /// handlers invoked.
    pub fn publish(&mut self, event: &ScrollPortEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        for subscription in self.subscriptions.iter_mut().filter(|s| s.kind == kind) {
            (subscription.handler)(event);
            delivered += 1;
        }
        delivered
    }

    /// [`publish`](Self::publish), then run `completion` once every handler
    /// has returned.
    pub fn publish_then<R>(&mut self, event: &ScrollPortEvent, completion: impl FnOnce() -> R) -> R {
        self.publish(event);
        completion()
    }
}
