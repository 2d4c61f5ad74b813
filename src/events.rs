//! Process-wide client event channel.
//!
//! SYSTEM CONTEXT
//! ==============
//! The API client publishes request lifecycle signals here and the session
//! store forwards session expiry, so UI layers (spinners, toasts, the
//! "session expired" modal) can react without the emitters knowing about them.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use std::cell::{Cell, RefCell};
use std::fmt;

/// Named signals carried by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEvent {
    /// A request is about to be sent.
    BeforeRequest,
    /// A 2xx response arrived.
    AfterResponse,
    /// The request could not be built.
    RequestError,
    /// A non-2xx response arrived.
    ResponseError,
    /// No response arrived at all.
    ServerError,
    /// The session was found to be invalid during navigation.
    SessionExpired,
}

impl ClientEvent {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BeforeRequest => "before-request",
            Self::AfterResponse => "after-response",
            Self::RequestError => "request-error",
            Self::ResponseError => "response-error",
            Self::ServerError => "server-error",
            Self::SessionExpired => "session-exp",
        }
    }
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = std::rc::Rc<dyn Fn(ClientEvent)>;

/// Single-threaded publish/subscribe channel.
#[derive(Default)]
pub struct EventBus {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every event.
    pub fn subscribe(&self, listener: impl Fn(ClientEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, std::rc::Rc::new(listener)));
        id
    }

    /// Register a listener for one event kind.
    pub fn on(&self, event: ClientEvent, listener: impl Fn() + 'static) -> SubscriptionId {
        self.subscribe(move |e| {
            if e == event {
                listener();
            }
        })
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn emit(&self, event: ClientEvent) {
        tracing::trace!(event = event.name(), "client event");
        // Snapshot so listeners may (un)subscribe while being notified.
        let listeners: Vec<Listener> = self.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(event);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}
