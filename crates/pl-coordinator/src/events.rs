//! Listener registry and event dispatch
//!
//! The bus holds listeners weakly: dropping the last `Arc` to a listener
//! unregisters it. Events are delivered synchronously on the publishing
//! thread (the worker), so a slow listener stalls every later intent.
//! Listeners that need to do real work should use [`ChannelListener`] and
//! consume the events on their own task.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

use pl_core::ConnectionEvent;

/// Observer of connection transitions and errors
pub trait ConnectionListener: Send + Sync {
    fn on_event(&self, event: &ConnectionEvent);
}

impl<F> ConnectionListener for F
where
    F: Fn(&ConnectionEvent) + Send + Sync,
{
    fn on_event(&self, event: &ConnectionEvent) {
        self(event)
    }
}

/// Registry of weakly-held listeners
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Weak<dyn ConnectionListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Registering the same listener twice is a no-op.
    pub fn subscribe(&self, listener: &Arc<dyn ConnectionListener>) {
        let mut listeners = self.listeners.lock();
        if listeners.iter().any(|weak| same_listener(weak, listener)) {
            return;
        }
        listeners.push(Arc::downgrade(listener));
    }

    /// Remove a listener; unknown listeners are ignored
    pub fn unsubscribe(&self, listener: &Arc<dyn ConnectionListener>) {
        self.listeners
            .lock()
            .retain(|weak| weak.strong_count() > 0 && !same_listener(weak, listener));
    }

    /// Number of live listeners
    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every live listener, in registration order
    ///
    /// The registry lock is released before any listener runs, so
    /// listeners may (un)subscribe from inside `on_event`.
    pub fn publish(&self, event: &ConnectionEvent) {
        let live: Vec<Arc<dyn ConnectionListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|weak| weak.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };

        tracing::debug!("Publishing '{}' to {} listener(s)", event, live.len());

        for listener in live {
            let delivered = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if delivered.is_err() {
                tracing::error!("Listener panicked while handling '{}'", event);
            }
        }
    }
}

fn same_listener(weak: &Weak<dyn ConnectionListener>, listener: &Arc<dyn ConnectionListener>) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units
    std::ptr::eq(
        weak.as_ptr() as *const (),
        Arc::as_ptr(listener) as *const (),
    )
}

/// Listener that forwards every event into a tokio channel
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel
    ///
    /// The bus only holds the listener weakly, so keep the returned `Arc`
    /// alive for as long as events should flow.
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl ConnectionListener for ChannelListener {
    fn on_event(&self, event: &ConnectionEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}
