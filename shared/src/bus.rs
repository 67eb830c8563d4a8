use tokio::sync::broadcast;

use crate::{error::CriticalError, error::DecodeError, path::Path};

const DEFAULT_CAPACITY: usize = 64;

/// Explicitly-constructed broadcast bus for events that no single caller
/// owns. Constructed by the supervising component and handed to whatever
/// publishes or subscribes; never implicit global state.
pub struct EventBus<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self { sender }
    }

    /// Publishes an event to all current subscribers. Events published while
    /// nobody is subscribed are dropped (callers log independently, so
    /// nothing is silently swallowed).
    pub fn publish(&self, event: T) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Process-wide stream of connection-scope failures, for supervisory
/// handling (alerting, forced reconnect).
pub type CriticalErrorBus = EventBus<CriticalError>;

/// A frame that failed to decode, associated with the route it arrived on.
#[derive(Debug, Clone)]
pub struct MessageErrorEvent {
    pub path: Option<Path>,
    pub error: DecodeError,
}

/// Per-connection stream of inbound frames that failed to decode. Dispatch
/// continues past every one of these.
pub type MessageErrorBus = EventBus<MessageErrorEvent>;
