#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event stream for batch writes
//!
//! Callers that want to observe a batch pass an `EventSender` to the writer
//! and receive `WriteEvent`s for every step. Each event knows its tracing
//! level and target so a consumer can forward it to its own subscriber.

pub mod events;
pub use events::{FailureContext, WriteEvent};

use tokio::sync::mpsc::UnboundedSender;

/// Type alias for the event sender half
pub type EventSender = UnboundedSender<WriteEvent>;

/// Type alias for the event receiver half
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<WriteEvent>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Emission API shared by raw senders and structs that hold one
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: WriteEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(event);
        }
    }
}

impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}
