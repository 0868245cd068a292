//! Defines an abstraction over the event sending mechanism.

use super::events::SessionEvent;
use tokio::sync::mpsc::UnboundedSender;

/// A trait that abstracts the sending of session events.
/// This is "fire-and-forget" and doesn't return a result, simplifying its use.
pub trait EventProxy: Send + Sync + Clone + 'static {
    fn send_event(&self, event: SessionEvent);
}

/// The command-line front end listens on a plain tokio channel.
impl EventProxy for UnboundedSender<SessionEvent> {
    fn send_event(&self, event: SessionEvent) {
        // A closed receiver means the front end is shutting down; log it and move on.
        if let Err(e) = self.send(event) {
            tracing::warn!("Failed to deliver session event: {:?}", e.0);
        }
    }
}
