//! Notifications an [`Editor`] sends to whoever is listening.
//!
//! ## Learning: Broadcast Channels
//!
//! `tokio::sync::broadcast` hands every subscriber its own clone of each
//! event. Senders never wait, and a slow subscriber loses the oldest events
//! instead of holding up the editor.
//!
//! The tag matcher is not a subscriber: the editor drives it synchronously.
//! Subscribers are outside glue such as the CLI or the taglib cache, which
//! wants to hear when a `marko.json` is saved.
//!
//! [`Editor`]: crate::Editor

use std::path::PathBuf;

use marko_buffer::Range;
use tokio::sync::broadcast;

use crate::document::DocumentId;

/// Queued events per subscriber before the oldest are dropped.
const CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    TextChanged(DocumentId),
    /// The primary cursor moved without a text change
    CursorMoved(DocumentId),
    GrammarChanged(DocumentId),
    /// Written to disk at this path
    Saved(PathBuf),
    Destroyed(DocumentId),
    /// Ranges of the highlighted tag pair, empty when nothing is highlighted
    HighlightChanged(Vec<Range>),
    /// The suggestion list should be (re)opened
    AutocompleteRequested { activated_manually: bool },
}

/// Sending half, owned by the editor.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EditorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CAPACITY).0,
        }
    }

    pub fn emit(&self, event: EditorEvent) {
        tracing::trace!(?event, "emit");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// A stream of every event emitted from now on.
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half. Lagging is logged and skipped over.
pub struct EventStream {
    receiver: broadcast::Receiver<EditorEvent>,
}

impl EventStream {
    /// Waits for the next event; `None` once the editor is gone and the
    /// queue is empty.
    pub async fn next(&mut self) -> Option<EditorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Everything already queued, without waiting.
    pub fn drain(&mut self) -> Vec<EditorEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event subscriber lagged");
                }
                Err(_) => return events,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_gets_each_event() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(EditorEvent::HighlightChanged(Vec::new()));

        assert_eq!(first.next().await, Some(EditorEvent::HighlightChanged(Vec::new())));
        assert_eq!(second.next().await, Some(EditorEvent::HighlightChanged(Vec::new())));
    }

    #[tokio::test]
    async fn test_stream_ends_with_bus() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        bus.emit(EditorEvent::Saved(PathBuf::from("marko.json")));
        drop(bus);

        assert_eq!(events.next().await, Some(EditorEvent::Saved(PathBuf::from("marko.json"))));
        assert_eq!(events.next().await, None);
    }

    #[test]
    fn test_lagging_subscriber_keeps_newest() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        for n in 0..CAPACITY + 2 {
            bus.emit(EditorEvent::AutocompleteRequested {
                activated_manually: n % 2 == 0,
            });
        }

        let drained = events.drain();
        assert_eq!(drained.len(), CAPACITY);
        assert!(events.drain().is_empty());
    }
}
