//! Event system for editor notifications.
//!
//! ## Learning: Observer Pattern in Rust
//!
//! Rust's ownership model makes callback-based observers awkward.
//! A `tokio::sync::broadcast` channel carries events as values instead:
//! subscribers get clones, and nobody holds a reference into the editor.

use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::document::DocumentId;

/// Events that can occur in the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// A document was opened
    DocumentOpened(DocumentId),
    /// A document was closed
    DocumentClosed(DocumentId),
    /// A document was saved
    DocumentSaved(DocumentId),
    /// A document received focus
    DocumentFocused(DocumentId),
    /// The user changed a document's text
    TextChanged(DocumentId),
    /// A highlighting pass finished; `ok` is false after a rollback
    Highlighted { id: DocumentId, ok: bool },
    /// The project folder changed
    ProjectChanged(PathBuf),
}

/// Event bus for broadcasting editor events.
pub struct EventBus {
    sender: broadcast::Sender<EditorEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: EditorEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

/// Helper for processing events asynchronously.
///
/// ## Example
///
/// ```ignore
/// let mut handler = EventHandler::new(editor.subscribe());
///
/// tokio::spawn(async move {
///     while let Some(event) = handler.next().await {
///         if let EditorEvent::Highlighted { id, ok: false } = event {
///             tracing::info!("highlighting of {} rolled back", id);
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<EditorEvent>,
}

impl EventHandler {
    /// Creates a new event handler.
    pub fn new(receiver: broadcast::Receiver<EditorEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Option<EditorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let id = DocumentId::new();

        bus.emit(EditorEvent::TextChanged(id));

        let event = rx.recv().await.unwrap();
        assert_eq!(event, EditorEvent::TextChanged(id));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(EditorEvent::ProjectChanged(PathBuf::from("/p")));

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_handler_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let mut handler = EventHandler::new(bus.subscribe());
        let id = DocumentId::new();

        bus.emit(EditorEvent::Highlighted { id, ok: true });
        drop(bus);

        assert_eq!(
            handler.next().await,
            Some(EditorEvent::Highlighted { id, ok: true })
        );
        assert_eq!(handler.next().await, None);
    }
}
