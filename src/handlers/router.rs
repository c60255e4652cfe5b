use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::PubSubFrame;
use std::collections::HashMap;
use std::sync::Arc;

/// Central router for dispatching pub/sub frames to their handlers, keyed
/// by the frame's event name.
pub struct EventRouter {
    handlers: HashMap<&'static str, Arc<dyn EventHandler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Router wired with every handler this crate knows about.
    pub fn default_router() -> Self {
        let mut router = Self::new();
        router.register(Arc::new(super::message::MessageHandler));
        router.register(Arc::new(super::message::MessageUpdateHandler));
        router.register(Arc::new(super::chatstate::ChatStateHandler));
        router.register(Arc::new(super::receipt::ReceiptHandler));
        router.register(Arc::new(super::presence::PresenceHandler));
        router
    }

    /// Register a handler for its event name.
    ///
    /// # Panics
    /// Panics if a handler is already registered for the same event to
    /// prevent accidental overwrites during initialization.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        let event = handler.event();
        if self.handlers.insert(event, handler).is_some() {
            panic!("Handler for event '{event}' already registered");
        }
    }

    /// Dispatches a frame. Returns `false` when no handler claims the event.
    pub async fn dispatch(&self, client: Arc<Client>, frame: &PubSubFrame) -> bool {
        match self.handlers.get(frame.event.as_str()) {
            Some(handler) => {
                handler.handle(client, frame).await;
                true
            }
            None => false,
        }
    }

    /// Number of registered handlers (useful for testing).
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_router_covers_all_events() {
        let router = EventRouter::default_router();
        assert_eq!(router.handler_count(), 5);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let mut router = EventRouter::default_router();
        router.register(Arc::new(super::super::chatstate::ChatStateHandler));
    }
}
