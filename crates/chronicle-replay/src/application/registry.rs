//! Event type registry: maps an event type tag to the handler that
//! re-processes it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_core::event::EventRecord;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{HandlerError, ReplayError};

/// Reacts to one replayed event.
///
/// Replay is at-least-once: the same event id may arrive more than once, so
/// implementations that need exactly-once effects must track applied ids.
#[async_trait]
pub trait ReplayHandler: Send + Sync {
    /// Handles one event.
    async fn handle(&self, event: &EventRecord) -> Result<(), HandlerError>;
}

/// Handler working on a decoded payload type.
#[async_trait]
pub trait TypedReplayHandler: Send + Sync + 'static {
    /// Payload type, typically a tagged enum of the context's events.
    type Event: DeserializeOwned + Send;

    /// Handles one event whose payload decoded into `Self::Event`.
    async fn handle_typed(
        &self,
        record: &EventRecord,
        event: Self::Event,
    ) -> Result<(), HandlerError>;
}

struct Decoding<H>(H);

#[async_trait]
impl<H: TypedReplayHandler> ReplayHandler for Decoding<H> {
    async fn handle(&self, event: &EventRecord) -> Result<(), HandlerError> {
        let decoded = serde_json::from_value::<H::Event>(event.payload().clone())
            .map_err(|e| HandlerError::Decode(e.to_string()))?;
        self.0.handle_typed(event, decoded).await
    }
}

/// Registry of replay handlers keyed by event type.
#[derive(Clone, Default)]
pub struct EventTypeRegistry {
    handlers: HashMap<String, Arc<dyn ReplayHandler>>,
}

impl fmt::Debug for EventTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTypeRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}

impl EventTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event_type`, replacing any previous one.
    pub fn register(
        &mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn ReplayHandler>,
    ) -> &mut Self {
        let event_type = event_type.into();
        if self.handlers.insert(event_type.clone(), handler).is_some() {
            warn!(event_type, "replay handler replaced");
        }
        self
    }

    /// Registers a typed handler; payloads are decoded before it runs.
    pub fn register_typed<H: TypedReplayHandler>(
        &mut self,
        event_type: impl Into<String>,
        handler: H,
    ) -> &mut Self {
        self.register(event_type, Arc::new(Decoding(handler)))
    }

    /// Returns the handler for `event_type`.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::UnsupportedEventType` naming the type if no
    /// handler is registered.
    pub fn resolve(&self, event_type: &str) -> Result<Arc<dyn ReplayHandler>, ReplayError> {
        self.handlers
            .get(event_type)
            .cloned()
            .ok_or_else(|| ReplayError::UnsupportedEventType(event_type.to_owned()))
    }

    /// Whether a handler is registered for `event_type`.
    #[must_use]
    pub fn contains(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Registered event types, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Number of registered event types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
