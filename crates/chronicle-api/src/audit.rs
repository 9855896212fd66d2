//! Built-in replay handler that writes replayed events to the audit log.

use async_trait::async_trait;
use chronicle_core::event::EventRecord;
use chronicle_replay::{HandlerError, ReplayHandler};
use tracing::info;

/// Logs every replayed event under the `chronicle::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLogHandler;

#[async_trait]
impl ReplayHandler for AuditLogHandler {
    async fn handle(&self, event: &EventRecord) -> Result<(), HandlerError> {
        info!(
            target: "chronicle::audit",
            event_id = %event.id(),
            event_type = event.event_type(),
            aggregate_type = event.aggregate_type(),
            aggregate_id = event.aggregate_id(),
            timestamp = %event.timestamp(),
            payload = %event.payload(),
            "replayed event"
        );
        Ok(())
    }
}
