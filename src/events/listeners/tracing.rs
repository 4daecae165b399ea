use async_trait::async_trait;

use crate::events::{Listener, StoreEvent};

/// Emits events as `tracing` events. Requires the `tracing` feature.
pub struct TracingListener;

#[async_trait]
impl Listener for TracingListener {
    async fn handle(&self, event: &StoreEvent) {
        tracing::info!(
            target: "storegraph::events",
            event_name = event.name(),
            tenant_id = event.tenant_id(),
            ?event,
            "storegraph event"
        );
    }
}
