use async_trait::async_trait;

use super::StoreEvent;

/// Receives every dispatched [`StoreEvent`].
///
/// Listeners run inline with the action that fired the event, in
/// registration order, so slow work belongs on a channel or task.
///
/// # Example
///
/// ```rust,ignore
/// use storegraph::events::{StoreEvent, Listener};
/// use async_trait::async_trait;
///
/// struct ProvisioningAudit;
///
/// #[async_trait]
/// impl Listener for ProvisioningAudit {
///     async fn handle(&self, event: &StoreEvent) {
///         if let StoreEvent::AccountProvisioned { account_id, store, .. } = event {
///             // record the new account against its store
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    async fn handle(&self, event: &StoreEvent);
}
