use chrono::Utc;

use crate::StoreError;
use crate::events::{StoreEvent, dispatch};
use crate::repository::{AccountStoreRef, AccountStoreRepository};

/// Deletes a directory, group or organization together with every mapping
/// that points at it. Parents whose default pointer named one of those
/// mappings end up with no default.
pub struct DeleteAccountStoreAction<S: AccountStoreRepository> {
    store_repository: S,
}

impl<S: AccountStoreRepository> DeleteAccountStoreAction<S> {
    pub fn new(store_repository: S) -> Self {
        DeleteAccountStoreAction { store_repository }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "delete_account_store", skip_all, err)
    )]
    pub async fn execute(&self, tenant_id: u64, store: AccountStoreRef) -> Result<(), StoreError> {
        self.store_repository
            .delete_account_store(tenant_id, store)
            .await?;

        dispatch(StoreEvent::AccountStoreDeleted {
            tenant_id,
            store,
            at: Utc::now(),
        })
        .await;

        log::info!(
            target: "storegraph",
            "msg=\"account store deleted\", store={store}"
        );

        Ok(())
    }
}
