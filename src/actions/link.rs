use chrono::Utc;

use crate::StoreError;
use crate::events::{StoreEvent, dispatch};
use crate::repository::{AccountLink, AccountLinkRepository};

/// Links two accounts of the same tenant. Links are symmetric, so the order
/// of the arguments does not matter.
pub struct LinkAccountsAction<L: AccountLinkRepository> {
    link_repository: L,
}

impl<L: AccountLinkRepository> LinkAccountsAction<L> {
    pub fn new(link_repository: L) -> Self {
        LinkAccountsAction { link_repository }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "link_accounts", skip_all, err)
    )]
    pub async fn execute(
        &self,
        tenant_id: u64,
        account_id: u64,
        other_account_id: u64,
    ) -> Result<AccountLink, StoreError> {
        let link = self
            .link_repository
            .create_link(tenant_id, account_id, other_account_id)
            .await?;

        dispatch(StoreEvent::AccountLinked {
            tenant_id,
            account_id,
            linked_account_id: other_account_id,
            at: Utc::now(),
        })
        .await;

        log::info!(
            target: "storegraph",
            "msg=\"accounts linked\", account_id={account_id}, linked_account_id={other_account_id}"
        );

        Ok(link)
    }
}

pub struct UnlinkAccountsAction<L: AccountLinkRepository> {
    link_repository: L,
}

impl<L: AccountLinkRepository> UnlinkAccountsAction<L> {
    pub fn new(link_repository: L) -> Self {
        UnlinkAccountsAction { link_repository }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "unlink_accounts", skip_all, err)
    )]
    pub async fn execute(
        &self,
        tenant_id: u64,
        account_id: u64,
        other_account_id: u64,
    ) -> Result<(), StoreError> {
        self.link_repository
            .delete_link(tenant_id, account_id, other_account_id)
            .await?;

        dispatch(StoreEvent::AccountUnlinked {
            tenant_id,
            account_id,
            linked_account_id: other_account_id,
            at: Utc::now(),
        })
        .await;

        log::info!(
            target: "storegraph",
            "msg=\"accounts unlinked\", account_id={account_id}, linked_account_id={other_account_id}"
        );

        Ok(())
    }
}
