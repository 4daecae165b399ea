use async_trait::async_trait;
use chrono::Utc;

use super::MockStore;
use crate::StoreError;
use crate::repository::{
    Account, AccountLink, AccountLinkRepository, AccountLinkingPolicy, CreateAccount,
    ProvisionTarget,
};

#[async_trait]
impl AccountLinkRepository for MockStore {
    async fn create_link(
        &self,
        tenant_id: u64,
        account_id: u64,
        other_account_id: u64,
    ) -> Result<AccountLink, StoreError> {
        let id = self.next_id();
        self.write()?
            .insert_link(id, tenant_id, account_id, other_account_id, Utc::now())
    }

    async fn delete_link(
        &self,
        tenant_id: u64,
        account_id: u64,
        other_account_id: u64,
    ) -> Result<(), StoreError> {
        let (left, right) = AccountLink::normalize(account_id, other_account_id);
        let mut tables = self.write()?;
        let before = tables.links.len();
        tables.links.retain(|_, l| {
            !(l.tenant_id == tenant_id && l.left_account_id == left && l.right_account_id == right)
        });
        if tables.links.len() < before {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn find_linked_account_ids(
        &self,
        tenant_id: u64,
        account_id: u64,
    ) -> Result<Vec<u64>, StoreError> {
        let tables = self.read()?;
        let mut ids: Vec<u64> = tables
            .links
            .values()
            .filter(|l| l.tenant_id == tenant_id)
            .filter_map(|l| l.other(account_id))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn find_linking_policy(
        &self,
        tenant_id: u64,
        application_id: u64,
    ) -> Result<Option<AccountLinkingPolicy>, StoreError> {
        Ok(self
            .read()?
            .policies
            .get(&(tenant_id, application_id))
            .cloned())
    }

    async fn save_linking_policy(
        &self,
        policy: AccountLinkingPolicy,
    ) -> Result<AccountLinkingPolicy, StoreError> {
        let mut tables = self.write()?;
        if tables
            .application(policy.tenant_id, policy.application_id)
            .is_none()
        {
            return Err(StoreError::NotFound);
        }
        tables
            .policies
            .insert((policy.tenant_id, policy.application_id), policy.clone());
        Ok(policy)
    }

    async fn provision_linked_account(
        &self,
        source: &Account,
        target: ProvisionTarget,
    ) -> Result<Account, StoreError> {
        let now = Utc::now();
        let (account_id, membership_id, link_id) = (self.next_id(), self.next_id(), self.next_id());
        let mut tables = self.write()?;

        if let Some(group_id) = target.group_id {
            let in_directory = tables
                .group(source.tenant_id, group_id)
                .is_some_and(|g| g.directory_id == target.directory_id);
            if !in_directory {
                return Err(StoreError::validation(format!(
                    "group {group_id} is not in directory {}",
                    target.directory_id
                )));
            }
        }

        let account = tables.insert_account(
            account_id,
            CreateAccount::copy_of(source, target.directory_id),
            now,
        )?;

        let rest = match target.group_id {
            Some(group_id) => tables
                .insert_membership(membership_id, source.tenant_id, account.id, group_id, now)
                .map(|_| ()),
            None => Ok(()),
        }
        .and_then(|()| {
            tables
                .insert_link(link_id, source.tenant_id, source.id, account.id, now)
                .map(|_| ())
        });

        if let Err(e) = rest {
            tables.remove_account(account.id);
            return Err(e);
        }

        Ok(account)
    }
}
