use crate::StoreError;
use crate::config::PaginationConfig;
use crate::query::{CollectionQuery, Page, relation};
use crate::repository::{Account, Group, NodeRef, ReachabilityRepository};
use crate::topology::NodeType;

/// Lists the accounts reachable from any node, through every membership path.
pub struct ListAccountsAction<R: ReachabilityRepository> {
    repository: R,
    pagination: PaginationConfig,
}

impl<R: ReachabilityRepository> ListAccountsAction<R> {
    pub fn new(repository: R) -> Self {
        Self::with_config(repository, PaginationConfig::default())
    }

    pub fn with_config(repository: R, pagination: PaginationConfig) -> Self {
        ListAccountsAction {
            repository,
            pagination,
        }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "list_accounts", skip_all, fields(root = %root), err)
    )]
    pub async fn execute(
        &self,
        tenant_id: u64,
        root: NodeRef,
        query: CollectionQuery,
    ) -> Result<Page<Account>, StoreError> {
        let query = query.normalized(&self.pagination);
        self.repository
            .list_accounts(
                tenant_id,
                relation(root.node, NodeType::Account),
                root.id,
                &query,
            )
            .await
    }
}

/// Lists the groups reachable from any node.
pub struct ListGroupsAction<R: ReachabilityRepository> {
    repository: R,
    pagination: PaginationConfig,
}

impl<R: ReachabilityRepository> ListGroupsAction<R> {
    pub fn new(repository: R) -> Self {
        Self::with_config(repository, PaginationConfig::default())
    }

    pub fn with_config(repository: R, pagination: PaginationConfig) -> Self {
        ListGroupsAction {
            repository,
            pagination,
        }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "list_groups", skip_all, fields(root = %root), err)
    )]
    pub async fn execute(
        &self,
        tenant_id: u64,
        root: NodeRef,
        query: CollectionQuery,
    ) -> Result<Page<Group>, StoreError> {
        let query = query.normalized(&self.pagination);
        self.repository
            .list_groups(
                tenant_id,
                relation(root.node, NodeType::Group),
                root.id,
                &query,
            )
            .await
    }
}

/// Answers whether an account belongs, directly or transitively, to a store
/// or application.
pub struct CheckMembershipAction<R: ReachabilityRepository> {
    repository: R,
}

impl<R: ReachabilityRepository> CheckMembershipAction<R> {
    pub fn new(repository: R) -> Self {
        CheckMembershipAction { repository }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "check_membership", skip_all, err)
    )]
    pub async fn execute(
        &self,
        tenant_id: u64,
        account_id: u64,
        container: NodeRef,
    ) -> Result<bool, StoreError> {
        self.repository
            .is_reachable(
                tenant_id,
                relation(container.node, NodeType::Account),
                container.id,
                account_id,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SortDirection, SortField};
    use crate::repository::{
        AccountRepository, AccountStoreRef, AccountStoreRepository, CreateAccount,
        CreateApplication, CreateDirectory, CreateGroup, CreateMapping, CreateOrganization,
        GroupMembershipRepository, MappingParent, MappingRepository, MockStore, Status,
    };

    const TENANT: u64 = 3;

    /// app -> org -> group(g) in directory d; app -> d directly as well.
    async fn graph() -> (MockStore, u64, u64, u64, Vec<Account>) {
        let store = MockStore::new();
        let app = store
            .create_application(CreateApplication::new(TENANT, "console"))
            .await
            .unwrap();
        let org = store
            .create_organization(CreateOrganization::new(TENANT, "Acme"))
            .await
            .unwrap();
        let dir = store
            .create_directory(CreateDirectory::new(TENANT, "staff"))
            .await
            .unwrap();
        let group = store
            .create_group(CreateGroup::new(TENANT, dir.id, "admins"))
            .await
            .unwrap();

        store
            .create_mapping(CreateMapping::new(
                TENANT,
                MappingParent::Application(app.id),
                AccountStoreRef::Organization(org.id),
            ))
            .await
            .unwrap();
        store
            .create_mapping(CreateMapping::new(
                TENANT,
                MappingParent::Organization(org.id),
                AccountStoreRef::Group(group.id),
            ))
            .await
            .unwrap();

        let mut accounts = Vec::new();
        for email in ["carol@acme.io", "alice@acme.io", "bob@acme.io"] {
            accounts.push(
                store
                    .create_account(CreateAccount::mock(TENANT, dir.id, email, "hash"))
                    .await
                    .unwrap(),
            );
        }
        for account in &accounts[..2] {
            store
                .add_membership(TENANT, account.id, group.id)
                .await
                .unwrap();
        }

        (store, app.id, dir.id, group.id, accounts)
    }

    #[tokio::test]
    async fn test_list_accounts_through_organization_and_group() {
        let (store, app_id, _, _, accounts) = graph().await;
        let action = ListAccountsAction::new(store);

        let page = action
            .execute(
                TENANT,
                NodeRef::application(app_id),
                CollectionQuery::new().order_by(SortField::Email, SortDirection::Asc),
            )
            .await
            .unwrap();

        assert_eq!(page.size, 2);
        let emails: Vec<_> = page.items.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, ["alice@acme.io", "carol@acme.io"]);
        assert!(!page.items.iter().any(|a| a.id == accounts[2].id));
    }

    #[tokio::test]
    async fn test_list_accounts_pagination_is_clamped() {
        let (store, _, dir_id, _, _) = graph().await;
        let action = ListAccountsAction::with_config(
            store,
            PaginationConfig {
                default_limit: 1,
                max_limit: 2,
            },
        );
        let root = NodeRef::new(NodeType::Directory, dir_id);

        let first = action
            .execute(TENANT, root, CollectionQuery::new())
            .await
            .unwrap();
        assert_eq!((first.size, first.limit, first.items.len()), (3, 1, 1));

        let wide = action
            .execute(TENANT, root, CollectionQuery::new().limit(50).offset(1))
            .await
            .unwrap();
        assert_eq!((wide.limit, wide.items.len()), (2, 2));
        assert_eq!(wide.items[0].id, first.items[0].id + 1);
    }

    #[tokio::test]
    async fn test_list_groups_and_search() {
        let (store, app_id, dir_id, group_id, _) = graph().await;
        store
            .create_group(CreateGroup::new(TENANT, dir_id, "readers"))
            .await
            .unwrap();
        let action = ListGroupsAction::new(store);

        let from_app = action
            .execute(TENANT, NodeRef::application(app_id), CollectionQuery::new())
            .await
            .unwrap();
        assert_eq!(from_app.items.iter().map(|g| g.id).collect::<Vec<_>>(), vec![group_id]);

        let searched = action
            .execute(
                TENANT,
                NodeRef::new(NodeType::Directory, dir_id),
                CollectionQuery::new().search("READ"),
            )
            .await
            .unwrap();
        assert_eq!(searched.size, 1);
        assert_eq!(searched.items[0].name, "readers");
    }

    #[tokio::test]
    async fn test_membership_follows_status() {
        let (store, app_id, dir_id, group_id, accounts) = graph().await;
        let action = CheckMembershipAction::new(store.clone());
        let app = NodeRef::application(app_id);

        assert!(action.execute(TENANT, accounts[0].id, app).await.unwrap());
        assert!(!action.execute(TENANT, accounts[2].id, app).await.unwrap());
        assert!(
            action
                .execute(TENANT, accounts[2].id, NodeRef::new(NodeType::Directory, dir_id))
                .await
                .unwrap()
        );

        store
            .set_status(TENANT, NodeRef::new(NodeType::Group, group_id), Status::Disabled)
            .await
            .unwrap();
        assert!(!action.execute(TENANT, accounts[0].id, app).await.unwrap());

        store
            .set_status(TENANT, NodeRef::new(NodeType::Group, group_id), Status::Enabled)
            .await
            .unwrap();
        store
            .set_status(TENANT, NodeRef::new(NodeType::Directory, dir_id), Status::Disabled)
            .await
            .unwrap();
        assert!(!action.execute(TENANT, accounts[0].id, app).await.unwrap());

        store
            .set_status(TENANT, NodeRef::new(NodeType::Directory, dir_id), Status::Enabled)
            .await
            .unwrap();
        assert!(action.execute(TENANT, accounts[0].id, app).await.unwrap());
        assert!(store.find_account(TENANT, accounts[0].id).await.unwrap().is_some());
    }
}
