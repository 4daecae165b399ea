use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::crypto::{Argon2Hasher, PasswordHasher, SecretString};
use crate::events::{StoreEvent, dispatch};
use crate::query::{CollectionQuery, SortDirection, SortField, relation};
use crate::repository::{
    Account, AccountLinkRepository, AccountLinkingPolicy, AccountRepository, AccountStoreRef,
    AccountStoreRepository, Application, GroupMembershipRepository, MappingParent,
    MappingRepository, ProvisionTarget, ReachabilityRepository, Status,
};
use crate::topology::NodeType;
use crate::{AuthFailure, StoreError};

/// A login attempt against one application.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticationRequest {
    pub tenant_id: u64,
    pub application_id: u64,
    /// Email or username.
    pub login: String,
    pub password: SecretString,
    /// Restricts the search to one store mapped to the application.
    #[serde(default)]
    pub account_store: Option<AccountStoreRef>,
}

/// How the returned account relates to the one whose password was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The verified account itself.
    Authenticated,
    /// An existing account linked to the verified one.
    Linked,
    /// A new account created in the default store and linked.
    Provisioned,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::Linked => "linked",
            Self::Provisioned => "provisioned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticationResult {
    pub account: Account,
    pub resolution: Resolution,
    /// The account whose credentials were verified.
    pub verified_account_id: u64,
}

fn fail(reason: AuthFailure) -> StoreError {
    StoreError::AuthenticationFailed(reason)
}

/// Resolves a login to a single account.
///
/// The candidate is the lowest-id account reachable from the application (or
/// from the explicit store) whose email or username matches. After its status
/// and password are checked, the application's linking policy may substitute
/// a linked account in the default account store, or provision one there.
pub struct AuthenticateAction<R, H = Argon2Hasher> {
    repository: R,
    hasher: H,
}

impl<R> AuthenticateAction<R, Argon2Hasher>
where
    R: AccountRepository
        + AccountStoreRepository
        + GroupMembershipRepository
        + ReachabilityRepository
        + MappingRepository
        + AccountLinkRepository,
{
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            hasher: Argon2Hasher::default(),
        }
    }
}

impl<R, H> AuthenticateAction<R, H>
where
    R: AccountRepository
        + AccountStoreRepository
        + GroupMembershipRepository
        + ReachabilityRepository
        + MappingRepository
        + AccountLinkRepository,
    H: PasswordHasher,
{
    pub fn with_hasher(repository: R, hasher: H) -> Self {
        Self { repository, hasher }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "authenticate",
            skip_all,
            fields(tenant_id = request.tenant_id, application_id = request.application_id),
            err
        )
    )]
    pub async fn execute(
        &self,
        request: &AuthenticationRequest,
    ) -> Result<AuthenticationResult, StoreError> {
        match self.resolve(request).await {
            Ok(result) => {
                dispatch(StoreEvent::LoginSucceeded {
                    tenant_id: request.tenant_id,
                    application_id: request.application_id,
                    account_id: result.account.id,
                    resolution: result.resolution,
                    at: Utc::now(),
                })
                .await;

                log::info!(
                    target: "storegraph",
                    "msg=\"login succeeded\", application_id={}, account_id={}, resolution={}",
                    request.application_id,
                    result.account.id,
                    result.resolution.as_str()
                );

                Ok(result)
            }
            Err(StoreError::AuthenticationFailed(reason)) => {
                dispatch(StoreEvent::LoginFailed {
                    tenant_id: request.tenant_id,
                    application_id: request.application_id,
                    reason,
                    at: Utc::now(),
                })
                .await;

                log::warn!(
                    target: "storegraph",
                    "msg=\"login failed\", application_id={}, reason={}, code={}",
                    request.application_id,
                    reason.as_str(),
                    reason.code()
                );

                Err(fail(reason))
            }
            Err(e) => Err(e),
        }
    }

    async fn resolve(
        &self,
        request: &AuthenticationRequest,
    ) -> Result<AuthenticationResult, StoreError> {
        let tenant_id = request.tenant_id;
        let application = self
            .repository
            .find_application(tenant_id, request.application_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        if !application.status.is_enabled() {
            return Err(fail(AuthFailure::ApplicationDisabled));
        }

        let candidate = self.locate(request, &application).await?;

        match candidate.status {
            Status::Enabled => {}
            Status::Disabled => return Err(fail(AuthFailure::AccountDisabled)),
            Status::Unverified => return Err(fail(AuthFailure::AccountUnverified)),
        }

        if !self
            .hasher
            .verify(request.password.expose_secret(), &candidate.hashed_password)?
        {
            return Err(fail(AuthFailure::InvalidPassword));
        }

        self.apply_linking_policy(&application, candidate).await
    }

    async fn locate(
        &self,
        request: &AuthenticationRequest,
        application: &Application,
    ) -> Result<Account, StoreError> {
        let tenant_id = request.tenant_id;
        let query = CollectionQuery::new()
            .login(request.login.as_str())
            .order_by(SortField::Id, SortDirection::Asc)
            .limit(1);

        let (accounts, root_id) = match request.account_store {
            Some(store) => {
                let mapped = self
                    .repository
                    .is_reachable(
                        tenant_id,
                        relation(NodeType::Application, store.node_type()),
                        application.id,
                        store.id(),
                    )
                    .await?;
                if !mapped {
                    return Err(StoreError::validation(format!(
                        "{store} is not mapped to application {}",
                        application.id
                    )));
                }

                let status = self
                    .repository
                    .find_status(tenant_id, store.node_ref())
                    .await?;
                if status != Some(Status::Enabled) {
                    return Err(fail(AuthFailure::NoSuchAccount));
                }

                (relation(store.node_type(), NodeType::Account), store.id())
            }
            None => (
                relation(NodeType::Application, NodeType::Account),
                application.id,
            ),
        };

        let page = self
            .repository
            .list_accounts(tenant_id, accounts, root_id, &query)
            .await?;

        page.items
            .into_iter()
            .next()
            .ok_or(fail(AuthFailure::NoSuchAccount))
    }

    async fn apply_linking_policy(
        &self,
        application: &Application,
        candidate: Account,
    ) -> Result<AuthenticationResult, StoreError> {
        let tenant_id = application.tenant_id;
        let policy = self
            .repository
            .find_linking_policy(tenant_id, application.id)
            .await?
            .unwrap_or_else(|| AccountLinkingPolicy::disabled(tenant_id, application.id));

        let unchanged = |account: Account| AuthenticationResult {
            verified_account_id: account.id,
            account,
            resolution: Resolution::Authenticated,
        };

        if !policy.is_enabled() {
            return Ok(unchanged(candidate));
        }

        let default_store = self
            .repository
            .find_default_account_store(tenant_id, MappingParent::Application(application.id))
            .await?;
        let Some(default_store) = default_store.map(|m| m.account_store) else {
            if policy.provisions_automatically() {
                return Err(StoreError::configuration(format!(
                    "application {} has no default account store",
                    application.id
                )));
            }
            return Ok(unchanged(candidate));
        };

        if self.holds(tenant_id, default_store, &candidate).await? {
            return Ok(unchanged(candidate));
        }

        let linked = self
            .repository
            .find_linked_account_ids(tenant_id, candidate.id)
            .await?;
        for account_id in linked {
            let Some(account) = self.repository.find_account(tenant_id, account_id).await? else {
                continue;
            };
            if self.holds(tenant_id, default_store, &account).await? {
                return Ok(AuthenticationResult {
                    verified_account_id: candidate.id,
                    account,
                    resolution: Resolution::Linked,
                });
            }
        }

        if !policy.provisions_automatically() {
            return Ok(unchanged(candidate));
        }

        let target = self.provision_target(tenant_id, default_store).await?;
        let account = match target.group_id {
            // the candidate's directory cannot hold a copy, so the candidate joins the group
            Some(group_id) if target.directory_id == candidate.directory_id => {
                self.repository
                    .add_membership(tenant_id, candidate.id, group_id)
                    .await?;
                candidate.clone()
            }
            _ => {
                let account = self
                    .repository
                    .provision_linked_account(&candidate, target)
                    .await?;
                dispatch(StoreEvent::AccountLinked {
                    tenant_id,
                    account_id: candidate.id,
                    linked_account_id: account.id,
                    at: Utc::now(),
                })
                .await;
                account
            }
        };

        dispatch(StoreEvent::AccountProvisioned {
            tenant_id,
            application_id: application.id,
            source_account_id: candidate.id,
            account_id: account.id,
            store: target.store(),
            at: Utc::now(),
        })
        .await;

        log::info!(
            target: "storegraph",
            "msg=\"account provisioned\", source_account_id={}, account_id={}, store={}",
            candidate.id,
            account.id,
            target.store()
        );

        Ok(AuthenticationResult {
            verified_account_id: candidate.id,
            account,
            resolution: Resolution::Provisioned,
        })
    }

    /// Whether `store` holds `account` by directory, group membership or, for
    /// an organization, through one of its mapped stores. Status is ignored.
    async fn holds(
        &self,
        tenant_id: u64,
        store: AccountStoreRef,
        account: &Account,
    ) -> Result<bool, StoreError> {
        let AccountStoreRef::Organization(id) = store else {
            return self.holds_directly(tenant_id, store, account).await;
        };

        let mappings = self
            .repository
            .list_mappings(tenant_id, MappingParent::Organization(id))
            .await?;
        for mapping in mappings {
            if self
                .holds_directly(tenant_id, mapping.account_store, account)
                .await?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn holds_directly(
        &self,
        tenant_id: u64,
        store: AccountStoreRef,
        account: &Account,
    ) -> Result<bool, StoreError> {
        match store {
            AccountStoreRef::Directory(id) => Ok(account.directory_id == id),
            AccountStoreRef::Group(id) => Ok(self
                .repository
                .find_membership(tenant_id, account.id, id)
                .await?
                .is_some()),
            AccountStoreRef::Organization(_) => Ok(false),
        }
    }

    /// Where a new account for `store` goes. Organizations delegate to their
    /// own default account store.
    async fn provision_target(
        &self,
        tenant_id: u64,
        store: AccountStoreRef,
    ) -> Result<ProvisionTarget, StoreError> {
        let store = match store {
            AccountStoreRef::Organization(id) => self
                .repository
                .find_default_account_store(tenant_id, MappingParent::Organization(id))
                .await?
                .map(|m| m.account_store)
                .ok_or_else(|| {
                    StoreError::configuration(format!(
                        "organization {id} has no default account store"
                    ))
                })?,
            other => other,
        };

        match store {
            AccountStoreRef::Directory(directory_id) => Ok(ProvisionTarget {
                directory_id,
                group_id: None,
            }),
            AccountStoreRef::Group(group_id) => {
                let group = self
                    .repository
                    .find_group(tenant_id, group_id)
                    .await?
                    .ok_or_else(|| {
                        StoreError::configuration(format!("default group {group_id} is missing"))
                    })?;
                Ok(ProvisionTarget {
                    directory_id: group.directory_id,
                    group_id: Some(group_id),
                })
            }
            AccountStoreRef::Organization(id) => Err(StoreError::configuration(format!(
                "organization {id} cannot hold accounts directly"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{
        CreateAccount, CreateApplication, CreateDirectory, CreateGroup,
        CreateMapping, CreateOrganization, MockStore, NodeRef,
    };

    const TENANT: u64 = 1;
    const PASSWORD: &str = "correct horse battery";

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(4096, 1, 1)
    }

    struct Fixture {
        store: MockStore,
        app: Application,
        default_dir: u64,
        other_dir: u64,
        account: Account,
    }

    /// An application with a default directory and a second mapped directory
    /// holding the account `jane@example.com`.
    async fn fixture() -> Fixture {
        let store = MockStore::new();
        let app = store
            .create_application(CreateApplication::new(TENANT, "portal"))
            .await
            .unwrap();
        let default_dir = store
            .create_directory(CreateDirectory::new(TENANT, "default"))
            .await
            .unwrap();
        let other_dir = store
            .create_directory(CreateDirectory::new(TENANT, "partners"))
            .await
            .unwrap();
        let parent = MappingParent::Application(app.id);
        store
            .create_mapping(
                CreateMapping::new(TENANT, parent, AccountStoreRef::Directory(default_dir.id))
                    .default_account_store(),
            )
            .await
            .unwrap();
        store
            .create_mapping(CreateMapping::new(
                TENANT,
                parent,
                AccountStoreRef::Directory(other_dir.id),
            ))
            .await
            .unwrap();

        let hash = hasher().hash(PASSWORD).unwrap();
        let account = store
            .create_account(CreateAccount::mock(TENANT, other_dir.id, "jane@example.com", &hash))
            .await
            .unwrap();

        Fixture {
            store,
            app,
            default_dir: default_dir.id,
            other_dir: other_dir.id,
            account,
        }
    }

    fn request(app: &Application, login: &str, password: &str) -> AuthenticationRequest {
        AuthenticationRequest {
            tenant_id: TENANT,
            application_id: app.id,
            login: login.to_owned(),
            password: SecretString::new(password),
            account_store: None,
        }
    }

    async fn enable_linking(store: &MockStore, app: &Application, provisioning: Status) {
        store
            .save_linking_policy(AccountLinkingPolicy {
                tenant_id: TENANT,
                application_id: app.id,
                status: Status::Enabled,
                automatic_provisioning: provisioning,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_login_outside_default_store_without_linking() {
        let f = fixture().await;
        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());

        let result = action
            .execute(&request(&f.app, "JANE@example.com", PASSWORD))
            .await
            .unwrap();

        assert_eq!(result.account, f.account);
        assert_eq!(result.resolution, Resolution::Authenticated);

        let by_username = action.execute(&request(&f.app, "jane", PASSWORD)).await.unwrap();
        assert_eq!(by_username.account.id, f.account.id);
    }

    #[tokio::test]
    async fn test_login_failures_carry_reasons() {
        let f = fixture().await;
        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());

        let err = action
            .execute(&request(&f.app, "jane@example.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::AuthenticationFailed(AuthFailure::InvalidPassword));

        let err = action
            .execute(&request(&f.app, "nobody@example.com", PASSWORD))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::AuthenticationFailed(AuthFailure::NoSuchAccount));

        f.store
            .set_account_status(TENANT, f.account.id, Status::Disabled)
            .await
            .unwrap();
        let err = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::AuthenticationFailed(AuthFailure::AccountDisabled));
        assert_eq!(err.http_status(), 400);
    }

    #[tokio::test]
    async fn test_disabled_application_and_unknown_application() {
        let f = fixture().await;
        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());

        f.store
            .set_status(TENANT, NodeRef::application(f.app.id), Status::Disabled)
            .await
            .unwrap();
        let err = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::AuthenticationFailed(AuthFailure::ApplicationDisabled));

        let mut req = request(&f.app, "jane@example.com", PASSWORD);
        req.application_id = 9999;
        assert_eq!(action.execute(&req).await.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn test_disabled_directory_hides_accounts() {
        let f = fixture().await;
        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());

        f.store
            .set_status(TENANT, NodeRef::new(NodeType::Directory, f.other_dir), Status::Disabled)
            .await
            .unwrap();
        let err = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::AuthenticationFailed(AuthFailure::NoSuchAccount));

        f.store
            .set_status(TENANT, NodeRef::new(NodeType::Directory, f.other_dir), Status::Enabled)
            .await
            .unwrap();
        assert!(action.execute(&request(&f.app, "jane@example.com", PASSWORD)).await.is_ok());
    }

    #[tokio::test]
    async fn test_automatic_provisioning_creates_one_linked_account() {
        let f = fixture().await;
        enable_linking(&f.store, &f.app, Status::Enabled).await;
        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());

        let first = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap();
        assert_eq!(first.resolution, Resolution::Provisioned);
        assert_eq!(first.verified_account_id, f.account.id);
        assert_eq!(first.account.directory_id, f.default_dir);
        assert_eq!(first.account.email, f.account.email);
        assert_eq!(first.account.hashed_password, f.account.hashed_password);

        let linked = f
            .store
            .find_linked_account_ids(TENANT, f.account.id)
            .await
            .unwrap();
        assert_eq!(linked, vec![first.account.id]);
        let back = f
            .store
            .find_linked_account_ids(TENANT, first.account.id)
            .await
            .unwrap();
        assert_eq!(back, vec![f.account.id]);

        let second = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap();
        assert_eq!(second.account.id, first.account.id);
        assert_eq!(second.resolution, Resolution::Linked);
    }

    #[tokio::test]
    async fn test_disabled_default_store_still_links_provisioned_account() {
        let f = fixture().await;
        enable_linking(&f.store, &f.app, Status::Enabled).await;
        f.store
            .set_status(TENANT, NodeRef::new(NodeType::Directory, f.default_dir), Status::Disabled)
            .await
            .unwrap();
        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());

        let first = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap();
        assert_eq!(first.resolution, Resolution::Provisioned);

        let second = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap();
        assert_eq!(second.resolution, Resolution::Linked);
        assert_eq!(second.account.id, first.account.id);
    }

    #[tokio::test]
    async fn test_linking_without_provisioning_returns_candidate() {
        let f = fixture().await;
        enable_linking(&f.store, &f.app, Status::Disabled).await;
        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());

        let result = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap();
        assert_eq!(result.account.id, f.account.id);
        assert_eq!(result.resolution, Resolution::Authenticated);
    }

    #[tokio::test]
    async fn test_existing_link_is_substituted() {
        let f = fixture().await;
        enable_linking(&f.store, &f.app, Status::Disabled).await;
        let twin = f
            .store
            .create_account(CreateAccount::mock(TENANT, f.default_dir, "jane.d@example.com", "x"))
            .await
            .unwrap();
        f.store.create_link(TENANT, twin.id, f.account.id).await.unwrap();

        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());
        let result = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap();

        assert_eq!(result.account.id, twin.id);
        assert_eq!(result.resolution, Resolution::Linked);
    }

    #[tokio::test]
    async fn test_provisioning_without_default_store_is_configuration_error() {
        let f = fixture().await;
        let default = f
            .store
            .find_default_account_store(TENANT, MappingParent::Application(f.app.id))
            .await
            .unwrap()
            .unwrap();
        f.store.delete_mapping(TENANT, default.id).await.unwrap();
        enable_linking(&f.store, &f.app, Status::Enabled).await;

        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());
        let err = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConfigurationError(_)));
    }

    #[tokio::test]
    async fn test_provisioning_into_group_through_organization() {
        let f = fixture().await;
        let org = f
            .store
            .create_organization(CreateOrganization::new(TENANT, "Acme"))
            .await
            .unwrap();
        let group = f
            .store
            .create_group(CreateGroup::new(TENANT, f.default_dir, "members"))
            .await
            .unwrap();
        f.store
            .create_mapping(
                CreateMapping::new(
                    TENANT,
                    MappingParent::Organization(org.id),
                    AccountStoreRef::Group(group.id),
                )
                .default_account_store(),
            )
            .await
            .unwrap();
        f.store
            .create_mapping(
                CreateMapping::new(
                    TENANT,
                    MappingParent::Application(f.app.id),
                    AccountStoreRef::Organization(org.id),
                )
                .default_account_store(),
            )
            .await
            .unwrap();
        enable_linking(&f.store, &f.app, Status::Enabled).await;

        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());
        let result = action
            .execute(&request(&f.app, "jane@example.com", PASSWORD))
            .await
            .unwrap();

        assert_eq!(result.resolution, Resolution::Provisioned);
        assert_eq!(result.account.directory_id, f.default_dir);
        assert!(f
            .store
            .find_membership(TENANT, result.account.id, group.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_explicit_account_store() {
        let f = fixture().await;
        let action = AuthenticateAction::with_hasher(f.store.clone(), hasher());

        let mut req = request(&f.app, "jane@example.com", PASSWORD);
        req.account_store = Some(AccountStoreRef::Directory(f.other_dir));
        assert_eq!(action.execute(&req).await.unwrap().account.id, f.account.id);

        req.account_store = Some(AccountStoreRef::Directory(f.default_dir));
        assert_eq!(
            action.execute(&req).await.unwrap_err(),
            StoreError::AuthenticationFailed(AuthFailure::NoSuchAccount)
        );

        let unmapped = f
            .store
            .create_directory(CreateDirectory::new(TENANT, "unmapped"))
            .await
            .unwrap();
        req.account_store = Some(AccountStoreRef::Directory(unmapped.id));
        assert!(matches!(
            action.execute(&req).await.unwrap_err(),
            StoreError::Validation(_)
        ));
    }
}
