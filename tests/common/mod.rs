//! Scenarios shared by the mock, `SQLite` and `PostgreSQL` end-to-end suites.
//!
//! Every scenario starts from an empty store for tenant [`TENANT`].

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use storegraph::actions::{
    AssignAccountStoreAction, AuthenticateAction, AuthenticationRequest, CheckMembershipAction,
    DeleteAccountStoreAction, LinkAccountsAction, ListAccountsAction, ListGroupsAction,
    RemoveMappingAction, Resolution, UpdateMappingAction,
};
use storegraph::query::{SortDirection, SortField};
use storegraph::{
    Account, AccountLinkRepository, AccountLinkingPolicy, AccountRepository, AccountStoreRef,
    AccountStoreRepository, Argon2Hasher, CollectionQuery, CreateAccount, CreateApplication,
    CreateDirectory, CreateGroup, CreateMapping, CreateOrganization, GroupMembershipRepository,
    MappingParent, MappingRepository, NodeRef, PasswordHasher, ReachabilityRepository,
    SecretString, Status, StoreError, UpdateMapping,
};
use storegraph::AuthFailure;

pub const TENANT: u64 = 1;
pub const PASSWORD: &str = "correct horse battery";

/// Every repository trait, as implemented by each backend.
pub trait Backend:
    AccountRepository
    + AccountStoreRepository
    + GroupMembershipRepository
    + MappingRepository
    + AccountLinkRepository
    + ReachabilityRepository
    + Clone
{
}

impl<T> Backend for T where
    T: AccountRepository
        + AccountStoreRepository
        + GroupMembershipRepository
        + MappingRepository
        + AccountLinkRepository
        + ReachabilityRepository
        + Clone
{
}

pub fn hasher() -> Argon2Hasher {
    Argon2Hasher::new(4096, 1, 1)
}

pub fn new_account(directory_id: u64, email: &str) -> CreateAccount {
    CreateAccount {
        tenant_id: TENANT,
        directory_id,
        email: email.to_owned(),
        username: email.split('@').next().unwrap().to_owned(),
        given_name: "Test".to_owned(),
        middle_name: None,
        surname: "User".to_owned(),
        hashed_password: hasher().hash(PASSWORD).unwrap(),
        status: Status::Enabled,
    }
}

/// ```text
/// app ─┬─ dir A (default account store) ── a1, group G2
///      └─ org O ─┬─ group G (in dir B) ── b1      (b2 is in B but not in G)
///                └─ dir C ── c1
/// ```
pub struct Graph {
    pub app: u64,
    pub org: u64,
    pub dir_a: u64,
    pub dir_b: u64,
    pub dir_c: u64,
    pub group: u64,
    pub a1: Account,
    pub b1: Account,
    pub b2: Account,
    pub c1: Account,
}

pub async fn graph<R: Backend>(repo: &R) -> Graph {
    let app = repo
        .create_application(CreateApplication::new(TENANT, "portal"))
        .await
        .unwrap();
    let org = repo
        .create_organization(CreateOrganization::new(TENANT, "Acme Corp"))
        .await
        .unwrap();
    let dir_a = repo
        .create_directory(CreateDirectory::new(TENANT, "A"))
        .await
        .unwrap();
    let dir_b = repo
        .create_directory(CreateDirectory::new(TENANT, "B"))
        .await
        .unwrap();
    let dir_c = repo
        .create_directory(CreateDirectory::new(TENANT, "C"))
        .await
        .unwrap();
    let group = repo
        .create_group(CreateGroup::new(TENANT, dir_b.id, "Readers"))
        .await
        .unwrap();
    repo.create_group(CreateGroup::new(TENANT, dir_a.id, "Staff"))
        .await
        .unwrap();

    let app_parent = MappingParent::Application(app.id);
    let org_parent = MappingParent::Organization(org.id);
    repo.create_mapping(
        CreateMapping::new(TENANT, app_parent, AccountStoreRef::Directory(dir_a.id))
            .default_account_store(),
    )
    .await
    .unwrap();
    repo.create_mapping(CreateMapping::new(
        TENANT,
        app_parent,
        AccountStoreRef::Organization(org.id),
    ))
    .await
    .unwrap();
    repo.create_mapping(
        CreateMapping::new(TENANT, org_parent, AccountStoreRef::Group(group.id))
            .default_account_store(),
    )
    .await
    .unwrap();
    repo.create_mapping(CreateMapping::new(
        TENANT,
        org_parent,
        AccountStoreRef::Directory(dir_c.id),
    ))
    .await
    .unwrap();

    let a1 = repo.create_account(new_account(dir_a.id, "a1@example.com")).await.unwrap();
    let b1 = repo.create_account(new_account(dir_b.id, "b1@example.com")).await.unwrap();
    let b2 = repo.create_account(new_account(dir_b.id, "b2@example.com")).await.unwrap();
    let c1 = repo.create_account(new_account(dir_c.id, "c1@example.com")).await.unwrap();
    repo.add_membership(TENANT, b1.id, group.id).await.unwrap();

    Graph {
        app: app.id,
        org: org.id,
        dir_a: dir_a.id,
        dir_b: dir_b.id,
        dir_c: dir_c.id,
        group: group.id,
        a1,
        b1,
        b2,
        c1,
    }
}

fn by_email() -> CollectionQuery {
    CollectionQuery::new().order_by(SortField::Email, SortDirection::Asc)
}

async fn emails<R: Backend>(repo: &R, root: NodeRef) -> Vec<String> {
    ListAccountsAction::new(repo.clone())
        .execute(TENANT, root, by_email())
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|a| a.email)
        .collect()
}

pub async fn reachability_follows_every_path<R: Backend>(repo: R) {
    let g = graph(&repo).await;
    let app = NodeRef::application(g.app);

    assert_eq!(
        emails(&repo, app).await,
        ["a1@example.com", "b1@example.com", "c1@example.com"]
    );
    assert_eq!(
        emails(&repo, AccountStoreRef::Organization(g.org).node_ref()).await,
        ["b1@example.com", "c1@example.com"]
    );
    assert_eq!(
        emails(&repo, AccountStoreRef::Directory(g.dir_b).node_ref()).await,
        ["b1@example.com", "b2@example.com"]
    );

    let groups = ListGroupsAction::new(repo.clone())
        .execute(TENANT, app, CollectionQuery::new())
        .await
        .unwrap();
    assert_eq!(groups.size, 2);

    let check = CheckMembershipAction::new(repo.clone());
    assert!(check.execute(TENANT, g.b1.id, app).await.unwrap());
    assert!(!check.execute(TENANT, g.b2.id, app).await.unwrap());
    assert!(check.execute(TENANT, g.a1.id, app).await.unwrap());
}

pub async fn status_changes_are_visible_immediately<R: Backend>(repo: R) {
    let g = graph(&repo).await;
    let app = NodeRef::application(g.app);
    let dir_c = AccountStoreRef::Directory(g.dir_c).node_ref();

    repo.set_status(TENANT, dir_c, Status::Disabled).await.unwrap();
    assert_eq!(emails(&repo, app).await, ["a1@example.com", "b1@example.com"]);

    repo.set_status(TENANT, dir_c, Status::Enabled).await.unwrap();
    assert_eq!(
        emails(&repo, app).await,
        ["a1@example.com", "b1@example.com", "c1@example.com"]
    );

    // the owning directory gates accounts reached through a group
    let dir_b = AccountStoreRef::Directory(g.dir_b).node_ref();
    repo.set_status(TENANT, dir_b, Status::Disabled).await.unwrap();
    assert_eq!(emails(&repo, app).await, ["a1@example.com", "c1@example.com"]);
    repo.set_status(TENANT, dir_b, Status::Enabled).await.unwrap();

    let org = AccountStoreRef::Organization(g.org).node_ref();
    repo.set_status(TENANT, org, Status::Disabled).await.unwrap();
    assert_eq!(emails(&repo, app).await, ["a1@example.com"]);
    repo.set_status(TENANT, org, Status::Enabled).await.unwrap();

    repo.set_account_status(TENANT, g.c1.id, Status::Disabled)
        .await
        .unwrap();
    // disabled accounts stay listed; login rejects them
    assert_eq!(emails(&repo, app).await.len(), 3);
    assert_eq!(
        repo.find_status(TENANT, NodeRef::account(g.c1.id)).await.unwrap(),
        Some(Status::Disabled)
    );
}

pub async fn collection_queries_filter_and_paginate<R: Backend>(repo: R) {
    let g = graph(&repo).await;
    let app = NodeRef::application(g.app);
    let list = ListAccountsAction::new(repo.clone());

    let first = list
        .execute(TENANT, app, by_email().limit(2))
        .await
        .unwrap();
    assert_eq!(first.size, 3);
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].id, g.a1.id);

    let second = list
        .execute(TENANT, app, by_email().limit(2).offset(2))
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].id, g.c1.id);

    let login = list
        .execute(TENANT, app, CollectionQuery::new().login("B1@EXAMPLE.COM"))
        .await
        .unwrap();
    assert_eq!(login.size, 1);
    assert_eq!(login.items[0].id, g.b1.id);

    let search = list
        .execute(TENANT, app, CollectionQuery::new().search("c1@"))
        .await
        .unwrap();
    assert_eq!(search.items.len(), 1);

    let disabled = list
        .execute(TENANT, app, CollectionQuery::new().status(Status::Disabled))
        .await
        .unwrap();
    assert_eq!(disabled.size, 0);

    let err = list
        .execute(TENANT, app, CollectionQuery::new().offset(u64::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let err = list
        .execute(
            TENANT,
            app,
            CollectionQuery::new().order_by(SortField::Name, SortDirection::Asc),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let count = repo
        .count(
            TENANT,
            storegraph::relation(
                storegraph::topology::NodeType::Organization,
                storegraph::topology::NodeType::Account,
            ),
            g.org,
            &CollectionQuery::new(),
        )
        .await
        .unwrap();
    assert_eq!(count, 2);
}

pub async fn at_most_one_default_per_parent<R: Backend>(repo: R) {
    let app = repo
        .create_application(CreateApplication::new(TENANT, "portal"))
        .await
        .unwrap();
    let parent = MappingParent::Application(app.id);
    let assign = AssignAccountStoreAction::new(repo.clone());

    let mut mappings = Vec::new();
    for name in ["one", "two", "three"] {
        let dir = repo
            .create_directory(CreateDirectory::new(TENANT, name))
            .await
            .unwrap();
        let mapping = assign
            .execute(
                CreateMapping::new(TENANT, parent, AccountStoreRef::Directory(dir.id))
                    .default_account_store(),
            )
            .await
            .unwrap();
        mappings.push(mapping);
    }

    let listed = repo.list_mappings(TENANT, parent).await.unwrap();
    assert_eq!(listed.iter().map(|m| m.list_index).collect::<Vec<_>>(), [0, 1, 2]);
    assert_eq!(listed.iter().filter(|m| m.is_default_account_store).count(), 1);
    let default = repo
        .find_default_account_store(TENANT, parent)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(default.id, mappings[2].id);

    // move the first mapping to the end and make it the default
    let updated = UpdateMappingAction::new(repo.clone())
        .execute(
            TENANT,
            mappings[0].id,
            UpdateMapping {
                list_index: Some(2),
                is_default_account_store: Some(true),
                is_default_group_store: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.list_index, 2);

    let listed = repo.list_mappings(TENANT, parent).await.unwrap();
    assert_eq!(
        listed.iter().map(|m| m.id).collect::<Vec<_>>(),
        [mappings[1].id, mappings[2].id, mappings[0].id]
    );
    assert_eq!(listed.iter().filter(|m| m.is_default_account_store).count(), 1);
    let app = repo.find_application(TENANT, app.id).await.unwrap().unwrap();
    assert_eq!(app.default_account_store_mapping_id, Some(mappings[0].id));

    // removing the default clears the pointer and closes the gap
    RemoveMappingAction::new(repo.clone())
        .execute(TENANT, mappings[0].id)
        .await
        .unwrap();
    assert!(repo.find_default_account_store(TENANT, parent).await.unwrap().is_none());
    let app = repo.find_application(TENANT, app.id).await.unwrap().unwrap();
    assert_eq!(app.default_account_store_mapping_id, None);
    let listed = repo.list_mappings(TENANT, parent).await.unwrap();
    assert_eq!(listed.iter().map(|m| m.list_index).collect::<Vec<_>>(), [0, 1]);

    let duplicate = assign
        .execute(CreateMapping::new(TENANT, parent, listed[0].account_store))
        .await
        .unwrap_err();
    assert!(matches!(duplicate, StoreError::Validation(_)));
}

pub async fn deleting_a_default_store_clears_pointers<R: Backend>(repo: R) {
    let g = graph(&repo).await;

    DeleteAccountStoreAction::new(repo.clone())
        .execute(TENANT, AccountStoreRef::Directory(g.dir_a))
        .await
        .unwrap();

    let app = repo.find_application(TENANT, g.app).await.unwrap().unwrap();
    assert_eq!(app.default_account_store_mapping_id, None);
    let remaining = repo
        .list_mappings(TENANT, MappingParent::Application(g.app))
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].list_index, 0);
    assert!(repo.find_account(TENANT, g.a1.id).await.unwrap().is_none());
    assert_eq!(
        emails(&repo, NodeRef::application(g.app)).await,
        ["b1@example.com", "c1@example.com"]
    );

    // groups of a deleted directory lose their mappings too
    DeleteAccountStoreAction::new(repo.clone())
        .execute(TENANT, AccountStoreRef::Directory(g.dir_b))
        .await
        .unwrap();
    let org = repo.find_organization(TENANT, g.org).await.unwrap().unwrap();
    assert_eq!(org.default_account_store_mapping_id, None);
    assert!(repo.find_group(TENANT, g.group).await.unwrap().is_none());
    assert!(repo.find_account(TENANT, g.b2.id).await.unwrap().is_none());
}

struct LoginFixture {
    app: u64,
    default_dir: u64,
    jane: Account,
}

/// An application whose default store is empty, with `jane@example.com`
/// living in a second mapped directory.
async fn login_fixture<R: Backend>(repo: &R, provisioning: Status) -> LoginFixture {
    let app = repo
        .create_application(CreateApplication::new(TENANT, "portal"))
        .await
        .unwrap();
    let partners = repo
        .create_directory(CreateDirectory::new(TENANT, "partners"))
        .await
        .unwrap();
    let default_dir = repo
        .create_directory(CreateDirectory::new(TENANT, "customers"))
        .await
        .unwrap();
    let parent = MappingParent::Application(app.id);
    repo.create_mapping(CreateMapping::new(
        TENANT,
        parent,
        AccountStoreRef::Directory(partners.id),
    ))
    .await
    .unwrap();
    repo.create_mapping(
        CreateMapping::new(TENANT, parent, AccountStoreRef::Directory(default_dir.id))
            .default_account_store(),
    )
    .await
    .unwrap();

    let jane = repo
        .create_account(new_account(partners.id, "jane@example.com"))
        .await
        .unwrap();
    repo.save_linking_policy(AccountLinkingPolicy {
        tenant_id: TENANT,
        application_id: app.id,
        status: Status::Enabled,
        automatic_provisioning: provisioning,
    })
    .await
    .unwrap();

    LoginFixture {
        app: app.id,
        default_dir: default_dir.id,
        jane,
    }
}

fn login(app: u64, login: &str) -> AuthenticationRequest {
    AuthenticationRequest {
        tenant_id: TENANT,
        application_id: app,
        login: login.to_owned(),
        password: SecretString::new(PASSWORD),
        account_store: None,
    }
}

pub async fn login_provisions_into_default_store<R: Backend>(repo: R) {
    let f = login_fixture(&repo, Status::Enabled).await;
    let action = AuthenticateAction::with_hasher(repo.clone(), hasher());

    let first = action.execute(&login(f.app, "jane@example.com")).await.unwrap();
    assert_eq!(first.resolution, Resolution::Provisioned);
    assert_eq!(first.verified_account_id, f.jane.id);
    assert_ne!(first.account.id, f.jane.id);
    assert_eq!(first.account.directory_id, f.default_dir);
    assert_eq!(first.account.email, f.jane.email);

    assert_eq!(
        repo.find_linked_account_ids(TENANT, f.jane.id).await.unwrap(),
        [first.account.id]
    );

    // the provisioned copy sorts after jane, so the second login links
    let second = action.execute(&login(f.app, "jane@example.com")).await.unwrap();
    assert_eq!(second.resolution, Resolution::Linked);
    assert_eq!(second.account.id, first.account.id);
    assert_eq!(
        repo.find_linked_account_ids(TENANT, f.jane.id).await.unwrap().len(),
        1
    );
}

pub async fn login_substitutes_linked_account<R: Backend>(repo: R) {
    let f = login_fixture(&repo, Status::Disabled).await;
    let action = AuthenticateAction::with_hasher(repo.clone(), hasher());

    let unlinked = action.execute(&login(f.app, "jane")).await.unwrap();
    assert_eq!(unlinked.resolution, Resolution::Authenticated);
    assert_eq!(unlinked.account.id, f.jane.id);

    let mut copy = new_account(f.default_dir, "jane.doe@example.com");
    copy.username = "jane.doe".to_owned();
    let copy = repo.create_account(copy).await.unwrap();
    LinkAccountsAction::new(repo.clone())
        .execute(TENANT, copy.id, f.jane.id)
        .await
        .unwrap();

    let linked = action.execute(&login(f.app, "jane")).await.unwrap();
    assert_eq!(linked.resolution, Resolution::Linked);
    assert_eq!(linked.account.id, copy.id);
    assert_eq!(linked.verified_account_id, f.jane.id);

    let err = action
        .execute(&AuthenticationRequest {
            password: SecretString::new("wrong"),
            ..login(f.app, "jane")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AuthenticationFailed(_)));
}

pub async fn login_folds_non_ascii_case<R: Backend>(repo: R) {
    let app = repo
        .create_application(CreateApplication::new(TENANT, "portal"))
        .await
        .unwrap();
    let dir = repo
        .create_directory(CreateDirectory::new(TENANT, "europe"))
        .await
        .unwrap();
    repo.create_mapping(CreateMapping::new(
        TENANT,
        MappingParent::Application(app.id),
        AccountStoreRef::Directory(dir.id),
    ))
    .await
    .unwrap();
    let elise = repo
        .create_account(new_account(dir.id, "ÉLISE@example.com"))
        .await
        .unwrap();
    assert_eq!(elise.username, "ÉLISE");

    let action = AuthenticateAction::with_hasher(repo.clone(), hasher());
    for name in ["ÉLISE@example.com", "élise@example.com", "Élise@EXAMPLE.com", "ÉLISE", "élise"] {
        let result = action.execute(&login(app.id, name)).await.unwrap();
        assert_eq!(result.account.id, elise.id, "login {name}");
    }

    let duplicate = repo
        .create_account(new_account(dir.id, "élise@example.com"))
        .await
        .unwrap_err();
    assert_eq!(duplicate, StoreError::AlreadyExists);

    let search = ListAccountsAction::new(repo.clone())
        .execute(TENANT, NodeRef::application(app.id), CollectionQuery::new().search("élise@"))
        .await
        .unwrap();
    assert_eq!(search.size, 1);
}

pub async fn login_provisions_into_disabled_default_store<R: Backend>(repo: R) {
    let f = login_fixture(&repo, Status::Enabled).await;
    repo.set_status(
        TENANT,
        AccountStoreRef::Directory(f.default_dir).node_ref(),
        Status::Disabled,
    )
    .await
    .unwrap();
    let action = AuthenticateAction::with_hasher(repo.clone(), hasher());

    let first = action.execute(&login(f.app, "jane@example.com")).await.unwrap();
    assert_eq!(first.resolution, Resolution::Provisioned);
    assert_eq!(first.account.directory_id, f.default_dir);

    let second = action.execute(&login(f.app, "jane@example.com")).await.unwrap();
    assert_eq!(second.resolution, Resolution::Linked);
    assert_eq!(second.account.id, first.account.id);
    assert_eq!(
        repo.find_linked_account_ids(TENANT, f.jane.id).await.unwrap(),
        [first.account.id]
    );
}

/// The default store is a group in the candidate's own directory, which
/// cannot hold a second account with the same email.
pub async fn login_provisions_membership_in_own_directory<R: Backend>(repo: R) {
    let app = repo
        .create_application(CreateApplication::new(TENANT, "portal"))
        .await
        .unwrap();
    let dir = repo
        .create_directory(CreateDirectory::new(TENANT, "staff"))
        .await
        .unwrap();
    let group = repo
        .create_group(CreateGroup::new(TENANT, dir.id, "portal-users"))
        .await
        .unwrap();
    let parent = MappingParent::Application(app.id);
    repo.create_mapping(CreateMapping::new(TENANT, parent, AccountStoreRef::Directory(dir.id)))
        .await
        .unwrap();
    repo.create_mapping(
        CreateMapping::new(TENANT, parent, AccountStoreRef::Group(group.id)).default_account_store(),
    )
    .await
    .unwrap();
    repo.save_linking_policy(AccountLinkingPolicy {
        tenant_id: TENANT,
        application_id: app.id,
        status: Status::Enabled,
        automatic_provisioning: Status::Enabled,
    })
    .await
    .unwrap();
    let sam = repo
        .create_account(new_account(dir.id, "sam@example.com"))
        .await
        .unwrap();
    let action = AuthenticateAction::with_hasher(repo.clone(), hasher());

    let first = action.execute(&login(app.id, "sam@example.com")).await.unwrap();
    assert_eq!(first.resolution, Resolution::Provisioned);
    assert_eq!(first.account.id, sam.id);
    assert!(repo.find_membership(TENANT, sam.id, group.id).await.unwrap().is_some());
    assert!(repo.find_linked_account_ids(TENANT, sam.id).await.unwrap().is_empty());

    let second = action.execute(&login(app.id, "sam@example.com")).await.unwrap();
    assert_eq!(second.resolution, Resolution::Authenticated);
    assert_eq!(second.account.id, sam.id);
}

pub async fn login_through_explicit_group_or_organization<R: Backend>(repo: R) {
    let g = graph(&repo).await;
    let action = AuthenticateAction::with_hasher(repo.clone(), hasher());
    let through = |name: &str, store: AccountStoreRef| AuthenticationRequest {
        account_store: Some(store),
        ..login(g.app, name)
    };
    let no_such_account = StoreError::AuthenticationFailed(AuthFailure::NoSuchAccount);

    let group = AccountStoreRef::Group(g.group);
    let result = action.execute(&through("b1@example.com", group)).await.unwrap();
    assert_eq!(result.account.id, g.b1.id);
    assert_eq!(
        action.execute(&through("b2@example.com", group)).await.unwrap_err(),
        no_such_account
    );

    let org = AccountStoreRef::Organization(g.org);
    let result = action.execute(&through("c1@example.com", org)).await.unwrap();
    assert_eq!(result.account.id, g.c1.id);
    assert_eq!(
        action.execute(&through("a1@example.com", org)).await.unwrap_err(),
        no_such_account
    );

    repo.set_status(TENANT, group.node_ref(), Status::Disabled).await.unwrap();
    assert_eq!(
        action.execute(&through("b1@example.com", group)).await.unwrap_err(),
        no_such_account
    );

    // a group of a mapped directory is reachable, one of an unmapped one is not
    let staff = ListGroupsAction::new(repo.clone())
        .execute(TENANT, AccountStoreRef::Directory(g.dir_a).node_ref(), CollectionQuery::new())
        .await
        .unwrap();
    let staff = AccountStoreRef::Group(staff.items[0].id);
    assert_eq!(
        action.execute(&through("a1@example.com", staff)).await.unwrap_err(),
        no_such_account
    );
    let loose = repo
        .create_directory(CreateDirectory::new(TENANT, "loose"))
        .await
        .unwrap();
    let loose = repo
        .create_group(CreateGroup::new(TENANT, loose.id, "loose"))
        .await
        .unwrap();
    let err = action
        .execute(&through("a1@example.com", AccountStoreRef::Group(loose.id)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}
