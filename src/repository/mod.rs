//! Repository traits and data types.
//!
//! Storage seams for the account store graph. Implement these traits to back
//! storegraph with another database; the `sqlx_sqlite` and `sqlx_postgres`
//! features provide implementations of all of them.
//!
//! # Traits
//!
//! | Trait | Description |
//! |-------|-------------|
//! | [`AccountRepository`] | Account CRUD |
//! | [`AccountStoreRepository`] | Directories, groups, organizations, applications |
//! | [`GroupMembershipRepository`] | Account to group membership rows |
//! | [`MappingRepository`] | Account store mappings with default-store invariants |
//! | [`AccountLinkRepository`] | Account links, linking policies and provisioning |
//! | [`ReachabilityRepository`] | Executes derived relations |
//!
//! # Data Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Account`] | A login identity owned by a directory |
//! | [`Group`], [`Directory`], [`Organization`] | Account stores |
//! | [`Application`] | Consumer of account stores |
//! | [`AccountStoreMapping`] | Store attached to an application or organization |
//! | [`AccountLink`] | Undirected pair of linked accounts |
//! | [`AccountLinkingPolicy`] | Per-application linking settings |
//!
//! # Mock Implementation
//!
//! Enable the `mocks` feature for [`MockStore`], an in-memory backend that
//! implements every trait and evaluates derived relations itself.

mod account;
mod link;
mod mapping;
mod membership;
mod reachability;
mod status;
mod store;

#[cfg(any(test, feature = "mocks"))]
mod mock;

pub use account::{Account, AccountRepository, CreateAccount, login_key};
pub use link::{AccountLink, AccountLinkRepository, AccountLinkingPolicy, ProvisionTarget};
pub use mapping::{AccountStoreMapping, CreateMapping, MappingRepository, UpdateMapping};
pub use membership::{GroupMembership, GroupMembershipRepository};
pub use reachability::ReachabilityRepository;
pub use status::{AccountStoreRef, MappingParent, NodeRef, Status};
pub use store::{
    AccountStoreRepository, Application, CreateApplication, CreateDirectory, CreateGroup,
    CreateOrganization, Directory, Group, Organization,
};

#[cfg(any(test, feature = "mocks"))]
pub use mock::MockStore;
