//! Operations built on the repository traits. Each action is a struct with a
//! `new` constructor and an async `execute`; actions that change the graph
//! dispatch a [`StoreEvent`](crate::events::StoreEvent) and log under the
//! `storegraph` target.

mod authenticate;
mod delete_store;
mod link;
mod list;
mod mapping;

pub use authenticate::{
    AuthenticateAction, AuthenticationRequest, AuthenticationResult, Resolution,
};
pub use delete_store::DeleteAccountStoreAction;
pub use link::{LinkAccountsAction, UnlinkAccountsAction};
pub use list::{CheckMembershipAction, ListAccountsAction, ListGroupsAction};
pub use mapping::{AssignAccountStoreAction, RemoveMappingAction, UpdateMappingAction};
