use chrono::{DateTime, Utc};

use crate::AuthFailure;
use crate::actions::Resolution;
use crate::repository::{AccountStoreRef, MappingParent};

/// Events emitted by storegraph actions.
///
/// Dispatching with no registered listeners is a no-op. Register listeners
/// via [`register_event_listeners`](crate::register_event_listeners).
#[derive(Debug, Clone)]
pub enum StoreEvent {
    // login resolution
    LoginSucceeded {
        tenant_id: u64,
        application_id: u64,
        account_id: u64,
        resolution: Resolution,
        at: DateTime<Utc>,
    },
    LoginFailed {
        tenant_id: u64,
        application_id: u64,
        reason: AuthFailure,
        at: DateTime<Utc>,
    },

    // account linking
    AccountLinked {
        tenant_id: u64,
        account_id: u64,
        linked_account_id: u64,
        at: DateTime<Utc>,
    },
    AccountUnlinked {
        tenant_id: u64,
        account_id: u64,
        linked_account_id: u64,
        at: DateTime<Utc>,
    },
    AccountProvisioned {
        tenant_id: u64,
        application_id: u64,
        source_account_id: u64,
        account_id: u64,
        store: AccountStoreRef,
        at: DateTime<Utc>,
    },

    // mappings
    MappingCreated {
        tenant_id: u64,
        mapping_id: u64,
        parent: MappingParent,
        store: AccountStoreRef,
        at: DateTime<Utc>,
    },
    MappingUpdated {
        tenant_id: u64,
        mapping_id: u64,
        parent: MappingParent,
        at: DateTime<Utc>,
    },
    MappingDeleted {
        tenant_id: u64,
        mapping_id: u64,
        parent: MappingParent,
        at: DateTime<Utc>,
    },
    AccountStoreDeleted {
        tenant_id: u64,
        store: AccountStoreRef,
        at: DateTime<Utc>,
    },
}

impl StoreEvent {
    /// Dot-separated event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoginSucceeded { .. } => "auth.login.succeeded",
            Self::LoginFailed { .. } => "auth.login.failed",
            Self::AccountLinked { .. } => "account.linked",
            Self::AccountUnlinked { .. } => "account.unlinked",
            Self::AccountProvisioned { .. } => "account.provisioned",
            Self::MappingCreated { .. } => "mapping.created",
            Self::MappingUpdated { .. } => "mapping.updated",
            Self::MappingDeleted { .. } => "mapping.deleted",
            Self::AccountStoreDeleted { .. } => "account_store.deleted",
        }
    }

    pub fn tenant_id(&self) -> u64 {
        match self {
            Self::LoginSucceeded { tenant_id, .. }
            | Self::LoginFailed { tenant_id, .. }
            | Self::AccountLinked { tenant_id, .. }
            | Self::AccountUnlinked { tenant_id, .. }
            | Self::AccountProvisioned { tenant_id, .. }
            | Self::MappingCreated { tenant_id, .. }
            | Self::MappingUpdated { tenant_id, .. }
            | Self::MappingDeleted { tenant_id, .. }
            | Self::AccountStoreDeleted { tenant_id, .. } => *tenant_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::LoginSucceeded { at, .. }
            | Self::LoginFailed { at, .. }
            | Self::AccountLinked { at, .. }
            | Self::AccountUnlinked { at, .. }
            | Self::AccountProvisioned { at, .. }
            | Self::MappingCreated { at, .. }
            | Self::MappingUpdated { at, .. }
            | Self::MappingDeleted { at, .. }
            | Self::AccountStoreDeleted { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let now = Utc::now();

        assert_eq!(
            StoreEvent::LoginSucceeded {
                tenant_id: 1,
                application_id: 2,
                account_id: 3,
                resolution: Resolution::Provisioned,
                at: now,
            }
            .name(),
            "auth.login.succeeded"
        );
        assert_eq!(
            StoreEvent::LoginFailed {
                tenant_id: 1,
                application_id: 2,
                reason: AuthFailure::InvalidPassword,
                at: now,
            }
            .name(),
            "auth.login.failed"
        );
        assert_eq!(
            StoreEvent::AccountStoreDeleted {
                tenant_id: 1,
                store: AccountStoreRef::Group(4),
                at: now,
            }
            .name(),
            "account_store.deleted"
        );
    }

    #[test]
    fn test_event_accessors() {
        let now = Utc::now();
        let event = StoreEvent::MappingDeleted {
            tenant_id: 9,
            mapping_id: 5,
            parent: MappingParent::Application(1),
            at: now,
        };

        assert_eq!(event.tenant_id(), 9);
        assert_eq!(event.timestamp(), now);
        assert!(format!("{event:?}").contains("MappingDeleted"));
    }
}
