//! Account store topology resolution for multi-tenant identity backends.
//!
//! Tenants own directories, groups, organizations and applications. Accounts
//! reach applications through account store mappings, possibly across
//! several levels of indirection. This crate models that graph, compiles
//! every membership path between two node types into a reusable derived
//! relation, keeps the mapping tables' default-store invariants, and resolves
//! logins (including account linking) against the graph.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`topology`] | Node types, edges and path search |
//! | [`query`] | Path compilation, derived relations, collection queries |
//! | [`invariants`] | Default-store and ordering rules for mapping writes |
//! | [`repository`] | Data types and storage traits |
//! | [`actions`] | Login resolution, listing and mapping administration |
//! | [`events`] | Event dispatch for actions |
//!
//! # Features
//!
//! - `mocks`: in-memory [`MockStore`] backend
//! - `sqlx_sqlite`: `SQLite` backend in [`sqlite`]
//! - `sqlx_postgres`: `PostgreSQL` backend in [`postgres`]
//! - `tracing`: span instrumentation and [`events::listeners::TracingListener`]

use serde::Serialize;
use std::fmt;

pub mod actions;
pub mod config;
pub mod crypto;
pub mod events;
pub mod invariants;
pub mod query;
pub mod repository;
pub mod topology;

#[cfg(feature = "sqlx_postgres")]
pub mod postgres;
#[cfg(feature = "sqlx_sqlite")]
pub mod sqlite;

pub use config::{HashingConfig, PaginationConfig, StoreGraphConfig};
pub use crypto::{Argon2Hasher, PasswordHasher, SecretString};
pub use events::{dispatch, register_event_listeners};
pub use query::{CollectionQuery, DerivedRelation, Page, relation};
pub use repository::{
    Account, AccountLink, AccountLinkRepository, AccountLinkingPolicy, AccountRepository,
    AccountStoreMapping, AccountStoreRef, AccountStoreRepository, Application, CreateAccount,
    CreateApplication, CreateDirectory, CreateGroup, CreateMapping, CreateOrganization, Directory,
    Group, GroupMembership, GroupMembershipRepository, MappingParent, MappingRepository, NodeRef,
    Organization, ReachabilityRepository, Status, UpdateMapping,
};

#[cfg(any(test, feature = "mocks"))]
pub use repository::MockStore;

/// Why a login attempt was rejected.
///
/// Callers should surface every reason with the same HTTP status so that
/// responses do not reveal whether an account exists. The codes are stable
/// and meant for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthFailure {
    NoSuchAccount,
    InvalidPassword,
    AccountDisabled,
    AccountUnverified,
    ApplicationDisabled,
}

impl AuthFailure {
    pub fn code(self) -> u32 {
        match self {
            Self::InvalidPassword => 7100,
            Self::AccountDisabled => 7101,
            Self::AccountUnverified => 7102,
            Self::ApplicationDisabled => 7103,
            Self::NoSuchAccount => 7104,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoSuchAccount => "no_such_account",
            Self::InvalidPassword => "invalid_password",
            Self::AccountDisabled => "account_disabled",
            Self::AccountUnverified => "account_unverified",
            Self::ApplicationDisabled => "application_disabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The tenant is misconfigured, e.g. a required default store is unset.
    ConfigurationError(String),
    /// A write would break a graph invariant. Nothing was written.
    Validation(String),
    AuthenticationFailed(AuthFailure),
    NotFound,
    AlreadyExists,
    PasswordHashError,
    DatabaseError(String),
    Internal(String),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// HTTP status the calling layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ConfigurationError(_) | Self::Validation(_) | Self::AuthenticationFailed(_) => {
                400
            }
            Self::NotFound => 404,
            Self::AlreadyExists => 409,
            Self::PasswordHashError | Self::DatabaseError(_) | Self::Internal(_) => 500,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigurationError(_) => "CONFIGURATION_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PasswordHashError => "PASSWORD_HASH_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl std::error::Error for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            Self::Validation(msg) => write!(f, "Validation failed: {msg}"),
            Self::AuthenticationFailed(_) => write!(f, "Invalid username or password"),
            Self::NotFound => write!(f, "Resource not found"),
            Self::AlreadyExists => write!(f, "Resource already exists"),
            Self::PasswordHashError => write!(f, "Failed to verify password"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

/// Structured error body for the HTTP layer.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub code: String,
    pub error: String,
    /// Diagnostic code for failed logins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<u32>,
}

impl From<&StoreError> for ErrorResponse {
    fn from(err: &StoreError) -> Self {
        let reason = match err {
            StoreError::AuthenticationFailed(failure) => Some(failure.code()),
            _ => None,
        };

        ErrorResponse {
            status: err.http_status(),
            code: err.code().to_owned(),
            error: err.to_string(),
            reason,
        }
    }
}
