//! End-to-end tests against the in-memory [`MockStore`].
//!
//! Run with: `cargo test --features mocks --test e2e_mock`

#![cfg(feature = "mocks")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use storegraph::MockStore;
use storegraph::topology::{NodeType, find_paths, topology};

#[test]
fn test_membership_path_counts() {
    let count = |from, to| find_paths(topology(), from, to).len();

    assert_eq!(count(NodeType::Organization, NodeType::Account), 3);
    assert_eq!(count(NodeType::Account, NodeType::Application), 6);
    assert_eq!(count(NodeType::Application, NodeType::Group), 4);
    assert_eq!(count(NodeType::Application, NodeType::Directory), 2);
    assert_eq!(count(NodeType::Application, NodeType::Application), 0);
}

#[tokio::test]
async fn test_reachability_follows_every_path() {
    common::reachability_follows_every_path(MockStore::new()).await;
}

#[tokio::test]
async fn test_status_changes_are_visible_immediately() {
    common::status_changes_are_visible_immediately(MockStore::new()).await;
}

#[tokio::test]
async fn test_collection_queries_filter_and_paginate() {
    common::collection_queries_filter_and_paginate(MockStore::new()).await;
}

#[tokio::test]
async fn test_at_most_one_default_per_parent() {
    common::at_most_one_default_per_parent(MockStore::new()).await;
}

#[tokio::test]
async fn test_deleting_a_default_store_clears_pointers() {
    common::deleting_a_default_store_clears_pointers(MockStore::new()).await;
}

#[tokio::test]
async fn test_login_provisions_into_default_store() {
    common::login_provisions_into_default_store(MockStore::new()).await;
}

#[tokio::test]
async fn test_login_substitutes_linked_account() {
    common::login_substitutes_linked_account(MockStore::new()).await;
}

#[tokio::test]
async fn test_login_folds_non_ascii_case() {
    common::login_folds_non_ascii_case(MockStore::new()).await;
}

#[tokio::test]
async fn test_login_provisions_into_disabled_default_store() {
    common::login_provisions_into_disabled_default_store(MockStore::new()).await;
}

#[tokio::test]
async fn test_login_provisions_membership_in_own_directory() {
    common::login_provisions_membership_in_own_directory(MockStore::new()).await;
}

#[tokio::test]
async fn test_login_through_explicit_group_or_organization() {
    common::login_through_explicit_group_or_organization(MockStore::new()).await;
}
