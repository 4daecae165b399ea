//! Node types of the account store topology.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A node type in the account store graph.
///
/// Variants are declared in hierarchy order: `Account` is the bottom of the
/// hierarchy and `Application` the top. Every structural edge moves either up
/// or down this order, which is what keeps path search acyclic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Account,
    GroupMembership,
    Group,
    Directory,
    OrganizationMapping,
    Organization,
    ApplicationMapping,
    Application,
}

/// Direction of travel along the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward `Application`.
    Up,
    /// Toward `Account`.
    Down,
}

impl NodeType {
    /// Every node type, in hierarchy order.
    pub const ALL: [Self; 8] = [
        Self::Account,
        Self::GroupMembership,
        Self::Group,
        Self::Directory,
        Self::OrganizationMapping,
        Self::Organization,
        Self::ApplicationMapping,
        Self::Application,
    ];

    /// Position in hierarchy order (0 = `Account`).
    pub fn rank(self) -> usize {
        self as usize
    }

    /// Direction from `self` to `other`, or `None` when they are the same type.
    pub fn direction_to(self, other: Self) -> Option<Direction> {
        match self.rank().cmp(&other.rank()) {
            std::cmp::Ordering::Less => Some(Direction::Up),
            std::cmp::Ordering::Greater => Some(Direction::Down),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::Account => "accounts",
            Self::GroupMembership => "group_memberships",
            Self::Group => "groups",
            Self::Directory => "directories",
            Self::OrganizationMapping => "organization_account_store_mappings",
            Self::Organization => "organizations",
            Self::ApplicationMapping => "account_store_mappings",
            Self::Application => "applications",
        }
    }

    /// Whether rows of this type carry an enablement `status` column.
    pub fn has_status(self) -> bool {
        matches!(
            self,
            Self::Account | Self::Group | Self::Directory | Self::Organization | Self::Application
        )
    }

    /// Whether this is one of the discriminated-union mapping entities.
    pub fn is_mapping(self) -> bool {
        matches!(self, Self::OrganizationMapping | Self::ApplicationMapping)
    }

    /// Whether rows of this type belong to exactly one directory.
    pub fn is_directory_owned(self) -> bool {
        matches!(self, Self::Account | Self::Group)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::GroupMembership => "group_membership",
            Self::Group => "group",
            Self::Directory => "directory",
            Self::OrganizationMapping => "organization_mapping",
            Self::Organization => "organization",
            Self::ApplicationMapping => "application_mapping",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
