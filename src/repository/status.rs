use serde::{Deserialize, Serialize};
use std::fmt;

use crate::topology::NodeType;

/// Enablement status of accounts, groups, directories, organizations and
/// applications. Only accounts use `Unverified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Enabled,
    Disabled,
    Unverified,
}

impl Status {
    /// Database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
            Self::Unverified => "UNVERIFIED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ENABLED" => Some(Self::Enabled),
            "DISABLED" => Some(Self::Disabled),
            "UNVERIFIED" => Some(Self::Unverified),
            _ => None,
        }
    }

    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed reference to a single row in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub node: NodeType,
    pub id: u64,
}

impl NodeRef {
    pub fn new(node: NodeType, id: u64) -> Self {
        Self { node, id }
    }

    pub fn account(id: u64) -> Self {
        Self::new(NodeType::Account, id)
    }

    pub fn application(id: u64) -> Self {
        Self::new(NodeType::Application, id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.node, self.id)
    }
}

/// Anything that can hold accounts: the target of a mapping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AccountStoreRef {
    Directory(u64),
    Group(u64),
    Organization(u64),
}

impl AccountStoreRef {
    /// Builds a reference from a mapping row's discriminator and id columns.
    pub fn from_parts(store_type: &str, id: u64) -> Option<Self> {
        match store_type {
            "directory" => Some(Self::Directory(id)),
            "group" => Some(Self::Group(id)),
            "organization" => Some(Self::Organization(id)),
            _ => None,
        }
    }

    pub fn id(self) -> u64 {
        match self {
            Self::Directory(id) | Self::Group(id) | Self::Organization(id) => id,
        }
    }

    /// Discriminator value stored in `account_store_type`.
    pub fn store_type(self) -> &'static str {
        match self {
            Self::Directory(_) => "directory",
            Self::Group(_) => "group",
            Self::Organization(_) => "organization",
        }
    }

    pub fn node_type(self) -> NodeType {
        match self {
            Self::Directory(_) => NodeType::Directory,
            Self::Group(_) => NodeType::Group,
            Self::Organization(_) => NodeType::Organization,
        }
    }

    pub fn node_ref(self) -> NodeRef {
        NodeRef::new(self.node_type(), self.id())
    }
}

impl fmt::Display for AccountStoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.store_type(), self.id())
    }
}

/// The owner of a mapping row: an application or an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum MappingParent {
    Application(u64),
    Organization(u64),
}

impl MappingParent {
    pub fn id(self) -> u64 {
        match self {
            Self::Application(id) | Self::Organization(id) => id,
        }
    }

    pub fn node_type(self) -> NodeType {
        match self {
            Self::Application(_) => NodeType::Application,
            Self::Organization(_) => NodeType::Organization,
        }
    }

    /// Node type of this parent's mapping rows.
    pub fn mapping_node(self) -> NodeType {
        match self {
            Self::Application(_) => NodeType::ApplicationMapping,
            Self::Organization(_) => NodeType::OrganizationMapping,
        }
    }

    /// Foreign-key column on the mapping table that points at the parent.
    pub fn parent_column(self) -> &'static str {
        match self {
            Self::Application(_) => "application_id",
            Self::Organization(_) => "organization_id",
        }
    }

    pub fn node_ref(self) -> NodeRef {
        NodeRef::new(self.node_type(), self.id())
    }
}

impl fmt::Display for MappingParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_type(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [Status::Enabled, Status::Disabled, Status::Unverified] {
            assert_eq!(Status::parse(status.as_str()), Some(status));
        }
        assert_eq!(Status::parse("enabled"), None);
    }

    #[test]
    fn test_store_ref_from_parts() {
        assert_eq!(
            AccountStoreRef::from_parts("group", 7),
            Some(AccountStoreRef::Group(7))
        );
        assert_eq!(AccountStoreRef::from_parts("application", 7), None);
        assert_eq!(AccountStoreRef::Organization(3).node_type(), NodeType::Organization);
    }

    #[test]
    fn test_mapping_parent_tables() {
        let parent = MappingParent::Organization(4);
        assert_eq!(parent.mapping_node(), NodeType::OrganizationMapping);
        assert_eq!(parent.parent_column(), "organization_id");
        assert_eq!(parent.to_string(), "organization:4");
    }
}
