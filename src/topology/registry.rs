//! Edge registration and the standard account store topology.

use std::sync::LazyLock;

use super::edge::{Edge, Join};
use super::node::NodeType;

static STANDARD: LazyLock<Topology> = LazyLock::new(Topology::standard);

/// The process-wide standard topology, built once on first use.
pub fn topology() -> &'static Topology {
    &STANDARD
}

/// A set of node types and the edges registered between them.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    members: Vec<NodeType>,
    edges: Vec<Edge>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node type to the topology.
    pub fn add_node(&mut self, node: NodeType) -> &mut Self {
        if !self.members.contains(&node) {
            self.members.push(node);
        }
        self
    }

    /// Registers an outgoing edge. Both endpoints become members.
    pub fn register(&mut self, edge: Edge) -> &mut Self {
        self.add_node(edge.from);
        self.add_node(edge.to);
        self.edges.push(edge);
        self
    }

    pub fn contains(&self, node: NodeType) -> bool {
        self.members.contains(&node)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges leaving `node`, in registration order.
    pub fn outgoing(&self, node: NodeType) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == node)
    }

    /// Looks up an edge by its source type and name.
    pub fn edge(&self, from: NodeType, name: &str) -> Option<&Edge> {
        self.outgoing(from).find(|e| e.name == name)
    }

    /// The account store model: accounts, groups, directories, organizations,
    /// applications and the two mapping tables between them.
    pub fn standard() -> Self {
        use NodeType::{
            Account, Application, ApplicationMapping, Directory, Group, GroupMembership,
            Organization, OrganizationMapping,
        };

        let to_id = |column| Join::new(column, "id");
        let from_id = |column| Join::new("id", column);

        let mut t = Self::new();

        t.register(Edge::one("directory", Account, Directory, to_id("directory_id")))
            .register(Edge::many("groupMemberships", Account, GroupMembership, from_id("account_id")))
            .register(Edge::aggregate("groups", Account, Group, GroupMembership));

        t.register(Edge::one("account", GroupMembership, Account, to_id("account_id")))
            .register(Edge::one("group", GroupMembership, Group, to_id("group_id")));

        t.register(Edge::one("directory", Group, Directory, to_id("directory_id")))
            .register(Edge::many("accountMemberships", Group, GroupMembership, from_id("group_id")))
            .register(Edge::aggregate("accounts", Group, Account, GroupMembership))
            .register(
                Edge::many("organizationMappings", Group, OrganizationMapping, from_id("account_store_id"))
                    .only("group"),
            )
            .register(
                Edge::many("applicationMappings", Group, ApplicationMapping, from_id("account_store_id"))
                    .only("group"),
            );

        t.register(Edge::many("accounts", Directory, Account, from_id("directory_id")))
            .register(Edge::many("groups", Directory, Group, from_id("directory_id")))
            .register(
                Edge::many("organizationMappings", Directory, OrganizationMapping, from_id("account_store_id"))
                    .only("directory"),
            )
            .register(
                Edge::many("applicationMappings", Directory, ApplicationMapping, from_id("account_store_id"))
                    .only("directory"),
            );

        t.register(Edge::one("organization", OrganizationMapping, Organization, to_id("organization_id")))
            .register(
                Edge::one("directory", OrganizationMapping, Directory, to_id("account_store_id"))
                    .only("directory"),
            )
            .register(
                Edge::one("group", OrganizationMapping, Group, to_id("account_store_id")).only("group"),
            );

        t.register(Edge::many("accountStoreMappings", Organization, OrganizationMapping, from_id("organization_id")))
            .register(Edge::default_pointer(
                "defaultAccountStoreMapping",
                Organization,
                OrganizationMapping,
                to_id("default_account_store_mapping_id"),
            ))
            .register(Edge::default_pointer(
                "defaultGroupStoreMapping",
                Organization,
                OrganizationMapping,
                to_id("default_group_store_mapping_id"),
            ))
            .register(
                Edge::many("applicationMappings", Organization, ApplicationMapping, from_id("account_store_id"))
                    .only("organization"),
            );

        t.register(Edge::one("application", ApplicationMapping, Application, to_id("application_id")))
            .register(
                Edge::one("directory", ApplicationMapping, Directory, to_id("account_store_id"))
                    .only("directory"),
            )
            .register(
                Edge::one("group", ApplicationMapping, Group, to_id("account_store_id")).only("group"),
            )
            .register(
                Edge::one("organization", ApplicationMapping, Organization, to_id("account_store_id"))
                    .only("organization"),
            );

        t.register(Edge::many("accountStoreMappings", Application, ApplicationMapping, from_id("application_id")))
            .register(Edge::default_pointer(
                "defaultAccountStoreMapping",
                Application,
                ApplicationMapping,
                to_id("default_account_store_mapping_id"),
            ))
            .register(Edge::default_pointer(
                "defaultGroupStoreMapping",
                Application,
                ApplicationMapping,
                to_id("default_group_store_mapping_id"),
            ));

        t
    }
}
