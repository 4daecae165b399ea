use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::StoreError;
use crate::invariants::{MappingPlan, PointerChange, plan_delete};
use crate::repository::{
    Account, AccountLink, AccountLinkingPolicy, AccountStoreMapping, AccountStoreRef, Application,
    CreateAccount, Directory, Group, GroupMembership, MappingParent, Organization, login_key,
};
use crate::topology::NodeType;

/// A column value as the join evaluator sees it. `Null` never equals
/// anything, itself included.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Value {
    Null,
    Bool(bool),
    Int(u64),
    Text(String),
    Time(DateTime<Utc>),
}

impl Value {
    pub(super) fn joins(&self, other: &Value) -> bool {
        *self != Value::Null && self == other
    }

    fn opt_int(v: Option<u64>) -> Self {
        v.map_or(Value::Null, Value::Int)
    }

    fn opt_text(v: Option<&String>) -> Self {
        v.map_or(Value::Null, |s| Value::Text(s.clone()))
    }
}

/// Column access by name, mirroring the SQL schema.
pub(super) trait Record {
    fn column(&self, name: &str) -> Value;

    fn id(&self) -> u64 {
        match self.column("id") {
            Value::Int(id) => id,
            _ => 0,
        }
    }

    fn tenant_id(&self) -> u64 {
        match self.column("tenant_id") {
            Value::Int(id) => id,
            _ => 0,
        }
    }
}

impl Record for Account {
    fn column(&self, name: &str) -> Value {
        match name {
            "id" => Value::Int(self.id),
            "tenant_id" => Value::Int(self.tenant_id),
            "directory_id" => Value::Int(self.directory_id),
            "email" => Value::Text(self.email.clone()),
            "username" => Value::Text(self.username.clone()),
            "email_key" => Value::Text(login_key(&self.email)),
            "username_key" => Value::Text(login_key(&self.username)),
            "given_name" => Value::Text(self.given_name.clone()),
            "middle_name" => Value::opt_text(self.middle_name.as_ref()),
            "surname" => Value::Text(self.surname.clone()),
            "status" => Value::Text(self.status.as_str().to_owned()),
            "created_at" => Value::Time(self.created_at),
            "updated_at" => Value::Time(self.updated_at),
            _ => Value::Null,
        }
    }
}

impl Record for GroupMembership {
    fn column(&self, name: &str) -> Value {
        match name {
            "id" => Value::Int(self.id),
            "tenant_id" => Value::Int(self.tenant_id),
            "account_id" => Value::Int(self.account_id),
            "group_id" => Value::Int(self.group_id),
            "created_at" => Value::Time(self.created_at),
            _ => Value::Null,
        }
    }
}

impl Record for Group {
    fn column(&self, name: &str) -> Value {
        match name {
            "id" => Value::Int(self.id),
            "tenant_id" => Value::Int(self.tenant_id),
            "directory_id" => Value::Int(self.directory_id),
            "name" => Value::Text(self.name.clone()),
            "description" => Value::opt_text(self.description.as_ref()),
            "status" => Value::Text(self.status.as_str().to_owned()),
            "created_at" => Value::Time(self.created_at),
            "updated_at" => Value::Time(self.updated_at),
            _ => Value::Null,
        }
    }
}

impl Record for Directory {
    fn column(&self, name: &str) -> Value {
        match name {
            "id" => Value::Int(self.id),
            "tenant_id" => Value::Int(self.tenant_id),
            "name" => Value::Text(self.name.clone()),
            "description" => Value::opt_text(self.description.as_ref()),
            "status" => Value::Text(self.status.as_str().to_owned()),
            "created_at" => Value::Time(self.created_at),
            "updated_at" => Value::Time(self.updated_at),
            _ => Value::Null,
        }
    }
}

impl Record for Organization {
    fn column(&self, name: &str) -> Value {
        match name {
            "id" => Value::Int(self.id),
            "tenant_id" => Value::Int(self.tenant_id),
            "name" => Value::Text(self.name.clone()),
            "name_key" => Value::Text(self.name_key.clone()),
            "status" => Value::Text(self.status.as_str().to_owned()),
            "default_account_store_mapping_id" => {
                Value::opt_int(self.default_account_store_mapping_id)
            }
            "default_group_store_mapping_id" => Value::opt_int(self.default_group_store_mapping_id),
            "created_at" => Value::Time(self.created_at),
            "updated_at" => Value::Time(self.updated_at),
            _ => Value::Null,
        }
    }
}

impl Record for Application {
    fn column(&self, name: &str) -> Value {
        match name {
            "id" => Value::Int(self.id),
            "tenant_id" => Value::Int(self.tenant_id),
            "name" => Value::Text(self.name.clone()),
            "status" => Value::Text(self.status.as_str().to_owned()),
            "default_account_store_mapping_id" => {
                Value::opt_int(self.default_account_store_mapping_id)
            }
            "default_group_store_mapping_id" => Value::opt_int(self.default_group_store_mapping_id),
            "created_at" => Value::Time(self.created_at),
            "updated_at" => Value::Time(self.updated_at),
            _ => Value::Null,
        }
    }
}

impl Record for AccountStoreMapping {
    fn column(&self, name: &str) -> Value {
        match (name, self.parent) {
            ("application_id", MappingParent::Application(id))
            | ("organization_id", MappingParent::Organization(id)) => Value::Int(id),
            ("id", _) => Value::Int(self.id),
            ("tenant_id", _) => Value::Int(self.tenant_id),
            ("account_store_id", _) => Value::Int(self.account_store.id()),
            ("account_store_type", _) => Value::Text(self.account_store.store_type().to_owned()),
            ("list_index", _) => Value::Int(u64::from(self.list_index)),
            ("is_default_account_store", _) => Value::Bool(self.is_default_account_store),
            ("is_default_group_store", _) => Value::Bool(self.is_default_group_store),
            ("created_at", _) => Value::Time(self.created_at),
            ("updated_at", _) => Value::Time(self.updated_at),
            _ => Value::Null,
        }
    }
}

/// Every table of the in-memory store.
#[derive(Debug, Default)]
pub(super) struct Tables {
    pub accounts: BTreeMap<u64, Account>,
    pub memberships: BTreeMap<u64, GroupMembership>,
    pub groups: BTreeMap<u64, Group>,
    pub directories: BTreeMap<u64, Directory>,
    pub organizations: BTreeMap<u64, Organization>,
    pub applications: BTreeMap<u64, Application>,
    pub mappings: BTreeMap<u64, AccountStoreMapping>,
    pub links: BTreeMap<u64, AccountLink>,
    pub policies: HashMap<(u64, u64), AccountLinkingPolicy>,
}

fn scoped<'a, T: Record>(rows: &'a BTreeMap<u64, T>, tenant_id: u64, id: u64) -> Option<&'a T> {
    rows.get(&id).filter(|r| r.tenant_id() == tenant_id)
}

impl Tables {
    /// Rows of `node`, as records.
    pub fn rows(&self, node: NodeType) -> Vec<&dyn Record> {
        fn all<T: Record>(rows: &BTreeMap<u64, T>) -> Vec<&dyn Record> {
            rows.values().map(|r| r as &dyn Record).collect()
        }

        match node {
            NodeType::Account => all(&self.accounts),
            NodeType::GroupMembership => all(&self.memberships),
            NodeType::Group => all(&self.groups),
            NodeType::Directory => all(&self.directories),
            NodeType::Organization => all(&self.organizations),
            NodeType::Application => all(&self.applications),
            NodeType::OrganizationMapping | NodeType::ApplicationMapping => self
                .mappings
                .values()
                .filter(|m| m.parent.mapping_node() == node)
                .map(|m| m as &dyn Record)
                .collect(),
        }
    }

    pub fn directory(&self, tenant_id: u64, id: u64) -> Option<&Directory> {
        scoped(&self.directories, tenant_id, id)
    }

    pub fn group(&self, tenant_id: u64, id: u64) -> Option<&Group> {
        scoped(&self.groups, tenant_id, id)
    }

    pub fn account(&self, tenant_id: u64, id: u64) -> Option<&Account> {
        scoped(&self.accounts, tenant_id, id)
    }

    pub fn organization(&self, tenant_id: u64, id: u64) -> Option<&Organization> {
        scoped(&self.organizations, tenant_id, id)
    }

    pub fn application(&self, tenant_id: u64, id: u64) -> Option<&Application> {
        scoped(&self.applications, tenant_id, id)
    }

    pub fn mapping(&self, tenant_id: u64, id: u64) -> Option<&AccountStoreMapping> {
        scoped(&self.mappings, tenant_id, id)
    }

    pub fn store_exists(&self, tenant_id: u64, store: AccountStoreRef) -> bool {
        match store {
            AccountStoreRef::Directory(id) => self.directory(tenant_id, id).is_some(),
            AccountStoreRef::Group(id) => self.group(tenant_id, id).is_some(),
            AccountStoreRef::Organization(id) => self.organization(tenant_id, id).is_some(),
        }
    }

    pub fn parent_exists(&self, tenant_id: u64, parent: MappingParent) -> bool {
        match parent {
            MappingParent::Application(id) => self.application(tenant_id, id).is_some(),
            MappingParent::Organization(id) => self.organization(tenant_id, id).is_some(),
        }
    }

    /// The parent's mappings ordered by list index.
    pub fn siblings(&self, tenant_id: u64, parent: MappingParent) -> Vec<AccountStoreMapping> {
        let mut siblings: Vec<AccountStoreMapping> = self
            .mappings
            .values()
            .filter(|m| m.tenant_id == tenant_id && m.parent == parent)
            .cloned()
            .collect();
        siblings.sort_by_key(|m| (m.list_index, m.id));
        siblings
    }

    pub fn insert_account(
        &mut self,
        id: u64,
        data: CreateAccount,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        if self.directory(data.tenant_id, data.directory_id).is_none() {
            return Err(StoreError::validation(format!(
                "directory {} does not exist",
                data.directory_id
            )));
        }

        let taken = self.accounts.values().any(|a| {
            a.directory_id == data.directory_id
                && (login_key(&a.email) == login_key(&data.email)
                    || login_key(&a.username) == login_key(&data.username))
        });
        if taken {
            return Err(StoreError::AlreadyExists);
        }

        let account = Account {
            id,
            tenant_id: data.tenant_id,
            directory_id: data.directory_id,
            email: data.email,
            username: data.username,
            given_name: data.given_name,
            middle_name: data.middle_name,
            surname: data.surname,
            hashed_password: data.hashed_password,
            status: data.status,
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    pub fn insert_membership(
        &mut self,
        id: u64,
        tenant_id: u64,
        account_id: u64,
        group_id: u64,
        now: DateTime<Utc>,
    ) -> Result<GroupMembership, StoreError> {
        let account = self.account(tenant_id, account_id).ok_or(StoreError::NotFound)?;
        let group = self.group(tenant_id, group_id).ok_or(StoreError::NotFound)?;
        if account.directory_id != group.directory_id {
            return Err(StoreError::validation(
                "account and group belong to different directories",
            ));
        }

        let exists = self
            .memberships
            .values()
            .any(|m| m.account_id == account_id && m.group_id == group_id);
        if exists {
            return Err(StoreError::AlreadyExists);
        }

        let membership = GroupMembership {
            id,
            tenant_id,
            account_id,
            group_id,
            created_at: now,
        };
        self.memberships.insert(id, membership.clone());
        Ok(membership)
    }

    pub fn insert_link(
        &mut self,
        id: u64,
        tenant_id: u64,
        account_id: u64,
        other_account_id: u64,
        now: DateTime<Utc>,
    ) -> Result<AccountLink, StoreError> {
        if account_id == other_account_id {
            return Err(StoreError::validation("an account cannot be linked to itself"));
        }
        if self.account(tenant_id, account_id).is_none()
            || self.account(tenant_id, other_account_id).is_none()
        {
            return Err(StoreError::NotFound);
        }

        let (left, right) = AccountLink::normalize(account_id, other_account_id);
        if self
            .links
            .values()
            .any(|l| l.left_account_id == left && l.right_account_id == right)
        {
            return Err(StoreError::AlreadyExists);
        }

        let link = AccountLink {
            id,
            tenant_id,
            left_account_id: left,
            right_account_id: right,
            created_at: now,
        };
        self.links.insert(id, link.clone());
        Ok(link)
    }

    /// Writes the parent side of a mapping plan.
    pub fn apply_pointers(
        &mut self,
        parent: MappingParent,
        plan: &MappingPlan,
        target: u64,
        now: DateTime<Utc>,
    ) {
        let (account_store, group_store, updated_at) = match parent {
            MappingParent::Application(id) => match self.applications.get_mut(&id) {
                Some(app) => (
                    &mut app.default_account_store_mapping_id,
                    &mut app.default_group_store_mapping_id,
                    &mut app.updated_at,
                ),
                None => return,
            },
            MappingParent::Organization(id) => match self.organizations.get_mut(&id) {
                Some(org) => (
                    &mut org.default_account_store_mapping_id,
                    &mut org.default_group_store_mapping_id,
                    &mut org.updated_at,
                ),
                None => return,
            },
        };

        for (pointer, change) in [
            (account_store, plan.default_account_store),
            (group_store, plan.default_group_store),
        ] {
            match change {
                PointerChange::Keep => continue,
                PointerChange::SetToTarget => *pointer = Some(target),
                PointerChange::Clear => {
                    if *pointer == Some(target) {
                        *pointer = None;
                    }
                }
            }
            *updated_at = now;
        }
    }

    /// Writes the sibling side of a mapping plan.
    pub fn apply_siblings(&mut self, plan: &MappingPlan, now: DateTime<Utc>) {
        for id in plan.touched() {
            if let Some(sibling) = self.mappings.get_mut(&id) {
                if plan.apply_to_sibling(sibling) {
                    sibling.updated_at = now;
                }
            }
        }
    }

    /// Removes a mapping, clearing the parent's default pointers and closing
    /// the gap in its list order.
    pub fn remove_mapping(&mut self, id: u64, now: DateTime<Utc>) {
        let Some(removed) = self.mappings.get(&id).cloned() else {
            return;
        };
        let siblings = self.siblings(removed.tenant_id, removed.parent);
        let plan = plan_delete(&siblings, &removed);

        self.mappings.remove(&id);
        self.apply_siblings(&plan, now);
        self.apply_pointers(removed.parent, &plan, id, now);
    }

    /// Removes every mapping that maps `store`, and every mapping owned by it
    /// when it is an organization.
    pub fn remove_mappings_of(&mut self, tenant_id: u64, store: AccountStoreRef, now: DateTime<Utc>) {
        let owned = match store {
            AccountStoreRef::Organization(id) => Some(MappingParent::Organization(id)),
            AccountStoreRef::Directory(_) | AccountStoreRef::Group(_) => None,
        };

        let doomed: Vec<u64> = self
            .mappings
            .values()
            .filter(|m| m.tenant_id == tenant_id)
            .filter(|m| m.account_store == store || Some(m.parent) == owned)
            .map(|m| m.id)
            .collect();

        for id in doomed {
            self.remove_mapping(id, now);
        }
    }

    pub fn remove_account(&mut self, id: u64) {
        self.accounts.remove(&id);
        self.memberships.retain(|_, m| m.account_id != id);
        self.links
            .retain(|_, l| l.left_account_id != id && l.right_account_id != id);
    }

    pub fn remove_group(&mut self, tenant_id: u64, id: u64, now: DateTime<Utc>) {
        self.remove_mappings_of(tenant_id, AccountStoreRef::Group(id), now);
        self.memberships.retain(|_, m| m.group_id != id);
        self.groups.remove(&id);
    }
}
