//! Default-store and ordering rules for account store mappings.
//!
//! Every mapping write goes through a planner here before touching storage.
//! A planner looks at the parent's current mappings and returns a
//! [`MappingPlan`]: the sibling rows to rewrite, the final state of the row
//! being written, and what happens to the parent's default pointers. Backends
//! apply a plan inside the same transaction that read the siblings.
//!
//! Rules:
//!
//! - At most one mapping per parent is the default account store, and at
//!   most one the default group store. Setting a flag clears it on siblings.
//! - A parent's default pointers always name the mapping holding the flag,
//!   or nothing.
//! - `list_index` is dense and 0-based within a parent.
//! - A store is mapped at most once per parent. Organizations are never
//!   mapped into organizations, and a group cannot be a default group store.

use crate::StoreError;
use crate::repository::{
    AccountStoreMapping, AccountStoreRef, CreateMapping, MappingParent, UpdateMapping,
};

/// What happens to one of the parent's default pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerChange {
    Keep,
    /// Point at the mapping being written.
    SetToTarget,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingPlan {
    /// Final `list_index` of the mapping being written.
    pub list_index: u32,
    pub is_default_account_store: bool,
    pub is_default_group_store: bool,
    /// Siblings losing their default account store flag.
    pub clear_default_account_store: Vec<u64>,
    /// Siblings losing their default group store flag.
    pub clear_default_group_store: Vec<u64>,
    /// Siblings whose `list_index` changes, with the new value.
    pub reindex: Vec<(u64, u32)>,
    pub default_account_store: PointerChange,
    pub default_group_store: PointerChange,
}

impl MappingPlan {
    /// Applies the sibling part of the plan to `mapping`. Returns whether it
    /// changed.
    pub fn apply_to_sibling(&self, mapping: &mut AccountStoreMapping) -> bool {
        let mut changed = false;
        if self.clear_default_account_store.contains(&mapping.id) {
            mapping.is_default_account_store = false;
            changed = true;
        }
        if self.clear_default_group_store.contains(&mapping.id) {
            mapping.is_default_group_store = false;
            changed = true;
        }
        if let Some((_, index)) = self.reindex.iter().find(|(id, _)| *id == mapping.id) {
            mapping.list_index = *index;
            changed = true;
        }
        changed
    }

    /// Sibling ids touched by the plan, ascending and deduplicated.
    pub fn touched(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .clear_default_account_store
            .iter()
            .chain(&self.clear_default_group_store)
            .copied()
            .chain(self.reindex.iter().map(|(id, _)| *id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Checks the structural rules for putting `store` under `parent`.
///
/// `siblings` are the parent's current mappings; a row with id `exclude` is
/// ignored so the check can run for updates.
pub fn validate_mapping(
    parent: MappingParent,
    store: AccountStoreRef,
    is_default_group_store: bool,
    siblings: &[AccountStoreMapping],
    exclude: Option<u64>,
) -> Result<(), StoreError> {
    if let (MappingParent::Organization(_), AccountStoreRef::Organization(_)) = (parent, store) {
        return Err(StoreError::validation(
            "an organization cannot be mapped into an organization",
        ));
    }

    if is_default_group_store && matches!(store, AccountStoreRef::Group(_)) {
        return Err(StoreError::validation(
            "a group cannot be the default group store",
        ));
    }

    let duplicate = siblings
        .iter()
        .filter(|m| Some(m.id) != exclude)
        .any(|m| m.account_store == store);
    if duplicate {
        return Err(StoreError::validation(format!(
            "{store} is already mapped to {parent}"
        )));
    }

    Ok(())
}

fn ordered_ids(siblings: &[AccountStoreMapping], exclude: Option<u64>) -> Vec<&AccountStoreMapping> {
    let mut ordered: Vec<&AccountStoreMapping> = siblings
        .iter()
        .filter(|m| Some(m.id) != exclude)
        .collect();
    ordered.sort_by_key(|m| (m.list_index, m.id));
    ordered
}

// New indexes for `ordered` with a hole at `position` (or no hole), keeping
// only the ones that differ from the stored value.
fn reindex(ordered: &[&AccountStoreMapping], position: Option<usize>) -> Vec<(u64, u32)> {
    let mut changes = Vec::new();
    for (i, mapping) in ordered.iter().enumerate() {
        let index = match position {
            Some(p) if i >= p => i + 1,
            _ => i,
        };
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        if mapping.list_index != index {
            changes.push((mapping.id, index));
        }
    }
    changes
}

fn clear_others(
    siblings: &[AccountStoreMapping],
    target: Option<u64>,
    flag: impl Fn(&AccountStoreMapping) -> bool,
) -> Vec<u64> {
    siblings
        .iter()
        .filter(|m| Some(m.id) != target && flag(m))
        .map(|m| m.id)
        .collect()
}

fn position(requested: Option<u32>, len: usize) -> usize {
    requested
        .and_then(|i| usize::try_from(i).ok())
        .map_or(len, |i| i.min(len))
}

/// Plans inserting `data` among `siblings`.
pub fn plan_create(
    siblings: &[AccountStoreMapping],
    data: &CreateMapping,
) -> Result<MappingPlan, StoreError> {
    validate_mapping(
        data.parent,
        data.account_store,
        data.is_default_group_store,
        siblings,
        None,
    )?;

    let ordered = ordered_ids(siblings, None);
    let at = position(data.list_index, ordered.len());

    let pointer = |set: bool| {
        if set {
            PointerChange::SetToTarget
        } else {
            PointerChange::Keep
        }
    };

    Ok(MappingPlan {
        list_index: u32::try_from(at).unwrap_or(u32::MAX),
        is_default_account_store: data.is_default_account_store,
        is_default_group_store: data.is_default_group_store,
        clear_default_account_store: if data.is_default_account_store {
            clear_others(siblings, None, |m| m.is_default_account_store)
        } else {
            Vec::new()
        },
        clear_default_group_store: if data.is_default_group_store {
            clear_others(siblings, None, |m| m.is_default_group_store)
        } else {
            Vec::new()
        },
        reindex: reindex(&ordered, Some(at)),
        default_account_store: pointer(data.is_default_account_store),
        default_group_store: pointer(data.is_default_group_store),
    })
}

/// Plans applying `changes` to `current`. `siblings` may include `current`.
pub fn plan_update(
    siblings: &[AccountStoreMapping],
    current: &AccountStoreMapping,
    changes: &UpdateMapping,
) -> Result<MappingPlan, StoreError> {
    let is_default_account_store = changes
        .is_default_account_store
        .unwrap_or(current.is_default_account_store);
    let is_default_group_store = changes
        .is_default_group_store
        .unwrap_or(current.is_default_group_store);

    validate_mapping(
        current.parent,
        current.account_store,
        is_default_group_store,
        siblings,
        Some(current.id),
    )?;

    let ordered = ordered_ids(siblings, Some(current.id));
    let requested = changes.list_index.or(Some(current.list_index));
    let at = position(requested, ordered.len());

    let pointer = |before: bool, after: bool| match (before, after) {
        (_, true) => PointerChange::SetToTarget,
        (true, false) => PointerChange::Clear,
        (false, false) => PointerChange::Keep,
    };

    Ok(MappingPlan {
        list_index: u32::try_from(at).unwrap_or(u32::MAX),
        is_default_account_store,
        is_default_group_store,
        clear_default_account_store: if is_default_account_store {
            clear_others(siblings, Some(current.id), |m| m.is_default_account_store)
        } else {
            Vec::new()
        },
        clear_default_group_store: if is_default_group_store {
            clear_others(siblings, Some(current.id), |m| m.is_default_group_store)
        } else {
            Vec::new()
        },
        reindex: reindex(&ordered, Some(at)),
        default_account_store: pointer(current.is_default_account_store, is_default_account_store),
        default_group_store: pointer(current.is_default_group_store, is_default_group_store),
    })
}

/// Plans removing `removed` from `siblings`. `siblings` may include
/// `removed`.
pub fn plan_delete(siblings: &[AccountStoreMapping], removed: &AccountStoreMapping) -> MappingPlan {
    let ordered = ordered_ids(siblings, Some(removed.id));

    let pointer = |held: bool| {
        if held {
            PointerChange::Clear
        } else {
            PointerChange::Keep
        }
    };

    MappingPlan {
        list_index: removed.list_index,
        is_default_account_store: false,
        is_default_group_store: false,
        clear_default_account_store: Vec::new(),
        clear_default_group_store: Vec::new(),
        reindex: reindex(&ordered, None),
        default_account_store: pointer(removed.is_default_account_store),
        default_group_store: pointer(removed.is_default_group_store),
    }
}
