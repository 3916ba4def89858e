//! One manager per store, one store per manager.
//!
//! The pairing is stored twice, `store -> manager` and `manager -> store`, and
//! both trees are written in the same transaction so they can never disagree.
use sled::Transactional;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use tracing::info;

use crate::error::{ReplenishError, Result};
use crate::types::{PrincipalId, StoreId};

pub const BY_STORE_TREE: &str = "assignments.by_store";
pub const BY_MANAGER_TREE: &str = "assignments.by_manager";

#[derive(Clone)]
pub struct AssignmentGuard {
    by_store: sled::Tree,
    by_manager: sled::Tree,
}

impl AssignmentGuard {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            by_store: db.open_tree(BY_STORE_TREE)?,
            by_manager: db.open_tree(BY_MANAGER_TREE)?,
        })
    }

    pub(crate) fn by_store(&self) -> &sled::Tree {
        &self.by_store
    }

    pub fn assign(&self, store_id: StoreId, manager_id: PrincipalId) -> Result<()> {
        (&self.by_store, &self.by_manager).transaction(|(by_store, by_manager)| {
            if let Some(current) = manager_in(by_store, store_id)? {
                return Err(ConflictableTransactionError::Abort(ReplenishError::conflict(
                    format!("{store_id} is already managed by {current}"),
                )));
            }
            if let Some(bytes) = by_manager.get(manager_id.to_be_bytes())? {
                let held = StoreId::from_be_slice(&bytes)
                    .map(|store| store.to_string())
                    .unwrap_or_else(|| "another store".to_string());
                return Err(ConflictableTransactionError::Abort(ReplenishError::conflict(
                    format!("{manager_id} already manages {held}"),
                )));
            }
            by_store.insert(&store_id.to_be_bytes()[..], &manager_id.to_be_bytes()[..])?;
            by_manager.insert(&manager_id.to_be_bytes()[..], &store_id.to_be_bytes()[..])?;
            Ok(())
        })?;
        info!(store = %store_id, manager = %manager_id, "manager assigned");
        Ok(())
    }

    /// Releases the manager's store and returns it.
    pub fn unassign(&self, manager_id: PrincipalId) -> Result<StoreId> {
        let store_id = (&self.by_store, &self.by_manager).transaction(|(by_store, by_manager)| {
            let store_id = by_manager
                .remove(&manager_id.to_be_bytes()[..])?
                .and_then(|bytes| StoreId::from_be_slice(&bytes))
                .ok_or_else(|| {
                    ConflictableTransactionError::Abort(ReplenishError::not_found(format!(
                        "assignment for {manager_id}"
                    )))
                })?;
            by_store.remove(&store_id.to_be_bytes()[..])?;
            Ok(store_id)
        })?;
        info!(store = %store_id, manager = %manager_id, "manager unassigned");
        Ok(store_id)
    }

    pub fn store_of(&self, manager_id: PrincipalId) -> Result<Option<StoreId>> {
        Ok(self
            .by_manager
            .get(manager_id.to_be_bytes())?
            .and_then(|bytes| StoreId::from_be_slice(&bytes)))
    }

    pub fn manager_of(&self, store_id: StoreId) -> Result<Option<PrincipalId>> {
        Ok(self
            .by_store
            .get(store_id.to_be_bytes())?
            .and_then(|bytes| PrincipalId::from_be_slice(&bytes)))
    }
}

pub(crate) fn manager_in(
    by_store: &TransactionalTree,
    store_id: StoreId,
) -> ConflictableTransactionResult<Option<PrincipalId>, ReplenishError> {
    Ok(by_store
        .get(store_id.to_be_bytes())?
        .and_then(|bytes| PrincipalId::from_be_slice(&bytes)))
}

/// Aborts with `Unauthorized` unless `manager_id` runs `store_id` right now.
pub(crate) fn confirm_manager_in(
    by_store: &TransactionalTree,
    store_id: StoreId,
    manager_id: PrincipalId,
) -> ConflictableTransactionResult<(), ReplenishError> {
    if manager_in(by_store, store_id)? == Some(manager_id) {
        Ok(())
    } else {
        Err(ConflictableTransactionError::Abort(ReplenishError::unauthorized(format!(
            "{manager_id} is not the manager of {store_id}"
        ))))
    }
}
