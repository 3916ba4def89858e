//! Per-store inventory levels and their replenishment thresholds.
//!
//! Records live in the `inventory` tree keyed by [`inventory_key`]. Every
//! mutation runs inside a sled transaction so the check-then-write of a sale or
//! fulfillment is atomic against other writers of the same record.
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use tracing::{debug, info};

use crate::error::{ReplenishError, Result};
use crate::types::{ProductId, StoreId};
use crate::utils::{inventory_key, store_prefix};

pub const INVENTORY_TREE: &str = "inventory";

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct InventoryRecord {
    #[n(0)]
    pub store_id: StoreId,
    #[n(1)]
    pub product_id: ProductId,
    #[n(2)]
    pub quantity: u64,
    #[n(3)]
    pub min_quantity: u64,
    #[n(4)]
    pub max_quantity: u64,
}

impl InventoryRecord {
    pub fn new(
        store_id: StoreId,
        product_id: ProductId,
        quantity: u64,
        min_quantity: u64,
        max_quantity: u64,
    ) -> Result<Self> {
        check_thresholds(min_quantity, max_quantity)?;
        Ok(Self {
            store_id,
            product_id,
            quantity,
            min_quantity,
            max_quantity,
        })
    }

    pub fn key(&self) -> [u8; 16] {
        inventory_key(self.store_id, self.product_id)
    }

    /// At or below the minimum threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }

    pub fn debit(&mut self, quantity: u64) -> Result<()> {
        if quantity == 0 {
            return Err(ReplenishError::validation("sale quantity must be positive"));
        }
        if quantity > self.quantity {
            return Err(ReplenishError::InsufficientStock {
                requested: quantity,
                available: self.quantity,
            });
        }
        self.quantity -= quantity;
        Ok(())
    }

    pub fn credit(&mut self, quantity: u64) -> Result<()> {
        if quantity == 0 {
            return Err(ReplenishError::validation(
                "fulfillment quantity must be positive",
            ));
        }
        self.quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| ReplenishError::validation("stock quantity overflow"))?;
        Ok(())
    }
}

fn check_thresholds(min_quantity: u64, max_quantity: u64) -> Result<()> {
    if min_quantity > max_quantity {
        return Err(ReplenishError::validation(format!(
            "min quantity {min_quantity} exceeds max quantity {max_quantity}"
        )));
    }
    Ok(())
}

fn describe(store_id: StoreId, product_id: ProductId) -> String {
    format!("inventory record for {product_id} at {store_id}")
}

#[derive(Clone)]
pub struct InventoryLedger {
    tree: sled::Tree,
}

impl InventoryLedger {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(INVENTORY_TREE)?,
        })
    }

    pub(crate) fn tree(&self) -> &sled::Tree {
        &self.tree
    }

    pub fn get(&self, store_id: StoreId, product_id: ProductId) -> Result<InventoryRecord> {
        let key = inventory_key(store_id, product_id);
        match self.tree.get(&key[..])? {
            Some(bytes) => Ok(minicbor::decode(&bytes)?),
            None => Err(ReplenishError::not_found(describe(store_id, product_id))),
        }
    }

    pub fn get_quantity(&self, store_id: StoreId, product_id: ProductId) -> Result<u64> {
        self.get(store_id, product_id).map(|record| record.quantity)
    }

    /// Insert a new record. Fails with `Conflict` if the pair is already stocked.
    pub fn open_record(&self, record: InventoryRecord) -> Result<InventoryRecord> {
        check_thresholds(record.min_quantity, record.max_quantity)?;
        self.tree.transaction(|tx| open_in(tx, &record))?;
        info!(store = %record.store_id, product = %record.product_id, quantity = record.quantity, "inventory record opened");
        Ok(record)
    }

    pub fn set_thresholds(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        min_quantity: u64,
        max_quantity: u64,
    ) -> Result<InventoryRecord> {
        check_thresholds(min_quantity, max_quantity)?;
        let record = self
            .tree
            .transaction(|tx| thresholds_in(tx, store_id, product_id, min_quantity, max_quantity))?;
        Ok(record)
    }

    pub fn record_sale(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u64,
    ) -> Result<InventoryRecord> {
        let record = self
            .tree
            .transaction(|tx| sale_in(tx, store_id, product_id, quantity))?;
        debug!(store = %store_id, product = %product_id, quantity, remaining = record.quantity, "sale recorded");
        Ok(record)
    }

    pub fn record_fulfillment(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u64,
    ) -> Result<InventoryRecord> {
        let record = self
            .tree
            .transaction(|tx| fulfil_in(tx, store_id, product_id, quantity))?;
        debug!(store = %store_id, product = %product_id, quantity, on_hand = record.quantity, "fulfillment recorded");
        Ok(record)
    }

    /// All records, or one store's records when `store_id` is given.
    pub fn list(&self, store_id: Option<StoreId>) -> Result<Vec<InventoryRecord>> {
        let entries = match store_id {
            Some(store_id) => self.tree.scan_prefix(store_prefix(store_id)),
            None => self.tree.iter(),
        };
        entries
            .map(|entry| -> Result<InventoryRecord> {
                let (_, bytes) = entry?;
                Ok(minicbor::decode(&bytes)?)
            })
            .collect()
    }

    /// Records with `quantity <= min_quantity`, read fresh from the tree.
    pub fn list_low_stock(&self, store_id: Option<StoreId>) -> Result<Vec<InventoryRecord>> {
        let mut records = self.list(store_id)?;
        records.retain(InventoryRecord::is_low_stock);
        Ok(records)
    }
}

// Transactional building blocks, shared with the workflow service so a status
// change and a ledger write can commit together.

pub(crate) fn load_in(
    tx: &TransactionalTree,
    store_id: StoreId,
    product_id: ProductId,
) -> ConflictableTransactionResult<InventoryRecord, ReplenishError> {
    let key = inventory_key(store_id, product_id);
    match tx.get(&key[..])? {
        Some(bytes) => minicbor::decode(&bytes)
            .map_err(|err| ConflictableTransactionError::Abort(err.into())),
        None => Err(ConflictableTransactionError::Abort(ReplenishError::not_found(
            describe(store_id, product_id),
        ))),
    }
}

pub(crate) fn save_in(
    tx: &TransactionalTree,
    record: &InventoryRecord,
) -> ConflictableTransactionResult<(), ReplenishError> {
    let bytes =
        minicbor::to_vec(record).map_err(|err| ConflictableTransactionError::Abort(err.into()))?;
    tx.insert(&record.key()[..], bytes)?;
    Ok(())
}

/// Insert `record`, aborting with `Conflict` if the pair is already stocked.
pub(crate) fn open_in(
    tx: &TransactionalTree,
    record: &InventoryRecord,
) -> ConflictableTransactionResult<(), ReplenishError> {
    if tx.get(&record.key()[..])?.is_some() {
        return Err(ConflictableTransactionError::Abort(ReplenishError::conflict(
            format!("{} already exists", describe(record.store_id, record.product_id)),
        )));
    }
    save_in(tx, record)
}

pub(crate) fn thresholds_in(
    tx: &TransactionalTree,
    store_id: StoreId,
    product_id: ProductId,
    min_quantity: u64,
    max_quantity: u64,
) -> ConflictableTransactionResult<InventoryRecord, ReplenishError> {
    check_thresholds(min_quantity, max_quantity).map_err(ConflictableTransactionError::Abort)?;
    let mut record = load_in(tx, store_id, product_id)?;
    record.min_quantity = min_quantity;
    record.max_quantity = max_quantity;
    save_in(tx, &record)?;
    Ok(record)
}

pub(crate) fn sale_in(
    tx: &TransactionalTree,
    store_id: StoreId,
    product_id: ProductId,
    quantity: u64,
) -> ConflictableTransactionResult<InventoryRecord, ReplenishError> {
    let mut record = load_in(tx, store_id, product_id)?;
    record.debit(quantity).map_err(ConflictableTransactionError::Abort)?;
    save_in(tx, &record)?;
    Ok(record)
}

pub(crate) fn fulfil_in(
    tx: &TransactionalTree,
    store_id: StoreId,
    product_id: ProductId,
    quantity: u64,
) -> ConflictableTransactionResult<InventoryRecord, ReplenishError> {
    let mut record = load_in(tx, store_id, product_id)?;
    record.credit(quantity).map_err(ConflictableTransactionError::Abort)?;
    save_in(tx, &record)?;
    Ok(record)
}
