//! Reorder suggestions derived from the ledger on every call.
use tracing::debug;

use crate::access::Catalog;
use crate::error::Result;
use crate::ledger::{InventoryLedger, InventoryRecord};
use crate::types::{BusinessId, ProductId, StoreId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisorScope {
    Store(StoreId),
    Business(BusinessId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderCandidate {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub product_name: String,
    pub current_quantity: u64,
    pub min_quantity: u64,
    pub max_quantity: u64,
    pub suggested_amount: u64,
}

/// Refill to `max_quantity`, and always at least one unit.
pub fn suggested_amount(record: &InventoryRecord) -> u64 {
    record.max_quantity.saturating_sub(record.quantity).max(1)
}

impl ReorderCandidate {
    fn from_record(record: InventoryRecord, product_name: String) -> Self {
        Self {
            suggested_amount: suggested_amount(&record),
            store_id: record.store_id,
            product_id: record.product_id,
            product_name,
            current_quantity: record.quantity,
            min_quantity: record.min_quantity,
            max_quantity: record.max_quantity,
        }
    }
}

pub struct ReorderAdvisor<'a> {
    ledger: &'a InventoryLedger,
    catalog: &'a dyn Catalog,
}

impl<'a> ReorderAdvisor<'a> {
    pub fn new(ledger: &'a InventoryLedger, catalog: &'a dyn Catalog) -> Self {
        Self { ledger, catalog }
    }

    pub fn candidates(&self, scope: AdvisorScope) -> Result<Vec<ReorderCandidate>> {
        let stores = match scope {
            AdvisorScope::Store(store_id) => vec![store_id],
            AdvisorScope::Business(business_id) => self.catalog.stores_of(business_id),
        };

        let mut candidates = Vec::new();
        for store_id in stores {
            for record in self.ledger.list_low_stock(Some(store_id))? {
                let product_name = self
                    .catalog
                    .product(record.product_id)
                    .map(|product| product.name)
                    .unwrap_or_else(|| record.product_id.to_string());
                candidates.push(ReorderCandidate::from_record(record, product_name));
            }
        }
        debug!(?scope, count = candidates.len(), "reorder candidates computed");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(quantity: u64, min: u64, max: u64) -> InventoryRecord {
        InventoryRecord::new(StoreId::new(1), ProductId::new(1), quantity, min, max).unwrap()
    }

    #[test]
    fn suggestion_fills_to_max() {
        assert_eq!(suggested_amount(&record(4, 5, 20)), 16);
        assert_eq!(suggested_amount(&record(0, 0, 9)), 9);
    }

    #[test]
    fn suggestion_is_never_zero() {
        assert_eq!(suggested_amount(&record(5, 5, 5)), 1);
        assert_eq!(suggested_amount(&record(0, 0, 0)), 1);
    }
}
