//! Shared fixture: one business with two stores and two managers, plus a rival
//! business that nobody in the first one may touch.
#![allow(dead_code)]

use std::sync::Arc;

use stock_replenishment::{
    WorkflowService,
    assignment::AssignmentGuard,
    config::StoreConfig,
    directory::Directory,
    telemetry,
    types::{BusinessId, PrincipalId, ProductId, StoreId},
};
use tempfile::TempDir;

pub const BUSINESS: BusinessId = BusinessId::new(1);
pub const RIVAL_BUSINESS: BusinessId = BusinessId::new(2);

pub const OWNER: PrincipalId = PrincipalId::new(1);
pub const MANAGER: PrincipalId = PrincipalId::new(2);
pub const OTHER_MANAGER: PrincipalId = PrincipalId::new(3);
pub const SPARE_MANAGER: PrincipalId = PrincipalId::new(4);
pub const RIVAL_OWNER: PrincipalId = PrincipalId::new(9);

pub const STORE: StoreId = StoreId::new(1);
pub const SECOND_STORE: StoreId = StoreId::new(2);
pub const EMPTY_STORE: StoreId = StoreId::new(3);
pub const RIVAL_STORE: StoreId = StoreId::new(9);

pub const PRODUCT: ProductId = ProductId::new(1);
pub const OAT_MILK: ProductId = ProductId::new(2);
pub const RIVAL_PRODUCT: ProductId = ProductId::new(9);

pub struct Fixture {
    pub service: WorkflowService,
    pub directory: Arc<Directory>,
    pub db: sled::Db,
    // Sled takes a file lock, so every test gets its own database in a
    // temp dir that is removed when the fixture drops.
    _dir: TempDir,
}

/// Inventory(store=1, product=1, quantity=10, min=5, max=20), MANAGER runs
/// STORE and OTHER_MANAGER runs SECOND_STORE.
pub fn fixture() -> anyhow::Result<Fixture> {
    telemetry::init_for_tests();

    let dir = tempfile::tempdir()?;
    let db = StoreConfig::at(dir.path().join("replenishment.db")).open()?;

    let directory = Arc::new(Directory::new(AssignmentGuard::open(&db)?));
    directory.add_owner(OWNER, BUSINESS);
    directory.add_manager(MANAGER, BUSINESS);
    directory.add_manager(OTHER_MANAGER, BUSINESS);
    directory.add_manager(SPARE_MANAGER, BUSINESS);
    directory.add_owner(RIVAL_OWNER, RIVAL_BUSINESS);

    directory.add_store(STORE, BUSINESS, "Harbour Street");
    directory.add_store(SECOND_STORE, BUSINESS, "Market Square");
    directory.add_store(EMPTY_STORE, BUSINESS, "Station Kiosk");
    directory.add_store(RIVAL_STORE, RIVAL_BUSINESS, "Across the Road");

    directory.add_product(PRODUCT, BUSINESS, "Espresso beans");
    directory.add_product(OAT_MILK, BUSINESS, "Oat milk");
    directory.add_product(RIVAL_PRODUCT, RIVAL_BUSINESS, "Instant coffee");

    let service = WorkflowService::new(&db, directory.clone(), directory.clone())?;
    service.assign_manager(OWNER, STORE, MANAGER)?;
    service.assign_manager(OWNER, SECOND_STORE, OTHER_MANAGER)?;
    service.register_inventory(OWNER, STORE, PRODUCT, 10, 5, 20)?;

    Ok(Fixture {
        service,
        directory,
        db,
        _dir: dir,
    })
}
