//! In-memory access policy and catalog.
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::access::{AccessPolicy, Catalog, ProductInfo, Role, Scope, StoreInfo};
use crate::assignment::AssignmentGuard;
use crate::error::{ReplenishError, Result};
use crate::types::{BusinessId, PrincipalId, ProductId, StoreId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub role: Role,
    pub business_id: BusinessId,
}

/// Principals, stores and products held in maps. A manager's store scope is
/// read from the assignment guard on every lookup, so it follows assign and
/// unassign without any bookkeeping here.
pub struct Directory {
    assignments: AssignmentGuard,
    members: RwLock<HashMap<PrincipalId, Member>>,
    stores: RwLock<HashMap<StoreId, StoreInfo>>,
    products: RwLock<HashMap<ProductId, ProductInfo>>,
}

impl Directory {
    pub fn new(assignments: AssignmentGuard) -> Self {
        Self {
            assignments,
            members: RwLock::default(),
            stores: RwLock::default(),
            products: RwLock::default(),
        }
    }

    pub fn add_owner(&self, principal: PrincipalId, business_id: BusinessId) {
        self.add_member(principal, Role::Owner, business_id);
    }

    pub fn add_manager(&self, principal: PrincipalId, business_id: BusinessId) {
        self.add_member(principal, Role::Manager, business_id);
    }

    fn add_member(&self, principal: PrincipalId, role: Role, business_id: BusinessId) {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(principal, Member { role, business_id });
    }

    pub fn add_store(&self, id: StoreId, business_id: BusinessId, name: impl Into<String>) {
        let info = StoreInfo {
            id,
            business_id,
            name: name.into(),
        };
        self.stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, info);
    }

    pub fn add_product(&self, id: ProductId, business_id: BusinessId, name: impl Into<String>) {
        let info = ProductInfo {
            id,
            business_id,
            name: name.into(),
        };
        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, info);
    }

    pub fn member(&self, principal: PrincipalId) -> Option<Member> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&principal)
            .copied()
    }

    fn require_member(&self, principal: PrincipalId) -> Result<Member> {
        self.member(principal)
            .ok_or_else(|| ReplenishError::unauthorized(format!("unknown {principal}")))
    }
}

impl AccessPolicy for Directory {
    fn role_of(&self, principal: PrincipalId) -> Result<Role> {
        Ok(self.require_member(principal)?.role)
    }

    fn scope_of(&self, principal: PrincipalId) -> Result<Scope> {
        let member = self.require_member(principal)?;
        let store_id = match member.role {
            Role::Owner => None,
            Role::Manager => self.assignments.store_of(principal)?,
        };
        Ok(Scope {
            business_id: Some(member.business_id),
            store_id,
        })
    }
}

impl Catalog for Directory {
    fn store(&self, store_id: StoreId) -> Option<StoreInfo> {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&store_id)
            .cloned()
    }

    fn product(&self, product_id: ProductId) -> Option<ProductInfo> {
        self.products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&product_id)
            .cloned()
    }

    fn stores_of(&self, business_id: BusinessId) -> Vec<StoreId> {
        let mut stores: Vec<StoreId> = self
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|store| store.business_id == business_id)
            .map(|store| store.id)
            .collect();
        stores.sort();
        stores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_scope_follows_assignment() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let guard = AssignmentGuard::open(&db).unwrap();
        let directory = Directory::new(guard.clone());
        directory.add_manager(PrincipalId::new(2), BusinessId::new(1));

        assert_eq!(directory.scope_of(PrincipalId::new(2)).unwrap().store_id, None);
        guard.assign(StoreId::new(5), PrincipalId::new(2)).unwrap();
        assert_eq!(
            directory.scope_of(PrincipalId::new(2)).unwrap().store_id,
            Some(StoreId::new(5))
        );
    }

    #[test]
    fn unknown_principals_are_unauthorized() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let directory = Directory::new(AssignmentGuard::open(&db).unwrap());
        assert!(matches!(
            directory.role_of(PrincipalId::new(99)),
            Err(ReplenishError::Unauthorized(_))
        ));
    }

    #[test]
    fn stores_are_listed_per_business() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let directory = Directory::new(AssignmentGuard::open(&db).unwrap());
        directory.add_store(StoreId::new(3), BusinessId::new(1), "harbour");
        directory.add_store(StoreId::new(1), BusinessId::new(1), "market");
        directory.add_store(StoreId::new(2), BusinessId::new(2), "elsewhere");

        assert_eq!(
            directory.stores_of(BusinessId::new(1)),
            vec![StoreId::new(1), StoreId::new(3)]
        );
    }
}
