//! Collaborator seams: who the caller is, and what the catalog holds.
//!
//! Neither trait does any IO of its own as far as this crate is concerned; an
//! embedding application backs them with its identity service and product/store
//! tables. [`crate::directory::Directory`] is the in-memory implementation.
use crate::error::{ReplenishError, Result};
use crate::types::{BusinessId, PrincipalId, ProductId, StoreId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    Manager,
}

/// The entities a principal may act on.
///
/// Owners carry a business and no store. Managers carry their business and,
/// when assigned, their single store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scope {
    pub business_id: Option<BusinessId>,
    pub store_id: Option<StoreId>,
}

pub trait AccessPolicy: Send + Sync {
    /// `Unauthorized` for principals the policy does not know.
    fn role_of(&self, principal: PrincipalId) -> Result<Role>;
    fn scope_of(&self, principal: PrincipalId) -> Result<Scope>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    pub id: StoreId,
    pub business_id: BusinessId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    pub id: ProductId,
    pub business_id: BusinessId,
    pub name: String,
}

pub trait Catalog: Send + Sync {
    fn store(&self, store_id: StoreId) -> Option<StoreInfo>;
    fn product(&self, product_id: ProductId) -> Option<ProductInfo>;
    fn stores_of(&self, business_id: BusinessId) -> Vec<StoreId>;
}

/// A principal resolved once at the start of a service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub principal: PrincipalId,
    pub role: Role,
    pub scope: Scope,
}

impl Caller {
    pub fn resolve(policy: &dyn AccessPolicy, principal: PrincipalId) -> Result<Self> {
        Ok(Self {
            principal,
            role: policy.role_of(principal)?,
            scope: policy.scope_of(principal)?,
        })
    }

    pub fn is_owner_of(&self, business_id: BusinessId) -> bool {
        self.role == Role::Owner && self.scope.business_id == Some(business_id)
    }

    /// Owner guard of the approve/reject edges.
    pub fn require_owner_of(&self, business_id: BusinessId) -> Result<()> {
        if self.is_owner_of(business_id) {
            Ok(())
        } else {
            Err(ReplenishError::unauthorized(format!(
                "{} is not an owner of {business_id}",
                self.principal
            )))
        }
    }

    /// The store a manager claims to run. Still has to be confirmed against the
    /// assignment trees inside the transaction that depends on it.
    pub fn managed_store(&self) -> Option<StoreId> {
        match self.role {
            Role::Manager => self.scope.store_id,
            Role::Owner => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role, business: u64, store: Option<u64>) -> Caller {
        Caller {
            principal: PrincipalId::new(1),
            role,
            scope: Scope {
                business_id: Some(BusinessId::new(business)),
                store_id: store.map(StoreId::new),
            },
        }
    }

    #[test]
    fn owners_are_scoped_to_their_business() {
        let owner = caller(Role::Owner, 1, None);
        assert!(owner.require_owner_of(BusinessId::new(1)).is_ok());
        assert!(matches!(
            owner.require_owner_of(BusinessId::new(2)),
            Err(ReplenishError::Unauthorized(_))
        ));
        assert_eq!(owner.managed_store(), None);
    }

    #[test]
    fn managers_are_never_owners() {
        let manager = caller(Role::Manager, 1, Some(3));
        assert!(!manager.is_owner_of(BusinessId::new(1)));
        assert_eq!(manager.managed_store(), Some(StoreId::new(3)));
    }
}
