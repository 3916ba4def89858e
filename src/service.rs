//! Service layer API for the stock replenishment workflow.
//!
//! Every call takes the acting principal explicitly, resolves it once through
//! the [`AccessPolicy`], and commits its writes in a single sled transaction
//! spanning every tree it touches. A failed call leaves no trace in storage.
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::access::{AccessPolicy, Caller, Catalog, ProductInfo, Role, StoreInfo};
use crate::advisor::{AdvisorScope, ReorderAdvisor, ReorderCandidate};
use crate::assignment::{self, AssignmentGuard};
use crate::error::{ReplenishError, Result};
use crate::ledger::{self, InventoryLedger, InventoryRecord};
use crate::request::{self, NewStockRequest, RequestEvent, RequestStatus, RequestStore, StockRequest};
use crate::types::{PrincipalId, ProductId, StoreId};
use crate::utils::new_request_id;

pub struct WorkflowService {
    ledger: InventoryLedger,
    requests: RequestStore,
    assignments: AssignmentGuard,
    policy: Arc<dyn AccessPolicy>,
    catalog: Arc<dyn Catalog>,
}

impl WorkflowService {
    pub fn new(
        instance: &sled::Db,
        policy: Arc<dyn AccessPolicy>,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self> {
        Ok(Self {
            ledger: InventoryLedger::open(instance)?,
            requests: RequestStore::open(instance)?,
            assignments: AssignmentGuard::open(instance)?,
            policy,
            catalog,
        })
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    pub fn requests(&self) -> &RequestStore {
        &self.requests
    }

    pub fn assignments(&self) -> &AssignmentGuard {
        &self.assignments
    }

    fn caller(&self, principal: PrincipalId) -> Result<Caller> {
        Caller::resolve(self.policy.as_ref(), principal)
    }

    fn store_info(&self, store_id: StoreId) -> Result<StoreInfo> {
        self.catalog
            .store(store_id)
            .ok_or_else(|| ReplenishError::not_found(store_id.to_string()))
    }

    /// The product must exist and belong to the same business as the store.
    fn product_info(&self, product_id: ProductId, store: &StoreInfo) -> Result<ProductInfo> {
        let product = self
            .catalog
            .product(product_id)
            .ok_or_else(|| ReplenishError::not_found(product_id.to_string()))?;
        if product.business_id != store.business_id {
            return Err(ReplenishError::unauthorized(format!(
                "{product_id} does not belong to {}",
                store.business_id
            )));
        }
        Ok(product)
    }

    /// Owners of the store's business, or the manager that claims the store.
    /// Managers are confirmed again inside the transaction.
    fn authorize_store(&self, caller: &Caller, store: &StoreInfo) -> Result<()> {
        let allowed = match caller.role {
            Role::Owner => caller.is_owner_of(store.business_id),
            Role::Manager => {
                caller.scope.business_id == Some(store.business_id)
                    && caller.managed_store() == Some(store.id)
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(ReplenishError::unauthorized(format!(
                "{} may not act on {}",
                caller.principal, store.id
            )))
        }
    }

    fn can_view(caller: &Caller, request: &StockRequest) -> bool {
        caller.is_owner_of(request.business_id)
            || caller.managed_store() == Some(request.store_id)
            || request.requested_by == caller.principal
    }

    /// Submit a new stock request. It starts out `Pending`.
    #[instrument(skip_all, fields(principal = %principal, store = %store_id, product = %product_id))]
    pub fn create_request(
        &self,
        principal: PrincipalId,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u64,
        message: impl Into<String>,
    ) -> Result<StockRequest> {
        let draft = NewStockRequest {
            store_id,
            product_id,
            quantity,
            message: message.into(),
        };
        draft.validate()?;

        let caller = self.caller(principal)?;
        let store = self.store_info(store_id)?;
        self.product_info(product_id, &store)?;
        self.authorize_store(&caller, &store)
            .inspect_err(|err| warn!(%err, "request creation denied"))?;

        let request = StockRequest::new(new_request_id(), store.business_id, principal, draft)?;

        (self.requests.tree(), self.assignments.by_store()).transaction(
            |(requests_tx, by_store)| {
                confirm_caller_in(by_store, &caller, store_id)?;
                request::save_in(requests_tx, &request)
            },
        )?;

        info!(request = %request.id, quantity, "stock request created");
        Ok(request)
    }

    /// Approve a pending request. Owners of the request's business only.
    #[instrument(skip_all, fields(principal = %principal, request = request_id))]
    pub fn approve(&self, principal: PrincipalId, request_id: &str) -> Result<StockRequest> {
        self.decide(principal, request_id, RequestEvent::Approve)
    }

    /// Reject a pending request. Owners of the request's business only.
    #[instrument(skip_all, fields(principal = %principal, request = request_id))]
    pub fn reject(&self, principal: PrincipalId, request_id: &str) -> Result<StockRequest> {
        self.decide(principal, request_id, RequestEvent::Reject)
    }

    fn decide(
        &self,
        principal: PrincipalId,
        request_id: &str,
        event: RequestEvent,
    ) -> Result<StockRequest> {
        let caller = self.caller(principal)?;

        let request = self
            .requests
            .tree()
            .transaction(|tx| {
                let mut request = request::load_in(tx, request_id)?;
                caller
                    .require_owner_of(request.business_id)
                    .map_err(ConflictableTransactionError::Abort)?;
                request
                    .transition(event)
                    .map_err(ConflictableTransactionError::Abort)?;
                request::save_in(tx, &request)?;
                Ok(request)
            })
            .map_err(ReplenishError::from)
            .inspect_err(|err| warn!(%err, %event, "decision rejected"))?;

        info!(request = %request.id, status = ?request.status, "stock request decided");
        Ok(request)
    }

    /// Mark an approved request as received. Credits the ledger with the
    /// requested quantity and stamps `fulfilled_at` in the same transaction, so
    /// a retried or concurrent completion fails with `InvalidTransition`
    /// instead of crediting twice.
    #[instrument(skip_all, fields(principal = %principal, request = request_id))]
    pub fn complete(&self, principal: PrincipalId, request_id: &str) -> Result<StockRequest> {
        let caller = self.caller(principal)?;
        if caller.role != Role::Manager {
            return Err(ReplenishError::unauthorized(
                "only the store's manager can complete a request",
            ));
        }

        let (request, record) = (
            self.requests.tree(),
            self.ledger.tree(),
            self.assignments.by_store(),
        )
            .transaction(|(requests_tx, inventory_tx, by_store)| {
                let mut request = request::load_in(requests_tx, request_id)?;
                assignment::confirm_manager_in(by_store, request.store_id, principal)?;
                request
                    .transition(RequestEvent::Complete)
                    .map_err(ConflictableTransactionError::Abort)?;
                let record = ledger::fulfil_in(
                    inventory_tx,
                    request.store_id,
                    request.product_id,
                    request.requested_quantity,
                )?;
                request::save_in(requests_tx, &request)?;
                Ok((request, record))
            })
            .map_err(ReplenishError::from)
            .inspect_err(|err| warn!(%err, "completion rejected"))?;

        info!(
            request = %request.id,
            store = %record.store_id,
            product = %record.product_id,
            on_hand = record.quantity,
            "stock request completed"
        );
        Ok(request)
    }

    /// Withdraw a pending request. The row is removed outright.
    #[instrument(skip_all, fields(principal = %principal, request = request_id))]
    pub fn cancel(&self, principal: PrincipalId, request_id: &str) -> Result<()> {
        let caller = self.caller(principal)?;

        self.requests
            .tree()
            .transaction(|tx| {
                let request = request::load_in(tx, request_id)?;
                if request.requested_by != principal && !caller.is_owner_of(request.business_id) {
                    return Err(ConflictableTransactionError::Abort(
                        ReplenishError::unauthorized(format!(
                            "{principal} did not raise {request_id}"
                        )),
                    ));
                }
                request
                    .status
                    .apply(RequestEvent::Cancel)
                    .map_err(ConflictableTransactionError::Abort)?;
                request::remove_in(tx, request_id)
            })
            .map_err(ReplenishError::from)
            .inspect_err(|err| warn!(%err, "cancellation rejected"))?;

        info!(request = %request_id, "stock request cancelled");
        Ok(())
    }

    /// Reorder candidates for one store, or for every store the caller can see
    /// when `store_id` is `None`.
    #[instrument(skip_all, fields(principal = %principal, store = ?store_id))]
    pub fn list_low_stock(
        &self,
        principal: PrincipalId,
        store_id: Option<StoreId>,
    ) -> Result<Vec<ReorderCandidate>> {
        let caller = self.caller(principal)?;
        let scope = match (caller.role, store_id) {
            (Role::Owner, Some(store_id)) => {
                let store = self.store_info(store_id)?;
                caller.require_owner_of(store.business_id)?;
                AdvisorScope::Store(store_id)
            }
            (Role::Owner, None) => {
                let business_id = caller
                    .scope
                    .business_id
                    .ok_or_else(|| ReplenishError::unauthorized("owner has no business"))?;
                AdvisorScope::Business(business_id)
            }
            (Role::Manager, requested) => {
                let own = caller
                    .managed_store()
                    .ok_or_else(|| ReplenishError::unauthorized("manager has no store"))?;
                if requested.is_some_and(|store_id| store_id != own) {
                    return Err(ReplenishError::unauthorized(format!(
                        "{principal} does not manage the requested store"
                    )));
                }
                AdvisorScope::Store(own)
            }
        };

        ReorderAdvisor::new(&self.ledger, self.catalog.as_ref()).candidates(scope)
    }

    /// Take sold units off the shelf. Never drives the quantity below zero.
    #[instrument(skip_all, fields(principal = %principal, store = %store_id, product = %product_id))]
    pub fn record_sale(
        &self,
        principal: PrincipalId,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u64,
    ) -> Result<InventoryRecord> {
        if quantity == 0 {
            return Err(ReplenishError::validation("sale quantity must be positive"));
        }
        let caller = self.caller(principal)?;
        let store = self.store_info(store_id)?;
        self.authorize_store(&caller, &store)?;

        let record = (self.ledger.tree(), self.assignments.by_store())
            .transaction(|(inventory_tx, by_store)| {
                confirm_caller_in(by_store, &caller, store_id)?;
                ledger::sale_in(inventory_tx, store_id, product_id, quantity)
            })
            .map_err(ReplenishError::from)
            .inspect_err(|err| warn!(%err, quantity, "sale rejected"))?;

        info!(quantity, remaining = record.quantity, "sale recorded");
        Ok(record)
    }

    #[instrument(skip_all, fields(principal = %principal, store = %store_id, product = %product_id))]
    pub fn get_inventory(
        &self,
        principal: PrincipalId,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<InventoryRecord> {
        let caller = self.caller(principal)?;
        let store = self.store_info(store_id)?;
        self.authorize_store(&caller, &store)?;
        self.ledger.get(store_id, product_id)
    }

    /// Start tracking a product at a store.
    #[instrument(skip_all, fields(principal = %principal, store = %store_id, product = %product_id))]
    pub fn register_inventory(
        &self,
        principal: PrincipalId,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u64,
        min_quantity: u64,
        max_quantity: u64,
    ) -> Result<InventoryRecord> {
        let record =
            InventoryRecord::new(store_id, product_id, quantity, min_quantity, max_quantity)?;
        let caller = self.caller(principal)?;
        let store = self.store_info(store_id)?;
        self.product_info(product_id, &store)?;
        self.authorize_store(&caller, &store)?;

        (self.ledger.tree(), self.assignments.by_store()).transaction(
            |(inventory_tx, by_store)| {
                confirm_caller_in(by_store, &caller, store_id)?;
                ledger::open_in(inventory_tx, &record)
            },
        )
        .map_err(ReplenishError::from)
        .inspect_err(|err| warn!(%err, "inventory registration rejected"))?;

        info!(quantity, min_quantity, max_quantity, "inventory registered");
        Ok(record)
    }

    #[instrument(skip_all, fields(principal = %principal, store = %store_id, product = %product_id))]
    pub fn update_thresholds(
        &self,
        principal: PrincipalId,
        store_id: StoreId,
        product_id: ProductId,
        min_quantity: u64,
        max_quantity: u64,
    ) -> Result<InventoryRecord> {
        if min_quantity > max_quantity {
            return Err(ReplenishError::validation(format!(
                "min quantity {min_quantity} exceeds max quantity {max_quantity}"
            )));
        }
        let caller = self.caller(principal)?;
        let store = self.store_info(store_id)?;
        self.authorize_store(&caller, &store)?;

        let record = (self.ledger.tree(), self.assignments.by_store()).transaction(
            |(inventory_tx, by_store)| {
                confirm_caller_in(by_store, &caller, store_id)?;
                ledger::thresholds_in(inventory_tx, store_id, product_id, min_quantity, max_quantity)
            },
        )?;
        info!(min_quantity, max_quantity, "thresholds updated");
        Ok(record)
    }

    #[instrument(skip_all, fields(principal = %principal, request = request_id))]
    pub fn get_request(&self, principal: PrincipalId, request_id: &str) -> Result<StockRequest> {
        let caller = self.caller(principal)?;
        let request = self.requests.get(request_id)?;
        if !Self::can_view(&caller, &request) {
            return Err(ReplenishError::unauthorized(format!(
                "{principal} may not view {request_id}"
            )));
        }
        Ok(request)
    }

    /// Requests visible to the caller, oldest first.
    #[instrument(skip_all, fields(principal = %principal, status = ?status))]
    pub fn list_requests(
        &self,
        principal: PrincipalId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<StockRequest>> {
        let caller = self.caller(principal)?;
        let mut requests: Vec<StockRequest> = self
            .requests
            .list()?
            .into_iter()
            .filter(|request| Self::can_view(&caller, request))
            .filter(|request| status.is_none_or(|status| request.status == status))
            .collect();
        requests.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(requests)
    }

    /// Put a manager of the store's business in charge of the store.
    #[instrument(skip_all, fields(principal = %principal, store = %store_id, manager = %manager_id))]
    pub fn assign_manager(
        &self,
        principal: PrincipalId,
        store_id: StoreId,
        manager_id: PrincipalId,
    ) -> Result<()> {
        let caller = self.caller(principal)?;
        let store = self.store_info(store_id)?;
        caller.require_owner_of(store.business_id)?;

        let assignee = Caller::resolve(self.policy.as_ref(), manager_id)?;
        if assignee.role != Role::Manager || assignee.scope.business_id != Some(store.business_id) {
            return Err(ReplenishError::validation(format!(
                "{manager_id} is not a manager of {}",
                store.business_id
            )));
        }
        self.assignments.assign(store_id, manager_id)
    }

    #[instrument(skip_all, fields(principal = %principal, manager = %manager_id))]
    pub fn unassign_manager(&self, principal: PrincipalId, manager_id: PrincipalId) -> Result<StoreId> {
        let caller = self.caller(principal)?;
        let store_id = self
            .assignments
            .store_of(manager_id)?
            .ok_or_else(|| ReplenishError::not_found(format!("assignment for {manager_id}")))?;
        let store = self.store_info(store_id)?;
        caller.require_owner_of(store.business_id)?;
        self.assignments.unassign(manager_id)
    }
}

// Owners pass through; managers must hold the store at commit time.
fn confirm_caller_in(
    by_store: &TransactionalTree,
    caller: &Caller,
    store_id: StoreId,
) -> ConflictableTransactionResult<(), ReplenishError> {
    match caller.role {
        Role::Owner => Ok(()),
        Role::Manager => assignment::confirm_manager_in(by_store, store_id, caller.principal),
    }
}
