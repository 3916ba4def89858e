//! Stock requests and the status machine they move through.
//!
//! ```text
//! create ─▶ Pending ─approve─▶ Approved ─complete─▶ Completed
//!              │ ╲
//!           reject cancel (row removed)
//!              ▼
//!           Rejected
//! ```
//!
//! `Rejected` and `Completed` are terminal. Anything not on an edge above is an
//! [`ReplenishError::InvalidTransition`] and leaves the request untouched.
use chrono::Utc;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use std::fmt;

use crate::error::{ReplenishError, Result};
use crate::types::{BusinessId, PrincipalId, ProductId, StoreId, TimeStamp};

pub const REQUEST_TREE: &str = "requests";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum RequestStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestEvent {
    Approve,
    Reject,
    Complete,
    Cancel,
}

/// Where an event leaves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(RequestStatus),
    Removed,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Completed)
    }

    pub fn apply(self, event: RequestEvent) -> Result<Transition> {
        use RequestEvent::*;
        use RequestStatus::*;

        match (self, event) {
            (Pending, Approve) => Ok(Transition::To(Approved)),
            (Pending, Reject) => Ok(Transition::To(Rejected)),
            (Pending, Cancel) => Ok(Transition::Removed),
            (Approved, Complete) => Ok(Transition::To(Completed)),
            (from, event) => Err(ReplenishError::InvalidTransition { from, event }),
        }
    }
}

impl fmt::Display for RequestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestEvent::Approve => "approve",
            RequestEvent::Reject => "reject",
            RequestEvent::Complete => "complete",
            RequestEvent::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct StockRequest {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    pub business_id: BusinessId, // owner of the store at creation time
    #[n(2)]
    pub store_id: StoreId,
    #[n(3)]
    pub product_id: ProductId,
    #[n(4)]
    pub requested_by: PrincipalId,
    #[n(5)]
    pub requested_quantity: u64,
    #[n(6)]
    pub status: RequestStatus,
    #[n(7)]
    pub message: String,
    #[n(8)]
    pub requested_at: TimeStamp<Utc>,
    #[n(9)]
    pub fulfilled_at: Option<TimeStamp<Utc>>,
}

/// Input for a new request, checked before anything is read from storage.
#[derive(Debug, Clone)]
pub struct NewStockRequest {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub message: String,
}

impl NewStockRequest {
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(ReplenishError::validation(
                "requested quantity must be positive",
            ));
        }
        if self.message.trim().is_empty() {
            return Err(ReplenishError::validation("a request message is required"));
        }
        Ok(())
    }
}

impl StockRequest {
    pub fn new(
        id: String,
        business_id: BusinessId,
        requested_by: PrincipalId,
        draft: NewStockRequest,
    ) -> Result<Self> {
        draft.validate()?;
        Ok(Self {
            id,
            business_id,
            store_id: draft.store_id,
            product_id: draft.product_id,
            requested_by,
            requested_quantity: draft.quantity,
            status: RequestStatus::Pending,
            message: draft.message,
            requested_at: TimeStamp::new(),
            fulfilled_at: None,
        })
    }

    /// Move the request along one edge. On error `self` is unchanged.
    pub fn transition(&mut self, event: RequestEvent) -> Result<Transition> {
        let next = self.status.apply(event)?;
        if let Transition::To(status) = next {
            self.status = status;
            if status == RequestStatus::Completed {
                self.fulfilled_at = Some(TimeStamp::new());
            }
        }
        Ok(next)
    }
}

#[derive(Clone)]
pub struct RequestStore {
    tree: sled::Tree,
}

impl RequestStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(REQUEST_TREE)?,
        })
    }

    pub(crate) fn tree(&self) -> &sled::Tree {
        &self.tree
    }

    pub fn get(&self, request_id: &str) -> Result<StockRequest> {
        match self.tree.get(request_id.as_bytes())? {
            Some(bytes) => Ok(minicbor::decode(&bytes)?),
            None => Err(ReplenishError::not_found(format!("stock request {request_id}"))),
        }
    }

    pub fn list(&self) -> Result<Vec<StockRequest>> {
        self.tree
            .iter()
            .map(|entry| -> Result<StockRequest> {
                let (_, bytes) = entry?;
                Ok(minicbor::decode(&bytes)?)
            })
            .collect()
    }
}

pub(crate) fn load_in(
    tx: &TransactionalTree,
    request_id: &str,
) -> ConflictableTransactionResult<StockRequest, ReplenishError> {
    match tx.get(request_id.as_bytes())? {
        Some(bytes) => minicbor::decode(&bytes)
            .map_err(|err| ConflictableTransactionError::Abort(err.into())),
        None => Err(ConflictableTransactionError::Abort(ReplenishError::not_found(
            format!("stock request {request_id}"),
        ))),
    }
}

pub(crate) fn save_in(
    tx: &TransactionalTree,
    request: &StockRequest,
) -> ConflictableTransactionResult<(), ReplenishError> {
    let bytes =
        minicbor::to_vec(request).map_err(|err| ConflictableTransactionError::Abort(err.into()))?;
    tx.insert(request.id.as_bytes(), bytes)?;
    Ok(())
}

pub(crate) fn remove_in(
    tx: &TransactionalTree,
    request_id: &str,
) -> ConflictableTransactionResult<(), ReplenishError> {
    tx.remove(request_id.as_bytes())?;
    Ok(())
}
