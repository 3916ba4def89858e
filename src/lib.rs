//! Stock replenishment for multi-store businesses: an inventory ledger per
//! (store, product), stock requests that move Pending -> Approved -> Completed,
//! and reorder suggestions for anything at or below its minimum.

pub mod access;
pub mod advisor;
pub mod assignment;
pub mod config;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod request;
pub mod service;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use error::{ReplenishError, Result};
pub use service::WorkflowService;
