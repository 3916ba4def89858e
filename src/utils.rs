//! Identifier generation and storage key helpers

use bech32::Bech32m;
use uuid7::uuid7;

use crate::types::{ProductId, StoreId};

pub const REQUEST_HRP: &str = "request_";

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Fresh stock request id, e.g. `request_1...`
pub fn new_request_id() -> String {
    // only fails on a malformed hrp, and REQUEST_HRP is fixed
    new_uuid_to_bech32(REQUEST_HRP).unwrap_or_else(|_| uuid7().to_string())
}

/// Big-endian `store ++ product`, so a store prefix scan walks one store's records.
pub fn inventory_key(store_id: StoreId, product_id: ProductId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&store_id.get().to_be_bytes());
    key[8..].copy_from_slice(&product_id.get().to_be_bytes());
    key
}

pub fn store_prefix(store_id: StoreId) -> [u8; 8] {
    store_id.get().to_be_bytes()
}
