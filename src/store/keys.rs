//! Persisted key layout
//!
//! The layout is shared with the foreign-chain tooling and must stay bit-exact.

use ethers::{
    types::{Address, U256},
    utils::hex,
};

/// Prefix of outgoing batch records: `0x01 ++ token(20) ++ nonce(8, BE)`
pub const BATCH_TX_PREFIX: u8 = 0x01;
/// Prefix of unbatched transfers: `0x07 ++ token(20) ++ fee(32, BE) ++ !id(8, BE)`
pub const UNBATCHED_TRANSFER_PREFIX: u8 = 0x07;
pub const LAST_SLASHED_BATCH_BLOCK_KEY: u8 = 0x0b;
pub const LAST_OUTGOING_BATCH_NONCE_KEY: u8 = 0x0d;
pub const LAST_TRANSFER_ID_KEY: u8 = 0x0e;
pub const LAST_OBSERVED_HEIGHTS_KEY: u8 = 0x0f;

pub fn batch_tx_key(token: Address, nonce: u64) -> Vec<u8> {
    let mut key = batch_tx_token_prefix(token);
    key.extend_from_slice(&nonce.to_be_bytes());
    key
}

pub fn batch_tx_token_prefix(token: Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(29);
    key.push(BATCH_TX_PREFIX);
    key.extend_from_slice(token.as_bytes());
    key
}

/// Unbatched transfer key
///
/// Reverse iteration yields the highest fee first; the id is stored inverted so
/// that among equal fees the oldest transfer comes first.
pub fn unbatched_transfer_key(token: Address, fee: U256, id: u64) -> Vec<u8> {
    let mut key = unbatched_token_prefix(token);
    let mut fee_bytes = [0u8; 32];
    fee.to_big_endian(&mut fee_bytes);
    key.extend_from_slice(&fee_bytes);
    key.extend_from_slice(&(u64::MAX - id).to_be_bytes());
    key
}

pub fn unbatched_token_prefix(token: Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(61);
    key.push(UNBATCHED_TRANSFER_PREFIX);
    key.extend_from_slice(token.as_bytes());
    key
}

/// Token contract embedded in a batch or unbatched-transfer key
pub fn token_from_key(key: &[u8]) -> Option<Address> {
    key.get(1..21).map(Address::from_slice)
}

pub fn u64_to_bytes(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn u64_from_bytes(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}

/// Printable form of a key for error messages
pub fn display_key(key: &[u8]) -> String {
    format!("0x{}", hex::encode(key))
}
