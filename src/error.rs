//! Error types for the batch module
//!
//! Two classes share one enum:
//! - invariant violations, which mean the stored state is corrupt or the caller
//!   misused the module; the enclosing transition must be aborted
//! - rejections of a user request (unknown transfer, wrong sender, ...)

use crate::types::RecordKind;
use ethers::types::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no outstanding batch for token {token:?} with nonce {nonce}")]
    BatchNotFound { token: Address, nonce: u64 },

    #[error("record at key {key} is a {found}, expected a {expected}")]
    UnexpectedRecord {
        key: String,
        expected: RecordKind,
        found: RecordKind,
    },

    #[error("failed to decode record at key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed value at key {key}: expected {expected} bytes, got {got}")]
    MalformedValue {
        key: String,
        expected: usize,
        got: usize,
    },

    #[error("transfer {0} is not in the unbatched pool")]
    TransferNotFound(u64),

    #[error("transfer {id} is already part of batch {nonce}")]
    TransferInBatch { id: u64, nonce: u64 },

    #[error("transfer {id} was not sent by {sender}")]
    NotSender { id: u64, sender: String },

    #[error("fee token {fee:?} does not match transfer token {amount:?}")]
    MismatchedFeeToken { amount: Address, fee: Address },
}

impl BatchError {
    /// True for errors that mean state is corrupt or the module was misused.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            BatchError::BatchNotFound { .. }
                | BatchError::UnexpectedRecord { .. }
                | BatchError::Decode { .. }
                | BatchError::Encode(_)
                | BatchError::MalformedValue { .. }
        )
    }
}

pub type Result<T, E = BatchError> = std::result::Result<T, E>;
