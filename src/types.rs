use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Quantity of an ERC20 token, identified by its foreign-chain contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20Token {
    pub contract: Address,
    pub amount: U256,
}

impl Erc20Token {
    pub fn new(contract: Address, amount: impl Into<U256>) -> Self {
        Self {
            contract,
            amount: amount.into(),
        }
    }
}

/// Withdrawal request from the home chain to the foreign chain
///
/// Lives either in the unbatched pool of its token or inside exactly one
/// outstanding batch, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendToForeign {
    pub id: u64,
    pub sender: String,
    pub foreign_recipient: Address,
    pub amount: Erc20Token,
    pub fee: Erc20Token,
    /// Home-chain height at which the request was created
    pub height: u64,
}

/// Nonce-ordered group of transfers destined for one token contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTx {
    pub nonce: u64,
    pub token_contract: Address,
    /// Transfers in selection order (highest fee first)
    pub transactions: Vec<SendToForeign>,
    /// Foreign-chain height after which the batch can no longer execute
    pub timeout: u64,
    /// Home-chain height at which the batch was created
    pub height: u64,
}

impl BatchTx {
    /// Sum of the fees of every member transfer
    pub fn fee_total(&self) -> U256 {
        self.transactions
            .iter()
            .fold(U256::zero(), |acc, tx| acc.saturating_add(tx.fee.amount))
    }
}

/// Every record kind the module persists, tagged so the kind is checked once at decode time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredRecord {
    Transfer(SendToForeign),
    Batch(BatchTx),
}

impl StoredRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            StoredRecord::Transfer(_) => RecordKind::Transfer,
            StoredRecord::Batch(_) => RecordKind::Batch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Transfer,
    Batch,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Transfer => write!(f, "transfer"),
            RecordKind::Batch => write!(f, "batch"),
        }
    }
}

/// Last (home, foreign) height pair recorded together by the oracle
///
/// `(0, 0)` means nothing has been observed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedHeights {
    pub home_height: u64,
    pub foreign_height: u64,
}

impl ObservedHeights {
    pub fn is_observed(&self) -> bool {
        self.home_height != 0 && self.foreign_height != 0
    }
}
