//! Request and record types exchanged with the ledger client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chain::{Bytes32, Coin, SpendBundle};

// ---------------------------------------------------------------------------
// Payment / TransactionRequest
// ---------------------------------------------------------------------------

/// One output of a base transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub puzzle_hash: Bytes32,
    pub amount: u64,
    #[serde(default)]
    pub memos: Vec<Vec<u8>>,
}

impl Payment {
    pub fn new(puzzle_hash: Bytes32, amount: u64) -> Self {
        Self {
            puzzle_hash,
            amount,
            memos: Vec::new(),
        }
    }
}

/// What the gateway asks the ledger client to build and sign: spend these
/// coins, pay these outputs, leave this fee. Change goes back to the
/// spending wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub coins: Vec<Coin>,
    pub payments: Vec<Payment>,
    pub fee: u64,
}

impl TransactionRequest {
    /// `None` on overflow.
    pub fn total_input(&self) -> Option<u64> {
        self.coins.iter().try_fold(0u64, |sum, c| sum.checked_add(c.amount))
    }

    /// `None` on overflow.
    pub fn total_output(&self) -> Option<u64> {
        self.payments.iter().try_fold(0u64, |sum, p| sum.checked_add(p.amount))
    }
}

// ---------------------------------------------------------------------------
// TransactionRecord
// ---------------------------------------------------------------------------

/// The wallet's bookkeeping entry for a transaction it created.
///
/// `spend_bundle` is `None` for records handed back to a client that must
/// not be able to broadcast them (a detokenization request is only valid
/// once the registry counter-signs it).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub confirmed_at_height: u32,
    /// Unix seconds.
    pub created_at_time: u64,
    pub to_puzzle_hash: Bytes32,
    pub amount: u64,
    pub fee_amount: u64,
    pub confirmed: bool,
    pub sent: u32,
    pub spend_bundle: Option<SpendBundle>,
    pub additions: Vec<Coin>,
    pub removals: Vec<Coin>,
    pub wallet_id: u32,
    pub tx_type: u32,
    pub name: Bytes32,
    pub memos: Vec<(Bytes32, Vec<Vec<u8>>)>,
}

impl TransactionRecord {
    /// The same record without its bundle.
    pub fn without_bundle(&self) -> Self {
        Self {
            spend_bundle: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for TransactionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tx[{}] type={} to={} amount={} fee={}",
            self.name, self.tx_type, self.to_puzzle_hash, self.amount, self.fee_amount
        )
    }
}
