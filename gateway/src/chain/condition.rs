//! Output conditions of a spend.
//!
//! Running a spend script over its solution yields a list of conditions.
//! The core only cares about the four below: the two signature
//! requirements, coin creation and the fee reservation. Anything else a
//! script emits is ignored.

use chia::clvm_traits::{clvm_list, ClvmEncoder, FromClvm, FromClvmError, ToClvm, ToClvmError};
use clvmr::allocator::{NodePtr, SExp};
use clvmr::Allocator;
use serde::{Deserialize, Serialize};

use super::{Bytes, Bytes32, ClvmError, Program};
use crate::crypto::PublicKey;

pub mod opcodes {
    pub const AGG_SIG_UNSAFE: u8 = 49;
    pub const AGG_SIG_ME: u8 = 50;
    pub const CREATE_COIN: u8 = 51;
    pub const RESERVE_FEE: u8 = 52;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// Signature over the raw message.
    AggSigUnsafe { public_key: PublicKey, message: Vec<u8> },
    /// Signature over `message || coin_id || additional_data`.
    AggSigMe { public_key: PublicKey, message: Vec<u8> },
    CreateCoin {
        puzzle_hash: Bytes32,
        amount: u64,
        memos: Vec<Vec<u8>>,
    },
    ReserveFee { amount: u64 },
}

impl Condition {
    pub fn create_coin(puzzle_hash: Bytes32, amount: u64) -> Self {
        Self::CreateCoin {
            puzzle_hash,
            amount,
            memos: Vec::new(),
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Self::AggSigUnsafe { .. } => opcodes::AGG_SIG_UNSAFE,
            Self::AggSigMe { .. } => opcodes::AGG_SIG_ME,
            Self::CreateCoin { .. } => opcodes::CREATE_COIN,
            Self::ReserveFee { .. } => opcodes::RESERVE_FEE,
        }
    }

    pub fn to_program(&self) -> Result<Program, ClvmError> {
        super::to_program(self)
    }

    pub fn from_program(program: &Program) -> Result<Option<Self>, ClvmError> {
        let mut allocator = Allocator::new();
        let node = program.to_clvm(&mut allocator)?;
        Ok(Self::from_node(&allocator, node)?)
    }

    /// Parse one condition. `Ok(None)` for opcodes the core does not track,
    /// `Err` when a known opcode has malformed operands.
    pub fn from_node(a: &Allocator, node: NodePtr) -> Result<Option<Self>, FromClvmError> {
        let (op, args) = <(NodePtr, NodePtr)>::from_clvm(a, node)?;
        let opcode = match a.sexp(op) {
            SExp::Atom => match a.atom(op).as_ref() {
                [op] => *op,
                _ => return Ok(None),
            },
            SExp::Pair(..) => return Ok(None),
        };

        let condition = match opcode {
            opcodes::AGG_SIG_UNSAFE | opcodes::AGG_SIG_ME => {
                let (public_key, (message, _)) = <(PublicKey, (Bytes, NodePtr))>::from_clvm(a, args)?;
                let message = message.into_inner();
                if opcode == opcodes::AGG_SIG_ME {
                    Self::AggSigMe { public_key, message }
                } else {
                    Self::AggSigUnsafe { public_key, message }
                }
            }
            opcodes::CREATE_COIN => {
                let (puzzle_hash, (amount, rest)) = <(Bytes32, (u64, NodePtr))>::from_clvm(a, args)?;
                let mut memos = Vec::new();
                if let SExp::Pair(list, _) = a.sexp(rest) {
                    let mut cursor = list;
                    while let SExp::Pair(memo, next) = a.sexp(cursor) {
                        if let SExp::Atom = a.sexp(memo) {
                            memos.push(a.atom(memo).as_ref().to_vec());
                        }
                        cursor = next;
                    }
                }
                Self::CreateCoin {
                    puzzle_hash,
                    amount,
                    memos,
                }
            }
            opcodes::RESERVE_FEE => {
                let (amount, _) = <(u64, NodePtr)>::from_clvm(a, args)?;
                Self::ReserveFee { amount }
            }
            _ => return Ok(None),
        };
        Ok(Some(condition))
    }

    pub fn list_from_program(program: &Program) -> Result<Vec<Self>, ClvmError> {
        let mut allocator = Allocator::new();
        let node = program.to_clvm(&mut allocator)?;
        Ok(Self::list_from_node(&allocator, node)?)
    }

    /// Parse a condition list, skipping untracked opcodes.
    pub fn list_from_node(a: &Allocator, node: NodePtr) -> Result<Vec<Self>, FromClvmError> {
        let items = Vec::<NodePtr>::from_clvm(a, node)?;
        let mut conditions = Vec::with_capacity(items.len());
        for item in items {
            if let Some(condition) = Self::from_node(a, item)? {
                conditions.push(condition);
            }
        }
        Ok(conditions)
    }

    /// The (public key, message) pair this condition requires a signature
    /// for, with coin binding and network domain separation applied.
    pub fn signature_requirement(
        &self,
        coin_id: &Bytes32,
        additional_data: &Bytes32,
    ) -> Option<(PublicKey, Vec<u8>)> {
        match self {
            Self::AggSigUnsafe { public_key, message } => Some((public_key.clone(), message.clone())),
            Self::AggSigMe { public_key, message } => {
                let mut full = Vec::with_capacity(message.len() + 64);
                full.extend_from_slice(message);
                full.extend_from_slice(coin_id.as_ref());
                full.extend_from_slice(additional_data.as_ref());
                Some((public_key.clone(), full))
            }
            _ => None,
        }
    }
}

impl<N, E: ClvmEncoder<Node = N>> ToClvm<E> for Condition {
    fn to_clvm(&self, encoder: &mut E) -> Result<N, ToClvmError> {
        let opcode = self.opcode();
        match self {
            Self::AggSigUnsafe { public_key, message } | Self::AggSigMe { public_key, message } => {
                clvm_list!(opcode, public_key, Bytes::new(message.clone())).to_clvm(encoder)
            }
            Self::CreateCoin {
                puzzle_hash,
                amount,
                memos,
            } if memos.is_empty() => clvm_list!(opcode, puzzle_hash, amount).to_clvm(encoder),
            Self::CreateCoin {
                puzzle_hash,
                amount,
                memos,
            } => {
                let memos: Vec<Bytes> = memos.iter().cloned().map(Bytes::new).collect();
                clvm_list!(opcode, puzzle_hash, amount, memos).to_clvm(encoder)
            }
            Self::ReserveFee { amount } => clvm_list!(opcode, amount).to_clvm(encoder),
        }
    }
}
