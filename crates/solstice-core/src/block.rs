//! §4.2 transaction envelope and §4.5/§4.6 block header — the wire shapes
//! the transaction processor (C6) and block pipeline (C11) operate on.
//! Hashing (trx id, block id, Merkle root) lives in `solstice-crypto`, which
//! depends on this crate rather than the other way around.

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};
use crate::id::WitnessId;
use crate::operations::Operation;
use crate::types::{Sha256Id, Signature, Timestamp};

/// A submitted transaction. `ref_block_num`/`ref_block_prefix` are the TaPoS
/// reference (§4.2 step 2); `relative_expiration` is a multiplier of
/// `block_interval` added to the referenced summary's timestamp — except
/// the legacy zero-value path noted in §9, which the processor handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub relative_expiration: u32,
    pub operations: Vec<Operation>,
    pub signatures: Vec<Signature>,
}

impl Transaction {
    /// The bytes signatures are taken over: everything except the
    /// signatures themselves.
    pub fn signing_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(
            self.ref_block_num,
            self.ref_block_prefix,
            self.relative_expiration,
            &self.operations,
        ))
        .expect("transaction body is always serializable")
    }

    /// Structural validation (§4.2 step 1 / §7 "Structural"): never
    /// inspects chain state, never mutates anything.
    pub fn validate(&self) -> ChainResult<()> {
        if self.operations.is_empty() {
            return Err(ChainError::EmptyTransaction);
        }
        for (i, sig) in self.signatures.iter().enumerate() {
            if self.signatures[..i].iter().any(|s| s.0 == sig.0) {
                return Err(ChainError::DuplicateSignature);
            }
        }
        for op in &self.operations {
            if op.fee().amount < 0 {
                return Err(ChainError::NegativeFee);
            }
        }
        Ok(())
    }
}

/// Everything about a block except its transaction bodies — what a witness
/// signs (§4.5.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub previous: Sha256Id,
    pub block_num: u32,
    pub timestamp: Timestamp,
    pub witness: WitnessId,
    pub transaction_merkle_root: Sha256Id,
    /// VRF-like reveal chain (§4.5.2 step 3): `H(signing_key || last_secret)`.
    pub previous_secret: [u8; 32],
    pub next_secret_hash: [u8; 32],
}

impl BlockHeader {
    pub fn signing_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("block header is always serializable")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub witness_signature: Signature,
}
