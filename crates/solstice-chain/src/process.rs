//! §4.2 Transaction Processor (C6): `push_transaction`'s seven numbered
//! steps, run inside the caller's undo session so a rejected transaction
//! never leaves a partial trace.

use std::collections::BTreeSet;

use solstice_core::block::Transaction;
use solstice_core::constants::{BLOCK_SUMMARY_RING, MAX_TIME_UNTIL_EXPIRATION_SECS};
use solstice_core::{operations, ChainError, ChainResult, Sha256Id, Timestamp, VirtualOperation};
use solstice_crypto::hash::tx_id_from_body;
use solstice_crypto::sign::recover_public_key;

use crate::authority;
use crate::database::Database;
use crate::evaluator;

/// The fully resolved outcome of a single transaction: the virtual
/// operations its evaluators emitted, in operation order.
pub struct AppliedTransaction {
    pub trx_id: Sha256Id,
    pub virtual_operations: Vec<Vec<VirtualOperation>>,
}

/// §4.2 steps 1-7. Does not open its own undo session — the block pipeline
/// (or a test) is expected to wrap each call (or a batch of calls) in one,
/// so a bad transaction in a block can be rolled back without unwinding the
/// rest of the block.
pub fn apply_transaction(db: &mut Database, trx: &Transaction, now: Timestamp) -> ChainResult<AppliedTransaction> {
    // Step 1: structural validation (non-empty, no duplicate sigs, no negative fees).
    trx.validate()?;

    // Step 2: TaPoS. ref_block_num selects a BlockSummary by
    // `instance = ref_block_num mod 2^16`; its stored block id's low 4 bytes
    // (the block number) must round-trip and its next 8 bytes must match
    // the declared prefix.
    let summary_instance = trx.ref_block_num as u64 % BLOCK_SUMMARY_RING as u64;
    let summary = db
        .block_summaries
        .find(summary_instance)
        .ok_or(ChainError::TaposSummaryMissing(trx.ref_block_num as u32))?;
    if summary.block_id.block_num() & 0xFFFF != trx.ref_block_num as u32 & 0xFFFF {
        return Err(ChainError::TaposSummaryMissing(trx.ref_block_num as u32));
    }
    if summary.block_id.prefix_limb() as u32 != trx.ref_block_prefix {
        return Err(ChainError::TaposPrefixMismatch);
    }

    // Step 3: expiration window. `relative_expiration` is a block-interval
    // multiplier added to the referenced summary's timestamp (§9's legacy
    // absolute-expiration path is not accepted on this chain — see DESIGN.md).
    let chain_params = &db.global_properties().parameters;
    let expiration = summary.timestamp + trx.relative_expiration as i64 * chain_params.block_interval_secs as i64;
    if expiration <= now || expiration > now + MAX_TIME_UNTIL_EXPIRATION_SECS {
        return Err(ChainError::InvalidExpiration {
            expiration,
            head_time: now,
            max_time: now + MAX_TIME_UNTIL_EXPIRATION_SECS,
        });
    }

    // Step 4: duplicate rejection.
    let body = trx.signing_bytes();
    let trx_id = tx_id_from_body(&body);
    if db.has_transaction(trx_id) {
        return Err(ChainError::DuplicateTransaction(hex::encode(trx_id.0)));
    }

    // Step 5: recover a public key per signature over the transaction digest.
    let digest = solstice_crypto::hash::sha256(&body);
    let mut available_keys = BTreeSet::new();
    for sig in &trx.signatures {
        let key = recover_public_key(sig, &digest).map_err(|e| ChainError::InvalidOperation(e.to_string()))?;
        available_keys.insert(key);
    }
    let available_addresses = BTreeSet::new();

    // Step 6: every operation's required owner/active authorities must be
    // satisfiable from the recovered keys (expanded through nested account
    // authorities up to MAX_AUTHORITY_DEPTH). Every recovered key must be
    // used by at least one operation, or the transaction is rejected as
    // carrying unused signatures.
    let mut used_keys = BTreeSet::new();
    for op in &trx.operations {
        for account_id in operations::required_owner_authorities(op) {
            let account = db.accounts.find(account_id.raw.instance).ok_or(ChainError::ObjectNotFound(account_id.raw))?;
            if !authority::is_satisfied(db, &account.owner, &available_keys, &available_addresses)? {
                return Err(ChainError::UnsatisfiableAuthority {
                    threshold: account.owner.weight_threshold,
                    available: authority::authority_weight(db, &account.owner, &available_keys, &available_addresses, 0)?,
                });
            }
            mark_used_keys(&account.owner, &available_keys, &mut used_keys);
        }
        for account_id in operations::required_active_authorities(op) {
            let account = db.accounts.find(account_id.raw.instance).ok_or(ChainError::ObjectNotFound(account_id.raw))?;
            if !authority::is_satisfied(db, &account.active, &available_keys, &available_addresses)? {
                return Err(ChainError::UnsatisfiableAuthority {
                    threshold: account.active.weight_threshold,
                    available: authority::authority_weight(db, &account.active, &available_keys, &available_addresses, 0)?,
                });
            }
            mark_used_keys(&account.active, &available_keys, &mut used_keys);
        }
    }
    if used_keys.len() != available_keys.len() {
        return Err(ChainError::UnusedSignature);
    }

    // Step 7: evaluate every operation in order, collecting virtual
    // operations, then record the transaction against duplicate/TaPoS
    // pruning.
    let mut virtual_operations = Vec::with_capacity(trx.operations.len());
    for op in &trx.operations {
        virtual_operations.push(evaluator::apply_operation(db, op, now)?);
    }
    db.record_transaction(trx_id, expiration);

    Ok(AppliedTransaction { trx_id, virtual_operations })
}

fn mark_used_keys(
    authority: &solstice_core::Authority,
    available_keys: &BTreeSet<solstice_core::PublicKeyType>,
    used: &mut BTreeSet<solstice_core::PublicKeyType>,
) {
    for (key, _) in &authority.key_auths {
        if available_keys.contains(key) {
            used.insert(*key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tapos_rejects_unknown_reference_block() {
        let mut db = Database::new();
        let trx = Transaction {
            ref_block_num: 42,
            ref_block_prefix: 0,
            relative_expiration: 1,
            operations: vec![],
            signatures: vec![],
        };
        let err = apply_transaction(&mut db, &trx, 100).unwrap_err();
        assert!(matches!(err, ChainError::EmptyTransaction));
    }

    /// Boundary scenario: with a known `ref_block_num`, a `ref_block_prefix` that
    /// doesn't match the referenced `BlockSummary`'s stored id is rejected at
    /// TaPoS (step 2) — before signature recovery, authority checks or
    /// evaluation ever run.
    #[test]
    fn tapos_rejects_mismatched_prefix_before_evaluating_operations() {
        let mut db = Database::new();
        let ref_block_num: u16 = 12345;
        for _ in 0..=ref_block_num as u64 {
            db.block_summaries.create(|_| solstice_core::impl_entities::BlockSummary {
                block_id: Sha256Id::ZERO,
                timestamp: 0,
            });
        }
        let mut block_id_bytes = [0u8; 32];
        block_id_bytes[0..4].copy_from_slice(&(ref_block_num as u32).to_be_bytes());
        let correct_prefix: u64 = 0xAABBCCDD_11223344;
        block_id_bytes[4..12].copy_from_slice(&correct_prefix.to_le_bytes());
        db.block_summaries
            .modify(ref_block_num as u64, |s| {
                s.block_id = Sha256Id(block_id_bytes);
                s.timestamp = 99_950;
            })
            .unwrap();

        let trx = Transaction {
            ref_block_num,
            ref_block_prefix: (correct_prefix as u32).wrapping_add(1),
            relative_expiration: 1,
            operations: vec![operations::Operation::Transfer(operations::TransferOp {
                fee: solstice_core::AssetAmount::new(solstice_core::CORE_ASSET, 0),
                from: solstice_core::Id::from_instance(solstice_core::id::Space::Protocol, solstice_core::id::ObjectType::Account, 1),
                to: solstice_core::Id::from_instance(solstice_core::id::Space::Protocol, solstice_core::id::ObjectType::Account, 2),
                amount: solstice_core::AssetAmount::new(solstice_core::CORE_ASSET, 1),
                memo: None,
            })],
            signatures: vec![],
        };

        let err = apply_transaction(&mut db, &trx, 100_000).unwrap_err();
        assert!(matches!(err, ChainError::TaposPrefixMismatch));
        // Rejected before step 4 ever recorded the transaction.
        assert!(!db.has_transaction(tx_id_from_body(&trx.signing_bytes())));
    }
}
