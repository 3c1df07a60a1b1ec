//! §4.6 (C11): the block pipeline. Owns the undo-tracked [`Database`], the
//! [`ForkDatabase`] DAG of recently seen blocks, and the append-only
//! [`BlockStore`] archive, and drives them together through
//! `push_block`/`pop_block`/`generate_block`.

use solstice_core::block::{Block, BlockHeader, Transaction};
use solstice_core::id::WitnessId;
use solstice_core::impl_entities::BlockSummary;
use solstice_core::{ChainError, ChainResult, Id, ObjectId, Sha256Id, Timestamp, VirtualOperation};
use solstice_crypto::hash::{merkle_root, sha256, tx_id_from_body};
use solstice_crypto::keypair::KeyPair;
use solstice_crypto::sign;
use solstice_db::UndoableDatabase;
use solstice_forkdb::{BlockStore, ForkDatabase};
use solstice_p2p::{ChainSyncContract, ItemType, Message, Synopsis};
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::feed;
use crate::maintenance;
use crate::market;
use crate::notify::{AppliedBlock, ChangedObjects, NotifyHub};
use crate::process;

/// One applied transaction's virtual operations, grouped by operation
/// (`op_in_trx`) then emission order within that operation (`vop_seq`).
/// Together with this block's number and this transaction's position in
/// [`AppliedBlockResult::transactions`] (`trx_in_block`), that reconstructs
/// the `(block_num, trx_in_block, op_in_trx, vop_seq)` coordinate §5 assigns
/// every virtual operation — no separate counter needs to be threaded
/// through the evaluator layer for it.
pub struct AppliedBlockResult {
    pub block_id: Sha256Id,
    pub transactions: Vec<Vec<Vec<VirtualOperation>>>,
    /// Virtual operations produced by block-tail housekeeping (feed expiry,
    /// forced settlement, collateral bids, maintenance worker pay), not
    /// attributable to any single transaction.
    pub tail_virtual_operations: Vec<VirtualOperation>,
}

pub struct Chain {
    pub db: Database,
    fork_db: ForkDatabase,
    block_store: BlockStore,
    chain_id: Sha256Id,
    /// Block ids with a still-open undo segment, oldest first — mirrors the
    /// `Database`'s per-table segment stack one for one, so `pop_block` can
    /// roll back exactly the topmost applied block. Unbounded: this
    /// implementation never commits a block's segment into "permanent"
    /// state, trading memory for the ability to always pop back to genesis.
    /// A production deployment would periodically merge segments older than
    /// the fork-reversibility window.
    undo_stack: Vec<Sha256Id>,
    notify: NotifyHub,
}

impl Chain {
    pub fn new(db: Database, block_store: BlockStore, chain_id: Sha256Id) -> Self {
        Chain {
            db,
            fork_db: ForkDatabase::new(),
            block_store,
            chain_id,
            undo_stack: Vec::new(),
            notify: NotifyHub::new(),
        }
    }

    pub fn notify(&self) -> &NotifyHub {
        &self.notify
    }

    pub fn chain_id(&self) -> Sha256Id {
        self.chain_id
    }

    pub fn head_block_id(&self) -> Sha256Id {
        self.db.dynamic_global_properties().head_block_id
    }

    pub fn head_block_number(&self) -> u32 {
        self.db.dynamic_global_properties().head_block_number
    }

    /// Fetches an archived block by height — backs `get_block`/
    /// `get_block_header`/`get_transaction` (§6.3).
    pub fn get_block_by_num(&self, num: u32) -> ChainResult<Option<Block>> {
        self.block_store.get_by_num(num)
    }

    /// §4.6: inserts `block` into the fork DB, then applies it if it
    /// extends (or overtakes, via a fork switch) the current head. Returns
    /// whether the preferred branch changed as a result.
    pub fn push_block(&mut self, block: Block) -> ChainResult<bool> {
        let id = solstice_crypto::block_id(&block.header.signing_bytes(), block.header.block_num);
        if self.fork_db.contains(&id) {
            return Ok(false);
        }
        self.fork_db.push_block(id, block.clone())?;
        self.block_store.append(id, &block)?;

        let head = self.head_block_id();
        if block.header.previous == head {
            let result = self.apply_one(id, &block)?;
            self.publish(&result);
            return Ok(false);
        }

        if block.header.block_num <= self.head_block_number() {
            return Err(ChainError::BlockNotPreferred(id.to_string()));
        }

        let (new_branch, old_branch) = self.fork_db.fetch_branch_from(id, head)?;
        for _ in &old_branch {
            self.pop_block()?;
        }

        let mut applied = 0usize;
        for branch_id in &new_branch {
            let block = self
                .fork_db
                .get(branch_id)
                .cloned()
                .ok_or_else(|| ChainError::InvariantViolation(format!("fork db missing queued block {branch_id}")))?;
            match self.apply_one(*branch_id, &block) {
                Ok(result) => {
                    applied += 1;
                    self.publish(&result);
                }
                Err(e) => {
                    warn!(block_id = %branch_id, error = %e, "rejected branch mid-switch, restoring previous head");
                    for _ in 0..applied {
                        self.pop_block()?;
                    }
                    for old_id in &old_branch {
                        let old_block = self
                            .block_store
                            .get_by_id(*old_id)?
                            .ok_or_else(|| ChainError::InvariantViolation("lost old branch block during fork recovery".into()))?;
                        self.apply_one(*old_id, &old_block)?;
                    }
                    return Err(e);
                }
            }
        }
        Ok(true)
    }

    /// Discards the current head: rolls its undo segment back, drops it
    /// from the number-indexed archive, and notifies the fork DB (which
    /// keeps the block itself — it may still be some other branch's
    /// ancestor).
    pub fn pop_block(&mut self) -> ChainResult<Sha256Id> {
        let id = self.undo_stack.pop().ok_or(ChainError::UndoStackEmpty)?;
        let num = self.head_block_number();
        self.db.rollback_session();
        self.block_store.remove(num)?;
        self.notify.publish_applied_block(AppliedBlock { block_id: id, block_num: num, reverted: true });
        debug!(block_num = num, block_id = %id, "popped block");
        Ok(id)
    }

    /// Runs `block`'s transactions and tail housekeeping inside one undo
    /// session left open on `undo_stack` on success, rolled all the way
    /// back on any failure (structural, a rejected transaction, or an
    /// invariant violation).
    fn apply_one(&mut self, id: Sha256Id, block: &Block) -> ChainResult<AppliedBlockResult> {
        self.db.push_session();
        match self.apply_body(id, block) {
            Ok(result) => {
                self.undo_stack.push(id);
                Ok(result)
            }
            Err(e) => {
                self.db.rollback_session();
                Err(e)
            }
        }
    }

    fn apply_body(&mut self, id: Sha256Id, block: &Block) -> ChainResult<AppliedBlockResult> {
        let serialized_len = bincode::serialize(block).map(|b| b.len()).unwrap_or(usize::MAX);
        if serialized_len > solstice_core::constants::MAX_BLOCK_SIZE_BYTES {
            return Err(ChainError::BlockTooLarge);
        }

        let tx_ids: Vec<Sha256Id> = block.transactions.iter().map(|t| tx_id_from_body(&t.signing_bytes())).collect();
        if merkle_root(&tx_ids) != block.header.transaction_merkle_root {
            return Err(ChainError::InvariantViolation("transaction merkle root mismatch".into()));
        }

        self.verify_witness_signature(block)?;

        let now = block.header.timestamp;
        let mut transactions = Vec::with_capacity(block.transactions.len());
        for trx in &block.transactions {
            let applied = process::apply_transaction(&mut self.db, trx, now)?;
            transactions.push(applied.virtual_operations);
        }

        self.record_block_summary(id, block)?;
        self.advance_dynamic_properties(id, block)?;

        let mut tail_virtual_operations = Vec::new();
        tail_virtual_operations.extend(feed::expire_stale_feeds(&mut self.db, now)?);
        let bitasset_markets: Vec<_> = self
            .db
            .assets
            .iter()
            .filter(|(_, a)| a.is_market_issued())
            .map(|(_, a)| a.id)
            .collect();
        for asset in bitasset_markets {
            tail_virtual_operations.extend(market::process_force_settlements(&mut self.db, asset)?);
            tail_virtual_operations.extend(market::process_collateral_bids(&mut self.db, asset)?);
        }
        tail_virtual_operations.extend(maintenance::maybe_run_maintenance(&mut self.db, now)?);

        Ok(AppliedBlockResult { block_id: id, transactions, tail_virtual_operations })
    }

    fn verify_witness_signature(&self, block: &Block) -> ChainResult<()> {
        let Some(witness) = self.db.witnesses.find(block.header.witness.raw.instance) else {
            return Err(ChainError::ObjectNotFound(block.header.witness.raw));
        };
        let digest = sha256(&block.header.signing_bytes());
        if !sign::verify(&block.witness_signature, &digest, &witness.signing_key) {
            return Err(ChainError::MissingSignature(block.header.witness.raw));
        }
        Ok(())
    }

    fn record_block_summary(&mut self, id: Sha256Id, block: &Block) -> ChainResult<()> {
        let instance = block.header.block_num as u64 % solstice_core::constants::BLOCK_SUMMARY_RING as u64;
        if self.db.block_summaries.find(instance).is_some() {
            self.db
                .block_summaries
                .modify(instance, |s| {
                    s.block_id = id;
                    s.timestamp = block.header.timestamp;
                })
                .map_err(|e| ChainError::Storage(e.to_string()))?;
        } else {
            // Ring slots are filled in instance order during the chain's
            // first lap, so the next free instance is always this one.
            self.db.block_summaries.create(|_| BlockSummary { block_id: id, timestamp: block.header.timestamp });
        }
        Ok(())
    }

    fn advance_dynamic_properties(&mut self, id: Sha256Id, block: &Block) -> ChainResult<()> {
        let slot = maintenance::slot_at_time(&self.db, block.header.timestamp).max(1);
        self.db
            .dynamic_global_properties
            .modify(0, |dgp| {
                dgp.head_block_number = block.header.block_num;
                dgp.head_block_id = id;
                dgp.time = block.header.timestamp;
                dgp.current_witness = block.header.witness;
                dgp.current_aslot += slot;
                dgp.recent_slots_filled = (dgp.recent_slots_filled << slot.min(127) as u32) | 1;
            })
            .map_err(|e| ChainError::Storage(e.to_string()))?;
        Ok(())
    }

    fn publish(&mut self, result: &AppliedBlockResult) {
        self.notify.publish_applied_block(AppliedBlock {
            block_id: result.block_id,
            block_num: self.head_block_number(),
            reverted: false,
        });
        let ids = self.changed_object_ids(result);
        if !ids.is_empty() {
            self.notify.publish_changed_objects(ChangedObjects { block_num: self.head_block_number(), ids });
        }
    }

    /// A coarse approximation of "what changed": every account that sent a
    /// transaction this block plus the assets any settlement/fill virtual
    /// operation touched. Good enough for an RPC subscriber deciding
    /// whether to re-fetch; not a full object-dirty set.
    fn changed_object_ids(&self, result: &AppliedBlockResult) -> Vec<ObjectId> {
        let mut ids = Vec::new();
        for vops in result.tail_virtual_operations.iter() {
            if let VirtualOperation::FillOrder { account_id, .. } = vops {
                ids.push(account_id.raw);
            }
        }
        ids
    }

    /// §4.5.2 `generate_block`: asserts the caller is this slot's scheduled
    /// witness, builds the VRF-like secret reveal chain, computes the
    /// Merkle root over `pending` and signs the header. Does not retry on
    /// oversize — callers are expected to keep `pending` within
    /// `MAX_BLOCK_SIZE_BYTES` themselves (§9 Open Question: the source's
    /// drop-and-requeue retry loop is not reproduced here).
    pub fn generate_block(
        &self,
        when: Timestamp,
        witness_id: WitnessId,
        signing_key: &KeyPair,
        pending: Vec<Transaction>,
    ) -> ChainResult<Block> {
        let slot = maintenance::slot_at_time(&self.db, when);
        let scheduled = maintenance::scheduled_witness(&self.db, slot)?;
        if scheduled != witness_id {
            return Err(ChainError::InvariantViolation(format!(
                "witness {witness_id} is not scheduled for slot {slot} (scheduled: {scheduled})"
            )));
        }
        let witness = self
            .db
            .witnesses
            .find(witness_id.raw.instance)
            .ok_or(ChainError::ObjectNotFound(witness_id.raw))?;
        if signing_key.public_key != witness.signing_key {
            return Err(ChainError::InvariantViolation("signing key does not match witness record".into()));
        }

        // VRF-like reveal chain without the raw secret leaving `KeyPair`:
        // sign the witness's last revealed secret and hash the (deterministic,
        // ECDSA) signature instead, so only `sign()`'s public surface is used.
        let reveal = signing_key.sign(&sha256(&witness.last_secret_hash));
        let previous_secret = sha256(&reveal.0);
        let next_secret_hash = sha256(&sha256(&previous_secret));

        let tx_ids: Vec<Sha256Id> = pending.iter().map(|t| tx_id_from_body(&t.signing_bytes())).collect();
        let header = BlockHeader {
            previous: self.head_block_id(),
            block_num: self.head_block_number() + 1,
            timestamp: when,
            witness: witness_id,
            transaction_merkle_root: merkle_root(&tx_ids),
            previous_secret,
            next_secret_hash,
        };
        let digest = sha256(&header.signing_bytes());
        let witness_signature = signing_key.sign(&digest);

        info!(block_num = header.block_num, witness = %witness_id, "generated block");
        Ok(Block { header, transactions: pending, witness_signature })
    }
}

impl ChainSyncContract for Chain {
    fn has_item(&self, id: Sha256Id) -> bool {
        self.fork_db.contains(&id) || self.block_store.contains_id(id)
    }

    fn get_item(&self, id: Sha256Id) -> Option<Message> {
        self.fork_db
            .get(&id)
            .cloned()
            .or_else(|| self.block_store.get_by_id(id).ok().flatten())
            .map(Message::Block)
    }

    fn handle_block(&mut self, msg: Message, _sync_mode: bool) -> ChainResult<bool> {
        let Message::Block(block) = msg else {
            return Err(ChainError::InvalidOperation("expected a block message".into()));
        };
        self.push_block(block)
    }

    fn handle_transaction(&mut self, _msg: Message) -> ChainResult<()> {
        // Pending-transaction pooling belongs to the networking layer; the
        // chain core only validates transactions as part of a block.
        Ok(())
    }

    fn get_item_ids(&self, item_type: ItemType, synopsis: &[Sha256Id], limit: usize) -> (Vec<Sha256Id>, usize) {
        if item_type != ItemType::Block {
            return (Vec::new(), 0);
        }
        let known: std::collections::BTreeSet<Sha256Id> = synopsis.iter().copied().collect();
        let head_num = self.head_block_number();
        let mut missing = Vec::new();
        let mut skipped = 0usize;
        for num in 1..=head_num {
            let Ok(Some(block)) = self.block_store.get_by_num(num) else { continue };
            let id = solstice_crypto::block_id(&block.header.signing_bytes(), num);
            if known.contains(&id) {
                continue;
            }
            if missing.len() < limit {
                missing.push(id);
            } else {
                skipped += 1;
            }
        }
        (missing, skipped)
    }

    fn get_blockchain_synopsis(&self, reference_point: Sha256Id, count: usize) -> Synopsis {
        let start = if reference_point == Sha256Id::ZERO { self.head_block_id() } else { reference_point };
        let Some(start_num) = self.get_block_number(start) else {
            return Vec::new();
        };
        let mut synopsis = Vec::new();
        let mut step = 1u32;
        let mut cursor = start_num;
        while synopsis.len() < count && cursor >= 1 {
            if let Ok(Some(block)) = self.block_store.get_by_num(cursor) {
                synopsis.push(solstice_crypto::block_id(&block.header.signing_bytes(), cursor));
            }
            if cursor <= step {
                break;
            }
            cursor -= step;
            step *= 2;
        }
        synopsis
    }

    fn get_block_number(&self, id: Sha256Id) -> Option<u32> {
        if let Some(block) = self.fork_db.get(&id) {
            return Some(block.header.block_num);
        }
        self.block_store.get_by_id(id).ok().flatten().map(|b| b.header.block_num)
    }

    fn get_block_time(&self, id: Sha256Id) -> Option<Timestamp> {
        if let Some(block) = self.fork_db.get(&id) {
            return Some(block.header.timestamp);
        }
        self.block_store.get_by_id(id).ok().flatten().map(|b| b.header.timestamp)
    }

    fn get_head_block_id(&self) -> Sha256Id {
        self.head_block_id()
    }

    fn get_chain_id(&self) -> Sha256Id {
        self.chain_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solstice_core::id::{ObjectType, Space};
    use solstice_core::Signature;

    fn genesis_chain() -> Chain {
        let mut db = Database::new();
        db.global_properties.create(|_| solstice_core::impl_entities::GlobalProperties {
            parameters: solstice_core::impl_entities::ChainParameters {
                block_interval_secs: 3,
                maintenance_interval_secs: 3600,
                max_transaction_size: 8192,
                max_block_size: 2_000_000,
                max_time_until_expiration: 86400,
                maximum_authority_membership: 10,
                witness_pay_per_block: 0,
                worker_budget_per_day: 0,
                max_predicate_opcode: 0,
            },
            pending_parameters: None,
            active_witnesses: vec![],
            active_committee_members: vec![],
        });
        db.dynamic_global_properties.create(|_| solstice_core::impl_entities::DynamicGlobalProperties {
            head_block_number: 0,
            head_block_id: Sha256Id::ZERO,
            time: 0,
            current_witness: Id::from_instance(Space::Protocol, ObjectType::Witness, 0),
            next_maintenance_time: 3600,
            last_budget_time: 0,
            witness_budget: 0,
            accounts_registered_this_interval: 0,
            recently_missed_count: 0,
            current_aslot: 0,
            recent_slots_filled: u128::MAX,
            current_supply: 0,
        });
        db.fee_schedule.create(|_| solstice_core::fee::FeeSchedule::default_schedule());
        Chain::new(db, solstice_forkdb::BlockStore::open_temporary().unwrap(), Sha256Id::ZERO)
    }

    fn unsigned_block(previous: Sha256Id, num: u32, witness: WitnessId, timestamp: Timestamp) -> Block {
        let header = BlockHeader {
            previous,
            block_num: num,
            timestamp,
            witness,
            transaction_merkle_root: merkle_root(&[]),
            previous_secret: [0u8; 32],
            next_secret_hash: [0u8; 32],
        };
        Block { header, transactions: vec![], witness_signature: Signature([0u8; 65]) }
    }

    #[test]
    fn pushing_an_unsigned_block_is_rejected_without_a_witness_record() {
        let mut chain = genesis_chain();
        let witness: WitnessId = Id::from_instance(Space::Protocol, ObjectType::Witness, 0);
        let block = unsigned_block(Sha256Id::ZERO, 1, witness, 3);
        let err = chain.push_block(block).unwrap_err();
        assert!(matches!(err, ChainError::ObjectNotFound(_)));
    }

    #[test]
    fn lower_block_number_is_not_preferred() {
        let mut chain = genesis_chain();
        let witness: WitnessId = Id::from_instance(Space::Protocol, ObjectType::Witness, 0);
        chain
            .db
            .dynamic_global_properties
            .modify(0, |dgp| {
                dgp.head_block_number = 5;
                dgp.head_block_id = Sha256Id::ZERO;
            })
            .unwrap();
        let block = unsigned_block(Sha256Id([1u8; 32]), 2, witness, 3);
        let err = chain.push_block(block).unwrap_err();
        assert!(matches!(err, ChainError::BlockNotPreferred(_)));
    }

    #[test]
    fn fork_contract_reports_no_items_before_genesis() {
        let chain = genesis_chain();
        assert!(!chain.has_item(Sha256Id([9u8; 32])));
        assert_eq!(chain.get_chain_id(), Sha256Id::ZERO);
    }

    fn signed_block(kp: &KeyPair, witness: WitnessId, previous: Sha256Id, num: u32, timestamp: Timestamp) -> Block {
        let header = BlockHeader {
            previous,
            block_num: num,
            timestamp,
            witness,
            transaction_merkle_root: merkle_root(&[]),
            previous_secret: [0u8; 32],
            next_secret_hash: [0u8; 32],
        };
        let digest = sha256(&header.signing_bytes());
        let witness_signature = kp.sign(&digest);
        Block { header, transactions: vec![], witness_signature }
    }

    /// Boundary scenario: a same-height competitor arriving after the original
    /// tip is stored but not switched to (equal height is never preferred);
    /// once a block extending *that* competitor's tip outgrows the current
    /// head, `push_block` pops the old tip and replays the winning branch,
    /// reporting the switch. A late block extending the losing tip at the
    /// now-equal-or-lower height is rejected outright.
    #[test]
    fn higher_block_extending_a_stored_competitor_triggers_a_fork_switch() {
        let mut chain = genesis_chain();
        let kp = KeyPair::generate();
        let witness: WitnessId = Id::from_instance(Space::Protocol, ObjectType::Witness, 0);
        chain.db.witnesses.create(|i| solstice_core::Witness {
            id: Id::from_instance(Space::Protocol, ObjectType::Witness, i),
            witness_account: Id::from_instance(Space::Protocol, ObjectType::Account, 0),
            vote_id: solstice_core::VoteId::new(solstice_core::VoteType::Witness, 0),
            total_votes: 0,
            signing_key: kp.public_key,
            last_secret_hash: [0u8; 32],
            total_missed: 0,
        });

        let b499 = signed_block(&kp, witness, Sha256Id::ZERO, 499, 3 * 499);
        let b499_id = solstice_crypto::block_id(&b499.header.signing_bytes(), 499);
        assert!(!chain.push_block(b499).unwrap());

        let b500 = signed_block(&kp, witness, b499_id, 500, 3 * 500);
        let b500_id = solstice_crypto::block_id(&b500.header.signing_bytes(), 500);
        assert!(!chain.push_block(b500).unwrap());
        assert_eq!(chain.head_block_number(), 500);

        // A same-height competitor off the same parent: stored in the fork
        // DB and archive, but not switched to — equal height never wins.
        let b500_prime = signed_block(&kp, witness, b499_id, 500, 3 * 500 + 1);
        let b500_prime_id = solstice_crypto::block_id(&b500_prime.header.signing_bytes(), 500);
        let err = chain.push_block(b500_prime).unwrap_err();
        assert!(matches!(err, ChainError::BlockNotPreferred(_)));
        assert_eq!(chain.head_block_number(), 500);

        // Extending the stored-but-unapplied competitor past the current
        // head forces exactly one pop, then replays the winning branch.
        let b501_prime = signed_block(&kp, witness, b500_prime_id, 501, 3 * 501 + 1);
        let b501_prime_id = solstice_crypto::block_id(&b501_prime.header.signing_bytes(), 501);
        let switched = chain.push_block(b501_prime).unwrap();
        assert!(switched);
        assert_eq!(chain.head_block_number(), 501);
        assert_eq!(chain.head_block_id(), b501_prime_id);

        // A late block extending the now-reverted original B500 arrives —
        // rejected as not preferred at its (now equal-or-lower) height.
        let late_b501 = signed_block(&kp, witness, b500_id, 501, 3 * 501 + 2);
        let err = chain.push_block(late_b501).unwrap_err();
        assert!(matches!(err, ChainError::BlockNotPreferred(_)));
    }
}
