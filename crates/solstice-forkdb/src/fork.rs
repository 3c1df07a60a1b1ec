//! §4.6 (C2): the fork database — an unbounded-depth DAG of recently seen
//! blocks keyed by id, linked by `header.previous`. `push_block` is a pure
//! insert; callers (the block pipeline) decide whether the new tip is
//! preferred and drive undo/apply accordingly.

use std::collections::{BTreeMap, BTreeSet};

use solstice_core::block::Block;
use solstice_core::{ChainError, ChainResult, Sha256Id};

struct ForkItem {
    block: Block,
    seen_order: u64,
}

/// Recently-seen blocks, indexed by id, retained long enough to resolve any
/// fork switch the network might still present. Callers prune old entries
/// once a block is far enough behind head to be irreversible.
pub struct ForkDatabase {
    items: BTreeMap<Sha256Id, ForkItem>,
    next_seen_order: u64,
}

impl ForkDatabase {
    pub fn new() -> Self {
        ForkDatabase {
            items: BTreeMap::new(),
            next_seen_order: 0,
        }
    }

    pub fn contains(&self, id: &Sha256Id) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &Sha256Id) -> Option<&Block> {
        self.items.get(id).map(|item| &item.block)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Inserts `block` under `id`. The genesis block (`header.previous ==
    /// Sha256Id::ZERO`) is accepted unconditionally; any other block must
    /// declare a `previous` already known to the fork DB.
    pub fn push_block(&mut self, id: Sha256Id, block: Block) -> ChainResult<()> {
        if block.header.previous != Sha256Id::ZERO && !self.items.contains_key(&block.header.previous) {
            return Err(ChainError::UnlinkedBlock(id.to_string()));
        }
        let seen_order = self.next_seen_order;
        self.next_seen_order += 1;
        self.items.insert(id, ForkItem { block, seen_order });
        Ok(())
    }

    pub fn remove(&mut self, id: &Sha256Id) {
        self.items.remove(id);
    }

    /// The tip of the heaviest branch among everything retained: highest
    /// `block_num`, ties broken by earliest insertion order.
    pub fn best_tip(&self) -> Option<Sha256Id> {
        let parents: BTreeSet<Sha256Id> = self
            .items
            .values()
            .map(|item| item.block.header.previous)
            .collect();
        self.items
            .iter()
            .filter(|(id, _)| !parents.contains(id))
            .max_by_key(|(_, item)| (item.block.header.block_num, std::cmp::Reverse(item.seen_order)))
            .map(|(id, _)| *id)
    }

    /// Walks back from `head` to genesis (or as far as the fork DB still
    /// retains), returning ids oldest-first.
    fn ancestry(&self, head: Sha256Id) -> ChainResult<Vec<Sha256Id>> {
        let mut path = vec![head];
        let mut cur = head;
        loop {
            let block = self.get(&cur).ok_or_else(|| ChainError::UnlinkedBlock(cur.to_string()))?;
            let prev = block.header.previous;
            if prev == Sha256Id::ZERO {
                break;
            }
            path.push(prev);
            cur = prev;
        }
        path.reverse();
        Ok(path)
    }

    /// §4.6 step 2: `fetch_branch_from(new_head, old_head)`. Returns
    /// `(new_branch, old_branch)`, each ordered from (but excluding) the
    /// lowest common ancestor forward to the respective head.
    pub fn fetch_branch_from(
        &self,
        new_head: Sha256Id,
        old_head: Sha256Id,
    ) -> ChainResult<(Vec<Sha256Id>, Vec<Sha256Id>)> {
        let new_ancestry = self.ancestry(new_head)?;
        let old_ancestry = self.ancestry(old_head)?;
        let old_set: BTreeSet<Sha256Id> = old_ancestry.iter().copied().collect();
        let lca_index_in_new = new_ancestry
            .iter()
            .rposition(|id| old_set.contains(id))
            .ok_or_else(|| ChainError::InvariantViolation("no common ancestor between forks".into()))?;
        let lca = new_ancestry[lca_index_in_new];
        let lca_index_in_old = old_ancestry.iter().position(|id| *id == lca).expect("lca present in old ancestry");
        let new_branch = new_ancestry[lca_index_in_new + 1..].to_vec();
        let old_branch = old_ancestry[lca_index_in_old + 1..].to_vec();
        Ok((new_branch, old_branch))
    }

    /// Drops every retained block at or below `num`, keeping the fork DB
    /// bounded to the region a fork switch could plausibly still reach.
    pub fn prune_below(&mut self, num: u32) {
        self.items.retain(|_, item| item.block.header.block_num > num);
    }
}

impl Default for ForkDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solstice_core::block::BlockHeader;
    use solstice_core::{Signature, Timestamp};
    use solstice_core::id::WitnessId;

    fn header(previous: Sha256Id, block_num: u32) -> BlockHeader {
        BlockHeader {
            previous,
            block_num,
            timestamp: block_num as Timestamp,
            witness: WitnessId::from_instance(solstice_core::id::Space::Protocol, solstice_core::id::ObjectType::Witness, 0),
            transaction_merkle_root: Sha256Id::ZERO,
            previous_secret: [0u8; 32],
            next_secret_hash: [0u8; 32],
        }
    }

    fn block(previous: Sha256Id, block_num: u32) -> Block {
        Block {
            header: header(previous, block_num),
            transactions: vec![],
            witness_signature: Signature([0u8; 65]),
        }
    }

    fn id_for(num: u32, salt: u8) -> Sha256Id {
        let mut bytes = [0u8; 32];
        bytes[0..4].copy_from_slice(&num.to_be_bytes());
        bytes[31] = salt;
        Sha256Id(bytes)
    }

    #[test]
    fn best_tip_prefers_higher_block_number() {
        let mut fork_db = ForkDatabase::new();
        let genesis = id_for(0, 0);
        fork_db.push_block(genesis, block(Sha256Id::ZERO, 0)).unwrap();
        let b1 = id_for(1, 0);
        fork_db.push_block(b1, block(genesis, 1)).unwrap();
        let b2 = id_for(2, 0);
        fork_db.push_block(b2, block(b1, 2)).unwrap();
        assert_eq!(fork_db.best_tip(), Some(b2));
    }

    #[test]
    fn fetch_branch_from_finds_lca() {
        let mut fork_db = ForkDatabase::new();
        let genesis = id_for(0, 0);
        fork_db.push_block(genesis, block(Sha256Id::ZERO, 0)).unwrap();
        let a1 = id_for(1, 1);
        fork_db.push_block(a1, block(genesis, 1)).unwrap();
        let a2 = id_for(2, 1);
        fork_db.push_block(a2, block(a1, 2)).unwrap();
        let b1 = id_for(1, 2);
        fork_db.push_block(b1, block(genesis, 1)).unwrap();

        let (new_branch, old_branch) = fork_db.fetch_branch_from(b1, a2).unwrap();
        assert_eq!(new_branch, vec![b1]);
        assert_eq!(old_branch, vec![a1, a2]);
    }

    #[test]
    fn unlinked_block_rejected() {
        let mut fork_db = ForkDatabase::new();
        let dangling_parent = id_for(5, 9);
        let err = fork_db.push_block(id_for(6, 0), block(dangling_parent, 6)).unwrap_err();
        assert!(matches!(err, ChainError::UnlinkedBlock(_)));
    }
}
