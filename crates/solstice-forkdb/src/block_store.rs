//! §4.6 / §6.2 (C3): the append-only block archive, `blockchain/block_num_to_block/*`
//! on disk. Blocks are addressable by number (the common case — replay,
//! `get_block`) and by id (fork-DB bookkeeping), backed by two sled trees
//! over the same bincode-encoded bytes.

use std::path::Path;

use solstice_core::block::Block;
use solstice_core::{ChainError, ChainResult, Sha256Id};

pub struct BlockStore {
    _db: sled::Db,
    by_num: sled::Tree,
    id_to_num: sled::Tree,
}

impl BlockStore {
    pub fn open<P: AsRef<Path>>(path: P) -> ChainResult<Self> {
        let db = sled::open(path).map_err(|e| ChainError::Storage(e.to_string()))?;
        let by_num = db.open_tree("block_num_to_block").map_err(|e| ChainError::Storage(e.to_string()))?;
        let id_to_num = db.open_tree("block_id_to_num").map_err(|e| ChainError::Storage(e.to_string()))?;
        Ok(BlockStore { _db: db, by_num, id_to_num })
    }

    /// Opens an ephemeral in-memory store, for tests and single-shot tools.
    pub fn open_temporary() -> ChainResult<Self> {
        let db = sled::Config::new().temporary(true).open().map_err(|e| ChainError::Storage(e.to_string()))?;
        let by_num = db.open_tree("block_num_to_block").map_err(|e| ChainError::Storage(e.to_string()))?;
        let id_to_num = db.open_tree("block_id_to_num").map_err(|e| ChainError::Storage(e.to_string()))?;
        Ok(BlockStore { _db: db, by_num, id_to_num })
    }

    /// Appends `block` under `(id, block_num)`. Writes the block body before
    /// the id index entry, so a crash mid-append leaves at worst an
    /// unindexed block rather than a dangling index pointing nowhere.
    pub fn append(&self, id: Sha256Id, block: &Block) -> ChainResult<()> {
        let num = block.header.block_num;
        let bytes = bincode::serialize(block).map_err(|e| ChainError::Serialization(e.to_string()))?;
        self.by_num.insert(num.to_be_bytes(), bytes).map_err(|e| ChainError::Storage(e.to_string()))?;
        self.id_to_num.insert(id.0, num.to_be_bytes().to_vec()).map_err(|e| ChainError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_by_num(&self, num: u32) -> ChainResult<Option<Block>> {
        match self.by_num.get(num.to_be_bytes()).map_err(|e| ChainError::Storage(e.to_string()))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(|e| ChainError::Serialization(e.to_string()))?)),
            None => Ok(None),
        }
    }

    pub fn get_by_id(&self, id: Sha256Id) -> ChainResult<Option<Block>> {
        match self.id_to_num.get(id.0).map_err(|e| ChainError::Storage(e.to_string()))? {
            Some(num_bytes) => {
                let num = u32::from_be_bytes(num_bytes.as_ref().try_into().map_err(|_| ChainError::Storage("corrupt block index entry".into()))?);
                self.get_by_num(num)
            }
            None => Ok(None),
        }
    }

    pub fn contains_id(&self, id: Sha256Id) -> bool {
        self.id_to_num.contains_key(id.0).unwrap_or(false)
    }

    pub fn head_num(&self) -> ChainResult<Option<u32>> {
        match self.by_num.last().map_err(|e| ChainError::Storage(e.to_string()))? {
            Some((key, _)) => Ok(Some(u32::from_be_bytes(key.as_ref().try_into().map_err(|_| ChainError::Storage("corrupt block key".into()))?))),
            None => Ok(None),
        }
    }

    /// Removes the block at `num` (and its id-index entry) — `pop_block`'s
    /// counterpart on the number-indexed archive (§4.6).
    pub fn remove(&self, num: u32) -> ChainResult<()> {
        if let Some(block) = self.get_by_num(num)? {
            let id = solstice_crypto::block_id(&block.header.signing_bytes(), num);
            self.id_to_num.remove(id.0).map_err(|e| ChainError::Storage(e.to_string()))?;
        }
        self.by_num.remove(num.to_be_bytes()).map_err(|e| ChainError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn flush(&self) -> ChainResult<()> {
        self._db.flush().map_err(|e| ChainError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solstice_core::block::BlockHeader;
    use solstice_core::id::{ObjectType, Space, WitnessId};
    use solstice_core::Signature;

    fn sample_block(num: u32) -> Block {
        Block {
            header: BlockHeader {
                previous: Sha256Id::ZERO,
                block_num: num,
                timestamp: 0,
                witness: WitnessId::from_instance(Space::Protocol, ObjectType::Witness, 0),
                transaction_merkle_root: Sha256Id::ZERO,
                previous_secret: [0u8; 32],
                next_secret_hash: [0u8; 32],
            },
            transactions: vec![],
            witness_signature: Signature([0u8; 65]),
        }
    }

    #[test]
    fn round_trips_by_num_and_id() {
        let store = BlockStore::open_temporary().unwrap();
        let block = sample_block(1);
        let id = solstice_crypto::block_id(&block.header.signing_bytes(), 1);
        store.append(id, &block).unwrap();
        assert_eq!(store.get_by_num(1).unwrap().unwrap().header.block_num, 1);
        assert_eq!(store.get_by_id(id).unwrap().unwrap().header.block_num, 1);
        assert_eq!(store.head_num().unwrap(), Some(1));
    }

    #[test]
    fn remove_drops_both_indices() {
        let store = BlockStore::open_temporary().unwrap();
        let block = sample_block(1);
        let id = solstice_crypto::block_id(&block.header.signing_bytes(), 1);
        store.append(id, &block).unwrap();
        store.remove(1).unwrap();
        assert!(store.get_by_num(1).unwrap().is_none());
        assert!(!store.contains_id(id));
    }
}
