//! §6.1 wire message shapes. No transport is implemented here — gossip,
//! dialing, and peer discovery belong to a networking layer outside this
//! crate's scope; this crate only fixes what a block/transaction message
//! looks like and what a synchronizing peer may ask for.

use serde::{Deserialize, Serialize};

use solstice_core::block::{Block, Transaction};
use solstice_core::Sha256Id;

/// An item a peer may request by id via `get_item_ids` and exchange via
/// `get_item`/`handle_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    Block,
    Transaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    Block(Block),
    Transaction(Transaction),
}

impl Message {
    pub fn item_type(&self) -> ItemType {
        match self {
            Message::Block(_) => ItemType::Block,
            Message::Transaction(_) => ItemType::Transaction,
        }
    }
}

/// Ancestor ids at exponentially receding depth (`head, head-1, head-2,
/// head-4, head-8, ...`), as returned by `get_blockchain_synopsis` for
/// gap-synchronization.
pub type Synopsis = Vec<Sha256Id>;
