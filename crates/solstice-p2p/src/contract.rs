//! §6.1: the contract a networking layer drives the chain core through.
//! Nothing in this crate dials a peer or gossips anything — that transport
//! is explicitly out of scope here; `solstice-chain::Chain` implements this
//! trait directly against its own state.

use solstice_core::{ChainResult, Sha256Id, Timestamp};

use crate::message::{ItemType, Message, Synopsis};

pub trait ChainSyncContract {
    fn has_item(&self, id: Sha256Id) -> bool;
    fn get_item(&self, id: Sha256Id) -> Option<Message>;

    /// Applies an incoming block; `sync_mode` suppresses the fork-switch
    /// eagerness a live node would want while catching up from a snapshot.
    /// Returns whether applying this block switched the preferred branch.
    fn handle_block(&mut self, msg: Message, sync_mode: bool) -> ChainResult<bool>;
    fn handle_transaction(&mut self, msg: Message) -> ChainResult<()>;

    /// Up to `limit` ids of `item_type` the caller doesn't already have,
    /// given the ids in `synopsis` it claims to already hold, plus a count
    /// of how many more remain beyond `limit`.
    fn get_item_ids(&self, item_type: ItemType, synopsis: &[Sha256Id], limit: usize) -> (Vec<Sha256Id>, usize);

    /// `head, head-1, head-2, head-4, head-8, ...` back from
    /// `reference_point`, at most `count` entries — exponentially-spaced
    /// ancestors a peer can binary-search against for the common point.
    fn get_blockchain_synopsis(&self, reference_point: Sha256Id, count: usize) -> Synopsis;

    fn get_block_number(&self, id: Sha256Id) -> Option<u32>;
    fn get_block_time(&self, id: Sha256Id) -> Option<Timestamp>;
    fn get_head_block_id(&self) -> Sha256Id;
    fn get_chain_id(&self) -> Sha256Id;
}
