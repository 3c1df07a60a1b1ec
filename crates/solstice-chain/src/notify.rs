//! §5 change notification: the write-holding section never yields, so
//! `applied_block`/`changed_objects` are published on a broadcast channel
//! only after `Chain::push_block` has already released its borrow, the way
//! a caller holding `Arc<RwLock<Chain>>` for writing would want.

use solstice_core::{ObjectId, Sha256Id};
use tokio::sync::broadcast;

/// One applied (or popped, with `reverted = true`) block's headline facts —
/// enough for an RPC subscriber to decide whether to re-fetch.
#[derive(Debug, Clone)]
pub struct AppliedBlock {
    pub block_id: Sha256Id,
    pub block_num: u32,
    pub reverted: bool,
}

#[derive(Debug, Clone)]
pub struct ChangedObjects {
    pub block_num: u32,
    pub ids: Vec<ObjectId>,
}

/// Broadcast hub for the two signal kinds. Lagging subscribers drop old
/// messages rather than block the chain on a slow reader — `recv()` on a
/// `broadcast::Receiver` surfaces that as `RecvError::Lagged`.
pub struct NotifyHub {
    applied_block: broadcast::Sender<AppliedBlock>,
    changed_objects: broadcast::Sender<ChangedObjects>,
}

const CHANNEL_CAPACITY: usize = 1024;

impl NotifyHub {
    pub fn new() -> Self {
        let (applied_block, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (changed_objects, _) = broadcast::channel(CHANNEL_CAPACITY);
        NotifyHub { applied_block, changed_objects }
    }

    pub fn subscribe_applied_block(&self) -> broadcast::Receiver<AppliedBlock> {
        self.applied_block.subscribe()
    }

    pub fn subscribe_changed_objects(&self) -> broadcast::Receiver<ChangedObjects> {
        self.changed_objects.subscribe()
    }

    /// Best-effort: a broadcast send only fails when there are no
    /// subscribers, which is a normal and expected state (no RPC client
    /// connected yet), not an error worth propagating.
    pub fn publish_applied_block(&self, event: AppliedBlock) {
        let _ = self.applied_block.send(event);
    }

    pub fn publish_changed_objects(&self, event: ChangedObjects) {
        let _ = self.changed_objects.send(event);
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}
