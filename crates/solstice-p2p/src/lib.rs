//! The chain-synchronization contract (§6.1) a P2P/networking layer would
//! drive the core through, plus the message shapes it exchanges. Deliberately
//! does not implement a gossip/wire transport — that's outside this crate's
//! scope; `solstice-chain::Chain` is the one implementation of
//! [`ChainSyncContract`] in this workspace.

pub mod contract;
pub mod message;

pub use contract::ChainSyncContract;
pub use message::{ItemType, Message, Synopsis};
