//! solstice-rpc
//!
//! Read-only JSON-RPC 2.0 server exposing committed chain state (§6.3).
//! Namespace: "solstice". All calls read from the shared `Arc<RwLock<Chain>>`
//! the node binary owns; nothing here submits a transaction or advances the
//! chain — that is the block pipeline's job, not this crate's.

pub mod api;
pub mod server;
pub mod types;

pub use api::{SolsticeApiClient, SolsticeApiServer};
pub use server::{RpcServer, RpcServerState};
pub use types::{
    parse_object_id, RpcAccountHistoryEntry, RpcAssetAmount, RpcCallOrder, RpcChainStats,
    RpcCollateralBid, RpcForceSettlement, RpcFullAccount, RpcLimitOrder, RpcOrderBook,
    RpcOrderBookLevel, RpcPrice,
};
