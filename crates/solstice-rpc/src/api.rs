use jsonrpsee::core::{RpcResult, SubscriptionResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::PendingSubscriptionSink;

use crate::types::{
    RpcAccountHistoryEntry, RpcCallOrder, RpcChainStats, RpcCollateralBid, RpcForceSettlement,
    RpcFullAccount, RpcLimitOrder, RpcOrderBook,
};

/// The read-only JSON-RPC 2.0 surface (§6.3). All method names are prefixed
/// with "solstice_" via `namespace = "solstice"`; every call returns
/// committed state only — nothing here can mutate the chain.
#[rpc(server, client, namespace = "solstice")]
pub trait SolsticeApi {
    /// Fetch arbitrary objects by `"space.type.instance"` id. Unknown or
    /// malformed ids resolve to `null` at their position rather than
    /// failing the whole batch.
    #[method(name = "getObjects")]
    async fn get_objects(&self, ids: Vec<String>) -> RpcResult<Vec<Option<serde_json::Value>>>;

    #[method(name = "getBlock")]
    async fn get_block(&self, block_num: u32) -> RpcResult<Option<serde_json::Value>>;

    #[method(name = "getBlockHeader")]
    async fn get_block_header(&self, block_num: u32) -> RpcResult<Option<serde_json::Value>>;

    #[method(name = "getTransaction")]
    async fn get_transaction(
        &self,
        block_num: u32,
        trx_in_block: u32,
    ) -> RpcResult<Option<serde_json::Value>>;

    /// Account names lexicographically ≥ `lower_bound_name`, up to `limit`
    /// (capped at 1000). Returns `(name, account_id)` pairs.
    #[method(name = "lookupAccounts")]
    async fn lookup_accounts(
        &self,
        lower_bound_name: String,
        limit: u32,
    ) -> RpcResult<Vec<(String, String)>>;

    #[method(name = "getAccountBalances")]
    async fn get_account_balances(
        &self,
        account_id: String,
        assets: Vec<String>,
    ) -> RpcResult<Vec<crate::types::RpcAssetAmount>>;

    /// Capped at 50 accounts per call (§6.3).
    #[method(name = "getFullAccounts")]
    async fn get_full_accounts(
        &self,
        accounts: Vec<String>,
    ) -> RpcResult<Vec<Option<RpcFullAccount>>>;

    #[method(name = "getLimitOrders")]
    async fn get_limit_orders(
        &self,
        base: String,
        quote: String,
        limit: u32,
    ) -> RpcResult<Vec<RpcLimitOrder>>;

    #[method(name = "getCallOrders")]
    async fn get_call_orders(&self, asset: String, limit: u32) -> RpcResult<Vec<RpcCallOrder>>;

    #[method(name = "getSettleOrders")]
    async fn get_settle_orders(
        &self,
        asset: String,
        limit: u32,
    ) -> RpcResult<Vec<RpcForceSettlement>>;

    /// Aggregated book depth, capped at `depth` price levels per side
    /// (max 50).
    #[method(name = "getOrderBook")]
    async fn get_order_book(
        &self,
        base: String,
        quote: String,
        depth: u32,
    ) -> RpcResult<RpcOrderBook>;

    #[method(name = "getMarginPositions")]
    async fn get_margin_positions(&self, account_id: String) -> RpcResult<Vec<RpcCallOrder>>;

    #[method(name = "getCollateralBids")]
    async fn get_collateral_bids(
        &self,
        asset: String,
        limit: u32,
        skip: u32,
    ) -> RpcResult<Vec<RpcCollateralBid>>;

    #[method(name = "getAccountHistory")]
    async fn get_account_history(
        &self,
        account_id: String,
    ) -> RpcResult<Option<RpcAccountHistoryEntry>>;

    #[method(name = "getChainStats")]
    async fn get_chain_stats(&self) -> RpcResult<RpcChainStats>;

    /// Pushes every `ChangedObjects` notification (§5's in-process
    /// broadcast) as it is published from inside a committed block.
    #[subscription(
        name = "subscribeChangedObjects" => "changedObjects",
        unsubscribe = "unsubscribeChangedObjects",
        item = serde_json::Value
    )]
    async fn subscribe_changed_objects(&self) -> SubscriptionResult;

    /// Pushes one notification per applied (or reverted, on a fork switch)
    /// block.
    #[subscription(
        name = "subscribeAppliedBlocks" => "appliedBlock",
        unsubscribe = "unsubscribeAppliedBlocks",
        item = serde_json::Value
    )]
    async fn subscribe_applied_blocks(&self) -> SubscriptionResult;
}
