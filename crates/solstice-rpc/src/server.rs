use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult, SubscriptionResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use jsonrpsee::{PendingSubscriptionSink, SubscriptionMessage};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use solstice_chain::Chain;
use solstice_core::id::{AccountId, AssetId, Id};

use crate::api::SolsticeApiServer;
use crate::types::{
    parse_object_id, RpcAccountHistoryEntry, RpcAssetAmount, RpcCallOrder, RpcChainStats,
    RpcCollateralBid, RpcForceSettlement, RpcFullAccount, RpcLimitOrder, RpcOrderBook,
    RpcOrderBookLevel,
};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

fn bad_request(msg: impl Into<String>) -> ErrorObject<'static> {
    rpc_err(-32602, msg)
}

fn parse_account_id(s: &str) -> RpcResult<AccountId> {
    parse_object_id(s)
        .map(Id::new)
        .ok_or_else(|| bad_request(format!("invalid account id: {s}")))
}

fn parse_asset_id(s: &str) -> RpcResult<AssetId> {
    parse_object_id(s)
        .map(Id::new)
        .ok_or_else(|| bad_request(format!("invalid asset id: {s}")))
}

const MAX_LOOKUP_ACCOUNTS: u32 = 1000;
const MAX_ORDERS: u32 = 300;
const MAX_ORDER_BOOK_DEPTH: u32 = 50;
const MAX_COLLATERAL_BIDS: u32 = 250;
const MAX_FULL_ACCOUNTS: usize = 50;
const MAX_PROPOSALS_PER_ACCOUNT: usize = 500;

/// Shared state passed to the RPC server — a single chain instance behind
/// the reader side of the single-writer lock (§5): the block pipeline holds
/// the writer half only for the duration of `push_block`, so every read
/// handler here only ever briefly blocks behind an in-flight block.
pub struct RpcServerState {
    pub chain: Arc<RwLock<Chain>>,
}

/// The read-only JSON-RPC server implementation (§6.3).
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Starts the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

fn limit_order_to_rpc(o: &solstice_core::market::LimitOrder) -> RpcLimitOrder {
    RpcLimitOrder {
        id: o.id.to_string(),
        seller: o.seller.to_string(),
        for_sale: o.for_sale.into(),
        sell_price: o.sell_price.into(),
        expiration: o.expiration,
    }
}

fn call_order_to_rpc(o: &solstice_core::market::CallOrder) -> RpcCallOrder {
    RpcCallOrder {
        id: o.id.to_string(),
        borrower: o.borrower.to_string(),
        debt: o.debt.into(),
        collateral: o.collateral.into(),
        call_price: o.call_price.into(),
        target_collateral_ratio: o.target_collateral_ratio,
    }
}

fn force_settlement_to_rpc(s: &solstice_core::market::ForceSettlement) -> RpcForceSettlement {
    RpcForceSettlement {
        id: s.id.to_string(),
        owner: s.owner.to_string(),
        balance: s.balance.into(),
        settlement_date: s.settlement_date,
    }
}

fn collateral_bid_to_rpc(b: &solstice_core::market::CollateralBid) -> RpcCollateralBid {
    RpcCollateralBid {
        id: b.id.to_string(),
        bidder: b.bidder.to_string(),
        additional_collateral: b.additional_collateral.to_string(),
        debt_covered: b.debt_covered.to_string(),
    }
}

#[async_trait]
impl SolsticeApiServer for RpcServer {
    async fn get_objects(&self, ids: Vec<String>) -> RpcResult<Vec<Option<serde_json::Value>>> {
        let chain = self.state.chain.read().await;
        Ok(ids
            .iter()
            .map(|s| parse_object_id(s).and_then(|id| chain.db.get_object_json(id)))
            .collect())
    }

    async fn get_block(&self, block_num: u32) -> RpcResult<Option<serde_json::Value>> {
        let chain = self.state.chain.read().await;
        let block = chain
            .get_block_by_num(block_num)
            .map_err(|e| rpc_err(-32000, e.to_string()))?;
        Ok(block.and_then(|b| serde_json::to_value(b).ok()))
    }

    async fn get_block_header(&self, block_num: u32) -> RpcResult<Option<serde_json::Value>> {
        let chain = self.state.chain.read().await;
        let block = chain
            .get_block_by_num(block_num)
            .map_err(|e| rpc_err(-32000, e.to_string()))?;
        Ok(block.and_then(|b| serde_json::to_value(b.header).ok()))
    }

    async fn get_transaction(
        &self,
        block_num: u32,
        trx_in_block: u32,
    ) -> RpcResult<Option<serde_json::Value>> {
        let chain = self.state.chain.read().await;
        let block = chain
            .get_block_by_num(block_num)
            .map_err(|e| rpc_err(-32000, e.to_string()))?;
        Ok(block.and_then(|b| {
            b.transactions
                .get(trx_in_block as usize)
                .and_then(|t| serde_json::to_value(t).ok())
        }))
    }

    async fn lookup_accounts(
        &self,
        lower_bound_name: String,
        limit: u32,
    ) -> RpcResult<Vec<(String, String)>> {
        let limit = limit.min(MAX_LOOKUP_ACCOUNTS) as usize;
        let chain = self.state.chain.read().await;
        Ok(chain
            .db
            .account_names
            .range(lower_bound_name..)
            .take(limit)
            .map(|(name, id)| (name.clone(), id.to_string()))
            .collect())
    }

    async fn get_account_balances(
        &self,
        account_id: String,
        assets: Vec<String>,
    ) -> RpcResult<Vec<RpcAssetAmount>> {
        let account = parse_account_id(&account_id)?;
        let chain = self.state.chain.read().await;
        let mut out = Vec::with_capacity(assets.len());
        for asset_str in assets {
            let asset = parse_asset_id(&asset_str)?;
            let amount = chain.db.balance_amount(account, asset);
            out.push(solstice_core::AssetAmount::new(asset, amount).into());
        }
        Ok(out)
    }

    async fn get_full_accounts(
        &self,
        accounts: Vec<String>,
    ) -> RpcResult<Vec<Option<RpcFullAccount>>> {
        if accounts.len() > MAX_FULL_ACCOUNTS {
            return Err(bad_request(format!(
                "at most {MAX_FULL_ACCOUNTS} accounts per call"
            )));
        }
        let chain = self.state.chain.read().await;
        let mut out = Vec::with_capacity(accounts.len());
        for key in accounts {
            let account = parse_object_id(&key)
                .map(|id| chain.db.accounts.find(id.instance))
                .unwrap_or_else(|| chain.db.account_by_name(&key));
            let Some(account) = account else {
                out.push(None);
                continue;
            };
            let statistics = chain
                .db
                .account_statistics
                .find(account.statistics.raw.instance)
                .and_then(|s| serde_json::to_value(s).ok())
                .unwrap_or(serde_json::Value::Null);
            let balances = chain
                .db
                .balances_by_owner
                .range((account.id, AssetId::from_instance(solstice_core::id::Space::Protocol, solstice_core::id::ObjectType::Asset, 0))..)
                .take_while(|((owner, _), _)| *owner == account.id)
                .filter_map(|(_, instance)| chain.db.account_balances.find(*instance))
                .map(|b| solstice_core::AssetAmount::new(b.asset_type, b.balance).into())
                .collect();
            let proposals = chain
                .db
                .proposals
                .iter()
                .filter(|(_, p)| {
                    p.proposer == account.id
                        || p.required_owner_approvals.contains(&account.id)
                        || p.required_active_approvals.contains(&account.id)
                })
                .take(MAX_PROPOSALS_PER_ACCOUNT)
                .filter_map(|(_, p)| serde_json::to_value(p).ok())
                .collect();
            out.push(Some(RpcFullAccount {
                account: serde_json::to_value(account).unwrap_or(serde_json::Value::Null),
                statistics,
                balances,
                proposals,
            }));
        }
        Ok(out)
    }

    async fn get_limit_orders(
        &self,
        base: String,
        quote: String,
        limit: u32,
    ) -> RpcResult<Vec<RpcLimitOrder>> {
        let base = parse_asset_id(&base)?;
        let quote = parse_asset_id(&quote)?;
        let limit = limit.min(MAX_ORDERS) as usize;
        let market = if base < quote { (base, quote) } else { (quote, base) };
        let chain = self.state.chain.read().await;
        let Some(book) = chain.db.limit_order_books.get(&market) else {
            return Ok(Vec::new());
        };
        let orders = book
            .asks
            .ascending()
            .chain(book.bids.descending())
            .filter_map(|(_, id)| chain.db.limit_orders.find(id.raw.instance))
            .take(limit)
            .map(limit_order_to_rpc)
            .collect();
        Ok(orders)
    }

    async fn get_call_orders(&self, asset: String, limit: u32) -> RpcResult<Vec<RpcCallOrder>> {
        let asset = parse_asset_id(&asset)?;
        let limit = limit.min(MAX_ORDERS) as usize;
        let chain = self.state.chain.read().await;
        let Some(index) = chain.db.call_order_books.get(&asset) else {
            return Ok(Vec::new());
        };
        Ok(index
            .ascending()
            .filter_map(|(_, id)| chain.db.call_orders.find(id.raw.instance))
            .take(limit)
            .map(call_order_to_rpc)
            .collect())
    }

    async fn get_settle_orders(
        &self,
        asset: String,
        limit: u32,
    ) -> RpcResult<Vec<RpcForceSettlement>> {
        let asset = parse_asset_id(&asset)?;
        let limit = limit.min(MAX_ORDERS) as usize;
        let chain = self.state.chain.read().await;
        let Some(queue) = chain.db.settlement_queues.get(&asset) else {
            return Ok(Vec::new());
        };
        Ok(queue
            .ascending()
            .filter_map(|(_, id)| chain.db.force_settlements.find(id.raw.instance))
            .take(limit)
            .map(force_settlement_to_rpc)
            .collect())
    }

    async fn get_order_book(
        &self,
        base: String,
        quote: String,
        depth: u32,
    ) -> RpcResult<RpcOrderBook> {
        let base_id = parse_asset_id(&base)?;
        let quote_id = parse_asset_id(&quote)?;
        let depth = depth.min(MAX_ORDER_BOOK_DEPTH) as usize;
        let market = if base_id < quote_id { (base_id, quote_id) } else { (quote_id, base_id) };
        let chain = self.state.chain.read().await;
        let empty = RpcOrderBook { base, quote, bids: Vec::new(), asks: Vec::new() };
        let Some(book) = chain.db.limit_order_books.get(&market) else {
            return Ok(empty);
        };
        // One level per resting order: `PriceKey` isn't exposed outside
        // `solstice_chain::market`, so levels aren't grouped by identical
        // price here the way a real order book UI would collapse them.
        let level = |id: &solstice_core::LimitOrderId| -> Option<RpcOrderBookLevel> {
            let order = chain.db.limit_orders.find(id.raw.instance)?;
            Some(RpcOrderBookLevel {
                price: order.sell_price.into(),
                orders: 1,
                total_for_sale: order.for_sale.amount.to_string(),
            })
        };
        let asks: Vec<RpcOrderBookLevel> = book
            .asks
            .ascending()
            .take(depth)
            .filter_map(|(_, id)| level(id))
            .collect();
        let bids: Vec<RpcOrderBookLevel> = book
            .bids
            .descending()
            .take(depth)
            .filter_map(|(_, id)| level(id))
            .collect();
        Ok(RpcOrderBook { base: market.0.to_string(), quote: market.1.to_string(), bids, asks })
    }

    async fn get_margin_positions(&self, account_id: String) -> RpcResult<Vec<RpcCallOrder>> {
        let account = parse_account_id(&account_id)?;
        let chain = self.state.chain.read().await;
        Ok(chain
            .db
            .call_orders
            .iter()
            .filter(|(_, c)| c.borrower == account)
            .map(|(_, c)| call_order_to_rpc(c))
            .collect())
    }

    async fn get_collateral_bids(
        &self,
        asset: String,
        limit: u32,
        skip: u32,
    ) -> RpcResult<Vec<RpcCollateralBid>> {
        let asset = parse_asset_id(&asset)?;
        let limit = limit.min(MAX_COLLATERAL_BIDS) as usize;
        let chain = self.state.chain.read().await;
        let Some(index) = chain.db.collateral_bid_books.get(&asset) else {
            return Ok(Vec::new());
        };
        Ok(index
            .descending()
            .skip(skip as usize)
            .filter_map(|(_, id)| chain.db.collateral_bids.find(id.raw.instance))
            .take(limit)
            .map(collateral_bid_to_rpc)
            .collect())
    }

    async fn get_account_history(
        &self,
        account_id: String,
    ) -> RpcResult<Option<RpcAccountHistoryEntry>> {
        let account = parse_account_id(&account_id)?;
        let chain = self.state.chain.read().await;
        let Some(acct) = chain.db.accounts.find(account.raw.instance) else {
            return Ok(None);
        };
        let Some(stats) = chain.db.account_statistics.find(acct.statistics.raw.instance) else {
            return Ok(None);
        };
        Ok(Some(RpcAccountHistoryEntry {
            most_recent_op: stats.most_recent_op.map(|id| id.to_string()),
            total_ops: stats.total_ops,
            lifetime_fees_paid: stats.lifetime_fees_paid.to_string(),
        }))
    }

    async fn get_chain_stats(&self) -> RpcResult<RpcChainStats> {
        let chain = self.state.chain.read().await;
        let gp = chain.db.global_properties();
        let dgp = chain.db.dynamic_global_properties();
        Ok(RpcChainStats {
            head_block_number: dgp.head_block_number,
            head_block_id: dgp.head_block_id.to_string(),
            head_block_time: dgp.time,
            chain_id: chain.chain_id().to_string(),
            active_witnesses: gp.active_witnesses.len(),
            active_committee_members: gp.active_committee_members.len(),
        })
    }

    async fn subscribe_changed_objects(&self, pending: PendingSubscriptionSink) -> SubscriptionResult {
        let mut rx = self.state.chain.read().await.notify().subscribe_changed_objects();
        let sink = pending.accept().await?;
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Ok(msg) = SubscriptionMessage::from_json(&serde_json::json!({
                            "block_num": event.block_num,
                            "ids": event.ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
                        })) else {
                            continue;
                        };
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "changed-objects subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(())
    }

    async fn subscribe_applied_blocks(&self, pending: PendingSubscriptionSink) -> SubscriptionResult {
        let mut rx = self.state.chain.read().await.notify().subscribe_applied_block();
        let sink = pending.accept().await?;
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Ok(msg) = SubscriptionMessage::from_json(&serde_json::json!({
                            "block_id": event.block_id.to_string(),
                            "block_num": event.block_num,
                            "reverted": event.reverted,
                        })) else {
                            continue;
                        };
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "applied-block subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(())
    }
}
