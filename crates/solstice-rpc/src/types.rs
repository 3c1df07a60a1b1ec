//! Wire DTOs for the read API (§6.3). Ids and amounts are rendered as
//! strings — `i64` amounts can exceed what round-trips losslessly through a
//! JS client, and `"1.2.3"`-style object ids are far more debuggable over
//! the wire than a raw `(space, type, instance)` tuple — following the
//! same dedicated-DTO-per-entity convention as this crate's account/time-lock
//! summaries used before this rewrite.

use serde::{Deserialize, Serialize};

use solstice_core::id::{ObjectId, ObjectType, Space};
use solstice_core::{AssetAmount, Price};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcAssetAmount {
    pub asset_id: String,
    pub amount: String,
}

impl From<AssetAmount> for RpcAssetAmount {
    fn from(a: AssetAmount) -> Self {
        RpcAssetAmount {
            asset_id: a.asset_id.to_string(),
            amount: a.amount.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPrice {
    pub base: RpcAssetAmount,
    pub quote: RpcAssetAmount,
}

impl From<Price> for RpcPrice {
    fn from(p: Price) -> Self {
        RpcPrice {
            base: p.base.into(),
            quote: p.quote.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcLimitOrder {
    pub id: String,
    pub seller: String,
    pub for_sale: RpcAssetAmount,
    pub sell_price: RpcPrice,
    pub expiration: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCallOrder {
    pub id: String,
    pub borrower: String,
    pub debt: RpcAssetAmount,
    pub collateral: RpcAssetAmount,
    pub call_price: RpcPrice,
    pub target_collateral_ratio: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcForceSettlement {
    pub id: String,
    pub owner: String,
    pub balance: RpcAssetAmount,
    pub settlement_date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCollateralBid {
    pub id: String,
    pub bidder: String,
    pub additional_collateral: String,
    pub debt_covered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcOrderBookLevel {
    pub price: RpcPrice,
    pub orders: usize,
    pub total_for_sale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcOrderBook {
    pub base: String,
    pub quote: String,
    pub bids: Vec<RpcOrderBookLevel>,
    pub asks: Vec<RpcOrderBookLevel>,
}

/// `get_full_accounts` (§6.3): the account row plus everything a wallet UI
/// needs in one round trip, rather than one call per sub-object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcFullAccount {
    pub account: serde_json::Value,
    pub statistics: serde_json::Value,
    pub balances: Vec<RpcAssetAmount>,
    /// Capped at 500 proposals per account before paging.
    pub proposals: Vec<serde_json::Value>,
}

/// `get_account_history`. A per-account operation-history index (a linked
/// list threaded through every applied operation) is deliberately not built
/// here — indexing every operation is the job of a dedicated
/// account-history-plugin architecture, out of scope for this node. This
/// surfaces only the lightweight counters `solstice-chain` already
/// maintains on `AccountStatistics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcAccountHistoryEntry {
    pub most_recent_op: Option<String>,
    pub total_ops: u64,
    pub lifetime_fees_paid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcChainStats {
    pub head_block_number: u32,
    pub head_block_id: String,
    pub head_block_time: i64,
    pub chain_id: String,
    pub active_witnesses: usize,
    pub active_committee_members: usize,
}

/// Parses a `"space.type.instance"` id string into an [`ObjectId`] — the
/// wire shape `get_objects` (§6.3) accepts.
pub fn parse_object_id(s: &str) -> Option<ObjectId> {
    let mut parts = s.split('.');
    let space = parts.next()?.parse::<u8>().ok()?;
    let type_id = parts.next()?.parse::<u8>().ok()?;
    let instance = parts.next()?.parse::<u64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let space = match space {
        1 => Space::Protocol,
        2 => Space::Implementation,
        _ => return None,
    };
    Some(ObjectId::new(space, object_type_from_u8(type_id)?, instance))
}

fn object_type_from_u8(v: u8) -> Option<ObjectType> {
    use ObjectType::*;
    Some(match v {
        1 => Account,
        2 => Asset,
        3 => Witness,
        4 => CommitteeMember,
        5 => LimitOrder,
        6 => CallOrder,
        7 => CustomObject,
        8 => Proposal,
        9 => OperationHistory,
        10 => Worker,
        11 => ForceSettlement,
        12 => CollateralBid,
        20 => GlobalProperty,
        21 => DynamicGlobalProperty,
        22 => AssetDynamicData,
        23 => AssetBitAssetData,
        24 => AccountBalance,
        25 => AccountStatistics,
        26 => TransactionHistory,
        27 => BlockSummary,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_account_id() {
        let id = parse_object_id("1.1.7").unwrap();
        assert_eq!(id.instance, 7);
        assert_eq!(id.type_id, ObjectType::Account);
        assert_eq!(id.space, Space::Protocol);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(parse_object_id("1.1").is_none());
        assert!(parse_object_id("1.1.7.0").is_none());
        assert!(parse_object_id("3.1.0").is_none());
        assert!(parse_object_id("1.99.0").is_none());
    }
}
