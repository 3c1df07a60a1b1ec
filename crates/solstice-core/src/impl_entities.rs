//! §3.3 implementation entities — reconstructible from chain replay, so
//! unlike protocol entities they carry no hand-authored invariants beyond
//! bookkeeping correctness.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::id::{AccountId, AccountBalanceId, AccountStatisticsId, AssetBitAssetDataId, AssetDynamicDataId, AssetId, WitnessId};
use crate::types::{Amount, Price, Sha256Id, Timestamp};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub id: AccountBalanceId,
    pub owner: AccountId,
    pub asset_type: AssetId,
    pub balance: Amount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountStatistics {
    pub id: Option<AccountStatisticsId>,
    pub owner: Option<AccountId>,
    pub total_core_in_orders: Amount,
    pub lifetime_fees_paid: Amount,
    pub pending_fees: Amount,
    pub pending_vested_fees: Amount,
    pub most_recent_op: Option<Sha256Id>,
    pub total_ops: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDynamicData {
    pub id: AssetDynamicDataId,
    pub current_supply: Amount,
    pub accumulated_fees: Amount,
    pub fee_pool: Amount,
}

/// One feed producer's most recent submission plus its observation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeed {
    pub settlement_price: Price,
    pub maintenance_collateral_ratio: u16,
    pub maximum_short_squeeze_ratio: u16,
    pub core_exchange_rate: Price,
}

impl PriceFeed {
    /// Maximum short-squeeze price: worst fill price for a margin call.
    pub fn max_short_squeeze_price(&self) -> Price {
        Price::new(
            crate::types::AssetAmount::new(
                self.settlement_price.base.asset_id,
                (self.settlement_price.base.amount as i128
                    * crate::constants::COLLATERAL_RATIO_DENOM as i128
                    / self.maximum_short_squeeze_ratio as i128) as Amount,
            ),
            self.settlement_price.quote,
        )
    }

    /// Maintenance-trigger price: call orders below this are margin-call candidates.
    pub fn maintenance_collateralization(&self) -> Price {
        Price::new(
            crate::types::AssetAmount::new(
                self.settlement_price.base.asset_id,
                (self.settlement_price.base.amount as i128
                    * crate::constants::COLLATERAL_RATIO_DENOM as i128
                    / self.maintenance_collateral_ratio as i128) as Amount,
            ),
            self.settlement_price.quote,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBitAssetData {
    pub id: AssetBitAssetDataId,
    pub asset_id: AssetId,
    pub feeds: BTreeMap<AccountId, (Timestamp, PriceFeed)>,
    pub current_feed: Option<PriceFeed>,
    pub current_feed_publication_time: Timestamp,
    /// `Some` once this bitasset has gone through global settlement
    /// (§4.3.5); new feeds/shorts/force-settlements are disabled.
    pub settlement_price: Option<Price>,
    pub settlement_fund: Amount,
    pub force_settled_volume: Amount,
    pub is_prediction_market: bool,
}

impl AssetBitAssetData {
    pub fn has_settlement(&self) -> bool {
        self.settlement_price.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSummary {
    pub block_id: Sha256Id,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionHistoryEntry {
    pub trx_id: Sha256Id,
    pub expiration: Timestamp,
}

/// Chain parameters, reconfigurable only via proposal/committee action and
/// only taking effect at the next maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainParameters {
    pub block_interval_secs: u32,
    pub maintenance_interval_secs: u32,
    pub max_transaction_size: u32,
    pub max_block_size: u32,
    pub max_time_until_expiration: i64,
    pub maximum_authority_membership: u16,
    pub witness_pay_per_block: Amount,
    pub worker_budget_per_day: Amount,
    pub max_predicate_opcode: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalProperties {
    pub parameters: ChainParameters,
    pub pending_parameters: Option<ChainParameters>,
    pub active_witnesses: Vec<WitnessId>,
    pub active_committee_members: Vec<crate::id::CommitteeMemberId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicGlobalProperties {
    pub head_block_number: u32,
    pub head_block_id: Sha256Id,
    pub time: Timestamp,
    pub current_witness: WitnessId,
    pub next_maintenance_time: Timestamp,
    pub last_budget_time: Timestamp,
    pub witness_budget: Amount,
    pub accounts_registered_this_interval: u32,
    pub recently_missed_count: u32,
    pub current_aslot: u64,
    pub recent_slots_filled: u128,
    /// Total core supply available for future budget allocation — reserve
    /// pool, distinct from `AssetDynamicData::current_supply` of CORE.
    pub current_supply: Amount,
}
