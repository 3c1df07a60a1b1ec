//! C1's concrete shape: a `Database` composing one `ObjectTable<T>` per
//! protocol/implementation entity (§3), plus the secondary indices the
//! market engine and account lookups need kept in sync by hand.

use std::collections::BTreeMap;

use solstice_core::id::{ObjectType, Space};
use solstice_core::impl_entities::{
    AccountBalance, AccountStatistics, AssetBitAssetData, AssetDynamicData, BlockSummary,
    DynamicGlobalProperties, GlobalProperties, TransactionHistoryEntry,
};
use solstice_core::market::{CallOrder, CollateralBid, ForceSettlement, LimitOrder};
use solstice_core::{
    Account, AccountId, Asset, AssetId, CallOrderId, ChainError, ChainResult, CollateralBidId,
    CommitteeMember, ForceSettlementId, Id, LimitOrderId, ObjectId, Proposal, Sha256Id, Timestamp,
    Witness, Worker,
};
use solstice_core::fee::FeeSchedule;
use solstice_db::{ObjectTable, OrderedIndex, UndoableDatabase};

use crate::market::{MarketBook, PriceKey};

/// The in-memory object database for the whole chain. Singletons
/// (`GlobalProperties`, `DynamicGlobalProperties`, `FeeSchedule`) are stored
/// as single-row `ObjectTable`s so they ride the same undo machinery as
/// everything else, rather than needing bespoke save/restore code.
pub struct Database {
    pub accounts: ObjectTable<Account>,
    pub assets: ObjectTable<Asset>,
    pub witnesses: ObjectTable<Witness>,
    pub committee_members: ObjectTable<CommitteeMember>,
    pub limit_orders: ObjectTable<LimitOrder>,
    pub call_orders: ObjectTable<CallOrder>,
    pub force_settlements: ObjectTable<ForceSettlement>,
    pub collateral_bids: ObjectTable<CollateralBid>,
    pub workers: ObjectTable<Worker>,
    pub proposals: ObjectTable<Proposal>,

    pub account_balances: ObjectTable<AccountBalance>,
    pub account_statistics: ObjectTable<AccountStatistics>,
    pub asset_dynamic_data: ObjectTable<AssetDynamicData>,
    pub asset_bitasset_data: ObjectTable<AssetBitAssetData>,
    pub block_summaries: ObjectTable<BlockSummary>,
    /// §4.2 step 4 — recently-seen transaction ids, pruned once their
    /// expiration passes the head block time.
    pub transaction_history: ObjectTable<TransactionHistoryEntry>,

    pub global_properties: ObjectTable<GlobalProperties>,
    pub dynamic_global_properties: ObjectTable<DynamicGlobalProperties>,
    pub fee_schedule: ObjectTable<FeeSchedule>,

    /// Per-market order books, keyed by the canonical `(min_id, max_id)` pair.
    pub limit_order_books: BTreeMap<(AssetId, AssetId), MarketBook>,
    /// Call orders ordered by ascending call price, one book per backed
    /// asset — the scan order `check_call_orders` (§4.3.2) needs.
    pub call_order_books: BTreeMap<AssetId, OrderedIndex<PriceKey, CallOrderId>>,
    /// Force settlements ordered by ascending settlement date, one queue per
    /// backed asset.
    pub settlement_queues: BTreeMap<AssetId, OrderedIndex<Timestamp, ForceSettlementId>>,
    /// Collateral bids ordered by descending `inv_swan_price` (best bid
    /// first), one book per backed asset.
    pub collateral_bid_books: BTreeMap<AssetId, OrderedIndex<PriceKey, CollateralBidId>>,

    /// `name -> account` lookup, kept in lockstep with `accounts` so
    /// `lookup_accounts` (§6.3) doesn't need a linear scan.
    pub account_names: BTreeMap<String, AccountId>,
    /// `(owner, asset) -> balance row instance` lookup.
    pub balances_by_owner: BTreeMap<(AccountId, AssetId), u64>,
    /// `trx_id -> transaction_history row instance`, the duplicate-trx check
    /// §4.2 step 4 runs on every incoming transaction.
    pub trx_history_by_id: BTreeMap<Sha256Id, u64>,
    /// Transaction history rows ordered by expiration, so pruning expired
    /// entries doesn't need a full-table scan.
    pub trx_history_by_expiration: OrderedIndex<Timestamp, u64>,
}

impl Default for Database {
    fn default() -> Self {
        Database {
            accounts: ObjectTable::new(),
            assets: ObjectTable::new(),
            witnesses: ObjectTable::new(),
            committee_members: ObjectTable::new(),
            limit_orders: ObjectTable::new(),
            call_orders: ObjectTable::new(),
            force_settlements: ObjectTable::new(),
            collateral_bids: ObjectTable::new(),
            workers: ObjectTable::new(),
            proposals: ObjectTable::new(),
            account_balances: ObjectTable::new(),
            account_statistics: ObjectTable::new(),
            asset_dynamic_data: ObjectTable::new(),
            asset_bitasset_data: ObjectTable::new(),
            block_summaries: ObjectTable::new(),
            transaction_history: ObjectTable::new(),
            global_properties: ObjectTable::new(),
            dynamic_global_properties: ObjectTable::new(),
            fee_schedule: ObjectTable::new(),
            limit_order_books: BTreeMap::new(),
            call_order_books: BTreeMap::new(),
            settlement_queues: BTreeMap::new(),
            collateral_bid_books: BTreeMap::new(),
            account_names: BTreeMap::new(),
            balances_by_owner: BTreeMap::new(),
            trx_history_by_id: BTreeMap::new(),
            trx_history_by_expiration: OrderedIndex::new(),
        }
    }
}

impl UndoableDatabase for Database {
    fn push_session(&mut self) {
        self.accounts.push_segment();
        self.assets.push_segment();
        self.witnesses.push_segment();
        self.committee_members.push_segment();
        self.limit_orders.push_segment();
        self.call_orders.push_segment();
        self.force_settlements.push_segment();
        self.collateral_bids.push_segment();
        self.workers.push_segment();
        self.proposals.push_segment();
        self.account_balances.push_segment();
        self.account_statistics.push_segment();
        self.asset_dynamic_data.push_segment();
        self.asset_bitasset_data.push_segment();
        self.block_summaries.push_segment();
        self.transaction_history.push_segment();
        self.global_properties.push_segment();
        self.dynamic_global_properties.push_segment();
        self.fee_schedule.push_segment();
    }

    fn commit_session(&mut self) {
        self.accounts.commit_top();
        self.assets.commit_top();
        self.witnesses.commit_top();
        self.committee_members.commit_top();
        self.limit_orders.commit_top();
        self.call_orders.commit_top();
        self.force_settlements.commit_top();
        self.collateral_bids.commit_top();
        self.workers.commit_top();
        self.proposals.commit_top();
        self.account_balances.commit_top();
        self.account_statistics.commit_top();
        self.asset_dynamic_data.commit_top();
        self.asset_bitasset_data.commit_top();
        self.block_summaries.commit_top();
        self.transaction_history.commit_top();
        self.global_properties.commit_top();
        self.dynamic_global_properties.commit_top();
        self.fee_schedule.commit_top();
    }

    fn rollback_session(&mut self) {
        self.accounts.rollback_top();
        self.assets.rollback_top();
        self.witnesses.rollback_top();
        self.committee_members.rollback_top();
        self.limit_orders.rollback_top();
        self.call_orders.rollback_top();
        self.force_settlements.rollback_top();
        self.collateral_bids.rollback_top();
        self.workers.rollback_top();
        self.proposals.rollback_top();
        self.account_balances.rollback_top();
        self.account_statistics.rollback_top();
        self.asset_dynamic_data.rollback_top();
        self.asset_bitasset_data.rollback_top();
        self.block_summaries.rollback_top();
        self.transaction_history.rollback_top();
        self.global_properties.rollback_top();
        self.dynamic_global_properties.rollback_top();
        self.fee_schedule.rollback_top();
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_properties(&self) -> &GlobalProperties {
        self.global_properties
            .find(0)
            .expect("genesis initializes global properties")
    }

    pub fn dynamic_global_properties(&self) -> &DynamicGlobalProperties {
        self.dynamic_global_properties
            .find(0)
            .expect("genesis initializes dynamic global properties")
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        self.fee_schedule
            .find(0)
            .expect("genesis initializes the fee schedule")
    }

    pub fn now(&self) -> Timestamp {
        self.dynamic_global_properties().time
    }

    pub fn account_by_name(&self, name: &str) -> Option<&Account> {
        self.account_names
            .get(name)
            .and_then(|id| self.accounts.find(id.raw.instance))
    }

    pub fn balance_instance(&self, owner: AccountId, asset: AssetId) -> Option<u64> {
        self.balances_by_owner.get(&(owner, asset)).copied()
    }

    pub fn balance_amount(&self, owner: AccountId, asset: AssetId) -> i64 {
        self.balance_instance(owner, asset)
            .and_then(|instance| self.account_balances.find(instance))
            .map(|b| b.balance)
            .unwrap_or(0)
    }

    /// Credits (positive) or debits (negative) `delta` units of `asset` to
    /// `owner`, creating the balance row on first use. Fails if a debit
    /// would take the balance negative.
    pub fn adjust_balance(
        &mut self,
        owner: AccountId,
        asset: AssetId,
        delta: i64,
    ) -> ChainResult<()> {
        if let Some(instance) = self.balance_instance(owner, asset) {
            let current = self
                .account_balances
                .get(instance)
                .map_err(|e| ChainError::Storage(e.to_string()))?
                .balance;
            let updated = current + delta;
            if updated < 0 {
                return Err(ChainError::InsufficientBalance {
                    account: owner.raw,
                    asset: asset.raw,
                    have: current,
                    need: -delta,
                });
            }
            self.account_balances
                .modify(instance, |b| b.balance = updated)
                .map_err(|e| ChainError::Storage(e.to_string()))?;
        } else {
            if delta < 0 {
                return Err(ChainError::InsufficientBalance {
                    account: owner.raw,
                    asset: asset.raw,
                    have: 0,
                    need: -delta,
                });
            }
            let instance = self.account_balances.create(|i| AccountBalance {
                id: Id::from_instance(Space::Implementation, ObjectType::AccountBalance, i),
                owner,
                asset_type: asset,
                balance: delta,
            });
            self.balances_by_owner.insert((owner, asset), instance);
        }
        Ok(())
    }

    /// Whether `trx_id` has already been applied and not yet pruned — the
    /// duplicate-transaction check §4.2 step 4 runs before anything else.
    pub fn has_transaction(&self, trx_id: Sha256Id) -> bool {
        self.trx_history_by_id.contains_key(&trx_id)
    }

    /// Records a newly-applied transaction's id so later duplicates of it
    /// are rejected until `expiration` passes and `prune_transaction_history`
    /// sweeps it out.
    pub fn record_transaction(&mut self, trx_id: Sha256Id, expiration: Timestamp) {
        let instance = self
            .transaction_history
            .create(|_| TransactionHistoryEntry { trx_id, expiration });
        self.trx_history_by_id.insert(trx_id, instance);
        self.trx_history_by_expiration.insert(expiration, instance);
    }

    /// Drops every history row whose expiration is at or before `now` —
    /// §4.2's rationale for bounding the duplicate-check window to
    /// `max_time_until_expiration` rather than keeping every trx id forever.
    pub fn prune_transaction_history(&mut self, now: Timestamp) {
        let stale: Vec<(Timestamp, u64)> = self
            .trx_history_by_expiration
            .ascending()
            .take_while(|(expiration, _)| *expiration <= now)
            .copied()
            .collect();
        for (expiration, instance) in stale {
            if let Ok(entry) = self.transaction_history.remove(instance) {
                self.trx_history_by_id.remove(&entry.trx_id);
            }
            self.trx_history_by_expiration.remove(expiration, instance);
        }
    }

    /// Fetches or lazily creates the statistics row for `owner`.
    pub fn statistics_instance(&mut self, owner: AccountId) -> u64 {
        if let Some(acct) = self.accounts.find(owner.raw.instance) {
            let instance = acct.statistics.raw.instance;
            if self.account_statistics.find(instance).is_some() {
                return instance;
            }
        }
        self.account_statistics.create(|i| AccountStatistics {
            id: Some(Id::from_instance(Space::Implementation, ObjectType::AccountStatistics, i)),
            owner: Some(owner),
            ..Default::default()
        })
    }

    /// Looks up a generic object by its fully-qualified id, serialized as
    /// `serde_json::Value` — backs the `get_objects` RPC (§6.3).
    pub fn get_object_json(&self, id: ObjectId) -> Option<serde_json::Value> {
        match id.type_id {
            ObjectType::Account => self.accounts.find(id.instance).and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::Asset => self.assets.find(id.instance).and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::Witness => self.witnesses.find(id.instance).and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::CommitteeMember => self
                .committee_members
                .find(id.instance)
                .and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::LimitOrder => self.limit_orders.find(id.instance).and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::CallOrder => self.call_orders.find(id.instance).and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::Proposal => self.proposals.find(id.instance).and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::Worker => self.workers.find(id.instance).and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::ForceSettlement => self
                .force_settlements
                .find(id.instance)
                .and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::CollateralBid => self
                .collateral_bids
                .find(id.instance)
                .and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::AccountBalance => self
                .account_balances
                .find(id.instance)
                .and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::AccountStatistics => self
                .account_statistics
                .find(id.instance)
                .and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::AssetDynamicData => self
                .asset_dynamic_data
                .find(id.instance)
                .and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::AssetBitAssetData => self
                .asset_bitasset_data
                .find(id.instance)
                .and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::BlockSummary => self
                .block_summaries
                .find(id.instance)
                .and_then(|v| serde_json::to_value(v).ok()),
            ObjectType::GlobalProperty => {
                (id.instance == 0).then(|| serde_json::to_value(self.global_properties()).ok()).flatten()
            }
            ObjectType::DynamicGlobalProperty => (id.instance == 0)
                .then(|| serde_json::to_value(self.dynamic_global_properties()).ok())
                .flatten(),
            ObjectType::CustomObject | ObjectType::OperationHistory | ObjectType::TransactionHistory => None,
        }
    }
}
