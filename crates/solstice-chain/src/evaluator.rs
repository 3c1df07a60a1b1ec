//! §4.2 Evaluator Dispatch (C5): one handler per `OperationTag`. Each
//! handler folds `do_evaluate` (permission/balance/parameter checks) and
//! `do_apply` (state mutation) into a single function that bails out with
//! `?` before touching state on any precondition failure — since both run
//! inside the same per-trx undo session, a bailout partway through `do_apply`
//! would be rolled back anyway, but keeping validation up front matches the
//! source's two-phase contract and is easier to read.

use solstice_core::asset::asset_flags;
use solstice_core::id::{ObjectType, Space};
use solstice_core::market::{CallOrder, CollateralBid, ForceSettlement, LimitOrder};
use solstice_core::operations::account_whitelist_flags;
use solstice_core::{
    Account, AccountId, AccountOptions, Asset, AssetAmount, AssetId, ChainError, ChainResult, Id, Operation,
    Price, Timestamp, VirtualOperation, CORE_ASSET, TEMP_ACCOUNT,
};
use solstice_core::impl_entities::{AssetBitAssetData, AssetDynamicData};

use crate::database::Database;
use crate::feed;
use crate::market;
use crate::proposal_engine;

/// Dispatches `op`, charging its fee first and checking its hardfork
/// activation gate, then running the per-variant handler. Returns any
/// virtual operations the handler emitted (market fills, settlements).
pub fn apply_operation(db: &mut Database, op: &Operation, now: Timestamp) -> ChainResult<Vec<VirtualOperation>> {
    if let Some(activation) = op.activation_time() {
        if now < activation {
            return Err(ChainError::HardforkNotActive {
                operation: operation_name(op),
                chain_time: now,
                activation_time: activation,
            });
        }
    }
    charge_fee(db, op)?;
    match op {
        Operation::Transfer(t) => apply_transfer(db, t),
        Operation::AccountCreate(c) => apply_account_create(db, c),
        Operation::AccountUpdate(u) => apply_account_update(db, u),
        Operation::AccountWhitelist(w) => apply_account_whitelist(db, w),
        Operation::AssetCreate(c) => apply_asset_create(db, c),
        Operation::AssetUpdate(u) => apply_asset_update(db, u),
        Operation::AssetUpdateBitasset(u) => apply_asset_update_bitasset(db, u),
        Operation::AssetPublishFeed(p) => apply_asset_publish_feed(db, p, now),
        Operation::AssetIssue(i) => apply_asset_issue(db, i),
        Operation::AssetReserve(r) => apply_asset_reserve(db, r),
        Operation::AssetFundFeePool(f) => apply_asset_fund_fee_pool(db, f),
        Operation::AssetSettle(s) => apply_asset_settle(db, s, now),
        Operation::AssetGlobalSettle(g) => apply_asset_global_settle(db, g),
        Operation::LimitOrderCreate(c) => apply_limit_order_create(db, c),
        Operation::LimitOrderCancel(c) => apply_limit_order_cancel(db, c),
        Operation::CallOrderUpdate(c) => apply_call_order_update(db, c),
        Operation::BidCollateral(b) => apply_bid_collateral(db, b),
        Operation::WitnessCreate(w) => apply_witness_create(db, w),
        Operation::WitnessUpdate(w) => apply_witness_update(db, w),
        Operation::CommitteeMemberCreate(c) => apply_committee_member_create(db, c),
        Operation::CommitteeMemberUpdate(c) => apply_committee_member_update(db, c),
        Operation::WorkerCreate(w) => apply_worker_create(db, w, now),
        Operation::ProposalCreate(p) => proposal_engine::create(db, p, now),
        Operation::ProposalUpdate(p) => proposal_engine::update(db, p, now),
        Operation::ProposalDelete(d) => proposal_engine::delete(db, d),
    }
}

fn operation_name(op: &Operation) -> &'static str {
    match op {
        Operation::Transfer(_) => "transfer",
        Operation::AccountCreate(_) => "account_create",
        Operation::AccountUpdate(_) => "account_update",
        Operation::AccountWhitelist(_) => "account_whitelist",
        Operation::AssetCreate(_) => "asset_create",
        Operation::AssetUpdate(_) => "asset_update",
        Operation::AssetUpdateBitasset(_) => "asset_update_bitasset",
        Operation::AssetPublishFeed(_) => "asset_publish_feed",
        Operation::AssetIssue(_) => "asset_issue",
        Operation::AssetReserve(_) => "asset_reserve",
        Operation::AssetFundFeePool(_) => "asset_fund_fee_pool",
        Operation::AssetSettle(_) => "asset_settle",
        Operation::AssetGlobalSettle(_) => "asset_global_settle",
        Operation::LimitOrderCreate(_) => "limit_order_create",
        Operation::LimitOrderCancel(_) => "limit_order_cancel",
        Operation::CallOrderUpdate(_) => "call_order_update",
        Operation::BidCollateral(_) => "bid_collateral",
        Operation::WitnessCreate(_) => "witness_create",
        Operation::WitnessUpdate(_) => "witness_update",
        Operation::CommitteeMemberCreate(_) => "committee_member_create",
        Operation::CommitteeMemberUpdate(_) => "committee_member_update",
        Operation::WorkerCreate(_) => "worker_create",
        Operation::ProposalCreate(_) => "proposal_create",
        Operation::ProposalUpdate(_) => "proposal_update",
        Operation::ProposalDelete(_) => "proposal_delete",
    }
}

/// How many bytes of `op`'s variable-length fields count toward the
/// schedule's per-kilobyte data fee (§6.4).
pub(crate) fn variable_data_len(op: &Operation) -> usize {
    match op {
        Operation::Transfer(t) => t.memo.as_ref().map(|m| m.len()).unwrap_or(0),
        Operation::AccountCreate(c) => c.name.len(),
        Operation::AssetCreate(c) => c.common_options.description.len(),
        Operation::AssetUpdate(u) => u.new_options.description.len(),
        Operation::AssetIssue(i) => i.memo.as_ref().map(|m| m.len()).unwrap_or(0),
        Operation::WitnessCreate(w) => w.url.len(),
        Operation::WitnessUpdate(w) => w.new_url.as_ref().map(|s| s.len()).unwrap_or(0),
        Operation::CommitteeMemberCreate(c) => c.url.len(),
        Operation::CommitteeMemberUpdate(c) => c.new_url.as_ref().map(|s| s.len()).unwrap_or(0),
        Operation::WorkerCreate(w) => w.name.len(),
        Operation::ProposalCreate(p) => bincode::serialize(&p.proposed_ops).map(|b| b.len()).unwrap_or(0),
        Operation::ProposalUpdate(p) => {
            (p.active_approvals_to_add.len() + p.owner_approvals_to_add.len() + p.key_approvals_to_add.len()) * 33
        }
        _ => 0,
    }
}

/// §4.2 "Fee accounting": debits the fee asset from the payer, routes it
/// into `accumulated_fees`, and — for non-core fee assets — draws the
/// `core_exchange_rate`-converted equivalent out of the asset's fee pool
/// into the core asset's accumulated fees (the pool the maintenance loop's
/// budget computation later draws network/referrer/registrar shares from).
fn charge_fee(db: &mut Database, op: &Operation) -> ChainResult<()> {
    let fee = *op.fee();
    let payer = op.fee_payer();
    let required = db.fee_schedule().calculate_fee(op, variable_data_len(op));
    if fee.amount < required {
        return Err(ChainError::InvalidOperation(format!(
            "declared fee {} is below the required fee {}",
            fee.amount, required
        )));
    }
    if payer != TEMP_ACCOUNT {
        db.adjust_balance(payer, fee.asset_id, -fee.amount)?;
    }
    if fee.asset_id == CORE_ASSET {
        credit_core_accumulated_fees(db, fee.amount)?;
    } else if let Some(asset) = db.assets.find(fee.asset_id.raw.instance).cloned() {
        let dd = asset.dynamic_data_id.raw.instance;
        db.asset_dynamic_data
            .modify(dd, |d: &mut AssetDynamicData| d.accumulated_fees += fee.amount)
            .map_err(|e| ChainError::Storage(e.to_string()))?;
        let core_equivalent = asset.options.core_exchange_rate.multiply(fee.amount).max(0);
        let available = db.asset_dynamic_data.find(dd).map(|d| d.fee_pool).unwrap_or(0);
        let drawn = core_equivalent.min(available);
        if drawn > 0 {
            db.asset_dynamic_data
                .modify(dd, |d: &mut AssetDynamicData| d.fee_pool -= drawn)
                .map_err(|e| ChainError::Storage(e.to_string()))?;
            credit_core_accumulated_fees(db, drawn)?;
        }
    }
    if payer != TEMP_ACCOUNT {
        let stats = db.statistics_instance(payer);
        db.account_statistics
            .modify(stats, |s| {
                s.lifetime_fees_paid += fee.amount;
                s.pending_fees += fee.amount;
                s.total_ops += 1;
            })
            .map_err(|e| ChainError::Storage(e.to_string()))?;
    }
    Ok(())
}

fn credit_core_accumulated_fees(db: &mut Database, amount: i64) -> ChainResult<()> {
    if amount <= 0 {
        return Ok(());
    }
    if let Some(core) = db.assets.find(CORE_ASSET.raw.instance).cloned() {
        db.asset_dynamic_data
            .modify(core.dynamic_data_id.raw.instance, |d| d.accumulated_fees += amount)
            .map_err(|e| ChainError::Storage(e.to_string()))?;
    }
    Ok(())
}

/// §4.3.2-4.3.4's single re-entry point for margin calls, layered above
/// `market::check_call_orders`: if the loop stalls because the
/// least-collateralized remaining position still sits below the
/// maintenance trigger, that position cannot be saved by any resting
/// counterparty and the market is declared globally settled (§4.3.5).
pub(crate) fn run_margin_calls(db: &mut Database, asset: AssetId) -> ChainResult<Vec<VirtualOperation>> {
    let ops = market::check_call_orders(db, asset)?;
    let Some(asset_row) = db.assets.find(asset.raw.instance).cloned() else { return Ok(ops) };
    let Some(bitasset_id) = asset_row.bitasset_data_id else { return Ok(ops) };
    let Some(bitasset) = db.asset_bitasset_data.find(bitasset_id.raw.instance).cloned() else { return Ok(ops) };
    if bitasset.has_settlement() {
        return Ok(ops);
    }
    let Some(feed) = bitasset.current_feed.clone() else { return Ok(ops) };
    let trigger = feed.maintenance_collateralization();
    let Some((_, call_id)) = db.call_order_books.get(&asset).and_then(|idx| idx.ascending().next()).copied() else {
        return Ok(ops);
    };
    let Some(call) = db.call_orders.find(call_id.raw.instance).cloned() else { return Ok(ops) };
    if call.call_price.less_than(&trigger) {
        let settlement_price = Price::new(call.collateral, call.debt);
        market::apply_global_settlement(db, asset, settlement_price)?;
    }
    Ok(ops)
}

fn apply_transfer(db: &mut Database, t: &solstice_core::operations::TransferOp) -> ChainResult<Vec<VirtualOperation>> {
    check_whitelist(db, t.amount.asset_id, t.from)?;
    check_whitelist(db, t.amount.asset_id, t.to)?;
    db.adjust_balance(t.from, t.amount.asset_id, -t.amount.amount)?;
    db.adjust_balance(t.to, t.amount.asset_id, t.amount.amount)?;
    Ok(vec![])
}

/// §8 invariant S5 — a `white_list`-flagged asset only moves between
/// accounts present in its `whitelisted_accounts` and absent from
/// `blacklisted_accounts`. The core (fee-paying, TEMP) account is exempt so
/// genesis and system operations never need to pre-whitelist themselves.
fn check_whitelist(db: &Database, asset_id: AssetId, account: AccountId) -> ChainResult<()> {
    if account == TEMP_ACCOUNT {
        return Ok(());
    }
    let Some(asset) = db.assets.find(asset_id.raw.instance) else { return Ok(()) };
    if !asset.options.is_flag_set(asset_flags::WHITE_LIST) {
        return Ok(());
    }
    let Some(acct) = db.accounts.find(account.raw.instance) else { return Ok(()) };
    if acct.blacklisted_accounts.iter().any(|a| asset.options.blacklist_authorities.contains(a)) {
        return Err(ChainError::Blacklisted(account.raw, asset_id.raw));
    }
    if !acct.whitelisted_accounts.iter().any(|a| asset.options.whitelist_authorities.contains(a)) {
        return Err(ChainError::NotWhitelisted(account.raw, asset_id.raw));
    }
    Ok(())
}

fn apply_account_create(
    db: &mut Database,
    c: &solstice_core::operations::AccountCreateOp,
) -> ChainResult<Vec<VirtualOperation>> {
    if !solstice_core::account::is_valid_account_name(&c.name) {
        return Err(ChainError::InvalidAccountName(c.name.clone()));
    }
    if db.account_names.contains_key(&c.name) {
        return Err(ChainError::InvalidOperation(format!("account name {:?} already taken", c.name)));
    }
    if !c.owner.is_satisfiable() || !c.active.is_satisfiable() {
        return Err(ChainError::UnsatisfiableAuthority {
            threshold: c.owner.weight_threshold.max(c.active.weight_threshold),
            available: c.owner.total_weight().min(c.active.total_weight()),
        });
    }
    if c.referrer_percent as u32 > solstice_core::constants::GRAPHENE_100_PERCENT as u32 {
        return Err(ChainError::InvalidOperation("referrer_percent exceeds 100%".into()));
    }

    let stats_instance = db.account_statistics.create(|i| solstice_core::impl_entities::AccountStatistics {
        id: Some(Id::from_instance(Space::Implementation, ObjectType::AccountStatistics, i)),
        owner: None,
        ..Default::default()
    });
    let referrer = db.accounts.find(c.referrer.raw.instance).cloned();
    let lifetime_referrer = referrer
        .as_ref()
        .map(|r| if r.is_lifetime_member() { r.id } else { r.lifetime_referrer })
        .unwrap_or(c.referrer);

    let account_id = db.accounts.create(|i| Account {
        id: Id::from_instance(Space::Protocol, ObjectType::Account, i),
        name: c.name.clone(),
        owner: c.owner.clone(),
        active: c.active.clone(),
        options: c.options.clone(),
        registrar: c.registrar,
        referrer: c.referrer,
        lifetime_referrer,
        referrer_rewards_percentage: c.referrer_percent,
        network_fee_percentage: solstice_core::constants::GRAPHENE_100_PERCENT / 100,
        membership_expiration_date: 0,
        statistics: Id::from_instance(Space::Implementation, ObjectType::AccountStatistics, stats_instance),
        whitelisting_accounts: Default::default(),
        blacklisting_accounts: Default::default(),
        whitelisted_accounts: Default::default(),
        blacklisted_accounts: Default::default(),
    });
    db.account_statistics
        .modify(stats_instance, |s| s.owner = Some(Id::from_instance(Space::Protocol, ObjectType::Account, account_id)))
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    let id: AccountId = Id::from_instance(Space::Protocol, ObjectType::Account, account_id);
    db.account_names.insert(c.name.clone(), id);

    let registrar_stats = db.statistics_instance(c.registrar);
    db.account_statistics
        .modify(registrar_stats, |_| {})
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    Ok(vec![])
}

fn apply_account_update(
    db: &mut Database,
    u: &solstice_core::operations::AccountUpdateOp,
) -> ChainResult<Vec<VirtualOperation>> {
    if let Some(owner) = &u.owner {
        if !owner.is_satisfiable() {
            return Err(ChainError::UnsatisfiableAuthority {
                threshold: owner.weight_threshold,
                available: owner.total_weight(),
            });
        }
    }
    if let Some(active) = &u.active {
        if !active.is_satisfiable() {
            return Err(ChainError::UnsatisfiableAuthority {
                threshold: active.weight_threshold,
                available: active.total_weight(),
            });
        }
    }
    db.accounts
        .modify(u.account.raw.instance, |a| {
            if let Some(owner) = &u.owner {
                a.owner = owner.clone();
            }
            if let Some(active) = &u.active {
                a.active = active.clone();
            }
            if let Some(options) = &u.new_options {
                a.options = options.clone();
            }
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    Ok(vec![])
}

fn apply_account_whitelist(
    db: &mut Database,
    w: &solstice_core::operations::AccountWhitelistOp,
) -> ChainResult<Vec<VirtualOperation>> {
    db.accounts
        .modify(w.account_to_list.raw.instance, |a| {
            if w.new_listing & account_whitelist_flags::WHITE_LISTED != 0 {
                a.whitelisted_accounts.insert(w.authorizing_account);
            } else {
                a.whitelisted_accounts.remove(&w.authorizing_account);
            }
            if w.new_listing & account_whitelist_flags::BLACK_LISTED != 0 {
                a.blacklisted_accounts.insert(w.authorizing_account);
            } else {
                a.blacklisted_accounts.remove(&w.authorizing_account);
            }
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    db.accounts
        .modify(w.authorizing_account.raw.instance, |a| {
            a.whitelisting_accounts.insert(w.account_to_list);
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    Ok(vec![])
}

fn apply_asset_create(db: &mut Database, c: &solstice_core::operations::AssetCreateOp) -> ChainResult<Vec<VirtualOperation>> {
    if !solstice_core::asset::is_valid_asset_symbol(&c.symbol) {
        return Err(ChainError::InvalidAssetSymbol(c.symbol.clone()));
    }
    if c.precision > solstice_core::constants::MAX_ASSET_PRECISION {
        return Err(ChainError::InvalidOperation("precision exceeds maximum".into()));
    }
    if !c.common_options.flags_subset_of_permissions() {
        return Err(ChainError::FlagNotPermitted {
            flag: c.common_options.flags,
            permissions: c.common_options.issuer_permissions,
        });
    }

    let dd_instance = db.asset_dynamic_data.create(|i| AssetDynamicData {
        id: Id::from_instance(Space::Implementation, ObjectType::AssetDynamicData, i),
        current_supply: 0,
        accumulated_fees: 0,
        fee_pool: 0,
    });

    let bitasset_data_id = if let Some(bitasset_opts) = &c.bitasset_opts {
        if bitasset_opts.force_settlement_offset_percent as u32 > solstice_core::constants::GRAPHENE_100_PERCENT as u32 {
            return Err(ChainError::InvalidOperation("force_settlement_offset_percent out of range".into()));
        }
        let instance = db.asset_bitasset_data.create(|i| AssetBitAssetData {
            id: Id::from_instance(Space::Implementation, ObjectType::AssetBitAssetData, i),
            asset_id: Id::from_instance(Space::Protocol, ObjectType::Asset, 0),
            feeds: Default::default(),
            current_feed: None,
            current_feed_publication_time: 0,
            settlement_price: None,
            settlement_fund: 0,
            force_settled_volume: 0,
            is_prediction_market: c.is_prediction_market,
        });
        Some(instance)
    } else {
        if c.common_options.is_flag_set(asset_flags::DISABLE_FORCE_SETTLE)
            || c.common_options.is_flag_set(asset_flags::GLOBAL_SETTLE)
        {
            return Err(ChainError::InvalidOperation("UIA may not set bitasset-only flags".into()));
        }
        None
    };

    let asset_instance = db.assets.create(|i| Asset {
        id: Id::from_instance(Space::Protocol, ObjectType::Asset, i),
        symbol: c.symbol.clone(),
        precision: c.precision,
        issuer: c.issuer,
        options: c.common_options.clone(),
        bitasset_data_id: bitasset_data_id.map(|inst| Id::from_instance(Space::Implementation, ObjectType::AssetBitAssetData, inst)),
        bitasset_options: c.bitasset_opts.clone(),
        dynamic_data_id: Id::from_instance(Space::Implementation, ObjectType::AssetDynamicData, dd_instance),
    });
    if let Some(bd_instance) = bitasset_data_id {
        let asset_id: AssetId = Id::from_instance(Space::Protocol, ObjectType::Asset, asset_instance);
        db.asset_bitasset_data
            .modify(bd_instance, |b| b.asset_id = asset_id)
            .map_err(|e| ChainError::Storage(e.to_string()))?;
    }
    Ok(vec![])
}

fn apply_asset_update(db: &mut Database, u: &solstice_core::operations::AssetUpdateOp) -> ChainResult<Vec<VirtualOperation>> {
    let asset = db
        .assets
        .find(u.asset_to_update.raw.instance)
        .cloned()
        .ok_or(ChainError::ObjectNotFound(u.asset_to_update.raw))?;
    if asset.issuer != u.issuer {
        return Err(ChainError::MissingSignature(u.issuer.raw));
    }
    if !u.new_options.flags_subset_of_permissions() {
        return Err(ChainError::FlagNotPermitted {
            flag: u.new_options.flags,
            permissions: u.new_options.issuer_permissions,
        });
    }
    db.assets
        .modify(u.asset_to_update.raw.instance, |a| a.options = u.new_options.clone())
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    Ok(vec![])
}

fn apply_asset_update_bitasset(
    db: &mut Database,
    u: &solstice_core::operations::AssetUpdateBitassetOp,
) -> ChainResult<Vec<VirtualOperation>> {
    let asset = db
        .assets
        .find(u.asset_to_update.raw.instance)
        .cloned()
        .ok_or(ChainError::ObjectNotFound(u.asset_to_update.raw))?;
    if asset.issuer != u.issuer {
        return Err(ChainError::MissingSignature(u.issuer.raw));
    }
    let bitasset_id = asset
        .bitasset_data_id
        .ok_or_else(|| ChainError::InvalidOperation("asset is not market-issued".into()))?;
    if u.new_options.feed_lifetime_sec == 0 {
        return Err(ChainError::InvalidOperation("feed_lifetime_sec must be positive".into()));
    }
    db.assets
        .modify(u.asset_to_update.raw.instance, |a| a.bitasset_options = Some(u.new_options.clone()))
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    let _ = bitasset_id;
    Ok(vec![])
}

fn apply_asset_publish_feed(
    db: &mut Database,
    p: &solstice_core::operations::AssetPublishFeedOp,
    now: Timestamp,
) -> ChainResult<Vec<VirtualOperation>> {
    if p.feed.maintenance_collateral_ratio < solstice_core::constants::MIN_COLLATERAL_RATIO {
        return Err(ChainError::InvalidOperation("MCR below minimum".into()));
    }
    if p.feed.maximum_short_squeeze_ratio < solstice_core::constants::MIN_MSSR {
        return Err(ChainError::InvalidOperation("MSSR below minimum".into()));
    }
    feed::publish_feed(db, p.asset_id, p.publisher, p.feed.clone(), now)
}

fn apply_asset_issue(db: &mut Database, i: &solstice_core::operations::AssetIssueOp) -> ChainResult<Vec<VirtualOperation>> {
    let asset = db
        .assets
        .find(i.asset_to_issue.asset_id.raw.instance)
        .cloned()
        .ok_or(ChainError::ObjectNotFound(i.asset_to_issue.asset_id.raw))?;
    if asset.issuer != i.issuer {
        return Err(ChainError::MissingSignature(i.issuer.raw));
    }
    if asset.is_market_issued() {
        return Err(ChainError::InvalidOperation("market-issued assets cannot be issued directly".into()));
    }
    let dd = asset.dynamic_data_id.raw.instance;
    let current_supply = db.asset_dynamic_data.find(dd).map(|d| d.current_supply).unwrap_or(0);
    if current_supply + i.asset_to_issue.amount > asset.options.max_supply {
        return Err(ChainError::InvalidOperation("issuance exceeds max_supply".into()));
    }
    db.asset_dynamic_data
        .modify(dd, |d| d.current_supply += i.asset_to_issue.amount)
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    check_whitelist(db, i.asset_to_issue.asset_id, i.issue_to_account)?;
    db.adjust_balance(i.issue_to_account, i.asset_to_issue.asset_id, i.asset_to_issue.amount)?;
    Ok(vec![])
}

fn apply_asset_reserve(db: &mut Database, r: &solstice_core::operations::AssetReserveOp) -> ChainResult<Vec<VirtualOperation>> {
    let asset = db
        .assets
        .find(r.amount_to_reserve.asset_id.raw.instance)
        .cloned()
        .ok_or(ChainError::ObjectNotFound(r.amount_to_reserve.asset_id.raw))?;
    db.adjust_balance(r.payer, r.amount_to_reserve.asset_id, -r.amount_to_reserve.amount)?;
    db.asset_dynamic_data
        .modify(asset.dynamic_data_id.raw.instance, |d| d.current_supply -= r.amount_to_reserve.amount)
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    Ok(vec![])
}

fn apply_asset_fund_fee_pool(
    db: &mut Database,
    f: &solstice_core::operations::AssetFundFeePoolOp,
) -> ChainResult<Vec<VirtualOperation>> {
    let asset = db.assets.find(f.asset_id.raw.instance).cloned().ok_or(ChainError::ObjectNotFound(f.asset_id.raw))?;
    db.adjust_balance(f.from_account, CORE_ASSET, -f.amount)?;
    db.asset_dynamic_data
        .modify(asset.dynamic_data_id.raw.instance, |d| d.fee_pool += f.amount)
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    Ok(vec![])
}

fn apply_asset_settle(
    db: &mut Database,
    s: &solstice_core::operations::AssetSettleOp,
    now: Timestamp,
) -> ChainResult<Vec<VirtualOperation>> {
    let asset = db
        .assets
        .find(s.amount.asset_id.raw.instance)
        .cloned()
        .ok_or(ChainError::ObjectNotFound(s.amount.asset_id.raw))?;
    let bitasset_id = asset
        .bitasset_data_id
        .ok_or_else(|| ChainError::InvalidOperation("asset is not market-issued".into()))?;
    let bitasset = db
        .asset_bitasset_data
        .find(bitasset_id.raw.instance)
        .cloned()
        .ok_or_else(|| ChainError::InvariantViolation("bitasset data missing".into()))?;

    // Once a market has gone through global settlement, asset_settle stops
    // queuing a delayed entry and instead redeems immediately out of the
    // frozen settlement_fund at the settlement_price recorded at that time.
    if let Some(settlement_price) = bitasset.settlement_price {
        let payout_amount = settlement_price.multiply(s.amount.amount).min(bitasset.settlement_fund).max(0);
        let payout = AssetAmount::new(settlement_price.base.asset_id, payout_amount);
        db.adjust_balance(s.account, s.amount.asset_id, -s.amount.amount)?;
        db.adjust_balance(s.account, payout.asset_id, payout.amount)?;
        db.asset_dynamic_data
            .modify(asset.dynamic_data_id.raw.instance, |d| d.current_supply -= s.amount.amount)
            .map_err(|e| ChainError::Storage(e.to_string()))?;
        db.asset_bitasset_data
            .modify(bitasset_id.raw.instance, |b| b.settlement_fund -= payout.amount)
            .map_err(|e| ChainError::Storage(e.to_string()))?;
        return Ok(vec![VirtualOperation::FillOrder {
            order_id: bitasset_id.raw,
            account_id: s.account,
            pays: s.amount,
            receives: payout,
            fee: AssetAmount::new(payout.asset_id, 0),
            is_maker: false,
        }]);
    }

    if asset.options.is_flag_set(asset_flags::DISABLE_FORCE_SETTLE) {
        return Err(ChainError::InvalidOperation("forced settlement disabled for this asset".into()));
    }
    let bitasset_options = asset
        .bitasset_options
        .clone()
        .ok_or_else(|| ChainError::InvariantViolation("bitasset options missing".into()))?;

    // §4.3.6 per-interval volume cap: at most
    // maximum_force_settlement_volume/GRAPHENE_100_PERCENT of current supply
    // may force-settle between two maintenance intervals.
    let current_supply = db
        .asset_dynamic_data
        .find(asset.dynamic_data_id.raw.instance)
        .map(|d| d.current_supply)
        .unwrap_or(0);
    let max_volume = (current_supply as i128 * bitasset_options.maximum_force_settlement_volume as i128
        / solstice_core::constants::GRAPHENE_100_PERCENT as i128) as i64;
    if bitasset.force_settled_volume.saturating_add(s.amount.amount) > max_volume {
        return Err(ChainError::InvalidOperation("force settlement volume cap exceeded for this interval".into()));
    }

    // The bitasset balance leaves the holder's account now, but current_supply
    // is only retired once process_force_settlements matures this entry and
    // actually extinguishes the debt against collateral — decrementing it
    // here too would burn the same units twice.
    db.adjust_balance(s.account, s.amount.asset_id, -s.amount.amount)?;
    db.asset_bitasset_data
        .modify(bitasset_id.raw.instance, |b| b.force_settled_volume += s.amount.amount)
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    let scheduled_time = now + bitasset_options.force_settlement_delay_sec as i64;
    let settlement_id = db.force_settlements.create(|i| ForceSettlement {
        id: Id::from_instance(Space::Protocol, ObjectType::ForceSettlement, i),
        owner: s.account,
        balance: s.amount,
        settlement_date: scheduled_time,
    });
    let id: solstice_core::ForceSettlementId = Id::from_instance(Space::Protocol, ObjectType::ForceSettlement, settlement_id);
    db.settlement_queues.entry(s.amount.asset_id).or_default().insert(scheduled_time, id);
    Ok(vec![])
}

fn apply_asset_global_settle(
    db: &mut Database,
    g: &solstice_core::operations::AssetGlobalSettleOp,
) -> ChainResult<Vec<VirtualOperation>> {
    let asset = db
        .assets
        .find(g.asset_to_settle.raw.instance)
        .cloned()
        .ok_or(ChainError::ObjectNotFound(g.asset_to_settle.raw))?;
    if asset.issuer != g.issuer {
        return Err(ChainError::MissingSignature(g.issuer.raw));
    }
    if !asset.options.is_permitted(asset_flags::GLOBAL_SETTLE) {
        return Err(ChainError::FlagNotPermitted {
            flag: asset_flags::GLOBAL_SETTLE,
            permissions: asset.options.issuer_permissions,
        });
    }
    market::apply_global_settlement(db, g.asset_to_settle, g.settle_price)?;
    Ok(vec![])
}

fn apply_limit_order_create(
    db: &mut Database,
    c: &solstice_core::operations::LimitOrderCreateOp,
) -> ChainResult<Vec<VirtualOperation>> {
    if c.amount_to_sell.amount <= 0 || c.min_to_receive.amount <= 0 {
        return Err(ChainError::InvalidOrderParams("amounts must be positive".into()));
    }
    db.adjust_balance(c.seller, c.amount_to_sell.asset_id, -c.amount_to_sell.amount)?;
    let sell_price = Price::new(c.min_to_receive, c.amount_to_sell);
    let order_instance = db.limit_orders.create(|i| LimitOrder {
        id: Id::from_instance(Space::Protocol, ObjectType::LimitOrder, i),
        seller: c.seller,
        for_sale: c.amount_to_sell,
        sell_price,
        expiration: c.expiration,
        deferred_fee: None,
        fill_or_kill: c.fill_or_kill,
    });
    let order_id: solstice_core::LimitOrderId = Id::from_instance(Space::Protocol, ObjectType::LimitOrder, order_instance);
    let order = db.limit_orders.find(order_instance).unwrap().clone();
    market::index_insert(db, &order);

    let mut virtual_ops = market::match_limit_order(db, order_id)?;

    if let Some(remaining) = db.limit_orders.find(order_instance).cloned() {
        if c.fill_or_kill {
            market::index_remove(db, &remaining);
            let removed = db.limit_orders.remove(order_instance).map_err(|e| ChainError::Storage(e.to_string()))?;
            db.adjust_balance(removed.seller, removed.for_sale.asset_id, removed.for_sale.amount)?;
            return Err(ChainError::InvalidOrderParams("fill-or-kill order not fully filled".into()));
        }
    }

    let market_assets = sell_price.market();
    for asset_id in [market_assets.0, market_assets.1] {
        if db.assets.find(asset_id.raw.instance).map(|a| a.is_market_issued()).unwrap_or(false) {
            virtual_ops.extend(run_margin_calls(db, asset_id)?);
        }
    }
    Ok(virtual_ops)
}

fn apply_limit_order_cancel(
    db: &mut Database,
    c: &solstice_core::operations::LimitOrderCancelOp,
) -> ChainResult<Vec<VirtualOperation>> {
    let order = db
        .limit_orders
        .find(c.order.raw.instance)
        .cloned()
        .ok_or(ChainError::ObjectNotFound(c.order.raw))?;
    if order.seller != c.fee_paying_account {
        return Err(ChainError::MissingSignature(c.fee_paying_account.raw));
    }
    market::index_remove(db, &order);
    db.limit_orders.remove(c.order.raw.instance).map_err(|e| ChainError::Storage(e.to_string()))?;
    db.adjust_balance(order.seller, order.for_sale.asset_id, order.for_sale.amount)?;
    if let Some(fee) = order.deferred_fee {
        db.adjust_balance(order.seller, fee.asset_id, fee.amount)?;
    }
    Ok(vec![])
}

fn apply_call_order_update(
    db: &mut Database,
    c: &solstice_core::operations::CallOrderUpdateOp,
) -> ChainResult<Vec<VirtualOperation>> {
    let debt_asset_id = c.delta_debt.asset_id;
    let asset = db.assets.find(debt_asset_id.raw.instance).cloned().ok_or(ChainError::ObjectNotFound(debt_asset_id.raw))?;
    let bitasset_id = asset
        .bitasset_data_id
        .ok_or_else(|| ChainError::InvalidOperation("asset is not market-issued".into()))?;
    let bitasset = db
        .asset_bitasset_data
        .find(bitasset_id.raw.instance)
        .cloned()
        .ok_or_else(|| ChainError::InvariantViolation("bitasset data missing".into()))?;
    if bitasset.has_settlement() {
        return Err(ChainError::AlreadySettled(debt_asset_id.raw));
    }

    let existing = db
        .call_order_books
        .get(&debt_asset_id)
        .into_iter()
        .flat_map(|idx| idx.ascending())
        .map(|(_, id)| *id)
        .filter_map(|id| db.call_orders.find(id.raw.instance).cloned().map(|o| (id, o)))
        .find(|(_, order)| order.borrower == c.funding_account);

    db.adjust_balance(c.funding_account, c.delta_collateral.asset_id, -c.delta_collateral.amount)?;
    db.adjust_balance(c.funding_account, debt_asset_id, c.delta_debt.amount)?;

    let (call_id, old_key, new_debt, new_collateral) = if let Some((id, order)) = existing {
        let old_key = crate::market::PriceKey::from_price(&order.call_price);
        let new_debt = order.debt.amount + c.delta_debt.amount;
        let new_collateral = order.collateral.amount + c.delta_collateral.amount;
        (Some(id), Some(old_key), new_debt, new_collateral)
    } else {
        (None, None, c.delta_debt.amount, c.delta_collateral.amount)
    };

    if new_debt < 0 || new_collateral < 0 {
        return Err(ChainError::InvalidOrderParams("resulting debt/collateral negative".into()));
    }

    let call_price = if new_debt == 0 {
        Price::new(AssetAmount::new(c.delta_collateral.asset_id, 1), AssetAmount::new(debt_asset_id, 0))
    } else {
        let mcr = bitasset
            .current_feed
            .as_ref()
            .map(|f| f.maintenance_collateral_ratio)
            .unwrap_or(solstice_core::constants::MIN_COLLATERAL_RATIO);
        Price::new(
            AssetAmount::new(
                c.delta_collateral.asset_id,
                (new_collateral as i128 * solstice_core::constants::COLLATERAL_RATIO_DENOM as i128 / mcr as i128) as i64,
            ),
            AssetAmount::new(debt_asset_id, new_debt),
        )
    };

    if let Some(feed) = bitasset.current_feed.as_ref() {
        if c.target_collateral_ratio.is_none() {
            let mcr_ratio = if new_debt == 0 {
                u64::MAX
            } else {
                ((new_collateral as i128 * solstice_core::constants::COLLATERAL_RATIO_DENOM as i128) / new_debt as i128) as u64
            };
            if (mcr_ratio as u64) < feed.maintenance_collateral_ratio as u64 {
                return Err(ChainError::InsufficientCollateral);
            }
        }
    }

    if new_debt == 0 {
        if let Some(id) = call_id {
            if let Some(key) = old_key {
                if let Some(idx) = db.call_order_books.get_mut(&debt_asset_id) {
                    idx.remove(key, id);
                }
            }
            let removed = db.call_orders.remove(id.raw.instance).map_err(|e| ChainError::Storage(e.to_string()))?;
            db.adjust_balance(removed.borrower, removed.collateral.asset_id, removed.collateral.amount)?;
        }
        return Ok(vec![]);
    }

    let new_key = crate::market::PriceKey::from_price(&call_price);
    match (call_id, old_key) {
        (Some(id), Some(old_key)) => {
            db.call_orders
                .modify(id.raw.instance, |o| {
                    o.debt.amount = new_debt;
                    o.collateral.amount = new_collateral;
                    o.call_price = call_price;
                    o.target_collateral_ratio = c.target_collateral_ratio;
                })
                .map_err(|e| ChainError::Storage(e.to_string()))?;
            if let Some(idx) = db.call_order_books.get_mut(&debt_asset_id) {
                idx.rekey(old_key, new_key, id);
            }
        }
        _ => {
            let instance = db.call_orders.create(|i| CallOrder {
                id: Id::from_instance(Space::Protocol, ObjectType::CallOrder, i),
                borrower: c.funding_account,
                debt: AssetAmount::new(debt_asset_id, new_debt),
                collateral: AssetAmount::new(c.delta_collateral.asset_id, new_collateral),
                call_price,
                target_collateral_ratio: c.target_collateral_ratio,
            });
            let id: solstice_core::CallOrderId = Id::from_instance(Space::Protocol, ObjectType::CallOrder, instance);
            db.call_order_books.entry(debt_asset_id).or_default().insert(new_key, id);
        }
    }

    run_margin_calls(db, debt_asset_id)
}

fn apply_bid_collateral(db: &mut Database, b: &solstice_core::operations::BidCollateralOp) -> ChainResult<Vec<VirtualOperation>> {
    let asset = db
        .assets
        .find(b.debt_covered.asset_id.raw.instance)
        .cloned()
        .ok_or(ChainError::ObjectNotFound(b.debt_covered.asset_id.raw))?;
    let bitasset_id = asset
        .bitasset_data_id
        .ok_or_else(|| ChainError::InvalidOperation("asset is not market-issued".into()))?;
    let bitasset = db
        .asset_bitasset_data
        .find(bitasset_id.raw.instance)
        .cloned()
        .ok_or_else(|| ChainError::InvariantViolation("bitasset data missing".into()))?;
    if !bitasset.has_settlement() {
        return Err(ChainError::NotSettled(b.debt_covered.asset_id.raw));
    }
    db.adjust_balance(b.bidder, b.additional_collateral.asset_id, -b.additional_collateral.amount)?;
    let inv_swan_price = Price::new(
        AssetAmount::new(b.debt_covered.asset_id, b.debt_covered.amount),
        AssetAmount::new(b.additional_collateral.asset_id, b.additional_collateral.amount),
    );
    let instance = db.collateral_bids.create(|i| CollateralBid {
        id: Id::from_instance(Space::Protocol, ObjectType::CollateralBid, i),
        bidder: b.bidder,
        inv_swan_price,
        additional_collateral: b.additional_collateral.amount,
        debt_covered: b.debt_covered.amount,
    });
    let id: solstice_core::CollateralBidId = Id::from_instance(Space::Protocol, ObjectType::CollateralBid, instance);
    let key = crate::market::PriceKey::from_price(&inv_swan_price);
    db.collateral_bid_books.entry(b.debt_covered.asset_id).or_default().insert(key, id);
    Ok(vec![])
}

fn apply_witness_create(db: &mut Database, w: &solstice_core::operations::WitnessCreateOp) -> ChainResult<Vec<VirtualOperation>> {
    let instance = db.witnesses.next_instance_peek();
    let vote_id = solstice_core::VoteId::new(solstice_core::VoteType::Witness, instance as u32);
    db.witnesses.create(|i| solstice_core::Witness {
        id: Id::from_instance(Space::Protocol, ObjectType::Witness, i),
        witness_account: w.witness_account,
        vote_id,
        total_votes: 0,
        signing_key: w.block_signing_key.clone(),
        last_secret_hash: [0u8; 32],
        total_missed: 0,
    });
    db.accounts
        .modify(w.witness_account.raw.instance, |a| {
            a.options.votes.insert(vote_id);
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    Ok(vec![])
}

fn apply_witness_update(db: &mut Database, w: &solstice_core::operations::WitnessUpdateOp) -> ChainResult<Vec<VirtualOperation>> {
    let witness = db.witnesses.find(w.witness.raw.instance).cloned().ok_or(ChainError::ObjectNotFound(w.witness.raw))?;
    if witness.witness_account != w.witness_account {
        return Err(ChainError::MissingSignature(w.witness_account.raw));
    }
    db.witnesses
        .modify(w.witness.raw.instance, |witness| {
            if let Some(key) = &w.new_signing_key {
                witness.signing_key = key.clone();
            }
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    let _ = &w.new_url;
    Ok(vec![])
}

fn apply_committee_member_create(
    db: &mut Database,
    c: &solstice_core::operations::CommitteeMemberCreateOp,
) -> ChainResult<Vec<VirtualOperation>> {
    let instance = db.committee_members.next_instance_peek();
    let vote_id = solstice_core::VoteId::new(solstice_core::VoteType::Committee, instance as u32);
    db.committee_members.create(|i| solstice_core::witness::CommitteeMember {
        id: Id::from_instance(Space::Protocol, ObjectType::CommitteeMember, i),
        committee_member_account: c.committee_member_account,
        vote_id,
        total_votes: 0,
    });
    db.accounts
        .modify(c.committee_member_account.raw.instance, |a| {
            a.options.votes.insert(vote_id);
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    Ok(vec![])
}

fn apply_committee_member_update(
    db: &mut Database,
    c: &solstice_core::operations::CommitteeMemberUpdateOp,
) -> ChainResult<Vec<VirtualOperation>> {
    let member = db
        .committee_members
        .find(c.committee_member.raw.instance)
        .cloned()
        .ok_or(ChainError::ObjectNotFound(c.committee_member.raw))?;
    if member.committee_member_account != c.committee_member_account {
        return Err(ChainError::MissingSignature(c.committee_member_account.raw));
    }
    let _ = &c.new_url;
    Ok(vec![])
}

fn apply_worker_create(
    db: &mut Database,
    w: &solstice_core::operations::WorkerCreateOp,
    now: Timestamp,
) -> ChainResult<Vec<VirtualOperation>> {
    if w.begin_date >= w.end_date {
        return Err(ChainError::InvalidOperation("worker begin_date must precede end_date".into()));
    }
    if w.daily_pay <= 0 {
        return Err(ChainError::InvalidOperation("daily_pay must be positive".into()));
    }
    let instance = db.workers.next_instance_peek();
    let vote_id = solstice_core::VoteId::new(solstice_core::VoteType::Worker, instance as u32);
    db.workers.create(|i| solstice_core::Worker {
        id: Id::from_instance(Space::Protocol, ObjectType::Worker, i),
        worker_account: w.owner,
        vote_id,
        daily_pay: w.daily_pay,
        pay_asset: w.pay_asset,
        begin_date: w.begin_date,
        end_date: w.end_date,
        initializer: w.initializer.clone(),
        total_votes_for: 0,
        total_votes_against: 0,
    });
    let _ = now;
    Ok(vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use solstice_core::Authority;

    fn account(db: &mut Database, instance: u64) -> AccountId {
        let stats = db.account_statistics.create(|i| solstice_core::impl_entities::AccountStatistics {
            id: Some(Id::from_instance(Space::Implementation, ObjectType::AccountStatistics, i)),
            owner: None,
            ..Default::default()
        });
        let open = Authority { weight_threshold: 0, account_auths: vec![], key_auths: vec![], address_auths: vec![] };
        let id: AccountId = Id::from_instance(Space::Protocol, ObjectType::Account, instance);
        db.accounts.create(|_| Account {
            id,
            name: format!("acct{instance}"),
            owner: open.clone(),
            active: open,
            options: AccountOptions {
                memo_key: solstice_core::PublicKeyType([0u8; 33]),
                voting_account: None,
                num_witness: 0,
                num_committee: 0,
                votes: Default::default(),
            },
            registrar: id,
            referrer: id,
            lifetime_referrer: id,
            referrer_rewards_percentage: 0,
            network_fee_percentage: 0,
            membership_expiration_date: 0,
            statistics: Id::from_instance(Space::Implementation, ObjectType::AccountStatistics, stats),
            whitelisting_accounts: Default::default(),
            blacklisting_accounts: Default::default(),
            whitelisted_accounts: Default::default(),
            blacklisted_accounts: Default::default(),
        });
        id
    }

    fn white_listed_asset(db: &mut Database, instance: u64, issuer: AccountId, whitelist_authorities: Vec<AccountId>, blacklist_authorities: Vec<AccountId>) -> AssetId {
        let dd = db.asset_dynamic_data.create(|i| AssetDynamicData {
            id: Id::from_instance(Space::Implementation, ObjectType::AssetDynamicData, i),
            current_supply: 1_000_000,
            accumulated_fees: 0,
            fee_pool: 0,
        });
        let id: AssetId = Id::from_instance(Space::Protocol, ObjectType::Asset, instance);
        db.assets.create(|_| Asset {
            id,
            symbol: "WLASSET".to_string(),
            precision: 0,
            issuer,
            options: AssetOptions {
                max_supply: 1_000_000_000,
                market_fee_percent: 0,
                max_market_fee: 0,
                issuer_permissions: asset_flags::WHITE_LIST,
                flags: asset_flags::WHITE_LIST,
                core_exchange_rate: Price::new(AssetAmount::new(CORE_ASSET, 1), AssetAmount::new(id, 1)),
                whitelist_authorities,
                blacklist_authorities,
                whitelist_markets: vec![],
                blacklist_markets: vec![],
                description: String::new(),
            },
            bitasset_data_id: None,
            bitasset_options: None,
            dynamic_data_id: Id::from_instance(Space::Implementation, ObjectType::AssetDynamicData, dd),
        });
        id
    }

    /// Boundary scenario: a `white_list`-flagged asset only moves between
    /// accounts cleared by one of the asset's `whitelist_authorities` and
    /// absent from every `blacklist_authority`'s list. Blacklisting later
    /// blocks further transfers to the account without touching a balance
    /// it already holds — `asset_reserve` (burning one's own balance) has
    /// no whitelist/blacklist gate at all.
    #[test]
    fn whitelisted_transfer_succeeds_then_blacklisting_blocks_further_transfers() {
        let mut db = Database::new();
        let issuer = account(&mut db, 0);
        let nathan = account(&mut db, 1);
        let authority_x = account(&mut db, 2);
        let authority_y = account(&mut db, 3);
        let asset = white_listed_asset(&mut db, 1, issuer, vec![authority_x], vec![]);

        apply_account_whitelist(&mut db, &solstice_core::operations::AccountWhitelistOp {
            fee: AssetAmount::new(CORE_ASSET, 0),
            authorizing_account: authority_x,
            account_to_list: nathan,
            new_listing: account_whitelist_flags::WHITE_LISTED,
        })
        .unwrap();
        apply_account_whitelist(&mut db, &solstice_core::operations::AccountWhitelistOp {
            fee: AssetAmount::new(CORE_ASSET, 0),
            authorizing_account: authority_x,
            account_to_list: issuer,
            new_listing: account_whitelist_flags::WHITE_LISTED,
        })
        .unwrap();

        db.adjust_balance(issuer, asset, 1000).unwrap();
        apply_transfer(&mut db, &solstice_core::operations::TransferOp {
            fee: AssetAmount::new(CORE_ASSET, 0),
            from: issuer,
            to: nathan,
            amount: AssetAmount::new(asset, 1000),
            memo: None,
        })
        .unwrap();
        assert_eq!(db.balance_amount(nathan, asset), 1000);
        assert_eq!(db.balance_amount(issuer, asset), 0);

        // Add Y as a blacklist authority, and have Y blacklist nathan.
        db.assets.modify(asset.raw.instance, |a| a.options.blacklist_authorities.push(authority_y)).unwrap();
        apply_account_whitelist(&mut db, &solstice_core::operations::AccountWhitelistOp {
            fee: AssetAmount::new(CORE_ASSET, 0),
            authorizing_account: authority_y,
            account_to_list: nathan,
            new_listing: account_whitelist_flags::BLACK_LISTED,
        })
        .unwrap();

        db.adjust_balance(issuer, asset, 500).unwrap();
        let err = apply_transfer(&mut db, &solstice_core::operations::TransferOp {
            fee: AssetAmount::new(CORE_ASSET, 0),
            from: issuer,
            to: nathan,
            amount: AssetAmount::new(asset, 500),
            memo: None,
        })
        .unwrap_err();
        assert!(matches!(err, ChainError::Blacklisted(_, _)));
        assert_eq!(db.balance_amount(nathan, asset), 1000);

        // Nathan can still reserve (burn) the balance he already holds.
        apply_asset_reserve(&mut db, &solstice_core::operations::AssetReserveOp {
            fee: AssetAmount::new(CORE_ASSET, 0),
            payer: nathan,
            amount_to_reserve: AssetAmount::new(asset, 1000),
        })
        .unwrap();
        assert_eq!(db.balance_amount(nathan, asset), 0);
    }
}
