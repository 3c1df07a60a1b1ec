//! §4.2 / §9 — a sum type over every operation variant, dispatched by tag to
//! its evaluator. Each variant carries exactly the fields its `do_evaluate`/
//! `do_apply` pair needs; virtual operations (market fills, settlements)
//! are a separate enum since they are never submitted by a client.

use serde::{Deserialize, Serialize};

use crate::id::{AccountId, AssetId, CallOrderId, CollateralBidId, ForceSettlementId, LimitOrderId, ProposalId, WorkerId};
use crate::types::{Amount, AssetAmount, Authority, Price, Timestamp};
use crate::witness::WorkerInitializer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationTag {
    Transfer = 0,
    AccountCreate = 1,
    AccountUpdate = 2,
    AccountWhitelist = 3,
    AssetCreate = 4,
    AssetUpdate = 5,
    AssetUpdateBitasset = 6,
    AssetPublishFeed = 7,
    AssetIssue = 8,
    AssetReserve = 9,
    AssetFundFeePool = 10,
    AssetSettle = 11,
    AssetGlobalSettle = 12,
    LimitOrderCreate = 13,
    LimitOrderCancel = 14,
    CallOrderUpdate = 15,
    BidCollateral = 16,
    WitnessCreate = 17,
    WitnessUpdate = 18,
    CommitteeMemberCreate = 19,
    CommitteeMemberUpdate = 20,
    WorkerCreate = 21,
    ProposalCreate = 22,
    ProposalUpdate = 23,
    ProposalDelete = 24,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOp {
    pub fee: AssetAmount,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: AssetAmount,
    pub memo: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCreateOp {
    pub fee: AssetAmount,
    pub registrar: AccountId,
    pub referrer: AccountId,
    pub referrer_percent: u16,
    pub name: String,
    pub owner: Authority,
    pub active: Authority,
    pub options: crate::account::AccountOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUpdateOp {
    pub fee: AssetAmount,
    pub account: AccountId,
    pub owner: Option<Authority>,
    pub active: Option<Authority>,
    pub new_options: Option<crate::account::AccountOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountWhitelistOp {
    pub fee: AssetAmount,
    pub authorizing_account: AccountId,
    pub account_to_list: AccountId,
    pub new_listing: u8,
}

pub mod account_whitelist_flags {
    pub const WHITE_LISTED: u8 = 1 << 0;
    pub const BLACK_LISTED: u8 = 1 << 1;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetCreateOp {
    pub fee: AssetAmount,
    pub issuer: AccountId,
    pub symbol: String,
    pub precision: u8,
    pub common_options: crate::asset::AssetOptions,
    pub bitasset_opts: Option<crate::asset::BitAssetOptions>,
    pub is_prediction_market: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetUpdateOp {
    pub fee: AssetAmount,
    pub issuer: AccountId,
    pub asset_to_update: AssetId,
    pub new_options: crate::asset::AssetOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetUpdateBitassetOp {
    pub fee: AssetAmount,
    pub issuer: AccountId,
    pub asset_to_update: AssetId,
    pub new_options: crate::asset::BitAssetOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetPublishFeedOp {
    pub fee: AssetAmount,
    pub publisher: AccountId,
    pub asset_id: AssetId,
    pub feed: crate::impl_entities::PriceFeed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetIssueOp {
    pub fee: AssetAmount,
    pub issuer: AccountId,
    pub asset_to_issue: AssetAmount,
    pub issue_to_account: AccountId,
    pub memo: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetReserveOp {
    pub fee: AssetAmount,
    pub payer: AccountId,
    pub amount_to_reserve: AssetAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetFundFeePoolOp {
    pub fee: AssetAmount,
    pub from_account: AccountId,
    pub asset_id: AssetId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSettleOp {
    pub fee: AssetAmount,
    pub account: AccountId,
    pub amount: AssetAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetGlobalSettleOp {
    pub fee: AssetAmount,
    pub issuer: AccountId,
    pub asset_to_settle: AssetId,
    pub settle_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrderCreateOp {
    pub fee: AssetAmount,
    pub seller: AccountId,
    pub amount_to_sell: AssetAmount,
    pub min_to_receive: AssetAmount,
    pub expiration: Timestamp,
    pub fill_or_kill: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrderCancelOp {
    pub fee: AssetAmount,
    pub fee_paying_account: AccountId,
    pub order: LimitOrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOrderUpdateOp {
    pub fee: AssetAmount,
    pub funding_account: AccountId,
    pub delta_collateral: AssetAmount,
    pub delta_debt: AssetAmount,
    pub target_collateral_ratio: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidCollateralOp {
    pub fee: AssetAmount,
    pub bidder: AccountId,
    pub additional_collateral: AssetAmount,
    pub debt_covered: AssetAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessCreateOp {
    pub fee: AssetAmount,
    pub witness_account: AccountId,
    pub url: String,
    pub block_signing_key: crate::types::PublicKeyType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessUpdateOp {
    pub fee: AssetAmount,
    pub witness: crate::id::WitnessId,
    pub witness_account: AccountId,
    pub new_url: Option<String>,
    pub new_signing_key: Option<crate::types::PublicKeyType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeMemberCreateOp {
    pub fee: AssetAmount,
    pub committee_member_account: AccountId,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeMemberUpdateOp {
    pub fee: AssetAmount,
    pub committee_member: crate::id::CommitteeMemberId,
    pub committee_member_account: AccountId,
    pub new_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerCreateOp {
    pub fee: AssetAmount,
    pub owner: AccountId,
    pub begin_date: Timestamp,
    pub end_date: Timestamp,
    pub daily_pay: Amount,
    pub pay_asset: AssetId,
    pub name: String,
    pub initializer: WorkerInitializer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalCreateOp {
    pub fee: AssetAmount,
    pub fee_paying_account: AccountId,
    pub expiration_time: Timestamp,
    pub proposed_ops: Vec<Operation>,
    pub review_period_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalUpdateOp {
    pub fee: AssetAmount,
    pub fee_paying_account: AccountId,
    pub proposal: ProposalId,
    pub active_approvals_to_add: Vec<AccountId>,
    pub active_approvals_to_remove: Vec<AccountId>,
    pub owner_approvals_to_add: Vec<AccountId>,
    pub owner_approvals_to_remove: Vec<AccountId>,
    pub key_approvals_to_add: Vec<crate::types::PublicKeyType>,
    pub key_approvals_to_remove: Vec<crate::types::PublicKeyType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalDeleteOp {
    pub fee: AssetAmount,
    pub fee_paying_account: AccountId,
    pub using_owner_authority: bool,
    pub proposal: ProposalId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    Transfer(TransferOp),
    AccountCreate(AccountCreateOp),
    AccountUpdate(AccountUpdateOp),
    AccountWhitelist(AccountWhitelistOp),
    AssetCreate(AssetCreateOp),
    AssetUpdate(AssetUpdateOp),
    AssetUpdateBitasset(AssetUpdateBitassetOp),
    AssetPublishFeed(AssetPublishFeedOp),
    AssetIssue(AssetIssueOp),
    AssetReserve(AssetReserveOp),
    AssetFundFeePool(AssetFundFeePoolOp),
    AssetSettle(AssetSettleOp),
    AssetGlobalSettle(AssetGlobalSettleOp),
    LimitOrderCreate(LimitOrderCreateOp),
    LimitOrderCancel(LimitOrderCancelOp),
    CallOrderUpdate(CallOrderUpdateOp),
    BidCollateral(BidCollateralOp),
    WitnessCreate(WitnessCreateOp),
    WitnessUpdate(WitnessUpdateOp),
    CommitteeMemberCreate(CommitteeMemberCreateOp),
    CommitteeMemberUpdate(CommitteeMemberUpdateOp),
    WorkerCreate(WorkerCreateOp),
    ProposalCreate(ProposalCreateOp),
    ProposalUpdate(ProposalUpdateOp),
    ProposalDelete(ProposalDeleteOp),
}

impl Operation {
    pub fn tag(&self) -> OperationTag {
        match self {
            Operation::Transfer(_) => OperationTag::Transfer,
            Operation::AccountCreate(_) => OperationTag::AccountCreate,
            Operation::AccountUpdate(_) => OperationTag::AccountUpdate,
            Operation::AccountWhitelist(_) => OperationTag::AccountWhitelist,
            Operation::AssetCreate(_) => OperationTag::AssetCreate,
            Operation::AssetUpdate(_) => OperationTag::AssetUpdate,
            Operation::AssetUpdateBitasset(_) => OperationTag::AssetUpdateBitasset,
            Operation::AssetPublishFeed(_) => OperationTag::AssetPublishFeed,
            Operation::AssetIssue(_) => OperationTag::AssetIssue,
            Operation::AssetReserve(_) => OperationTag::AssetReserve,
            Operation::AssetFundFeePool(_) => OperationTag::AssetFundFeePool,
            Operation::AssetSettle(_) => OperationTag::AssetSettle,
            Operation::AssetGlobalSettle(_) => OperationTag::AssetGlobalSettle,
            Operation::LimitOrderCreate(_) => OperationTag::LimitOrderCreate,
            Operation::LimitOrderCancel(_) => OperationTag::LimitOrderCancel,
            Operation::CallOrderUpdate(_) => OperationTag::CallOrderUpdate,
            Operation::BidCollateral(_) => OperationTag::BidCollateral,
            Operation::WitnessCreate(_) => OperationTag::WitnessCreate,
            Operation::WitnessUpdate(_) => OperationTag::WitnessUpdate,
            Operation::CommitteeMemberCreate(_) => OperationTag::CommitteeMemberCreate,
            Operation::CommitteeMemberUpdate(_) => OperationTag::CommitteeMemberUpdate,
            Operation::WorkerCreate(_) => OperationTag::WorkerCreate,
            Operation::ProposalCreate(_) => OperationTag::ProposalCreate,
            Operation::ProposalUpdate(_) => OperationTag::ProposalUpdate,
            Operation::ProposalDelete(_) => OperationTag::ProposalDelete,
        }
    }

    pub fn fee(&self) -> &AssetAmount {
        match self {
            Operation::Transfer(op) => &op.fee,
            Operation::AccountCreate(op) => &op.fee,
            Operation::AccountUpdate(op) => &op.fee,
            Operation::AccountWhitelist(op) => &op.fee,
            Operation::AssetCreate(op) => &op.fee,
            Operation::AssetUpdate(op) => &op.fee,
            Operation::AssetUpdateBitasset(op) => &op.fee,
            Operation::AssetPublishFeed(op) => &op.fee,
            Operation::AssetIssue(op) => &op.fee,
            Operation::AssetReserve(op) => &op.fee,
            Operation::AssetFundFeePool(op) => &op.fee,
            Operation::AssetSettle(op) => &op.fee,
            Operation::AssetGlobalSettle(op) => &op.fee,
            Operation::LimitOrderCreate(op) => &op.fee,
            Operation::LimitOrderCancel(op) => &op.fee,
            Operation::CallOrderUpdate(op) => &op.fee,
            Operation::BidCollateral(op) => &op.fee,
            Operation::WitnessCreate(op) => &op.fee,
            Operation::WitnessUpdate(op) => &op.fee,
            Operation::CommitteeMemberCreate(op) => &op.fee,
            Operation::CommitteeMemberUpdate(op) => &op.fee,
            Operation::WorkerCreate(op) => &op.fee,
            Operation::ProposalCreate(op) => &op.fee,
            Operation::ProposalUpdate(op) => &op.fee,
            Operation::ProposalDelete(op) => &op.fee,
        }
    }

    /// The account whose authority pays the fee and is checked for active
    /// (or, for account-update-of-owner-key, owner) authority.
    pub fn fee_payer(&self) -> AccountId {
        match self {
            Operation::Transfer(op) => op.from,
            Operation::AccountCreate(op) => op.registrar,
            Operation::AccountUpdate(op) => op.account,
            Operation::AccountWhitelist(op) => op.authorizing_account,
            Operation::AssetCreate(op) => op.issuer,
            Operation::AssetUpdate(op) => op.issuer,
            Operation::AssetUpdateBitasset(op) => op.issuer,
            Operation::AssetPublishFeed(op) => op.publisher,
            Operation::AssetIssue(op) => op.issuer,
            Operation::AssetReserve(op) => op.payer,
            Operation::AssetFundFeePool(op) => op.from_account,
            Operation::AssetSettle(op) => op.account,
            Operation::AssetGlobalSettle(op) => op.issuer,
            Operation::LimitOrderCreate(op) => op.seller,
            Operation::LimitOrderCancel(op) => op.fee_paying_account,
            Operation::CallOrderUpdate(op) => op.funding_account,
            Operation::BidCollateral(op) => op.bidder,
            Operation::WitnessCreate(op) => op.witness_account,
            Operation::WitnessUpdate(op) => op.witness_account,
            Operation::CommitteeMemberCreate(op) => op.committee_member_account,
            Operation::CommitteeMemberUpdate(op) => op.committee_member_account,
            Operation::WorkerCreate(op) => op.owner,
            Operation::ProposalCreate(op) => op.fee_paying_account,
            Operation::ProposalUpdate(op) => op.fee_paying_account,
            Operation::ProposalDelete(op) => op.fee_paying_account,
        }
    }

    /// Hardfork activation guard (§4.2). `None` means always active.
    pub fn activation_time(&self) -> Option<i64> {
        match self {
            Operation::BidCollateral(_) => Some(crate::constants::HARDFORK_CORE_834_TIME),
            _ => None,
        }
    }
}

/// Accounts whose owner authority must be present, per operation — only
/// `account_update` touching the owner authority and `account_create`-style
/// operations require owner rather than active.
pub fn required_owner_authorities(op: &Operation) -> Vec<AccountId> {
    match op {
        Operation::AccountUpdate(u) if u.owner.is_some() => vec![u.account],
        Operation::ProposalDelete(d) if d.using_owner_authority => vec![d.fee_paying_account],
        _ => vec![],
    }
}

/// Accounts whose active authority must be present, per operation
/// (§4.2 step 6 `operation_get_required_authorities`).
pub fn required_active_authorities(op: &Operation) -> Vec<AccountId> {
    match op {
        Operation::Transfer(t) => vec![t.from],
        Operation::AccountCreate(c) => vec![c.registrar],
        Operation::AccountUpdate(u) if u.owner.is_none() => vec![u.account],
        Operation::AccountUpdate(_) => vec![],
        Operation::AccountWhitelist(w) => vec![w.authorizing_account],
        Operation::AssetCreate(c) => vec![c.issuer],
        Operation::AssetUpdate(u) => vec![u.issuer],
        Operation::AssetUpdateBitasset(u) => vec![u.issuer],
        Operation::AssetPublishFeed(p) => vec![p.publisher],
        Operation::AssetIssue(i) => vec![i.issuer],
        Operation::AssetReserve(r) => vec![r.payer],
        Operation::AssetFundFeePool(f) => vec![f.from_account],
        Operation::AssetSettle(s) => vec![s.account],
        Operation::AssetGlobalSettle(g) => vec![g.issuer],
        Operation::LimitOrderCreate(c) => vec![c.seller],
        Operation::LimitOrderCancel(c) => vec![c.fee_paying_account],
        Operation::CallOrderUpdate(c) => vec![c.funding_account],
        Operation::BidCollateral(b) => vec![b.bidder],
        Operation::WitnessCreate(w) => vec![w.witness_account],
        Operation::WitnessUpdate(w) => vec![w.witness_account],
        Operation::CommitteeMemberCreate(c) => vec![c.committee_member_account],
        Operation::CommitteeMemberUpdate(c) => vec![c.committee_member_account],
        Operation::WorkerCreate(w) => vec![w.owner],
        Operation::ProposalCreate(p) => vec![p.fee_paying_account],
        Operation::ProposalUpdate(p) => vec![p.fee_paying_account],
        Operation::ProposalDelete(d) if !d.using_owner_authority => vec![d.fee_paying_account],
        Operation::ProposalDelete(_) => vec![],
    }
}

/// Virtual operations (§9 / §4.3) — never submitted by a client, only
/// emitted by an evaluator and appended to the applied-ops list with their
/// `(block, trx, op, vop_seq)` coordinate assigned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VirtualOperation {
    FillOrder {
        order_id: crate::id::ObjectId,
        account_id: AccountId,
        pays: AssetAmount,
        receives: AssetAmount,
        fee: AssetAmount,
        is_maker: bool,
    },
    AssetSettleCancel {
        settlement: ForceSettlementId,
        account: AccountId,
        amount: AssetAmount,
    },
    ExecuteBid {
        bidder: AccountId,
        debt: AssetAmount,
        collateral: AssetAmount,
        bid_id: CollateralBidId,
    },
}
