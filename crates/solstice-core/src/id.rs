//! Object id scheme: `(space, type, instance)`.
//!
//! Ids are stable and never reused; deleted ids are tombstoned by the undo
//! stack (see `solstice-db`) until the undo horizon passes. `instance` is
//! monotonically increasing within a `(space, type)` pair.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// The two id spaces. Protocol objects persist across forks via their own
/// evaluators; implementation objects are reconstructible from chain replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Space {
    Protocol = 1,
    Implementation = 2,
}

/// Object type tag, scoped within a space. Values mirror the order objects
/// are introduced in §3 so instance allocation stays predictable across
/// genesis replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectType {
    // protocol space
    Account = 1,
    Asset = 2,
    Witness = 3,
    CommitteeMember = 4,
    LimitOrder = 5,
    CallOrder = 6,
    CustomObject = 7,
    Proposal = 8,
    OperationHistory = 9,
    Worker = 10,
    ForceSettlement = 11,
    CollateralBid = 12,
    // implementation space
    GlobalProperty = 20,
    DynamicGlobalProperty = 21,
    AssetDynamicData = 22,
    AssetBitAssetData = 23,
    AccountBalance = 24,
    AccountStatistics = 25,
    TransactionHistory = 26,
    BlockSummary = 27,
}

/// A raw, untyped object id: `(space, type, instance)`. Typed wrappers
/// (`Id<T>`) are what evaluators and indices actually pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    pub space: Space,
    pub type_id: ObjectType,
    pub instance: u64,
}

impl ObjectId {
    pub const fn new(space: Space, type_id: ObjectType, instance: u64) -> Self {
        ObjectId {
            space,
            type_id,
            instance,
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.space as u8, self.type_id as u8, self.instance
        )
    }
}

/// A strongly-typed id over a raw `ObjectId`. `T` never appears in the
/// serialized form — ids round-trip as plain `(space, type, instance)`
/// triples — it only prevents mixing up, say, an `Id<Account>` with an
/// `Id<Asset>` at compile time.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T> {
    pub raw: ObjectId,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub const fn new(raw: ObjectId) -> Self {
        Id {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn from_instance(space: Space, type_id: ObjectType, instance: u64) -> Self {
        Id::new(ObjectId::new(space, type_id, instance))
    }

    pub fn instance(&self) -> u64 {
        self.raw.instance
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Id<T> {}
impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<T> Eq for Id<T> {}
impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}
impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}
impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.raw)
    }
}
impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

pub type AccountId = Id<crate::account::Account>;
pub type AssetId = Id<crate::asset::Asset>;
pub type WitnessId = Id<crate::witness::Witness>;
pub type CommitteeMemberId = Id<crate::witness::CommitteeMember>;
pub type LimitOrderId = Id<crate::market::LimitOrder>;
pub type CallOrderId = Id<crate::market::CallOrder>;
pub type ProposalId = Id<crate::proposal::Proposal>;
pub type WorkerId = Id<crate::witness::Worker>;
pub type ForceSettlementId = Id<crate::market::ForceSettlement>;
pub type CollateralBidId = Id<crate::market::CollateralBid>;

pub type AccountBalanceId = Id<crate::impl_entities::AccountBalance>;
pub type AccountStatisticsId = Id<crate::impl_entities::AccountStatistics>;
pub type AssetDynamicDataId = Id<crate::impl_entities::AssetDynamicData>;
pub type AssetBitAssetDataId = Id<crate::impl_entities::AssetBitAssetData>;
pub type BlockSummaryId = Id<crate::impl_entities::BlockSummary>;

/// The sentinel zero-fee, zero-authority account created at genesis. Its
/// owner/active threshold is 0, so it is always "satisfied" — used as the
/// `fee_paying_account` placeholder for fee-exempt system operations and as
/// the canonical "nobody" referrer.
pub const TEMP_ACCOUNT: AccountId = Id::from_instance(Space::Protocol, ObjectType::Account, 0);

/// Sentinel account whose active authority is rewritten every maintenance
/// interval to be a weighted sum of selected witnesses (§4.5.3).
pub const WITNESS_ACCOUNT: AccountId = Id::from_instance(Space::Protocol, ObjectType::Account, 1);

/// Sentinel account whose active authority is rewritten every maintenance
/// interval to be a weighted sum of selected committee members (§4.5.3).
pub const COMMITTEE_ACCOUNT: AccountId = Id::from_instance(Space::Protocol, ObjectType::Account, 2);

/// The network's core asset (CORE), always instance 0 in asset space.
pub const CORE_ASSET: AssetId = Id::from_instance(Space::Protocol, ObjectType::Asset, 0);
