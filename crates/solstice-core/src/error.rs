use thiserror::Error;

use crate::id::ObjectId;

/// Every error the chain core can produce, grouped by the behavioral
/// category §7 assigns them. The category determines how far a failure
/// unwinds: structural/authorization/business-rule/hardfork errors abort
/// the current transaction session; internal-defensive errors are fatal to
/// the whole block and cause the branch to be abandoned by fork selection.
#[derive(Debug, Error)]
pub enum ChainError {
    // ── Structural — caught by Transaction::validate(), never mutates state ──
    #[error("transaction has no operations")]
    EmptyTransaction,
    #[error("operation failed structural validation: {0}")]
    InvalidOperation(String),
    #[error("duplicate signature in transaction")]
    DuplicateSignature,
    #[error("fee amount is negative")]
    NegativeFee,
    #[error("asset symbol {0:?} is not well-formed")]
    InvalidAssetSymbol(String),
    #[error("account name {0:?} is not well-formed")]
    InvalidAccountName(String),

    // ── Authorization ──────────────────────────────────────────────────────
    #[error("missing required signature for account {0}")]
    MissingSignature(ObjectId),
    #[error("authority is not satisfiable: threshold {threshold} exceeds available weight {available}")]
    UnsatisfiableAuthority { threshold: u32, available: u32 },
    #[error("authority expansion exceeded max recursion depth")]
    AuthorityDepthExceeded,
    #[error("account {0} is not whitelisted to hold/transfer asset {1}")]
    NotWhitelisted(ObjectId, ObjectId),
    #[error("account {0} is blacklisted for asset {1}")]
    Blacklisted(ObjectId, ObjectId),
    #[error("extra signature provided that was not required by any operation")]
    UnusedSignature,

    // ── Business rule ──────────────────────────────────────────────────────
    #[error("insufficient balance: account {account} has {have} of asset {asset}, needs {need}")]
    InsufficientBalance {
        account: ObjectId,
        asset: ObjectId,
        have: i64,
        need: i64,
    },
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),
    #[error("asset flag {flag:#x} is not permitted (permissions {permissions:#x})")]
    FlagNotPermitted { flag: u16, permissions: u16 },
    #[error("bitasset {0} is already globally settled")]
    AlreadySettled(ObjectId),
    #[error("bitasset {0} is not globally settled")]
    NotSettled(ObjectId),
    #[error("call order update would leave position below maintenance collateral ratio")]
    InsufficientCollateral,
    #[error("duplicate order at identical (price, id) already exists in market")]
    DuplicateOrder,
    #[error("order parameters invalid: {0}")]
    InvalidOrderParams(String),
    #[error("forced-settlement volume for this interval exceeds the cap")]
    SettlementVolumeExceeded,
    #[error("proposal {0} review period has not elapsed / only removals accepted")]
    ProposalReviewPeriod(ObjectId),
    #[error("proposal {0} required authority sets not yet satisfied")]
    ProposalNotReady(ObjectId),
    #[error("nested proposal_update beyond one level is not permitted")]
    NestedProposalUpdate,
    #[error("proposal references a future proposal id for update/delete")]
    ProposalForwardReference,

    // ── Hardfork-gated ───────────────────────────────────────────────────────
    #[error("operation {operation} not yet active at chain time {chain_time} (activates {activation_time})")]
    HardforkNotActive {
        operation: &'static str,
        chain_time: i64,
        activation_time: i64,
    },

    // ── Transaction processor ───────────────────────────────────────────────
    #[error("TaPoS reference block summary not found for ref_block_num {0}")]
    TaposSummaryMissing(u32),
    #[error("TaPoS reference prefix mismatch")]
    TaposPrefixMismatch,
    #[error("transaction expiration {expiration} outside valid window [{head_time}, {max_time}]")]
    InvalidExpiration {
        expiration: i64,
        head_time: i64,
        max_time: i64,
    },
    #[error("duplicate transaction id {0}")]
    DuplicateTransaction(String),
    #[error("block exceeds maximum size")]
    BlockTooLarge,

    // ── Fork / block pipeline ───────────────────────────────────────────────
    #[error("block {0} is not a descendant of any known block (missing previous)")]
    UnlinkedBlock(String),
    #[error("block {0} is not preferred over current head (lower or equal number)")]
    BlockNotPreferred(String),
    #[error("attempted to pop more blocks than exist in the undo stack")]
    UndoStackEmpty,

    // ── Internal-defensive — a bug, fatal to the block ──────────────────────
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
    #[error("supply conservation violated for asset {0}")]
    SupplyConservationViolated(ObjectId),

    // ── Plumbing ─────────────────────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ChainResult<T> = Result<T, ChainError>;

impl ChainError {
    /// Whether this error category is internal-defensive, i.e. fatal to the
    /// whole block rather than just the offending transaction.
    pub fn is_defensive(&self) -> bool {
        matches!(
            self,
            ChainError::InvariantViolation(_) | ChainError::SupplyConservationViolated(_)
        )
    }
}
