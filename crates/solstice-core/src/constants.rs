//! ─── Solstice Protocol Constants ───────────────────────────────────────────

// ── Block production ─────────────────────────────────────────────────────

/// Seconds between block slots.
pub const BLOCK_INTERVAL_SECS: u32 = 3;

/// Minimum number of active witnesses the maintenance loop may select.
pub const MIN_WITNESS_COUNT: usize = 11;

/// Minimum number of active committee members the maintenance loop may select.
pub const MIN_COMMITTEE_COUNT: usize = 11;

/// `BlockSummary` is a ring buffer of this size; TaPoS references wrap at
/// this modulus (`2^16`), matching `instance = block_num & 0xFFFF`.
pub const BLOCK_SUMMARY_RING: u32 = 1 << 16;

// ── Transaction validation ───────────────────────────────────────────────

/// Upper bound on how far in the future a transaction's expiration may sit
/// relative to head time.
pub const MAX_TIME_UNTIL_EXPIRATION_SECS: i64 = 86_400;

/// Maximum serialized size of a block, in bytes.
pub const MAX_BLOCK_SIZE_BYTES: usize = 2 * 1024 * 1024;

/// Maximum authority-expansion recursion depth (prevents authority-graph DoS).
pub const MAX_AUTHORITY_DEPTH: u32 = 2;

// ── Assets ────────────────────────────────────────────────────────────────

/// Maximum representable asset supply (database invariant, not a specific
/// asset's `max_supply`).
pub const MAX_ASSET_SUPPLY: i64 = i64::MAX;

/// Maximum asset precision (decimal places).
pub const MAX_ASSET_PRECISION: u8 = 12;

/// Scale for market-fee-percent and similar basis-point-ish fields: value is
/// parts per this denominator (i.e. 1% == 100).
pub const GRAPHENE_100_PERCENT: u16 = 10_000;

// ── BitAssets / market engine ─────────────────────────────────────────────

/// Minimum allowed maintenance collateral ratio: 1000 == parity, so 1001 is
/// the smallest permitted value (0.1% above parity).
pub const MIN_COLLATERAL_RATIO: u16 = 1_001;

/// Maximum allowed maintenance / short-squeeze collateral ratio.
pub const MAX_COLLATERAL_RATIO: u16 = 32_000;

/// Denominator for collateral-ratio fields (1000 == 1.0).
pub const COLLATERAL_RATIO_DENOM: u16 = 1_000;

/// Minimum allowed maximum short-squeeze ratio.
pub const MIN_MSSR: u16 = 1_000;

/// Default forced-settlement delay.
pub const DEFAULT_FORCE_SETTLEMENT_DELAY_SECS: u32 = 86_400;

/// Default per-maintenance-interval cap on forced-settlement volume, in
/// units of 1/`GRAPHENE_100_PERCENT` of current supply.
pub const DEFAULT_MAX_FORCE_SETTLEMENT_VOLUME: u16 = 2_000;

// ── Maintenance / governance ─────────────────────────────────────────────

/// Default maintenance interval.
pub const DEFAULT_MAINTENANCE_INTERVAL_SECS: u32 = 3_600;

/// Budget accrual rate numerator; `2^CORE_ASSET_CYCLE_RATE_BITS` is the
/// denominator, matching the source's fixed-point budget formula (§4.5.3).
pub const CORE_ASSET_CYCLE_RATE: u64 = 17;
pub const CORE_ASSET_CYCLE_RATE_BITS: u32 = 32;

/// Bit width beyond which vote counts are right-shifted before being used
/// as sentinel-authority weights (§4.5.3 step 4).
pub const MAX_VOTE_WEIGHT_BITS: u32 = 15;

// ── Proposals ─────────────────────────────────────────────────────────────

/// Hardfork activation time (unix seconds) after which proposal_create must
/// reject proposals referencing a future proposal id for update/delete.
pub const HARDFORK_CORE_1479_TIME: i64 = 1_525_132_800;

/// The historically malformed proposal id observed on the source chain,
/// defanged only during replay of chains predating HARDFORK_CORE_1479_TIME.
pub const LEGACY_DEFANGED_PROPOSAL_INSTANCE: u64 = 17_503;

// ── Hardfork gates referenced by evaluators ──────────────────────────────

/// `target_collateral_ratio` extension on `call_order_update` (CR-834).
pub const HARDFORK_CORE_834_TIME: i64 = 1_508_853_600;

/// Fairness correction for margin-call vs. resting-limit-order priority
/// (bitshares issues #338/#606/#625).
pub const HARDFORK_CORE_338_TIME: i64 = 1_493_164_800;

/// Genesis chain time used by tests and local genesis construction.
pub const GENESIS_TIME: i64 = 1_431_700_000;
