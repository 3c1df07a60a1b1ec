//! Scalar protocol types shared across modules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain time, unix seconds UTC.
pub type Timestamp = i64;

/// Signed fixed-point asset amount, in the asset's smallest unit. Signed so
/// that deltas (credits/debits) compose without a separate "direction" flag.
pub type Amount = i64;

/// An asset quantity tagged with which asset it denominates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub asset_id: crate::id::AssetId,
    pub amount: Amount,
}

impl AssetAmount {
    pub fn new(asset_id: crate::id::AssetId, amount: Amount) -> Self {
        AssetAmount { asset_id, amount }
    }
}

/// A price as a ratio of two asset amounts: `base / quote`, i.e. "how many
/// `quote` buys one `base`". Matches the source's `price { base, quote }`
/// pair-of-asset representation so cross-multiplication (`a.base * b.quote
/// == b.base * a.quote`) avoids floating point entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub base: AssetAmount,
    pub quote: AssetAmount,
}

impl Price {
    pub fn new(base: AssetAmount, quote: AssetAmount) -> Self {
        Price { base, quote }
    }

    /// The market this price trades in, canonicalized as `(min_id, max_id)`.
    pub fn market(&self) -> (crate::id::AssetId, crate::id::AssetId) {
        if self.base.asset_id < self.quote.asset_id {
            (self.base.asset_id, self.quote.asset_id)
        } else {
            (self.quote.asset_id, self.base.asset_id)
        }
    }

    /// Reciprocal price (swap base/quote).
    pub fn reciprocal(&self) -> Price {
        Price {
            base: self.quote,
            quote: self.base,
        }
    }

    /// `self < other` without floating point, per graphene's price compare:
    /// `a.base * b.quote < b.base * a.quote` (requires same market).
    pub fn less_than(&self, other: &Price) -> bool {
        let a = self.base.amount as i128 * other.quote.amount as i128;
        let b = other.base.amount as i128 * self.quote.amount as i128;
        a < b
    }

    pub fn equals(&self, other: &Price) -> bool {
        let a = self.base.amount as i128 * other.quote.amount as i128;
        let b = other.base.amount as i128 * self.quote.amount as i128;
        a == b
    }

    /// Multiply an amount of `quote`'s asset by this price to get an amount
    /// of `base`'s asset (rounding down), i.e. `amount * (base/quote)`.
    pub fn multiply(&self, amount: Amount) -> Amount {
        let r = (amount as i128 * self.base.amount as i128) / self.quote.amount as i128;
        r as Amount
    }
}

/// Compressed secp256k1 public key, wire-encoded as 33 raw bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKeyType(pub [u8; 33]);

impl fmt::Debug for PublicKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyType({})", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

/// `ripemd160(sha512(compressed_pubkey))`, truncated identity used in
/// authorities — matches the source's `address` type, distinct from the raw
/// public key so authorities are stable across key-encoding changes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

/// A 32-byte transaction / block id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sha256Id(pub [u8; 32]);

impl Sha256Id {
    pub const ZERO: Sha256Id = Sha256Id([0u8; 32]);

    /// The 64-bit limb used as TaPoS `ref_block_prefix` / block-id second limb.
    pub fn prefix_limb(&self) -> u64 {
        u64::from_le_bytes(self.0[4..12].try_into().unwrap())
    }

    /// The leading 32 bits, used as the block number embedded in block ids
    /// (graphene embeds the big-endian block height in the id's first 4
    /// bytes so block ids sort by height).
    pub fn block_num(&self) -> u32 {
        u32::from_be_bytes(self.0[0..4].try_into().unwrap())
    }
}

impl fmt::Debug for Sha256Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Sha256Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A recoverable secp256k1 signature, 65 bytes (r, s, recovery id).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub [u8; 65]);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// A weighted multisig authority: `{threshold, account weights, key
/// weights, address weights}`. Satisfied when the sum of weights of
/// present/derivable signers meets or exceeds `threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Authority {
    pub weight_threshold: u32,
    pub account_auths: Vec<(crate::id::AccountId, u16)>,
    pub key_auths: Vec<(PublicKeyType, u16)>,
    pub address_auths: Vec<(Address, u16)>,
}

impl Authority {
    /// Single-key authority with threshold 1.
    pub fn single_key(key: PublicKeyType) -> Self {
        Authority {
            weight_threshold: 1,
            account_auths: vec![],
            key_auths: vec![(key, 1)],
            address_auths: vec![],
        }
    }

    /// Sum of all declared weights, used to check satisfiability at
    /// creation/update time (threshold must not exceed this).
    pub fn total_weight(&self) -> u32 {
        self.account_auths.iter().map(|(_, w)| *w as u32).sum::<u32>()
            + self.key_auths.iter().map(|(_, w)| *w as u32).sum::<u32>()
            + self.address_auths.iter().map(|(_, w)| *w as u32).sum::<u32>()
    }

    pub fn is_satisfiable(&self) -> bool {
        self.weight_threshold <= self.total_weight()
    }

    pub fn num_auths(&self) -> usize {
        self.account_auths.len() + self.key_auths.len() + self.address_auths.len()
    }
}

/// Vote id: an 8-bit type tag (witness=0, committee=1, worker=2) packed with
/// a 24-bit instance, matching the source's `vote_id_type` bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VoteId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VoteType {
    Witness = 0,
    Committee = 1,
    Worker = 2,
}

impl VoteId {
    pub fn new(vote_type: VoteType, instance: u32) -> Self {
        VoteId(((instance & 0x00FF_FFFF) << 8) | vote_type as u32)
    }

    pub fn vote_type(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn instance(&self) -> u32 {
        self.0 >> 8
    }
}
