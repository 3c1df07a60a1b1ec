use serde::{Deserialize, Serialize};

use crate::id::{AccountId, AssetBitAssetDataId, AssetDynamicDataId, AssetId};
use crate::types::{AssetAmount, Price};

/// Bit positions shared by `issuer_permissions` and `flags`. A flag may only
/// be set if the corresponding permission bit is also set (§3.2 invariant).
pub mod asset_flags {
    pub const CHARGE_MARKET_FEE: u16 = 1 << 0;
    pub const WHITE_LIST: u16 = 1 << 1;
    pub const OVERRIDE_AUTHORITY: u16 = 1 << 2;
    pub const TRANSFER_RESTRICTED: u16 = 1 << 3;
    pub const DISABLE_FORCE_SETTLE: u16 = 1 << 4;
    pub const GLOBAL_SETTLE: u16 = 1 << 5;
    pub const DISABLE_CONFIDENTIAL: u16 = 1 << 6;
    pub const WITNESS_FEE_DISTRIBUTE: u16 = 1 << 7;
    pub const COMMITTEE_FEE_DISTRIBUTE: u16 = 1 << 8;
}

/// §3.2 `AssetOptions`. `flags` is the currently-active subset of
/// `issuer_permissions`; invariant checked by the asset evaluators, not the
/// struct itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOptions {
    pub max_supply: i64,
    /// Parts per `GRAPHENE_100_PERCENT` charged on trades of this asset.
    pub market_fee_percent: u16,
    pub max_market_fee: i64,
    pub issuer_permissions: u16,
    pub flags: u16,
    pub core_exchange_rate: Price,
    pub whitelist_authorities: Vec<AccountId>,
    pub blacklist_authorities: Vec<AccountId>,
    pub whitelist_markets: Vec<AssetId>,
    pub blacklist_markets: Vec<AssetId>,
    pub description: String,
}

impl AssetOptions {
    pub fn flags_subset_of_permissions(&self) -> bool {
        self.flags & !self.issuer_permissions == 0
    }

    pub fn is_flag_set(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    pub fn is_permitted(&self, flag: u16) -> bool {
        self.issuer_permissions & flag != 0
    }
}

/// §3.2 BitAsset-specific options, carried alongside `AssetOptions` when
/// `bitasset_data_id` is `Some`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitAssetOptions {
    pub feed_lifetime_sec: u32,
    pub minimum_feeds: u8,
    pub force_settlement_delay_sec: u32,
    /// Parts per `GRAPHENE_100_PERCENT` above `settlement_price` charged on
    /// forced settlement.
    pub force_settlement_offset_percent: u16,
    /// Parts per `GRAPHENE_100_PERCENT` of current supply that may force-settle
    /// per maintenance interval.
    pub maximum_force_settlement_volume: u16,
    /// Asset the collateral for this bitasset is posted in (may differ from
    /// the quote asset of the feed — e.g. a USD bitasset backed by a BTC
    /// bitasset).
    pub short_backing_asset: AssetId,
}

/// Protocol entity — §3.2. A `prediction_market` is a UIA-shaped bitasset
/// whose `bitasset_data_id` is set but whose settlement is only ever
/// triggered by the issuer (modeled via `AssetBitAssetData::is_prediction_market`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub symbol: String,
    pub precision: u8,
    pub issuer: AccountId,
    pub options: AssetOptions,
    pub bitasset_data_id: Option<AssetBitAssetDataId>,
    pub bitasset_options: Option<BitAssetOptions>,
    pub dynamic_data_id: AssetDynamicDataId,
}

impl Asset {
    pub fn is_market_issued(&self) -> bool {
        self.bitasset_data_id.is_some()
    }

    /// UIAs (non-bitasset) may not set force-settle or global-settle flags
    /// (§3.2 invariant).
    pub fn validate_flags_for_kind(&self) -> bool {
        if self.is_market_issued() {
            return true;
        }
        !self.options.is_flag_set(asset_flags::DISABLE_FORCE_SETTLE)
            && !self.options.is_flag_set(asset_flags::GLOBAL_SETTLE)
    }
}

/// Validates the asset-symbol grammar from §3.2: 3-16 chars, uppercase
/// letters and at most one `.` (used for subdivided namespaces like
/// `BTS.USD`).
pub fn is_valid_asset_symbol(symbol: &str) -> bool {
    if symbol.len() < 3 || symbol.len() > 16 {
        return false;
    }
    if symbol.matches('.').count() > 1 {
        return false;
    }
    symbol
        .bytes()
        .all(|b| b.is_ascii_uppercase() || b == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_symbols() {
        assert!(is_valid_asset_symbol("USD"));
        assert!(is_valid_asset_symbol("BTS.USD"));
        assert!(!is_valid_asset_symbol("US"));
        assert!(!is_valid_asset_symbol("bts"));
        assert!(!is_valid_asset_symbol("BTS.US.D"));
    }
}
