use serde::{Deserialize, Serialize};

use crate::id::{AccountId, AssetId, CallOrderId, CollateralBidId, ForceSettlementId, LimitOrderId};
use crate::types::{Amount, AssetAmount, Price, Timestamp};

/// Protocol entity — §3.2. Ordered within a market by `(sell_price DESC, id
/// ASC)`; `for_sale` tracks the remaining, unfilled amount of the selling
/// asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrder {
    pub id: LimitOrderId,
    pub seller: AccountId,
    pub for_sale: AssetAmount,
    pub sell_price: Price,
    pub expiration: Timestamp,
    /// Remaining fee, deducted from proceeds pro-rata as the order fills
    /// (`None` once a flat fee was already paid up front).
    pub deferred_fee: Option<AssetAmount>,
    pub fill_or_kill: bool,
}

impl LimitOrder {
    pub fn amount_to_receive(&self) -> AssetAmount {
        AssetAmount::new(
            self.sell_price.base.asset_id,
            self.sell_price.multiply(self.for_sale.amount),
        )
    }

    pub fn market(&self) -> (AssetId, AssetId) {
        self.sell_price.market()
    }
}

/// Protocol entity — §3.2, a collateralized debt position ("short"/margin
/// position). `call_price = (collateral / debt) * (1/MCR)`; ordered by
/// `(call_price ASC, id ASC)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOrder {
    pub id: CallOrderId,
    pub borrower: AccountId,
    pub debt: AssetAmount,
    pub collateral: AssetAmount,
    pub call_price: Price,
    /// `call_order_update`'s CR-834 extension: caps how much may be
    /// margin-called per match instead of rejecting an under-MCR update
    /// outright.
    pub target_collateral_ratio: Option<u16>,
}

impl CallOrder {
    /// Current collateralization ratio scaled by `COLLATERAL_RATIO_DENOM`.
    pub fn collateral_ratio(&self) -> u64 {
        if self.debt.amount == 0 {
            return u64::MAX;
        }
        ((self.collateral.amount as i128 * crate::constants::COLLATERAL_RATIO_DENOM as i128)
            / self.debt.amount as i128) as u64
    }
}

/// Protocol entity — §3.2. Created by `asset_settle`; matured entries are
/// resolved against the lowest-collateralized call orders during maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceSettlement {
    pub id: ForceSettlementId,
    pub owner: AccountId,
    pub balance: AssetAmount,
    pub settlement_date: Timestamp,
}

/// §4.3.7 — a collateral offer made while a bitasset is globally settled,
/// competing to recollateralize and reopen the market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralBid {
    pub id: CollateralBidId,
    pub bidder: AccountId,
    pub inv_swan_price: Price,
    pub additional_collateral: Amount,
    pub debt_covered: Amount,
}
