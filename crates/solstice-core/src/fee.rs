//! §6.4 / §4.2 fee accounting — grounded in the source's per-operation
//! `calculate_fee(parameters)` pattern: a flat base fee plus a per-kilobyte
//! surcharge for variable-length fields, looked up by `OperationTag`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::operations::{Operation, OperationTag};
use crate::types::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParameters {
    pub fee: Amount,
    /// Additional fee charged per 1024 bytes of variable-length operation
    /// data (memos, urls, proposed-operation payloads).
    pub price_per_kbyte: Amount,
}

impl FeeParameters {
    pub const fn flat(fee: Amount) -> Self {
        FeeParameters {
            fee,
            price_per_kbyte: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub parameters: BTreeMap<OperationTag, FeeParameters>,
    /// `account_create_operation` charges more for short, desirable names —
    /// an additional flat surcharge per byte under this length.
    pub premium_name_max_length: usize,
    pub premium_name_surcharge: Amount,
}

impl FeeSchedule {
    /// A reasonable default schedule; genesis constructs one explicitly and
    /// governance may replace it via `pending_parameters`.
    pub fn default_schedule() -> Self {
        use OperationTag::*;
        let mut parameters = BTreeMap::new();
        parameters.insert(Transfer, FeeParameters { fee: 20, price_per_kbyte: 10 });
        parameters.insert(AccountCreate, FeeParameters::flat(5_000));
        parameters.insert(AccountUpdate, FeeParameters { fee: 20, price_per_kbyte: 10 });
        parameters.insert(AccountWhitelist, FeeParameters::flat(300));
        parameters.insert(AssetCreate, FeeParameters::flat(100_000));
        parameters.insert(AssetUpdate, FeeParameters { fee: 2_000, price_per_kbyte: 20 });
        parameters.insert(AssetUpdateBitasset, FeeParameters::flat(2_000));
        parameters.insert(AssetPublishFeed, FeeParameters::flat(10));
        parameters.insert(AssetIssue, FeeParameters { fee: 20, price_per_kbyte: 10 });
        parameters.insert(AssetReserve, FeeParameters::flat(20));
        parameters.insert(AssetFundFeePool, FeeParameters::flat(20));
        parameters.insert(AssetSettle, FeeParameters::flat(100));
        parameters.insert(AssetGlobalSettle, FeeParameters::flat(1_000));
        parameters.insert(LimitOrderCreate, FeeParameters::flat(20));
        parameters.insert(LimitOrderCancel, FeeParameters::flat(0));
        parameters.insert(CallOrderUpdate, FeeParameters::flat(20));
        parameters.insert(BidCollateral, FeeParameters::flat(20));
        parameters.insert(WitnessCreate, FeeParameters::flat(500_000));
        parameters.insert(WitnessUpdate, FeeParameters::flat(20));
        parameters.insert(CommitteeMemberCreate, FeeParameters::flat(500_000));
        parameters.insert(CommitteeMemberUpdate, FeeParameters::flat(20));
        parameters.insert(WorkerCreate, FeeParameters::flat(100_000));
        parameters.insert(ProposalCreate, FeeParameters { fee: 2_000, price_per_kbyte: 20 });
        parameters.insert(ProposalUpdate, FeeParameters { fee: 2_000, price_per_kbyte: 20 });
        parameters.insert(ProposalDelete, FeeParameters::flat(20));
        FeeSchedule {
            parameters,
            premium_name_max_length: 8,
            premium_name_surcharge: 10_000,
        }
    }

    /// Fee required for `op`, in core-asset base units (the caller converts
    /// via the paying asset's `core_exchange_rate` if paying in another
    /// asset — see §4.2 fee accounting).
    pub fn calculate_fee(&self, op: &Operation, variable_data_len: usize) -> Amount {
        let params = self
            .parameters
            .get(&op.tag())
            .copied()
            .unwrap_or(FeeParameters::flat(0));
        let kb = (variable_data_len + 1023) / 1024;
        let mut total = params.fee + params.price_per_kbyte * kb as Amount;
        if let Operation::AccountCreate(c) = op {
            if c.name.len() <= self.premium_name_max_length {
                total += self.premium_name_surcharge;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{AccountId, CORE_ASSET};
    use crate::operations::TransferOp;
    use crate::types::AssetAmount;

    #[test]
    fn transfer_fee_scales_with_memo_size() {
        let schedule = FeeSchedule::default_schedule();
        let op = Operation::Transfer(TransferOp {
            fee: AssetAmount::new(CORE_ASSET, 0),
            from: crate::id::TEMP_ACCOUNT,
            to: crate::id::TEMP_ACCOUNT,
            amount: AssetAmount::new(CORE_ASSET, 100),
            memo: None,
        });
        let base = schedule.calculate_fee(&op, 0);
        let with_memo = schedule.calculate_fee(&op, 2048);
        assert!(with_memo > base);
        let _ = AccountId::from_instance(crate::id::Space::Protocol, crate::id::ObjectType::Account, 99);
    }
}
