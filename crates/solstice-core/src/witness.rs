use serde::{Deserialize, Serialize};

use crate::id::{AccountId, AssetId, WitnessId, WorkerId};
use crate::types::{Amount, PublicKeyType, Timestamp, VoteId};

/// Protocol entity — §3.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Witness {
    pub id: WitnessId,
    pub witness_account: AccountId,
    pub vote_id: VoteId,
    pub total_votes: u64,
    pub signing_key: PublicKeyType,
    /// VRF-like reveal chain hash, updated every time this witness produces
    /// a block (§4.5.2 step 3).
    pub last_secret_hash: [u8; 32],
    pub total_missed: u64,
}

/// Protocol entity — §3.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub id: crate::id::CommitteeMemberId,
    pub committee_member_account: AccountId,
    pub vote_id: VoteId,
    pub total_votes: u64,
}

/// How a worker's daily allotment is actually paid out (§4.5.3 step 6,
/// `worker_pay_visitor` in the source).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerInitializer {
    /// Pay is burned (removed from supply) — used for symbolic/measurement
    /// workers.
    Burn,
    /// Pay is refunded back into the reserve pool rather than disbursed.
    Refund,
    /// Pay accrues into a vesting balance the worker owner can withdraw
    /// from over `vesting_period_secs`.
    Vesting {
        owner: AccountId,
        vesting_period_secs: u32,
        vested: Amount,
        unvested: Amount,
    },
}

/// Protocol entity — §3.2. Active when `begin_date <= now < end_date` and
/// `approving_stake > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub worker_account: AccountId,
    pub vote_id: VoteId,
    pub daily_pay: Amount,
    pub pay_asset: AssetId,
    pub begin_date: Timestamp,
    pub end_date: Timestamp,
    pub initializer: WorkerInitializer,
    pub total_votes_for: u64,
    pub total_votes_against: u64,
}

impl Worker {
    pub fn is_active(&self, now: Timestamp) -> bool {
        now >= self.begin_date && now < self.end_date
    }

    pub fn approving_stake(&self) -> i64 {
        self.total_votes_for as i64 - self.total_votes_against as i64
    }
}
