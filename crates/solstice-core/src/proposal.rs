use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::id::{AccountId, ProposalId};
use crate::operations::Operation;
use crate::types::{Address, PublicKeyType, Timestamp};

/// Protocol entity — §3.2 / §4.7. A proposal is a deferred multi-op
/// transaction: it carries its own required-authority sets (computed at
/// creation) and accumulates approvals until they are all satisfied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: AccountId,
    pub expiration_time: Timestamp,
    pub review_period_time: Option<Timestamp>,
    pub proposed_operations: Vec<Operation>,

    pub required_owner_approvals: BTreeSet<AccountId>,
    pub required_active_approvals: BTreeSet<AccountId>,

    pub available_owner_approvals: BTreeSet<AccountId>,
    pub available_active_approvals: BTreeSet<AccountId>,
    pub available_key_approvals: BTreeSet<PublicKeyType>,
    pub available_address_approvals: BTreeSet<Address>,

    /// Set by `push_proposal` when the inner transaction runs but fails;
    /// the proposal remains (rather than being consumed) until expiration.
    pub fail_reason: Option<String>,
}

impl Proposal {
    /// True once every required owner+active set is a subset of the
    /// available sets and no review period is still pending.
    pub fn is_authorized(&self, now: Timestamp) -> bool {
        if let Some(review) = self.review_period_time {
            if now < review {
                return false;
            }
        }
        self.required_owner_approvals
            .is_subset(&self.available_owner_approvals)
            && self
                .required_active_approvals
                .is_subset(&self.available_active_approvals)
    }

    pub fn in_review_period(&self, now: Timestamp) -> bool {
        matches!(self.review_period_time, Some(r) if now < r)
    }
}
