use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::id::{AccountId, AccountStatisticsId, AssetId};
use crate::types::{Authority, PublicKeyType, VoteId};

/// Non-authority account settings: memo key, voting proxy/targets, and
/// preferred counts for the active sets the maintenance loop selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOptions {
    pub memo_key: PublicKeyType,
    /// Delegate voting stake to another account; `None` votes on its own behalf.
    pub voting_account: Option<AccountId>,
    pub num_witness: u16,
    pub num_committee: u16,
    pub votes: BTreeSet<VoteId>,
}

/// Protocol entity — §3.2. Name must be 2-63 chars, lowercase alnum/`.`/`-`,
/// letter-initial (checked by the account-create evaluator, not here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub owner: Authority,
    pub active: Authority,
    pub options: AccountOptions,
    pub registrar: AccountId,
    pub referrer: AccountId,
    pub lifetime_referrer: AccountId,
    /// Referrer's cut of network fee, in 1/`GRAPHENE_100_PERCENT`.
    pub referrer_rewards_percentage: u16,
    pub network_fee_percentage: u16,
    /// Unix time after which this account's membership perks lapse; `i64::MAX`
    /// for lifetime members, `0` for never-upgraded basic accounts.
    pub membership_expiration_date: i64,
    pub statistics: AccountStatisticsId,
    /// Accounts this account has whitelisted/blacklisted as an authority for
    /// asset whitelisting purposes (§3.2 Asset whitelist/blacklist authority sets).
    pub whitelisting_accounts: BTreeSet<AccountId>,
    pub blacklisting_accounts: BTreeSet<AccountId>,
    pub whitelisted_accounts: BTreeSet<AccountId>,
    pub blacklisted_accounts: BTreeSet<AccountId>,
}

impl Account {
    /// An authority is satisfiable when its threshold doesn't exceed the
    /// sum of declared weights — the sentinel TEMP account (threshold 0) is
    /// always satisfiable by definition.
    pub fn has_satisfiable_authorities(&self) -> bool {
        (self.owner.is_satisfiable() || self.owner.weight_threshold == 0)
            && (self.active.is_satisfiable() || self.active.weight_threshold == 0)
    }

    pub fn is_lifetime_member(&self) -> bool {
        self.membership_expiration_date == i64::MAX
    }

    /// The account whose votes this account's stake is attributed to during
    /// vote tally (§4.5.3 step 1): itself unless a voting proxy is set.
    pub fn vote_opinion_account(&self) -> AccountId {
        self.options.voting_account.unwrap_or(self.id)
    }
}

/// Validates the account-name grammar from §3.2: 2-63 chars, lowercase
/// alnum/`.`/`-`, must start with a letter, no leading/trailing/doubled
/// hyphen around a dot, no consecutive dots.
pub fn is_valid_account_name(name: &str) -> bool {
    if name.len() < 2 || name.len() > 63 {
        return false;
    }
    let mut parts = name.split('.');
    for part in parts.by_ref() {
        if !is_valid_name_part(part) {
            return false;
        }
    }
    true
}

fn is_valid_name_part(part: &str) -> bool {
    if part.is_empty() {
        return false;
    }
    let bytes = part.as_bytes();
    if !bytes[0].is_ascii_lowercase() {
        return false;
    }
    if bytes[bytes.len() - 1] == b'-' {
        return false;
    }
    bytes
        .iter()
        .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(is_valid_account_name("nathan"));
        assert!(is_valid_account_name("init0"));
        assert!(is_valid_account_name("a-b.c-d"));
    }

    #[test]
    fn invalid_names() {
        assert!(!is_valid_account_name("a"));
        assert!(!is_valid_account_name("1nathan"));
        assert!(!is_valid_account_name("Nathan"));
        assert!(!is_valid_account_name("nathan-"));
        assert!(!is_valid_account_name(""));
    }
}
