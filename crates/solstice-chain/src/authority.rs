//! §4.2 step 6 — authority satisfaction: given the set of keys/addresses
//! recoverable from a transaction's signatures (plus, for proposals, any
//! standing key/address approvals), determine whether an `Authority`'s
//! weight threshold is met, expanding nested `account_auths` up to
//! `MAX_AUTHORITY_DEPTH`.

use std::collections::BTreeSet;

use solstice_core::constants::MAX_AUTHORITY_DEPTH;
use solstice_core::{Address, Authority, ChainError, ChainResult, PublicKeyType};

use crate::database::Database;

/// The weight of `authority` satisfiable from `available_keys`/
/// `available_addresses`, expanding nested accounts' *active* authorities
/// recursively. Returns an error once `MAX_AUTHORITY_DEPTH` is exceeded
/// rather than looping forever on a cyclic authority graph.
pub fn authority_weight(
    db: &Database,
    authority: &Authority,
    available_keys: &BTreeSet<PublicKeyType>,
    available_addresses: &BTreeSet<Address>,
    depth: u8,
) -> ChainResult<u32> {
    if depth > MAX_AUTHORITY_DEPTH as u8 {
        return Err(ChainError::AuthorityDepthExceeded);
    }
    let mut total = 0u32;
    for (key, weight) in &authority.key_auths {
        if available_keys.contains(key) {
            total += *weight as u32;
        }
    }
    for (address, weight) in &authority.address_auths {
        if available_addresses.contains(address) {
            total += *weight as u32;
        }
    }
    for (account_id, weight) in &authority.account_auths {
        let Some(account) = db.accounts.find(account_id.raw.instance) else {
            continue;
        };
        let sub_weight = authority_weight(db, &account.active, available_keys, available_addresses, depth + 1)?;
        if sub_weight >= account.active.weight_threshold {
            total += *weight as u32;
        }
    }
    Ok(total)
}

/// Whether `authority`'s threshold is met. The zero-threshold sentinel
/// accounts (`TEMP_ACCOUNT`) are always satisfied regardless of signatures.
pub fn is_satisfied(
    db: &Database,
    authority: &Authority,
    available_keys: &BTreeSet<PublicKeyType>,
    available_addresses: &BTreeSet<Address>,
) -> ChainResult<bool> {
    if authority.weight_threshold == 0 {
        return Ok(true);
    }
    let weight = authority_weight(db, authority, available_keys, available_addresses, 0)?;
    Ok(weight >= authority.weight_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solstice_core::id::{ObjectType, Space};
    use solstice_core::{Account, AccountOptions, Id, VoteId, VoteType};
    use std::collections::BTreeSet as Set;

    fn key(byte: u8) -> PublicKeyType {
        let mut raw = [0u8; 33];
        raw[0] = 2;
        raw[1] = byte;
        PublicKeyType(raw)
    }

    #[test]
    fn single_key_authority_satisfied_by_matching_key() {
        let db = Database::new();
        let authority = Authority::single_key(key(1));
        let mut keys = Set::new();
        keys.insert(key(1));
        assert!(is_satisfied(&db, &authority, &keys, &Set::new()).unwrap());
        assert!(!is_satisfied(&db, &authority, &Set::new(), &Set::new()).unwrap());
    }

    #[test]
    fn nested_account_authority_expands_recursively() {
        let mut db = Database::new();
        let nested_id: solstice_core::AccountId = Id::from_instance(Space::Protocol, ObjectType::Account, 5);
        let nested_stats = Id::from_instance(Space::Implementation, ObjectType::AccountStatistics, 0);
        db.accounts.create(|_| Account {
            id: nested_id,
            name: "nested".into(),
            owner: Authority::single_key(key(9)),
            active: Authority::single_key(key(2)),
            options: AccountOptions {
                memo_key: key(2),
                voting_account: None,
                num_witness: 0,
                num_committee: 0,
                votes: Set::new(),
            },
            registrar: nested_id,
            referrer: nested_id,
            lifetime_referrer: nested_id,
            referrer_rewards_percentage: 0,
            network_fee_percentage: 0,
            membership_expiration_date: i64::MAX,
            statistics: nested_stats,
            whitelisting_accounts: Set::new(),
            blacklisting_accounts: Set::new(),
            whitelisted_accounts: Set::new(),
            blacklisted_accounts: Set::new(),
        });
        let mut top = Authority::default();
        top.weight_threshold = 1;
        top.account_auths.push((nested_id, 1));

        let mut keys = Set::new();
        keys.insert(key(2));
        assert!(is_satisfied(&db, &top, &keys, &Set::new()).unwrap());
        assert!(!is_satisfied(&db, &top, &Set::new(), &Set::new()).unwrap());
        let _ = VoteId::new(VoteType::Witness, 0);
    }
}
