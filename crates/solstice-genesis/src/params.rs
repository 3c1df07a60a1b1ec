use serde::{Deserialize, Serialize};

use solstice_core::{Amount, PublicKeyType, Timestamp};

/// One account present from block zero — committee/witness operators, a
/// faucet, whatever the launching network needs before anyone can submit
/// `account_create` themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub name: String,
    pub owner_key: PublicKeyType,
    /// Defaults to `owner_key` when omitted, matching a single-key account.
    pub active_key: Option<PublicKeyType>,
    pub is_lifetime_member: bool,
}

/// One witness seat filled from block zero, backed by one of `accounts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisWitness {
    pub owner_name: String,
    pub block_signing_key: PublicKeyType,
}

/// One committee seat filled from block zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisCommitteeMember {
    pub owner_name: String,
}

/// A CORE balance handed out at genesis; the remainder of `max_core_supply`
/// after all handouts are summed is credited to the committee account as
/// the network's initial reserve pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub owner_name: String,
    pub amount: Amount,
}

/// Everything `solstice-genesis::apply_genesis` needs to build genesis
/// state — the JSON file a node operator hands to `solstice-node` at first
/// launch (§0 Configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisParams {
    pub initial_timestamp: Timestamp,
    pub core_asset_symbol: String,
    pub max_core_supply: Amount,
    pub initial_accounts: Vec<GenesisAccount>,
    pub initial_witness_candidates: Vec<GenesisWitness>,
    pub initial_committee_candidates: Vec<GenesisCommitteeMember>,
    /// How many of `initial_witness_candidates` start in `active_witnesses`;
    /// must not exceed the candidate count.
    pub initial_active_witnesses: usize,
    pub initial_balances: Vec<GenesisBalance>,
}
