//! §4.4 BitAsset feed engine (C8): median aggregation across feed producers
//! and margin-call re-evaluation on every feed change.

use solstice_core::id::ObjectType;
use solstice_core::impl_entities::{AssetBitAssetData, PriceFeed};
use solstice_core::{AccountId, AssetId, ChainError, ChainResult, Price, Timestamp, VirtualOperation};

use crate::database::Database;
use crate::evaluator;

/// Records `publisher`'s feed for `asset` and re-runs median aggregation.
/// `feed.settlement_price`/MCR/MSSR are assumed already range-checked by the
/// `asset_publish_feed` evaluator (MCR >= 1001, MSSR >= 1000).
pub fn publish_feed(
    db: &mut Database,
    asset: AssetId,
    publisher: AccountId,
    feed: PriceFeed,
    now: Timestamp,
) -> ChainResult<Vec<VirtualOperation>> {
    let Some(asset_row) = db.assets.find(asset.raw.instance).cloned() else {
        return Err(ChainError::ObjectNotFound(asset.raw));
    };
    let Some(bitasset_id) = asset_row.bitasset_data_id else {
        return Err(ChainError::InvalidOperation("asset is not market-issued".into()));
    };
    db.asset_bitasset_data
        .modify(bitasset_id.raw.instance, |b| {
            b.feeds.insert(publisher, (now, feed));
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;
    update_median_feeds(db, asset, now)
}

/// §4.4: discards stale entries, recomputes the per-field median of whatever
/// remains (ties toward the lower publisher id — `BTreeMap<AccountId, _>`
/// iteration order already gives us that), and re-runs the margin-call loop.
pub fn update_median_feeds(db: &mut Database, asset: AssetId, now: Timestamp) -> ChainResult<Vec<VirtualOperation>> {
    let Some(asset_row) = db.assets.find(asset.raw.instance).cloned() else {
        return Ok(Vec::new());
    };
    let Some(bitasset_id) = asset_row.bitasset_data_id else {
        return Ok(Vec::new());
    };
    let Some(bitasset) = db.asset_bitasset_data.find(bitasset_id.raw.instance).cloned() else {
        return Ok(Vec::new());
    };
    let Some(bitasset_options) = asset_row.bitasset_options.clone() else {
        return Ok(Vec::new());
    };
    let lifetime = bitasset_options.minimum_feeds;

    let fresh: Vec<(AccountId, Timestamp, PriceFeed)> = bitasset
        .feeds
        .iter()
        .filter(|(_, (published_at, _))| {
            now.saturating_sub(*published_at) < bitasset_options.feed_lifetime_sec as i64
        })
        .map(|(acct, (ts, feed))| (*acct, *ts, feed.clone()))
        .collect();

    // Evict the stale entries from storage so the feed table doesn't grow
    // unbounded and so `get_full_accounts`-style reads never see them.
    let stale_keys: Vec<AccountId> = bitasset
        .feeds
        .keys()
        .filter(|k| !fresh.iter().any(|(acct, _, _)| acct == *k))
        .copied()
        .collect();
    if !stale_keys.is_empty() {
        db.asset_bitasset_data
            .modify(bitasset_id.raw.instance, |b| {
                for key in &stale_keys {
                    b.feeds.remove(key);
                }
            })
            .map_err(|e| ChainError::Storage(e.to_string()))?;
    }

    if fresh.len() < lifetime as usize {
        db.asset_bitasset_data
            .modify(bitasset_id.raw.instance, |b| {
                b.current_feed = None;
            })
            .map_err(|e| ChainError::Storage(e.to_string()))?;
        return Ok(Vec::new());
    }

    let median_price = median_by(&fresh, |f| f.settlement_price);
    let median_mcr = median_scalar(&fresh, |f| f.maintenance_collateral_ratio as i64) as u16;
    let median_mssr = median_scalar(&fresh, |f| f.maximum_short_squeeze_ratio as i64) as u16;
    let median_cer = median_by(&fresh, |f| f.core_exchange_rate);
    let median_time = median_scalar(&fresh, |(_, ts, _)| *ts) as Timestamp;

    let aggregated = PriceFeed {
        settlement_price: median_price,
        maintenance_collateral_ratio: median_mcr,
        maximum_short_squeeze_ratio: median_mssr,
        core_exchange_rate: median_cer,
    };

    db.asset_bitasset_data
        .modify(bitasset_id.raw.instance, |b| {
            b.current_feed = Some(aggregated);
            b.current_feed_publication_time = median_time;
        })
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    evaluator::run_margin_calls(db, asset)
}

/// Median of `Price` fields — since `Price` has no total order beyond
/// cross-multiplication, sort by that comparator and take the middle entry
/// (lower-tuple-order on ties, matching the BTreeMap publisher-id order).
fn median_by<F>(entries: &[(AccountId, Timestamp, PriceFeed)], extract: F) -> Price
where
    F: Fn(&PriceFeed) -> Price,
{
    let mut values: Vec<Price> = entries.iter().map(|(_, _, f)| extract(f)).collect();
    values.sort_by(|a, b| {
        if a.less_than(b) {
            std::cmp::Ordering::Less
        } else if b.less_than(a) {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    });
    values[values.len() / 2]
}

fn median_scalar<T, F>(entries: &[T], extract: F) -> i64
where
    F: Fn(&T) -> i64,
{
    let mut values: Vec<i64> = entries.iter().map(extract).collect();
    values.sort_unstable();
    values[values.len() / 2]
}

/// Block-tail housekeeping (§4.4 "Feeds expire ... via a `by_feed_expiration`
/// secondary index"): re-runs median aggregation for every market-issued
/// asset whose oldest feed has aged out since the last check. We don't keep
/// a dedicated secondary index — bitasset count is small enough that a scan
/// per block is cheap and avoids a second piece of state to keep in sync.
pub fn expire_stale_feeds(db: &mut Database, now: Timestamp) -> ChainResult<Vec<VirtualOperation>> {
    let mut virtual_ops = Vec::new();
    let candidates: Vec<AssetId> = db
        .assets
        .iter()
        .filter(|(_, a)| a.is_market_issued())
        .map(|(_, a)| a.id)
        .collect();
    for asset in candidates {
        let Some(asset_row) = db.assets.find(asset.raw.instance) else { continue };
        let Some(bitasset_id) = asset_row.bitasset_data_id else { continue };
        let Some(bitasset) = db.asset_bitasset_data.find(bitasset_id.raw.instance) else { continue };
        let Some(bitasset_options) = db.assets.find(asset.raw.instance).and_then(|a| a.bitasset_options.clone()) else {
            continue;
        };
        let oldest = bitasset.feeds.values().map(|(ts, _)| *ts).min();
        let has_expired = matches!(oldest, Some(ts) if now.saturating_sub(ts) >= bitasset_options.feed_lifetime_sec as i64);
        let missing_feed_but_has_entries = bitasset.current_feed.is_none() && !bitasset.feeds.is_empty();
        if has_expired || missing_feed_but_has_entries {
            virtual_ops.extend(update_median_feeds(db, asset, now)?);
        }
    }
    Ok(virtual_ops)
}

/// Convenience used by the `asset_settle` evaluator to price a settlement at
/// the currently active feed (or, once globally settled, the frozen price).
pub fn settlement_price(db: &Database, asset: AssetId) -> ChainResult<Price> {
    let asset_row = db.assets.find(asset.raw.instance).ok_or(ChainError::ObjectNotFound(asset.raw))?;
    let bitasset_id = asset_row
        .bitasset_data_id
        .ok_or_else(|| ChainError::InvalidOperation("asset is not market-issued".into()))?;
    let bitasset = db
        .asset_bitasset_data
        .find(bitasset_id.raw.instance)
        .ok_or_else(|| ChainError::InvariantViolation("bitasset data missing".into()))?;
    bitasset
        .settlement_price
        .or_else(|| bitasset.current_feed.clone().map(|f| f.settlement_price))
        .ok_or_else(|| ChainError::InvalidOperation("no active feed to settle against".into()))
}
