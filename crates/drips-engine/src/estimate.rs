//! Windowed Estimator
//!
//! Computes how much each stream of an asset config delivered inside a time window and
//! what it is delivering right now. All amounts stay in the `amtPerSec` fixed-point unit;
//! millisecond durations are converted with a single truncating division by 1000.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use drips_core::{AccountId, AccountRef, DripsError, Result, StreamId, TokenAddress};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cycle::{CycleClock, CycleInfo};
use crate::types::{
    amount, millis, AssetConfigHistory, AssetConfigHistoryItem, HistoricalStream,
    SqueezeExclusion, StreamConfig, Window,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEstimate {
    pub stream_id: StreamId,
    pub receiver: AccountRef,
    #[serde(with = "amount")]
    pub total_streamed: BigUint,
    #[serde(with = "amount")]
    pub current_amount_per_second: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateTotals {
    #[serde(with = "amount")]
    pub total_streamed: BigUint,
    #[serde(with = "amount")]
    pub total_amount_per_second: BigUint,
    #[serde(with = "amount")]
    pub remaining_balance: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetConfigEstimate {
    pub token_address: TokenAddress,
    pub streams: Vec<StreamEstimate>,
    pub totals: EstimateTotals,
}

/// All-time and current-cycle estimates of one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetConfigEstimates {
    pub token_address: TokenAddress,
    pub total: AssetConfigEstimate,
    pub current_cycle: AssetConfigEstimate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEstimate {
    pub sender: AccountId,
    pub cycle: CycleInfo,
    pub asset_configs: Vec<AssetConfigEstimates>,
}

/// Millisecond bounds during which a stream accrued inside one history item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StreamingInterval {
    pub from: i64,
    pub until: i64,
}

impl StreamingInterval {
    fn valid_millis(&self) -> u64 {
        u64::try_from(self.until - self.from).unwrap_or(0)
    }
}

struct ItemStreamEstimate<'a> {
    stream: &'a HistoricalStream,
    streamed: BigUint,
    current_amount_per_second: BigUint,
}

/// Estimate one asset config over `window`.
///
/// `now` bounds the last history item; it is never read from the system clock, so the
/// result is deterministic for identical inputs.
pub fn estimate_asset_config(
    history: &AssetConfigHistory,
    window: &Window,
    now: DateTime<Utc>,
    squeezes: &[SqueezeExclusion],
) -> Result<AssetConfigEstimate> {
    let items = &history.items;
    let now_ms = millis(&now);
    let relevant: Vec<usize> = (0..items.len())
        .filter(|index| is_relevant(items, *index, window))
        .collect();

    let mut per_stream: BTreeMap<StreamId, StreamEstimate> = BTreeMap::new();
    let mut streamed_in_last_item = BigUint::zero();

    for (position, &index) in relevant.iter().enumerate() {
        let is_last = position + 1 == relevant.len();
        let mut streamed_in_item = BigUint::zero();

        for estimate in estimate_item(history, index, window, now_ms, squeezes) {
            streamed_in_item += &estimate.streamed;

            let entry = per_stream
                .entry(estimate.stream.stream_id.clone())
                .or_insert_with(|| StreamEstimate {
                    stream_id: estimate.stream.stream_id.clone(),
                    receiver: estimate.stream.receiver.clone(),
                    total_streamed: BigUint::zero(),
                    current_amount_per_second: BigUint::zero(),
                });
            entry.total_streamed += estimate.streamed;
            entry.receiver = estimate.stream.receiver.clone();
            // Only the latest relevant item describes the rate at the window's end.
            entry.current_amount_per_second = if is_last {
                estimate.current_amount_per_second
            } else {
                BigUint::zero()
            };
        }

        if is_last {
            streamed_in_last_item = streamed_in_item;
        }
    }

    let remaining_balance = match relevant.last() {
        None => BigUint::zero(),
        Some(&index) => {
            let item = &items[index];
            let balance = &item.balance.amount;
            if streamed_in_last_item > *balance {
                warn!(
                    sender = %history.sender,
                    token = %history.token_address,
                    history_hash = %item.history_hash,
                    balance = %balance,
                    streamed = %streamed_in_last_item,
                    "Streamed more than the balance held"
                );
                return Err(DripsError::Integrity(format!(
                    "history item {} streamed {} from a balance of {}",
                    item.history_hash, streamed_in_last_item, balance
                )));
            }
            balance - &streamed_in_last_item
        }
    };

    let streams: Vec<StreamEstimate> = per_stream.into_values().collect();
    let totals = EstimateTotals {
        total_streamed: streams.iter().map(|s| &s.total_streamed).sum(),
        total_amount_per_second: streams.iter().map(|s| &s.current_amount_per_second).sum(),
        remaining_balance,
    };

    debug!(
        sender = %history.sender,
        token = %history.token_address,
        relevant_items = relevant.len(),
        streams = streams.len(),
        total_streamed = %totals.total_streamed,
        "Estimated asset config"
    );

    Ok(AssetConfigEstimate {
        token_address: history.token_address.clone(),
        streams,
        totals,
    })
}

/// Estimate every asset config of an account for all time and for the current cycle.
pub fn estimate_account(
    sender: &AccountId,
    histories: &[AssetConfigHistory],
    now: DateTime<Utc>,
    clock: &CycleClock,
    squeezes: &[SqueezeExclusion],
) -> Result<AccountEstimate> {
    let cycle = clock.cycle_at(now)?;
    let cycle_window = clock.current_window(now)?;
    let all_time = Window::all_time();

    let asset_configs = histories
        .iter()
        .map(|history| {
            if &history.sender != sender {
                return Err(DripsError::Validation(format!(
                    "history of {} passed to the estimate of {}",
                    history.sender, sender
                )));
            }
            Ok(AssetConfigEstimates {
                token_address: history.token_address.clone(),
                total: estimate_asset_config(history, &all_time, now, squeezes)?,
                current_cycle: estimate_asset_config(history, &cycle_window, now, squeezes)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        sender = %sender,
        asset_configs = asset_configs.len(),
        cycle_start = %cycle.current_cycle_start_timestamp,
        "Estimated account"
    );

    Ok(AccountEstimate {
        sender: sender.clone(),
        cycle,
        asset_configs,
    })
}

/// A history item matters to a window when it was active at any point inside it.
fn is_relevant(items: &[AssetConfigHistoryItem], index: usize, window: &Window) -> bool {
    let timestamp = millis(&items[index].timestamp);
    let from = window.from_millis();
    let before_end = window.to_millis().map_or(true, |to| timestamp < to);
    let inside = timestamp >= from && before_end;

    match items.get(index + 1) {
        None => inside || timestamp < from,
        Some(next) => inside || (millis(&next.timestamp) >= from && before_end),
    }
}

fn estimate_item<'a>(
    history: &'a AssetConfigHistory,
    index: usize,
    window: &Window,
    now_ms: i64,
    squeezes: &[SqueezeExclusion],
) -> Vec<ItemStreamEstimate<'a>> {
    let item = &history.items[index];
    let next_or_now = history
        .items
        .get(index + 1)
        .map_or(now_ms, |next| millis(&next.timestamp));
    // First matching squeeze wins, even if a later one claimed further.
    let squeezed_at = squeezes
        .iter()
        .find(|squeeze| squeeze.covers(&history.sender, &item.history_hash))
        .map(|squeeze| millis(&squeeze.claimed_through));

    item.streams
        .iter()
        .map(|stream| match &stream.config {
            None => ItemStreamEstimate {
                stream,
                streamed: BigUint::zero(),
                current_amount_per_second: BigUint::zero(),
            },
            Some(config) => {
                let interval = streaming_interval(item, config, window, next_or_now, squeezed_at);
                let streamed =
                    BigUint::from(interval.valid_millis()) * &config.amount_per_second / 1000u32;
                let still_streaming =
                    interval.until >= next_or_now && interval.from < next_or_now;
                ItemStreamEstimate {
                    stream,
                    streamed,
                    current_amount_per_second: if still_streaming {
                        config.amount_per_second.clone()
                    } else {
                        BigUint::zero()
                    },
                }
            }
        })
        .collect()
}

pub(crate) fn streaming_interval(
    item: &AssetConfigHistoryItem,
    config: &StreamConfig,
    window: &Window,
    next_or_now: i64,
    squeezed_at: Option<i64>,
) -> StreamingInterval {
    let item_ts = millis(&item.timestamp);
    let start = config.start.as_ref().map_or(item_ts, millis);

    let from = [Some(item_ts), Some(start), Some(window.from_millis()), squeezed_at]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(item_ts);

    let scheduled_end = config
        .duration_seconds
        .map(|duration| start + i64::from(duration) * 1000);
    let until = [
        item.runs_out_of_funds.as_ref().map(millis),
        scheduled_end,
        Some(next_or_now),
        window.to_millis(),
    ]
    .into_iter()
    .flatten()
    .min()
    .unwrap_or(next_or_now);

    StreamingInterval { from, until }
}
