//! History Builder
//!
//! Folds the `StreamsSet` snapshots of one funding account into per-token history
//! items, synthesizing paused entries for metadata streams that dropped out of the
//! on-chain receiver set.

use std::collections::{BTreeSet, HashMap, HashSet};

use drips_core::{AccountId, AccountRef, DripsError, Result, StreamId, TokenAddress};
use tracing::{debug, warn};

use crate::codec::{decode_max_end, decode_raw_config, normalize_balance};
use crate::metadata::MetadataIndex;
use crate::types::{
    AccountMetadata, AssetConfigEvents, AssetConfigHistory, AssetConfigHistoryItem,
    AssetConfigMetadata, Balance, HistoricalStream, SnapshotEvent,
};

/// Build the history of one (account, token) pair from its snapshot events, oldest first.
pub fn build_asset_config_history(
    sender: &AccountId,
    token: &TokenAddress,
    events: &[SnapshotEvent],
    metadata: Option<&AssetConfigMetadata>,
) -> Result<AssetConfigHistory> {
    let index = MetadataIndex::build(sender, token, metadata)?;

    let mut items: Vec<AssetConfigHistoryItem> = Vec::with_capacity(events.len());
    // Streams that had a config in some strictly earlier item, with their last receiver
    let mut previously_active: HashMap<StreamId, AccountRef> = HashMap::new();

    for event in events {
        if let Some(previous) = items.last() {
            if event.timestamp <= previous.timestamp {
                return Err(DripsError::Integrity(format!(
                    "snapshot {} at {} does not follow {} at {}",
                    event.history_hash, event.timestamp, previous.history_hash, previous.timestamp
                )));
            }
        }

        let mut remaining: BTreeSet<&StreamId> = index.stream_ids().collect();
        let mut seen_drip_ids: HashSet<u32> = HashSet::with_capacity(event.receivers.len());
        let mut streams = Vec::with_capacity(event.receivers.len() + remaining.len());

        for receiver in &event.receivers {
            let config = decode_raw_config(&receiver.config)?;
            if !seen_drip_ids.insert(config.drip_id) {
                return Err(DripsError::Integrity(format!(
                    "drip id {} appears twice in snapshot {}",
                    config.drip_id, event.history_hash
                )));
            }

            let stream_id = StreamId::new(sender, token, config.drip_id);
            let details = index.match_drip(config.drip_id)?.cloned();
            remaining.remove(&stream_id);

            streams.push(HistoricalStream {
                stream_id,
                config: Some(config),
                is_managed: details.is_some(),
                receiver: AccountRef::new(receiver.account_id.clone()),
                details,
            });
        }

        // Metadata streams that never ran are not paused yet.
        for stream_id in remaining {
            if let Some(receiver) = previously_active.get(stream_id) {
                streams.push(HistoricalStream {
                    stream_id: stream_id.clone(),
                    config: None,
                    is_managed: true,
                    receiver: receiver.clone(),
                    details: index.details(stream_id).cloned(),
                });
            }
        }

        for stream in streams.iter().filter(|s| !s.is_paused()) {
            previously_active.insert(stream.stream_id.clone(), stream.receiver.clone());
        }

        items.push(AssetConfigHistoryItem {
            timestamp: event.timestamp,
            balance: Balance {
                token_address: token.clone(),
                amount: normalize_balance(&event.balance_raw),
            },
            runs_out_of_funds: decode_max_end(event.max_end_raw)?,
            streams,
            history_hash: event.history_hash.clone(),
            receivers_hash: event.receivers_hash.clone(),
        });
    }

    debug!(
        sender = %sender,
        token = %token,
        items = items.len(),
        managed_streams = index.len(),
        "Built asset config history"
    );

    Ok(AssetConfigHistory {
        sender: sender.clone(),
        token_address: token.clone(),
        items,
    })
}

/// Build the history of every token an account has streamed.
pub fn build_account_history(
    sender: &AccountId,
    asset_configs: &[AssetConfigEvents],
    metadata: Option<&AccountMetadata>,
) -> Result<Vec<AssetConfigHistory>> {
    asset_configs
        .iter()
        .map(|asset_config| {
            let token = &asset_config.token_address;
            let token_metadata = metadata
                .map(|m| find_asset_config(m, token))
                .transpose()?
                .flatten();
            if metadata.is_some() && token_metadata.is_none() {
                warn!(sender = %sender, token = %token, "No metadata for asset config");
            }
            build_asset_config_history(sender, token, &asset_config.events, token_metadata)
        })
        .collect()
}

fn find_asset_config<'a>(
    metadata: &'a AccountMetadata,
    token: &TokenAddress,
) -> Result<Option<&'a AssetConfigMetadata>> {
    let mut matches = metadata
        .asset_configs
        .iter()
        .filter(|a| &a.token_address == token);
    let first = matches.next();
    if matches.next().is_some() {
        return Err(DripsError::Integrity(format!(
            "metadata lists token {} more than once",
            token
        )));
    }
    Ok(first)
}
