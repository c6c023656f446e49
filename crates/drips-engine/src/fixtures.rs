//! Builders shared by the unit tests

use chrono::{DateTime, Utc};
use drips_core::{AccountId, AccountRef, StreamId, TokenAddress};
use num_bigint::BigUint;

use crate::codec::pack_stream_config;
use crate::types::{
    from_unix_secs, AssetConfigHistory, AssetConfigHistoryItem, AssetConfigMetadata, Balance,
    HistoricalStream, InitialDripsConfig, ReceiverSeen, SnapshotEvent, StreamConfig,
    StreamDetails, StreamMetadata,
};

pub(crate) const TOKEN: &str = "0x00000000000000000000000000000000000000aa";

pub(crate) fn sender() -> AccountId {
    AccountId::parse("1000").unwrap()
}

pub(crate) fn token() -> TokenAddress {
    TokenAddress::parse(TOKEN).unwrap()
}

pub(crate) fn ts(secs: i64) -> DateTime<Utc> {
    from_unix_secs(secs).unwrap()
}

pub(crate) fn config(
    drip_id: u32,
    amount_per_second: u64,
    start: Option<i64>,
    duration_seconds: Option<u32>,
) -> StreamConfig {
    StreamConfig {
        drip_id,
        amount_per_second: BigUint::from(amount_per_second),
        start: start.map(ts),
        duration_seconds,
    }
}

pub(crate) fn receiver(
    account_id: &str,
    drip_id: u32,
    amount_per_second: u64,
    start: Option<i64>,
    duration_seconds: Option<u32>,
) -> ReceiverSeen {
    let packed = pack_stream_config(&config(drip_id, amount_per_second, start, duration_seconds))
        .unwrap();
    ReceiverSeen {
        account_id: AccountId::parse(account_id).unwrap(),
        config: packed.to_string(),
    }
}

pub(crate) fn event(
    at: i64,
    balance_raw: u64,
    max_end_raw: u64,
    history_hash: &str,
    receivers: Vec<ReceiverSeen>,
) -> SnapshotEvent {
    SnapshotEvent {
        timestamp: ts(at),
        balance_raw: BigUint::from(balance_raw),
        max_end_raw,
        history_hash: history_hash.to_string(),
        receivers_hash: format!("receivers-{}", history_hash),
        receivers,
    }
}

pub(crate) fn metadata_for(drip_ids: &[u32]) -> AssetConfigMetadata {
    let streams = drip_ids
        .iter()
        .map(|drip_id| {
            let raw = pack_stream_config(&config(*drip_id, 1, None, None)).unwrap();
            StreamMetadata {
                id: format!("stream-{}", drip_id),
                initial_drips_config: InitialDripsConfig {
                    drip_id: drip_id.to_string(),
                    raw: raw.to_string(),
                    amount_per_second: "1".to_string(),
                    start_timestamp: 0,
                    duration_seconds: 0,
                },
                name: Some(format!("stream {}", drip_id)),
                description: None,
                archived: false,
            }
        })
        .collect();
    AssetConfigMetadata {
        token_address: token(),
        streams,
    }
}

/// Active stream to receiver account "7"
pub(crate) fn active(
    drip_id: u32,
    amount_per_second: u64,
    start: Option<i64>,
    duration_seconds: Option<u32>,
) -> HistoricalStream {
    HistoricalStream {
        stream_id: StreamId::new(&sender(), &token(), drip_id),
        config: Some(config(drip_id, amount_per_second, start, duration_seconds)),
        is_managed: true,
        receiver: AccountRef::new(AccountId::parse("7").unwrap()),
        details: Some(StreamDetails {
            name: None,
            description: None,
            archived: false,
        }),
    }
}

pub(crate) fn paused(drip_id: u32) -> HistoricalStream {
    HistoricalStream {
        config: None,
        ..active(drip_id, 0, None, None)
    }
}

pub(crate) fn unmanaged(mut stream: HistoricalStream) -> HistoricalStream {
    stream.is_managed = false;
    stream.details = None;
    stream
}

/// History item at `at` seconds. `balance` is already normalized.
pub(crate) fn item(
    at: i64,
    balance: u64,
    runs_out_of_funds: Option<i64>,
    history_hash: &str,
    streams: Vec<HistoricalStream>,
) -> AssetConfigHistoryItem {
    AssetConfigHistoryItem {
        timestamp: ts(at),
        balance: Balance {
            token_address: token(),
            amount: BigUint::from(balance),
        },
        runs_out_of_funds: runs_out_of_funds.map(ts),
        streams,
        history_hash: history_hash.to_string(),
        receivers_hash: format!("receivers-{}", history_hash),
    }
}

pub(crate) fn history(items: Vec<AssetConfigHistoryItem>) -> AssetConfigHistory {
    AssetConfigHistory {
        sender: sender(),
        token_address: token(),
        items,
    }
}
