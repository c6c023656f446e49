//! Engine data model
//!
//! Inputs mirror the shapes produced by the event indexer and the off-chain metadata
//! documents (camelCase JSON). Outputs are freshly allocated per call.

use chrono::{DateTime, TimeZone, Utc};
use drips_core::{AccountId, AccountRef, DripsError, Result, StreamId, TokenAddress};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Serde adapter writing token amounts as decimal strings.
pub mod amount {
    use drips_core::is_canonical_uint;
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if !is_canonical_uint(&raw) {
            return Err(de::Error::custom(format!(
                "amount '{}' is not a canonical non-negative integer",
                raw
            )));
        }
        raw.parse().map_err(de::Error::custom)
    }
}

/// Decoded stream configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    pub drip_id: u32,
    /// Smallest token unit per second, scaled by `AMT_PER_SEC_MULTIPLIER`
    #[serde(with = "amount")]
    pub amount_per_second: BigUint,
    /// `None` means the stream starts at its history item's timestamp
    pub start: Option<DateTime<Utc>>,
    /// `None` means open-ended
    pub duration_seconds: Option<u32>,
}

/// Off-chain details of a managed stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDetails {
    pub name: Option<String>,
    pub description: Option<String>,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalStream {
    pub stream_id: StreamId,
    /// `None` means the stream is paused in this history item
    pub config: Option<StreamConfig>,
    pub is_managed: bool,
    pub receiver: AccountRef,
    pub details: Option<StreamDetails>,
}

impl HistoricalStream {
    pub fn is_paused(&self) -> bool {
        self.config.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub token_address: TokenAddress,
    #[serde(with = "amount")]
    pub amount: BigUint,
}

/// Complete receiver set of one account and token, effective from `timestamp`
/// until the next item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetConfigHistoryItem {
    pub timestamp: DateTime<Utc>,
    pub balance: Balance,
    pub runs_out_of_funds: Option<DateTime<Utc>>,
    pub streams: Vec<HistoricalStream>,
    pub history_hash: String,
    pub receivers_hash: String,
}

impl AssetConfigHistoryItem {
    pub fn stream(&self, stream_id: &StreamId) -> Option<&HistoricalStream> {
        self.streams.iter().find(|s| &s.stream_id == stream_id)
    }
}

/// History of one funding account's streams for one token, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetConfigHistory {
    pub sender: AccountId,
    pub token_address: TokenAddress,
    pub items: Vec<AssetConfigHistoryItem>,
}

/// Receiver listed by a snapshot event, with its packed config in decimal form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverSeen {
    pub account_id: AccountId,
    pub config: String,
}

/// On-chain `StreamsSet` snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "amount")]
    pub balance_raw: BigUint,
    pub max_end_raw: u64,
    pub history_hash: String,
    pub receivers_hash: String,
    pub receivers: Vec<ReceiverSeen>,
}

/// Snapshot events of one token, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetConfigEvents {
    pub token_address: TokenAddress,
    pub events: Vec<SnapshotEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialDripsConfig {
    pub drip_id: String,
    pub raw: String,
    pub amount_per_second: String,
    pub start_timestamp: u64,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    pub id: String,
    pub initial_drips_config: InitialDripsConfig,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetConfigMetadata {
    pub token_address: TokenAddress,
    pub streams: Vec<StreamMetadata>,
}

/// Latest off-chain metadata document of an account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMetadata {
    pub asset_configs: Vec<AssetConfigMetadata>,
}

/// Squeeze event as indexed on-chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqueezeRecord {
    pub sender_id: AccountId,
    pub streams_history_hashes: Vec<String>,
    pub block_timestamp: DateTime<Utc>,
}

/// Pre-claim that moves the accounting start of covered history items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqueezeExclusion {
    pub sender_id: AccountId,
    pub history_hashes_covered: HashSet<String>,
    pub claimed_through: DateTime<Utc>,
}

impl SqueezeExclusion {
    pub fn covers(&self, sender: &AccountId, history_hash: &str) -> bool {
        &self.sender_id == sender && self.history_hashes_covered.contains(history_hash)
    }
}

impl From<SqueezeRecord> for SqueezeExclusion {
    fn from(record: SqueezeRecord) -> Self {
        Self {
            sender_id: record.sender_id,
            history_hashes_covered: record.streams_history_hashes.into_iter().collect(),
            claimed_through: record.block_timestamp,
        }
    }
}

/// Half-open accounting interval `[from, to)`; `to: None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub from: DateTime<Utc>,
    pub to: Option<DateTime<Utc>>,
}

impl Window {
    pub fn new(from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Result<Self> {
        if let Some(to) = to {
            if to < from {
                return Err(DripsError::Validation(format!(
                    "window ends ({}) before it starts ({})",
                    to, from
                )));
            }
        }
        Ok(Self { from, to })
    }

    /// `[unix epoch, +infinity)`
    pub fn all_time() -> Self {
        Self {
            // The default UTC datetime is the unix epoch.
            from: DateTime::<Utc>::default(),
            to: None,
        }
    }

    pub(crate) fn from_millis(&self) -> i64 {
        millis(&self.from)
    }

    pub(crate) fn to_millis(&self) -> Option<i64> {
        self.to.as_ref().map(millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineItemType {
    Start,
    Pause,
    End,
    OutOfFunds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    #[serde(rename = "type")]
    pub kind: TimelineItemType,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "amount")]
    pub cumulative_amount: BigUint,
    #[serde(with = "amount")]
    pub delta_per_second: BigUint,
}

pub(crate) fn millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| DripsError::Decode(format!("timestamp {}ms is out of range", ms)))
}

pub(crate) fn from_unix_secs(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| DripsError::Decode(format!("timestamp {}s is out of range", secs)))
}
