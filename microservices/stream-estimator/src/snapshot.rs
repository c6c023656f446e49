//! Account snapshot input and the report produced from it

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use drips_core::{AccountId, DripsError, Result, StreamId, TokenAddress};
use drips_engine::{
    build_account_history, build_timeline, estimate_account, AccountEstimate, AccountMetadata,
    AssetConfigEvents, CycleClock, SqueezeExclusion, SqueezeRecord, TimelineItem,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Everything indexed for one funding account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub asset_configs: Vec<AssetConfigEvents>,
    #[serde(default)]
    pub metadata: Option<AccountMetadata>,
    #[serde(default)]
    pub squeezes: Vec<SqueezeRecord>,
}

impl AccountSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&raw)?;
        debug!(
            path = %path.display(),
            account = %snapshot.account_id,
            tokens = snapshot.asset_configs.len(),
            "Loaded account snapshot"
        );
        Ok(snapshot)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamTimeline {
    pub stream_id: StreamId,
    pub token_address: TokenAddress,
    pub events: Vec<TimelineItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatorReport {
    pub evaluated_at: DateTime<Utc>,
    pub estimate: AccountEstimate,
    pub timelines: Vec<StreamTimeline>,
}

/// Estimate the account and replay the timelines of its streams.
pub fn build_report(
    snapshot: &AccountSnapshot,
    now: DateTime<Utc>,
    clock: &CycleClock,
    only_stream: Option<&str>,
) -> Result<EstimatorReport> {
    let sender = &snapshot.account_id;
    let histories =
        build_account_history(sender, &snapshot.asset_configs, snapshot.metadata.as_ref())?;
    let squeezes: Vec<SqueezeExclusion> =
        snapshot.squeezes.iter().cloned().map(SqueezeExclusion::from).collect();

    let estimate = estimate_account(sender, &histories, now, clock, &squeezes)?;

    let mut timelines = Vec::new();
    for history in &histories {
        let stream_ids: BTreeSet<&StreamId> = history
            .items
            .iter()
            .flat_map(|item| item.streams.iter().map(|s| &s.stream_id))
            .filter(|id| only_stream.map_or(true, |wanted| id.as_str() == wanted))
            .collect();

        for stream_id in stream_ids {
            timelines.push(StreamTimeline {
                stream_id: stream_id.clone(),
                token_address: history.token_address.clone(),
                events: build_timeline(stream_id, history)?,
            });
        }
    }

    if let Some(wanted) = only_stream {
        if timelines.is_empty() {
            return Err(DripsError::NotFound(format!(
                "stream {} for account {}",
                wanted, sender
            )));
        }
    }

    info!(
        account = %sender,
        asset_configs = estimate.asset_configs.len(),
        timelines = timelines.len(),
        "Built estimator report"
    );

    Ok(EstimatorReport {
        evaluated_at: now,
        estimate,
        timelines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use drips_engine::TimelineItemType;

    const SAMPLE: &str = include_str!("../fixtures/sample.json");

    fn sample() -> AccountSnapshot {
        serde_json::from_str(SAMPLE).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_067_400, 0).unwrap()
    }

    #[test]
    fn test_sample_report() {
        let clock = CycleClock::new(604_800).unwrap();
        let report = build_report(&sample(), now(), &clock, None).unwrap();

        let totals = &report.estimate.asset_configs[0].total.totals;
        assert_eq!(totals.total_streamed.to_string(), "250000000000");
        assert_eq!(totals.total_amount_per_second.to_string(), "1000000000");
        assert_eq!(totals.remaining_balance.to_string(), "750000000000");

        assert_eq!(report.timelines.len(), 2);
        let salary = &report.timelines[1];
        assert_eq!(salary.stream_id.as_str(), "1000-0x6b175474e89094c44da98b954eedeac495271d0f-2");
        assert_eq!(salary.events.last().unwrap().kind, TimelineItemType::OutOfFunds);
    }

    #[test]
    fn test_single_stream_filter() {
        let clock = CycleClock::new(604_800).unwrap();
        let wanted = "1000-0x6b175474e89094c44da98b954eedeac495271d0f-1";
        let report = build_report(&sample(), now(), &clock, Some(wanted)).unwrap();
        assert_eq!(report.timelines.len(), 1);
        assert_eq!(report.timelines[0].events.len(), 2);

        let err = build_report(&sample(), now(), &clock, Some("1000-0xabc-9")).unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let clock = CycleClock::new(604_800).unwrap();
        let report = build_report(&sample(), now(), &clock, None).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["estimate"]["assetConfigs"][0]["currentCycle"].is_object());
        assert_eq!(json["timelines"][0]["events"][0]["type"], "START");
    }

    #[test]
    fn test_missing_file() {
        let err = AccountSnapshot::load(Path::new("/nonexistent/account.json")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
