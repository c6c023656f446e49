//! Timeline Builder
//!
//! Replays one stream across its whole history into discrete events with cumulative totals.

use drips_core::{DripsError, Result, StreamId};
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::debug;

use crate::types::{
    from_millis, millis, AssetConfigHistory, AssetConfigHistoryItem, StreamConfig, TimelineItem,
    TimelineItemType,
};

#[derive(Debug, Clone)]
struct SketchEvent {
    kind: TimelineItemType,
    at: i64,
    amount_per_second: BigUint,
}

/// Tentative upcoming events, rewritten as later history items arrive
#[derive(Debug, Default)]
struct Sketch {
    events: Vec<SketchEvent>,
}

impl Sketch {
    fn push(&mut self, kind: TimelineItemType, at: i64, amount_per_second: &BigUint) {
        self.events.push(SketchEvent {
            kind,
            at,
            amount_per_second: amount_per_second.clone(),
        });
    }

    /// Drop everything an earlier item scheduled after `at`.
    fn prune_after(&mut self, at: i64) {
        self.events.retain(|event| event.at <= at);
    }

    fn apply_paused(&mut self, item_ts: i64) {
        self.push(TimelineItemType::Pause, item_ts, &BigUint::zero());
    }

    fn apply_config(&mut self, item: &AssetConfigHistoryItem, config: &StreamConfig) {
        let item_ts = millis(&item.timestamp);
        let start = config.start.as_ref().map_or(item_ts, millis).max(item_ts);
        let rate = &config.amount_per_second;

        if start > item_ts && !self.events.is_empty() {
            // Whatever ran before stopped at the reconfiguration.
            self.apply_paused(item_ts);
        }
        self.push(TimelineItemType::Start, start, rate);

        let end = config.duration_seconds.map(|duration| {
            let scheduled = start.saturating_add(i64::from(duration) * 1000);
            scheduled.max(item_ts)
        });
        if let Some(end) = end {
            self.push(TimelineItemType::End, end, rate);
        }

        if let Some(runs_out) = item.runs_out_of_funds.as_ref().map(millis) {
            let runs_out = runs_out.max(item_ts);
            match end {
                Some(end) if end <= runs_out => {}
                Some(end) => {
                    self.events
                        .retain(|e| !(e.kind == TimelineItemType::End && e.at == end));
                    self.push(TimelineItemType::OutOfFunds, runs_out, rate);
                }
                None => self.push(TimelineItemType::OutOfFunds, runs_out, rate),
            }
        }
    }

    fn sort(&mut self) {
        self.events.sort_by_key(|event| event.at);
    }

    fn into_timeline(self) -> Result<Vec<TimelineItem>> {
        let mut timeline = Vec::with_capacity(self.events.len());
        let mut cumulative = BigUint::zero();
        let mut previous: Option<(i64, BigUint)> = None;

        for event in self.events {
            if let Some((previous_at, previous_delta)) = &previous {
                let elapsed = u64::try_from(event.at - previous_at).unwrap_or(0);
                cumulative += previous_delta * BigUint::from(elapsed) / 1000u32;
            }

            let delta = match event.kind {
                TimelineItemType::Start => event.amount_per_second,
                TimelineItemType::Pause
                | TimelineItemType::End
                | TimelineItemType::OutOfFunds => BigUint::zero(),
            };

            timeline.push(TimelineItem {
                kind: event.kind,
                timestamp: from_millis(event.at)?,
                cumulative_amount: cumulative.clone(),
                delta_per_second: delta.clone(),
            });
            previous = Some((event.at, delta));
        }

        Ok(timeline)
    }
}

/// Build the full event timeline of one stream, from its first appearance onward.
pub fn build_timeline(
    stream_id: &StreamId,
    history: &AssetConfigHistory,
) -> Result<Vec<TimelineItem>> {
    let first = history
        .items
        .iter()
        .position(|item| item.stream(stream_id).is_some())
        .ok_or_else(|| {
            DripsError::NotFound(format!(
                "stream {} in history of {} for {}",
                stream_id, history.sender, history.token_address
            ))
        })?;

    let mut sketch = Sketch::default();
    let mut is_managed = false;

    for item in &history.items[first..] {
        let item_ts = millis(&item.timestamp);
        sketch.prune_after(item_ts);

        match item.stream(stream_id) {
            Some(stream) => {
                is_managed = stream.is_managed;
                match &stream.config {
                    Some(config) => sketch.apply_config(item, config),
                    None => sketch.apply_paused(item_ts),
                }
            }
            None if is_managed => {
                return Err(DripsError::Integrity(format!(
                    "managed stream {} missing from history item {}",
                    stream_id, item.history_hash
                )));
            }
            None => sketch.apply_paused(item_ts),
        }

        sketch.sort();
    }

    let timeline = sketch.into_timeline()?;
    debug!(
        stream_id = %stream_id,
        items = history.items.len() - first,
        events = timeline.len(),
        "Built stream timeline"
    );
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::types::TimelineItemType::*;

    const T0: i64 = 1_000;

    fn stream_1() -> StreamId {
        StreamId::new(&sender(), &token(), 1)
    }

    /// (type, seconds after T0, cumulative, delta)
    fn shape(timeline: &[TimelineItem]) -> Vec<(TimelineItemType, i64, u64, u64)> {
        timeline
            .iter()
            .map(|item| {
                (
                    item.kind,
                    item.timestamp.timestamp() - T0,
                    u64::try_from(&item.cumulative_amount).unwrap(),
                    u64::try_from(&item.delta_per_second).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_start_then_scheduled_end() {
        let history = history(vec![item(T0, 1_000, None, "h1", vec![active(1, 10, None, Some(3))])]);
        let timeline = build_timeline(&stream_1(), &history).unwrap();
        assert_eq!(shape(&timeline), vec![(Start, 0, 0, 10), (End, 3, 30, 0)]);
    }

    #[test]
    fn test_out_of_funds_replaces_later_end() {
        let history = history(vec![item(
            T0,
            1_000,
            Some(T0 + 4),
            "h1",
            vec![active(1, 10, None, Some(10))],
        )]);
        let timeline = build_timeline(&stream_1(), &history).unwrap();
        assert_eq!(shape(&timeline), vec![(Start, 0, 0, 10), (OutOfFunds, 4, 40, 0)]);
    }

    #[test]
    fn test_end_before_running_out_wins() {
        let history = history(vec![item(
            T0,
            1_000,
            Some(T0 + 5),
            "h1",
            vec![active(1, 10, None, Some(3))],
        )]);
        let timeline = build_timeline(&stream_1(), &history).unwrap();
        assert_eq!(shape(&timeline), vec![(Start, 0, 0, 10), (End, 3, 30, 0)]);
    }

    #[test]
    fn test_reconfiguration_prunes_scheduled_events() {
        let history = history(vec![
            item(T0, 1_000, Some(T0 + 50), "h1", vec![active(1, 10, None, Some(10))]),
            item(T0 + 4, 1_000, None, "h2", vec![active(1, 20, None, None)]),
        ]);
        let timeline = build_timeline(&stream_1(), &history).unwrap();
        assert_eq!(shape(&timeline), vec![(Start, 0, 0, 10), (Start, 4, 40, 20)]);
    }

    #[test]
    fn test_pause_and_resume() {
        let history = history(vec![
            item(T0, 1_000, None, "h1", vec![active(1, 10, None, None)]),
            item(T0 + 5, 1_000, None, "h2", vec![paused(1)]),
            item(T0 + 8, 1_000, None, "h3", vec![active(1, 10, None, None)]),
        ]);
        let timeline = build_timeline(&stream_1(), &history).unwrap();
        assert_eq!(
            shape(&timeline),
            vec![(Start, 0, 0, 10), (Pause, 5, 50, 0), (Start, 8, 50, 10)]
        );
    }

    #[test]
    fn test_deferred_start_pauses_previous_config() {
        let history = history(vec![
            item(T0, 1_000, None, "h1", vec![active(1, 10, None, None)]),
            item(T0 + 2, 1_000, None, "h2", vec![active(1, 10, Some(T0 + 5), None)]),
        ]);
        let timeline = build_timeline(&stream_1(), &history).unwrap();
        assert_eq!(
            shape(&timeline),
            vec![(Start, 0, 0, 10), (Pause, 2, 20, 0), (Start, 5, 20, 10)]
        );
    }

    #[test]
    fn test_first_appearance_opens_timeline() {
        let history = history(vec![
            item(T0 - 10, 1_000, None, "h0", vec![]),
            item(T0, 1_000, None, "h1", vec![active(1, 10, Some(T0 + 1), Some(2))]),
        ]);
        let timeline = build_timeline(&stream_1(), &history).unwrap();
        assert_eq!(shape(&timeline), vec![(Start, 1, 0, 10), (End, 3, 20, 0)]);
    }

    #[test]
    fn test_missing_managed_stream_is_fatal() {
        let history = history(vec![
            item(T0, 1_000, None, "h1", vec![active(1, 10, None, None)]),
            item(T0 + 5, 1_000, None, "h2", vec![]),
        ]);
        let err = build_timeline(&stream_1(), &history).unwrap_err();
        assert!(err.is_integrity_violation());
    }

    #[test]
    fn test_missing_unmanaged_stream_is_paused() {
        let history = history(vec![
            item(T0, 1_000, None, "h1", vec![unmanaged(active(1, 10, None, None))]),
            item(T0 + 5, 1_000, None, "h2", vec![]),
        ]);
        let timeline = build_timeline(&stream_1(), &history).unwrap();
        assert_eq!(shape(&timeline), vec![(Start, 0, 0, 10), (Pause, 5, 50, 0)]);
    }

    #[test]
    fn test_earlier_end_does_not_block_out_of_funds() {
        let history = history(vec![
            item(T0, 1_000, None, "h1", vec![active(1, 10, None, Some(3))]),
            item(T0 + 10, 1_000, Some(T0 + 20), "h2", vec![active(1, 10, None, None)]),
        ]);
        let timeline = build_timeline(&stream_1(), &history).unwrap();
        assert_eq!(
            shape(&timeline),
            vec![(Start, 0, 0, 10), (End, 3, 30, 0), (Start, 10, 30, 10), (OutOfFunds, 20, 130, 0)]
        );
    }

    #[test]
    fn test_earlier_end_at_run_out_time() {
        let history = history(vec![
            item(T0, 1_000, None, "h1", vec![active(1, 10, None, Some(10))]),
            item(T0 + 10, 1_000, Some(T0 + 10), "h2", vec![active(1, 10, None, None)]),
        ]);
        let timeline = build_timeline(&stream_1(), &history).unwrap();
        assert_eq!(
            shape(&timeline),
            vec![
                (Start, 0, 0, 10),
                (End, 10, 100, 0),
                (Start, 10, 100, 10),
                (OutOfFunds, 10, 100, 0),
            ]
        );
    }

    #[test]
    fn test_unknown_stream() {
        let history = history(vec![item(T0, 1_000, None, "h1", vec![active(1, 10, None, None)])]);
        let other = StreamId::new(&sender(), &token(), 2);
        let err = build_timeline(&other, &history).unwrap_err();
        assert!(matches!(err, DripsError::NotFound(_)));
    }
}
