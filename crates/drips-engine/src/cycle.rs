//! Cycle Clock
//!
//! Drips settles in fixed-length cycles aligned to the unix epoch.

use chrono::{DateTime, Utc};
use drips_core::{DripsError, EngineConfig, Result};
use serde::{Deserialize, Serialize};

use crate::types::{from_unix_secs, Window};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleInfo {
    pub cycle_duration_seconds: u64,
    pub seconds_elapsed_in_current_cycle: u64,
    pub current_cycle_start_timestamp: DateTime<Utc>,
    pub next_cycle_start_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleClock {
    cycle_secs: i64,
}

impl CycleClock {
    pub fn new(cycle_secs: u64) -> Result<Self> {
        let cycle_secs = i64::try_from(cycle_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                DripsError::Config(format!("invalid cycle length {}s", cycle_secs))
            })?;
        Ok(Self { cycle_secs })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(config.cycle_secs)
    }

    pub fn cycle_secs(&self) -> u64 {
        self.cycle_secs.unsigned_abs()
    }

    pub fn cycle_at(&self, now: DateTime<Utc>) -> Result<CycleInfo> {
        let now_secs = now.timestamp();
        let elapsed = now_secs.rem_euclid(self.cycle_secs);
        let start = now_secs - elapsed;

        Ok(CycleInfo {
            cycle_duration_seconds: self.cycle_secs(),
            seconds_elapsed_in_current_cycle: elapsed.unsigned_abs(),
            current_cycle_start_timestamp: from_unix_secs(start)?,
            next_cycle_start_timestamp: from_unix_secs(start.saturating_add(self.cycle_secs))?,
        })
    }

    /// `[currentCycleStart, nextCycleStart)`
    pub fn current_window(&self, now: DateTime<Utc>) -> Result<Window> {
        let cycle = self.cycle_at(now)?;
        Window::new(cycle.current_cycle_start_timestamp, Some(cycle.next_cycle_start_timestamp))
    }
}
