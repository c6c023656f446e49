//! Engine configuration

use crate::error::{DripsError, Result};
use std::env;

/// Length of a Drips cycle on the canonical deployment (7 days).
pub const DEFAULT_CYCLE_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub cycle_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_secs: DEFAULT_CYCLE_SECS,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let raw = env::var("DRIPS_CYCLE_SECS").ok();
        Self::from_cycle_secs(raw.as_deref())
    }

    fn from_cycle_secs(raw: Option<&str>) -> Result<Self> {
        let cycle_secs = match raw {
            Some(value) => value
                .parse()
                .map_err(|e| DripsError::Config(format!("Invalid DRIPS_CYCLE_SECS: {}", e)))?,
            None => DEFAULT_CYCLE_SECS,
        };

        if cycle_secs == 0 {
            return Err(DripsError::Config(
                "DRIPS_CYCLE_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self { cycle_secs })
    }
}
