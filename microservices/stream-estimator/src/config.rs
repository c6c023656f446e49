//! Estimator configuration

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use drips_core::{DripsError, EngineConfig, Result};

#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    pub input_path: PathBuf,
    /// Fixed evaluation time; the wall clock is used when unset
    pub now: Option<DateTime<Utc>>,
    /// Restrict timelines to one stream
    pub stream_id: Option<String>,
    pub engine: EngineConfig,
}

impl EstimatorConfig {
    pub fn from_env() -> Result<Self> {
        let engine = EngineConfig::from_env()?;
        Self::from_lookup(|key| std::env::var(key).ok(), engine)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>, engine: EngineConfig) -> Result<Self> {
        let input_path = lookup("INPUT_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| DripsError::Config("INPUT_PATH is required".to_string()))?;

        let now = lookup("NOW")
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| DripsError::Config(format!("Invalid NOW '{}': {}", raw, e)))
            })
            .transpose()?;

        Ok(Self {
            input_path,
            now,
            stream_id: lookup("STREAM_ID").filter(|id| !id.is_empty()),
            engine,
        })
    }
}
