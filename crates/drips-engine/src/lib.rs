//! # Drips Stream Estimator Engine
//!
//! Reconstructs how much a continuous per-second token stream has delivered, and how
//! fast it is delivering now, from the append-only log of on-chain stream configurations:
//!
//! - **codec** - packed 256-bit stream configs and `maxEnd` sentinels
//! - **metadata** - pairs on-chain receivers with off-chain stream descriptors
//! - **history** - folds snapshot events into per-token history items
//! - **cycle** - fixed-length accounting cycles
//! - **estimate** - windowed totals, excluding squeezed amounts
//! - **timeline** - discrete events with cumulative totals for charting
//!
//! Everything here is a pure function of its inputs. No clock is read: callers pass `now`.
//!
//! ## Example
//! ```rust,ignore
//! use drips_engine::{build_asset_config_history, estimate_asset_config, Window};
//!
//! let history = build_asset_config_history(&sender, &token, &events, metadata)?;
//! let estimate = estimate_asset_config(&history, &Window::all_time(), now, &squeezes)?;
//! println!("streamed so far: {}", estimate.totals.total_streamed);
//! ```

pub mod codec;
pub mod cycle;
pub mod estimate;
pub mod history;
pub mod metadata;
pub mod timeline;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use drips_core::{AccountId, AccountRef, DripsError, Driver, Result, StreamId, TokenAddress};

pub use codec::{
    decode_max_end, decode_raw_config, decode_stream_config, normalize_balance,
    pack_stream_config, AMT_PER_SEC_MULTIPLIER,
};
pub use cycle::{CycleClock, CycleInfo};
pub use estimate::{
    estimate_account, estimate_asset_config, AccountEstimate, AssetConfigEstimate,
    AssetConfigEstimates, EstimateTotals, StreamEstimate,
};
pub use history::{build_account_history, build_asset_config_history};
pub use metadata::MetadataIndex;
pub use timeline::build_timeline;
pub use types::*;
