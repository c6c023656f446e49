//! Drips Core - Shared domain types for the stream estimator
//!
//! This crate provides:
//! - Validated identifiers (AccountId, TokenAddress, StreamId)
//! - Driver decoding for account ids
//! - Error handling utilities
//! - Engine configuration

pub mod config;
pub mod domain;
pub mod error;

pub use config::EngineConfig;
pub use domain::*;
pub use error::{DripsError, Result};
