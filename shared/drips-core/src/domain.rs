//! Core domain types shared by the engine and its tools

use crate::error::{DripsError, Result};
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bits in an on-chain account id word.
const ACCOUNT_ID_BITS: u64 = 256;

/// The driver id occupies the top 32 bits of an account id.
const DRIVER_ID_SHIFT: usize = 224;

/// Returns true for `0` or a run of ASCII digits without a leading zero.
pub fn is_canonical_uint(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_digit())
        && (value == "0" || !value.starts_with('0'))
}

/// Drips account identifier (a 256-bit unsigned integer in decimal form)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !is_canonical_uint(&id) {
            return Err(DripsError::Validation(format!(
                "account id '{}' is not a canonical non-negative integer",
                id
            )));
        }
        let value: BigUint = id
            .parse()
            .map_err(|e| DripsError::Validation(format!("account id '{}': {}", id, e)))?;
        if value.bits() > ACCOUNT_ID_BITS {
            return Err(DripsError::Validation(format!(
                "account id '{}' exceeds 256 bits",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn driver(&self) -> Driver {
        // Validated in `parse`.
        let value: BigUint = self.0.parse().unwrap_or_default();
        let driver_id = (value >> DRIVER_ID_SHIFT).to_u32().unwrap_or(u32::MAX);
        Driver::from_id(driver_id)
    }
}

impl TryFrom<String> for AccountId {
    type Error = DripsError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ERC-20 token address, always stored lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAddress(String);

impl TokenAddress {
    pub fn parse(address: impl AsRef<str>) -> Result<Self> {
        let address = address.as_ref();
        let hex = address
            .strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
            .ok_or_else(|| {
                DripsError::Validation(format!("token address '{}' lacks 0x prefix", address))
            })?;
        if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DripsError::Validation(format!(
                "token address '{}' is not 20 hex bytes",
                address
            )));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TokenAddress {
    type Error = DripsError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<TokenAddress> for String {
    fn from(address: TokenAddress) -> Self {
        address.0
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable stream identifier: `{sender}-{token}-{dripId}`.
///
/// Joins on-chain receivers with their off-chain metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(sender: &AccountId, token: &TokenAddress, drip_id: u32) -> Self {
        Self(format!("{}-{}-{}", sender, token, drip_id))
    }

    /// Build a stream id from unvalidated parts.
    pub fn from_parts(sender: &str, token: &str, drip_id: &str) -> Result<Self> {
        let sender = AccountId::parse(sender)?;
        let token = TokenAddress::parse(token)?;
        if !is_canonical_uint(drip_id) {
            return Err(DripsError::Validation(format!(
                "drip id '{}' is not a canonical non-negative integer",
                drip_id
            )));
        }
        let drip_id: u32 = drip_id
            .parse()
            .map_err(|e| DripsError::Validation(format!("drip id '{}': {}", drip_id, e)))?;
        Ok(Self::new(&sender, &token, drip_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protocol driver that minted an account id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    Address,
    Nft,
    ImmutableSplits,
    Repo,
    Other(u32),
}

impl Driver {
    pub fn from_id(driver_id: u32) -> Self {
        match driver_id {
            0 => Self::Address,
            1 => Self::Nft,
            2 => Self::ImmutableSplits,
            3 => Self::Repo,
            other => Self::Other(other),
        }
    }
}

/// Receiver or sender of a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    pub account_id: AccountId,
    pub driver: Driver,
}

impl AccountRef {
    pub fn new(account_id: AccountId) -> Self {
        let driver = account_id.driver();
        Self { account_id, driver }
    }
}
