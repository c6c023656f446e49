//! Packed stream configuration codec
//!
//! An on-chain stream config is one 256-bit word, most significant field first:
//!
//! ```text
//! | dripId (32) | amtPerSec (160) | start (32) | duration (32) |
//! ```
//!
//! `start == 0` and `duration == 0` mean "unset".

use chrono::{DateTime, Utc};
use drips_core::{is_canonical_uint, DripsError, Result};
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};

use crate::types::{from_unix_secs, millis, StreamConfig};

/// Extra decimals carried by on-chain `amtPerSec` values.
pub const AMT_PER_SEC_MULTIPLIER: u64 = 1_000_000_000;

const CONFIG_BITS: u64 = 256;
const DRIP_ID_SHIFT: usize = 224;
const AMT_PER_SEC_SHIFT: usize = 64;
const AMT_PER_SEC_BITS: usize = 160;
const START_SHIFT: usize = 32;

fn amt_per_sec_mask() -> BigUint {
    (BigUint::one() << AMT_PER_SEC_BITS) - 1u32
}

fn low_u32(value: &BigUint) -> u32 {
    (value & BigUint::from(u32::MAX))
        .to_u32()
        .unwrap_or_default()
}

/// Parse the decimal form of a packed config.
pub fn parse_packed(raw: &str) -> Result<BigUint> {
    if !is_canonical_uint(raw) {
        return Err(DripsError::Decode(format!(
            "packed config '{}' is not a canonical non-negative integer",
            raw
        )));
    }
    raw.parse()
        .map_err(|e| DripsError::Decode(format!("packed config '{}': {}", raw, e)))
}

pub fn decode_stream_config(packed: &BigUint) -> Result<StreamConfig> {
    if packed.bits() > CONFIG_BITS {
        return Err(DripsError::Decode(format!(
            "packed config is {} bits wide, expected at most 256",
            packed.bits()
        )));
    }

    let drip_id = (packed >> DRIP_ID_SHIFT)
        .to_u32()
        .ok_or_else(|| DripsError::Decode("drip id exceeds 32 bits".to_string()))?;
    let amount_per_second = (packed >> AMT_PER_SEC_SHIFT) & amt_per_sec_mask();
    let start = low_u32(&(packed >> START_SHIFT));
    let duration = low_u32(packed);

    Ok(StreamConfig {
        drip_id,
        amount_per_second,
        start: match start {
            0 => None,
            secs => Some(from_unix_secs(i64::from(secs))?),
        },
        duration_seconds: (duration != 0).then_some(duration),
    })
}

/// Decode a packed config given in decimal form.
pub fn decode_raw_config(raw: &str) -> Result<StreamConfig> {
    decode_stream_config(&parse_packed(raw)?)
}

pub fn pack_stream_config(config: &StreamConfig) -> Result<BigUint> {
    if config.amount_per_second.bits() > AMT_PER_SEC_BITS as u64 {
        return Err(DripsError::Validation(format!(
            "amount per second {} exceeds 160 bits",
            config.amount_per_second
        )));
    }

    let start = match &config.start {
        None => 0,
        Some(start) => u32::try_from(start.timestamp())
            .ok()
            .filter(|secs| *secs != 0 && millis(start) % 1000 == 0)
            .ok_or_else(|| {
                DripsError::Validation(format!(
                    "start {} is not a whole non-zero 32-bit unix second",
                    start
                ))
            })?,
    };
    let duration = match config.duration_seconds {
        Some(0) => {
            return Err(DripsError::Validation(
                "duration of zero cannot be packed; use None".to_string(),
            ))
        }
        Some(duration) => duration,
        None => 0,
    };

    Ok((BigUint::from(config.drip_id) << DRIP_ID_SHIFT)
        | (&config.amount_per_second << AMT_PER_SEC_SHIFT)
        | (BigUint::from(start) << START_SHIFT)
        | BigUint::from(duration))
}

/// Scale a raw on-chain balance into the `amtPerSec` fixed-point unit.
pub fn normalize_balance(raw: &BigUint) -> BigUint {
    raw * AMT_PER_SEC_MULTIPLIER
}

/// Decode the `maxEnd` sentinel into the time the balance runs dry.
///
/// `0` means no stream drains the balance; `u32::MAX` means every stream ends
/// on schedule before the balance could run out.
pub fn decode_max_end(max_end: u64) -> Result<Option<DateTime<Utc>>> {
    match u32::try_from(max_end) {
        Ok(0) | Ok(u32::MAX) => Ok(None),
        Ok(secs) => Ok(Some(from_unix_secs(i64::from(secs))?)),
        Err(_) => Err(DripsError::Decode(format!(
            "maxEnd {} exceeds 32 bits",
            max_end
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(drip_id: u32, amt: u64, start: Option<i64>, duration: Option<u32>) -> StreamConfig {
        StreamConfig {
            drip_id,
            amount_per_second: BigUint::from(amt),
            start: start.map(|s| from_unix_secs(s).unwrap()),
            duration_seconds: duration,
        }
    }

    #[test]
    fn test_decode_known_layout() {
        // dripId 1, amtPerSec 2, start 3, duration 4
        let packed = (BigUint::from(1u32) << 224)
            | (BigUint::from(2u32) << 64)
            | (BigUint::from(3u32) << 32)
            | BigUint::from(4u32);
        let decoded = decode_stream_config(&packed).unwrap();
        assert_eq!(decoded, config(1, 2, Some(3), Some(4)));
    }

    #[test]
    fn test_zero_start_and_duration_are_unset() {
        let packed = (BigUint::from(9u32) << 224) | (BigUint::from(10u32) << 64);
        let decoded = decode_stream_config(&packed).unwrap();
        assert_eq!(decoded.drip_id, 9);
        assert_eq!(decoded.start, None);
        assert_eq!(decoded.duration_seconds, None);
    }

    #[test]
    fn test_full_width_amount() {
        let max_amt = amt_per_sec_mask();
        let packed = (BigUint::from(u32::MAX) << 224) | (&max_amt << 64);
        let decoded = decode_stream_config(&packed).unwrap();
        assert_eq!(decoded.drip_id, u32::MAX);
        assert_eq!(decoded.amount_per_second, max_amt);
    }

    #[test]
    fn test_pack_matches_decode() {
        let original = config(77, 1_000_000_000_000, Some(1_700_000_000), Some(3600));
        let packed = pack_stream_config(&original).unwrap();
        assert_eq!(decode_raw_config(&packed.to_string()).unwrap(), original);
    }

    #[test]
    fn test_rejects_wide_or_malformed_input() {
        let too_wide = BigUint::one() << 256;
        assert!(decode_stream_config(&too_wide).is_err());
        assert!(decode_raw_config("").is_err());
        assert!(decode_raw_config("-1").is_err());
        assert!(decode_raw_config("0x10").is_err());
    }

    #[test]
    fn test_pack_rejects_unrepresentable() {
        let mut wide = config(1, 0, None, None);
        wide.amount_per_second = BigUint::one() << 160;
        assert!(pack_stream_config(&wide).is_err());
        assert!(pack_stream_config(&config(1, 1, None, Some(0))).is_err());
    }

    #[test]
    fn test_max_end_sentinels() {
        assert_eq!(decode_max_end(0).unwrap(), None);
        assert_eq!(decode_max_end(u64::from(u32::MAX)).unwrap(), None);
        assert_eq!(
            decode_max_end(1_700_000_000).unwrap(),
            Some(from_unix_secs(1_700_000_000).unwrap())
        );
        assert!(decode_max_end(u64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_balance_normalization() {
        assert_eq!(
            normalize_balance(&BigUint::from(5u32)),
            BigUint::from(5_000_000_000u64)
        );
    }
}
