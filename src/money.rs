//! Amount Codec
//!
//! Conversion between the ledger's integer minor units (`u64`) and the
//! client-facing decimal string representation of GSALT amounts.
//! All amount conversions in the crate go through this module.
//!
//! ## Internal Representation
//! - 1 GSALT = 100 minor units (scale 2)
//! - Parsing truncates digits beyond the scale, it never rounds up
//! - Formatting always renders exactly two fractional digits
//!
//! ## Usage
//! ```rust
//! use gsalt_ledger::money::{to_decimal, to_minor_units};
//!
//! let units = to_minor_units("50.00").unwrap();
//! assert_eq!(units, 5000);
//! assert_eq!(to_decimal(units), "50.00");
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

/// Number of fractional digits carried by a GSALT amount.
pub const GSALT_DECIMALS: u32 = 2;

/// Minor units per whole GSALT.
pub const UNITS_PER_GSALT: u64 = 100;

// Longest whole part that can still fit in u64 after scaling.
const MAX_WHOLE_DIGITS: usize = 18;

// ============================================================================
// Error Types
// ============================================================================

/// Amount conversion errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount must not be negative")]
    Negative,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Parse: Client → Internal
// ============================================================================

/// Convert a decimal string into minor units.
///
/// Accepts plain non-negative decimals such as `"50"`, `"50.5"` or `"0.01"`.
/// Fractional digits beyond [`GSALT_DECIMALS`] are truncated, so `"0.019"`
/// yields `1`. Zero is a valid amount at this layer; callers that need a
/// positive amount check for it themselves.
///
/// # Errors
/// * `Negative` - a leading `-` sign
/// * `Overflow` - the scaled value does not fit in `u64`
/// * `InvalidFormat` - empty input, signs, exponents, separators or stray characters
pub fn to_minor_units(amount_str: &str) -> Result<u64, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }
    if amount_str.starts_with('-') {
        return Err(MoneyError::Negative);
    }

    let (whole, frac) = match amount_str.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (amount_str, ""),
    };

    if whole.is_empty() {
        return Err(MoneyError::InvalidFormat(
            "missing leading zero (e.g., use 0.5 instead of .5)".into(),
        ));
    }
    if amount_str.contains('.') && frac.is_empty() {
        return Err(MoneyError::InvalidFormat(
            "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
        ));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "only digits and a single decimal point are allowed: {}",
            amount_str
        )));
    }
    if whole.trim_start_matches('0').len() > MAX_WHOLE_DIGITS {
        return Err(MoneyError::Overflow);
    }

    let kept = &frac[..frac.len().min(GSALT_DECIMALS as usize)];
    let normalized = if kept.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, kept)
    };

    let decimal = Decimal::from_str(&normalized)
        .map_err(|e| MoneyError::InvalidFormat(format!("{}: {}", normalized, e)))?;

    (decimal * Decimal::from(UNITS_PER_GSALT))
        .trunc()
        .to_u64()
        .ok_or(MoneyError::Overflow)
}

// ============================================================================
// Format: Internal → Client
// ============================================================================

/// Render minor units as a decimal string with exactly two fractional digits.
///
/// `5000` becomes `"50.00"`, `1` becomes `"0.01"`.
pub fn to_decimal(units: u64) -> String {
    format!("{:.prec$}", to_major(units), prec = GSALT_DECIMALS as usize)
}

/// Minor units as an exact `Decimal` in whole GSALT (scale 2).
pub fn to_major(units: u64) -> Decimal {
    Decimal::from_i128_with_scale(units as i128, GSALT_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(to_minor_units("50").unwrap(), 5000);
        assert_eq!(to_minor_units("50.00").unwrap(), 5000);
        assert_eq!(to_minor_units("50.5").unwrap(), 5050);
        assert_eq!(to_minor_units("0.01").unwrap(), 1);
        assert_eq!(to_minor_units("  12.34 ").unwrap(), 1234);
    }

    #[test]
    fn test_parse_zero_is_allowed() {
        assert_eq!(to_minor_units("0").unwrap(), 0);
        assert_eq!(to_minor_units("0.00").unwrap(), 0);
    }

    #[test]
    fn test_parse_truncates_extra_precision() {
        assert_eq!(to_minor_units("0.019").unwrap(), 1);
        assert_eq!(to_minor_units("10.999").unwrap(), 1099);
        assert_eq!(to_minor_units("0.009").unwrap(), 0);
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert_eq!(to_minor_units("-1.00"), Err(MoneyError::Negative));
    }

    #[test]
    fn test_parse_rejects_bad_format() {
        for input in ["", "abc", "1,000.00", "1e5", "+5", "1.2.3", ".5", "5.", "0x10", "1 000"] {
            assert!(
                matches!(to_minor_units(input), Err(MoneyError::InvalidFormat(_))),
                "expected InvalidFormat for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_overflow() {
        assert_eq!(
            to_minor_units("999999999999999999999"),
            Err(MoneyError::Overflow)
        );
        // u64::MAX / 100 still fits
        assert_eq!(
            to_minor_units("184467440737095516.15").unwrap(),
            u64::MAX
        );
        assert_eq!(
            to_minor_units("184467440737095517"),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_format_always_two_digits() {
        assert_eq!(to_decimal(5000), "50.00");
        assert_eq!(to_decimal(1), "0.01");
        assert_eq!(to_decimal(0), "0.00");
        assert_eq!(to_decimal(123_456), "1234.56");
    }

    #[test]
    fn test_round_trip_two_fraction_digits() {
        for input in ["0.00", "0.01", "0.10", "1.00", "50.00", "1234.56", "999999.99"] {
            let units = to_minor_units(input).unwrap();
            assert_eq!(to_decimal(units), input);
        }
    }

    #[test]
    fn test_to_major_is_exact() {
        assert_eq!(to_major(5000), Decimal::from(50));
        assert_eq!(to_major(1).to_string(), "0.01");
    }
}
