//! Decimal-string to fixed-point conversion.
//!
//! Every amount a user types enters the system as a decimal string and must
//! become the token's fixed-point integer representation before anything is
//! sent to the network. Validation happens here so workflows can fail fast
//! with `InvalidAmount` and never submit a malformed value.

use alloy_primitives::U256;

use crate::error::WorkflowError;

/// Parse a user-supplied decimal string into a fixed-point integer with the
/// given number of decimals.
///
/// Rejects empty, non-numeric, negative and zero inputs, and inputs with
/// more fractional digits than the token carries.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256, WorkflowError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WorkflowError::InvalidAmount("amount is empty".into()));
    }
    if value.starts_with('-') {
        return Err(WorkflowError::InvalidAmount(
            "amount must be positive".into(),
        ));
    }

    let (int_part, frac_part) = match value.split_once('.') {
        Some((i, f)) => (i, f),
        None => (value, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(WorkflowError::InvalidAmount("amount is not a number".into()));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(WorkflowError::InvalidAmount("amount is not a number".into()));
    }
    if frac_part.len() > decimals as usize {
        return Err(WorkflowError::InvalidAmount(format!(
            "at most {} decimal places supported",
            decimals
        )));
    }

    let scale = U256::from(10u64).pow(U256::from(decimals));
    let int_units: U256 = if int_part.is_empty() {
        U256::ZERO
    } else {
        int_part
            .parse()
            .map_err(|_| WorkflowError::InvalidAmount("amount is not a number".into()))?
    };

    let frac_units: U256 = if frac_part.is_empty() {
        U256::ZERO
    } else {
        let digits: U256 = frac_part
            .parse()
            .map_err(|_| WorkflowError::InvalidAmount("amount is not a number".into()))?;
        let shift = U256::from(10u64).pow(U256::from(decimals as usize - frac_part.len()));
        digits * shift
    };

    let units = int_units * scale + frac_units;
    if units.is_zero() {
        return Err(WorkflowError::InvalidAmount(
            "amount must be greater than zero".into(),
        ));
    }

    Ok(units)
}

/// Convert a fixed-point integer to an `f64` for display and metric math.
pub fn to_f64(value: U256, decimals: u8) -> f64 {
    let raw: f64 = value.to_string().parse().unwrap_or(f64::INFINITY);
    raw / 10f64.powi(decimals as i32)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nine_decimal_token() {
        let units = parse_units("1.5", 9).unwrap();
        assert_eq!(units, U256::from(1_500_000_000u64));
    }

    #[test]
    fn test_parse_whole_number() {
        assert_eq!(parse_units("42", 9).unwrap(), U256::from(42_000_000_000u64));
    }

    #[test]
    fn test_parse_bare_fraction() {
        assert_eq!(parse_units(".5", 9).unwrap(), U256::from(500_000_000u64));
        assert_eq!(parse_units("0.000000001", 9).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_rejects_zero_and_negative() {
        assert!(matches!(
            parse_units("0", 9),
            Err(WorkflowError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_units("0.0", 9),
            Err(WorkflowError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_units("-1", 9),
            Err(WorkflowError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        for bad in ["", "abc", "1.2.3", "1,5", "1e9"] {
            assert!(
                matches!(parse_units(bad, 9), Err(WorkflowError::InvalidAmount(_))),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_rejects_excess_precision() {
        assert!(matches!(
            parse_units("1.0000000001", 9),
            Err(WorkflowError::InvalidAmount(_))
        ));
        // Exactly at the limit is fine.
        assert!(parse_units("1.000000001", 9).is_ok());
    }

    #[test]
    fn test_to_f64_roundtrip() {
        let units = parse_units("123.456", 9).unwrap();
        assert!((to_f64(units, 9) - 123.456).abs() < 1e-9);
    }
}
