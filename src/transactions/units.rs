//! Unit conversion and fee arithmetic
//!
//! All math is integer (`U256` for amounts, `u128` for wei fees) and checked:
//! overflow is an [`Error::InvalidAmount`], never a wrap.

use crate::{Error, Result};
use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Convert a raw amount into a decimal string, trimming trailing zeros.
pub fn format_units(value: U256, decimals: u32) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        // Format with decimal places
        let remainder_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = remainder_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }
}

/// Scale a decimal string like `"1.25"` by `10^decimals`.
pub fn parse_units(amount: &str, decimals: u32) -> Result<U256> {
    let amount = amount.trim();
    let invalid = || Error::InvalidAmount(amount.to_string());

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > decimals as usize {
        return Err(Error::InvalidAmount(format!(
            "{} has more than {} decimal places",
            amount, decimals
        )));
    }

    let scale = U256::from(10)
        .checked_pow(U256::from(decimals))
        .ok_or_else(invalid)?;
    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| invalid())?
    };
    let padded = format!("{:0<width$}", fraction, width = decimals as usize);
    let fraction = if padded.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&padded, 10).map_err(|_| invalid())?
    };

    whole
        .checked_mul(scale)
        .and_then(|scaled| scaled.checked_add(fraction))
        .ok_or_else(invalid)
}

/// `2 * base_fee + priority_fee`
pub fn max_fee_per_gas(base_fee: u128, priority_fee: u128) -> Result<u128> {
    base_fee
        .checked_mul(2)
        .and_then(|doubled| doubled.checked_add(priority_fee))
        .ok_or_else(|| Error::InvalidAmount("max fee per gas overflows".to_string()))
}

/// Fee tier requested by `get_fee_by_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    Low,
    Standard,
    High,
}

impl FeeTier {
    /// `"low"` and `"high"` select their tiers; anything else is standard.
    pub fn from_name(name: &str) -> Self {
        match name {
            "low" => FeeTier::Low,
            "high" => FeeTier::High,
            _ => FeeTier::Standard,
        }
    }

    /// Scale `gas_price` by 0.8 / 1.0 / 1.1, flooring.
    pub fn apply(self, gas_price: u128) -> Result<u128> {
        let (num, den) = match self {
            FeeTier::Low => (8, 10),
            FeeTier::Standard => return Ok(gas_price),
            FeeTier::High => (11, 10),
        };
        gas_price
            .checked_mul(num)
            .map(|scaled| scaled / den)
            .ok_or_else(|| Error::InvalidAmount("gas price overflows".to_string()))
    }
}

/// Gas price in gwei (two decimals, floored) and ether
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedGasPrice {
    pub gwei: String,
    pub ether: String,
}

impl FormattedGasPrice {
    pub fn from_wei(wei: u128) -> Self {
        // hundredths of a gwei
        let centi_gwei = wei / 10_000_000;
        Self {
            gwei: format!("{}.{:02}", centi_gwei / 100, centi_gwei % 100),
            ether: format_units(U256::from(wei), 18),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::ZERO, 18), "0");
        assert_eq!(format_units(U256::from(1_500_000_000_000_000_000u128), 18), "1.5");
        assert_eq!(format_units(U256::from(250_000_000u64), 8), "2.5");
        assert_eq!(format_units(U256::from(1u64), 6), "0.000001");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1.5", 18).unwrap(), U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(parse_units("42", 6).unwrap(), U256::from(42_000_000u64));
        assert_eq!(parse_units(".5", 1).unwrap(), U256::from(5u64));
        assert_eq!(parse_units("0.000001", 6).unwrap(), U256::from(1u64));
        assert_eq!(parse_units("7", 0).unwrap(), U256::from(7u64));
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        for bad in ["", ".", "abc", "1.2.3", "-1", "1e18", "0.0000001"] {
            assert!(
                matches!(parse_units(bad, 6), Err(Error::InvalidAmount(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parse_units_traps_overflow() {
        let huge = "1".repeat(80);
        assert!(matches!(parse_units(&huge, 18), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_max_fee_per_gas() {
        assert_eq!(max_fee_per_gas(10, 3).unwrap(), 23);
        assert_eq!(max_fee_per_gas(0, 0).unwrap(), 0);
        assert!(max_fee_per_gas(u128::MAX / 2 + 1, 0).is_err());
    }

    #[test]
    fn test_fee_tiers() {
        assert_eq!(FeeTier::from_name("low").apply(1_000).unwrap(), 800);
        assert_eq!(FeeTier::from_name("high").apply(1_000).unwrap(), 1_100);
        assert_eq!(FeeTier::from_name("medium").apply(1_000).unwrap(), 1_000);
        // integer floor
        assert_eq!(FeeTier::Low.apply(7).unwrap(), 5);
        assert_eq!(FeeTier::High.apply(7).unwrap(), 7);
    }

    #[test]
    fn test_formatted_gas_price() {
        let formatted = FormattedGasPrice::from_wei(20_123_456_789);
        assert_eq!(formatted.gwei, "20.12");
        assert_eq!(formatted.ether, "0.000000020123456789");
    }
}
