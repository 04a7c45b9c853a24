//! Conversion between human decimal amounts and token smallest units

use alloy::primitives::U256;
use rust_decimal::Decimal;

use crate::{Error, Result};

/// Convert a human amount to smallest units, truncating digits beyond
/// `decimals`.
pub fn parse_units(amount: Decimal, decimals: u8) -> Result<U256> {
    if amount.is_sign_negative() {
        return Err(Error::InvalidArgument(format!(
            "Amount must not be negative: {}",
            amount
        )));
    }

    let plain = amount.normalize().to_string();
    let (whole, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), ""));

    let width = decimals as usize;
    let mut digits = String::with_capacity(whole.len() + width);
    digits.push_str(whole);
    if fraction.len() >= width {
        digits.push_str(&fraction[..width]);
    } else {
        digits.push_str(fraction);
        digits.extend(std::iter::repeat('0').take(width - fraction.len()));
    }

    U256::from_str_radix(&digits, 10)
        .map_err(|e| Error::InvalidArgument(format!("Invalid amount {}: {}", amount, e)))
}

/// Format a U256 value with decimals
pub fn format_units(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let remainder_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = remainder_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}
