//! Amount calculations
//!
//! Conversion between decimal strings and base units, and the quick-fill
//! preset amounts. Integer arithmetic only.

use staking_core::{Amount, ProtocolError};

use crate::constants::NATIVE_GAS_RESERVE_PCT;

fn invalid(message: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidAmount {
        message: message.into(),
    }
}

fn scale(decimals: u8) -> Result<Amount, ProtocolError> {
    10u128
        .checked_pow(u32::from(decimals))
        .ok_or_else(|| invalid(format!("unsupported decimals {}", decimals)))
}

/// Parse a decimal string ("1.5") into base units.
///
/// Rejects empty input, signs, exponents and more fractional digits than
/// `decimals` allows.
pub fn parse_amount(text: &str, decimals: u8) -> Result<Amount, ProtocolError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(invalid("amount is empty"));
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid(format!("'{}' is not a number", text)));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid(format!("'{}' is not a decimal number", text)));
    }
    if fraction.len() > usize::from(decimals) {
        return Err(invalid(format!(
            "'{}' has more than {} decimal places",
            text, decimals
        )));
    }

    let overflow = || invalid(format!("'{}' is too large", text));

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<Amount>().map_err(|_| overflow())?
    };

    let fraction_units = if fraction.is_empty() {
        0
    } else {
        let padding = scale(decimals - fraction.len() as u8)?;
        fraction
            .parse::<Amount>()
            .map_err(|_| overflow())?
            .checked_mul(padding)
            .ok_or_else(overflow)?
    };

    whole_units
        .checked_mul(scale(decimals)?)
        .and_then(|units| units.checked_add(fraction_units))
        .ok_or_else(overflow)
}

/// Format base units as a decimal string with trailing zeros trimmed
pub fn format_amount(amount: Amount, decimals: u8) -> String {
    let Ok(unit) = scale(decimals) else {
        return amount.to_string();
    };
    if decimals == 0 {
        return amount.to_string();
    }

    let whole = amount / unit;
    let fraction = amount % unit;
    if fraction == 0 {
        return whole.to_string();
    }

    let digits = format!("{:0width$}", fraction, width = usize::from(decimals));
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Quick-fill amount for `percent` of `balance`.
///
/// The maximum preset on the native pool keeps a share of the balance back
/// for gas.
pub fn preset_amount(balance: Amount, percent: u32, is_native: bool) -> Amount {
    let percent = Amount::from(percent.min(100));
    if percent == 100 && is_native {
        return balance / 100 * (100 - NATIVE_GAS_RESERVE_PCT)
            + balance % 100 * (100 - NATIVE_GAS_RESERVE_PCT) / 100;
    }
    balance / 100 * percent + balance % 100 * percent / 100
}
