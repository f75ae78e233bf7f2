//! ether <-> base unit conversion
//!
//! the ledger uses a fixed 18 decimal convention. parsing is exact: a
//! decimal string either maps to exactly one base-unit integer or fails.

use alloy_primitives::U256;
use thiserror::Error;

/// fractional digits below the display unit
pub const DECIMALS: usize = 18;

/// 10^18
pub const WEI_PER_ETHER: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount must not be negative")]
    Negative,

    #[error("unexpected character {0:?}")]
    InvalidCharacter(char),

    #[error("too many decimal points")]
    TooManyDecimalPoints,

    #[error("{0} fractional digits exceed the {DECIMALS} supported")]
    TooManyDecimals(usize),

    #[error("amount does not fit in 256 bits")]
    Overflow,
}

/// parse a decimal ether amount ("1.5", "0.000021", ".5") into base units
pub fn parse_ether(input: &str) -> Result<U256, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    if s.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let (whole, frac) = match s.split_once('.') {
        Some((_, f)) if f.contains('.') => return Err(AmountError::TooManyDecimalPoints),
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Empty);
    }
    if let Some(c) = whole.chars().chain(frac.chars()).find(|c| !c.is_ascii_digit()) {
        return Err(AmountError::InvalidCharacter(c));
    }

    // trailing zeros carry no precision
    let frac = frac.trim_end_matches('0');
    if frac.len() > DECIMALS {
        return Err(AmountError::TooManyDecimals(frac.len()));
    }

    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| AmountError::Overflow)?
    };
    let frac = if frac.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{:0<width$}", frac, width = DECIMALS);
        U256::from_str_radix(&padded, 10).map_err(|_| AmountError::Overflow)?
    };

    whole
        .checked_mul(WEI_PER_ETHER)
        .and_then(|w| w.checked_add(frac))
        .ok_or(AmountError::Overflow)
}

/// format base units as a decimal ether string, always with a fractional part
pub fn format_ether(amount: U256) -> String {
    let whole = amount / WEI_PER_ETHER;
    let frac = amount % WEI_PER_ETHER;
    let frac = format!("{:0>width$}", frac.to_string(), width = DECIMALS);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, frac)
    }
}

/// lossy display value, `amount / 10^18`
pub fn to_display(amount: U256) -> f64 {
    format_ether(amount).parse().unwrap_or(f64::NAN)
}

/// json-rpc quantity encoding
pub fn quantity(value: U256) -> String {
    format!("0x{:x}", value)
}
