use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("Malformed asset string: {0}")]
    Malformed(String),

    #[error("Invalid decimal amount: {0}")]
    InvalidAmount(String),

    #[error("Amount {0} has more than {1} decimal places")]
    TooPrecise(String, u8),

    #[error("Amount out of range: {0}")]
    Overflow(String),
}

/// An amount of one currency held as integer base units.
///
/// The textual form is `"<decimal> <tag>"`, e.g. `"1.00000000 PIA"`, where the
/// number of fractional digits is the asset's precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub amount: i64,
    pub precision: u8,
    pub symbol: String,
}

impl Asset {
    pub fn new(amount: i64, precision: u8, symbol: &str) -> Self {
        Self {
            amount,
            precision,
            symbol: symbol.to_string(),
        }
    }

    /// Builds an asset from a bare decimal string, scaled to `precision` places.
    pub fn from_decimal(value: &str, precision: u8, symbol: &str) -> Result<Self, AssetError> {
        let amount = parse_units(value, precision)?;
        Ok(Self::new(amount, precision, symbol))
    }

    /// The amount rendered as a decimal string without the tag.
    pub fn decimal(&self) -> String {
        format_units(self.amount, self.precision)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.decimal(), self.symbol)
    }
}

impl FromStr for Asset {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (value, symbol) = split_asset(s)?;
        let precision = value.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0);
        let precision = u8::try_from(precision).map_err(|_| AssetError::TooPrecise(value.to_string(), u8::MAX))?;
        Asset::from_decimal(value, precision, symbol)
    }
}

/// Splits `"<decimal> <tag>"` into its two parts, checking the decimal is well formed.
pub fn split_asset(s: &str) -> Result<(&str, &str), AssetError> {
    let mut parts = s.split_whitespace();
    let (Some(value), Some(symbol), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AssetError::Malformed(s.to_string()));
    };
    if !is_decimal(value) {
        return Err(AssetError::InvalidAmount(value.to_string()));
    }
    Ok((value, symbol))
}

fn is_decimal(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.is_none_or(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}

/// Converts a decimal string into integer base units at `precision` places.
pub fn parse_units(value: &str, precision: u8) -> Result<i64, AssetError> {
    if !is_decimal(value) {
        return Err(AssetError::InvalidAmount(value.to_string()));
    }
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if frac.len() > precision as usize {
        return Err(AssetError::TooPrecise(value.to_string(), precision));
    }

    let scale = 10i64
        .checked_pow(u32::from(precision))
        .ok_or_else(|| AssetError::Overflow(value.to_string()))?;
    let int_units: i64 = int.parse().map_err(|_| AssetError::Overflow(value.to_string()))?;
    let frac_units: i64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = precision as usize);
        padded.parse().map_err(|_| AssetError::Overflow(value.to_string()))?
    };

    let units = int_units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(|| AssetError::Overflow(value.to_string()))?;
    Ok(if negative { -units } else { units })
}

/// Renders integer base units as a decimal string with exactly `precision` fractional digits.
pub fn format_units(units: i64, precision: u8) -> String {
    let sign = if units < 0 { "-" } else { "" };
    let abs = units.unsigned_abs();
    if precision == 0 {
        return format!("{}{}", sign, abs);
    }
    let scale = 10u64.pow(u32::from(precision));
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / scale,
        abs % scale,
        width = precision as usize
    )
}

/// Drops trailing fractional zeros: `"12.50000000"` -> `"12.5"`, `"3.00000000"` -> `"3"`.
pub fn trim_decimal(value: &str) -> String {
    if !value.contains('.') {
        return value.to_string();
    }
    value.trim_end_matches('0').trim_end_matches('.').to_string()
}
