//! # Resource Quantities
//!
//! Parses Kubernetes quantity strings (`500m`, `0.5`, `1Gi`, `1e3`) into an exact
//! integer representation so equivalent spellings compare equal.

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)(\d*)(?:\.(\d*))?(?:(Ki|Mi|Gi|Ti|Pi|Ei|n|u|m|k|M|G|T|P|E)|[eE]([+-]?\d+))?$")
        .expect("quantity pattern is valid")
});

/// Nano-units per whole unit
const NANOS: i128 = 1_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("invalid quantity '{0}'")]
    Invalid(String),
    #[error("quantity '{0}' is out of range")]
    OutOfRange(String),
}

/// A parsed quantity, stored in nano-units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParsedQuantity {
    nanos: i128,
}

impl ParsedQuantity {
    /// Parse a Kubernetes quantity string
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let trimmed = input.trim();
        let caps = QUANTITY
            .captures(trimmed)
            .ok_or_else(|| QuantityError::Invalid(input.to_string()))?;

        let integer = caps.get(2).map_or("", |m| m.as_str());
        let fraction = caps.get(3).map_or("", |m| m.as_str());
        if integer.is_empty() && fraction.is_empty() {
            return Err(QuantityError::Invalid(input.to_string()));
        }

        let out_of_range = || QuantityError::OutOfRange(input.to_string());

        // Mantissa as (digits, decimal places)
        let digits = format!("{integer}{fraction}");
        let mut mantissa: i128 = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| out_of_range())?
        };
        let mut scale = -i32::try_from(fraction.len()).map_err(|_| out_of_range())?;

        // Binary suffixes multiply; decimal suffixes and exponents shift the scale
        match (caps.get(4).map(|m| m.as_str()), caps.get(5)) {
            (Some(suffix), _) => match suffix {
                "Ki" => mantissa = mantissa.checked_mul(1 << 10).ok_or_else(out_of_range)?,
                "Mi" => mantissa = mantissa.checked_mul(1 << 20).ok_or_else(out_of_range)?,
                "Gi" => mantissa = mantissa.checked_mul(1 << 30).ok_or_else(out_of_range)?,
                "Ti" => mantissa = mantissa.checked_mul(1 << 40).ok_or_else(out_of_range)?,
                "Pi" => mantissa = mantissa.checked_mul(1 << 50).ok_or_else(out_of_range)?,
                "Ei" => mantissa = mantissa.checked_mul(1 << 60).ok_or_else(out_of_range)?,
                "n" => scale -= 9,
                "u" => scale -= 6,
                "m" => scale -= 3,
                "k" => scale += 3,
                "M" => scale += 6,
                "G" => scale += 9,
                "T" => scale += 12,
                "P" => scale += 15,
                "E" => scale += 18,
                _ => return Err(QuantityError::Invalid(input.to_string())),
            },
            (None, Some(exponent)) => {
                let exponent = exponent
                    .as_str()
                    .parse::<i32>()
                    .map_err(|_| out_of_range())?;
                scale = scale.checked_add(exponent).ok_or_else(out_of_range)?;
            }
            (None, None) => {}
        }

        // Shift into nano-units; anything below a nano-unit rounds up like the API server
        let shift = scale.checked_add(9).ok_or_else(out_of_range)?;
        let nanos = match shift.cmp(&0) {
            Ordering::Equal => mantissa,
            Ordering::Greater => {
                let factor = 10i128
                    .checked_pow(u32::try_from(shift).map_err(|_| out_of_range())?)
                    .ok_or_else(out_of_range)?;
                mantissa.checked_mul(factor).ok_or_else(out_of_range)?
            }
            Ordering::Less => {
                let divisor = 10i128
                    .checked_pow(u32::try_from(-shift).map_err(|_| out_of_range())?)
                    .ok_or_else(out_of_range)?;
                let whole = mantissa / divisor;
                if mantissa % divisor == 0 {
                    whole
                } else {
                    whole + 1
                }
            }
        };

        let sign = if caps.get(1).is_some_and(|m| m.as_str() == "-") {
            -1
        } else {
            1
        };
        Ok(Self {
            nanos: sign * nanos,
        })
    }

    /// Value in milli-units, rounded up
    #[must_use]
    pub fn as_millis(&self) -> i128 {
        let per_milli = NANOS / 1000;
        (self.nanos + per_milli - 1).div_euclid(per_milli)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// `self / other * 100`, or `None` when `other` is zero
    #[must_use]
    pub fn percent_of(&self, other: &ParsedQuantity) -> Option<i128> {
        if other.nanos == 0 {
            return None;
        }
        Some(self.nanos.checked_mul(100)? / other.nanos)
    }
}

impl fmt::Display for ParsedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.as_millis())
    }
}

/// Whether two strings spell the same quantity
///
/// Strings that do not parse are compared verbatim.
#[must_use]
pub fn same_quantity(a: &str, b: &str) -> bool {
    match (ParsedQuantity::parse(a), ParsedQuantity::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
