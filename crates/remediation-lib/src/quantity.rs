//! Kubernetes memory quantities
//!
//! Limits arrive in whatever notation the workload author chose (`512Mi`,
//! `536870912`, `1G`, `129e6`, `128974848000m`). Comparison happens on the
//! byte value, rounded up to whole bytes, so that equal sizes written
//! differently are treated the same; display keeps the original notation so
//! messages match what the operator wrote.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a memory quantity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty memory quantity")]
    Empty,

    #[error("invalid memory quantity '{0}'")]
    Invalid(String),

    #[error("unsupported memory suffix '{suffix}' in '{value}'")]
    UnsupportedSuffix { value: String, suffix: String },

    #[error("memory quantity '{0}' overflows")]
    Overflow(String),
}

const BINARY_SUFFIXES: &[(&str, u32)] = &[
    ("Ki", 10),
    ("Mi", 20),
    ("Gi", 30),
    ("Ti", 40),
    ("Pi", 50),
    ("Ei", 60),
];

const DECIMAL_SUFFIXES: &[(&str, i32)] = &[
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("", 0),
    ("k", 3),
    ("K", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

/// Scale of a suffix as (power of two, power of ten). Besides the named
/// suffixes this accepts a decimal exponent such as `e6` or `E-3`.
fn suffix_scale(suffix: &str) -> Option<(u32, i32)> {
    if let Some((_, shift)) = BINARY_SUFFIXES.iter().find(|(name, _)| *name == suffix) {
        return Some((*shift, 0));
    }
    if let Some((_, exponent)) = DECIMAL_SUFFIXES.iter().find(|(name, _)| *name == suffix) {
        return Some((0, *exponent));
    }
    let exponent = suffix.strip_prefix(&['e', 'E'][..])?;
    if exponent.is_empty() {
        return None;
    }
    exponent.parse::<i32>().ok().map(|exponent| (0, exponent))
}

/// `mantissa * 2^shift * 10^exponent`, rounded up to whole bytes
fn scaled_bytes(mantissa: u128, shift: u32, exponent: i32) -> Option<u64> {
    let value = mantissa.checked_mul(1u128 << shift)?;
    let bytes = if exponent >= 0 {
        value.checked_mul(10u128.checked_pow(exponent.unsigned_abs())?)?
    } else {
        match 10u128.checked_pow(exponent.unsigned_abs()) {
            Some(divisor) => value / divisor + u128::from(value % divisor != 0),
            None => u128::from(value != 0),
        }
    };
    u64::try_from(bytes).ok()
}

/// A memory size with its original textual form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryQuantity {
    bytes: u64,
    repr: String,
}

impl MemoryQuantity {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn as_str(&self) -> &str {
        &self.repr
    }

    /// Binary-suffixed quantity, e.g. `MemoryQuantity::mebibytes(512)` is `512Mi`
    pub fn mebibytes(value: u64) -> Self {
        Self {
            bytes: value << 20,
            repr: format!("{}Mi", value),
        }
    }

    pub fn gibibytes(value: u64) -> Self {
        Self {
            bytes: value << 30,
            repr: format!("{}Gi", value),
        }
    }
}

impl FromStr for MemoryQuantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(QuantityError::Empty);
        }

        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let split = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(split);
        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(QuantityError::Invalid(trimmed.to_string()));
        }

        let (shift, exponent) =
            suffix_scale(suffix).ok_or_else(|| QuantityError::UnsupportedSuffix {
                value: trimmed.to_string(),
                suffix: suffix.to_string(),
            })?;

        let overflow = || QuantityError::Overflow(trimmed.to_string());
        let mantissa: u128 = format!("{}{}", whole, fraction)
            .parse()
            .map_err(|_| overflow())?;
        let fraction_digits = i32::try_from(fraction.len()).map_err(|_| overflow())?;
        let bytes = exponent
            .checked_sub(fraction_digits)
            .and_then(|exponent| scaled_bytes(mantissa, shift, exponent))
            .ok_or_else(overflow)?;

        Ok(Self {
            bytes,
            repr: trimmed.to_string(),
        })
    }
}

impl TryFrom<String> for MemoryQuantity {
    type Error = QuantityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MemoryQuantity> for String {
    fn from(value: MemoryQuantity) -> Self {
        value.repr
    }
}

impl fmt::Display for MemoryQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl PartialEq for MemoryQuantity {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for MemoryQuantity {}

impl Hash for MemoryQuantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl PartialOrd for MemoryQuantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemoryQuantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}
