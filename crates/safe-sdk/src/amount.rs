use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Fractional digits carried by the ledger's fixed-point integers.
pub const PRECISION: u32 = 8;

/// Largest decimal scale an [`Amount`] can hold (10^38 still fits in a u128).
pub const MAX_SCALE: u32 = 38;

/// Exact, non-negative decimal amount.
///
/// Stored as `mantissa / 10^scale` and always normalized (no trailing
/// fractional zeros), so derived equality is numeric equality:
/// `"10.00000000"` and `"10"` are the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Amount {
    mantissa: u128,
    scale: u32,
}

impl Amount {
    pub const ZERO: Amount = Amount {
        mantissa: 0,
        scale: 0,
    };

    pub fn new(mantissa: u128, scale: u32) -> Result<Self> {
        if scale > MAX_SCALE {
            return Err(Error::InvalidAmount(format!(
                "scale {scale} exceeds {MAX_SCALE}"
            )));
        }
        Ok(Self::normalized(mantissa, scale))
    }

    fn normalized(mut mantissa: u128, mut scale: u32) -> Self {
        if mantissa == 0 {
            return Self::ZERO;
        }
        while scale > 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }
        Self { mantissa, scale }
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    /// Number of significant fractional digits.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        let (a, b, scale) = self.aligned(other)?;
        Some(Self::normalized(a.checked_add(b)?, scale))
    }

    /// `None` when the result would be negative.
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        let (a, b, scale) = self.aligned(other)?;
        Some(Self::normalized(a.checked_sub(b)?, scale))
    }

    /// Exact sum of a sequence; `None` on overflow.
    pub fn checked_sum<'a>(amounts: impl IntoIterator<Item = &'a Amount>) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(a))
    }

    /// Both mantissas rescaled to the larger scale.
    fn aligned(&self, other: &Amount) -> Option<(u128, u128, u32)> {
        let scale = self.scale.max(other.scale);
        let a = rescale(self.mantissa, scale - self.scale)?;
        let b = rescale(other.mantissa, scale - other.scale)?;
        Some((a, b, scale))
    }
}

fn rescale(mantissa: u128, extra_digits: u32) -> Option<u128> {
    mantissa.checked_mul(10u128.checked_pow(extra_digits)?)
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        // Only the side being scaled up can overflow, and an overflowing
        // side is necessarily the larger one.
        match (
            rescale(self.mantissa, scale - self.scale),
            rescale(other.mantissa, scale - other.scale),
        ) {
            (Some(a), Some(b)) => a.cmp(&b),
            (None, _) => Ordering::Greater,
            (_, None) => Ordering::Less,
        }
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = |why: &str| Error::InvalidAmount(format!("{s:?}: {why}"));

        if s.starts_with('-') {
            return Err(invalid("negative"));
        }
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() || (s.contains('.') && frac_part.is_empty()) {
            return Err(invalid("malformed decimal"));
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid("not a decimal number"));
        }
        let scale = frac_part.len() as u32;
        if scale > MAX_SCALE {
            return Err(invalid("too many fractional digits"));
        }

        let mut mantissa: u128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(u128::from(b - b'0')))
                .ok_or_else(|| invalid("too large"))?;
        }
        Ok(Self::normalized(mantissa, scale))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let divisor = 10u128.pow(self.scale);
        write!(
            f,
            "{}.{:0width$}",
            self.mantissa / divisor,
            self.mantissa % divisor,
            width = self.scale as usize
        )
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Amount in the ledger's fixed-point form: atomic units of 10^-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Integer(u128);

impl Integer {
    pub fn from_units(units: u128) -> Self {
        Self(units)
    }

    /// Exact conversion; fails when the amount carries more than
    /// [`PRECISION`] fractional digits or does not fit.
    pub fn from_amount(amount: &Amount) -> Result<Self> {
        if amount.scale > PRECISION {
            return Err(Error::AmountPrecisionOverflow(amount.to_string()));
        }
        rescale(amount.mantissa, PRECISION - amount.scale)
            .map(Self)
            .ok_or_else(|| Error::AmountPrecisionOverflow(amount.to_string()))
    }

    pub fn units(&self) -> u128 {
        self.0
    }

    pub fn to_amount(&self) -> Amount {
        Amount::normalized(self.0, PRECISION)
    }

    pub fn checked_add(&self, other: &Integer) -> Option<Integer> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Minimal big-endian magnitude; zero encodes as no bytes.
    pub(crate) fn magnitude_bytes(&self) -> Vec<u8> {
        let bytes = self.0.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        bytes[first..].to_vec()
    }

    pub(crate) fn from_magnitude_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > 16 {
            return Err(Error::Serialization(format!(
                "integer of {} bytes exceeds 128 bits",
                bytes.len()
            )));
        }
        if bytes.first() == Some(&0) {
            return Err(Error::Serialization("integer has leading zero byte".into()));
        }
        let mut buf = [0u8; 16];
        buf[16 - bytes.len()..].copy_from_slice(bytes);
        Ok(Self(u128::from_be_bytes(buf)))
    }
}

impl Serialize for Integer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Integer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let amount = Amount::deserialize(deserializer)?;
        Integer::from_amount(&amount).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_amount().fmt(f)
    }
}
