//! Quantities: a decimal magnitude paired with a unit suffix.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{Decimal, QuantityError, Unit};

/// Largest decimal exponent accepted in `<n>e<exp>` notation.
const MAX_EXPONENT: u32 = 1024;

/// A resource quantity such as `1.5Gi` or `250m`.
///
/// Structural equality compares magnitude *and* unit, so `1k` and `1000`
/// are different values; use [`Quantity::compare`] to compare amounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Quantity {
    magnitude: Decimal,
    unit: Unit,
}

impl Quantity {
    pub fn new(magnitude: Decimal, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    /// The zero quantity (unitless).
    pub fn zero() -> Self {
        Self::default()
    }

    /// Builds a quantity from a separately supplied value and unit.
    ///
    /// The value must be plain decimal text (no suffix, no exponent).
    pub fn from_parts(value: &str, unit: Unit) -> Result<Self, QuantityError> {
        if value.is_empty() {
            return Err(QuantityError::Empty);
        }
        let magnitude = Decimal::parse_plain(value)
            .ok_or_else(|| QuantityError::malformed(value, "invalid number"))?;
        Ok(Self::new(magnitude, unit))
    }

    /// Parses quantity text: a signed decimal number followed by either a
    /// unit suffix or a decimal exponent (`e3`, `E-2`).
    ///
    /// Exponent forms are folded into a unitless magnitude.
    pub fn parse(text: &str) -> Result<Self, QuantityError> {
        if text.is_empty() {
            return Err(QuantityError::Empty);
        }

        let number_end = text
            .char_indices()
            .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '+' || *c == '-'))))
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let (number, suffix) = text.split_at(number_end);

        let magnitude = Decimal::parse_plain(number)
            .ok_or_else(|| QuantityError::malformed(text, "invalid number"))?;

        if let Some(exponent) = parse_exponent(suffix) {
            let exponent = exponent.map_err(|reason| QuantityError::malformed(text, reason))?;
            let magnitude = if exponent >= 0 {
                magnitude.mul_pow10(exponent.unsigned_abs())
            } else {
                magnitude.div_pow10(exponent.unsigned_abs())
            };
            return Ok(Self::new(magnitude, Unit::None));
        }

        let unit = Unit::from_suffix(suffix)
            .ok_or_else(|| QuantityError::malformed(text, "unknown unit suffix"))?;
        Ok(Self::new(magnitude, unit))
    }

    pub fn magnitude(&self) -> &Decimal {
        &self.magnitude
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// The unitless amount this quantity represents.
    pub fn to_base(&self) -> Decimal {
        self.magnitude.clone().scale_up(self.unit.multiplier())
    }

    /// Re-expresses this quantity in `target` units without rounding.
    pub fn convert(&self, target: Unit) -> Quantity {
        let magnitude = self.to_base().scale_down(target.multiplier());
        Quantity::new(magnitude, target)
    }

    /// Compares the amounts represented by two quantities.
    pub fn compare(&self, other: &Quantity) -> Ordering {
        if self.unit == other.unit {
            return self.magnitude.cmp(&other.magnitude);
        }
        self.to_base().cmp(&other.to_base())
    }

    /// Canonical text form: normalized magnitude followed by the suffix.
    pub fn format(&self) -> String {
        self.to_string()
    }
}

/// Returns `None` if `suffix` is not exponent notation, otherwise the
/// parsed exponent.
///
/// A bare `E` is the exa suffix, so an exponent needs at least one digit.
fn parse_exponent(suffix: &str) -> Option<Result<i32, &'static str>> {
    let rest = suffix.strip_prefix(['e', 'E'])?;
    let digits = rest.strip_prefix(['+', '-']).unwrap_or(rest);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let value = match digits.parse::<u32>() {
        Ok(v) if v <= MAX_EXPONENT => v as i32,
        _ => return Some(Err("exponent out of range")),
    };
    Some(Ok(if rest.starts_with('-') { -value } else { value }))
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
