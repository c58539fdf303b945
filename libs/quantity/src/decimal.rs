//! Exact arbitrary-precision decimal numbers.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use crate::Multiplier;

/// An exact decimal number: `mantissa / 10^scale`.
///
/// Values are kept normalized (no trailing zeros in the fractional part,
/// zero always has scale 0), so derived equality is numeric equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: BigInt,
    scale: u32,
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

impl Decimal {
    pub fn zero() -> Self {
        Self {
            mantissa: BigInt::zero(),
            scale: 0,
        }
    }

    /// Creates `mantissa / 10^scale`.
    pub fn new(mantissa: BigInt, scale: u32) -> Self {
        Self { mantissa, scale }.normalized()
    }

    pub fn from_integer(value: impl Into<BigInt>) -> Self {
        Self::new(value.into(), 0)
    }

    /// Parses plain decimal text: optional sign, digits, optional fraction.
    ///
    /// Either side of the decimal point may be empty (`"1."`, `".5"`) but
    /// not both. No exponent or suffix is accepted here.
    pub fn parse_plain(text: &str) -> Option<Self> {
        let (negative, rest) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let (int, frac) = rest.split_once('.').unwrap_or((rest, ""));
        if int.is_empty() && frac.is_empty() {
            return None;
        }
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int) || !all_digits(frac) {
            return None;
        }

        let mut mantissa: BigInt = format!("{int}{frac}").parse().ok()?;
        if negative {
            mantissa = -mantissa;
        }
        let scale = u32::try_from(frac.len()).ok()?;

        Some(Self::new(mantissa, scale))
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa.is_negative()
    }

    /// Returns true if the value has no fractional part.
    pub fn is_integer(&self) -> bool {
        self.scale == 0
    }

    /// Number of digits after the decimal point in canonical form.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    #[must_use]
    pub fn mul_pow10(self, exp: u32) -> Self {
        if self.scale >= exp {
            Self::new(self.mantissa, self.scale - exp)
        } else {
            Self::new(self.mantissa * pow10(exp - self.scale), 0)
        }
    }

    #[must_use]
    pub fn div_pow10(self, exp: u32) -> Self {
        Self::new(self.mantissa, self.scale + exp)
    }

    #[must_use]
    pub fn mul_pow2(self, exp: u32) -> Self {
        Self::new(self.mantissa * BigInt::from(2u32).pow(exp), self.scale)
    }

    /// Divides by `2^exp` exactly, using `1 / 2^k == 5^k / 10^k`.
    #[must_use]
    pub fn div_pow2(self, exp: u32) -> Self {
        Self::new(
            self.mantissa * BigInt::from(5u32).pow(exp),
            self.scale + exp,
        )
    }

    /// Multiplies by a unit multiplier.
    #[must_use]
    pub fn scale_up(self, multiplier: Multiplier) -> Self {
        match multiplier {
            Multiplier::Pow10(exp) if exp >= 0 => self.mul_pow10(exp.unsigned_abs()),
            Multiplier::Pow10(exp) => self.div_pow10(exp.unsigned_abs()),
            Multiplier::Pow2(exp) => self.mul_pow2(exp),
        }
    }

    /// Divides by a unit multiplier.
    #[must_use]
    pub fn scale_down(self, multiplier: Multiplier) -> Self {
        match multiplier {
            Multiplier::Pow10(exp) if exp >= 0 => self.div_pow10(exp.unsigned_abs()),
            Multiplier::Pow10(exp) => self.mul_pow10(exp.unsigned_abs()),
            Multiplier::Pow2(exp) => self.div_pow2(exp),
        }
    }

    fn normalized(mut self) -> Self {
        if self.mantissa.is_zero() {
            self.scale = 0;
            return self;
        }
        let ten = BigInt::from(10u32);
        while self.scale > 0 && (&self.mantissa % &ten).is_zero() {
            self.mantissa = &self.mantissa / &ten;
            self.scale -= 1;
        }
        self
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        let lhs = &self.mantissa * pow10(scale - self.scale);
        let rhs = &other.mantissa * pow10(scale - other.scale);
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            f.write_str("-")?;
        }
        let digits = self.mantissa.magnitude().to_string();
        let scale = self.scale as usize;
        if scale == 0 {
            return f.write_str(&digits);
        }

        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (int, frac) = padded.split_at(padded.len() - scale);
        write!(f, "{int}.{frac}")
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn dec(s: &str) -> Decimal {
        Decimal::parse_plain(s).unwrap()
    }

    #[rstest]
    #[case("0", "0")]
    #[case("-0.000", "0")]
    #[case("1.50", "1.5")]
    #[case("007", "7")]
    #[case(".5", "0.5")]
    #[case("1.", "1")]
    #[case("+12.340", "12.34")]
    #[case("-0.0025", "-0.0025")]
    #[case("1000", "1000")]
    fn test_parse_and_display(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(dec(input).to_string(), expected);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("-")]
    #[case("1.2.3")]
    #[case("1e3")]
    #[case("12a")]
    #[case(" 1")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(Decimal::parse_plain(input).is_none());
    }

    #[test]
    fn test_normalized_equality() {
        assert_eq!(dec("2.500"), dec("2.5"));
        assert_eq!(dec("0.0"), Decimal::zero());
    }

    #[test]
    fn test_ordering_across_scales() {
        assert!(dec("0.5") < dec("1"));
        assert!(dec("-1.25") < dec("-1.2"));
        assert!(dec("10") > dec("9.999999999999999999999"));
        assert_eq!(dec("3.0").cmp(&dec("3")), Ordering::Equal);
    }

    #[test]
    fn test_pow2_division_is_exact() {
        let value = Decimal::from_integer(1).div_pow2(10);
        assert_eq!(value.to_string(), "0.0009765625");
        assert_eq!(value.mul_pow2(10), Decimal::from_integer(1));
    }

    #[test]
    fn test_pow10_shifts() {
        assert_eq!(dec("1.5").mul_pow10(3).to_string(), "1500");
        assert_eq!(dec("1500").div_pow10(6).to_string(), "0.0015");
        assert!(dec("1500").is_integer());
        assert!(!dec("1.5").is_integer());
    }
}
