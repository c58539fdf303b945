//! Unit suffix vocabulary.

use std::fmt;
use std::str::FromStr;

use crate::QuantityError;

/// A quantity unit suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Unit {
    /// No suffix.
    #[default]
    None,

    Ki,
    Mi,
    Gi,
    Ti,
    Pi,
    Ei,

    Nano,
    Micro,
    Milli,
    Kilo,
    Mega,
    Giga,
    Tera,
    Peta,
    Exa,
}

/// The factor a unit applies to a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplier {
    /// `10^exp` (exp may be negative for sub-unit prefixes).
    Pow10(i32),

    /// `2^exp`.
    Pow2(u32),
}

impl Unit {
    /// Every supported unit, unitless first.
    pub const ALL: [Unit; 16] = [
        Unit::None,
        Unit::Ki,
        Unit::Mi,
        Unit::Gi,
        Unit::Ti,
        Unit::Pi,
        Unit::Ei,
        Unit::Nano,
        Unit::Micro,
        Unit::Milli,
        Unit::Kilo,
        Unit::Mega,
        Unit::Giga,
        Unit::Tera,
        Unit::Peta,
        Unit::Exa,
    ];

    /// The textual suffix of this unit.
    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Ki => "Ki",
            Unit::Mi => "Mi",
            Unit::Gi => "Gi",
            Unit::Ti => "Ti",
            Unit::Pi => "Pi",
            Unit::Ei => "Ei",
            Unit::Nano => "n",
            Unit::Micro => "u",
            Unit::Milli => "m",
            Unit::Kilo => "k",
            Unit::Mega => "M",
            Unit::Giga => "G",
            Unit::Tera => "T",
            Unit::Peta => "P",
            Unit::Exa => "E",
        }
    }

    /// Looks up a unit by its exact suffix.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.suffix() == suffix)
    }

    pub fn multiplier(&self) -> Multiplier {
        match self {
            Unit::None => Multiplier::Pow10(0),
            Unit::Ki => Multiplier::Pow2(10),
            Unit::Mi => Multiplier::Pow2(20),
            Unit::Gi => Multiplier::Pow2(30),
            Unit::Ti => Multiplier::Pow2(40),
            Unit::Pi => Multiplier::Pow2(50),
            Unit::Ei => Multiplier::Pow2(60),
            Unit::Nano => Multiplier::Pow10(-9),
            Unit::Micro => Multiplier::Pow10(-6),
            Unit::Milli => Multiplier::Pow10(-3),
            Unit::Kilo => Multiplier::Pow10(3),
            Unit::Mega => Multiplier::Pow10(6),
            Unit::Giga => Multiplier::Pow10(9),
            Unit::Tera => Multiplier::Pow10(12),
            Unit::Peta => Multiplier::Pow10(15),
            Unit::Exa => Multiplier::Pow10(18),
        }
    }

    /// Returns true for the `Ki`..`Ei` family.
    pub fn is_binary(&self) -> bool {
        matches!(self.multiplier(), Multiplier::Pow2(_))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for Unit {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_suffix(s).ok_or_else(|| QuantityError::UnknownUnit(s.to_string()))
    }
}

impl serde::Serialize for Unit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.suffix())
    }
}

impl<'de> serde::Deserialize<'de> for Unit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
