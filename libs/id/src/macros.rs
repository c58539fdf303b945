//! Macros for defining validated name types.

/// Macro to define a validated, string-backed name.
///
/// This generates a newtype wrapper around `String` with:
/// - `KIND`, `PATTERN`, `MIN_LEN` and `MAX_LEN` constants
/// - `parse()` which enforces the length bounds and the anchored pattern
/// - `as_str()`, `Display`, `FromStr` and `AsRef<str>`
/// - `Serialize` and validating `Deserialize` implementations
///
/// # Example
///
/// ```ignore
/// define_name!(ProjectName, "project name", r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$", 2, 63);
///
/// let project: ProjectName = "team-a".parse()?;
/// ```
#[macro_export]
macro_rules! define_name {
    ($name:ident, $kind:literal, $pattern:literal, $min:literal, $max:literal) => {
        /// A validated name.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Human readable name of this kind of value.
            pub const KIND: &'static str = $kind;

            /// Anchored regular expression every value matches.
            pub const PATTERN: &'static str = $pattern;

            /// Minimum length in bytes.
            pub const MIN_LEN: usize = $min;

            /// Maximum length in bytes.
            pub const MAX_LEN: usize = $max;

            fn regex() -> &'static $crate::regex::Regex {
                static REGEX: std::sync::LazyLock<$crate::regex::Regex> =
                    std::sync::LazyLock::new(|| {
                        $crate::regex::Regex::new($pattern).expect("name pattern is valid")
                    });
                &REGEX
            }

            /// Parses and validates a name.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                if s.is_empty() {
                    return Err($crate::IdError::Empty { kind: Self::KIND });
                }

                if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&s.len()) {
                    return Err($crate::IdError::InvalidLength {
                        kind: Self::KIND,
                        value: s.to_string(),
                        min: Self::MIN_LEN,
                        max: Self::MAX_LEN,
                    });
                }

                if !Self::regex().is_match(s) {
                    return Err($crate::IdError::InvalidFormat {
                        kind: Self::KIND,
                        value: s.to_string(),
                        pattern: Self::PATTERN,
                    });
                }

                Ok(Self(s.to_string()))
            }

            /// Returns the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}
