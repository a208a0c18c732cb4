//! Helper macro for closed enums with a canonical upper-case text form.
//!
//! Statuses and categories are stored and serialised using their canonical
//! spelling (`WAITING_PARTS`, `RAID_CONTROLLER`). Parsing is case-insensitive
//! and accepts the legacy aliases listed after each variant.

use std::fmt;

/// Error returned when text does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {input}")]
pub struct ParseEnumError {
    /// Human-readable name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub input: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, input: impl fmt::Display) -> Self {
        Self {
            kind,
            input: input.to_string(),
        }
    }
}

macro_rules! text_enum {
    (
        $(#[$outer:meta])*
        pub enum $name:ident ($kind:literal) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $text:literal $(| $alias:literal)*
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[serde(rename = $text)]
                $variant,
            )*
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            /// Canonical storage and wire spelling.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::domain::ParseEnumError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalised = value.trim().to_ascii_uppercase();
                match normalised.as_str() {
                    $($text $(| $alias)* => Ok(Self::$variant),)*
                    _ => Err($crate::domain::ParseEnumError::new($kind, value)),
                }
            }
        }
    };
}

pub(crate) use text_enum;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    text_enum! {
        /// Example enum for macro coverage.
        pub enum Shade ("shade") {
            /// Light.
            Light => "LIGHT" | "PALE",
            /// Dark.
            Dark => "DARK",
        }
    }

    #[rstest]
    #[case("LIGHT", Shade::Light)]
    #[case("light", Shade::Light)]
    #[case(" pale ", Shade::Light)]
    #[case("Dark", Shade::Dark)]
    fn parses_canonical_and_alias_spellings(#[case] raw: &str, #[case] expected: Shade) {
        assert_eq!(raw.parse::<Shade>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_values_with_kind() {
        let err = "dim".parse::<Shade>().expect_err("unknown shade");
        assert_eq!(err.to_string(), "invalid shade: dim");
    }

    #[rstest]
    fn serialises_using_canonical_text() {
        let json = serde_json::to_string(&Shade::Dark).expect("serialise");
        assert_eq!(json, "\"DARK\"");
        assert_eq!(Shade::ALL.len(), 2);
    }
}
