//! Shared plumbing for the closed string enumerations (city, product type,
//! reception status). Each variant maps to exactly one persisted string.

macro_rules! closed_enum {
    ($t:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $t {
            /// Every value, in declaration order.
            pub const ALL: &'static [$t] = &[$($t::$variant),+];

            /// The persisted / wire representation.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($t::$variant => $text),+
                }
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $t {
            type Err = pvz_core::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($t::$variant),)+
                    other => Err(pvz_core::DomainError::validation(format!(
                        "unknown {}: {:?}",
                        $what, other
                    ))),
                }
            }
        }
    };
}

pub(crate) use closed_enum;
