//! Enumerated value domains of the Record Store contract.
//!
//! Every domain column is stored as TEXT; the values below are fixed by the
//! hosted backend and treated as a contract.

use serde::{Deserialize, Serialize};

/// A TEXT column held a value outside its contracted domain.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid {field} value: {value:?}")]
pub struct InvalidEnumValue {
    pub field: String,
    pub value: String,
}

/// Generates an enum with `as_str` / `FromStr` / `Display` plus the sqlx
/// TEXT-column plumbing, keeping the wire strings next to the variants.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnumValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnumValue {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <&str as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                s.parse::<$name>().map_err(Into::into)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

str_enum!(Sex {
    Male => "male",
    Female => "female",
});

str_enum!(LinkageStatus {
    Linked => "linked",
    NotLinked => "not-linked",
    Unlinked => "unlinked",
});

str_enum!(DependencyStatus {
    PrimaryHolder => "primary-holder",
    Dependent => "dependent",
});

str_enum!(VisitChannel {
    InPerson => "in-person",
    Virtual => "virtual",
    Scheduled => "scheduled",
});

str_enum!(ScreeningStatus {
    Pending => "pending",
    Done => "done",
    Overdue => "overdue",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trip_all_variants() {
        for variant in LinkageStatus::ALL {
            assert_eq!(
                LinkageStatus::from_str(variant.as_str()).unwrap(),
                *variant
            );
        }
        for variant in VisitChannel::ALL {
            assert_eq!(VisitChannel::from_str(variant.as_str()).unwrap(), *variant);
        }
        for variant in ScreeningStatus::ALL {
            assert_eq!(
                ScreeningStatus::from_str(variant.as_str()).unwrap(),
                *variant
            );
        }
    }

    #[test]
    fn kebab_case_wire_values() {
        assert_eq!(LinkageStatus::NotLinked.as_str(), "not-linked");
        assert_eq!(DependencyStatus::PrimaryHolder.as_str(), "primary-holder");
        assert_eq!(VisitChannel::InPerson.as_str(), "in-person");
    }

    #[test]
    fn serde_uses_wire_values() {
        let json = serde_json::to_string(&Sex::Female).unwrap();
        assert_eq!(json, "\"female\"");
        let back: LinkageStatus = serde_json::from_str("\"not-linked\"").unwrap();
        assert_eq!(back, LinkageStatus::NotLinked);
    }

    #[test]
    fn out_of_domain_value_rejected() {
        let err = Sex::from_str("other").unwrap_err();
        assert!(err.to_string().contains("Sex"));
        assert!(ScreeningStatus::from_str("").is_err());
    }
}
