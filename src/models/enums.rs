use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde goes through the same string codes, so the wire format and the
/// stored column always agree.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal / $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            /// Human-readable label for forms.
            pub fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse()
                    .map_err(|_| serde::de::Error::custom(format!("\"{raw}\" is not a valid choice.")))
            }
        }
    };
}

str_enum!(Language {
    English => "EN" / "English",
    Bengali => "BN" / "Bengali",
    Hindi => "HI" / "Hindi",
});

impl Default for Language {
    fn default() -> Self {
        Language::English
    }
}

str_enum!(TokenScope {
    Api => "api" / "API",
    Admin => "admin" / "Admin console",
});

/// Message used when a choice field gets an unknown code.
pub fn invalid_choice(value: &str) -> String {
    format!("\"{value}\" is not a valid choice.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn language_round_trips_through_codes() {
        for lang in Language::ALL {
            assert_eq!(Language::from_str(lang.as_str()).unwrap(), *lang);
        }
    }

    #[test]
    fn unknown_language_is_rejected() {
        let err = Language::from_str("FR").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn language_serializes_as_code() {
        assert_eq!(serde_json::to_value(Language::Bengali).unwrap(), "BN");
        let parsed: Language = serde_json::from_value(serde_json::json!("HI")).unwrap();
        assert_eq!(parsed, Language::Hindi);
        assert!(serde_json::from_value::<Language>(serde_json::json!("XX")).is_err());
    }

    #[test]
    fn default_language_is_english() {
        assert_eq!(Language::default(), Language::English);
    }
}
