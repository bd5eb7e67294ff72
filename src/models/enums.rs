use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            /// Case-insensitive: stored values are upper case, user input may not be.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_uppercase().as_str() {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ObservableCategory {
    Bloodwork => "BLOODWORK",
    Comorbidity => "COMORBIDITY",
    Drug => "DRUG",
    PatientInfo => "PATIENT_INFO",
    PatientInfoII => "PATIENT_INFO_II",
    PatientPrep => "PATIENT_PREP",
    Symptom => "SYMPTOM",
    Test => "TEST",
    Vitals => "VITALS",
});

str_enum!(ValueType {
    Bool => "BOOL",
    Str => "STR",
    Int => "INT",
    Float => "FLOAT",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn category_round_trip() {
        for category in ObservableCategory::ALL {
            assert_eq!(ObservableCategory::from_str(category.as_str()).unwrap(), *category);
        }
    }

    #[test]
    fn value_type_parse_is_case_insensitive() {
        assert_eq!(ValueType::from_str("float").unwrap(), ValueType::Float);
        assert_eq!(ValueType::from_str(" Bool ").unwrap(), ValueType::Bool);
    }

    #[test]
    fn unknown_value_rejected() {
        let err = ValueType::from_str("DECIMAL").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
        assert!(err.to_string().contains("ValueType"));
    }

    #[test]
    fn display_matches_stored_form() {
        assert_eq!(ObservableCategory::PatientInfoII.to_string(), "PATIENT_INFO_II");
    }
}
