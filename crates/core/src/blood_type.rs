use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// ABO/Rh blood group.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    pub const COUNT: usize = 8;

    /// All eight groups, in a stable display order.
    pub const ALL: [BloodType; Self::COUNT] = [
        BloodType::APositive,
        BloodType::ANegative,
        BloodType::BPositive,
        BloodType::BNegative,
        BloodType::AbPositive,
        BloodType::AbNegative,
        BloodType::OPositive,
        BloodType::ONegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::AbPositive => "AB+",
            BloodType::AbNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }

    /// Position in [`BloodType::ALL`]; used for fixed-size per-type tables.
    pub fn index(&self) -> usize {
        match self {
            BloodType::APositive => 0,
            BloodType::ANegative => 1,
            BloodType::BPositive => 2,
            BloodType::BNegative => 3,
            BloodType::AbPositive => 4,
            BloodType::AbNegative => 5,
            BloodType::OPositive => 6,
            BloodType::ONegative => 7,
        }
    }
}

impl core::fmt::Display for BloodType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = DomainError;

    /// Accepts the label (`"AB-"`, case-insensitive) or a URL-friendly spelling
    /// (`"ab_neg"`, `"ABneg"`, `"o-pos"`).
    ///
    /// A bare group followed by whitespace (`"A "`) reads as positive: that is
    /// what an unescaped `A+` becomes after form/query decoding.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();

        let normalized = normalized
            .strip_suffix("POS")
            .map(|group| format!("{}+", group.trim_end_matches('-')))
            .or_else(|| {
                normalized
                    .strip_suffix("NEG")
                    .map(|group| format!("{}-", group.trim_end_matches('-')))
            })
            .unwrap_or(normalized);

        let decoded_plus = s.trim_start().ends_with(char::is_whitespace);
        let normalized = if decoded_plus && matches!(normalized.as_str(), "A" | "B" | "AB" | "O") {
            format!("{normalized}+")
        } else {
            normalized
        };

        BloodType::ALL
            .into_iter()
            .find(|bt| bt.as_str() == normalized)
            .ok_or_else(|| DomainError::validation(format!("unknown blood type '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("ab-".parse::<BloodType>().unwrap(), BloodType::AbNegative);
        assert_eq!("O+".parse::<BloodType>().unwrap(), BloodType::OPositive);
    }

    #[test]
    fn parses_url_friendly_spellings() {
        assert_eq!("a_pos".parse::<BloodType>().unwrap(), BloodType::APositive);
        assert_eq!("ABneg".parse::<BloodType>().unwrap(), BloodType::AbNegative);
        assert_eq!("o-neg".parse::<BloodType>().unwrap(), BloodType::ONegative);
    }

    #[test]
    fn rejects_unknown_groups() {
        assert!(matches!(
            "C+".parse::<BloodType>(),
            Err(DomainError::Validation(_))
        ));
        assert!("A".parse::<BloodType>().is_err());
        assert!(" ".parse::<BloodType>().is_err());
    }

    #[test]
    fn query_decoded_plus_reads_as_positive() {
        assert_eq!("A ".parse::<BloodType>().unwrap(), BloodType::APositive);
        assert_eq!("ab ".parse::<BloodType>().unwrap(), BloodType::AbPositive);
        assert_eq!("O-".parse::<BloodType>().unwrap(), BloodType::ONegative);
    }

    #[test]
    fn index_matches_position_in_all() {
        for (i, bt) in BloodType::ALL.iter().enumerate() {
            assert_eq!(bt.index(), i);
        }
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&BloodType::BNegative).unwrap();
        assert_eq!(json, "\"B-\"");
    }
}
