//! Anchors: dates where observed data pins the fish weight.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The kind of observation backing an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorType {
    GrowthSample,
    Transfer,
    Vaccination,
}

impl AnchorType {
    /// Precedence when several candidates land on one date; lower wins.
    pub fn priority(self) -> u8 {
        match self {
            AnchorType::GrowthSample => 1,
            AnchorType::Transfer => 2,
            AnchorType::Vaccination => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnchorType::GrowthSample => "growth_sample",
            AnchorType::Transfer => "transfer",
            AnchorType::Vaccination => "vaccination",
        }
    }
}

/// A derived (never stored) record pinning the weight on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub anchor_type: AnchorType,
    pub date: NaiveDate,
    pub weight_g: f64,
    pub confidence: f64,
    pub source_id: i64,
}

impl Anchor {
    pub fn priority(&self) -> u8 {
        self.anchor_type.priority()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_is_sample_transfer_vaccination() {
        assert!(AnchorType::GrowthSample.priority() < AnchorType::Transfer.priority());
        assert!(AnchorType::Transfer.priority() < AnchorType::Vaccination.priority());
    }

    #[test]
    fn anchor_type_serializes_snake_case() {
        let json = serde_json::to_value(AnchorType::GrowthSample).unwrap();
        assert_eq!(json, "growth_sample");
    }
}
