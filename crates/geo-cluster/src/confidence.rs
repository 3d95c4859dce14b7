//! Display tiers for adjusted probabilities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Adjusted probability at or above which a prediction is shown as High
pub const HIGH_THRESHOLD: f64 = 0.10;
/// Adjusted probability at or above which a prediction is shown as Medium
pub const MEDIUM_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_probability(probability: f64) -> Self {
        match probability {
            p if p >= HIGH_THRESHOLD => ConfidenceLevel::High,
            p if p >= MEDIUM_THRESHOLD => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers() {
        assert_eq!(ConfidenceLevel::from_probability(0.27), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_probability(0.10), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_probability(0.08), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_probability(0.05), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_probability(0.049), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_probability(0.0), ConfidenceLevel::Low);
    }

    #[test]
    fn test_boost_can_promote_tier() {
        assert_eq!(ConfidenceLevel::from_probability(0.06), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_probability(0.06 + 0.09), ConfidenceLevel::High);
    }

    #[test]
    fn test_display() {
        assert_eq!(ConfidenceLevel::Medium.to_string(), "Medium");
    }
}
