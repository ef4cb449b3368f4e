//! Confidence thresholds that gate each tier.

use serde::{Deserialize, Serialize};

/// Confidence level categories for mapping quality assessment.
///
/// - `High`: accepted without review (tier-1 quality)
/// - `Medium`: accepted, worth a glance
/// - `Low`: ambiguous, resolved by reasoning or left to a human
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::High => "high confidence - likely correct",
            Self::Medium => "medium confidence - should review",
            Self::Low => "low confidence - needs verification",
        }
    }
}

/// Thresholds for the tier pipeline.
///
/// - At or above `exact_accept`: tier-1 hits are accepted
/// - At or above `medium`: semantic hits are accepted
/// - `ambiguous_low` to `medium`: escalated to reasoning
/// - `min_confidence`: default bar for the final lexical pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    pub exact_accept: f32,
    pub medium: f32,
    pub ambiguous_low: f32,
    pub min_confidence: f32,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            exact_accept: 0.85,
            medium: 0.70,
            ambiguous_low: 0.40,
            min_confidence: 0.70,
        }
    }
}

impl MatchThresholds {
    /// Categorizes a confidence score.
    ///
    /// Returns `None` below the ambiguous band.
    #[must_use]
    pub fn categorize(&self, confidence: f32) -> Option<ConfidenceLevel> {
        if confidence >= self.exact_accept {
            Some(ConfidenceLevel::High)
        } else if confidence >= self.medium {
            Some(ConfidenceLevel::Medium)
        } else if confidence >= self.ambiguous_low {
            Some(ConfidenceLevel::Low)
        } else {
            None
        }
    }

    /// Whether a semantic score should be escalated rather than accepted.
    pub fn is_ambiguous(&self, confidence: f32) -> bool {
        (self.ambiguous_low..self.medium).contains(&confidence)
    }

    /// Checks ordering and range.
    pub fn validate(&self) -> Result<(), String> {
        let all = [
            ("exact_accept", self.exact_accept),
            ("medium", self.medium),
            ("ambiguous_low", self.ambiguous_low),
            ("min_confidence", self.min_confidence),
        ];
        if let Some((name, value)) = all.iter().find(|(_, v)| !(0.0..=1.0).contains(v)) {
            return Err(format!("threshold {name} = {value} is outside [0, 1]"));
        }
        if self.ambiguous_low > self.medium || self.medium > self.exact_accept {
            return Err(format!(
                "thresholds must satisfy ambiguous_low <= medium <= exact_accept (got {} / {} / {})",
                self.ambiguous_low, self.medium, self.exact_accept
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_follows_bands() {
        let t = MatchThresholds::default();
        assert_eq!(t.categorize(0.95), Some(ConfidenceLevel::High));
        assert_eq!(t.categorize(0.85), Some(ConfidenceLevel::High));
        assert_eq!(t.categorize(0.72), Some(ConfidenceLevel::Medium));
        assert_eq!(t.categorize(0.40), Some(ConfidenceLevel::Low));
        assert_eq!(t.categorize(0.39), None);
    }

    #[test]
    fn ambiguous_band_is_half_open() {
        let t = MatchThresholds::default();
        assert!(t.is_ambiguous(0.40));
        assert!(t.is_ambiguous(0.69));
        assert!(!t.is_ambiguous(0.70));
        assert!(!t.is_ambiguous(0.39));
    }

    #[test]
    fn defaults_are_valid() {
        assert!(MatchThresholds::default().validate().is_ok());
    }

    #[test]
    fn inverted_bands_are_rejected() {
        let t = MatchThresholds {
            medium: 0.9,
            exact_accept: 0.8,
            ..MatchThresholds::default()
        };
        assert!(t.validate().is_err());
        let t = MatchThresholds {
            min_confidence: 1.5,
            ..MatchThresholds::default()
        };
        assert!(t.validate().unwrap_err().contains("min_confidence"));
    }
}
