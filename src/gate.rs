//! Confidence Gate - accept or reject a prediction by threshold.
//!
//! Thresholds are looked up per intent, falling back to one of two default
//! buckets: the `none` intent gets a lower bar than actionable intents.
//! The comparison is inclusive (`confidence >= threshold`). A prediction
//! without evidence (no known terms) is never accepted, whatever its
//! confidence.

use crate::error::ConfigError;
use crate::types::{GateDecision, Intent, Prediction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum acceptance probability per intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdTable {
    /// Bar for every actionable intent without an override
    pub default: f64,
    /// Bar for the `none` intent without an override
    pub none: f64,
    pub overrides: BTreeMap<Intent, f64>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            default: 0.5,
            none: 0.4,
            overrides: BTreeMap::new(),
        }
    }
}

impl ThresholdTable {
    pub fn with_override(mut self, intent: impl Into<Intent>, threshold: f64) -> Self {
        self.overrides.insert(intent.into(), threshold);
        self
    }

    pub fn threshold_for(&self, intent: &Intent) -> f64 {
        if let Some(&t) = self.overrides.get(intent) {
            return t;
        }
        if intent.is_none() {
            self.none
        } else {
            self.default
        }
    }

    /// All thresholds must lie within [0, 1]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let buckets = [("default".to_string(), self.default), ("none".to_string(), self.none)];
        let overrides = self.overrides.iter().map(|(i, t)| (i.to_string(), *t));

        for (bucket, value) in buckets.into_iter().chain(overrides) {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { bucket, value });
            }
        }
        Ok(())
    }
}

/// Applies a [`ThresholdTable`] to classifier output
#[derive(Debug, Clone, Default)]
pub struct ConfidenceGate {
    thresholds: ThresholdTable,
}

impl ConfidenceGate {
    pub fn new(thresholds: ThresholdTable) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, prediction: &Prediction) -> GateDecision {
        if !prediction.has_evidence {
            log::debug!("Unresolved '{}': no known terms", prediction.intent);
            return GateDecision::Unresolved {
                best_guess: prediction.intent.clone(),
                confidence: prediction.confidence,
                threshold: self.thresholds.threshold_for(&prediction.intent),
            };
        }
        self.evaluate_parts(&prediction.intent, prediction.confidence)
    }

    /// Gate a bare (intent, confidence) pair
    pub fn evaluate_parts(&self, intent: &Intent, confidence: f64) -> GateDecision {
        let threshold = self.thresholds.threshold_for(intent);

        if confidence >= threshold {
            log::debug!("Accepted '{}' ({:.2} >= {:.2})", intent, confidence, threshold);
            GateDecision::Accepted {
                intent: intent.clone(),
                confidence,
            }
        } else {
            log::debug!("Unresolved '{}' ({:.2} < {:.2})", intent, confidence, threshold);
            GateDecision::Unresolved {
                best_guess: intent.clone(),
                confidence,
                threshold,
            }
        }
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConfidenceDistribution;

    fn gate() -> ConfidenceGate {
        ConfidenceGate::new(ThresholdTable::default())
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let decision = gate().evaluate_parts(&Intent::new("open_notepad"), 0.5);
        assert!(decision.is_accepted());

        let decision = gate().evaluate_parts(&Intent::new("open_notepad"), 0.49);
        assert!(!decision.is_accepted());
    }

    #[test]
    fn test_none_uses_lower_bar() {
        let decision = gate().evaluate_parts(&Intent::none(), 0.45);
        assert!(decision.is_accepted());

        let decision = gate().evaluate_parts(&Intent::none(), 0.39);
        assert!(!decision.is_accepted());
    }

    #[test]
    fn test_unresolved_keeps_best_guess() {
        match gate().evaluate_parts(&Intent::new("get_time"), 0.3) {
            GateDecision::Unresolved {
                best_guess,
                confidence,
                threshold,
            } => {
                assert_eq!(best_guess.as_str(), "get_time");
                assert_eq!(confidence, 0.3);
                assert_eq!(threshold, 0.5);
            }
            other => panic!("expected unresolved, got {:?}", other),
        }
    }

    #[test]
    fn test_override_takes_precedence() {
        let gate = ConfidenceGate::new(
            ThresholdTable::default().with_override("shutdown_computer", 0.8),
        );

        assert!(!gate.evaluate_parts(&Intent::new("shutdown_computer"), 0.7).is_accepted());
        assert!(gate.evaluate_parts(&Intent::new("get_time"), 0.7).is_accepted());
    }

    #[test]
    fn test_degenerate_distribution_is_still_gated() {
        let strict = ConfidenceGate::new(ThresholdTable {
            default: 1.0,
            ..ThresholdTable::default()
        });
        let dist = ConfidenceDistribution::new(vec![
            (Intent::new("get_time"), 1.0),
            (Intent::new("none"), 0.0),
        ]);
        let prediction = Prediction::from_distribution(dist).unwrap();

        assert_eq!(prediction.confidence, 1.0);
        assert!(strict.evaluate(&prediction).is_accepted());
    }

    #[test]
    fn test_prediction_without_evidence_is_unresolved() {
        let intents = [Intent::new("get_time"), Intent::new("shutdown")];
        let dist = ConfidenceDistribution::uniform(&intents);
        let prediction = Prediction::from_distribution(dist).unwrap();
        assert_eq!(prediction.confidence, 0.5);
        assert!(gate().evaluate(&prediction).is_accepted());

        let decision = gate().evaluate(&prediction.without_evidence());
        assert!(!decision.is_accepted());
        assert_eq!(decision.intent().as_str(), "get_time");
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let table = ThresholdTable::default().with_override("get_time", 1.5);
        assert!(matches!(
            table.validate(),
            Err(ConfigError::InvalidThreshold { .. })
        ));
        assert!(ThresholdTable::default().validate().is_ok());
    }
}
