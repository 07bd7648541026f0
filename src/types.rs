//! Core data structures shared by the classifier, gate and dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Label of the distinguished "no actionable command" intent
pub const NONE_INTENT: &str = "none";

/// Intent label drawn from the closed set present in the training corpus
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intent(String);

impl Intent {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn none() -> Self {
        Self(NONE_INTENT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the "no actionable command" intent (`none`, any ASCII case)
    pub fn is_none(&self) -> bool {
        self.0.eq_ignore_ascii_case(NONE_INTENT)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Intent {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Intent {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// Identifier of an action understood by an [`crate::actions::ActionSink`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Per-utterance probability over every trained intent
///
/// Entries are kept in the classifier's label order. Probabilities are
/// clamped to [0, 1] and renormalized to sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    entries: Vec<(Intent, f64)>,
}

impl ConfidenceDistribution {
    /// Build a distribution from raw scores. Negative or non-finite scores
    /// count as zero; an all-zero input becomes uniform.
    pub fn new(entries: Vec<(Intent, f64)>) -> Self {
        let mut entries: Vec<(Intent, f64)> = entries
            .into_iter()
            .map(|(intent, p)| (intent, if p.is_finite() { p.max(0.0) } else { 0.0 }))
            .collect();

        let total: f64 = entries.iter().map(|(_, p)| p).sum();
        if total > 0.0 {
            for (_, p) in &mut entries {
                *p = (*p / total).clamp(0.0, 1.0);
            }
        } else if !entries.is_empty() {
            let uniform = 1.0 / entries.len() as f64;
            for (_, p) in &mut entries {
                *p = uniform;
            }
        }

        Self { entries }
    }

    /// Uniform distribution over the given intents
    pub fn uniform(intents: &[Intent]) -> Self {
        Self::new(intents.iter().cloned().map(|i| (i, 1.0)).collect())
    }

    /// Most probable intent. Ties resolve to the earliest entry.
    pub fn top(&self) -> Option<(&Intent, f64)> {
        let mut best: Option<(&Intent, f64)> = None;
        for (intent, p) in &self.entries {
            match best {
                Some((_, bp)) if *p <= bp => {}
                _ => best = Some((intent, *p)),
            }
        }
        best
    }

    pub fn get(&self, intent: &Intent) -> Option<f64> {
        self.entries
            .iter()
            .find(|(i, _)| i == intent)
            .map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Intent, f64)> {
        self.entries.iter().map(|(i, p)| (i, *p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, p)| p).sum()
    }
}

/// Classifier output for one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub intent: Intent,
    /// Probability of `intent`, in [0, 1]
    pub confidence: f64,
    pub distribution: ConfidenceDistribution,
    /// False when the utterance had no known terms and the distribution
    /// is a uniform placeholder
    pub has_evidence: bool,
}

impl Prediction {
    /// Take the top entry of a distribution as the prediction.
    /// Returns `None` for an empty distribution.
    pub fn from_distribution(distribution: ConfidenceDistribution) -> Option<Self> {
        let (intent, confidence) = distribution.top().map(|(i, p)| (i.clone(), p))?;
        Some(Self {
            intent,
            confidence,
            distribution,
            has_evidence: true,
        })
    }

    /// Mark the prediction as carrying no information about the utterance
    pub fn without_evidence(mut self) -> Self {
        self.has_evidence = false;
        self
    }
}

/// Result of applying the confidence gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Accepted {
        intent: Intent,
        confidence: f64,
    },
    /// Below threshold; `best_guess` is diagnostic only
    Unresolved {
        best_guess: Intent,
        confidence: f64,
        threshold: f64,
    },
}

impl GateDecision {
    pub fn intent(&self) -> &Intent {
        match self {
            GateDecision::Accepted { intent, .. } => intent,
            GateDecision::Unresolved { best_guess, .. } => best_guess,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            GateDecision::Accepted { confidence, .. }
            | GateDecision::Unresolved { confidence, .. } => *confidence,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted { .. })
    }
}

/// A decided action call, handed to the action collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInvocation {
    pub action: ActionId,
    pub parameter: Option<String>,
}

/// Why a cycle ended without an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnrecognizedReason {
    /// Confidence fell below the gate threshold
    LowConfidence,
    /// The classifier picked the `none` intent
    NoneIntent,
    /// Accepted intent has no entry in the dispatch table
    NoAction,
}

/// Terminal state of the dispatcher for one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Act(ActionInvocation),
    ReportUnrecognized { reason: UnrecognizedReason },
    ReportMissingParameter { intent: Intent },
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Act(_) => OutcomeKind::Act,
            Outcome::ReportUnrecognized { .. } => OutcomeKind::ReportUnrecognized,
            Outcome::ReportMissingParameter { .. } => OutcomeKind::ReportMissingParameter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Act,
    ReportUnrecognized,
    ReportMissingParameter,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeKind::Act => "ACT",
            OutcomeKind::ReportUnrecognized => "REPORT_UNRECOGNIZED",
            OutcomeKind::ReportMissingParameter => "REPORT_MISSING_PARAMETER",
        };
        f.write_str(s)
    }
}

/// Unique identifier for one utterance-to-action cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(pub Uuid);

impl CycleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

/// Diagnostic record of one cycle, for the caller to log or display
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub id: CycleId,
    pub utterance: String,
    pub predicted: Intent,
    pub confidence: f64,
    pub accepted: bool,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
}

impl CycleReport {
    pub fn kind(&self) -> OutcomeKind {
        self.outcome.kind()
    }
}
