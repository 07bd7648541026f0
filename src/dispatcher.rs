//! Dispatcher - gate decision + utterance → one outcome.
//!
//! ```text
//! Unresolved ───────────────────────────────► ReportUnrecognized(LowConfidence)
//! Accepted(none) ───────────────────────────► ReportUnrecognized(NoneIntent)
//! Accepted(no table entry) ─────────────────► ReportUnrecognized(NoAction)
//! Accepted(entry, no parameter) ────────────► Act(action)
//! Accepted(entry, parameter) ─ extract ─ ok ► Act(action, destination)
//!                                      └ err ► ReportMissingParameter
//! ```

use crate::corpus::TrainingCorpus;
use crate::entity::EntityExtractor;
use crate::error::ConfigError;
use crate::types::{ActionId, ActionInvocation, GateDecision, Intent, Outcome, UnrecognizedReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to do for one accepted intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEntry {
    pub intent: Intent,
    pub action: ActionId,
    /// Run entity extraction and pass the destination to the action
    #[serde(default)]
    pub requires_parameter: bool,
}

impl DispatchEntry {
    pub fn new(intent: impl Into<Intent>, action: impl Into<ActionId>) -> Self {
        Self {
            intent: intent.into(),
            action: action.into(),
            requires_parameter: false,
        }
    }

    pub fn with_parameter(mut self) -> Self {
        self.requires_parameter = true;
        self
    }
}

/// Static intent → action mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable {
    entries: BTreeMap<Intent, DispatchEntry>,
}

impl DispatchTable {
    /// Build from entries; an intent may appear only once
    pub fn from_entries(entries: Vec<DispatchEntry>) -> Result<Self, ConfigError> {
        let mut table = BTreeMap::new();
        for entry in entries {
            if table.contains_key(&entry.intent) {
                return Err(ConfigError::DuplicateDispatch(entry.intent.to_string()));
            }
            table.insert(entry.intent.clone(), entry);
        }
        Ok(Self { entries: table })
    }

    pub fn get(&self, intent: &Intent) -> Option<&DispatchEntry> {
        self.entries.get(intent)
    }

    pub fn entries(&self) -> impl Iterator<Item = &DispatchEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every actionable intent must be one the classifier can produce
    pub fn validate_against(&self, corpus: &TrainingCorpus) -> Result<(), ConfigError> {
        match self.entries.keys().find(|intent| !corpus.contains(intent)) {
            Some(intent) => Err(ConfigError::UnknownIntent {
                table: "dispatch table",
                intent: intent.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        let entries = vec![
            DispatchEntry::new("open_notepad", "open_notepad"),
            DispatchEntry::new("get_time", "report_time"),
            DispatchEntry::new("shutdown_computer", "shutdown"),
            DispatchEntry::new("open_website", "open_destination").with_parameter(),
            DispatchEntry::new("greeting", "greet"),
        ];
        Self {
            entries: entries.into_iter().map(|e| (e.intent.clone(), e)).collect(),
        }
    }
}

/// Maps gate decisions to outcomes
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    table: DispatchTable,
    extractor: EntityExtractor,
}

impl Dispatcher {
    pub fn new(table: DispatchTable, extractor: EntityExtractor) -> Self {
        Self { table, extractor }
    }

    pub fn dispatch(&self, decision: &GateDecision, utterance: &str) -> Outcome {
        let intent = match decision {
            GateDecision::Unresolved { .. } => {
                return Outcome::ReportUnrecognized {
                    reason: UnrecognizedReason::LowConfidence,
                };
            }
            GateDecision::Accepted { intent, .. } => intent,
        };
        self.dispatch_intent(intent, utterance)
    }

    /// Dispatch an already accepted intent
    pub fn dispatch_intent(&self, intent: &Intent, utterance: &str) -> Outcome {
        if intent.is_none() {
            return Outcome::ReportUnrecognized {
                reason: UnrecognizedReason::NoneIntent,
            };
        }

        let entry = match self.table.get(intent) {
            Some(entry) => entry,
            None => {
                log::warn!("Intent '{}' recognized, but no action is defined for it", intent);
                return Outcome::ReportUnrecognized {
                    reason: UnrecognizedReason::NoAction,
                };
            }
        };

        if !entry.requires_parameter {
            return Outcome::Act(ActionInvocation {
                action: entry.action.clone(),
                parameter: None,
            });
        }

        match self.extractor.extract(utterance) {
            Ok(destination) => Outcome::Act(ActionInvocation {
                action: entry.action.clone(),
                parameter: Some(destination.to_string()),
            }),
            Err(e) => {
                log::warn!("Intent '{}' needs a destination: {}", intent, e);
                Outcome::ReportMissingParameter {
                    intent: intent.clone(),
                }
            }
        }
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn extractor(&self) -> &EntityExtractor {
        &self.extractor
    }
}
