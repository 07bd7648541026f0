//! Error types for the intent pipeline
//!
//! Only configuration and programming mistakes are errors here. Per-utterance
//! ambiguity (low confidence, missing destination) is folded into
//! [`crate::types::Outcome`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the text classifier
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// `predict` was called before `train`
    #[error("classifier has not been trained")]
    NotTrained,

    /// Training data cannot produce a discriminating model
    #[error("insufficient training corpus: {reason}")]
    InsufficientCorpus { reason: String },

    /// Model file could not be read or written
    #[error("model file {path}: {source}")]
    ModelIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Model file contents are not a valid trained state
    #[error("model file {path} is malformed: {source}")]
    ModelFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ClassifierError {
    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientCorpus {
            reason: reason.into(),
        }
    }
}

/// Failures while loading or validating pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{table} references intent '{intent}' which is not in the training corpus")]
    UnknownIntent { table: &'static str, intent: String },

    #[error("threshold for '{bucket}' must be within [0, 1], got {value}")]
    InvalidThreshold { bucket: String, value: f64 },

    #[error("intent '{0}' appears more than once in the dispatch table")]
    DuplicateDispatch(String),

    #[error("anchor keyword must not be empty")]
    EmptyAnchor,
}

/// Entity extraction found no anchor in the utterance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no known destination in '{utterance}'")]
pub struct UnresolvedEntityError {
    pub utterance: String,
}

/// Failures reported by an action collaborator
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action '{0}' is not supported by this sink")]
    Unsupported(String),

    #[error("action '{0}' requires a parameter")]
    MissingParameter(String),

    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by [`crate::CommandPipeline`]
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
