//! Voice Intent - from transcribed utterance to a single action decision.
//!
//! The pipeline takes text produced by a speech recognizer and decides what,
//! if anything, to do about it.
//!
//! # Architecture
//!
//! - **Text Classifier**: TF-IDF features + RBF-kernel SVM with calibrated
//!   probabilities over a closed set of intents
//! - **Confidence Gate**: per-intent acceptance thresholds
//! - **Entity Extractor**: priority-ordered keyword anchors → destination
//! - **Dispatcher**: accepted intent → act, or report why not
//!
//! Side effects live behind [`actions::ActionSink`]; the core only decides.
//!
//! # Usage
//!
//! ```rust,no_run
//! use voice_intent::{CommandPipeline, PipelineConfig, Outcome};
//!
//! let pipeline = CommandPipeline::new(PipelineConfig::default())?;
//! let report = pipeline.process("open youtube")?;
//!
//! if let Outcome::Act(invocation) = &report.outcome {
//!     println!("{} {:?}", invocation.action, invocation.parameter);
//! }
//! # Ok::<(), voice_intent::PipelineError>(())
//! ```

pub mod actions;
pub mod classifier;
pub mod config;
pub mod corpus;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod features;
pub mod gate;
pub mod svm;
pub mod types;

pub use actions::{ActionSink, RecordingSink, SystemActions};
pub use classifier::{ClassifierConfig, TextClassifier};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use corpus::TrainingCorpus;
pub use dispatcher::{DispatchEntry, DispatchTable, Dispatcher};
pub use entity::{Anchor, EntityExtractor};
pub use error::{
    ActionError, ClassifierError, ConfigError, PipelineError, Result, UnresolvedEntityError,
};
pub use gate::{ConfidenceGate, ThresholdTable};
pub use types::*;

use chrono::Utc;

/// Words that end an interactive session instead of being classified
pub const STOP_COMMANDS: &[&str] = &["stop", "quit", "exit"];

/// True if the utterance asks the listening loop to end
pub fn is_stop_command(utterance: &str) -> bool {
    let trimmed = utterance
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();
    STOP_COMMANDS.contains(&trimmed.as_str())
}

/// Classifier → gate → dispatcher, run once per utterance
pub struct CommandPipeline {
    classifier: TextClassifier,
    gate: ConfidenceGate,
    dispatcher: Dispatcher,
}

impl CommandPipeline {
    /// Validate the config and train a classifier on its corpus
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let mut classifier = TextClassifier::new(config.classifier.clone());
        classifier.train(&config.corpus)?;

        Self::with_classifier(config, classifier)
    }

    /// Use an already trained classifier, e.g. one loaded from disk.
    /// The config's corpus is not retrained.
    pub fn with_classifier(config: PipelineConfig, classifier: TextClassifier) -> Result<Self> {
        if !classifier.is_trained() {
            return Err(ClassifierError::NotTrained.into());
        }
        config.thresholds.validate()?;
        config.extractor().validate()?;
        let table = config.dispatch_table()?;

        for entry in table.entries() {
            if !classifier.intents().contains(&entry.intent) {
                log::warn!(
                    "Model cannot predict '{}'; dispatch entry '{}' is unreachable",
                    entry.intent,
                    entry.action
                );
            }
        }

        Ok(Self {
            classifier,
            gate: ConfidenceGate::new(config.thresholds.clone()),
            dispatcher: Dispatcher::new(table, config.extractor()),
        })
    }

    /// Run one cycle and return its report. Performs no side effects.
    pub fn process(&self, utterance: &str) -> Result<CycleReport> {
        let prediction = self.classifier.predict(utterance)?;
        let decision = self.gate.evaluate(&prediction);

        if decision.is_accepted() {
            log::info!("Intent '{}' (confidence {:.2})", prediction.intent, prediction.confidence);
        } else {
            log::info!(
                "Unsure. Best guess '{}' (confidence {:.2})",
                prediction.intent,
                prediction.confidence
            );
        }

        let outcome = self.dispatcher.dispatch(&decision, utterance);
        log::debug!("'{}' → {}", utterance, outcome.kind());

        Ok(CycleReport {
            id: CycleId::new(),
            utterance: utterance.to_string(),
            predicted: prediction.intent,
            confidence: prediction.confidence,
            accepted: decision.is_accepted(),
            outcome,
            timestamp: Utc::now(),
        })
    }

    /// Run one cycle and hand the outcome to `sink`
    pub fn handle(&self, utterance: &str, sink: &mut dyn ActionSink) -> Result<CycleReport> {
        let report = self.process(utterance)?;

        match &report.outcome {
            Outcome::Act(invocation) => sink.invoke(invocation)?,
            other => sink.report(other),
        }
        Ok(report)
    }

    pub fn classifier(&self) -> &TextClassifier {
        &self.classifier
    }

    pub fn gate(&self) -> &ConfidenceGate {
        &self.gate
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Get pipeline info
    pub fn info(&self) -> String {
        let thresholds = self.gate.thresholds();
        let intents: Vec<&str> = self.classifier.intents().iter().map(Intent::as_str).collect();

        format!(
            "Voice Intent Pipeline\n\
             Intents: {}\n\
             Training Examples: {}\n\
             Features: {}\n\
             Thresholds: {:.2} (actionable), {:.2} (none), {} overrides\n\
             Dispatch Entries: {}\n\
             Anchors: {}",
            intents.join(", "),
            self.classifier.num_examples(),
            self.classifier.num_features(),
            thresholds.default,
            thresholds.none,
            thresholds.overrides.len(),
            self.dispatcher.table().len(),
            self.dispatcher.extractor().anchors().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> CommandPipeline {
        CommandPipeline::new(PipelineConfig::default()).unwrap()
    }

    fn action_of(report: &CycleReport) -> Option<(&str, Option<&str>)> {
        match &report.outcome {
            Outcome::Act(inv) => Some((inv.action.as_str(), inv.parameter.as_deref())),
            _ => None,
        }
    }

    #[test]
    fn test_default_pipeline_acts() {
        let pipeline = pipeline();

        let report = pipeline.process("open notepad").unwrap();
        assert_eq!(action_of(&report), Some(("open_notepad", None)));

        let report = pipeline.process("what time is it").unwrap();
        assert_eq!(action_of(&report), Some(("report_time", None)));

        let report = pipeline.process("hello").unwrap();
        assert_eq!(action_of(&report), Some(("greet", None)));
    }

    #[test]
    fn test_default_pipeline_extracts_destination() {
        let report = pipeline().process("go to wikipedia").unwrap();
        assert_eq!(
            action_of(&report),
            Some(("open_destination", Some("https://wikipedia.org")))
        );
    }

    #[test]
    fn test_gibberish_is_unrecognized() {
        let report = pipeline().process("asdkjf qpwoe").unwrap();
        assert!(!report.accepted);
        assert_eq!(report.kind(), OutcomeKind::ReportUnrecognized);
    }

    #[test]
    fn test_handle_routes_to_sink() {
        let pipeline = pipeline();
        let mut sink = RecordingSink::default();

        pipeline.handle("shutdown the computer", &mut sink).unwrap();
        pipeline.handle("asdkjf qpwoe", &mut sink).unwrap();

        assert_eq!(sink.invocations.len(), 1);
        assert_eq!(sink.invocations[0].action.as_str(), "shutdown");
        assert_eq!(sink.reports.len(), 1);
    }

    #[test]
    fn test_handle_surfaces_sink_errors() {
        let pipeline = pipeline();
        let mut sink = SystemActions::default();

        let config = PipelineConfigBuilder::new()
            .dispatch(vec![DispatchEntry::new("greeting", "wave")])
            .build();
        let waving = CommandPipeline::new(config).unwrap();

        assert!(pipeline.handle("hello", &mut sink).is_ok());
        assert!(matches!(
            waving.handle("hello", &mut sink),
            Err(PipelineError::Action(ActionError::Unsupported(_)))
        ));
    }

    #[test]
    fn test_untrained_classifier_rejected() {
        let result =
            CommandPipeline::with_classifier(PipelineConfig::default(), TextClassifier::default());
        assert!(matches!(
            result,
            Err(PipelineError::Classifier(ClassifierError::NotTrained))
        ));
    }

    #[test]
    fn test_insufficient_corpus_rejected() {
        let config = PipelineConfigBuilder::new()
            .corpus(TrainingCorpus::new().with_intent("greeting", ["hello"]))
            .dispatch(vec![DispatchEntry::new("greeting", "greet")])
            .build();

        assert!(matches!(
            CommandPipeline::new(config),
            Err(PipelineError::Classifier(ClassifierError::InsufficientCorpus { .. }))
        ));
    }

    #[test]
    fn test_stop_commands() {
        assert!(is_stop_command("stop"));
        assert!(is_stop_command("  Quit. "));
        assert!(is_stop_command("EXIT!"));
        assert!(!is_stop_command("stop the music"));
    }

    #[test]
    fn test_info() {
        let info = pipeline().info();
        assert!(info.contains("open_website"));
        assert!(info.contains("Anchors: 3"));
    }
}
