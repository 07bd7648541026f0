//! Pipeline configuration: corpus, thresholds, dispatch table and anchors.

use crate::classifier::ClassifierConfig;
use crate::corpus::TrainingCorpus;
use crate::dispatcher::{DispatchEntry, DispatchTable};
use crate::entity::{Anchor, EntityExtractor};
use crate::error::ConfigError;
use crate::gate::ThresholdTable;
use crate::types::Intent;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything needed to build a [`crate::CommandPipeline`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub classifier: ClassifierConfig,
    pub thresholds: ThresholdTable,
    pub corpus: TrainingCorpus,
    pub dispatch: Vec<DispatchEntry>,
    /// Entity anchors in priority order
    pub anchors: Vec<Anchor>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            thresholds: ThresholdTable::default(),
            corpus: default_corpus(),
            dispatch: DispatchTable::default().entries().cloned().collect(),
            anchors: EntityExtractor::default().anchors().to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading config from: {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Cross-check the tables against the corpus.
    ///
    /// Corpus sufficiency is left to training, which reports it as
    /// `InsufficientCorpus`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;

        if let Some(intent) = self
            .thresholds
            .overrides
            .keys()
            .find(|intent| !self.corpus.contains(intent))
        {
            return Err(ConfigError::UnknownIntent {
                table: "threshold overrides",
                intent: intent.to_string(),
            });
        }

        self.dispatch_table()?.validate_against(&self.corpus)?;
        self.extractor().validate()
    }

    pub fn dispatch_table(&self) -> Result<DispatchTable, ConfigError> {
        DispatchTable::from_entries(self.dispatch.clone())
    }

    pub fn extractor(&self) -> EntityExtractor {
        EntityExtractor::new(self.anchors.clone())
    }
}

fn default_corpus() -> TrainingCorpus {
    TrainingCorpus::new()
        .with_intent(
            "open_notepad",
            [
                "open notepad",
                "launch notepad",
                "start notepad",
                "open the text editor",
                "run notepad",
                "notepad please",
                "i want to write a note",
                "open a text editor",
            ],
        )
        .with_intent(
            "get_time",
            [
                "what time is it",
                "tell me the time",
                "what is the time",
                "current time",
                "what's the time now",
                "do you know the time",
                "check the clock",
                "time please",
            ],
        )
        .with_intent(
            "shutdown_computer",
            [
                "shutdown the computer",
                "shut down the computer",
                "turn off the computer",
                "power off",
                "shut down my pc",
                "turn off my machine",
                "switch off the computer",
                "shutdown",
            ],
        )
        .with_intent(
            "open_website",
            [
                "open youtube",
                "open google",
                "open wikipedia",
                "go to youtube",
                "go to google",
                "go to wikipedia",
                "open a website",
                "browse the web",
                "search on google",
                "play something on youtube",
            ],
        )
        .with_intent(
            "greeting",
            [
                "hello",
                "hi",
                "hey there",
                "good morning",
                "good evening",
                "hello assistant",
                "hi there",
                "greetings",
            ],
        )
        .with_intent(
            Intent::none(),
            [
                "i like pizza",
                "the weather is nice",
                "random text",
                "tell me a joke",
                "how are you feeling",
                "blue sky",
                "what is your name",
                "nothing",
            ],
        )
}

/// Builder for PipelineConfig
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.config.classifier = classifier;
        self
    }

    pub fn default_threshold(mut self, threshold: f64) -> Self {
        self.config.thresholds.default = threshold;
        self
    }

    pub fn none_threshold(mut self, threshold: f64) -> Self {
        self.config.thresholds.none = threshold;
        self
    }

    pub fn threshold_override(mut self, intent: impl Into<Intent>, threshold: f64) -> Self {
        self.config.thresholds.overrides.insert(intent.into(), threshold);
        self
    }

    /// Replace the corpus. The dispatch table is left alone, so set it too
    /// when the new corpus drops any of its intents.
    pub fn corpus(mut self, corpus: TrainingCorpus) -> Self {
        self.config.corpus = corpus;
        self
    }

    pub fn dispatch(mut self, entries: Vec<DispatchEntry>) -> Self {
        self.config.dispatch = entries;
        self
    }

    pub fn dispatch_entry(mut self, entry: DispatchEntry) -> Self {
        self.config.dispatch.push(entry);
        self
    }

    pub fn anchors(mut self, anchors: Vec<Anchor>) -> Self {
        self.config.anchors = anchors;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
