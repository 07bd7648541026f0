//! Text Classifier - utterance → (intent, confidence distribution)
//!
//! Wraps the TF-IDF vectorizer and the kernel SVM behind a train-once,
//! predict-many interface. Each `train` call replaces the previous fit.

use crate::corpus::{normalize, TrainingCorpus};
use crate::error::ClassifierError;
use crate::features::{FeatureConfig, TfidfVectorizer};
use crate::svm::{SvmClassifier, SvmConfig};
use crate::types::{ConfidenceDistribution, Intent, Prediction};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hyperparameters for feature extraction and the SVM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub features: FeatureConfig,
    pub svm: SvmConfig,
}

/// Everything produced by one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrainedState {
    labels: Vec<Intent>,
    vectorizer: TfidfVectorizer,
    model: SvmClassifier,
    num_examples: usize,
}

impl TrainedState {
    fn check(&self) -> Result<(), String> {
        if self.labels.len() != self.model.num_classes() {
            return Err(format!(
                "{} labels for {} classes",
                self.labels.len(),
                self.model.num_classes()
            ));
        }
        self.vectorizer.check()?;
        self.model.check()
    }
}

/// Trainable intent classifier
#[derive(Debug, Clone)]
pub struct TextClassifier {
    config: ClassifierConfig,
    state: Option<TrainedState>,
}

impl TextClassifier {
    /// Create an untrained classifier
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Fit on a corpus, replacing any previous fit.
    ///
    /// On error the classifier keeps whatever state it had before.
    pub fn train(&mut self, corpus: &TrainingCorpus) -> Result<(), ClassifierError> {
        corpus.validate()?;

        let (sentences, labels) = corpus.flatten();
        let classes: Vec<Intent> = corpus.intents().cloned().collect();
        log::info!(
            "Training on {} examples across {} intents",
            sentences.len(),
            classes.len()
        );

        let vectorizer = TfidfVectorizer::fit(self.config.features.clone(), &sentences);
        if vectorizer.num_features() == 0 {
            return Err(ClassifierError::insufficient(
                "no usable features after stop-word removal",
            ));
        }

        let rows = vectorizer.transform_all(&sentences);
        let label_ids: Vec<usize> = labels
            .iter()
            .map(|l| classes.iter().position(|c| c == l).unwrap_or_default())
            .collect();

        let model = SvmClassifier::fit(
            &self.config.svm,
            &rows,
            &label_ids,
            classes.len(),
            vectorizer.num_features(),
        );

        log::info!(
            "Classifier trained: {} features, {} support vectors, gamma {:.4}",
            vectorizer.num_features(),
            model.num_support_vectors(),
            model.gamma()
        );

        self.state = Some(TrainedState {
            labels: classes,
            vectorizer,
            model,
            num_examples: sentences.len(),
        });
        Ok(())
    }

    /// Predict the intent of an utterance.
    ///
    /// Input goes through the same normalization as training phrases. An
    /// utterance with no in-vocabulary terms gets a uniform distribution and
    /// is marked as having no evidence.
    pub fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        let state = self.state.as_ref().ok_or(ClassifierError::NotTrained)?;

        let normalized = normalize(text);
        let row = state.vectorizer.transform(&normalized);

        if row.is_empty() {
            log::debug!("No known terms in '{}'", normalized);
            let uniform = ConfidenceDistribution::uniform(&state.labels);
            return Prediction::from_distribution(uniform)
                .map(Prediction::without_evidence)
                .ok_or(ClassifierError::NotTrained);
        }

        let proba = state.model.predict_proba(&row);
        let distribution =
            ConfidenceDistribution::new(state.labels.iter().cloned().zip(proba).collect());
        Prediction::from_distribution(distribution).ok_or(ClassifierError::NotTrained)
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    /// Trained intents in label order; empty before training
    pub fn intents(&self) -> &[Intent] {
        self.state.as_ref().map(|s| s.labels.as_slice()).unwrap_or(&[])
    }

    pub fn num_features(&self) -> usize {
        self.state
            .as_ref()
            .map(|s| s.vectorizer.num_features())
            .unwrap_or(0)
    }

    pub fn num_examples(&self) -> usize {
        self.state.as_ref().map(|s| s.num_examples).unwrap_or(0)
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Write the trained state as JSON
    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        let state = self.state.as_ref().ok_or(ClassifierError::NotTrained)?;
        let file = SavedModel {
            config: self.config.clone(),
            state: state.clone(),
        };
        let json = serde_json::to_string(&file).map_err(|source| ClassifierError::ModelFormat {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ClassifierError::ModelIo {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("Saved model to {}", path.display());
        Ok(())
    }

    /// Load a classifier previously written by [`TextClassifier::save`]
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let text = std::fs::read_to_string(path).map_err(|source| ClassifierError::ModelIo {
            path: path.to_path_buf(),
            source,
        })?;
        let file: SavedModel =
            serde_json::from_str(&text).map_err(|source| ClassifierError::ModelFormat {
                path: path.to_path_buf(),
                source,
            })?;
        file.state
            .check()
            .map_err(|reason| ClassifierError::ModelFormat {
                path: path.to_path_buf(),
                source: <serde_json::Error as serde::de::Error>::custom(reason),
            })?;

        log::info!(
            "Loaded model from {} ({} intents)",
            path.display(),
            file.state.labels.len()
        );
        Ok(Self {
            config: file.config,
            state: Some(file.state),
        })
    }
}

impl Default for TextClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

#[derive(Serialize, Deserialize)]
struct SavedModel {
    config: ClassifierConfig,
    state: TrainedState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_corpus() -> TrainingCorpus {
        TrainingCorpus::new()
            .with_intent("open_notepad", ["open notepad", "launch notepad"])
            .with_intent("get_time", ["what time is it", "tell me the time"])
            .with_intent("none", ["hello there", "random text"])
    }

    fn trained() -> TextClassifier {
        let mut classifier = TextClassifier::default();
        classifier.train(&small_corpus()).unwrap();
        classifier
    }

    #[test]
    fn test_predict_before_train_fails() {
        let classifier = TextClassifier::default();
        let err = classifier.predict("open notepad").unwrap_err();
        assert!(matches!(err, ClassifierError::NotTrained));
    }

    #[test]
    fn test_train_rejects_single_intent() {
        let mut classifier = TextClassifier::default();
        let corpus = TrainingCorpus::new().with_intent("greeting", ["hello", "hi"]);

        assert!(matches!(
            classifier.train(&corpus),
            Err(ClassifierError::InsufficientCorpus { .. })
        ));
        assert!(!classifier.is_trained());
    }

    #[test]
    fn test_train_rejects_stop_word_only_corpus() {
        let mut classifier = TextClassifier::default();
        let corpus = TrainingCorpus::new()
            .with_intent("a", ["what is it"])
            .with_intent("b", ["it is the"]);

        assert!(classifier.train(&corpus).is_err());
    }

    #[test]
    fn test_predicts_training_phrases() {
        let classifier = trained();

        assert_eq!(classifier.predict("open notepad").unwrap().intent.as_str(), "open_notepad");
        assert_eq!(classifier.predict("tell me the time").unwrap().intent.as_str(), "get_time");
        assert_eq!(classifier.predict("random text").unwrap().intent.as_str(), "none");
    }

    #[test]
    fn test_prediction_is_case_insensitive() {
        let classifier = trained();

        let lower = classifier.predict("launch notepad").unwrap();
        let upper = classifier.predict("LAUNCH NOTEPAD").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_distribution_is_normalized() {
        let classifier = trained();

        for text in ["open notepad", "what time is it", "something else entirely", ""] {
            let prediction = classifier.predict(text).unwrap();
            assert!((0.0..=1.0).contains(&prediction.confidence));
            assert!((prediction.distribution.total() - 1.0).abs() < 1e-9);
            assert_eq!(prediction.distribution.len(), 3);
        }
    }

    #[test]
    fn test_unknown_words_are_uniform() {
        let classifier = trained();
        let prediction = classifier.predict("asdkjf qpwoe").unwrap();

        assert!((prediction.confidence - 1.0 / 3.0).abs() < 1e-9);
        assert!(!prediction.has_evidence);
        assert!(classifier.predict("open notepad").unwrap().has_evidence);
    }

    #[test]
    fn test_retrain_replaces_fit() {
        let mut classifier = trained();
        let corpus = TrainingCorpus::new()
            .with_intent("greeting", ["hello", "good morning"])
            .with_intent("shutdown_computer", ["shut down the computer", "power off"]);
        classifier.train(&corpus).unwrap();

        assert_eq!(classifier.intents().len(), 2);
        assert!(!classifier.intents().contains(&Intent::new("open_notepad")));
    }

    #[test]
    fn test_save_and_load() {
        let classifier = trained();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        classifier.save(&path).unwrap();
        let loaded = TextClassifier::load(&path).unwrap();

        let before = classifier.predict("please open notepad now").unwrap();
        let after = loaded.predict("please open notepad now").unwrap();
        assert_eq!(before.intent, after.intent);
        assert!((before.confidence - after.confidence).abs() < 1e-9);
    }

    fn load_tampered(edit: impl FnOnce(&mut serde_json::Value)) -> ClassifierError {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        trained().save(&path).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        edit(&mut value);
        std::fs::write(&path, value.to_string()).unwrap();

        TextClassifier::load(&path).unwrap_err()
    }

    #[test]
    fn test_load_rejects_short_idf() {
        let err = load_tampered(|value| {
            value["state"]["vectorizer"]["idf"].as_array_mut().unwrap().pop();
        });
        assert!(matches!(err, ClassifierError::ModelFormat { .. }));
    }

    #[test]
    fn test_load_rejects_bad_support_index() {
        let err = load_tampered(|value| {
            value["state"]["model"]["machines"][0]["coefficients"][0][0] = serde_json::json!(999);
        });
        assert!(matches!(err, ClassifierError::ModelFormat { .. }));
    }

    #[test]
    fn test_load_rejects_label_mismatch() {
        let err = load_tampered(|value| {
            value["state"]["labels"].as_array_mut().unwrap().pop();
        });
        assert!(matches!(err, ClassifierError::ModelFormat { .. }));
    }

    #[test]
    fn test_save_untrained_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = TextClassifier::default()
            .save(&dir.path().join("model.json"))
            .unwrap_err();
        assert!(matches!(err, ClassifierError::NotTrained));
    }
}
