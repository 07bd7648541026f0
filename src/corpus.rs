//! Training corpus: intent label → example phrases.

use crate::error::ClassifierError;
use crate::types::Intent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalization applied to phrases at training time and to utterances at
/// prediction time. Both sides must go through this one function.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
}

/// Immutable mapping from intent to its example phrases
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Intent, Vec<String>>", into = "BTreeMap<Intent, Vec<String>>")]
pub struct TrainingCorpus {
    intents: BTreeMap<Intent, Vec<String>>,
}

impl TrainingCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. Phrases are normalized and de-duplicated while
    /// keeping their first-seen order.
    pub fn with_intent<I, S>(mut self, intent: impl Into<Intent>, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.insert(intent, phrases);
        self
    }

    pub fn insert<I, S>(&mut self, intent: impl Into<Intent>, phrases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.intents.entry(intent.into()).or_default();
        for phrase in phrases {
            let phrase = normalize(phrase.as_ref());
            if !entry.contains(&phrase) {
                entry.push(phrase);
            }
        }
    }

    /// Check the corpus can train a discriminating classifier
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.intents.is_empty() {
            return Err(ClassifierError::insufficient("corpus is empty"));
        }

        if let Some((intent, _)) = self
            .intents
            .iter()
            .find(|(_, phrases)| phrases.iter().all(|p| p.trim().is_empty()))
        {
            return Err(ClassifierError::insufficient(format!(
                "intent '{}' has no example phrases",
                intent
            )));
        }

        if self.intents.len() < 2 {
            return Err(ClassifierError::insufficient(format!(
                "need at least two distinct intents, found {}",
                self.intents.len()
            )));
        }

        Ok(())
    }

    /// Flatten into parallel (phrase, intent) sequences
    pub fn flatten(&self) -> (Vec<String>, Vec<Intent>) {
        let mut sentences = Vec::with_capacity(self.num_examples());
        let mut labels = Vec::with_capacity(self.num_examples());

        for (intent, phrases) in &self.intents {
            for phrase in phrases.iter().filter(|p| !p.trim().is_empty()) {
                sentences.push(phrase.clone());
                labels.push(intent.clone());
            }
        }

        (sentences, labels)
    }

    /// Intents in label order
    pub fn intents(&self) -> impl Iterator<Item = &Intent> {
        self.intents.keys()
    }

    pub fn phrases(&self, intent: &Intent) -> Option<&[String]> {
        self.intents.get(intent).map(Vec::as_slice)
    }

    pub fn contains(&self, intent: &Intent) -> bool {
        self.intents.contains_key(intent)
    }

    pub fn num_intents(&self) -> usize {
        self.intents.len()
    }

    pub fn num_examples(&self) -> usize {
        self.intents.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

impl From<BTreeMap<Intent, Vec<String>>> for TrainingCorpus {
    fn from(raw: BTreeMap<Intent, Vec<String>>) -> Self {
        raw.into_iter().collect()
    }
}

impl From<TrainingCorpus> for BTreeMap<Intent, Vec<String>> {
    fn from(corpus: TrainingCorpus) -> Self {
        corpus.intents
    }
}

impl<K, S> FromIterator<(K, Vec<S>)> for TrainingCorpus
where
    K: Into<Intent>,
    S: AsRef<str>,
{
    fn from_iter<T: IntoIterator<Item = (K, Vec<S>)>>(iter: T) -> Self {
        let mut corpus = TrainingCorpus::new();
        for (intent, phrases) in iter {
            corpus.insert(intent, phrases);
        }
        corpus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TrainingCorpus {
        TrainingCorpus::new()
            .with_intent("open_notepad", ["Open Notepad", "launch notepad", "open notepad"])
            .with_intent("get_time", ["what time is it"])
    }

    #[test]
    fn test_phrases_are_normalized_and_deduplicated() {
        let corpus = sample();
        let phrases = corpus.phrases(&Intent::new("open_notepad")).unwrap();

        assert_eq!(phrases, ["open notepad", "launch notepad"]);
        assert_eq!(corpus.num_examples(), 3);
    }

    #[test]
    fn test_flatten_is_parallel() {
        let (sentences, labels) = sample().flatten();

        assert_eq!(sentences.len(), labels.len());
        assert_eq!(sentences[0], "what time is it");
        assert_eq!(labels[0], Intent::new("get_time"));
    }

    #[test]
    fn test_validate_rejects_empty_corpus() {
        let err = TrainingCorpus::new().validate().unwrap_err();
        assert!(matches!(err, ClassifierError::InsufficientCorpus { .. }));
    }

    #[test]
    fn test_validate_rejects_single_intent() {
        let corpus = TrainingCorpus::new().with_intent("greeting", ["hello", "hi there"]);
        assert!(corpus.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_intent_without_examples() {
        let corpus = sample().with_intent("shutdown_computer", Vec::<String>::new());
        let err = corpus.validate().unwrap_err();
        assert!(err.to_string().contains("shutdown_computer"));
    }

    #[test]
    fn test_deserialize_from_toml() {
        let corpus: TrainingCorpus = toml::from_str(
            r#"
            greeting = ["Hello", "hi"]
            none = ["random text"]
            "#,
        )
        .unwrap();

        assert_eq!(corpus.num_intents(), 2);
        assert!(corpus.contains(&Intent::none()));
        assert_eq!(corpus.phrases(&Intent::new("greeting")).unwrap(), ["hello", "hi"]);
    }
}
