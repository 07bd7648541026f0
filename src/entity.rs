//! Entity Extractor - resolve a destination from keyword anchors.
//!
//! Anchors are tested in priority order against the lowercased original
//! utterance; the first anchor whose keyword occurs wins, wherever it
//! appears in the text. "open youtube or google" resolves to youtube as long
//! as the youtube anchor is listed first.

use crate::error::{ConfigError, UnresolvedEntityError};
use serde::{Deserialize, Serialize};

/// Keyword that, when present in an utterance, resolves to `destination`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub keyword: String,
    pub destination: String,
}

impl Anchor {
    pub fn new(keyword: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            destination: destination.into(),
        }
    }
}

/// Priority-ordered anchor table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityExtractor {
    anchors: Vec<Anchor>,
}

impl EntityExtractor {
    /// Anchors keep the given order, which is their priority
    pub fn new(anchors: Vec<Anchor>) -> Self {
        let anchors = anchors
            .into_iter()
            .map(|a| Anchor {
                keyword: a.keyword.to_lowercase(),
                destination: a.destination,
            })
            .collect();
        Self { anchors }
    }

    /// Resolve the destination for an utterance
    pub fn extract(&self, utterance: &str) -> Result<&str, UnresolvedEntityError> {
        let haystack = utterance.to_lowercase();

        self.anchors
            .iter()
            .find(|anchor| haystack.contains(&anchor.keyword))
            .map(|anchor| {
                log::debug!("Anchor '{}' → {}", anchor.keyword, anchor.destination);
                anchor.destination.as_str()
            })
            .ok_or_else(|| UnresolvedEntityError {
                utterance: utterance.to_string(),
            })
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.anchors.iter().any(|a| a.keyword.trim().is_empty()) {
            return Err(ConfigError::EmptyAnchor);
        }
        Ok(())
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new(vec![
            Anchor::new("youtube", "https://youtube.com"),
            Anchor::new("google", "https://google.com"),
            Anchor::new("wikipedia", "https://wikipedia.org"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_single_anchor() {
        let extractor = EntityExtractor::default();
        assert_eq!(extractor.extract("open google please"), Ok("https://google.com"));
    }

    #[test]
    fn test_priority_order_beats_text_order() {
        let extractor = EntityExtractor::default();

        assert_eq!(extractor.extract("open youtube or google"), Ok("https://youtube.com"));
        assert_eq!(extractor.extract("open google or youtube"), Ok("https://youtube.com"));
    }

    #[test]
    fn test_reordered_table_changes_winner() {
        let extractor = EntityExtractor::new(vec![
            Anchor::new("google", "https://google.com"),
            Anchor::new("youtube", "https://youtube.com"),
        ]);
        assert_eq!(extractor.extract("open youtube or google"), Ok("https://google.com"));
    }

    #[test]
    fn test_matching_ignores_case() {
        let extractor =
            EntityExtractor::new(vec![Anchor::new("Wikipedia", "https://wikipedia.org")]);
        assert_eq!(extractor.extract("Go to WIKIPEDIA"), Ok("https://wikipedia.org"));
    }

    #[test]
    fn test_no_anchor_is_unresolved() {
        let err = EntityExtractor::default().extract("open a website").unwrap_err();
        assert_eq!(err.utterance, "open a website");
    }

    #[test]
    fn test_empty_keyword_is_invalid() {
        let extractor = EntityExtractor::new(vec![Anchor::new(" ", "https://example.com")]);
        assert!(matches!(extractor.validate(), Err(ConfigError::EmptyAnchor)));
    }
}
