//! TF-IDF feature extraction over word unigrams and bigrams.
//!
//! Tokens are runs of two or more word characters. Stop words are dropped
//! before n-grams are formed, so "what time is it" yields only `time`.
//! IDF is smoothed as `ln((1 + n) / (1 + df)) + 1` and every row is
//! L2-normalized.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

/// Sparse row: (feature index, weight), sorted by index
pub type SparseVector = Vec<(usize, f64)>;

/// Common English function words carrying no command meaning
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "might", "more", "most", "must", "my", "myself", "no", "nor", "not", "now", "of",
    "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "us", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?u)\b\w\w+\b").expect("static token pattern"))
}

fn stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| ENGLISH_STOP_WORDS.iter().copied().collect())
}

/// Feature extractor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Inclusive n-gram range
    pub ngram_range: (usize, usize),
    /// Keep only the most frequent terms; `None` keeps all
    pub max_features: Option<usize>,
    pub remove_stop_words: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            ngram_range: (1, 2),
            max_features: Some(1000),
            remove_stop_words: true,
        }
    }
}

/// Fitted TF-IDF vectorizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    config: FeatureConfig,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn vocabulary and IDF weights from already-normalized documents
    pub fn fit(config: FeatureConfig, documents: &[String]) -> Self {
        let analyzed: Vec<Vec<String>> = documents.iter().map(|d| analyze(&config, d)).collect();

        // corpus-wide term frequency, used to bound the vocabulary
        let mut term_counts: HashMap<&str, usize> = HashMap::new();
        for terms in &analyzed {
            for term in terms {
                *term_counts.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        if let Some(limit) = config.max_features {
            ranked.truncate(limit);
        }

        let mut kept: Vec<&str> = ranked.into_iter().map(|(t, _)| t).collect();
        kept.sort_unstable();
        let vocabulary: BTreeMap<String, usize> = kept
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();

        let mut df = vec![0usize; vocabulary.len()];
        for terms in &analyzed {
            let unique: HashSet<&str> = terms.iter().map(String::as_str).collect();
            for term in unique {
                if let Some(&idx) = vocabulary.get(term) {
                    df[idx] += 1;
                }
            }
        }

        let n = documents.len() as f64;
        let idf = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        Self {
            config,
            vocabulary,
            idf,
        }
    }

    /// Map a normalized document to its L2-normalized TF-IDF row.
    /// Out-of-vocabulary terms are ignored; an all-unknown document maps to
    /// the empty vector.
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in analyze(&self.config, document) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseVector = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut row {
                *v /= norm;
            }
        }
        row
    }

    pub fn transform_all(&self, documents: &[String]) -> Vec<SparseVector> {
        documents.iter().map(|d| self.transform(d)).collect()
    }

    pub fn num_features(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    /// Check that every vocabulary index has an IDF weight
    pub fn check(&self) -> Result<(), String> {
        if self.idf.len() != self.vocabulary.len() {
            return Err(format!(
                "{} idf weights for {} terms",
                self.idf.len(),
                self.vocabulary.len()
            ));
        }
        match self.vocabulary.iter().find(|(_, idx)| **idx >= self.idf.len()) {
            Some((term, idx)) => Err(format!("term '{}' has out-of-range index {}", term, idx)),
            None => Ok(()),
        }
    }
}

/// Tokenize, drop stop words and expand to the configured n-grams
fn analyze(config: &FeatureConfig, document: &str) -> Vec<String> {
    let tokens: Vec<&str> = token_pattern()
        .find_iter(document)
        .map(|m| m.as_str())
        .filter(|t| !config.remove_stop_words || !stop_words().contains(t))
        .collect();

    let (min_n, max_n) = config.ngram_range;
    let mut terms = Vec::new();
    for n in min_n.max(1)..=max_n {
        if n > tokens.len() {
            break;
        }
        for window in tokens.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}
