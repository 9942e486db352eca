//! Bag-of-n-grams vectorization.
//!
//! Vectorizing is column-wide: a [`Vectorizer`] first observes every batch of
//! its input column, then [`Vectorizer::finalize`] fixes the vocabulary and
//! the resulting [`FittedVectorizer`] transforms batch by batch.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::store::Cell;

pub const DEFAULT_MAX_FEATURES: usize = 1000;
pub const DEFAULT_NGRAM_RANGE: (usize, usize) = (1, 1);

/// Weighting applied to term counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorizeMethod {
    Tfidf,
    Count,
}

impl VectorizeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tfidf => "tfidf",
            Self::Count => "count",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "tfidf" => Some(Self::Tfidf),
            "count" => Some(Self::Count),
            _ => None,
        }
    }
}

/// Checked vectorizer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizeParams {
    pub method: VectorizeMethod,
    pub max_features: usize,
    pub ngram_range: (usize, usize),
    pub lowercase: bool,
}

impl VectorizeParams {
    pub fn new(method: VectorizeMethod) -> Self {
        Self {
            method,
            max_features: DEFAULT_MAX_FEATURES,
            ngram_range: DEFAULT_NGRAM_RANGE,
            lowercase: true,
        }
    }

    /// Terms of one document: every n-gram in the configured range, space-joined.
    fn terms(&self, tokens: &[String]) -> Vec<String> {
        let tokens: Vec<String> = if self.lowercase {
            tokens.iter().map(|t| t.to_lowercase()).collect()
        } else {
            tokens.to_vec()
        };

        let (min_n, max_n) = self.ngram_range;
        let mut terms = Vec::new();
        for n in min_n.max(1)..=max_n.min(tokens.len()) {
            terms.extend(tokens.windows(n).map(|gram| gram.join(" ")));
        }
        terms
    }
}

/// Fit-pass accumulator.
#[derive(Debug)]
pub struct Vectorizer {
    params: VectorizeParams,
    term_counts: HashMap<String, usize>,
    doc_freq: HashMap<String, usize>,
    documents: usize,
}

impl Vectorizer {
    pub fn new(params: VectorizeParams) -> Self {
        Self {
            params,
            term_counts: HashMap::new(),
            doc_freq: HashMap::new(),
            documents: 0,
        }
    }

    /// Accumulate statistics from one batch. Rows carrying an error marker are skipped.
    pub fn observe(&mut self, batch: &[Cell<Vec<String>>]) {
        for tokens in batch.iter().filter_map(|cell| cell.as_ref().ok()) {
            self.documents += 1;
            let mut seen = HashSet::new();
            for term in self.params.terms(tokens) {
                *self.term_counts.entry(term.clone()).or_insert(0) += 1;
                seen.insert(term);
            }
            for term in seen {
                *self.doc_freq.entry(term).or_insert(0) += 1;
            }
        }
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Fix the vocabulary: the `max_features` most frequent terms (ties broken by
    /// term), sorted lexicographically. Returns None when no terms were seen.
    pub fn finalize(self) -> Option<FittedVectorizer> {
        if self.term_counts.is_empty() {
            return None;
        }

        let mut ranked: Vec<(String, usize)> = self.term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.params.max_features);

        let mut vocabulary: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        vocabulary.sort();

        let n = self.documents as f64;
        let idf = vocabulary
            .iter()
            .map(|term| {
                let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let index = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        Some(FittedVectorizer {
            params: self.params,
            vocabulary,
            index,
            idf,
        })
    }
}

/// A vectorizer with a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct FittedVectorizer {
    params: VectorizeParams,
    vocabulary: Vec<String>,
    index: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl FittedVectorizer {
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    fn vector(&self, tokens: &[String]) -> Vec<f64> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        for term in self.params.terms(tokens) {
            if let Some(&i) = self.index.get(&term) {
                vector[i] += 1.0;
            }
        }

        if self.params.method == VectorizeMethod::Tfidf {
            for (value, idf) in vector.iter_mut().zip(&self.idf) {
                *value *= idf;
            }
            let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for value in &mut vector {
                    *value /= norm;
                }
            }
        }
        vector
    }

    /// Transform one batch. Error markers are carried forward unchanged.
    pub fn transform(&self, batch: &[Cell<Vec<String>>]) -> Vec<Cell<Vec<f64>>> {
        batch
            .iter()
            .map(|cell| match cell {
                Ok(tokens) => Ok(self.vector(tokens)),
                Err(e) => Err(e.clone()),
            })
            .collect()
    }
}
