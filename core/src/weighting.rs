//! Per-field TF-IDF model.
//!
//! `fit` learns a vocabulary and inverse document frequencies from one field
//! of the corpus and returns the field matrix; `transform` projects new text
//! (usually a query) onto the learned vocabulary. Terms are assigned columns
//! in lexicographic order so identical input always yields identical columns.

use crate::config::{IdfMode, WeightingConfig};
use crate::error::{RankError, Result};
use crate::matrix::CsrMatrix;
use crate::tokenizer::{Analyzer, AnalyzerConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Learned state: term → column and one idf weight per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub terms: BTreeMap<String, u32>,
    pub idf: Vec<f32>,
}

impl Vocabulary {
    pub fn len(&self) -> usize { self.idf.len() }
    pub fn is_empty(&self) -> bool { self.idf.is_empty() }

    fn check(&self) -> Result<()> {
        if self.terms.len() != self.idf.len() {
            return Err(RankError::CorruptSnapshot(format!(
                "vocabulary has {} terms but {} idf weights",
                self.terms.len(),
                self.idf.len()
            )));
        }
        let mut cols: Vec<u32> = self.terms.values().copied().collect();
        cols.sort_unstable();
        if cols.iter().enumerate().any(|(i, &c)| c as usize != i) {
            return Err(RankError::CorruptSnapshot("vocabulary columns are not a permutation".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    config: WeightingConfig,
    analyzer: Analyzer,
    vocabulary: Option<Vocabulary>,
}

impl TfidfVectorizer {
    pub fn new(config: WeightingConfig) -> Result<Self> {
        config.validate()?;
        let analyzer = Analyzer::new(AnalyzerConfig::from(&config))?;
        Ok(Self { config, analyzer, vocabulary: None })
    }

    pub fn config(&self) -> &WeightingConfig { &self.config }
    pub fn vocabulary(&self) -> Option<&Vocabulary> { self.vocabulary.as_ref() }
    pub fn is_fitted(&self) -> bool { self.vocabulary.is_some() }

    /// Learn vocabulary and idf from `texts`, replacing any earlier fit, and
    /// return the weighted document-term matrix (one row per text).
    pub fn fit<S: AsRef<str>>(&mut self, texts: &[S]) -> Result<CsrMatrix> {
        let n_docs = texts.len();
        let counts: Vec<HashMap<String, u32>> = texts.iter().map(|t| self.term_counts(t.as_ref())).collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        let mut total_tf: HashMap<&str, u64> = HashMap::new();
        for doc in &counts {
            for (term, &tf) in doc {
                *df.entry(term.as_str()).or_insert(0) += 1;
                *total_tf.entry(term.as_str()).or_insert(0) += tf as u64;
            }
        }

        let min_df = self.config.min_df.resolve_min(n_docs);
        let max_df = self.config.max_df.resolve(n_docs);
        if n_docs > 0 && max_df < min_df {
            return Err(RankError::Config(format!(
                "max_df admits {max_df} documents, fewer than min_df ({min_df})"
            )));
        }
        let mut kept: Vec<&str> = df
            .iter()
            .filter(|&(_, &d)| d >= min_df && d <= max_df)
            .map(|(&t, _)| t)
            .collect();
        if let Some(limit) = self.config.max_features {
            kept.sort_unstable_by(|a, b| total_tf[b].cmp(&total_tf[a]).then_with(|| a.cmp(b)));
            kept.truncate(limit);
        }
        kept.sort_unstable();

        let terms: BTreeMap<String, u32> = kept.iter().enumerate().map(|(col, &t)| (t.to_string(), col as u32)).collect();
        let idf: Vec<f32> = kept.iter().map(|t| idf_weight(self.config.idf, n_docs, df[t])).collect();
        let vocabulary = Vocabulary { terms, idf };
        let matrix = weigh(&vocabulary, self.config.sublinear_tf, &counts);

        tracing::debug!(n_docs, vocab = vocabulary.len(), pruned = df.len() - vocabulary.len(), "fitted tf-idf vocabulary");
        self.vocabulary = Some(vocabulary);
        Ok(matrix)
    }

    /// Weight `texts` against the fitted vocabulary. Unknown terms are ignored.
    pub fn transform<S: AsRef<str>>(&self, texts: &[S]) -> Result<CsrMatrix> {
        let vocabulary = self.vocabulary.as_ref().ok_or(RankError::NotInitialized("transform called before fit"))?;
        let counts: Vec<HashMap<String, u32>> = texts.iter().map(|t| self.term_counts(t.as_ref())).collect();
        Ok(weigh(vocabulary, self.config.sublinear_tf, &counts))
    }

    fn term_counts(&self, text: &str) -> HashMap<String, u32> {
        let mut counts = HashMap::new();
        for term in self.analyzer.analyze(text) {
            *counts.entry(term).or_insert(0) += 1;
        }
        counts
    }

    /// Check the fitted state against the field matrix it produced.
    pub(crate) fn check_matrix(&self, matrix: &CsrMatrix, n_docs: usize) -> Result<()> {
        let vocabulary = self
            .vocabulary
            .as_ref()
            .ok_or_else(|| RankError::CorruptSnapshot("field model was saved unfitted".into()))?;
        vocabulary.check()?;
        if matrix.n_cols() != vocabulary.len() {
            return Err(RankError::CorruptSnapshot(format!(
                "matrix has {} columns, vocabulary has {} terms",
                matrix.n_cols(),
                vocabulary.len()
            )));
        }
        matrix.check_shape(n_docs)
    }
}

fn idf_weight(mode: IdfMode, n_docs: usize, df: usize) -> f32 {
    let ratio = n_docs as f64 / df.max(1) as f64;
    match mode {
        IdfMode::Smooth => (((1 + n_docs) as f64 / (1 + df) as f64).ln() + 1.0) as f32,
        IdfMode::Standard => ratio.ln() as f32,
        IdfMode::Smoothed => (1.0 + ratio).ln() as f32,
    }
}

fn weigh(vocabulary: &Vocabulary, sublinear_tf: bool, counts: &[HashMap<String, u32>]) -> CsrMatrix {
    let mut matrix = CsrMatrix::new(vocabulary.len());
    for doc in counts {
        let mut row: Vec<(u32, f32)> = doc
            .iter()
            .filter_map(|(term, &tf)| {
                let col = *vocabulary.terms.get(term)?;
                let tf = if sublinear_tf { 1.0 + (tf as f32).ln() } else { tf as f32 };
                let w = tf * vocabulary.idf[col as usize];
                (w != 0.0).then_some((col, w))
            })
            .collect();
        row.sort_unstable_by_key(|&(col, _)| col);
        matrix.push_row(row);
    }
    matrix
}
