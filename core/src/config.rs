//! Index schema and term-weighting configuration.
//!
//! Both are plain serde structs so binaries can read them from JSON and
//! snapshots can carry them. Validation happens once, when a
//! [`SearchIndex`](crate::SearchIndex) or an analyzer is built from them.

use crate::error::{RankError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Splits on anything that is not a letter or a digit.
pub const DEFAULT_TOKEN_PATTERN: &str = r"(?u)[\p{L}\p{N}]+";

/// Boost used for text fields without an explicit override.
pub const DEFAULT_BOOST: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopWords {
    #[default]
    None,
    English,
    List(Vec<String>),
}

/// Document-frequency threshold, either an absolute document count or a
/// fraction of the fitted corpus. In JSON: `{"count": 2}` or `{"ratio": 0.8}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocFreq {
    Count(usize),
    Ratio(f64),
}

impl DocFreq {
    fn validate(&self, name: &str) -> Result<()> {
        match *self {
            DocFreq::Count(_) => Ok(()),
            DocFreq::Ratio(r) if (0.0..=1.0).contains(&r) => Ok(()),
            DocFreq::Ratio(r) => Err(RankError::Config(format!("{name} ratio {r} outside [0, 1]"))),
        }
    }

    /// Resolve to an absolute document count against a corpus of `n_docs`.
    pub fn resolve(&self, n_docs: usize) -> usize {
        match *self {
            DocFreq::Count(c) => c,
            DocFreq::Ratio(r) => (r * n_docs as f64).floor() as usize,
        }
    }

    /// Like [`resolve`](Self::resolve), but a ratio rounds up so a lower
    /// bound never admits terms below the requested fraction.
    pub fn resolve_min(&self, n_docs: usize) -> usize {
        match *self {
            DocFreq::Count(c) => c,
            DocFreq::Ratio(r) => (r * n_docs as f64).ceil() as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdfMode {
    /// ln((1 + N) / (1 + df)) + 1: never below 1, so a term present in
    /// every document still matches.
    #[default]
    Smooth,
    /// ln(N / df): zero for a term present in every document.
    Standard,
    /// ln(1 + N / df)
    Smoothed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightingConfig {
    pub token_pattern: String,
    pub lowercase: bool,
    pub strip_accents: bool,
    pub stem: bool,
    pub stop_words: StopWords,
    pub ngram_range: (usize, usize),
    pub min_df: DocFreq,
    pub max_df: DocFreq,
    pub max_features: Option<usize>,
    pub sublinear_tf: bool,
    pub idf: IdfMode,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            token_pattern: DEFAULT_TOKEN_PATTERN.to_string(),
            lowercase: true,
            strip_accents: false,
            stem: false,
            stop_words: StopWords::None,
            ngram_range: (1, 1),
            min_df: DocFreq::Count(1),
            max_df: DocFreq::Ratio(1.0),
            max_features: None,
            sublinear_tf: false,
            idf: IdfMode::Smooth,
        }
    }
}

impl WeightingConfig {
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = self.ngram_range;
        if lo == 0 || lo > hi {
            return Err(RankError::Config(format!("invalid ngram_range ({lo}, {hi})")));
        }
        self.min_df.validate("min_df")?;
        self.max_df.validate("max_df")?;
        if self.max_features == Some(0) {
            return Err(RankError::Config("max_features must be positive".into()));
        }
        Ok(())
    }
}

/// Field classification, boosts and weighting options, fixed when an index is created.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSchema {
    pub text_fields: Vec<String>,
    pub keyword_fields: Vec<String>,
    pub boosts: BTreeMap<String, f32>,
    pub weighting: WeightingConfig,
}

impl IndexSchema {
    pub fn new<T, K>(text_fields: T, keyword_fields: K) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        Self {
            text_fields: text_fields.into_iter().map(Into::into).collect(),
            keyword_fields: keyword_fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_boost(mut self, field: impl Into<String>, boost: f32) -> Self {
        self.boosts.insert(field.into(), boost);
        self
    }

    pub fn with_weighting(mut self, weighting: WeightingConfig) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn boost(&self, field: &str) -> f32 {
        self.boosts.get(field).copied().unwrap_or(DEFAULT_BOOST)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for field in self.text_fields.iter().chain(self.keyword_fields.iter()) {
            if field.is_empty() {
                return Err(RankError::Config("field names must not be empty".into()));
            }
            if !seen.insert(field.as_str()) {
                return Err(RankError::Config(format!(
                    "field '{field}' listed more than once; text and keyword fields must be disjoint"
                )));
            }
        }
        for (field, boost) in &self.boosts {
            if !self.text_fields.contains(field) {
                return Err(RankError::Config(format!("boost given for '{field}', which is not a text field")));
            }
            if !boost.is_finite() || *boost <= 0.0 {
                return Err(RankError::Config(format!("boost for '{field}' must be positive, got {boost}")));
            }
        }
        self.weighting.validate()
    }
}

/// Parse a `field=factor` boost argument.
pub fn parse_boost(arg: &str) -> Result<(String, f32)> {
    let (field, factor) = arg
        .split_once('=')
        .ok_or_else(|| RankError::InvalidArgument(format!("expected field=factor, got '{arg}'")))?;
    let factor: f32 = factor
        .trim()
        .parse()
        .map_err(|_| RankError::InvalidArgument(format!("boost factor '{factor}' is not a number")))?;
    Ok((field.trim().to_string(), factor))
}
