use crate::config::IndexSchema;
use crate::error::{RankError, Result};
use crate::keyword::{FilterMask, KeywordTable};
use crate::matrix::CsrMatrix;
use crate::persist;
use crate::weighting::TfidfVectorizer;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

/// One ingested document: field name → value.
pub type Document = BTreeMap<String, String>;

/// Exact-match filters: keyword field → required value.
pub type Filters = BTreeMap<String, String>;

/// A ranked corpus position with its accumulated score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub index: usize,
    pub score: f32,
}

/// Fitted model and matrix for one text field. They are only ever replaced together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FieldIndex {
    pub vectorizer: TfidfVectorizer,
    pub matrix: CsrMatrix,
}

/// Everything derived from one corpus.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FittedState {
    pub fields: BTreeMap<String, FieldIndex>,
    pub keywords: KeywordTable,
    pub documents: Vec<Document>,
}

impl FittedState {
    pub(crate) fn check_shape(&self, schema: &IndexSchema) -> Result<()> {
        let n_docs = self.documents.len();
        if !self.fields.keys().eq(sorted(&schema.text_fields)) {
            return Err(RankError::CorruptSnapshot("text fields do not match the index schema".into()));
        }
        if !self.keywords.fields().eq(sorted(&schema.keyword_fields)) {
            return Err(RankError::CorruptSnapshot("keyword fields do not match the index schema".into()));
        }
        for (field, fi) in &self.fields {
            fi.vectorizer
                .check_matrix(&fi.matrix, n_docs)
                .map_err(|e| RankError::CorruptSnapshot(format!("field '{field}': {e}")))?;
        }
        self.keywords.check_shape(n_docs)
    }
}

fn sorted(fields: &[String]) -> Vec<&str> {
    let mut v: Vec<&str> = fields.iter().map(String::as_str).collect();
    v.sort_unstable();
    v
}

/// In-memory TF-IDF ranking index over text fields with exact-match
/// filtering on keyword fields.
///
/// `fit` and `load` build the new state off to the side and swap it in under
/// a write lock, so concurrent `search` calls see either the old corpus or
/// the new one, never a mix.
pub struct SearchIndex {
    schema: IndexSchema,
    state: RwLock<Option<Arc<FittedState>>>,
}

impl SearchIndex {
    pub fn new(schema: IndexSchema) -> Result<Self> {
        schema.validate()?;
        // compile the analyzer once so a bad token pattern fails here, not at fit
        TfidfVectorizer::new(schema.weighting.clone())?;
        Ok(Self { schema, state: RwLock::new(None) })
    }

    pub fn schema(&self) -> &IndexSchema { &self.schema }

    pub fn is_fitted(&self) -> bool { self.state.read().is_some() }

    /// Number of indexed documents; zero before the first fit.
    pub fn len(&self) -> usize {
        self.state.read().as_ref().map_or(0, |s| s.documents.len())
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn document(&self, index: usize) -> Option<Document> {
        self.state.read().as_ref()?.documents.get(index).cloned()
    }

    pub fn vocabulary_size(&self, field: &str) -> Option<usize> {
        let state = self.state.read();
        let fi = state.as_ref()?.fields.get(field)?;
        Some(fi.matrix.n_cols())
    }

    fn snapshot(&self, op: &'static str) -> Result<Arc<FittedState>> {
        self.state.read().clone().ok_or(RankError::NotInitialized(op))
    }

    fn install(&self, fitted: FittedState) {
        *self.state.write() = Some(Arc::new(fitted));
    }

    /// Build every field matrix and the keyword table from `documents`,
    /// replacing whatever was indexed before. On error the old state stays.
    pub fn fit(&self, documents: Vec<Document>) -> Result<()> {
        let mut fields = BTreeMap::new();
        for field in &self.schema.text_fields {
            let texts: Vec<&str> = documents.iter().map(|d| d.get(field).map_or("", String::as_str)).collect();
            let mut vectorizer = TfidfVectorizer::new(self.schema.weighting.clone())?;
            let matrix = vectorizer.fit(&texts)?;
            tracing::debug!(field = %field, vocab = matrix.n_cols(), nnz = matrix.nnz(), "field matrix built");
            fields.insert(field.clone(), FieldIndex { vectorizer, matrix });
        }
        let keywords = KeywordTable::build(&self.schema.keyword_fields, &documents);
        let num_docs = documents.len();
        self.install(FittedState { fields, keywords, documents });
        tracing::info!(num_docs, text_fields = ?self.schema.text_fields, keyword_fields = ?self.schema.keyword_fields, "index fitted");
        Ok(())
    }

    /// Rank documents for `query` and return the top `num_results` corpus
    /// positions with strictly positive score, best first, ties broken by
    /// ascending position.
    pub fn search_hits(&self, query: &str, num_results: usize, filters: &Filters) -> Result<Vec<Hit>> {
        let state = self.snapshot("search")?;
        self.rank(&state, query, num_results, filters)
    }

    /// Like [`search_hits`](Self::search_hits) but returns the original documents.
    pub fn search(&self, query: &str, num_results: usize, filters: &Filters) -> Result<Vec<Document>> {
        let state = self.snapshot("search")?;
        let hits = self.rank(&state, query, num_results, filters)?;
        Ok(hits.into_iter().map(|h| state.documents[h.index].clone()).collect())
    }

    fn rank(&self, state: &FittedState, query: &str, num_results: usize, filters: &Filters) -> Result<Vec<Hit>> {
        if num_results == 0 {
            return Err(RankError::InvalidArgument("num_results must be positive".into()));
        }

        let mut scores = vec![0.0f32; state.documents.len()];
        for (field, fi) in &state.fields {
            let q = fi.vectorizer.transform(&[query])?;
            let boost = self.schema.boost(field);
            for (acc, sim) in scores.iter_mut().zip(fi.matrix.cosine_similarities(q.row(0))) {
                *acc += sim * boost;
            }
        }

        for (field, value) in filters {
            match state.keywords.mask(field, value) {
                FilterMask::Rows(rows) => {
                    for (acc, keep) in scores.iter_mut().zip(rows) {
                        if !keep { *acc = 0.0; }
                    }
                }
                FilterMask::Unsatisfiable => {
                    tracing::warn!(field = %field, value = %value, "filter matches nothing, zeroing all scores");
                    scores.iter_mut().for_each(|s| *s = 0.0);
                }
            }
        }

        let mut hits: Vec<Hit> = scores
            .iter()
            .enumerate()
            .filter(|&(_, &score)| score > 0.0)
            .map(|(index, &score)| Hit { index, score })
            .collect();
        let by_rank = |a: &Hit, b: &Hit| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index));
        // partial sort for top-k
        if hits.len() > num_results {
            hits.select_nth_unstable_by(num_results - 1, by_rank);
            hits.truncate(num_results);
        }
        hits.sort_unstable_by(by_rank);
        tracing::debug!(query, num_results, returned = hits.len(), "search complete");
        Ok(hits)
    }

    /// Serialize the fitted state to `sink`.
    pub fn save<W: Write>(&self, sink: W) -> Result<()> {
        let state = self.snapshot("save")?;
        persist::write_snapshot(sink, &self.schema, &state)
    }

    /// Replace the fitted state with a snapshot read from `source`. The
    /// snapshot must have been written by an index with the same text and
    /// keyword fields; boosts are taken from this index.
    pub fn load<R: Read>(&self, source: R) -> Result<()> {
        let fitted = persist::read_snapshot(source, &self.schema)?;
        let num_docs = fitted.documents.len();
        self.install(fitted);
        tracing::info!(num_docs, "index loaded from snapshot");
        Ok(())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let state = self.snapshot("save")?;
        persist::save_snapshot_file(path.as_ref(), &self.schema, &state)
    }

    pub fn load_from_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let fitted = persist::load_snapshot_file(path.as_ref(), &self.schema)?;
        let num_docs = fitted.documents.len();
        self.install(fitted);
        tracing::info!(num_docs, path = %path.as_ref().display(), "index loaded from snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faq() -> Vec<Document> {
        vec![
            [("q", "when does the course start"), ("course", "de")],
            [("q", "what is the refund policy"), ("course", "ml")],
        ]
        .into_iter()
        .map(|pairs| pairs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
        .collect()
    }

    #[test]
    fn top_hit_and_filter() {
        let index = SearchIndex::new(IndexSchema::new(["q"], ["course"])).unwrap();
        index.fit(faq()).unwrap();
        let hits = index.search_hits("course start", 1, &Filters::new()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, 0);

        let filters = Filters::from([("course".to_string(), "ml".to_string())]);
        assert!(index.search("course start", 1, &filters).unwrap().is_empty());
    }

    #[test]
    fn search_before_fit() {
        let index = SearchIndex::new(IndexSchema::new(["q"], ["course"])).unwrap();
        assert!(matches!(index.search("x", 3, &Filters::new()), Err(RankError::NotInitialized(_))));
        assert!(matches!(index.save(Vec::<u8>::new()), Err(RankError::NotInitialized(_))));
    }

    #[test]
    fn zero_results_is_invalid() {
        let index = SearchIndex::new(IndexSchema::new(["q"], ["course"])).unwrap();
        index.fit(faq()).unwrap();
        assert!(matches!(index.search("course", 0, &Filters::new()), Err(RankError::InvalidArgument(_))));
    }

    #[test]
    fn failed_refit_keeps_previous_state() {
        use crate::config::{DocFreq, WeightingConfig};
        // two documents admit at most one per term under max_df, below min_df
        let weighting = WeightingConfig { min_df: DocFreq::Count(2), max_df: DocFreq::Ratio(0.5), ..WeightingConfig::default() };
        let index = SearchIndex::new(IndexSchema::new(["q"], ["course"]).with_weighting(weighting)).unwrap();
        let corpus: Vec<Document> = ["course start date", "course refund", "docker start", "docker refund"]
            .into_iter()
            .map(|q| Document::from([("q".to_string(), q.to_string())]))
            .collect();
        index.fit(corpus).unwrap();
        let before = index.search_hits("course start", 4, &Filters::new()).unwrap();
        assert_eq!(before[0].index, 0);

        assert!(matches!(index.fit(faq()), Err(RankError::Config(_))));
        assert_eq!(index.len(), 4);
        assert_eq!(index.document(0).unwrap()["q"], "course start date");
        assert_eq!(index.search_hits("course start", 4, &Filters::new()).unwrap(), before);
    }

    #[test]
    fn bad_token_pattern_fails_at_construction() {
        use crate::config::WeightingConfig;
        let weighting = WeightingConfig { token_pattern: "([a-z".into(), ..WeightingConfig::default() };
        let res = SearchIndex::new(IndexSchema::new(["q"], ["course"]).with_weighting(weighting));
        assert!(matches!(res, Err(RankError::Config(_))));
    }
}
