//! Compressed sparse row matrix used for field matrices and query vectors.

use crate::error::{RankError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CsrMatrix {
    n_cols: usize,
    /// `indptr[r]..indptr[r + 1]` spans the entries of row `r`.
    indptr: Vec<usize>,
    /// Column indices, strictly increasing within a row.
    indices: Vec<u32>,
    data: Vec<f32>,
}

impl CsrMatrix {
    pub fn new(n_cols: usize) -> Self {
        Self { n_cols, indptr: vec![0], indices: Vec::new(), data: Vec::new() }
    }

    /// Append a row from `(column, value)` pairs sorted by column.
    pub fn push_row<I: IntoIterator<Item = (u32, f32)>>(&mut self, entries: I) {
        for (col, value) in entries {
            debug_assert!((col as usize) < self.n_cols);
            self.indices.push(col);
            self.data.push(value);
        }
        self.indptr.push(self.indices.len());
    }

    pub fn n_rows(&self) -> usize { self.indptr.len().saturating_sub(1) }
    pub fn n_cols(&self) -> usize { self.n_cols }
    pub fn nnz(&self) -> usize { self.data.len() }

    pub fn row(&self, r: usize) -> SparseRow<'_> {
        let span = self.indptr[r]..self.indptr[r + 1];
        SparseRow { indices: &self.indices[span.clone()], data: &self.data[span] }
    }

    pub fn rows(&self) -> impl Iterator<Item = SparseRow<'_>> + '_ {
        (0..self.n_rows()).map(move |r| self.row(r))
    }

    /// Cosine similarity of `query` against every row. Zero vectors on
    /// either side give a similarity of zero.
    pub fn cosine_similarities(&self, query: SparseRow<'_>) -> Vec<f32> {
        let q_norm = query.norm();
        if q_norm == 0.0 {
            return vec![0.0; self.n_rows()];
        }
        self.rows()
            .map(|row| {
                let r_norm = row.norm();
                if r_norm == 0.0 { 0.0 } else { row.dot(&query) / (r_norm * q_norm) }
            })
            .collect()
    }

    /// Verify the internal layout after deserialization.
    pub fn check_shape(&self, expected_rows: usize) -> Result<()> {
        if self.indptr.first() != Some(&0) {
            return Err(RankError::CorruptSnapshot("matrix row pointer does not start at zero".into()));
        }
        if self.n_rows() != expected_rows {
            return Err(RankError::CorruptSnapshot(format!(
                "matrix has {} rows, corpus has {} documents",
                self.n_rows(),
                expected_rows
            )));
        }
        if self.indices.len() != self.data.len() || self.indptr.last() != Some(&self.indices.len()) {
            return Err(RankError::CorruptSnapshot("matrix entry arrays disagree in length".into()));
        }
        if self.indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(RankError::CorruptSnapshot("matrix row pointers are not monotone".into()));
        }
        for row in self.rows() {
            if row.indices.windows(2).any(|w| w[0] >= w[1]) {
                return Err(RankError::CorruptSnapshot("matrix columns are not sorted within a row".into()));
            }
            if row.indices.last().is_some_and(|&c| c as usize >= self.n_cols) {
                return Err(RankError::CorruptSnapshot("matrix column index out of range".into()));
            }
        }
        if self.data.iter().any(|v| !v.is_finite()) {
            return Err(RankError::CorruptSnapshot("matrix holds a non-finite weight".into()));
        }
        Ok(())
    }
}

/// Borrowed view of one sparse row.
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    pub indices: &'a [u32],
    pub data: &'a [f32],
}

impl<'a> SparseRow<'a> {
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Dot product by merging the two sorted index lists.
    pub fn dot(&self, other: &SparseRow<'_>) -> f32 {
        let (mut i, mut j, mut acc) = (0, 0, 0.0f32);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += self.data[i] * other.data[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }

    pub fn is_empty(&self) -> bool { self.indices.is_empty() }
}
