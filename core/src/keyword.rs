use crate::error::{RankError, Result};
use crate::Document;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column-oriented copy of the keyword fields, one row per document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeywordTable {
    n_rows: usize,
    columns: BTreeMap<String, Vec<String>>,
}

/// Outcome of checking one `(field, value)` filter against the table.
#[derive(Debug, PartialEq)]
pub enum FilterMask {
    /// Rows whose value equals the filter value.
    Rows(Vec<bool>),
    /// Unknown field, or a value that appears in no document.
    Unsatisfiable,
}

impl KeywordTable {
    pub fn build(fields: &[String], documents: &[Document]) -> Self {
        let columns = fields
            .iter()
            .map(|field| {
                let column = documents.iter().map(|doc| doc.get(field).cloned().unwrap_or_default()).collect();
                (field.clone(), column)
            })
            .collect();
        Self { n_rows: documents.len(), columns }
    }

    pub fn n_rows(&self) -> usize { self.n_rows }

    pub fn column(&self, field: &str) -> Option<&[String]> {
        self.columns.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.keys().map(String::as_str)
    }

    pub fn mask(&self, field: &str, value: &str) -> FilterMask {
        let Some(column) = self.columns.get(field) else {
            return FilterMask::Unsatisfiable;
        };
        let rows: Vec<bool> = column.iter().map(|v| v == value).collect();
        if rows.iter().any(|&hit| hit) {
            FilterMask::Rows(rows)
        } else {
            FilterMask::Unsatisfiable
        }
    }

    pub(crate) fn check_shape(&self, expected_rows: usize) -> Result<()> {
        if self.n_rows != expected_rows {
            return Err(RankError::CorruptSnapshot(format!(
                "keyword table has {} rows, corpus has {} documents",
                self.n_rows, expected_rows
            )));
        }
        if let Some((field, col)) = self.columns.iter().find(|(_, col)| col.len() != self.n_rows) {
            return Err(RankError::CorruptSnapshot(format!(
                "keyword column '{}' has {} rows, expected {}",
                field,
                col.len(),
                self.n_rows
            )));
        }
        Ok(())
    }
}
