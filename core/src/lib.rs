//! In-memory TF-IDF ranking over structured documents.
//!
//! Text fields are weighted per field with [`weighting::TfidfVectorizer`] and
//! scored by cosine similarity; keyword fields are kept verbatim for strict
//! exact-match filtering. See [`SearchIndex`] for the entry point.

pub mod config;
pub mod error;
mod index;
pub mod ingest;
pub mod keyword;
pub mod matrix;
pub mod persist;
pub mod tokenizer;
pub mod weighting;

pub use config::{IndexSchema, WeightingConfig};
pub use error::{RankError, Result};
pub use index::{Document, Filters, Hit, SearchIndex};
