//! pageseek-text
//!
//! Lexical side of retrieval: the tantivy analyzer chain, an in-memory BM25
//! index over chunk text and the deterministic query expander.

pub mod analyzer;
pub mod expand;
pub mod index;

pub use expand::QueryExpander;
pub use index::LexicalIndex;
