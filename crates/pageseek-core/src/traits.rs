use std::sync::Arc;

use futures::future::BoxFuture;

use crate::types::{ChunkId, Corpus};

/// Turns text into fixed-size vectors.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// A built semantic index for one corpus version.
///
/// Similarities are expected in `[0, 1]`, higher is better.
pub trait SemanticSearch: Send + Sync {
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<(ChunkId, f32)>>;
}

/// Builds a [`SemanticSearch`] handle once per corpus version.
pub trait SemanticProvider: Send + Sync {
    fn index(&self, corpus: &Arc<Corpus>) -> anyhow::Result<Arc<dyn SemanticSearch>>;
}

/// Pairwise (query, text) relevance model.
///
/// Returns one score per document, in input order. Scores are only
/// comparable within a single call.
pub trait Reranker: Send + Sync {
    fn score<'a>(&'a self, query: &'a str, documents: &'a [String]) -> BoxFuture<'a, anyhow::Result<Vec<f32>>>;
}
