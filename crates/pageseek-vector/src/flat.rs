use std::sync::Arc;

use anyhow::{anyhow, ensure, Result};
use tracing::info;

use pageseek_core::traits::{Embedder, SemanticProvider, SemanticSearch};
use pageseek_core::types::{ChunkId, Corpus};

/// Exact cosine search over every chunk embedding.
pub struct FlatIndex {
    embedder: Arc<dyn Embedder>,
    ids: Vec<ChunkId>,
    vectors: Vec<Vec<f32>>,
}

impl SemanticSearch for FlatIndex {
    fn search(&self, query: &str, k: usize) -> Result<Vec<(ChunkId, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let q = self
            .embedder
            .embed_batch(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedder returned no vector for the query"))?;
        let mut hits: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(pos, v)| (pos, v.iter().zip(&q).map(|(a, b)| a * b).sum::<f32>().clamp(0.0, 1.0)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits.into_iter().map(|(pos, s)| (self.ids[pos], s)).collect())
    }
}

/// Embeds a corpus in batches and serves it from memory.
pub struct FlatIndexProvider {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl FlatIndexProvider {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self { Self { embedder, batch_size: 32 } }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl SemanticProvider for FlatIndexProvider {
    fn index(&self, corpus: &Arc<Corpus>) -> Result<Arc<dyn SemanticSearch>> {
        let mut ids = Vec::with_capacity(corpus.len());
        let mut vectors = Vec::with_capacity(corpus.len());
        for batch in corpus.chunks().chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts)?;
            ensure!(embeddings.len() == batch.len(), "embedder returned {} vectors for {} texts", embeddings.len(), batch.len());
            for e in &embeddings {
                ensure!(e.len() == self.embedder.dim(), "embedding has dim {}, expected {}", e.len(), self.embedder.dim());
            }
            ids.extend(batch.iter().map(|c| c.id));
            vectors.extend(embeddings);
        }
        info!(chunks = ids.len(), dim = self.embedder.dim(), "built flat vector index");
        Ok(Arc::new(FlatIndex { embedder: Arc::clone(&self.embedder), ids, vectors }))
    }
}
