use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use pageseek_core::cancel::CancellationToken;
use pageseek_core::config::RetrievalConfig;
use pageseek_core::traits::{Reranker, SemanticProvider, SemanticSearch};
use pageseek_core::types::{Attribution, ChunkId, Corpus, Page, PageVote, QueryVariant};
use pageseek_core::Result;
use pageseek_text::{LexicalIndex, QueryExpander};

use crate::aggregate::PageAggregator;
use crate::context::expand_context;
use crate::fuse::{FuseOutcome, HybridFuser};
use crate::rerank::{RerankCandidate, RerankerAdapter};

/// Everything built from one corpus version. Read-only once constructed.
pub struct Snapshot {
    pub corpus: Arc<Corpus>,
    pub lexical: LexicalIndex,
    pub semantic: Option<Arc<dyn SemanticSearch>>,
}

impl Snapshot {
    /// Builds the lexical index, then asks the provider for a semantic one.
    ///
    /// A provider that fails to index leaves the snapshot lexical-only; each
    /// query then reports `degraded.semantic`.
    pub fn build(corpus: Corpus, config: &RetrievalConfig, provider: Option<&dyn SemanticProvider>, cancel: &CancellationToken) -> Result<Self> {
        let lexical = LexicalIndex::build_with_cancel(&corpus, config.lexical.clone(), cancel)?;
        cancel.check()?;
        let corpus = Arc::new(corpus);
        let semantic = match provider {
            Some(p) => match p.index(&corpus) {
                Ok(index) => Some(index),
                Err(e) => {
                    warn!(error = %e, "semantic indexing failed, snapshot is lexical only");
                    None
                }
            },
            None => None,
        };
        info!(chunks = corpus.len(), semantic = semantic.is_some(), "snapshot built");
        Ok(Self { corpus, lexical, semantic })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: ChunkId,
    pub page: Page,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DegradedFlags {
    pub semantic: bool,
    pub rerank: bool,
}

/// Ranked evidence and the attributed page for one question.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub chunks: Vec<RetrievedChunk>,
    pub attribution: Attribution,
    pub votes: Vec<PageVote>,
    pub degraded: DegradedFlags,
    pub variants: Vec<QueryVariant>,
}

/// One pass from question to attributed page against a fixed snapshot.
pub struct RetrievalPipeline<'a> {
    pub snapshot: Arc<Snapshot>,
    pub config: &'a RetrievalConfig,
    pub expander: &'a QueryExpander,
    pub aggregator: &'a PageAggregator,
    pub reranker: Option<&'a dyn Reranker>,
}

impl RetrievalPipeline<'_> {
    pub async fn retrieve(&self, question: &str) -> Retrieval {
        let variants = self.expander.expand(question);
        let (variants, fused) = self.fuse_off_runtime(variants).await;

        let corpus = &*self.snapshot.corpus;
        let top: Vec<ChunkId> = fused.scores.iter().take(self.config.fusion.initial_k).map(|c| c.chunk_id).collect();
        let fused_by_id: HashMap<ChunkId, f32> = fused.scores.iter().map(|c| (c.chunk_id, c.fused_score)).collect();

        let expanded = expand_context(&top, corpus);
        debug!(question, variants = variants.len(), top = top.len(), expanded = expanded.len(), "candidates selected");
        let candidates: Vec<RerankCandidate<'_>> = expanded
            .iter()
            .filter_map(|id| corpus.get(*id))
            .map(|chunk| RerankCandidate { chunk, fused_score: fused_by_id.get(&chunk.id).copied().unwrap_or(0.0) })
            .collect();

        let reranked = RerankerAdapter::new(self.reranker, &self.config.rerank).rerank(question, &variants, &candidates).await;
        let aggregation = self.aggregator.aggregate(reranked.ranked);

        let chunks = aggregation
            .ranked
            .iter()
            .filter_map(|c| {
                corpus.get(c.chunk_id).map(|chunk| RetrievedChunk { chunk_id: c.chunk_id, page: c.page, text: chunk.text.clone(), score: c.score })
            })
            .collect();

        Retrieval {
            chunks,
            attribution: aggregation.attribution,
            votes: aggregation.votes,
            degraded: DegradedFlags { semantic: fused.degraded, rerank: reranked.degraded },
            variants,
        }
    }

    /// Fusion fans out on rayon and calls the synchronous semantic index, so
    /// it runs on the blocking pool instead of an async worker.
    async fn fuse_off_runtime(&self, variants: Vec<QueryVariant>) -> (Vec<QueryVariant>, FuseOutcome) {
        let snapshot = Arc::clone(&self.snapshot);
        let (bm25_weight, initial_k) = (self.config.fusion.bm25_weight, self.config.fusion.initial_k);
        let fallback = variants.clone();
        let task = tokio::task::spawn_blocking(move || {
            let fuser = HybridFuser::new(&snapshot.corpus, &snapshot.lexical, snapshot.semantic.as_deref(), bm25_weight);
            let fused = fuser.fuse(&variants, initial_k);
            (variants, fused)
        });
        match task.await {
            Ok(done) => done,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!(error = %e, "fusion task cancelled, returning no candidates");
                (fallback, FuseOutcome { scores: Vec::new(), degraded: true, semantic_failures: 0 })
            }
        }
    }
}
