use anyhow::{anyhow, ensure};
use tracing::{debug, warn};

use pageseek_core::config::RerankConfig;
use pageseek_core::traits::Reranker;
use pageseek_core::types::{Chunk, QueryVariant, ScoredChunk};

/// A context-expanded candidate waiting for a relevance score.
#[derive(Debug, Clone, Copy)]
pub struct RerankCandidate<'a> {
    pub chunk: &'a Chunk,
    pub fused_score: f32,
}

#[derive(Debug, Clone)]
pub struct RerankOutcome {
    pub ranked: Vec<ScoredChunk>,
    pub degraded: bool,
}

/// Drives a [`Reranker`] in bounded batches and falls back to fused
/// ordering when it misbehaves. Never fails.
pub struct RerankerAdapter<'a> {
    reranker: Option<&'a dyn Reranker>,
    config: &'a RerankConfig,
}

fn sort_ranked(ranked: &mut [ScoredChunk]) {
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.sequence_index.cmp(&b.sequence_index)));
}

fn scored(candidate: &RerankCandidate<'_>, relevance: Option<f32>, score: f32) -> ScoredChunk {
    ScoredChunk {
        chunk_id: candidate.chunk.id,
        page: candidate.chunk.page,
        sequence_index: candidate.chunk.sequence_index,
        fused_score: candidate.fused_score,
        relevance,
        score,
    }
}

fn by_fused(candidates: &[RerankCandidate<'_>]) -> Vec<ScoredChunk> {
    let mut ranked: Vec<ScoredChunk> = candidates.iter().map(|c| scored(c, None, c.fused_score)).collect();
    sort_ranked(&mut ranked);
    ranked
}

impl<'a> RerankerAdapter<'a> {
    pub fn new(reranker: Option<&'a dyn Reranker>, config: &'a RerankConfig) -> Self { Self { reranker, config } }

    pub async fn rerank(&self, question: &str, variants: &[QueryVariant], candidates: &[RerankCandidate<'_>]) -> RerankOutcome {
        let Some(reranker) = self.reranker else {
            return RerankOutcome { ranked: by_fused(candidates), degraded: false };
        };
        if candidates.is_empty() {
            return RerankOutcome { ranked: Vec::new(), degraded: false };
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();
        let first = match self.score_all(reranker, question, &texts).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, candidates = candidates.len(), "rerank failed, keeping fused order");
                return RerankOutcome { ranked: by_fused(candidates), degraded: true };
            }
        };
        let mut ranked: Vec<ScoredChunk> = candidates.iter().zip(&first).map(|(c, &rel)| scored(c, Some(rel), rel)).collect();
        sort_ranked(&mut ranked);
        debug!(candidates = ranked.len(), "first rerank pass");

        let reformulation = match variants {
            [_, .., last] => last,
            _ => return RerankOutcome { ranked, degraded: false },
        };

        let window: Vec<(usize, &RerankCandidate<'_>)> = ranked
            .iter()
            .take(self.config.second_pass_k)
            .filter_map(|s| candidates.iter().enumerate().find(|(_, c)| c.chunk.id == s.chunk_id))
            .collect();
        let query = format!("{question} {}", reformulation.text);
        let window_texts: Vec<String> = window.iter().map(|(pos, _)| texts[*pos].clone()).collect();
        match self.score_all(reranker, &query, &window_texts).await {
            Ok(second) => {
                let mut confirmed: Vec<ScoredChunk> = window
                    .iter()
                    .zip(second)
                    .map(|((_, c), rel)| scored(c, Some(rel), self.config.fused_blend * c.fused_score + self.config.relevance_blend * rel))
                    .collect();
                sort_ranked(&mut confirmed);
                debug!(candidates = confirmed.len(), query = %query, "second rerank pass");
                RerankOutcome { ranked: confirmed, degraded: false }
            }
            Err(e) => {
                warn!(error = %e, "second rerank pass failed, keeping first-pass relevance");
                RerankOutcome { ranked, degraded: true }
            }
        }
    }

    async fn score_all(&self, reranker: &dyn Reranker, query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>> {
        // one deadline for the whole pass, however many batches it takes
        let timeout = self.config.timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut scores = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            let got = tokio::time::timeout_at(deadline, reranker.score(query, batch))
                .await
                .map_err(|_| anyhow!("rerank pass exceeded {timeout:?}"))??;
            ensure!(got.len() == batch.len(), "reranker returned {} scores for {} documents", got.len(), batch.len());
            ensure!(got.iter().all(|s| s.is_finite()), "reranker returned a non-finite score");
            scores.extend(got);
        }
        Ok(scores)
    }
}
