use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, warn};

use pageseek_core::traits::SemanticSearch;
use pageseek_core::types::{CandidateScore, ChunkId, Corpus, QueryVariant};
use pageseek_text::LexicalIndex;

/// Fused candidates for one question.
///
/// `degraded` is set when no variant got a semantic signal, either because
/// no provider is configured or because every call failed.
#[derive(Debug, Clone)]
pub struct FuseOutcome {
    pub scores: Vec<CandidateScore>,
    pub degraded: bool,
    pub semantic_failures: usize,
}

struct VariantHits {
    lexical: Vec<(ChunkId, f32)>,
    semantic: Option<Vec<(ChunkId, f32)>>,
    weight: f32,
}

/// Linear fusion of max-normalized lexical and semantic scores.
pub struct HybridFuser<'a> {
    corpus: &'a Corpus,
    lexical: &'a LexicalIndex,
    semantic: Option<&'a dyn SemanticSearch>,
    bm25_weight: f32,
}

fn max_score(hits: &[(ChunkId, f32)]) -> f32 { hits.iter().map(|h| h.1).fold(0.0, f32::max) }

// `lexical_score` and `semantic_score` keep the best raw value seen under any
// variant; only `fused_score` is summed.
fn empty_score(chunk_id: ChunkId) -> CandidateScore { CandidateScore { chunk_id, lexical_score: 0.0, semantic_score: None, fused_score: 0.0 } }

impl<'a> HybridFuser<'a> {
    pub fn new(corpus: &'a Corpus, lexical: &'a LexicalIndex, semantic: Option<&'a dyn SemanticSearch>, bm25_weight: f32) -> Self {
        Self { corpus, lexical, semantic, bm25_weight }
    }

    /// Scores every variant and sums the weighted contributions per chunk.
    ///
    /// Variants are looked up in parallel but merged in input order, so the
    /// sums are bit-identical between runs.
    pub fn fuse(&self, variants: &[QueryVariant], initial_top_k: usize) -> FuseOutcome {
        let hits: Vec<VariantHits> = variants.par_iter().map(|v| self.lookup(v, initial_top_k)).collect();

        let missing = hits.iter().filter(|h| h.semantic.is_none()).count();
        let semantic_failures = if self.semantic.is_some() { missing } else { 0 };
        let degraded = self.semantic.is_none() || missing == variants.len();
        if self.semantic.is_some() && degraded {
            warn!(variants = variants.len(), "semantic provider unavailable for every variant, scoring lexical only");
        }

        let mut acc: HashMap<ChunkId, CandidateScore> = HashMap::new();
        for variant in &hits {
            self.accumulate(&mut acc, variant);
        }

        let mut scores: Vec<CandidateScore> = acc.into_values().collect();
        scores.sort_by(|a, b| b.fused_score.total_cmp(&a.fused_score).then_with(|| self.sequence(a.chunk_id).cmp(&self.sequence(b.chunk_id))));
        debug!(candidates = scores.len(), degraded, semantic_failures, "fused query variants");
        FuseOutcome { scores, degraded, semantic_failures }
    }

    fn lookup(&self, variant: &QueryVariant, k: usize) -> VariantHits {
        let lexical = self.lexical.search(&variant.text, k);
        let semantic = self.semantic.and_then(|provider| match provider.search(&variant.text, k) {
            Ok(hits) => Some(
                hits.into_iter()
                    .filter(|(id, s)| s.is_finite() && self.corpus.contains(*id))
                    .map(|(id, s)| (id, s.clamp(0.0, 1.0)))
                    .collect(),
            ),
            Err(e) => {
                warn!(variant = %variant.text, error = %e, "semantic search failed");
                None
            }
        });
        VariantHits { lexical, semantic, weight: variant.weight }
    }

    fn accumulate(&self, acc: &mut HashMap<ChunkId, CandidateScore>, variant: &VariantHits) {
        let (semantic, bm25_weight) = match &variant.semantic {
            Some(hits) => (hits.as_slice(), self.bm25_weight),
            None => (&[][..], 1.0),
        };
        let lex_max = max_score(&variant.lexical);
        let sem_max = max_score(semantic);

        let mut parts: HashMap<ChunkId, (f32, f32)> = HashMap::new();
        if lex_max > 0.0 {
            for (id, s) in &variant.lexical {
                parts.entry(*id).or_default().0 = s / lex_max;
                let entry = acc.entry(*id).or_insert_with(|| empty_score(*id));
                entry.lexical_score = entry.lexical_score.max(*s);
            }
        }
        if sem_max > 0.0 {
            for (id, s) in semantic {
                parts.entry(*id).or_default().1 = s / sem_max;
                let entry = acc.entry(*id).or_insert_with(|| empty_score(*id));
                entry.semantic_score = Some(entry.semantic_score.map_or(*s, |old| old.max(*s)));
            }
        }

        for (id, (lex_norm, sem_norm)) in parts {
            let combined = (1.0 - bm25_weight) * sem_norm + bm25_weight * lex_norm;
            if let Some(entry) = acc.get_mut(&id) {
                entry.fused_score += combined * variant.weight;
            }
        }
    }

    fn sequence(&self, id: ChunkId) -> u64 { self.corpus.get(id).map_or(u64::MAX, |c| c.sequence_index) }
}
