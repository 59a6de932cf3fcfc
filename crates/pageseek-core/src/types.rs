//! Domain types shared by the lexical, semantic and hybrid engines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;

use crate::error::{Error, Result};

pub type ChunkId = u64;
pub type Page = u32;

/// Page number reported when no candidate survived retrieval.
pub const NO_ATTRIBUTION: i64 = -1;

/// A slice of source-document text tagged with its originating page.
///
/// - `id`: unique within one corpus
/// - `page`: source page; many chunks may share one
/// - `sequence_index`: position in document order, used for neighbor lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub page: Page,
    pub sequence_index: u64,
}

impl Chunk {
    pub fn new(id: ChunkId, text: impl Into<String>, page: Page, sequence_index: u64) -> Self {
        Self { id, text: text.into(), page, sequence_index }
    }
}

/// Ordered, immutable chunk sequence for one document version.
#[derive(Debug, Clone)]
pub struct Corpus {
    chunks: Vec<Chunk>,
    by_id: HashMap<ChunkId, usize>,
    by_sequence: HashMap<u64, usize>,
}

impl Corpus {
    /// Sorts by `sequence_index` and rejects duplicate ids or positions.
    pub fn new(mut chunks: Vec<Chunk>) -> Result<Self> {
        chunks.sort_by_key(|c| c.sequence_index);
        let mut by_id = HashMap::with_capacity(chunks.len());
        let mut by_sequence = HashMap::with_capacity(chunks.len());
        for (pos, chunk) in chunks.iter().enumerate() {
            if by_id.insert(chunk.id, pos).is_some() {
                return Err(Error::DuplicateChunkId(chunk.id));
            }
            if by_sequence.insert(chunk.sequence_index, pos).is_some() {
                return Err(Error::DuplicateSequenceIndex(chunk.sequence_index));
            }
        }
        Ok(Self { chunks, by_id, by_sequence })
    }

    /// Reads a JSON array of chunks.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let chunks: Vec<Chunk> = serde_json::from_reader(reader)?;
        Self::new(chunks)
    }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn chunks(&self) -> &[Chunk] { &self.chunks }

    pub fn get(&self, id: ChunkId) -> Option<&Chunk> { self.by_id.get(&id).map(|&pos| &self.chunks[pos]) }

    pub fn contains(&self, id: ChunkId) -> bool { self.by_id.contains_key(&id) }

    pub fn at_sequence(&self, sequence_index: u64) -> Option<&Chunk> {
        self.by_sequence.get(&sequence_index).map(|&pos| &self.chunks[pos])
    }

    /// Chunks directly before and after `id` in document order, if present.
    pub fn neighbors(&self, id: ChunkId) -> impl Iterator<Item = &Chunk> + '_ {
        let seq = self.get(id).map(|c| c.sequence_index);
        let prev = seq.and_then(|s| s.checked_sub(1)).and_then(|s| self.at_sequence(s));
        let next = seq.and_then(|s| s.checked_add(1)).and_then(|s| self.at_sequence(s));
        prev.into_iter().chain(next)
    }
}

/// Which expansion rule produced a query variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VariantKind {
    Original,
    Simplified,
    KeyTerms,
    Synonym,
}

/// One reformulation of the user question and its vote weight in (0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryVariant {
    pub text: String,
    pub weight: f32,
    pub kind: VariantKind,
}

/// Per-chunk evidence accumulated across query variants.
///
/// `semantic_score` stays `None` when the semantic provider never
/// contributed to this chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub chunk_id: ChunkId,
    pub lexical_score: f32,
    pub semantic_score: Option<f32>,
    pub fused_score: f32,
}

/// A candidate after reranking, ready for page aggregation.
///
/// `score` is the value the aggregator boosts and sorts on; `relevance` is
/// the raw reranker output when one was available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk_id: ChunkId,
    pub page: Page,
    pub sequence_index: u64,
    pub fused_score: f32,
    pub relevance: Option<f32>,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVote {
    pub page: Page,
    pub weight: f64,
}

/// The single page chosen for a question, or none for lack of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub page: Option<Page>,
}

impl Attribution {
    pub fn none() -> Self { Self { page: None } }

    pub fn page(page: Page) -> Self { Self { page: Some(page) } }

    /// Page number with `-1` standing in for "no attribution".
    pub fn page_number(&self) -> i64 { self.page.map_or(NO_ATTRIBUTION, i64::from) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: ChunkId, page: Page, seq: u64) -> Chunk { Chunk::new(id, format!("chunk {id}"), page, seq) }

    #[test]
    fn corpus_orders_by_sequence_index() {
        let corpus = Corpus::new(vec![chunk(7, 2, 3), chunk(5, 1, 1), chunk(6, 1, 2)]).expect("corpus");
        let ids: Vec<_> = corpus.chunks().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![5, 6, 7]);
        assert_eq!(corpus.get(6).map(|c| c.page), Some(1));
    }

    #[test]
    fn corpus_rejects_duplicates() {
        assert!(matches!(Corpus::new(vec![chunk(1, 1, 0), chunk(1, 1, 1)]), Err(Error::DuplicateChunkId(1))));
        assert!(matches!(Corpus::new(vec![chunk(1, 1, 4), chunk(2, 1, 4)]), Err(Error::DuplicateSequenceIndex(4))));
    }

    #[test]
    fn neighbors_skip_gaps_and_edges() {
        let corpus = Corpus::new(vec![chunk(1, 1, 0), chunk(2, 1, 1), chunk(3, 2, 5)]).expect("corpus");
        let around_first: Vec<_> = corpus.neighbors(1).map(|c| c.id).collect();
        assert_eq!(around_first, vec![2]);
        let around_isolated: Vec<_> = corpus.neighbors(3).map(|c| c.id).collect();
        assert!(around_isolated.is_empty());
        assert_eq!(corpus.neighbors(99).count(), 0);
    }

    #[test]
    fn attribution_sentinel() {
        assert_eq!(Attribution::none().page_number(), NO_ATTRIBUTION);
        assert_eq!(Attribution::page(22).page_number(), 22);
    }
}
