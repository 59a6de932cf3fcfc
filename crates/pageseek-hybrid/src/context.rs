use std::collections::BTreeMap;

use pageseek_core::types::{ChunkId, Corpus};

/// Adds the immediate sequence neighbors of every candidate.
///
/// Returns ids in document order without duplicates. Ids missing from the
/// corpus are dropped. One hop only: neighbors of neighbors are not added.
pub fn expand_context(ids: &[ChunkId], corpus: &Corpus) -> Vec<ChunkId> {
    let mut by_sequence = BTreeMap::new();
    for &id in ids {
        let Some(chunk) = corpus.get(id) else { continue };
        by_sequence.insert(chunk.sequence_index, chunk.id);
        for neighbor in corpus.neighbors(id) {
            by_sequence.insert(neighbor.sequence_index, neighbor.id);
        }
    }
    by_sequence.into_values().collect()
}
