use std::cmp::Ordering;
use std::collections::HashMap;

use tantivy::tokenizer::TextAnalyzer;
use tracing::info;

use pageseek_core::cancel::CancellationToken;
use pageseek_core::config::LexicalConfig;
use pageseek_core::error::{Error, Result};
use pageseek_core::types::{ChunkId, Corpus};

use crate::analyzer::{index_tokens, plain_analyzer};

struct Posting {
	doc: u32,
	tf: u32,
}

struct Term {
	idf: f32,
	postings: Vec<Posting>,
}

struct Doc {
	id: ChunkId,
	sequence_index: u64,
	len: u32,
}

/// Okapi BM25 over a chunk corpus.
///
/// Built once per corpus version and never mutated afterwards, so a shared
/// reference can serve any number of concurrent searches.
pub struct LexicalIndex {
	analyzer: TextAnalyzer,
	terms: HashMap<String, Term>,
	docs: Vec<Doc>,
	avg_len: f32,
	params: LexicalConfig,
}

impl LexicalIndex {
	pub fn build(corpus: &Corpus, params: LexicalConfig) -> Result<Self> {
		Self::build_with_cancel(corpus, params, &CancellationToken::new())
	}

	pub fn build_with_cancel(corpus: &Corpus, params: LexicalConfig, cancel: &CancellationToken) -> Result<Self> {
		if corpus.is_empty() {
			return Err(Error::EmptyCorpus);
		}
		params.validate()?;

		let analyzer = plain_analyzer();
		let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
		let mut docs = Vec::with_capacity(corpus.len());
		let mut total_len = 0u64;

		for (pos, chunk) in corpus.chunks().iter().enumerate() {
			cancel.check()?;
			let tokens = index_tokens(&analyzer, &chunk.text);
			let mut tf: HashMap<String, u32> = HashMap::new();
			for token in &tokens {
				*tf.entry(token.clone()).or_default() += 1;
			}
			let doc = u32::try_from(pos).map_err(|_| Error::InvalidConfig("corpus exceeds u32::MAX chunks".to_string()))?;
			for (term, count) in tf {
				postings.entry(term).or_default().push(Posting { doc, tf: count });
			}
			let len = u32::try_from(tokens.len()).unwrap_or(u32::MAX);
			total_len += u64::from(len);
			docs.push(Doc { id: chunk.id, sequence_index: chunk.sequence_index, len });
		}

		let n = docs.len() as f32;
		let terms: HashMap<String, Term> = postings
			.into_iter()
			.map(|(term, mut list)| {
				list.sort_by_key(|p| p.doc);
				let df = list.len() as f32;
				let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
				(term, Term { idf, postings: list })
			})
			.collect();
		let avg_len = total_len as f32 / n;

		info!(chunks = docs.len(), vocabulary = terms.len(), avg_len, "built lexical index");
		Ok(Self { analyzer, terms, docs, avg_len, params })
	}

	pub fn len(&self) -> usize { self.docs.len() }

	pub fn is_empty(&self) -> bool { self.docs.is_empty() }

	/// Up to `top_k` chunks with a positive score, best first.
	///
	/// Equal scores are ordered by ascending sequence index.
	pub fn search(&self, query: &str, top_k: usize) -> Vec<(ChunkId, f32)> {
		if top_k == 0 {
			return Vec::new();
		}
		let (k1, b) = (self.params.k1, self.params.b);
		let avg_len = if self.avg_len > 0.0 { self.avg_len } else { 1.0 };
		let mut scores = vec![0f32; self.docs.len()];

		for token in index_tokens(&self.analyzer, query) {
			let Some(term) = self.terms.get(&token) else { continue };
			for posting in &term.postings {
				let doc = &self.docs[posting.doc as usize];
				let tf = posting.tf as f32;
				let norm = k1 * (1.0 - b + b * doc.len as f32 / avg_len);
				scores[posting.doc as usize] += term.idf * (tf * (k1 + 1.0)) / (tf + norm);
			}
		}

		let mut hits: Vec<(usize, f32)> = scores.into_iter().enumerate().filter(|(_, s)| *s > 0.0).collect();
		hits.sort_by(|x, y| y.1.total_cmp(&x.1).then_with(|| self.by_sequence(x.0, y.0)));
		hits.truncate(top_k);
		hits.into_iter().map(|(pos, score)| (self.docs[pos].id, score)).collect()
	}

	fn by_sequence(&self, a: usize, b: usize) -> Ordering { self.docs[a].sequence_index.cmp(&self.docs[b].sequence_index) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use pageseek_core::types::Chunk;

	fn corpus(texts: &[&str]) -> Corpus {
		let chunks = texts.iter().enumerate().map(|(i, t)| Chunk::new(i as u64 + 100, *t, 1, i as u64)).collect();
		Corpus::new(chunks).expect("corpus")
	}

	#[test]
	fn empty_corpus_is_rejected() {
		let empty = Corpus::new(vec![]).expect("corpus");
		assert!(matches!(LexicalIndex::build(&empty, LexicalConfig::default()), Err(Error::EmptyCorpus)));
	}

	#[test]
	fn invalid_params_are_rejected() {
		let c = corpus(&["brake fluid"]);
		let params = LexicalConfig { k1: 1.5, b: 1.5 };
		assert!(matches!(LexicalIndex::build(&c, params), Err(Error::InvalidConfig(_))));
	}

	#[test]
	fn rare_terms_outrank_common_ones() {
		let c = corpus(&["engine oil level engine", "brake fluid level", "engine coolant level", "tire pressure"]);
		let index = LexicalIndex::build(&c, LexicalConfig::default()).expect("index");
		let hits = index.search("brake level", 10);
		assert_eq!(hits[0].0, 101);
		assert_eq!(hits.len(), 3, "tire pressure shares no token");
	}

	#[test]
	fn ties_break_on_document_order() {
		let c = corpus(&["alpha beta", "gamma", "alpha beta"]);
		let index = LexicalIndex::build(&c, LexicalConfig::default()).expect("index");
		let hits = index.search("alpha", 10);
		assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![100, 102]);
		assert_eq!(hits[0].1, hits[1].1);
	}

	#[test]
	fn unknown_and_degenerate_queries_score_nothing() {
		let c = corpus(&["brake fluid"]);
		let index = LexicalIndex::build(&c, LexicalConfig::default()).expect("index");
		assert!(index.search("", 5).is_empty());
		assert!(index.search("a ? !", 5).is_empty());
		assert!(index.search("transmission", 5).is_empty());
		assert!(index.search("brake", 0).is_empty());
	}

	#[test]
	fn cancelled_build_stops() {
		let c = corpus(&["brake fluid", "engine oil"]);
		let token = CancellationToken::new();
		token.cancel();
		assert!(matches!(LexicalIndex::build_with_cancel(&c, LexicalConfig::default(), &token), Err(Error::Cancelled)));
	}
}
