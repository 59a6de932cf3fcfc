//! Deterministic query reformulation.
//!
//! A question fans out into at most five variants: the question itself, a
//! simplified form without interrogatives, a bag of key terms and up to two
//! synonym substitutions, e.g. "brake" → "braking system".

use tantivy::tokenizer::TextAnalyzer;

use pageseek_core::config::ExpansionConfig;
use pageseek_core::error::Result;
use pageseek_core::types::{QueryVariant, VariantKind};

use crate::analyzer::{stop_word_analyzer, tokens};

const QUESTION_WORDS: &[&str] = &[
	"what", "when", "where", "why", "how", "which", "who", "whom", "whose", "does", "do", "did", "is", "are", "was", "were",
	"should", "can", "could", "will", "would",
];

/// Ordered so expansion never depends on hash iteration.
const SYNONYMS: &[(&str, &[&str])] = &[
	("brake", &["braking system", "brakes"]),
	("brakes", &["braking system"]),
	("engine", &["motor", "powertrain"]),
	("light", &["indicator", "warning lamp"]),
	("warning", &["alert", "fault"]),
	("tire", &["tyre", "wheel"]),
	("tires", &["tyres", "wheels"]),
	("fuel", &["gas", "petrol"]),
	("battery", &["electrical system"]),
	("abs", &["anti-lock braking"]),
	("airbag", &["srs", "supplemental restraint"]),
	("oil", &["engine oil", "lubricant"]),
	("coolant", &["antifreeze", "cooling system"]),
	("reset", &["clear"]),
	("fix", &["repair"]),
	("ac", &["air conditioning"]),
];

fn core(word: &str) -> &str { word.trim_matches(|c: char| !c.is_alphanumeric()) }

fn normalize(text: &str) -> String { text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ") }

pub struct QueryExpander {
	config: ExpansionConfig,
	key_terms: TextAnalyzer,
}

impl QueryExpander {
	pub fn new(config: ExpansionConfig) -> Result<Self> {
		config.validate()?;
		Ok(Self { config, key_terms: stop_word_analyzer() })
	}

	/// The first variant is always `question` itself with weight 1.0.
	pub fn expand(&self, question: &str) -> Vec<QueryVariant> {
		let mut out = Variants { items: Vec::new(), seen: Vec::new(), max: self.config.max_variants };
		out.items.push(QueryVariant { text: question.to_string(), weight: 1.0, kind: VariantKind::Original });
		out.seen.push(normalize(question));

		out.push(simplify(question), self.config.secondary_weight, VariantKind::Simplified);
		out.push(tokens(&self.key_terms, question, 3).join(" "), self.config.secondary_weight, VariantKind::KeyTerms);

		let mut substituted = 0;
		for text in synonym_variants(question) {
			if substituted == self.config.max_synonym_variants {
				break;
			}
			if out.push(text, self.config.synonym_weight, VariantKind::Synonym) {
				substituted += 1;
			}
		}
		out.items
	}
}

struct Variants {
	items: Vec<QueryVariant>,
	seen: Vec<String>,
	max: usize,
}

impl Variants {
	fn push(&mut self, text: String, weight: f32, kind: VariantKind) -> bool {
		let key = normalize(&text);
		if key.is_empty() || self.items.len() >= self.max || self.seen.contains(&key) {
			return false;
		}
		self.seen.push(key);
		self.items.push(QueryVariant { text, weight, kind });
		true
	}
}

/// Lower-cased question without interrogative and auxiliary words.
fn simplify(question: &str) -> String {
	question
		.to_lowercase()
		.split_whitespace()
		.filter(|w| !QUESTION_WORDS.contains(&core(w)))
		.collect::<Vec<_>>()
		.join(" ")
}

fn synonym_variants(question: &str) -> Vec<String> {
	let lower = question.to_lowercase();
	let words: Vec<&str> = lower.split_whitespace().collect();
	let mut out = Vec::new();
	for (key, replacements) in SYNONYMS {
		if !words.iter().any(|w| core(w) == *key) {
			continue;
		}
		for replacement in *replacements {
			if lower.contains(replacement) {
				continue;
			}
			let variant = words
				.iter()
				.map(|w| if core(w) == *key { w.replacen(key, replacement, 1) } else { (*w).to_string() })
				.collect::<Vec<_>>()
				.join(" ");
			out.push(variant);
		}
	}
	out
}
