use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};

/// Words dropped from the key-terms query variant.
pub const STOP_WORDS: &[&str] = &[
	"the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from", "as", "this", "that",
	"these", "those", "you", "your", "it", "its", "be", "been", "being", "have", "has", "had", "if", "then", "when", "where",
];

const MAX_TOKEN_LEN: usize = 64;

/// Splits on every non-alphanumeric character and lower-cases.
pub fn plain_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
		.build()
}

/// [`plain_analyzer`] followed by removal of [`STOP_WORDS`].
pub fn stop_word_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build()
}

/// Runs `analyzer` over `text`, keeping tokens at least `min_chars` long.
///
/// The analyzer is cloned so a shared template can be used from many
/// threads at once.
pub fn tokens(analyzer: &TextAnalyzer, text: &str, min_chars: usize) -> Vec<String> {
	let mut analyzer = analyzer.clone();
	let mut stream = analyzer.token_stream(text);
	let mut out = Vec::new();
	while stream.advance() {
		let token = &stream.token().text;
		if token.chars().count() >= min_chars {
			out.push(token.clone());
		}
	}
	out
}

/// Index-side tokenization: lower-cased alphanumeric runs of two or more characters.
pub fn index_tokens(analyzer: &TextAnalyzer, text: &str) -> Vec<String> { tokens(analyzer, text, 2) }
