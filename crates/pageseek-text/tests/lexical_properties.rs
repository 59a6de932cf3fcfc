use pageseek_core::config::{ExpansionConfig, LexicalConfig};
use pageseek_core::types::{Chunk, Corpus};
use pageseek_text::{LexicalIndex, QueryExpander};
use proptest::prelude::*;

const VOCAB: &[&str] = &["brake", "fluid", "level", "engine", "oil", "tire", "pressure", "warning", "light", "reset"];

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(VOCAB), 0..12).prop_map(|words| words.join(" "))
}

fn corpus_strategy() -> impl Strategy<Value = Corpus> {
    prop::collection::vec(text_strategy(), 1..20).prop_map(|texts| {
        let chunks = texts.into_iter().enumerate().map(|(i, t)| Chunk::new(i as u64 * 3, t, (i / 3) as u32, i as u64)).collect();
        Corpus::new(chunks).unwrap()
    })
}

proptest! {
    #[test]
    fn search_is_bounded_sorted_and_grounded(corpus in corpus_strategy(), query in text_strategy(), k in 0usize..10) {
        let index = LexicalIndex::build(&corpus, LexicalConfig::default()).unwrap();
        let hits = index.search(&query, k);
        prop_assert!(hits.len() <= k);
        for pair in hits.windows(2) {
            prop_assert!(pair[0].1 >= pair[1].1);
        }
        for (id, score) in &hits {
            prop_assert!(corpus.contains(*id));
            prop_assert!(*score > 0.0);
        }
    }

    #[test]
    fn search_is_deterministic(corpus in corpus_strategy(), query in text_strategy()) {
        let index = LexicalIndex::build(&corpus, LexicalConfig::default()).unwrap();
        let first = index.search(&query, 10);
        let rebuilt = LexicalIndex::build(&corpus, LexicalConfig::default()).unwrap();
        let second = rebuilt.search(&query, 10);
        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            prop_assert_eq!(a.0, b.0);
            prop_assert_eq!(a.1.to_bits(), b.1.to_bits());
        }
    }

    #[test]
    fn arbitrary_text_never_panics(corpus in corpus_strategy(), query in ".{0,80}") {
        let index = LexicalIndex::build(&corpus, LexicalConfig::default()).unwrap();
        let _ = index.search(&query, 5);
    }

    #[test]
    fn expansion_keeps_original_first_and_is_bounded(question in ".{0,120}") {
        let expander = QueryExpander::new(ExpansionConfig::default()).unwrap();
        let variants = expander.expand(&question);
        prop_assert!(!variants.is_empty() && variants.len() <= 5);
        prop_assert_eq!(&variants[0].text, &question);
        prop_assert_eq!(variants[0].weight, 1.0);
        prop_assert_eq!(expander.expand(&question), variants.clone());
        for v in &variants[1..] {
            prop_assert!(v.weight > 0.0 && v.weight < 1.0);
            let again = expander.expand(&v.text);
            prop_assert!(again.len() <= 5);
        }
    }
}
