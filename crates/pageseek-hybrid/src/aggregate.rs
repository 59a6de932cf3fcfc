use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use pageseek_core::config::AggregationConfig;
use pageseek_core::types::{Attribution, Page, PageVote, ScoredChunk};
use pageseek_core::Result;

/// Final ranking plus the page it votes for.
#[derive(Debug, Clone, Serialize)]
pub struct Aggregation {
    pub ranked: Vec<ScoredChunk>,
    pub votes: Vec<PageVote>,
    pub attribution: Attribution,
}

/// Consensus boosting followed by rank-weighted page voting.
#[derive(Debug, Clone)]
pub struct PageAggregator {
    boost_factor: f32,
    vote_base: f64,
    final_k: usize,
}

impl PageAggregator {
    pub fn new(config: &AggregationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { boost_factor: config.boost_factor, vote_base: config.vote_base, final_k: config.final_k })
    }

    /// Raises every candidate on a page that more than one candidate shares.
    ///
    /// Negative scores are divided rather than multiplied so they still rise
    /// and keep their order.
    pub fn boost(&self, candidates: &mut [ScoredChunk]) {
        let mut per_page: HashMap<Page, usize> = HashMap::new();
        for c in candidates.iter() {
            *per_page.entry(c.page).or_default() += 1;
        }
        let f = self.boost_factor;
        for c in candidates.iter_mut().filter(|c| per_page[&c.page] > 1) {
            c.score = if c.score >= 0.0 { c.score * f } else { c.score / f };
        }
    }

    /// Boosts, keeps the top `final_k` and votes.
    ///
    /// Rank `r` of the `n` candidates actually kept weighs `base^(n - r)`, so
    /// vote weights scale with `n`, not `final_k`, when fewer survive.
    pub fn aggregate(&self, mut candidates: Vec<ScoredChunk>) -> Aggregation {
        self.boost(&mut candidates);
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.sequence_index.cmp(&b.sequence_index)));
        candidates.truncate(self.final_k);

        let n = candidates.len();
        let mut totals: BTreeMap<Page, f64> = BTreeMap::new();
        for (rank, c) in candidates.iter().enumerate() {
            let exponent = i32::try_from(n - rank).unwrap_or(i32::MAX);
            *totals.entry(c.page).or_default() += self.vote_base.powi(exponent);
        }

        let mut votes: Vec<PageVote> = totals.into_iter().map(|(page, weight)| PageVote { page, weight }).collect();
        votes.sort_by(|a, b| b.weight.total_cmp(&a.weight).then(a.page.cmp(&b.page)));
        let attribution = votes.first().map_or_else(Attribution::none, |v| Attribution::page(v.page));
        debug!(selected = n, pages = votes.len(), page = attribution.page_number(), "aggregated page votes");

        Aggregation { ranked: candidates, votes, attribution }
    }
}
