use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use pageseek_core::cancel::CancellationToken;
use pageseek_core::config::RetrievalConfig;
use pageseek_core::traits::{Reranker, SemanticProvider};
use pageseek_core::types::Corpus;
use pageseek_core::{Error, Result};
use pageseek_text::QueryExpander;

use crate::aggregate::PageAggregator;
use crate::pipeline::{Retrieval, RetrievalPipeline, Snapshot};

/// Owns the current snapshot and the query-time components.
///
/// Loads build a fresh [`Snapshot`] off to the side and swap it in only
/// once complete; in-flight queries keep the `Arc` they started with.
pub struct EngineHandle {
    config: RetrievalConfig,
    expander: QueryExpander,
    aggregator: PageAggregator,
    semantic: Option<Arc<dyn SemanticProvider>>,
    reranker: Option<Arc<dyn Reranker>>,
    current: RwLock<Option<Arc<Snapshot>>>,
    loads: AtomicU64,
}

impl EngineHandle {
    pub fn new(config: RetrievalConfig, semantic: Option<Arc<dyn SemanticProvider>>, reranker: Option<Arc<dyn Reranker>>) -> Result<Self> {
        config.validate()?;
        let expander = QueryExpander::new(config.expansion.clone())?;
        let aggregator = PageAggregator::new(&config.aggregation)?;
        Ok(Self { config, expander, aggregator, semantic, reranker, current: RwLock::new(None), loads: AtomicU64::new(0) })
    }

    pub fn config(&self) -> &RetrievalConfig { &self.config }

    pub fn load(&self, corpus: Corpus) -> Result<Arc<Snapshot>> { self.load_with_cancel(corpus, &CancellationToken::new()) }

    /// On error or cancellation the previous snapshot stays in place.
    pub fn load_with_cancel(&self, corpus: Corpus, cancel: &CancellationToken) -> Result<Arc<Snapshot>> {
        let snapshot = Arc::new(Snapshot::build(corpus, &self.config, self.semantic.as_deref(), cancel)?);
        cancel.check()?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        let version = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        info!(version, chunks = snapshot.corpus.len(), "swapped in new snapshot");
        Ok(snapshot)
    }

    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone().ok_or(Error::IndexNotBuilt)
    }

    /// Number of successful loads so far.
    pub fn version(&self) -> u64 { self.loads.load(Ordering::SeqCst) }

    pub async fn retrieve(&self, question: &str) -> Result<Retrieval> {
        let snapshot = self.snapshot()?;
        let pipeline = RetrievalPipeline {
            snapshot,
            config: &self.config,
            expander: &self.expander,
            aggregator: &self.aggregator,
            reranker: self.reranker.as_deref(),
        };
        Ok(pipeline.retrieve(question).await)
    }
}
