//! pageseek-hybrid
//!
//! Query-time half of the engine: fuses lexical and semantic evidence across
//! query variants, widens the candidate set with neighboring chunks, reranks
//! and votes the result down to a single source page. [`evaluate`] scores
//! attribution against a labelled question set.

pub mod aggregate;
pub mod context;
pub mod engine;
pub mod eval;
pub mod fuse;
pub mod pipeline;
pub mod rerank;

pub use aggregate::{Aggregation, PageAggregator};
pub use context::expand_context;
pub use engine::EngineHandle;
pub use eval::{evaluate, load_eval_set, CaseResult, EvalCase, EvalReport};
pub use fuse::{FuseOutcome, HybridFuser};
pub use pipeline::{DegradedFlags, Retrieval, RetrievalPipeline, RetrievedChunk, Snapshot};
pub use rerank::{RerankCandidate, RerankOutcome, RerankerAdapter};
