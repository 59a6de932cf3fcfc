//! Reference semantic provider.
//!
//! Production deployments plug a model-backed provider in through
//! `pageseek_core::traits::SemanticProvider`; this crate ships a
//! dependency-light one built on a hashing embedder and exact cosine search.

pub mod embed;
pub mod flat;

pub use embed::HashEmbedder;
pub use flat::{FlatIndex, FlatIndexProvider};
