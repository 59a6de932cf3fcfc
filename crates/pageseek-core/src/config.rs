//! Layered configuration loader and the retrieval tuning knobs.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `PAGESEEK_*`
//! env vars. Nested keys in env vars are separated by `__`, e.g.
//! `PAGESEEK_RETRIEVAL__FUSION__BM25_WEIGHT=0.25`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("PAGESEEK_").split("__"));

        let config = Self { figment };
        config.retrieval()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment.extract_inner(key).map_err(|e| Error::Config(Box::new(e)))
    }

    /// Like [`Config::get`], but an absent key is `Ok(None)`. A key that is
    /// present but malformed or incomplete is still an error.
    pub fn get_opt<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        if !self.figment.contains(key) {
            return Ok(None);
        }
        self.get(key).map(Some)
    }

    /// The `[retrieval]` table layered over defaults, validated.
    pub fn retrieval(&self) -> Result<RetrievalConfig> {
        let figment = Figment::from(Serialized::defaults(RetrievalConfig::default()))
            .merge(self.figment.focus("retrieval"));
        let config: RetrievalConfig = figment.extract().map_err(|e| Error::Config(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    pub k1: f32,
    pub b: f32,
}

impl Default for LexicalConfig {
    fn default() -> Self { Self { k1: 1.5, b: 0.75 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub max_variants: usize,
    pub secondary_weight: f32,
    pub synonym_weight: f32,
    pub max_synonym_variants: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self { Self { max_variants: 5, secondary_weight: 0.6, synonym_weight: 0.5, max_synonym_variants: 2 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Share of the lexical signal; the semantic signal gets the rest.
    pub bm25_weight: f32,
    /// Candidates fetched per signal per variant, and kept after fusion.
    pub initial_k: usize,
}

impl Default for FusionConfig {
    fn default() -> Self { Self { bm25_weight: 0.3, initial_k: 60 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub batch_size: usize,
    pub timeout_ms: u64,
    pub second_pass_k: usize,
    pub fused_blend: f32,
    pub relevance_blend: f32,
}

impl RerankConfig {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self { batch_size: 32, timeout_ms: 10_000, second_pass_k: 30, fused_blend: 0.4, relevance_blend: 0.6 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub boost_factor: f32,
    pub vote_base: f64,
    pub final_k: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self { Self { boost_factor: 1.5, vote_base: 3.0, final_k: 12 } }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub lexical: LexicalConfig,
    pub expansion: ExpansionConfig,
    pub fusion: FusionConfig,
    pub rerank: RerankConfig,
    pub aggregation: AggregationConfig,
}

fn ensure(ok: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if ok { Ok(()) } else { Err(Error::InvalidConfig(msg())) }
}

impl LexicalConfig {
    pub fn validate(&self) -> Result<()> {
        ensure(self.k1.is_finite() && self.k1 >= 0.0, || format!("lexical.k1 must be >= 0, got {}", self.k1))?;
        ensure((0.0..=1.0).contains(&self.b), || format!("lexical.b must be within [0, 1], got {}", self.b))
    }
}

impl ExpansionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure((1..=5).contains(&self.max_variants), || {
            format!("expansion.max_variants must be within [1, 5], got {}", self.max_variants)
        })?;
        for (name, w) in [("secondary_weight", self.secondary_weight), ("synonym_weight", self.synonym_weight)] {
            ensure(w > 0.0 && w <= 1.0, || format!("expansion.{name} must be within (0, 1], got {w}"))?;
        }
        Ok(())
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure((0.0..=1.0).contains(&self.bm25_weight), || {
            format!("fusion.bm25_weight must be within [0, 1], got {}", self.bm25_weight)
        })?;
        ensure(self.initial_k > 0, || "fusion.initial_k must be > 0".to_string())
    }
}

impl RerankConfig {
    pub fn validate(&self) -> Result<()> {
        ensure(self.batch_size > 0, || "rerank.batch_size must be > 0".to_string())?;
        ensure(self.timeout_ms > 0, || "rerank.timeout_ms must be > 0".to_string())?;
        ensure(self.second_pass_k > 0, || "rerank.second_pass_k must be > 0".to_string())?;
        for (name, w) in [("fused_blend", self.fused_blend), ("relevance_blend", self.relevance_blend)] {
            ensure((0.0..=1.0).contains(&w), || format!("rerank.{name} must be within [0, 1], got {w}"))?;
        }
        Ok(())
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<()> {
        ensure(self.boost_factor.is_finite() && self.boost_factor >= 1.0, || {
            format!("aggregation.boost_factor must be >= 1, got {}", self.boost_factor)
        })?;
        ensure(self.vote_base.is_finite() && self.vote_base > 1.0, || {
            format!("aggregation.vote_base must be > 1, got {}", self.vote_base)
        })?;
        ensure(self.final_k > 0, || "aggregation.final_k must be > 0".to_string())?;
        // the rank-0 vote is base^final_k; once that overflows every page ties at inf
        let top_vote = i32::try_from(self.final_k).map_or(f64::INFINITY, |k| self.vote_base.powi(k));
        ensure(top_vote.is_finite(), || {
            format!("aggregation.vote_base^final_k overflows ({}^{})", self.vote_base, self.final_k)
        })
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        self.lexical.validate()?;
        self.expansion.validate()?;
        self.fusion.validate()?;
        self.rerank.validate()?;
        self.aggregation.validate()
    }
}
