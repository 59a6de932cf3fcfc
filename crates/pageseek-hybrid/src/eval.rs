//! Page-attribution accuracy over a labelled question set.
//!
//! The set is `{"questions": [{"id", "question", "correct_page_number"}]}`.
//! Each question runs through the engine once; the report counts exact hits
//! and hits within ±2, ±5 and ±10 pages, plus per-question latency.

use std::io::Read;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pageseek_core::Result;

use crate::engine::EngineHandle;
use crate::pipeline::DegradedFlags;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub question: String,
    pub correct_page_number: i64,
}

#[derive(Debug, Deserialize)]
struct EvalSet {
    questions: Vec<EvalCase>,
}

pub fn load_eval_set<R: Read>(reader: R) -> Result<Vec<EvalCase>> {
    let set: EvalSet = serde_json::from_reader(reader)?;
    Ok(set.questions)
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub id: Option<serde_json::Value>,
    pub question: String,
    pub expected: i64,
    /// `-1` when nothing was attributed.
    pub predicted: i64,
    /// `None` when nothing was attributed; such cases miss every tolerance.
    pub distance: Option<u64>,
    pub latency_ms: f64,
    pub degraded: DegradedFlags,
}

impl CaseResult {
    fn within(&self, pages: u64) -> bool { self.distance.is_some_and(|d| d <= pages) }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EvalReport {
    pub total: usize,
    pub exact: usize,
    pub within_2: usize,
    pub within_5: usize,
    pub within_10: usize,
    pub unattributed: usize,
    pub avg_latency_ms: f64,
    pub total_latency_ms: f64,
    pub cases: Vec<CaseResult>,
}

impl EvalReport {
    fn from_cases(cases: Vec<CaseResult>) -> Self {
        let count = |pages| cases.iter().filter(|c| c.within(pages)).count();
        let total_latency_ms: f64 = cases.iter().map(|c| c.latency_ms).sum();
        Self {
            total: cases.len(),
            exact: count(0),
            within_2: count(2),
            within_5: count(5),
            within_10: count(10),
            unattributed: cases.iter().filter(|c| c.distance.is_none()).count(),
            avg_latency_ms: if cases.is_empty() { 0.0 } else { total_latency_ms / cases.len() as f64 },
            total_latency_ms,
            cases,
        }
    }

    /// `hits` as a percentage of all questions; 0 for an empty set.
    pub fn percent(&self, hits: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            hits as f64 * 100.0 / self.total as f64
        }
    }
}

/// Runs every case in order against the engine's current snapshot.
pub async fn evaluate(engine: &EngineHandle, cases: &[EvalCase]) -> Result<EvalReport> {
    let mut results = Vec::with_capacity(cases.len());
    for case in cases {
        let started = Instant::now();
        let retrieval = engine.retrieve(&case.question).await?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let predicted = retrieval.attribution.page_number();
        let distance = retrieval.attribution.page.map(|page| i64::from(page).abs_diff(case.correct_page_number));
        debug!(question = %case.question, expected = case.correct_page_number, predicted, latency_ms, "evaluated");
        results.push(CaseResult {
            id: case.id.clone(),
            question: case.question.clone(),
            expected: case.correct_page_number,
            predicted,
            distance,
            latency_ms,
            degraded: retrieval.degraded,
        });
    }
    let report = EvalReport::from_cases(results);
    info!(total = report.total, exact = report.exact, within_2 = report.within_2, within_5 = report.within_5, "evaluation finished");
    Ok(report)
}
