use std::fs::File;
use std::io::{BufReader, Write};

use pageseek_core::config::RetrievalConfig;
use pageseek_core::types::{Chunk, Corpus};
use pageseek_core::Error;
use pageseek_hybrid::{evaluate, load_eval_set, EngineHandle};

fn write_set(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn engine() -> EngineHandle {
    let engine = EngineHandle::new(RetrievalConfig::default(), None, None).unwrap();
    engine
        .load(
            Corpus::new(vec![
                Chunk::new(1, "Engine oil capacity is 4.5 quarts.", 10, 0),
                Chunk::new(2, "Tire pressure should be 35 psi when cold.", 40, 1),
                Chunk::new(3, "Brake fluid must meet DOT 3.", 22, 2),
            ])
            .unwrap(),
        )
        .unwrap();
    engine
}

#[tokio::test]
async fn reports_exact_and_tolerant_accuracy() {
    let file = write_set(
        r#"{
            "questions": [
                { "id": 1, "question": "engine oil capacity", "correct_page_number": 10 },
                { "id": 2, "question": "tire pressure", "correct_page_number": 43 },
                { "id": "q3", "question": "transmission", "correct_page_number": 5 }
            ]
        }"#,
    );
    let cases = load_eval_set(BufReader::new(File::open(file.path()).unwrap())).unwrap();
    assert_eq!(cases.len(), 3);

    let report = evaluate(&engine(), &cases).await.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.cases[0].predicted, 10);
    assert_eq!(report.cases[1].distance, Some(3));
    assert_eq!(report.cases[2].predicted, -1);
    assert_eq!((report.exact, report.within_2, report.within_5, report.within_10), (1, 1, 2, 2));
    assert_eq!(report.unattributed, 1);
    assert!(report.avg_latency_ms >= 0.0);
    assert!((report.total_latency_ms - report.cases.iter().map(|c| c.latency_ms).sum::<f64>()).abs() < 1e-9);
}

#[test]
fn ids_are_optional() {
    let file = write_set(r#"{ "questions": [{ "question": "brake fluid", "correct_page_number": 22 }] }"#);
    let cases = load_eval_set(File::open(file.path()).unwrap()).unwrap();
    assert!(cases[0].id.is_none());
}

#[test]
fn malformed_sets_are_json_errors() {
    for body in [r#"{ "items": [] }"#, r#"{ "questions": [{ "question": "brake" }] }"#, "not json"] {
        let file = write_set(body);
        assert!(matches!(load_eval_set(File::open(file.path()).unwrap()), Err(Error::Json(_))));
    }
}

#[tokio::test]
async fn evaluation_before_load_fails() {
    let engine = EngineHandle::new(RetrievalConfig::default(), None, None).unwrap();
    let cases = load_eval_set(r#"{ "questions": [{ "question": "brake", "correct_page_number": 1 }] }"#.as_bytes()).unwrap();
    assert!(matches!(evaluate(&engine, &cases).await, Err(Error::IndexNotBuilt)));
}
