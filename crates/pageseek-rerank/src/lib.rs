//! Cross-encoder reranking over HTTP.
//!
//! Speaks the common `/rerank` JSON shape: the request carries
//! `{model, query, documents}` and the response lists
//! `{index, relevance_score}` (or `score`) entries under `results` or `data`.

use std::time::Duration;

use anyhow::{anyhow, ensure, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use pageseek_core::traits::Reranker;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRerankConfig {
    pub api_base: String,
    #[serde(default = "default_path")]
    pub path: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_path() -> String { "/rerank".to_string() }

fn default_timeout_ms() -> u64 { 10_000 }

pub struct HttpReranker {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpReranker {
    pub fn new(cfg: &HttpRerankConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
        let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);
        Ok(Self { client, url, model: cfg.model.clone(), api_key: cfg.api_key.clone() })
    }

    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "model": self.model, "query": query, "documents": documents });
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response: RerankResponse = req.send().await?.error_for_status()?.json().await?;
        align_scores(response, documents.len())
    }
}

impl Reranker for HttpReranker {
    fn score<'a>(&'a self, query: &'a str, documents: &'a [String]) -> BoxFuture<'a, Result<Vec<f32>>> {
        Box::pin(self.rerank(query, documents))
    }
}

/// Body of a `/rerank` reply. Some servers name the list `data` and the
/// score `score`.
#[derive(Debug, Deserialize)]
pub struct RerankResponse {
    #[serde(alias = "data")]
    pub results: Vec<RerankHit>,
}

#[derive(Debug, Deserialize)]
pub struct RerankHit {
    pub index: usize,
    #[serde(alias = "score")]
    pub relevance_score: f32,
}

/// Puts the scores back in document order. Every document must be scored
/// exactly once.
pub fn align_scores(response: RerankResponse, doc_count: usize) -> Result<Vec<f32>> {
    let mut slots: Vec<Option<f32>> = vec![None; doc_count];
    for hit in response.results {
        let slot = slots
            .get_mut(hit.index)
            .ok_or_else(|| anyhow!("rerank result index {} out of range for {doc_count} documents", hit.index))?;
        ensure!(slot.is_none(), "rerank result index {} appears twice", hit.index);
        *slot = Some(hit.relevance_score);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, score)| score.ok_or_else(|| anyhow!("rerank response has no score for document {i}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn align(body: serde_json::Value, doc_count: usize) -> Result<Vec<f32>> {
        align_scores(serde_json::from_value(body)?, doc_count)
    }

    #[test]
    fn reorders_hits_into_document_order() {
        let body = serde_json::json!({
            "results": [
                { "index": 2, "relevance_score": -1.5 },
                { "index": 0, "relevance_score": 4.0 },
                { "index": 1, "relevance_score": 0.25 }
            ]
        });
        assert_eq!(align(body, 3).unwrap(), vec![4.0, 0.25, -1.5]);
    }

    #[test]
    fn accepts_data_and_score_aliases() {
        let body = serde_json::json!({ "data": [{ "index": 0, "score": -3.5 }] });
        assert_eq!(align(body, 1).unwrap(), vec![-3.5]);
    }

    #[test]
    fn partial_replies_are_errors() {
        assert!(align(serde_json::json!({ "results": [] }), 3).is_err());
        let one = serde_json::json!({ "results": [{ "index": 0, "relevance_score": -4.0 }] });
        assert!(align(one, 3).is_err());
    }

    #[test]
    fn duplicate_and_out_of_range_indexes_are_errors() {
        let twice = serde_json::json!({
            "results": [{ "index": 0, "relevance_score": 1.0 }, { "index": 0, "relevance_score": 2.0 }]
        });
        assert!(align(twice, 2).is_err());
        let beyond = serde_json::json!({ "results": [{ "index": 5, "relevance_score": 1.0 }] });
        assert!(align(beyond, 1).is_err());
    }

    #[test]
    fn malformed_bodies_do_not_deserialize() {
        assert!(align(serde_json::json!({ "oops": [] }), 1).is_err());
        assert!(align(serde_json::json!({ "results": [{ "score": 1.0 }] }), 1).is_err());
    }

    #[test]
    fn config_defaults() {
        let cfg: HttpRerankConfig =
            serde_json::from_value(serde_json::json!({ "api_base": "http://localhost:8080/", "model": "ms-marco" })).unwrap();
        assert_eq!(cfg.path, "/rerank");
        assert_eq!(cfg.timeout_ms, 10_000);
        let reranker = HttpReranker::new(&cfg).unwrap();
        assert_eq!(reranker.url, "http://localhost:8080/rerank");
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let cfg = HttpRerankConfig {
            api_base: format!("http://{addr}"),
            path: default_path(),
            model: "test".to_string(),
            api_key: None,
            timeout_ms: 100,
        };
        let reranker = HttpReranker::new(&cfg).unwrap();
        let docs = vec!["brake fluid".to_string()];
        assert!(reranker.score("brake", &docs).await.is_err());
    }

    /// Answers one request with `body` once the whole request has arrived.
    async fn serve_once(body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_lowercase();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if n == 0 || request.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn reranker_at(api_base: String) -> HttpReranker {
        HttpReranker::new(&HttpRerankConfig { api_base, path: default_path(), model: "test".to_string(), api_key: None, timeout_ms: 2_000 }).unwrap()
    }

    #[tokio::test]
    async fn partial_server_reply_fails_the_call() {
        let api_base = serve_once(r#"{"results":[{"index":1,"relevance_score":-2.0}]}"#).await;
        let docs = vec!["brake fluid".to_string(), "brake pads".to_string(), "radio".to_string()];
        assert!(reranker_at(api_base).score("brake", &docs).await.is_err());
    }

    #[tokio::test]
    async fn complete_server_reply_is_aligned() {
        let api_base = serve_once(r#"{"data":[{"index":1,"score":0.5},{"index":0,"score":-2.0}]}"#).await;
        let docs = vec!["brake fluid".to_string(), "brake pads".to_string()];
        assert_eq!(reranker_at(api_base).score("brake", &docs).await.unwrap(), vec![-2.0, 0.5]);
    }
}
