use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pageseek_core::config::Config;
use pageseek_core::traits::{Reranker, SemanticProvider};
use pageseek_core::types::Corpus;
use pageseek_hybrid::{evaluate, load_eval_set, EngineHandle, EvalReport, Retrieval};
use pageseek_rerank::{HttpRerankConfig, HttpReranker};
use pageseek_vector::{FlatIndexProvider, HashEmbedder};

const USAGE: &str = "Usage: pageseek <query|batch|eval> [--json] [--corpus <chunks.json>] <question | questions.txt | evaluation_set.json>";

struct Args {
    cmd: String,
    json: bool,
    corpus: Option<PathBuf>,
    rest: Vec<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = env::args().skip(1);
    let Some(cmd) = args.next() else { bail!(USAGE) };
    let mut parsed = Args { cmd, json: false, corpus: None, rest: Vec::new() };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => parsed.json = true,
            "--corpus" | "-c" => parsed.corpus = Some(args.next().map(PathBuf::from).context("--corpus requires a path")?),
            _ => parsed.rest.push(arg),
        }
    }
    Ok(parsed)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer().with_target(false).with_writer(std::io::stderr)).with(filter).init();
}

fn build_engine(config: &Config) -> anyhow::Result<EngineHandle> {
    let dim: usize = config.get_opt("semantic.dim")?.unwrap_or(1024);
    let semantic: Arc<dyn SemanticProvider> = Arc::new(FlatIndexProvider::new(Arc::new(HashEmbedder::new(dim))));
    let reranker: Option<Arc<dyn Reranker>> = match config.get_opt::<HttpRerankConfig>("reranker")? {
        Some(cfg) => {
            info!(api_base = %cfg.api_base, model = %cfg.model, "using http reranker");
            Some(Arc::new(HttpReranker::new(&cfg)?))
        }
        None => None,
    };
    Ok(EngineHandle::new(config.retrieval()?, Some(semantic), reranker)?)
}

fn print_retrieval(question: &str, retrieval: &Retrieval, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(&serde_json::json!({ "question": question, "retrieval": retrieval }))?);
        return Ok(());
    }
    println!("\nQuestion: {question}");
    println!("Page: {}", retrieval.attribution.page_number());
    if retrieval.degraded.semantic || retrieval.degraded.rerank {
        println!("Degraded: semantic={} rerank={}", retrieval.degraded.semantic, retrieval.degraded.rerank);
    }
    for (i, chunk) in retrieval.chunks.iter().enumerate() {
        let preview: String = chunk.text.chars().take(120).collect();
        println!("  {}. score={:.4}  page={}  id={}  {}", i + 1, chunk.score, chunk.page, chunk.chunk_id, preview);
    }
    Ok(())
}

fn print_report(report: &EvalReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }
    for (i, case) in report.cases.iter().enumerate() {
        let status = if case.distance == Some(0) { "correct".to_string() } else { format!("predicted {}", case.predicted) };
        let preview: String = case.question.chars().take(60).collect();
        println!("({}/{}) {preview} | actual {} | {status}", i + 1, report.total, case.expected);
    }
    println!("\nQuestions:          {}", report.total);
    for (label, hits) in [("Exact", report.exact), ("Within 2 pages", report.within_2), ("Within 5 pages", report.within_5), ("Within 10 pages", report.within_10)] {
        println!("{label:<19} {hits}/{} = {:.1}%", report.total, report.percent(hits));
    }
    println!("Unattributed:       {}", report.unattributed);
    println!("Average latency:    {:.1} ms", report.avg_latency_ms);
    println!("Total time:         {:.2} s", report.total_latency_ms / 1000.0);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().context("loading configuration")?;
    let args = parse_args()?;

    let corpus_path = match args.corpus.clone() {
        Some(path) => path,
        None => PathBuf::from(config.get_opt::<String>("data.corpus_path")?.unwrap_or_else(|| "data/chunks.json".to_string())),
    };
    let corpus = Corpus::from_json_reader(BufReader::new(File::open(&corpus_path).with_context(|| format!("opening {}", corpus_path.display()))?))?;
    info!(chunks = corpus.len(), path = %corpus_path.display(), "loaded corpus");

    let engine = build_engine(&config)?;
    engine.load(corpus)?;

    match args.cmd.as_str() {
        "query" => {
            if args.rest.is_empty() {
                bail!(USAGE);
            }
            let question = args.rest.join(" ");
            let retrieval = engine.retrieve(&question).await?;
            print_retrieval(&question, &retrieval, args.json)?;
        }
        "batch" => {
            let Some(path) = args.rest.first() else { bail!(USAGE) };
            let questions = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            let mut unattributed = 0usize;
            for question in questions.lines().map(str::trim).filter(|q| !q.is_empty()) {
                let retrieval = engine.retrieve(question).await?;
                if retrieval.attribution.page.is_none() {
                    unattributed += 1;
                }
                print_retrieval(question, &retrieval, args.json)?;
            }
            if unattributed > 0 {
                warn!(unattributed, "some questions had no supporting page");
            }
        }
        "eval" => {
            let Some(path) = args.rest.first() else { bail!(USAGE) };
            let cases = load_eval_set(BufReader::new(File::open(path).with_context(|| format!("opening {path}"))?))?;
            info!(questions = cases.len(), path = %path, "loaded evaluation set");
            let report = evaluate(&engine, &cases).await?;
            print_report(&report, args.json)?;
        }
        other => bail!("unknown command: {other}\n{USAGE}"),
    }
    Ok(())
}
