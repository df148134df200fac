use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use contextdb_core::config::Config;
use contextdb_core::data_processor::DataProcessor;
use contextdb_engine::{IdFilter, RetrievalEngine};

const INGEST_BATCH: usize = 256;

#[derive(Parser)]
#[command(name = "contextdb", version, about = "Index contract text and retrieve ranked passages")]
struct Cli {
    /// More log output (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index every .txt file under DIR
    Ingest {
        dir: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Ranked passages for a query
    Query {
        text: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Restrict to these document ids (repeatable)
        #[arg(long = "doc")]
        docs: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Prompt-ready context with citations
    Context {
        question: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long = "doc")]
        docs: Vec<String>,
    },
    /// Remove a document by id
    Delete { id: String },
    /// Active backend and document count
    Stats,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose { 0 => "info", 1 => "debug", _ => "trace" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

fn id_filter(docs: Vec<String>) -> Option<IdFilter> {
    if docs.is_empty() { None } else { Some(docs.into_iter().collect()) }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("loading configuration")?;
    let engine = RetrievalEngine::new(config.retrieval()?).await?;

    match cli.command {
        Command::Ingest { dir, limit } => {
            let processor = DataProcessor::new();
            let docs = match limit {
                Some(n) => processor.process_directory_limited(&dir, n)?,
                None => processor.process_directory(&dir)?,
            };
            let pb = ProgressBar::new(docs.len() as u64);
            pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?.progress_chars("#>-"));
            let total = docs.len();
            let mut docs = docs.into_iter().peekable();
            while docs.peek().is_some() {
                let batch: Vec<_> = docs.by_ref().take(INGEST_BATCH).collect();
                let n = batch.len() as u64;
                engine.add_documents(batch).await?;
                pb.inc(n);
            }
            pb.finish_and_clear();
            info!(chunks = total, backend = %engine.state(), "ingest complete");
        }
        Command::Query { text, top_k, docs, json } => {
            let filter = id_filter(docs);
            let hits = engine.search(&text, top_k.unwrap_or_else(|| engine.default_top_k()), filter.as_ref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                for (rank, hit) in hits.iter().enumerate() {
                    let preview: String = hit.text.chars().take(160).collect();
                    println!("{:>2}. {:.4} {}  {}", rank + 1, hit.score, hit.id, preview.replace('\n', " "));
                }
                if hits.is_empty() { println!("no matches"); }
            }
        }
        Command::Context { question, top_k, docs } => {
            let filter = id_filter(docs);
            let ctx = engine.retrieve_context(&question, top_k.unwrap_or_else(|| engine.default_top_k()), filter.as_ref()).await?;
            println!("{}", ctx.text);
            eprintln!("{}", serde_json::to_string_pretty(&ctx.citations)?);
        }
        Command::Delete { id } => {
            engine.delete_document(&id).await?;
            info!(doc_id = %id, "deleted");
        }
        Command::Stats => {
            println!("backend: {}", engine.state());
            println!("documents: {}", engine.document_count().await);
        }
    }
    Ok(())
}
