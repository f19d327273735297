use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use common::{
    storage::{
        queue::ingestion_queue,
        repository::DocumentRepository,
        store::KnowledgeStore,
        types::{
            document::DocumentStatus,
            query::{Query, QueryKind},
            uploaded_file::UploadedFile,
        },
    },
    utils::config::{get_config, AppConfig},
};
use futures::future::try_join_all;
use ingestion_pipeline::{pipeline::IngestionPipeline, run_worker_loop};
use retrieval_pipeline::{QueryEngine, QueryRequest};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Text,
    Multimodal,
    Code,
    Data,
}

impl From<KindArg> for QueryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Text => QueryKind::Text,
            KindArg::Multimodal => QueryKind::Multimodal,
            KindArg::Code => QueryKind::Code,
            KindArg::Data => QueryKind::Data,
        }
    }
}

/// Upload files into an in-memory knowledge base and optionally query it.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Files to upload.
    files: Vec<PathBuf>,
    /// Query to run once ingestion has finished.
    #[arg(short, long)]
    query: Option<String>,
    /// Restrict the query to these document ids (default: all documents).
    #[arg(long = "document")]
    documents: Vec<String>,
    #[arg(long, value_enum, default_value = "text")]
    kind: KindArg,
    /// Minimum relevance score in [0, 1].
    #[arg(long, env = "RELEVANCE_THRESHOLD")]
    threshold: Option<f32>,
    #[arg(long, env = "MAX_RESULTS")]
    max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
struct DocumentSummary {
    id: String,
    title: String,
    file_type: String,
    status: DocumentStatus,
    sections: usize,
    words: usize,
}

#[derive(Debug, Serialize)]
struct Report {
    documents: Vec<DocumentSummary>,
    query: Option<Query>,
    error: Option<String>,
}

async fn load_upload(path: PathBuf) -> anyhow::Result<UploadedFile> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedFile::new(filename, bytes))
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<Report> {
    let store = KnowledgeStore::new();
    let (queue, receiver) = ingestion_queue();
    let repository = DocumentRepository::new(store.clone(), config.clone(), queue);
    let pipeline = Arc::new(IngestionPipeline::new(store.clone(), &config));
    let worker = tokio::spawn(run_worker_loop(receiver, pipeline));

    let uploads = try_join_all(cli.files.into_iter().map(load_upload)).await?;
    let mut uploaded = Vec::with_capacity(uploads.len());
    for file in uploads {
        let filename = file.filename.clone();
        match repository.upload_document(file) {
            Ok(id) => uploaded.push(id),
            Err(err) => warn!(%filename, error = %err, "upload rejected"),
        }
    }

    // Closing the queue lets the worker finish once in-flight ingestions land.
    drop(repository);
    worker.await??;
    info!(documents = uploaded.len(), "ingestion finished");

    let query = match cli.query {
        Some(text) => {
            let engine = QueryEngine::new(store.clone(), &config);
            let mut filters = engine.default_filters();
            if let Some(threshold) = cli.threshold {
                filters.relevance_threshold = threshold;
            }
            if let Some(max_results) = cli.max_results {
                filters.max_results = max_results;
            }
            let query_id = engine
                .execute(QueryRequest {
                    text,
                    document_ids: cli.documents,
                    kind: cli.kind.into(),
                    filters,
                })
                .await?;
            store.query(&query_id).map(|query| (*query).clone())
        }
        None => None,
    };

    let documents = store
        .documents()
        .iter()
        .map(|doc| DocumentSummary {
            id: doc.id.clone(),
            title: doc.title.clone(),
            file_type: doc.file_type.clone(),
            status: doc.status,
            sections: doc.content.section_count(),
            words: doc.content.word_count(),
        })
        .collect();

    Ok(Report {
        documents,
        query,
        error: store.error(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = get_config()?;

    let report = run(cli, config).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
