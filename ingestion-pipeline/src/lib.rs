#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod pipeline;
pub mod utils;

use std::sync::Arc;

use common::{
    error::AppError,
    storage::{queue::IngestionReceiver, types::ingestion_task::IngestionTask},
};
pub use pipeline::{
    DefaultExtractionService, ExtractionOutput, ExtractionService, IngestionConfig,
    IngestionPipeline, IngestionTuning,
};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info};

/// Drains the ingestion queue, running each task on its own tokio task so
/// ingestions of different documents proceed independently. Returns once the
/// queue is closed and every started ingestion has finished.
pub async fn run_worker_loop(
    mut receiver: IngestionReceiver,
    ingestion_pipeline: Arc<IngestionPipeline>,
) -> Result<(), AppError> {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            next = receiver.next() => {
                let Some(task) = next else { break };
                info!(
                    task_id = %task.id,
                    document_id = %task.document_id,
                    "claimed ingestion task"
                );
                in_flight.spawn(supervise_task(Arc::clone(&ingestion_pipeline), task));
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                log_join_failure(joined);
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        log_join_failure(joined);
    }

    info!("ingestion queue closed; worker stopped");
    Ok(())
}

/// Runs one ingestion on a child task. A panic inside the pipeline leaves the
/// worker running and moves the document to `error`.
async fn supervise_task(pipeline: Arc<IngestionPipeline>, task: IngestionTask) {
    let task_id = task.id.clone();
    let document_id = task.document_id.clone();
    let filename = task.file.filename.clone();

    let child = Arc::clone(&pipeline);
    match tokio::spawn(async move { child.process_task(task).await }).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!(%task_id, %document_id, error = %err, "ingestion task failed");
        }
        Err(join_err) => {
            error!(%task_id, %document_id, error = %join_err, "ingestion task aborted");
            pipeline.mark_failed(&document_id, &filename, &join_err);
        }
    }
}

fn log_join_failure(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "ingestion supervisor task aborted");
    }
}
