mod config;
mod context;
mod services;
mod stages;
mod state;

pub use config::{IngestionConfig, IngestionTuning};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultExtractionService, ExtractionOutput, ExtractionService};

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{
        state::StoreAction, store::KnowledgeStore, types::ingestion_task::IngestionTask,
    },
    utils::config::AppConfig,
};
use tracing::{debug, info, warn};

use self::{
    context::PipelineContext,
    stages::{analyze_content, apply_result, extract_content},
    state::queued,
};

/// Drives one uploaded document from `processing` to `ready` or `error`.
#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    store: KnowledgeStore,
    pipeline_config: IngestionConfig,
    services: Arc<dyn ExtractionService>,
}

impl IngestionPipeline {
    pub fn new(store: KnowledgeStore, config: &AppConfig) -> Self {
        Self::with_services(
            store,
            IngestionConfig::from_app_config(config),
            Arc::new(DefaultExtractionService),
        )
    }

    pub fn with_services(
        store: KnowledgeStore,
        pipeline_config: IngestionConfig,
        services: Arc<dyn ExtractionService>,
    ) -> Self {
        Self {
            store,
            pipeline_config,
            services,
        }
    }

    /// Runs ingestion for one task. A failure moves the document to `error`
    /// and is reported on the error channel before being returned; a document
    /// deleted while it was being ingested is skipped.
    #[tracing::instrument(
        skip_all,
        fields(task_id = %task.id, document_id = %task.document_id)
    )]
    pub async fn process_task(&self, task: IngestionTask) -> Result<(), AppError> {
        if self.store.document(&task.document_id).is_none() {
            warn!(
                task_id = %task.id,
                document_id = %task.document_id,
                "document removed before ingestion started; skipping"
            );
            return Ok(());
        }

        match self.drive_pipeline(&task).await {
            Ok(()) => {
                info!(
                    task_id = %task.id,
                    document_id = %task.document_id,
                    "ingestion task succeeded"
                );
                Ok(())
            }
            Err(err) if self.store.document(&task.document_id).is_none() => {
                warn!(
                    task_id = %task.id,
                    document_id = %task.document_id,
                    error = %err,
                    "document removed during ingestion; result discarded"
                );
                Ok(())
            }
            Err(err) => {
                self.mark_failed(&task.document_id, &task.file.filename, &err);
                warn!(
                    task_id = %task.id,
                    document_id = %task.document_id,
                    error = %err,
                    "ingestion task failed; document marked as error"
                );
                Err(err)
            }
        }
    }

    /// Moves a document that is still `processing` to `error` and reports the
    /// failure on the error channel.
    pub fn mark_failed(&self, document_id: &str, filename: &str, cause: &dyn fmt::Display) {
        let reason = format!("Failed to process document {filename}: {cause}");
        if let Err(apply_err) = self.store.dispatch(StoreAction::FailIngestion {
            id: document_id.to_owned(),
            reason,
        }) {
            debug!(
                %document_id,
                error = %apply_err,
                "could not mark document as failed"
            );
        }
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    async fn drive_pipeline(&self, task: &IngestionTask) -> Result<(), AppError> {
        let mut ctx = PipelineContext::new(
            task,
            &self.store,
            &self.pipeline_config,
            self.services.as_ref(),
        );

        let machine = queued();
        let pipeline_started = Instant::now();

        let stage_start = Instant::now();
        let machine = extract_content(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let extract_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = analyze_content(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let analyze_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let _machine = apply_result(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let apply_duration = stage_start.elapsed();

        info!(
            task_id = %ctx.task_id,
            document_id = %ctx.document_id,
            total_ms = Self::duration_millis(pipeline_started.elapsed()),
            extract_ms = Self::duration_millis(extract_duration),
            analyze_ms = Self::duration_millis(analyze_duration),
            apply_ms = Self::duration_millis(apply_duration),
            "ingestion pipeline finished"
        );

        Ok(())
    }
}
