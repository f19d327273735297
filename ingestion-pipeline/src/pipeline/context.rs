use common::{
    error::AppError,
    storage::{store::KnowledgeStore, types::ingestion_task::IngestionTask},
};
use tracing::error;

use super::{
    config::IngestionConfig,
    services::{ExtractionOutput, ExtractionService},
};

pub struct PipelineContext<'a> {
    pub task: &'a IngestionTask,
    pub task_id: String,
    pub document_id: String,
    pub store: &'a KnowledgeStore,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn ExtractionService,
    pub extraction: Option<ExtractionOutput>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        task: &'a IngestionTask,
        store: &'a KnowledgeStore,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn ExtractionService,
    ) -> Self {
        Self {
            task,
            task_id: task.id.clone(),
            document_id: task.document_id.clone(),
            store,
            pipeline_config,
            services,
            extraction: None,
        }
    }

    pub fn take_extraction(&mut self) -> Result<ExtractionOutput, AppError> {
        self.extraction.take().ok_or_else(|| {
            AppError::InternalError("extraction output expected to be available".into())
        })
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            task_id = %self.task_id,
            document_id = %self.document_id,
            error = %err,
            "ingestion pipeline aborted"
        );
        err
    }
}
