use common::{error::AppError, storage::state::StoreAction};
use state_machines::core::GuardError;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::{
    context::PipelineContext,
    services::ExtractionOutput,
    state::{Analyzed, Applied, Extracted, IngestionMachine, Queued},
};

#[instrument(
    level = "trace",
    skip_all,
    fields(task_id = %ctx.task_id, document_id = %ctx.document_id)
)]
pub async fn extract_content(
    machine: IngestionMachine<(), Queued>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Extracted>, AppError> {
    let call = ctx.services.extract(&ctx.task.file, &ctx.task.mime_type);
    let output = match ctx.pipeline_config.tuning.extraction_timeout {
        Some(limit) => timeout(limit, call).await.map_err(|_| {
            AppError::Transport(format!(
                "extraction timed out after {}ms",
                limit.as_millis()
            ))
        })??,
        None => call.await?,
    };

    let text_chars = output.content.text.chars().count();
    let preview: String = output
        .content
        .text
        .chars()
        .take(ctx.pipeline_config.tuning.preview_chars)
        .collect();
    let preview_clean = preview.replace('\n', " ");

    tracing::info!(
        task_id = %ctx.task_id,
        document_id = %ctx.document_id,
        mime_type = %ctx.task.mime_type,
        text_chars,
        sections = output.content.section_count(),
        tables = output.content.tables.len(),
        code_blocks = output.content.code_blocks.len(),
        "ingestion extraction finished"
    );
    debug!(
        task_id = %ctx.task_id,
        preview = %preview_clean,
        preview_truncated = text_chars > ctx.pipeline_config.tuning.preview_chars,
        "ingestion extraction preview"
    );

    ctx.extraction = Some(output);

    machine
        .extract()
        .map_err(|(_, guard)| map_guard_error("extract", &guard))
}

/// Fills metadata counts the extractor left unset.
#[instrument(
    level = "trace",
    skip_all,
    fields(task_id = %ctx.task_id, document_id = %ctx.document_id)
)]
pub async fn analyze_content(
    machine: IngestionMachine<(), Extracted>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Analyzed>, AppError> {
    let extraction = ctx.take_extraction()?;
    let metadata = extraction
        .metadata
        .with_derived_counts(&extraction.content);

    if extraction.content.is_empty() {
        warn!(
            task_id = %ctx.task_id,
            document_id = %ctx.document_id,
            "extraction produced no content"
        );
    }

    debug!(
        task_id = %ctx.task_id,
        words = metadata.word_count.unwrap_or_default(),
        pages = metadata.page_count.unwrap_or_default(),
        "ingestion metadata derived"
    );

    ctx.extraction = Some(ExtractionOutput {
        content: extraction.content,
        metadata,
    });

    machine
        .analyze()
        .map_err(|(_, guard)| map_guard_error("analyze", &guard))
}

/// Lands the extracted content on the document in one store transition.
#[instrument(
    level = "trace",
    skip_all,
    fields(task_id = %ctx.task_id, document_id = %ctx.document_id)
)]
pub async fn apply_result(
    machine: IngestionMachine<(), Analyzed>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Applied>, AppError> {
    let extraction = ctx.take_extraction()?;

    ctx.store.dispatch(StoreAction::CompleteIngestion {
        id: ctx.document_id.clone(),
        content: extraction.content,
        metadata: extraction.metadata,
    })?;

    machine
        .apply()
        .map_err(|(_, guard)| map_guard_error("apply", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid ingestion pipeline transition during {event}: {guard:?}"
    ))
}
