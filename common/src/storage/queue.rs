use tokio::sync::mpsc;

use crate::error::AppError;

use super::types::ingestion_task::IngestionTask;

/// Producer half of the ingestion work queue, held by the repository.
#[derive(Clone, Debug)]
pub struct IngestionQueue {
    sender: mpsc::UnboundedSender<IngestionTask>,
}

/// Consumer half, drained by the ingestion worker loop.
#[derive(Debug)]
pub struct IngestionReceiver {
    receiver: mpsc::UnboundedReceiver<IngestionTask>,
}

pub fn ingestion_queue() -> (IngestionQueue, IngestionReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (IngestionQueue { sender }, IngestionReceiver { receiver })
}

impl IngestionQueue {
    pub fn enqueue(&self, task: IngestionTask) -> Result<(), AppError> {
        self.sender
            .send(task)
            .map_err(|err| AppError::InternalError(format!("ingestion queue closed: {err}")))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl IngestionReceiver {
    /// Next queued task, or `None` once every producer has been dropped.
    pub async fn next(&mut self) -> Option<IngestionTask> {
        self.receiver.recv().await
    }

    pub fn close(&mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::uploaded_file::UploadedFile;

    fn task(document_id: &str) -> IngestionTask {
        IngestionTask::new(
            document_id.into(),
            UploadedFile::new("notes.txt", b"hello".to_vec()),
            "text/plain".into(),
        )
    }

    #[tokio::test]
    async fn delivers_in_order_and_ends_when_producers_drop() {
        let (queue, mut receiver) = ingestion_queue();
        queue.enqueue(task("a")).expect("enqueue");
        queue.enqueue(task("b")).expect("enqueue");
        drop(queue);

        assert_eq!(receiver.next().await.map(|t| t.document_id), Some("a".into()));
        assert_eq!(receiver.next().await.map(|t| t.document_id), Some("b".into()));
        assert!(receiver.next().await.is_none());
    }

    #[tokio::test]
    async fn enqueue_fails_after_receiver_closes() {
        let (queue, mut receiver) = ingestion_queue();
        receiver.close();

        assert!(queue.is_closed());
        let err = queue.enqueue(task("a")).expect_err("closed");
        assert!(matches!(err, AppError::InternalError(_)));
    }
}
