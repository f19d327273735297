pub mod document;
pub mod document_content;
pub mod ingestion_task;
pub mod query;
pub mod uploaded_file;

/// Entity kept in one of the store's collections, addressed by a unique id.
pub trait StoredObject: Clone {
    fn collection_name() -> &'static str;
    fn get_id(&self) -> &str;
}

/// Generates a collision-free identifier for a new entity.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
