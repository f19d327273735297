pub mod config;
pub mod identity;
pub mod ingest_limits;
