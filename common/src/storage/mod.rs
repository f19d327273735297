pub mod queue;
pub mod repository;
pub mod state;
pub mod store;
pub mod types;
