pub mod lexical;
pub mod pipeline;
pub mod scoring;
pub mod services;

pub use lexical::LexicalScoringService;
pub use pipeline::{QueryConfig, QueryEngine, QueryRequest, QueryTuning};
pub use services::{ScoringRequest, ScoringService};
