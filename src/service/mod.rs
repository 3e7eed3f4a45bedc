pub mod ingest;
pub mod normalizer;

pub use ingest::{IngestReport, run_ingestion};
pub use normalizer::normalize;
