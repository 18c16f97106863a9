// Ingestion pipeline: outbound client plumbing and the paged driver

pub mod ingestion;
pub mod ingestor;

pub use ingestor::{IngestSummary, PagedIngestor, PagedSource, StopReason};
