// Context retrieval across knowledge partitions
pub mod engine;

pub use engine::{finalize, ContextRetriever, PartitionFailure, RetrievalOutcome};
