//! C2 (sparse BM25) and C3 (hybrid vector store).

pub mod bm25;
pub mod error;
pub mod store;

pub use bm25::{Bm25Index, Bm25Snapshot, Bm25Stats, RawScore};
pub use error::IndexError;
pub use store::{Hit, HybridWeights, MetadataFilter, SearchMode, VectorStore};
