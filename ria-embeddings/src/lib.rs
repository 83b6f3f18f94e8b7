//! C1: maps text to fixed-dimension dense vectors.

pub mod cache;
pub mod error;
pub mod provider;

pub use cache::EmbeddingCache;
pub use error::EmbeddingError;
pub use provider::{DeterministicEmbeddingProvider, EmbeddingProvider, EmbeddingVector, HttpEmbeddingProvider};
