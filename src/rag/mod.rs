pub mod batcher;
pub mod loader;
pub mod shard;
pub mod splitter;

pub use batcher::{EmbeddingBatcher, EmbeddingRun, EmbeddingRunError};
pub use loader::load_merged_index;
pub use shard::{ChunkMetadata, Document, ScoredDocument, VectorIndex};
pub use splitter::TokenTextSplitter;
