use std::fs;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use super::shard::{
    random_shard_name, shard_file, ChunkMetadata, Document, VectorIndex, MANIFEST_EXTENSION,
    VECTORS_EXTENSION,
};
use super::splitter::TokenTextSplitter;
use crate::core::config::AppPaths;
use crate::core::errors::{ApiError, DatabaseError, PipelineError};
use crate::db::{self, Database, KnowledgeRow};
use crate::llm::provider::EmbeddingProvider;

#[derive(Debug, Error)]
pub enum EmbeddingRunError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<EmbeddingRunError> for ApiError {
    fn from(err: EmbeddingRunError) -> Self {
        match err {
            EmbeddingRunError::Pipeline(err) => err.into(),
            EmbeddingRunError::Database(err) => err.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingRun {
    NothingToDo,
    Created {
        rows: usize,
        chunks: usize,
        shards: Vec<String>,
    },
}

/// Turns not-yet-embedded knowledge rows into new index shards.
pub struct EmbeddingBatcher {
    db: Database,
    embedder: Arc<dyn EmbeddingProvider>,
    splitter: TokenTextSplitter,
    paths: Arc<AppPaths>,
    batch_size: usize,
}

impl EmbeddingBatcher {
    pub fn new(
        db: Database,
        embedder: Arc<dyn EmbeddingProvider>,
        splitter: TokenTextSplitter,
        paths: Arc<AppPaths>,
        batch_size: usize,
    ) -> Self {
        Self {
            db,
            embedder,
            splitter,
            paths,
            batch_size: batch_size.max(1),
        }
    }

    /// Embeds every pending row in batches, one shard per batch.
    ///
    /// Pending rows are read up front on a released connection. Row flags
    /// flip in one transaction only after every shard of the run is on disk;
    /// any failure removes the shards this run already wrote.
    pub async fn create_embeddings_for_new_rows(&self) -> Result<EmbeddingRun, EmbeddingRunError> {
        let rows = {
            let mut conn = self.db.acquire().await?;
            db::pending_knowledge_rows(&mut conn).await?
        };
        if rows.is_empty() {
            tracing::info!("No new data for embedding");
            return Ok(EmbeddingRun::NothingToDo);
        }

        let documents: Vec<Document> = rows.iter().map(document_for_row).collect();
        let chunks = self.splitter.split_documents(&documents);
        if chunks.is_empty() {
            return Err(PipelineError::ZeroChunks.into());
        }
        tracing::info!(
            "Embedding {} chunks from {} rows in batches of {}",
            chunks.len(),
            rows.len(),
            self.batch_size
        );

        let folder = self
            .paths
            .ensure_embeddings_dir()
            .map_err(|e| PipelineError::ShardSave(e.to_string()))?;

        let mut written = Vec::new();
        for batch in chunks.chunks(self.batch_size) {
            match self.write_shard(folder, batch).await {
                Ok(name) => written.push(name),
                Err(err) => {
                    tracing::error!("Embedding batch failed: {}", err);
                    remove_shards(folder, &written);
                    return Err(err.into());
                }
            }
        }

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let flagged: Result<(), DatabaseError> = async {
            let mut tx = self.db.begin().await?;
            db::mark_rows_embedded(&mut tx, &ids).await?;
            tx.commit().await?;
            Ok::<(), DatabaseError>(())
        }
        .await;
        if let Err(err) = flagged {
            tracing::error!("Failed to mark rows as embedded: {}", err);
            remove_shards(folder, &written);
            return Err(err.into());
        }

        tracing::info!("Created {} index shards", written.len());
        Ok(EmbeddingRun::Created {
            rows: rows.len(),
            chunks: chunks.len(),
            shards: written,
        })
    }

    async fn write_shard(&self, folder: &Path, batch: &[Document]) -> Result<String, PipelineError> {
        let texts: Vec<String> = batch.iter().map(|doc| doc.page_content.clone()).collect();
        let embeddings = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| PipelineError::ShardSave(e.to_string()))?;

        let index = VectorIndex::new(batch.to_vec(), embeddings)?;
        let name = random_shard_name();
        index.save(folder, &name)?;
        tracing::debug!("Wrote shard {} with {} chunks", name, index.len());
        Ok(name)
    }
}

fn document_for_row(row: &KnowledgeRow) -> Document {
    Document {
        page_content: format!("{}\n{}", row.title, row.content),
        metadata: ChunkMetadata {
            source: row.source.clone(),
            title: row.title.clone(),
            keywords: row.keywords.clone(),
            category: row.category.clone(),
        },
    }
}

fn remove_shards(folder: &Path, names: &[String]) {
    for name in names {
        for extension in [MANIFEST_EXTENSION, VECTORS_EXTENSION] {
            let path = shard_file(folder, name, extension);
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::llm::provider::{EmbeddingProvider, ProviderError};

    /// Deterministic byte-histogram embeddings. Fails every call after
    /// `fail_after` successful ones; each call first sleeps for `pause`.
    pub struct HashEmbedder {
        pub fail_after: Option<usize>,
        pub calls: AtomicUsize,
        pub pause: Duration,
    }

    impl HashEmbedder {
        pub fn new() -> Self {
            Self {
                fail_after: None,
                calls: AtomicUsize::new(0),
                pause: Duration::ZERO,
            }
        }

        pub fn vector(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; 8];
            for (i, b) in text.bytes().enumerate() {
                v[(b as usize + i) % 8] += 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl EmbeddingProvider for HashEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            if !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| call >= limit) {
                return Err(ProviderError::Api {
                    status: 500,
                    message: "embedding backend down".to_string(),
                });
            }
            Ok(inputs.iter().map(|t| Self::vector(t)).collect())
        }
    }
}
