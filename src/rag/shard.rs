//! Persisted vector index shards.
//!
//! A shard is a file pair sharing a random base name: `<name>.json` holds the
//! chunks with their metadata, `<name>.vec` holds the embeddings as packed
//! little-endian `f32` rows in the same order.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::PipelineError;

pub const MANIFEST_EXTENSION: &str = "json";
pub const VECTORS_EXTENSION: &str = "vec";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub title: String,
    pub keywords: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

#[derive(Serialize, Deserialize)]
struct ShardManifest {
    dimension: usize,
    documents: Vec<Document>,
}

/// In-memory index searched by brute-force cosine similarity.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: usize,
    documents: Vec<Document>,
    embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new(documents: Vec<Document>, embeddings: Vec<Vec<f32>>) -> Result<Self, PipelineError> {
        if documents.len() != embeddings.len() {
            return Err(PipelineError::ShardSave(format!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }
        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        if embeddings.iter().any(|e| e.len() != dimension) {
            return Err(PipelineError::ShardSave(
                "embeddings have inconsistent dimensions".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            documents,
            embeddings,
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Appends every entry of `other`. Both sides must share a dimension
    /// unless one of them is empty.
    pub fn merge_from(&mut self, other: VectorIndex) -> Result<(), PipelineError> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.dimension != other.dimension {
            return Err(PipelineError::IndexLoad(format!(
                "cannot merge index of dimension {} into dimension {}",
                other.dimension, self.dimension
            )));
        }
        self.documents.extend(other.documents);
        self.embeddings.extend(other.embeddings);
        Ok(())
    }

    /// The `k` entries most similar to `query`, best first.
    pub fn similarity_search(&self, query: &[f32], k: usize) -> Vec<ScoredDocument> {
        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, embedding)| (i, cosine_similarity(query, embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| ScoredDocument {
                document: self.documents[i].clone(),
                score,
            })
            .collect()
    }

    pub fn save(&self, folder: &Path, name: &str) -> Result<(), PipelineError> {
        let vectors: Vec<u8> = self
            .embeddings
            .iter()
            .flat_map(|row| serialize_embedding(row))
            .collect();
        let manifest = ShardManifest {
            dimension: self.dimension,
            documents: self.documents.clone(),
        };
        let manifest =
            serde_json::to_vec(&manifest).map_err(|e| PipelineError::ShardSave(e.to_string()))?;

        fs::write(shard_file(folder, name, VECTORS_EXTENSION), vectors)
            .map_err(|e| PipelineError::ShardSave(e.to_string()))?;
        fs::write(shard_file(folder, name, MANIFEST_EXTENSION), manifest)
            .map_err(|e| PipelineError::ShardSave(e.to_string()))?;
        Ok(())
    }

    pub fn load(folder: &Path, name: &str) -> Result<Self, PipelineError> {
        let load_err = |e: String| PipelineError::IndexLoad(format!("shard {}: {}", name, e));

        let manifest = fs::read(shard_file(folder, name, MANIFEST_EXTENSION))
            .map_err(|e| load_err(e.to_string()))?;
        let manifest: ShardManifest =
            serde_json::from_slice(&manifest).map_err(|e| load_err(e.to_string()))?;
        let vectors = fs::read(shard_file(folder, name, VECTORS_EXTENSION))
            .map_err(|e| load_err(e.to_string()))?;

        let expected = manifest.dimension * manifest.documents.len() * 4;
        if vectors.len() != expected {
            return Err(load_err(format!(
                "expected {} vector bytes, found {}",
                expected,
                vectors.len()
            )));
        }

        let flat = deserialize_embedding(&vectors);
        let embeddings = if manifest.dimension == 0 {
            vec![Vec::new(); manifest.documents.len()]
        } else {
            flat.chunks(manifest.dimension).map(<[f32]>::to_vec).collect()
        };

        Ok(Self {
            dimension: manifest.dimension,
            documents: manifest.documents,
            embeddings,
        })
    }
}

/// Random base name for a new shard.
pub fn random_shard_name() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn shard_file(folder: &Path, name: &str, extension: &str) -> std::path::PathBuf {
    folder.join(format!("{}.{}", name, extension))
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str) -> Document {
        Document {
            page_content: format!("{}\nbody", title),
            metadata: ChunkMetadata {
                title: title.to_string(),
                ..ChunkMetadata::default()
            },
        }
    }

    #[test]
    fn search_ranks_by_cosine_similarity() {
        let index = VectorIndex::new(
            vec![doc("east"), doc("north"), doc("north-east")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
        )
        .unwrap();

        let hits = index.similarity_search(&[0.0, 2.0], 2);
        let titles: Vec<&str> = hits.iter().map(|h| h.document.metadata.title.as_str()).collect();
        assert_eq!(titles, vec!["north", "north-east"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn saved_shard_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::new(vec![doc("a"), doc("b")], vec![vec![0.5, -1.0], vec![2.0, 3.25]])
            .unwrap();
        index.save(dir.path(), "abc").unwrap();

        assert!(dir.path().join("abc.json").is_file());
        assert!(dir.path().join("abc.vec").is_file());

        let loaded = VectorIndex::load(dir.path(), "abc").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), 2);
        assert_eq!(loaded.embeddings, index.embeddings);
        assert_eq!(loaded.documents, index.documents);
    }

    #[test]
    fn truncated_vectors_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::new(vec![doc("a")], vec![vec![1.0, 2.0]]).unwrap();
        index.save(dir.path(), "cut").unwrap();
        fs::write(dir.path().join("cut.vec"), [0u8; 5]).unwrap();

        let err = VectorIndex::load(dir.path(), "cut").unwrap_err();
        assert!(matches!(err, PipelineError::IndexLoad(_)));
    }

    #[test]
    fn merge_rejects_dimension_mismatch() {
        let mut left = VectorIndex::new(vec![doc("a")], vec![vec![1.0, 0.0]]).unwrap();
        let right = VectorIndex::new(vec![doc("b")], vec![vec![1.0, 0.0, 0.0]]).unwrap();
        assert!(left.merge_from(right).is_err());

        let same = VectorIndex::new(vec![doc("c")], vec![vec![0.0, 1.0]]).unwrap();
        left.merge_from(same).unwrap();
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(VectorIndex::new(vec![doc("a")], Vec::new()).is_err());
    }
}
