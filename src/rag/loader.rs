use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use super::shard::{VectorIndex, MANIFEST_EXTENSION, VECTORS_EXTENSION};
use crate::core::errors::PipelineError;

/// Loads every shard in `folder` and merges them into one index.
///
/// Shards are visited in name order. Nothing is cached: each call rereads the
/// whole folder, which bounds how large the knowledge base can usefully grow.
pub fn load_merged_index(folder: &Path) -> Result<VectorIndex, PipelineError> {
    let names = shard_names(folder)?;
    let mut names = names.into_iter();

    let first = names.next().ok_or_else(|| {
        PipelineError::IndexLoad(format!("no index shards found in {}", folder.display()))
    })?;

    let mut merged = VectorIndex::load(folder, &first)?;
    for name in names {
        merged.merge_from(VectorIndex::load(folder, &name)?)?;
    }

    tracing::debug!("Loaded vector index with {} chunks", merged.len());
    Ok(merged)
}

/// Base names of the shard files in `folder`, one per pair.
fn shard_names(folder: &Path) -> Result<BTreeSet<String>, PipelineError> {
    let entries = fs::read_dir(folder).map_err(|e| {
        PipelineError::IndexLoad(format!("{}: {}", folder.display(), e))
    })?;

    let mut names = BTreeSet::new();
    for entry in entries {
        let path = entry
            .map_err(|e| PipelineError::IndexLoad(e.to_string()))?
            .path();
        let is_shard_file = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == MANIFEST_EXTENSION || ext == VECTORS_EXTENSION);
        if !is_shard_file {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.insert(stem.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::shard::{ChunkMetadata, Document};

    fn shard(folder: &Path, name: &str, title: &str, vector: Vec<f32>) {
        let doc = Document {
            page_content: title.to_string(),
            metadata: ChunkMetadata {
                title: title.to_string(),
                ..ChunkMetadata::default()
            },
        };
        VectorIndex::new(vec![doc], vec![vector])
            .unwrap()
            .save(folder, name)
            .unwrap();
    }

    #[test]
    fn merges_all_shards_once() {
        let dir = tempfile::tempdir().unwrap();
        shard(dir.path(), "b", "second", vec![0.0, 1.0]);
        shard(dir.path(), "a", "first", vec![1.0, 0.0]);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let index = load_merged_index(dir.path()).unwrap();
        assert_eq!(index.len(), 2);

        let hits = index.similarity_search(&[1.0, 0.0], 1);
        assert_eq!(hits[0].document.metadata.title, "first");
    }

    #[test]
    fn empty_or_missing_folder_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_merged_index(dir.path()),
            Err(PipelineError::IndexLoad(_))
        ));
        assert!(load_merged_index(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn half_written_shard_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        shard(dir.path(), "a", "first", vec![1.0, 0.0]);
        fs::write(dir.path().join("orphan.vec"), [0u8; 8]).unwrap();

        assert!(load_merged_index(dir.path()).is_err());
    }
}
