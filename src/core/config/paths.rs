use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const EMBEDDING_FOLDER_NAME: &str = "embeddings";
const LOG_FOLDER_NAME: &str = "app_log";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub embeddings_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        Self::with_root(discover_data_dir())
    }

    pub fn with_root(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        AppPaths {
            log_dir: data_dir.join(LOG_FOLDER_NAME),
            embeddings_dir: data_dir.join(EMBEDDING_FOLDER_NAME),
            data_dir,
        }
    }

    /// Returns the embeddings folder, creating it on first use.
    pub fn ensure_embeddings_dir(&self) -> io::Result<&Path> {
        if self.embeddings_dir.is_dir() {
            tracing::debug!("Embedding folder path exists.");
        } else {
            fs::create_dir_all(&self.embeddings_dir)?;
            tracing::info!("Embedding folder created.");
        }
        Ok(&self.embeddings_dir)
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("RAGCHAT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
