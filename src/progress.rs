use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const NO_PROGRESS: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    #[serde(default = "default_last_index")]
    pub last_index: i64,
}

fn default_last_index() -> i64 {
    NO_PROGRESS
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            last_index: NO_PROGRESS,
        }
    }
}

impl ProgressState {
    /// Index of the item the next batch run should process.
    pub fn next_index(&self) -> usize {
        (self.last_index + 1).max(0) as usize
    }
}

/// Single JSON record `{"last_index": n}` on disk.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load_progress(&self) -> Result<i64> {
        Ok(self.load_state().await?.last_index)
    }

    pub async fn load_state(&self) -> Result<ProgressState> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProgressState::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save_progress(&self, last_index: i64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_string(&ProgressState { last_index })?;
        fs::write(&self.path, body).await?;
        Ok(())
    }
}
