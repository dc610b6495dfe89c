//! Durable copies of finished generations.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("library metadata error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One finished generation as handed to the library.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LibraryRecord<'a> {
    pub prompt: &'a str,
    #[serde(skip)]
    pub bytes: &'a [u8],
    pub sample_rate: f64,
    pub channels: usize,
}

pub trait Library: Send + Sync {
    /// Persists the container bytes and returns where they went.
    fn save(&self, record: &LibraryRecord<'_>) -> Result<PathBuf, LibraryError>;
}

/// Writes `suno_<unix-seconds>_<id>.wav` plus a `.json` sidecar holding the prompt.
#[derive(Debug, Clone)]
pub struct DiskLibrary {
    dir: PathBuf,
}

impl DiskLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/SongForge/Generations`, or the temp dir when there is no data dir.
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("SongForge")
            .join("Generations")
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl Library for DiskLibrary {
    fn save(&self, record: &LibraryRecord<'_>) -> Result<PathBuf, LibraryError> {
        std::fs::create_dir_all(&self.dir)?;

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let id = Uuid::new_v4().simple().to_string();
        let stem = format!("suno_{}_{}", secs, &id[..8]);

        let path = self.dir.join(format!("{stem}.wav"));
        std::fs::write(&path, record.bytes)?;
        std::fs::write(
            self.dir.join(format!("{stem}.json")),
            serde_json::to_vec_pretty(record)?,
        )?;
        Ok(path)
    }
}
