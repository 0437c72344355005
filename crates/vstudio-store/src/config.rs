//! Store configuration.

use std::path::PathBuf;

/// Where the JSONL store keeps its index and artifact files.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding `gallery.jsonl` and the artifact files
    pub dir: PathBuf,
    /// Index file name inside `dir`
    pub index_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./vstudio-data"),
            index_file: "gallery.jsonl".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dir: std::env::var("VSTUDIO_STORE_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.dir),
            index_file: defaults.index_file,
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(&self.index_file)
    }
}
