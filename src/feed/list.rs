use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::{validate_url, UrlValidationError};

/// Errors from reading or writing the feed list file.
#[derive(Debug, Error)]
pub enum FeedListError {
    #[error("Failed to access feed list '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to add '{uri}': {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: UrlValidationError,
    },
}

/// The configured feed sources, one URI per line.
///
/// Blank lines and lines starting with `#` are ignored. Duplicates are
/// dropped, keeping the first occurrence, so iteration order is file order.
#[derive(Debug, Clone)]
pub struct FeedList {
    path: PathBuf,
    entries: Vec<String>,
}

impl FeedList {
    /// Reads the list at `path`. A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self, FeedListError> {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No feed list found, starting empty");
                Vec::new()
            }
            Err(source) => {
                return Err(FeedListError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Extracts feed URIs from list file content.
    pub fn parse(content: &str) -> Vec<String> {
        let mut entries: Vec<String> = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if !entries.iter().any(|e| e == line) {
                entries.push(line.to_string());
            }
        }
        entries
    }

    /// Feed URIs in file order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Appends `uri` after validating it.
    ///
    /// Returns `Ok(false)` when the URI is already listed.
    pub fn add(&mut self, uri: &str) -> Result<bool, FeedListError> {
        let uri = uri.trim();
        validate_url(uri).map_err(|source| FeedListError::InvalidUri {
            uri: uri.to_string(),
            source,
        })?;

        if self.entries.iter().any(|e| e == uri) {
            return Ok(false);
        }
        self.entries.push(uri.to_string());
        Ok(true)
    }

    /// Removes `uri`. Returns `false` when it was not listed.
    pub fn remove(&mut self, uri: &str) -> bool {
        let uri = uri.trim();
        let before = self.entries.len();
        self.entries.retain(|e| e != uri);
        self.entries.len() != before
    }

    /// Writes the list back to its file.
    ///
    /// Write-to-temp-then-rename, so a crash never leaves a partial list.
    /// Comments in the original file are not preserved.
    pub fn save(&self) -> Result<(), FeedListError> {
        let io_err = |source| FeedListError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(entry);
            content.push('\n');
        }

        let temp_path = self.path.with_extension(format!("tmp.{}", std::process::id()));
        let result = (|| {
            let mut temp_file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            temp_file.write_all(content.as_bytes())?;
            temp_file.sync_all()?;
            drop(temp_file);

            // On Windows, rename fails if destination exists
            #[cfg(windows)]
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }

            std::fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(io_err(e));
        }

        tracing::debug!(path = %self.path.display(), feeds = self.entries.len(), "Saved feed list");
        Ok(())
    }
}
