//! Local JSON file holding the last known rate snapshot.
//!
//! The file is a plain object of symbol to price. Writes go to a sibling
//! `*.tmp` file which is then renamed over the target, so readers see either
//! the previous or the new snapshot, never a partial one.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::Prices;

/// Failure reading or writing the rate file.
#[derive(Debug, thiserror::Error)]
pub enum RateFileError {
    /// Filesystem error.
    #[error("rate file i/o: {0}")]
    Io(#[from] io::Error),
    /// The file content is not a price object.
    #[error("rate file json: {0}")]
    Json(#[from] serde_json::Error),
}

/// The on-disk rate snapshot.
#[derive(Debug, Clone)]
pub struct RateFile {
    path: PathBuf,
}

impl RateFile {
    /// Points at `path`; nothing is touched until the first read or write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| OsString::from("rates.json"), OsString::from);
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Replaces the file with `prices`.
    ///
    /// # Errors
    ///
    /// Returns [`RateFileError`] if serialization, the temp write or the
    /// rename fails. A failed write leaves the previous file in place.
    pub async fn write(&self, prices: &Prices) -> Result<(), RateFileError> {
        let bytes = serde_json::to_vec_pretty(prices)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Reads the snapshot back. `Ok(None)` when no file has been written yet.
    ///
    /// # Errors
    ///
    /// Returns [`RateFileError`] if the file exists but cannot be read or
    /// decoded.
    pub async fn read(&self) -> Result<Option<Prices>, RateFileError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
