use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::clients::{
    entities::SavedTrackEntry,
    errors::{Error, Result},
};

const CACHE_DIR: &str = "tastemap";
const CACHE_FILE: &str = "saved_tracks.ndjson";

/// Snapshot of the saved-tracks library on local disk.
///
/// Entries are stored one JSON document per line, in library order.
pub struct LibraryCache {
    path: PathBuf,
}

impl LibraryCache {
    /// Cache backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LibraryCache { path: path.into() }
    }

    /// `saved_tracks.ndjson` under the user cache directory.
    pub fn try_default() -> Result<Self> {
        let path = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp")) // Fallback to /tmp if cache directory can't be determined
            .join(CACHE_DIR)
            .join(CACHE_FILE);
        Ok(LibraryCache { path })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the snapshot with `entries`.
    ///
    /// Each write goes to its own sibling temp file that is renamed over the
    /// snapshot, so readers never observe a partial snapshot.
    pub async fn store(&self, entries: &[SavedTrackEntry]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;
        let mut contents = String::new();
        for entry in entries {
            contents.push_str(&serde_json::to_string(entry)?);
            contents.push('\n');
        }

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(contents.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;
        debug!("Stored {} saved tracks in {:?}", entries.len(), self.path);
        Ok(())
    }

    /// Reads the last stored snapshot. Blank lines are skipped.
    pub async fn load(&self) -> Result<Vec<SavedTrackEntry>> {
        let file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::StorageError(std::io::Error::new(
                    e.kind(),
                    format!("no library snapshot at {}", self.path.display()),
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut entries = vec![];
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        debug!("Loaded {} saved tracks from {:?}", entries.len(), self.path);
        Ok(entries)
    }
}
