//! Filesystem hand-off of rendered frames.
//!
//! One writer (the engine) and one reader (the frame source) share a single
//! directory. The writer publishes a frame by renaming a finished temporary
//! file into place, so the reader never sees a partially written image.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ARTIFACT_EXT: &str = "png";
const PARTIAL_EXT: &str = "partial";

/// Directory through which render artifacts are handed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBuffer {
    dir: PathBuf,
    stem: String,
}

impl ArtifactBuffer {
    /// Create a buffer rooted at `dir`; artifacts are named `<stem>_<NNNN>.png`.
    pub fn new<P: Into<PathBuf>>(dir: P, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    /// Buffer directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for the given render index.
    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir
            .join(format!("{}_{:04}.{}", self.stem, index, ARTIFACT_EXT))
    }

    /// Create the directory if needed and remove any stale artifacts.
    pub fn prepare(&self) -> io::Result<usize> {
        fs::create_dir_all(&self.dir)?;
        self.clear()
    }

    /// Remove every artifact (finished or partial) from the directory.
    ///
    /// Returns the number of files removed. A missing directory is empty.
    pub fn clear(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_artifact = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == ARTIFACT_EXT || ext == PARTIAL_EXT);
            if is_artifact {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(removed)
    }

    /// Publish the artifact for `index`.
    pub fn publish(&self, index: u64, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(index);
        let partial = path.with_extension(PARTIAL_EXT);
        fs::write(&partial, bytes)?;
        fs::rename(&partial, &path)?;
        Ok(path)
    }

    /// Read and remove the artifact for `index`, if it has been published.
    pub fn take(&self, index: u64) -> io::Result<Option<Vec<u8>>> {
        let path = self.path_for(index);
        match fs::read(&path) {
            Ok(bytes) => {
                fs::remove_file(&path)?;
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Number of artifacts currently in the directory.
    pub fn pending(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut count = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXT) {
                count += 1;
            }
        }
        Ok(count)
    }
}
