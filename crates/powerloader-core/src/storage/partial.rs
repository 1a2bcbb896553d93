//! Append-only staging file for a single download.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Staging file that accumulates response bytes for one destination.
///
/// Opened in append mode: every write lands at the current end of file, so the
/// file length is always exactly the number of bytes received and kept.
#[derive(Debug)]
pub struct PartialFile {
    file: File,
    path: PathBuf,
    sync_each_chunk: bool,
}

impl PartialFile {
    /// Open the marker for resume without truncating. Creates an empty file when
    /// absent. Returns the store and its current length.
    pub fn open_for_resume(path: &Path) -> io::Result<(Self, u64)> {
        let file = File::options()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        let existing = file.metadata()?.len();
        Ok((Self::from_file(file, path), existing))
    }

    /// Create (or truncate) the marker for a fresh download.
    pub fn create_fresh(path: &Path) -> io::Result<Self> {
        // `truncate` is rejected together with `append`; cut the file explicitly instead.
        let file = File::options()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        file.set_len(0)?;
        Ok(Self::from_file(file, path))
    }

    fn from_file(file: File, path: &Path) -> Self {
        Self {
            file,
            path: path.to_path_buf(),
            sync_each_chunk: false,
        }
    }

    /// When set, every `append` is followed by `fdatasync`.
    pub fn set_sync_each_chunk(&mut self, on: bool) {
        self.sync_each_chunk = on;
    }

    /// Append `data` at end of file. Returns only after the whole chunk has been
    /// handed to the OS (and synced, if configured).
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        if self.sync_each_chunk {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Current length as reported by the filesystem.
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Sync file data and metadata to disk.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically rename the marker to `final_path`, replacing any existing file.
    /// Consumes the store; the marker no longer exists afterwards.
    pub fn finalize(self, final_path: &Path) -> io::Result<()> {
        self.file.sync_all()?;
        let temp_path = self.path;
        drop(self.file);

        std::fs::rename(&temp_path, final_path)?;
        sync_parent_dir(final_path);
        Ok(())
    }

    /// Close and remove the marker.
    pub fn discard(self) -> io::Result<()> {
        let path = self.path;
        drop(self.file);
        discard(&path)
    }
}

/// Remove a marker file. Removing an absent file is not an error.
pub fn discard(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed partial file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Persist the rename itself. Best effort: not every platform can open a directory.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Err(e) = File::open(parent).and_then(|d| d.sync_all()) {
        tracing::debug!(dir = %parent.display(), error = %e, "directory sync failed");
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
