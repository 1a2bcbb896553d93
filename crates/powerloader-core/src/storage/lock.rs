//! Advisory lock file guarding a partial file across processes.

use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Suffix appended to the partial file's path for its lock file.
pub const LOCK_SUFFIX: &str = ".lock";

/// `file.iso.pdpart` → `file.iso.pdpart.lock`.
pub fn lock_path(temp_path: &Path) -> PathBuf {
    let mut o = temp_path.as_os_str().to_owned();
    o.push(LOCK_SUFFIX);
    PathBuf::from(o)
}

/// Lock file for one destination. Opening it does not take the lock.
pub struct LockFile {
    lock: RwLock<File>,
    path: PathBuf,
}

impl LockFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self {
            lock: RwLock::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Take the exclusive lock without blocking. `Ok(None)` when another
    /// handle (in this or another process) holds it.
    pub fn try_hold(&mut self) -> io::Result<Option<HeldLock<'_>>> {
        let guard = match self.lock.try_write() {
            Ok(g) => g,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e),
        };
        // The previous holder removes the file before unlocking; a lock on
        // that unlinked file protects nothing.
        if !still_linked(&guard, &self.path)? {
            return Ok(None);
        }
        Ok(Some(HeldLock {
            _guard: guard,
            path: &self.path,
        }))
    }
}

/// Held lock. Dropping it removes the lock file, then releases the lock.
pub struct HeldLock<'a> {
    _guard: RwLockWriteGuard<'a, File>,
    path: &'a Path,
}

impl Drop for HeldLock<'_> {
    fn drop(&mut self) {
        match std::fs::remove_file(self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::debug!(path = %self.path.display(), "remove lock file: {}", e),
        }
    }
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let held = file.metadata()?;
    match std::fs::metadata(path) {
        Ok(m) => Ok(m.dev() == held.dev() && m.ino() == held.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path(Path::new("/tmp/a.bin.pdpart")),
            PathBuf::from("/tmp/a.bin.pdpart.lock")
        );
    }

    #[test]
    fn second_handle_cannot_take_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin.pdpart.lock");
        let mut first = LockFile::open(&path).unwrap();
        let held = first.try_hold().unwrap().expect("first holder");

        let mut second = LockFile::open(&path).unwrap();
        assert!(second.try_hold().unwrap().is_none());

        drop(held);
        assert!(!path.exists());
    }

    #[test]
    fn stale_handle_does_not_win_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin.pdpart.lock");
        let mut first = LockFile::open(&path).unwrap();
        let mut late = LockFile::open(&path).unwrap();
        drop(first.try_hold().unwrap().expect("first holder"));

        // `late` opened the file before it was removed.
        assert!(late.try_hold().unwrap().is_none());
        let mut fresh = LockFile::open(&path).unwrap();
        assert!(fresh.try_hold().unwrap().is_some());
    }
}
