//! Cancellation and destination ownership.
//!
//! An `AbortToken` is shared between the caller (e.g. a Ctrl-C handler) and a
//! running download; the transfer loop checks it between chunks. The
//! process-wide `DestinationLocks` registry rejects a second download of the
//! same destination inside this process without touching the filesystem;
//! other processes are kept out by the lock file in `storage::lock`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// Shared cancellation flag. Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortToken(Arc<AtomicBool>);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The current chunk finishes writing; no further
    /// bytes are appended.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Registry of destinations currently being downloaded.
#[derive(Debug, Default)]
pub struct DestinationLocks {
    held: Mutex<HashSet<PathBuf>>,
}

impl DestinationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by every `Downloader` in this process.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<DestinationLocks>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(DestinationLocks::new())))
    }

    /// Claim `destination`. Returns `None` if another download already holds it.
    /// The claim is released when the returned guard is dropped.
    pub fn try_acquire(self: &Arc<Self>, destination: &Path) -> Option<DestinationGuard> {
        let key = lock_key(destination);
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(key.clone()) {
            return None;
        }
        Some(DestinationGuard {
            locks: Arc::clone(self),
            key,
        })
    }

    #[cfg(test)]
    fn is_held(&self, destination: &Path) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&lock_key(destination))
    }
}

/// Releases a destination claim when dropped.
#[derive(Debug)]
pub struct DestinationGuard {
    locks: Arc<DestinationLocks>,
    key: PathBuf,
}

impl Drop for DestinationGuard {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

/// Normalise a destination so `./a.bin` and `a.bin` collide. The file itself
/// usually does not exist yet, so only the parent directory is canonicalised.
fn lock_key(destination: &Path) -> PathBuf {
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), destination.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => destination.to_path_buf(),
    }
}
