//! Partial-file store and file lifecycle.
//!
//! Bytes for an in-flight download accumulate in `<destination>.pdpart`. The
//! marker's on-disk length is the only record of progress; it is published to
//! the destination name by an atomic rename once verified, or removed. While a
//! download runs, `<destination>.pdpart.lock` is held exclusively so a second
//! process cannot append to the same marker.

mod lock;
mod partial;

pub use lock::{lock_path, HeldLock, LockFile, LOCK_SUFFIX};
pub use partial::{discard, PartialFile};

/// Marker suffix for the staging file before atomic rename.
pub const TEMP_SUFFIX: &str = ".pdpart";

/// Path for the staging file: appends `.pdpart` to the final path (e.g. `file.iso` → `file.iso.pdpart`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}
