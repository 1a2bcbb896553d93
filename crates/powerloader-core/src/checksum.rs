//! SHA-256 verification of completed downloads.
//!
//! Digests are computed from the finished staging file rather than inline with
//! the transfer, so a resumed download is hashed over all of its bytes, not
//! only the ones received in the last run.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Length of a SHA-256 digest in hex characters.
pub const SHA256_HEX_LEN: usize = 64;

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn sha256_path(path: &Path) -> Result<String> {
    sha256_file(path).with_context(|| format!("hash {}", path.display()))
}

/// Like `sha256_path`, keeping the raw I/O error for callers that classify it.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    sha256_reader(File::open(path)?)
}

/// SHA-256 of everything `reader` yields, as lowercase hex.
pub fn sha256_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Outcome of checking a file against an expected digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// No digest was expected; nothing was computed.
    Skipped,
    /// Digest matched; carries the computed hex digest.
    Matched(String),
    /// Digest did not match; carries the computed hex digest.
    Mismatched(String),
}

/// Verify `path` against `expected` (hex SHA-256). `None` is trivially satisfied.
pub fn verify(path: &Path, expected: Option<&str>) -> io::Result<Verification> {
    let expected = match expected {
        Some(e) => e,
        None => return Ok(Verification::Skipped),
    };
    let actual = sha256_file(path)?;
    if digests_equal(&actual, expected) {
        Ok(Verification::Matched(actual))
    } else {
        Ok(Verification::Mismatched(actual))
    }
}

/// Compare two hex digests, ignoring case and surrounding whitespace.
///
/// Every byte is visited regardless of where the first difference is.
pub fn digests_equal(actual: &str, expected: &str) -> bool {
    let a = actual.trim().as_bytes();
    let b = expected.trim().as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b)
        .fold(0u8, |acc, (x, y)| {
            acc | (x.to_ascii_lowercase() ^ y.to_ascii_lowercase())
        })
        == 0
}

/// True if `s` looks like a SHA-256 hex digest.
pub fn is_sha256_hex(s: &str) -> bool {
    let s = s.trim();
    s.len() == SHA256_HEX_LEN && s.bytes().all(|c| c.is_ascii_hexdigit())
}
