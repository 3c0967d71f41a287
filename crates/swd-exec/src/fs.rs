//! Filesystem helpers shared by discovery and cache persistence.

use std::io;
use std::path::Path;

/// Create a directory, tolerating the case where it already exists *as a
/// directory*. Any other error (including "exists but is a file") is
/// propagated.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}
