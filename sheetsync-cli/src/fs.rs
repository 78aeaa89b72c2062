//! Atomic file replacement for every document sheetsync persists
//!
//! Content is written to a temp file in the destination directory, synced,
//! then renamed over the destination. A failure before the rename leaves the
//! previous file untouched.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` is `Some("")` for bare file names like `book.xlsx`
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Absolute form of `path` with `.`/`..` and symlinks resolved
///
/// A file that does not exist yet is resolved through its directory; if that
/// fails too the path is returned unchanged.
pub fn resolve_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| {
        match (fs::canonicalize(parent_dir_or_dot(path)), path.file_name()) {
            (Ok(dir), Some(name)) => dir.join(name),
            _ => path.to_path_buf(),
        }
    })
}

/// Atomically replace `dest` with `bytes`
pub fn atomic_write_bytes(dest: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    let dest = dest.as_ref();
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;

    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize `value` as pretty JSON (4-space indent) and atomically write it to `dest`
pub fn atomic_write_json<T: serde::Serialize>(dest: impl AsRef<Path>, value: &T) -> io::Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(io::Error::other)?;
    atomic_write_bytes(dest, &buf)
}
