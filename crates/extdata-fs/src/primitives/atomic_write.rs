use crate::permissions::PermissionMode;
use crate::{Error, Result};
use std::io::Write;
use std::path::Path;

/// Writes `content` to a temp file beside `path` and renames it into place,
/// so readers observe either the old content or the new one.
///
/// The parent directory is created if needed. The result is mode `0o644`.
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let write_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(parent).map_err(write_err)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp.")
        .tempfile_in(parent)
        .map_err(write_err)?;
    tmp.write_all(content).map_err(write_err)?;
    PermissionMode::ReadWrite.apply_to_path(tmp.path())?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
