use crate::{Error, Result};
use std::path::Path;
use tempfile::NamedTempFile;

/// Creates an anonymous staging file inside `dir`.
///
/// Staging inside the destination tree keeps the file on the same filesystem
/// as its final links. The file is deleted when the handle is dropped.
pub fn staging_file_in(dir: impl AsRef<Path>) -> Result<NamedTempFile> {
    let dir = dir.as_ref();
    let write_err = |source| Error::Write {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;
    tempfile::Builder::new()
        .prefix(".extdata-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_staging_file_removed_on_drop() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested");
        let path = {
            let tmp = staging_file_in(&root).unwrap();
            assert!(tmp.path().starts_with(&root));
            tmp.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
