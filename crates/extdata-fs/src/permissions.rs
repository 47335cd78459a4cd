use crate::{Error, Result};
use std::path::Path;

/// File permission modes applied to materialized data files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionMode {
    /// On Unix: `0o755`. On Windows: `readonly = false`.
    Executable,

    /// On Unix: `0o644`. On Windows: `readonly = false`.
    ReadWrite,
}

impl PermissionMode {
    /// Data files are either plain or executable.
    pub fn for_data(executable: bool) -> Self {
        if executable {
            Self::Executable
        } else {
            Self::ReadWrite
        }
    }

    pub fn to_unix_mode(self) -> u32 {
        match self {
            Self::Executable => 0o755,
            Self::ReadWrite => 0o644,
        }
    }

    pub fn apply_to_path(self, path: &Path) -> Result<()> {
        let write_err = |e| Error::Write {
            path:   path.to_path_buf(),
            source: e,
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(self.to_unix_mode()))
                .map_err(write_err)?;
        }

        #[cfg(not(unix))]
        {
            let mut perms = std::fs::metadata(path).map_err(write_err)?.permissions();
            perms.set_readonly(false);
            std::fs::set_permissions(path, perms).map_err(write_err)?;
        }

        Ok(())
    }
}
