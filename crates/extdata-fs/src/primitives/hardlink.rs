use crate::{Error, Result};
use std::io::ErrorKind;
use std::path::Path;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackStrategy {
    /// Copy the file when the filesystem refuses a hard link.
    #[default]
    Copy,
    Error,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HardlinkOrCopyOptions {
    pub fallback: FallbackStrategy,
}

impl HardlinkOrCopyOptions {
    pub fn new() -> Self { Self::default() }

    pub fn fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Links `src` at `dest`, replacing any file already at `dest`.
///
/// Each destination stays an independent directory entry: removing one never
/// affects `src` or other links to it.
pub fn hardlink_or_copy(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: HardlinkOrCopyOptions,
) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    crate::remove_file_if_exists(dest)?;

    match std::fs::hard_link(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if link_unsupported(&e) => match options.fallback {
            FallbackStrategy::Copy => std::fs::copy(src, dest).map(drop).map_err(|e| {
                Error::Write {
                    path:   dest.to_path_buf(),
                    source: e,
                }
            }),
            FallbackStrategy::Error => Err(Error::HardlinkUnsupported {
                src:    src.to_path_buf(),
                dest:   dest.to_path_buf(),
                source: e,
            }),
        },
        Err(e) => Err(Error::Write {
            path:   dest.to_path_buf(),
            source: e,
        }),
    }
}

fn link_unsupported(e: &std::io::Error) -> bool {
    // EXDEV and EPERM both show up on filesystems without hard link support.
    matches!(
        e.kind(),
        ErrorKind::CrossesDevices | ErrorKind::Unsupported | ErrorKind::PermissionDenied
    ) || e.raw_os_error() == Some(18)
}
