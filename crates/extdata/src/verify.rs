use std::path::Path;

use extdata_verify::{Result, verify_file};

use crate::link::{LinkKind, ResolvedLink};

/// Checks the file at `path` against the link's expected size and digest.
///
/// Build artifacts carry no integrity metadata and always pass. The file is
/// opened read-only and left untouched.
pub fn verify(path: &Path, link: &ResolvedLink) -> Result<()> {
    let data = link.data();
    match data.kind {
        LinkKind::Artifact => Ok(()),
        LinkKind::Static => verify_file(path, data.size.unwrap_or_default(), &data.sha256),
    }
}
