use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::{Result, Sha256Hasher, VerifiedReader, VerifyError};

/// Checks `path` against an expected size and hex SHA-256 digest.
///
/// The size is compared first, so a file of the wrong length is rejected
/// without hashing it. The file is opened read-only for the duration of the
/// call and never modified.
pub fn verify_file(path: impl AsRef<Path>, size: u64, sha256: &str) -> Result<()> {
    let file = File::open(path.as_ref())?;
    let actual = file.metadata()?.len();
    if actual != size {
        return Err(VerifyError::SizeMismatch {
            expected: size,
            actual,
        });
    }

    let mut reader = VerifiedReader::new(BufReader::new(file), Sha256Hasher::new());
    io::copy(&mut reader, &mut io::sink())?;
    reader.finish_hex(sha256)
}
