//! Content verification for cached external data files.
//!
//! Provides incremental hashing and a size-then-digest file check. Hashing is
//! done while streaming so a file is read exactly once per verification.
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use extdata_verify::{Sha256Hasher, VerifiedReader};
//!
//! let data = b"hello world";
//! let expected = Sha256Hasher::hex_digest(data);
//!
//! let mut reader = VerifiedReader::new(&data[..], Sha256Hasher::new());
//! let mut buffer = Vec::new();
//! reader.read_to_end(&mut buffer).unwrap();
//!
//! reader.finish_hex(&expected).unwrap();
//! ```

pub use self::error::{Result, VerifyError};
pub use self::file::verify_file;
pub use self::hasher::{Hasher, Sha256Hasher};
pub use self::reader::VerifiedReader;

mod error;
mod file;
mod hasher;
mod reader;
