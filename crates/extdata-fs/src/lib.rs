//! Filesystem primitives used to materialize cached external data.
//!
//! - [`staging_file_in`] - anonymous staging file on the destination filesystem
//! - [`hardlink_or_copy`] - fan one staged blob out to many destinations
//! - [`atomic_write`] - replace small files (such as error sidecars) atomically
//! - [`PermissionMode`] - executable bit handling

mod error;
pub mod permissions;
pub mod primitives;

pub use error::{Error, Result};
pub use permissions::PermissionMode;
pub use primitives::{
    FallbackStrategy, HardlinkOrCopyOptions, atomic_write, hardlink_or_copy,
    remove_file_if_exists, staging_file_in,
};
