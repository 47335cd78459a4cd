pub mod atomic_write;
pub mod hardlink;
pub mod remove;
pub mod staging;

pub use atomic_write::atomic_write;
pub use hardlink::{FallbackStrategy, HardlinkOrCopyOptions, hardlink_or_copy};
pub use remove::remove_file_if_exists;
pub use staging::staging_file_in;
