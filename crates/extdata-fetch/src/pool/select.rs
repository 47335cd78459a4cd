//! Stable per-object server selection.
//!
//! Every up server gets a score derived from `SHA-256(server || 0x00 || object)`
//! and the lowest score wins. The same object keeps landing on the same server
//! while the up set is unchanged, so that server's stage cache absorbs repeats.
//! Removing a server only moves the objects that were routed to it.

use sha2::{Digest, Sha256};

pub fn score(server: &str, object_url: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(server.as_bytes());
    hasher.update([0u8]);
    hasher.update(object_url.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Picks the server with the minimum score; ties go to the earlier server.
pub fn select_server<'a>(servers: &[&'a str], object_url: &str) -> Option<&'a str> {
    servers
        .iter()
        .copied()
        .min_by_key(|server| score(server, object_url))
}
