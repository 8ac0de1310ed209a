//! `ETag` generation and conditional request handling for cached files.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

/// Weak validator built from file size and modification time.
///
/// Cached files are written once and never changed in place, so size and
/// mtime identify the content without hashing it.
///
/// # Returns
/// Quoted `ETag` string, e.g., `"5-1a2b3c"`
pub fn generate_etag(len: u64, modified: Option<SystemTime>) -> String {
    let mut hasher = DefaultHasher::new();
    if let Some(nanos) = modified
        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
    {
        nanos.hash(&mut hasher);
    }
    format!("\"{len:x}-{:x}\"", hasher.finish())
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`
/// - Weak comparison: `W/"abc123"`
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag.split(',').map(str::trim).any(|e| {
            e == "*" || e.strip_prefix("W/").unwrap_or(e) == etag
        })
    })
}
