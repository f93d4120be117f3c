//! Identity types for Quiver entities

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Tool identifier. Globally unique, but a tool is also unique per (name, tenant).
pub type ToolId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Generate a new UUIDv7 tool id (timestamp-sortable).
pub fn new_tool_id() -> ToolId {
    Uuid::now_v7()
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}
