// Caller-supplied update configuration, parsed out of request metadata by
// the transport layer. Immutable for the lifetime of one session.

use serde::{Deserialize, Serialize};

/// Largest accepted firmware image (matches the app partition slots).
pub const MAX_FIRMWARE_SIZE: usize = 1280 * 1024;
/// Largest accepted filesystem image (matches the data partition).
pub const MAX_FILESYSTEM_SIZE: usize = 1472 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Firmware,
    Filesystem,
}

impl UpdateType {
    pub fn max_image_size(self) -> usize {
        match self {
            Self::Firmware => MAX_FIRMWARE_SIZE,
            Self::Filesystem => MAX_FILESYSTEM_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub update_type: UpdateType,
    /// Enables SHA-256 verification when `expected_hash` is well formed.
    pub verify_crypto: bool,
    /// 64 hex characters, or empty to skip verification.
    pub expected_hash: String,
    /// Advisory only; backup streaming was removed from the production path.
    pub create_backup: bool,
    /// Declared image size in bytes, 0 if the transport does not know it.
    pub total_size: usize,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            update_type: UpdateType::Firmware,
            verify_crypto: true,
            expected_hash: String::new(),
            create_backup: true,
            total_size: 0,
        }
    }
}
