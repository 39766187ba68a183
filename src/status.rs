// Status snapshot exposed to the transport layer for the JSON status
// endpoint. A pure read; the transport never mutates session state.

use serde::Serialize;

use crate::config::UpdateType;
use crate::error::ErrorMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    Idle,
    Uploading,
    Verifying,
    Flashing,
    Success,
    Error,
}

impl UpdateState {
    /// True while an update is mid-flight and a new `start` must be refused.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Uploading | Self::Verifying | Self::Flashing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateStatus {
    pub state: UpdateState,
    pub update_type: UpdateType,
    pub total_size: usize,
    pub uploaded_size: usize,
    pub progress_percent: u8,
    /// Empty unless `state == Error`.
    pub error_message: ErrorMessage,
    pub backup_skipped: bool,
    /// Set only after a successful filesystem finalize; the caller schedules
    /// the actual restart.
    pub reboot_required: bool,
}
