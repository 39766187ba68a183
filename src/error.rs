// Error taxonomy for the OTA update engine.
//
// Every failure is returned as a value and also mirrored into the session's
// bounded `error_message` so the status endpoint can report it without the
// transport layer needing to inspect platform error codes.

use core::fmt;

/// Upper bound on the stored error text, matching the status snapshot field.
pub const ERROR_MESSAGE_CAP: usize = 128;

/// Bounded error text carried in the session status.
pub type ErrorMessage = heapless::String<ERROR_MESSAGE_CAP>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// No inactive flash slot (or filesystem region) to write into.
    NoTargetAvailable,
    /// The flash driver rejected a write or erase.
    WriteFailure { offset: usize, len: usize },
    /// Computed SHA-256 digest differs from the caller-supplied one.
    HashMismatch,
    /// Closing the write handle or updating the boot table failed.
    CommitFailure,
    /// Empty chunk or malformed configuration.
    InvalidArgument,
    /// Operation not permitted in the current session state.
    InvalidState,
    /// `start` called while another session is mid-flight.
    SessionBusy,
    /// The upload stalled past the configured idle deadline.
    Timeout,
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTargetAvailable => write!(f, "no update partition available"),
            Self::WriteFailure { offset, len } => {
                write!(f, "flash write failed at offset {offset} ({len} bytes)")
            }
            Self::HashMismatch => write!(f, "hash verification failed"),
            Self::CommitFailure => write!(f, "boot commit failed"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::InvalidState => write!(f, "operation not valid in current state"),
            Self::SessionBusy => write!(f, "update session already in progress"),
            Self::Timeout => write!(f, "upload timed out"),
        }
    }
}

impl std::error::Error for OtaError {}

/// Copies `msg` into a bounded message, truncating at the cap.
pub(crate) fn bounded_message(msg: &str) -> ErrorMessage {
    let mut out = ErrorMessage::new();
    for ch in msg.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
