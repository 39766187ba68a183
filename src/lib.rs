//! Firmware/filesystem OTA update engine.
//!
//! Accepts an incoming binary image in arbitrary-sized chunks, writes it
//! into an inactive flash region, verifies it against an optional SHA-256
//! digest and commits it as the next-boot target, rolling back to the
//! previously running image if any step fails. The flash driver, OTA write
//! primitive and boot table are behind the [`platform`] traits so the
//! engine runs (and is tested) without device hardware.
//!
//! Update flow:
//! 1. `start(config)` — select and prepare the target partition
//! 2. `process_chunk(bytes)`* — stream the image in arrival order
//! 3. `finalize()` — verify integrity, commit the boot target
//! 4. caller schedules a restart when the status reports one is required

pub mod config;
pub mod error;
pub mod platform;
pub mod session;
pub mod status;
pub mod verify;
pub mod version;
pub mod writer;

#[cfg(test)]
pub(crate) mod doubles;

pub use config::{UpdateConfig, UpdateType};
pub use error::OtaError;
pub use platform::{FlashError, OtaPlatform, OtaWriteHandle, Partition, PartitionInfo};
pub use session::UpdateSession;
pub use status::{UpdateState, UpdateStatus};
pub use verify::IntegrityVerifier;
pub use writer::ChunkWriter;
