// Platform boundary: flash partitions, the OTA write primitive and the
// boot table are external collaborators. Production firmware implements
// these traits over its HAL (e.g. the ESP-IDF partition/OTA APIs); tests
// drive the engine through in-memory fakes.

use core::fmt;
use std::time::Duration;

use serde::Serialize;

/// A flash operation rejected by the driver, with the offset and length
/// of the failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashError {
    pub offset: usize,
    pub len: usize,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flash operation failed at offset {} ({} bytes)", self.offset, self.len)
    }
}

impl std::error::Error for FlashError {}

/// A fixed, named region of flash storage.
///
/// Handles are cheap to clone; they refer to the same underlying region.
pub trait Partition: Clone {
    fn label(&self) -> &str;
    fn offset(&self) -> u32;
    fn capacity(&self) -> usize;

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError>;
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), FlashError>;
    fn erase(&mut self, offset: usize, len: usize) -> Result<(), FlashError>;
}

/// The platform's OTA-write primitive for firmware images.
///
/// The handle manages erase-before-write internally across flash pages;
/// the session never erases firmware targets itself. Dropping a handle
/// without calling `finish` discards the partially written image.
pub trait OtaWriteHandle {
    /// Appends bytes to the in-flight firmware image.
    fn write(&mut self, data: &[u8]) -> Result<(), FlashError>;
    /// Closes the handle, validating and flushing the written image.
    fn finish(self) -> Result<(), FlashError>;
    /// Aborts the in-flight write, discarding partially written data.
    fn abort(self);
}

/// Boot-table and partition discovery primitives.
pub trait OtaPlatform {
    type Partition: Partition;
    type WriteHandle: OtaWriteHandle;

    /// Next inactive firmware slot, or `None` if the partition table has no
    /// spare slot.
    fn next_update_partition(&mut self) -> Option<Self::Partition>;

    /// The filesystem data region, or `None` if the partition table lacks one.
    fn filesystem_partition(&mut self) -> Option<Self::Partition>;

    /// The partition the currently running firmware was booted from.
    fn running_partition(&mut self) -> Option<Self::Partition>;

    /// Opens the OTA write primitive against an inactive firmware slot.
    fn begin_update(&mut self, target: &Self::Partition) -> Result<Self::WriteHandle, FlashError>;

    /// Points the persistent boot table at `target` for the next restart.
    fn set_boot_partition(&mut self, target: &Self::Partition) -> Result<(), FlashError>;

    /// Requests a deferred restart. The delay lets an in-flight HTTP
    /// response reach the client before the device goes down.
    fn schedule_restart(&mut self, delay: Duration);
}

/// Human-readable partition descriptor for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionInfo {
    pub label: String,
    pub offset: u32,
    pub size: usize,
}

impl PartitionInfo {
    pub fn of(partition: &impl Partition) -> Self {
        Self {
            label: partition.label().to_string(),
            offset: partition.offset(),
            size: partition.capacity(),
        }
    }
}
