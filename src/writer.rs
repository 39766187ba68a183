// Sequences arbitrary-sized upload chunks into the selected partition.
//
// The two update kinds carry different write strategies: firmware goes
// through the platform's OTA write primitive (which erases as it goes and
// is boot-table-tracked), filesystem images are raw offset writes into a
// region the writer erased up front. Each strategy implements write_chunk,
// commit and rollback on its own variant.

use crate::error::OtaError;
use crate::platform::{OtaPlatform, OtaWriteHandle, Partition};

enum UpdateTarget<P: OtaPlatform> {
    Firmware {
        partition: P::Partition,
        handle: Option<P::WriteHandle>,
        /// Boot target recorded before the update began, restored on rollback.
        prior_boot: Option<P::Partition>,
    },
    Filesystem {
        partition: P::Partition,
    },
}

pub struct ChunkWriter<P: OtaPlatform> {
    target: UpdateTarget<P>,
    written: usize,
}

impl<P: OtaPlatform> ChunkWriter<P> {
    /// Opens an OTA write against an inactive firmware slot, remembering the
    /// currently running partition as the rollback boot target.
    pub fn firmware(platform: &mut P, partition: P::Partition) -> Result<Self, OtaError> {
        let prior_boot = platform.running_partition();
        let handle = match platform.begin_update(&partition) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("OTA begin failed on {}: {e}", partition.label());
                return Err(OtaError::WriteFailure { offset: e.offset, len: e.len });
            }
        };
        log::info!("Starting firmware update to partition {}", partition.label());
        Ok(Self {
            target: UpdateTarget::Firmware { partition, handle: Some(handle), prior_boot },
            written: 0,
        })
    }

    /// Erases the filesystem region in full, then accepts raw offset writes.
    /// Raw writes require a known-erased destination.
    pub fn filesystem(mut partition: P::Partition) -> Result<Self, OtaError> {
        let size = partition.capacity();
        log::info!("Erasing filesystem partition {} ({size} bytes)", partition.label());
        if let Err(e) = partition.erase(0, size) {
            log::error!("Filesystem erase failed: {e}");
            return Err(OtaError::WriteFailure { offset: e.offset, len: e.len });
        }
        Ok(Self { target: UpdateTarget::Filesystem { partition }, written: 0 })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn partition(&self) -> &P::Partition {
        match &self.target {
            UpdateTarget::Firmware { partition, .. } => partition,
            UpdateTarget::Filesystem { partition } => partition,
        }
    }

    /// Applies the next chunk at offset = bytes written so far. Chunks must
    /// arrive in stream order; out-of-order or duplicate chunks corrupt the
    /// image and are not supported at this layer.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<(), OtaError> {
        let offset = self.written;
        if offset + data.len() > self.partition().capacity() {
            log::error!(
                "Chunk overruns partition {}: offset {} + {} > {}",
                self.partition().label(),
                offset,
                data.len(),
                self.partition().capacity()
            );
            return Err(OtaError::WriteFailure { offset, len: data.len() });
        }
        let result = match &mut self.target {
            UpdateTarget::Firmware { handle: Some(handle), .. } => handle.write(data),
            UpdateTarget::Firmware { handle: None, .. } => return Err(OtaError::InvalidState),
            UpdateTarget::Filesystem { partition } => partition.write(offset, data),
        };
        if let Err(e) = result {
            log::error!("Chunk write failed: {e}");
            return Err(OtaError::WriteFailure { offset: e.offset, len: e.len });
        }
        self.written += data.len();
        Ok(())
    }

    /// Commits the written image as the next-boot target. Returns whether
    /// the caller must schedule a reboot for the image to take effect.
    ///
    /// Firmware: closes the write handle, then flips the boot table to the
    /// new slot; failure of either step restores the prior boot target and
    /// reports `CommitFailure`. Filesystem: no boot-table change, the new
    /// image is only re-mounted after a full restart.
    pub fn commit(self, platform: &mut P) -> Result<bool, OtaError> {
        let written = self.written;
        match self.target {
            UpdateTarget::Firmware { partition, handle, prior_boot } => {
                let Some(handle) = handle else {
                    return Err(OtaError::InvalidState);
                };
                if let Err(e) = handle.finish() {
                    log::error!("Closing OTA write handle failed: {e}");
                    Self::restore_boot(platform, prior_boot);
                    return Err(OtaError::CommitFailure);
                }
                if let Err(e) = platform.set_boot_partition(&partition) {
                    log::error!("Set boot partition failed: {e}");
                    Self::restore_boot(platform, prior_boot);
                    return Err(OtaError::CommitFailure);
                }
                log::info!("Boot partition set to {}", partition.label());
                Ok(false)
            }
            UpdateTarget::Filesystem { partition } => {
                log::info!(
                    "Filesystem image written to {} ({written} bytes), reboot required",
                    partition.label()
                );
                Ok(true)
            }
        }
    }

    /// Discards the in-flight image. Firmware: aborts the OTA handle and
    /// restores the boot table to the pre-update target. Filesystem: the
    /// partially written region is simply abandoned, it is not
    /// boot-table-tracked and the running firmware never re-reads it until
    /// a finalize succeeded.
    pub fn rollback(self, platform: &mut P) {
        match self.target {
            UpdateTarget::Firmware { handle, prior_boot, .. } => {
                if let Some(handle) = handle {
                    handle.abort();
                }
                Self::restore_boot(platform, prior_boot);
            }
            UpdateTarget::Filesystem { partition } => {
                log::warn!(
                    "Abandoning partially written filesystem image in {}",
                    partition.label()
                );
            }
        }
    }

    fn restore_boot(platform: &mut P, prior: Option<P::Partition>) {
        if let Some(prior) = prior {
            match platform.set_boot_partition(&prior) {
                Ok(()) => log::info!("Boot partition restored to {}", prior.label()),
                Err(e) => log::error!("Boot partition restore failed: {e}"),
            }
        }
    }
}
