// The orchestrating update state machine.
//
// One session value, exclusively owned by the caller (typically the HTTP
// connection handler); every operation takes `&mut self`, so at most one
// session can be driven at a time without any global state or locking.
//
// Update flow:
// 1. start(config) selects and prepares the target partition
// 2. process_chunk() streams the image in arrival order
// 3. finalize() verifies the digest and commits the boot target
// 4. caller schedules a restart if the status says one is required

use std::time::{Duration, Instant};

use crate::config::{UpdateConfig, UpdateType};
use crate::error::{bounded_message, ErrorMessage, OtaError};
use crate::platform::{OtaPlatform, Partition, PartitionInfo};
use crate::status::{UpdateState, UpdateStatus};
use crate::verify::IntegrityVerifier;
use crate::writer::ChunkWriter;

/// Fixed text reported after an automatic rollback, overwriting any prior
/// error detail.
const ROLLBACK_MESSAGE: &str = "Update rolled back due to verification failure";
const TIMEOUT_MESSAGE: &str = "Upload timed out";

pub struct UpdateSession<P: OtaPlatform> {
    platform: P,
    state: UpdateState,
    update_type: UpdateType,
    writer: Option<ChunkWriter<P>>,
    verifier: Option<IntegrityVerifier>,
    total_size: usize,
    uploaded_size: usize,
    progress_percent: u8,
    error_message: ErrorMessage,
    backup_skipped: bool,
    reboot_required: bool,
    upload_timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl<P: OtaPlatform> UpdateSession<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            state: UpdateState::Idle,
            update_type: UpdateType::Firmware,
            writer: None,
            verifier: None,
            total_size: 0,
            uploaded_size: 0,
            progress_percent: 0,
            error_message: ErrorMessage::new(),
            backup_skipped: false,
            reboot_required: false,
            upload_timeout: None,
            deadline: None,
        }
    }

    /// Expires a stalled upload: a chunk or finalize arriving this long
    /// after the previous accepted chunk rolls the session back to Error.
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = Some(timeout);
        self
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Begins a new update. Permitted from Idle, Success and Error (the
    /// prior session's outcome is discarded); refused with `SessionBusy`
    /// while an update is mid-flight.
    ///
    /// Selects the target partition for the configured type, erases the
    /// filesystem region up front when applicable, and arms verification
    /// when the caller requested it with a well-formed expected hash.
    pub fn start(&mut self, config: &UpdateConfig) -> Result<(), OtaError> {
        if self.state.is_active() {
            log::warn!("Rejecting start: update already in progress");
            return Err(OtaError::SessionBusy);
        }
        self.reset(config);

        if config.total_size > config.update_type.max_image_size() {
            return Err(self.fail(
                OtaError::InvalidArgument,
                &format!(
                    "Declared size {} exceeds {} byte limit",
                    config.total_size,
                    config.update_type.max_image_size()
                ),
            ));
        }

        let writer = match config.update_type {
            UpdateType::Firmware => {
                let Some(partition) = self.platform.next_update_partition() else {
                    return Err(
                        self.fail(OtaError::NoTargetAvailable, "No available update partition")
                    );
                };
                ChunkWriter::firmware(&mut self.platform, partition)
            }
            UpdateType::Filesystem => {
                let Some(partition) = self.platform.filesystem_partition() else {
                    return Err(
                        self.fail(OtaError::NoTargetAvailable, "Filesystem partition not found")
                    );
                };
                ChunkWriter::filesystem(partition)
            }
        };
        let writer = match writer {
            Ok(writer) => writer,
            Err(err) => return Err(self.fail(err, &format!("Update start failed: {err}"))),
        };

        self.verifier = if config.verify_crypto && !config.expected_hash.is_empty() {
            let verifier = IntegrityVerifier::from_hex(&config.expected_hash);
            if verifier.is_none() {
                log::warn!("Invalid expected hash format, verification disabled");
            }
            verifier
        } else {
            None
        };

        log::info!(
            "Update started: type={:?} verify={} total={} target={}",
            config.update_type,
            self.verifier.is_some(),
            config.total_size,
            writer.partition().label()
        );
        self.writer = Some(writer);
        self.state = UpdateState::Uploading;
        self.deadline = self.upload_timeout.map(|t| Instant::now() + t);
        Ok(())
    }

    /// Applies the next chunk of the image stream. Chunks are written in
    /// call order at offset = bytes already uploaded; the total across all
    /// calls equals `uploaded_size`.
    ///
    /// A flash write failure puts the session in Error and is returned to
    /// the caller; rollback stays explicit (`abort`) per the update flow.
    pub fn process_chunk(&mut self, data: &[u8]) -> Result<(), OtaError> {
        if self.state != UpdateState::Uploading {
            return Err(OtaError::InvalidState);
        }
        self.check_deadline()?;
        if data.is_empty() {
            return Err(OtaError::InvalidArgument);
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(OtaError::InvalidState);
        };
        if let Err(err) = writer.write_chunk(data) {
            return Err(self.fail(err, &err.to_string()));
        }
        if let Some(verifier) = self.verifier.as_mut() {
            verifier.update(data);
        }
        self.uploaded_size += data.len();
        if self.total_size > 0 {
            self.progress_percent = ((self.uploaded_size * 100 / self.total_size).min(100)) as u8;
        }
        if let Some(timeout) = self.upload_timeout {
            self.deadline = Some(Instant::now() + timeout);
        }
        log::debug!("Processed chunk: {} bytes, total {} bytes", data.len(), self.uploaded_size);
        Ok(())
    }

    /// Verifies the uploaded image and commits it as the next-boot target.
    ///
    /// A digest mismatch rolls back and reports `HashMismatch` without ever
    /// reaching the Flashing state. With no verifier armed, verification is
    /// treated as satisfied; callers that need integrity guarantees must
    /// supply an expected hash.
    pub fn finalize(&mut self) -> Result<(), OtaError> {
        if self.state != UpdateState::Uploading {
            return Err(OtaError::InvalidState);
        }
        self.check_deadline()?;

        self.state = UpdateState::Verifying;
        if let Some(verifier) = self.verifier.take() {
            log::info!("Verifying uploaded image hash");
            if !verifier.verify() {
                self.rollback_in_place(ROLLBACK_MESSAGE);
                return Err(OtaError::HashMismatch);
            }
            log::info!("Hash verification successful");
        }

        self.state = UpdateState::Flashing;
        let Some(writer) = self.writer.take() else {
            return Err(self.fail(OtaError::InvalidState, "No image to commit"));
        };
        match writer.commit(&mut self.platform) {
            Ok(reboot_required) => {
                self.reboot_required = reboot_required;
                self.progress_percent = 100;
                self.state = UpdateState::Success;
                self.deadline = None;
                log::info!("Update finalized successfully");
                Ok(())
            }
            Err(err) => Err(self.fail(err, "Boot commit failed")),
        }
    }

    /// Rolls back the in-flight update: aborts the write, restores the
    /// pre-update boot target for firmware sessions, drops the digest
    /// accumulator and leaves the session in Error.
    pub fn abort(&mut self) {
        self.rollback_in_place(ROLLBACK_MESSAGE);
    }

    /// Immutable snapshot of the session, safe to call from any state
    /// including mid-upload.
    pub fn get_status(&self) -> UpdateStatus {
        UpdateStatus {
            state: self.state,
            update_type: self.update_type,
            total_size: self.total_size,
            uploaded_size: self.uploaded_size,
            progress_percent: self.progress_percent,
            error_message: self.error_message.clone(),
            backup_skipped: self.backup_skipped,
            reboot_required: self.reboot_required,
        }
    }

    /// Descriptor of the currently running firmware partition or the
    /// filesystem region, for the "currently running image" response.
    pub fn partition_info(&mut self, update_type: UpdateType) -> Option<PartitionInfo> {
        let partition = match update_type {
            UpdateType::Firmware => self.platform.running_partition()?,
            UpdateType::Filesystem => self.platform.filesystem_partition()?,
        };
        Some(PartitionInfo::of(&partition))
    }

    /// Asks the platform for a deferred restart, typically after a
    /// successful filesystem update so the success response can flush to
    /// the client first.
    pub fn schedule_restart(&mut self, delay: Duration) {
        log::info!("Restart scheduled in {delay:?}");
        self.platform.schedule_restart(delay);
    }

    fn reset(&mut self, config: &UpdateConfig) {
        self.state = UpdateState::Idle;
        self.update_type = config.update_type;
        self.writer = None;
        self.verifier = None;
        self.total_size = config.total_size;
        self.uploaded_size = 0;
        self.progress_percent = 0;
        self.error_message = ErrorMessage::new();
        self.backup_skipped = !config.create_backup;
        self.reboot_required = false;
        self.deadline = None;
    }

    fn check_deadline(&mut self) -> Result<(), OtaError> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                log::warn!("Upload stalled past deadline, rolling back");
                self.rollback_in_place(TIMEOUT_MESSAGE);
                return Err(OtaError::Timeout);
            }
        }
        Ok(())
    }

    fn rollback_in_place(&mut self, message: &str) {
        log::warn!("Automatic rollback initiated");
        if let Some(writer) = self.writer.take() {
            writer.rollback(&mut self.platform);
        }
        self.verifier = None;
        self.deadline = None;
        self.state = UpdateState::Error;
        self.error_message = bounded_message(message);
    }

    /// Records the failure in the status snapshot and returns it to the
    /// caller unchanged.
    fn fail(&mut self, err: OtaError, message: &str) -> OtaError {
        log::error!("{message}");
        self.error_message = bounded_message(message);
        self.state = UpdateState::Error;
        err
    }
}
