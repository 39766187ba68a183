// In-memory fakes for the platform boundary, used by the unit tests.
//
// Partition handles share their backing region through Rc<RefCell>, so a
// clone held by a test observes the writes performed through the session.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::platform::{FlashError, OtaPlatform, OtaWriteHandle, Partition};

const ERASED: u8 = 0xFF;

struct Region {
    data: Vec<u8>,
    erased: bool,
    fail_next_write: bool,
}

#[derive(Clone)]
pub struct FakePartition {
    label: &'static str,
    offset: u32,
    region: Rc<RefCell<Region>>,
}

impl FakePartition {
    pub fn new(label: &'static str, offset: u32, capacity: usize) -> Self {
        Self {
            label,
            offset,
            region: Rc::new(RefCell::new(Region {
                data: vec![0; capacity],
                erased: false,
                fail_next_write: false,
            })),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.region.borrow().data.clone()
    }

    pub fn was_erased(&self) -> bool {
        self.region.borrow().erased
    }

    /// Makes the next write through this handle fail once.
    pub fn fail_next_write(&self) {
        self.region.borrow_mut().fail_next_write = true;
    }
}

impl Partition for FakePartition {
    fn label(&self) -> &str {
        self.label
    }

    fn offset(&self) -> u32 {
        self.offset
    }

    fn capacity(&self) -> usize {
        self.region.borrow().data.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        let region = self.region.borrow();
        let end = offset + buf.len();
        if end > region.data.len() {
            return Err(FlashError { offset, len: buf.len() });
        }
        buf.copy_from_slice(&region.data[offset..end]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), FlashError> {
        let mut region = self.region.borrow_mut();
        if region.fail_next_write {
            region.fail_next_write = false;
            return Err(FlashError { offset, len: data.len() });
        }
        let end = offset + data.len();
        if end > region.data.len() {
            return Err(FlashError { offset, len: data.len() });
        }
        region.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn erase(&mut self, offset: usize, len: usize) -> Result<(), FlashError> {
        let mut region = self.region.borrow_mut();
        let end = offset + len;
        if end > region.data.len() {
            return Err(FlashError { offset, len });
        }
        region.data[offset..end].fill(ERASED);
        region.erased = true;
        Ok(())
    }
}

/// Buffers writes until `finish`, mimicking the platform OTA primitive
/// that only exposes a valid image after a successful end-of-update.
pub struct FakeWriteHandle {
    partition: FakePartition,
    staged: Vec<u8>,
    fail_next_write: Rc<RefCell<bool>>,
    fail_finish: bool,
    aborted: Rc<RefCell<bool>>,
}

impl OtaWriteHandle for FakeWriteHandle {
    fn write(&mut self, data: &[u8]) -> Result<(), FlashError> {
        if *self.fail_next_write.borrow() {
            *self.fail_next_write.borrow_mut() = false;
            return Err(FlashError { offset: self.staged.len(), len: data.len() });
        }
        if self.staged.len() + data.len() > self.partition.capacity() {
            return Err(FlashError { offset: self.staged.len(), len: data.len() });
        }
        self.staged.extend_from_slice(data);
        Ok(())
    }

    fn finish(mut self) -> Result<(), FlashError> {
        if self.fail_finish {
            return Err(FlashError { offset: 0, len: self.staged.len() });
        }
        let staged = std::mem::take(&mut self.staged);
        self.partition.write(0, &staged)
    }

    fn abort(self) {
        *self.aborted.borrow_mut() = true;
    }
}

/// Two firmware slots, one filesystem region, a boot pointer and recorded
/// restart requests. Failure injection flags drive the error-path tests.
pub struct FakePlatform {
    slots: [FakePartition; 2],
    filesystem: FakePartition,
    running: usize,
    boot_target: Rc<RefCell<String>>,
    restarts: Rc<RefCell<Vec<Duration>>>,
    ota_write_failure: Rc<RefCell<bool>>,
    aborted: Rc<RefCell<bool>>,
    pub no_free_slot: bool,
    pub fail_begin: bool,
    pub fail_finish: bool,
    pub fail_set_boot: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            slots: [
                FakePartition::new("ota_0", 0x10000, 64 * 1024),
                FakePartition::new("ota_1", 0x150000, 64 * 1024),
            ],
            filesystem: FakePartition::new("spiffs", 0x290000, 64 * 1024),
            running: 0,
            boot_target: Rc::new(RefCell::new("ota_0".to_string())),
            restarts: Rc::new(RefCell::new(Vec::new())),
            ota_write_failure: Rc::new(RefCell::new(false)),
            aborted: Rc::new(RefCell::new(false)),
            no_free_slot: false,
            fail_begin: false,
            fail_finish: false,
            fail_set_boot: false,
        }
    }

    /// The slot `next_update_partition` will hand out.
    pub fn update_slot(&self) -> FakePartition {
        self.slots[1 - self.running].clone()
    }

    pub fn boot_label(&self) -> String {
        self.boot_target.borrow().clone()
    }

    pub fn filesystem_contents(&self) -> Vec<u8> {
        self.filesystem.contents()
    }

    pub fn fail_next_filesystem_write(&self) {
        self.filesystem.fail_next_write();
    }

    pub fn fail_next_ota_write(&self) {
        *self.ota_write_failure.borrow_mut() = true;
    }

    pub fn ota_aborted(&self) -> bool {
        *self.aborted.borrow()
    }

    pub fn restarts(&self) -> Vec<Duration> {
        self.restarts.borrow().clone()
    }
}

impl OtaPlatform for FakePlatform {
    type Partition = FakePartition;
    type WriteHandle = FakeWriteHandle;

    fn next_update_partition(&mut self) -> Option<FakePartition> {
        if self.no_free_slot {
            None
        } else {
            Some(self.update_slot())
        }
    }

    fn filesystem_partition(&mut self) -> Option<FakePartition> {
        Some(self.filesystem.clone())
    }

    fn running_partition(&mut self) -> Option<FakePartition> {
        Some(self.slots[self.running].clone())
    }

    fn begin_update(&mut self, target: &FakePartition) -> Result<FakeWriteHandle, FlashError> {
        if self.fail_begin {
            return Err(FlashError { offset: 0, len: 0 });
        }
        Ok(FakeWriteHandle {
            partition: target.clone(),
            staged: Vec::new(),
            fail_next_write: self.ota_write_failure.clone(),
            fail_finish: self.fail_finish,
            aborted: self.aborted.clone(),
        })
    }

    fn set_boot_partition(&mut self, target: &FakePartition) -> Result<(), FlashError> {
        if self.fail_set_boot {
            return Err(FlashError { offset: 0, len: 0 });
        }
        *self.boot_target.borrow_mut() = target.label().to_string();
        Ok(())
    }

    fn schedule_restart(&mut self, delay: Duration) {
        self.restarts.borrow_mut().push(delay);
    }
}
