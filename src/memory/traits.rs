// Mon Oct 19 2026 - Alex

use crate::memory::{MemoryRegion, ModuleInfo, ProcessInfo, Protection};

/// The operating-system services a `ProcessHandle` is built on.
///
/// Memory operations report success as `bool`: an unreadable or unmapped
/// address is an expected outcome, not an error.
pub trait ProcessApi: Send + Sync {
    fn processes(&self) -> Vec<ProcessInfo>;

    fn open(&mut self, pid: u32) -> bool;

    fn close(&mut self);

    fn is_alive(&self) -> bool;

    fn is_64_bit(&self) -> bool;

    fn modules(&self) -> Vec<ModuleInfo>;

    fn read(&self, addr: u64, dst: &mut [u8]) -> bool;

    fn write(&self, addr: u64, src: &[u8]) -> bool;

    /// Committed regions in ascending address order.
    fn regions(&self) -> Vec<MemoryRegion>;

    /// Returns the protection that was in effect before the change, or
    /// `None` if the change could not be made.
    fn set_protection(&self, addr: u64, size: usize, protection: Protection) -> Option<Protection>;

    fn kill(&self, pid: u32) -> bool;

    fn created_at(&self, pid: u32) -> u64;
}
