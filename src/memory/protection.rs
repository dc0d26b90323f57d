// Mon Oct 19 2026 - Alex

use crate::memory::ProcessHandle;
use bitflags::bitflags;
use std::fmt;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Protection: u32 {
        const NO_ACCESS = 1 << 0;
        const READ_ONLY = 1 << 1;
        const READ_WRITE = 1 << 2;
        const WRITE_COPY = 1 << 3;
        const EXECUTE = 1 << 4;
        const EXECUTE_READ = 1 << 5;
        const EXECUTE_READ_WRITE = 1 << 6;
        const EXECUTE_WRITE_COPY = 1 << 7;
        const GUARD = 1 << 8;
        const NO_CACHE = 1 << 9;
        const WRITE_COMBINE = 1 << 10;
    }
}

impl Protection {
    const READABLE: Self = Self::READ_ONLY
        .union(Self::READ_WRITE)
        .union(Self::WRITE_COPY)
        .union(Self::EXECUTE_READ)
        .union(Self::EXECUTE_READ_WRITE)
        .union(Self::EXECUTE_WRITE_COPY);
    const WRITABLE: Self = Self::READ_WRITE
        .union(Self::WRITE_COPY)
        .union(Self::EXECUTE_READ_WRITE)
        .union(Self::EXECUTE_WRITE_COPY);
    const EXECUTABLE: Self = Self::EXECUTE
        .union(Self::EXECUTE_READ)
        .union(Self::EXECUTE_READ_WRITE)
        .union(Self::EXECUTE_WRITE_COPY);

    pub fn from_rwx(read: bool, write: bool, execute: bool) -> Self {
        match (read, write, execute) {
            (false, false, false) => Self::NO_ACCESS,
            (true, false, false) => Self::READ_ONLY,
            (_, true, false) => Self::READ_WRITE,
            (false, false, true) => Self::EXECUTE,
            (true, false, true) => Self::EXECUTE_READ,
            (_, true, true) => Self::EXECUTE_READ_WRITE,
        }
    }

    pub fn can_read(self) -> bool {
        self.intersects(Self::READABLE) && !self.intersects(Self::GUARD | Self::NO_ACCESS)
    }

    pub fn can_write(self) -> bool {
        self.intersects(Self::WRITABLE) && !self.intersects(Self::GUARD | Self::NO_ACCESS)
    }

    pub fn can_execute(self) -> bool {
        self.intersects(Self::EXECUTABLE)
    }

    pub fn grants_any(self, read: bool, write: bool, execute: bool) -> bool {
        (read && self.can_read()) || (write && self.can_write()) || (execute && self.can_execute())
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.can_read() { 'r' } else { '-' },
            if self.can_write() { 'w' } else { '-' },
            if self.can_execute() { 'x' } else { '-' },
        )
    }
}

/// Restores the previous page protection of a target range when dropped.
pub struct ProtectGuard<'a> {
    process: &'a ProcessHandle,
    address: u64,
    size: usize,
    previous: Option<Protection>,
}

impl<'a> ProtectGuard<'a> {
    pub(crate) fn new(process: &'a ProcessHandle, address: u64, size: usize, protection: Protection) -> Self {
        let previous = process.set_protection(address, size, protection);
        Self { process, address, size, previous }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// `None` when the OS refused (or does not support) the change.
    pub fn previous(&self) -> Option<Protection> {
        self.previous
    }

    pub fn is_applied(&self) -> bool {
        self.previous.is_some()
    }
}

impl Drop for ProtectGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.process.set_protection(self.address, self.size, previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rwx() {
        assert_eq!(Protection::from_rwx(true, false, false), Protection::READ_ONLY);
        assert_eq!(Protection::from_rwx(true, true, false), Protection::READ_WRITE);
        assert_eq!(Protection::from_rwx(true, false, true), Protection::EXECUTE_READ);
        assert_eq!(Protection::from_rwx(false, false, false), Protection::NO_ACCESS);
    }

    #[test]
    fn test_access_queries() {
        assert!(Protection::READ_WRITE.can_read());
        assert!(Protection::READ_WRITE.can_write());
        assert!(!Protection::READ_ONLY.can_write());
        assert!(!Protection::NO_ACCESS.can_read());
        assert!(!(Protection::READ_WRITE | Protection::GUARD).can_read());
        assert!(Protection::EXECUTE.can_execute());
        assert!(!Protection::EXECUTE.can_read());
        assert!(Protection::EXECUTE_READ.grants_any(false, true, true));
        assert!(!Protection::READ_ONLY.grants_any(false, true, true));
    }

    #[test]
    fn test_display() {
        assert_eq!(Protection::EXECUTE_READ.to_string(), "r-x");
        assert_eq!(Protection::READ_WRITE.to_string(), "rw-");
        assert_eq!(Protection::NO_ACCESS.to_string(), "---");
    }
}
