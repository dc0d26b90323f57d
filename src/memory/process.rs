// Mon Oct 19 2026 - Alex

use crate::memory::{
    Buffer, MemoryError, MemoryRange, MemoryRegion, ModuleInfo, ProcessApi, ProcessInfo, ProtectGuard,
    Protection, Scalar,
};
use ahash::AHashMap;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86,
    X64,
}

impl Arch {
    pub fn pointer_size(self) -> usize {
        match self {
            Arch::X86 => 4,
            Arch::X64 => 8,
        }
    }

    pub fn max_pointer(self) -> u64 {
        match self {
            Arch::X86 => u32::MAX as u64,
            Arch::X64 => u64::MAX,
        }
    }

    pub fn mask(self, addr: u64) -> u64 {
        addr & self.max_pointer()
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::X86 => write!(f, "x86"),
            Arch::X64 => write!(f, "x64"),
        }
    }
}

const FIND_BYTE_BLOCK: usize = 4096;

pub struct ProcessHandle {
    api: Box<dyn ProcessApi>,
    pid: u32,
    name: String,
    arch: Arch,
    attached: bool,
    modules: Mutex<AHashMap<String, ModuleInfo>>,
}

impl ProcessHandle {
    pub fn new(api: impl ProcessApi + 'static) -> Self {
        Self {
            api: Box::new(api),
            pid: 0,
            name: String::new(),
            arch: if cfg!(target_pointer_width = "64") { Arch::X64 } else { Arch::X86 },
            attached: false,
            modules: Mutex::new(AHashMap::new()),
        }
    }

    #[cfg(target_os = "linux")]
    pub fn native() -> Self {
        Self::new(crate::memory::LinuxProcessApi::new())
    }

    /// Fails only when no process with `pid` exists. A process that exists
    /// but cannot be opened yields `Ok(false)`.
    pub fn attach(&mut self, pid: u32) -> Result<bool, MemoryError> {
        self.detach();

        let target = self
            .api
            .processes()
            .into_iter()
            .find(|p| p.id == pid)
            .ok_or_else(|| MemoryError::ProcessNotFound(pid.to_string()))?;

        if !self.api.open(pid) {
            warn!("Process {} ({}) exists but could not be opened", target.name, pid);
            return Ok(false);
        }

        self.pid = pid;
        self.name = target.name;
        self.arch = if self.api.is_64_bit() { Arch::X64 } else { Arch::X86 };
        self.attached = true;
        self.refresh_modules();

        info!(
            "Attached to {} (pid {}, {}, {} modules)",
            self.name,
            pid,
            self.arch,
            self.modules.lock().len()
        );
        Ok(true)
    }

    pub fn attach_by_name(&mut self, name: &str) -> Result<bool, MemoryError> {
        let pid = self
            .api
            .processes()
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.id)
            .ok_or_else(|| MemoryError::ProcessNotFound(name.to_string()))?;
        self.attach(pid)
    }

    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.api.close();
        self.modules.lock().clear();
        self.attached = false;
        info!("Detached from {} (pid {})", self.name, self.pid);
    }

    pub fn refresh_modules(&self) {
        let mut modules = self.modules.lock();
        modules.clear();
        for module in self.api.modules() {
            modules.entry(module.name.clone()).or_insert(module);
        }
        debug!("Loaded {} modules", modules.len());
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_alive(&self) -> bool {
        self.attached && self.api.is_alive()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn pointer_size(&self) -> usize {
        self.arch.pointer_size()
    }

    pub fn max_pointer(&self) -> u64 {
        self.arch.max_pointer()
    }

    pub fn mask(&self, addr: u64) -> u64 {
        self.arch.mask(addr)
    }

    fn ensure_attached(&self) -> Result<(), MemoryError> {
        if self.attached {
            Ok(())
        } else {
            Err(MemoryError::NotAttached)
        }
    }

    pub fn modules(&self) -> Vec<ModuleInfo> {
        let mut out: Vec<ModuleInfo> = self.modules.lock().values().cloned().collect();
        out.sort_by_key(|m| m.base);
        out
    }

    pub fn module(&self, name: &str) -> Result<ModuleInfo, MemoryError> {
        self.ensure_attached()?;
        self.modules
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| MemoryError::ModuleNotFound(name.to_string()))
    }

    pub fn module_base(&self, name: &str) -> Result<u64, MemoryError> {
        self.module(name).map(|m| m.base)
    }

    pub fn processes(&self) -> Vec<ProcessInfo> {
        self.api.processes()
    }

    pub fn kill(&self, pid: u32) -> bool {
        self.api.kill(pid)
    }

    pub fn created_at(&self, pid: u32) -> u64 {
        self.api.created_at(pid)
    }

    pub fn read(&self, addr: u64, dst: &mut [u8]) -> bool {
        self.attached && self.api.read(self.mask(addr), dst)
    }

    pub fn write(&self, addr: u64, src: &[u8]) -> bool {
        self.attached && self.api.write(self.mask(addr), src)
    }

    pub fn read_value<T: Scalar>(&self, addr: u64) -> Option<T> {
        let mut raw = [0u8; 16];
        let raw = raw.get_mut(..T::SIZE)?;
        self.read(addr, raw).then(|| T::from_bytes(raw))
    }

    pub fn write_value<T: Scalar>(&self, addr: u64, value: T) -> bool {
        self.write(addr, &value.to_vec())
    }

    /// Reads a pointer of the target's width.
    pub fn read_ptr(&self, addr: u64) -> Option<u64> {
        match self.arch {
            Arch::X86 => self.read_value::<u32>(addr).map(u64::from),
            Arch::X64 => self.read_value::<u64>(addr),
        }
    }

    pub fn write_ptr(&self, addr: u64, value: u64) -> bool {
        match self.arch {
            Arch::X86 => self.write_value(addr, value as u32),
            Arch::X64 => self.write_value(addr, value),
        }
    }

    /// Reads up to `size` bytes and stops at the first null.
    pub fn read_string(&self, addr: u64, size: usize) -> Option<String> {
        let mut raw = vec![0u8; size];
        if !self.read(addr, &mut raw) {
            return None;
        }
        let len = raw.iter().position(|&b| b == 0).unwrap_or(size);
        Some(String::from_utf8_lossy(&raw[..len]).into_owned())
    }

    /// Writes the string followed by a null terminator.
    pub fn write_string(&self, addr: u64, value: &str) -> bool {
        let mut raw = Vec::with_capacity(value.len() + 1);
        raw.extend_from_slice(value.as_bytes());
        raw.push(0);
        self.write(addr, &raw)
    }

    pub fn read_buffer(&self, addr: u64, buffer: &mut Buffer<'_>) -> bool {
        let size = buffer.size();
        buffer.read_from(self, addr, 0, size).unwrap_or(false)
    }

    pub fn write_buffer(&self, addr: u64, buffer: &Buffer<'_>) -> bool {
        buffer.write_to(self, addr, 0, buffer.size()).unwrap_or(false)
    }

    /// Walks a pointer path. When `add_first_offset_to_start` is set, the
    /// first offset is added to `start` directly; otherwise `start` is
    /// dereferenced first. Each later offset is applied after one more
    /// dereference. Returns 0 if any read fails.
    pub fn follow(&self, start: u64, offsets: &[i64], add_first_offset_to_start: bool) -> u64 {
        let mut addr = self.mask(start);
        for (i, &offset) in offsets.iter().enumerate() {
            if i > 0 || !add_first_offset_to_start {
                match self.read_ptr(addr) {
                    Some(ptr) => addr = ptr,
                    None => return 0,
                }
            }
            addr = self.mask(addr.wrapping_add_signed(offset));
        }
        if offsets.is_empty() && !add_first_offset_to_start {
            return self.read_ptr(addr).map(|p| self.mask(p)).unwrap_or(0);
        }
        addr
    }

    /// Absolute address of the first `value` in `[begin, begin + size)`, or
    /// 0 if there is none.
    pub fn find_byte(&self, value: u8, begin: u64, size: u64) -> u64 {
        let mut found = 0u64;
        self.iter_regions(begin, size, None, true, FIND_BYTE_BLOCK, |start, _, data| {
            if let Some(pos) = data.and_then(|d| d.iter().position(|&b| b == value)) {
                found = start + pos as u64;
                return true;
            }
            false
        });
        found
    }

    /// Length of the null-terminated string at `addr`, or `max` if no
    /// terminator was found within `max` bytes.
    pub fn strlen(&self, addr: u64, max: u64) -> u64 {
        match self.find_byte(0, addr, max) {
            0 => max,
            end => end - addr,
        }
    }

    pub fn regions(&self) -> Vec<MemoryRegion> {
        if !self.attached {
            return Vec::new();
        }
        self.api.regions()
    }

    /// Committed regions intersecting the window.
    pub fn regions_in(&self, begin: u64, size: u64) -> Vec<MemoryRegion> {
        let window = MemoryRange::from_start_size(begin, size);
        self.regions()
            .into_iter()
            .filter(|r| r.range().overlaps(&window))
            .collect()
    }

    /// Visits every committed region in the window in `block_size` slices.
    ///
    /// For each slice the protection is optionally switched to `protection`
    /// and restored afterwards; the slice is read when `should_read` is set.
    /// The callback receives `(slice_start, slice_len, data)` where `data` is
    /// `None` if the slice was not read or the read failed. Returning `true`
    /// from the callback stops the walk.
    pub fn iter_regions<F>(
        &self,
        begin: u64,
        size: u64,
        protection: Option<Protection>,
        should_read: bool,
        block_size: usize,
        callback: F,
    ) where
        F: FnMut(u64, usize, Option<&[u8]>) -> bool,
    {
        let regions = self.regions_in(begin, size);
        let window = MemoryRange::from_start_size(begin, size);
        self.walk_regions(&regions, window, protection, should_read, block_size, 0, callback);
    }

    /// Like `iter_regions`, but each read also takes up to `overlap` bytes
    /// past the slice, clipped to the region and window, so `data` may be
    /// longer than `slice_len`. Returns `true` if the callback stopped the walk.
    pub(crate) fn walk_regions<F>(
        &self,
        regions: &[MemoryRegion],
        window: MemoryRange,
        protection: Option<Protection>,
        should_read: bool,
        block_size: usize,
        overlap: usize,
        mut callback: F,
    ) -> bool
    where
        F: FnMut(u64, usize, Option<&[u8]>) -> bool,
    {
        assert!(block_size > 0, "block size must be non-zero");
        let mut scratch = Vec::new();

        for region in regions {
            let Some(clipped) = region.range().intersect(&window) else {
                continue;
            };
            for block in clipped.blocks(block_size as u64) {
                let len = block.size() as usize;
                let span = read_span(&block, &clipped, overlap);
                let _guard = protection.map(|p| self.protect(block.start(), span, p));
                let data = if should_read {
                    scratch.resize(span, 0);
                    self.read(block.start(), &mut scratch[..span]).then_some(&scratch[..span])
                } else {
                    None
                };
                if callback(block.start(), len, data) {
                    return true;
                }
            }
        }
        false
    }

    pub fn protect(&self, addr: u64, size: usize, protection: Protection) -> ProtectGuard<'_> {
        ProtectGuard::new(self, addr, size, protection)
    }

    pub(crate) fn set_protection(&self, addr: u64, size: usize, protection: Protection) -> Option<Protection> {
        if !self.attached {
            return None;
        }
        self.api.set_protection(self.mask(addr), size, protection)
    }
}

/// Bytes to read for `block`: the block plus up to `overlap` bytes of what
/// follows it inside `bounds`.
pub(crate) fn read_span(block: &MemoryRange, bounds: &MemoryRange, overlap: usize) -> usize {
    let room = bounds.end().saturating_sub(block.start());
    (block.size().saturating_add(overlap as u64)).min(room) as usize
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("arch", &self.arch)
            .field("attached", &self.attached)
            .finish()
    }
}
