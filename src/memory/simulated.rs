// Mon Oct 19 2026 - Alex

use crate::memory::{MemoryRange, MemoryRegion, ModuleInfo, ProcessApi, ProcessInfo, Protection};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct SimRegion {
    start: u64,
    data: Vec<u8>,
    protection: Protection,
    name: String,
}

impl SimRegion {
    fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }
}

#[derive(Debug)]
struct SimState {
    pid: u32,
    name: String,
    is_64_bit: bool,
    alive: bool,
    opened: bool,
    deny_open: bool,
    created_at: u64,
    regions: Vec<SimRegion>,
    modules: Vec<ModuleInfo>,
}

/// An in-memory target process.
///
/// Clones share the same state, so a test can keep one handle to poke at
/// memory while a `ProcessHandle` owns another.
#[derive(Debug, Clone)]
pub struct SimulatedProcess {
    state: Arc<RwLock<SimState>>,
}

impl SimulatedProcess {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(SimState {
                pid,
                name: name.into(),
                is_64_bit: true,
                alive: true,
                opened: false,
                deny_open: false,
                created_at: 1_700_000_000,
                regions: Vec::new(),
                modules: Vec::new(),
            })),
        }
    }

    pub fn with_32_bit(self) -> Self {
        self.state.write().is_64_bit = false;
        self
    }

    /// The process stays visible in `processes()` but refuses `open`.
    pub fn with_denied_open(self) -> Self {
        self.state.write().deny_open = true;
        self
    }

    pub fn pid(&self) -> u32 {
        self.state.read().pid
    }

    pub fn map_region(&self, start: u64, size: usize, protection: Protection, name: &str) {
        let mut state = self.state.write();
        let region = SimRegion {
            start,
            data: vec![0u8; size],
            protection,
            name: name.to_string(),
        };
        let end = region.end();
        state.regions.retain(|r| r.end() <= start || r.start >= end);
        let idx = state.regions.partition_point(|r| r.start < start);
        state.regions.insert(idx, region);
    }

    /// Maps a read-only image region and registers it as a module.
    pub fn add_module(&self, name: &str, base: u64, size: usize) {
        self.map_region(base, size, Protection::READ_ONLY, name);
        self.state.write().modules.push(ModuleInfo::new(name, base, size as u64));
    }

    /// Writes regardless of page protection.
    pub fn poke(&self, addr: u64, bytes: &[u8]) -> bool {
        let mut state = self.state.write();
        Self::copy_out(&mut state.regions, addr, bytes, false)
    }

    /// Reads regardless of page protection.
    pub fn peek(&self, addr: u64, len: usize) -> Option<Vec<u8>> {
        let state = self.state.read();
        let mut out = vec![0u8; len];
        Self::copy_in(&state.regions, addr, &mut out, false).then_some(out)
    }

    pub fn protection_at(&self, addr: u64) -> Option<Protection> {
        self.state
            .read()
            .regions
            .iter()
            .find(|r| addr >= r.start && addr < r.end())
            .map(|r| r.protection)
    }

    fn copy_in(regions: &[SimRegion], addr: u64, dst: &mut [u8], check: bool) -> bool {
        let mut cursor = addr;
        let mut done = 0usize;
        while done < dst.len() {
            let Some(region) = regions.iter().find(|r| cursor >= r.start && cursor < r.end()) else {
                return false;
            };
            if check && !region.protection.can_read() {
                return false;
            }
            let offset = (cursor - region.start) as usize;
            let n = (region.data.len() - offset).min(dst.len() - done);
            dst[done..done + n].copy_from_slice(&region.data[offset..offset + n]);
            done += n;
            cursor += n as u64;
        }
        true
    }

    fn copy_out(regions: &mut [SimRegion], addr: u64, src: &[u8], check: bool) -> bool {
        let mut cursor = addr;
        let mut done = 0usize;
        while done < src.len() {
            let Some(region) = regions.iter_mut().find(|r| cursor >= r.start && cursor < r.end()) else {
                return false;
            };
            if check && !region.protection.can_write() {
                return false;
            }
            let offset = (cursor - region.start) as usize;
            let n = (region.data.len() - offset).min(src.len() - done);
            region.data[offset..offset + n].copy_from_slice(&src[done..done + n]);
            done += n;
            cursor += n as u64;
        }
        true
    }

    fn split_at(regions: &mut Vec<SimRegion>, addr: u64) {
        if let Some(i) = regions.iter().position(|r| addr > r.start && addr < r.end()) {
            let at = (addr - regions[i].start) as usize;
            let tail = regions[i].data.split_off(at);
            let region = SimRegion {
                start: addr,
                data: tail,
                protection: regions[i].protection,
                name: regions[i].name.clone(),
            };
            regions.insert(i + 1, region);
        }
    }
}

impl ProcessApi for SimulatedProcess {
    fn processes(&self) -> Vec<ProcessInfo> {
        let state = self.state.read();
        if !state.alive {
            return Vec::new();
        }
        vec![ProcessInfo {
            id: state.pid,
            parent_id: 1,
            thread_count: 1,
            name: state.name.clone(),
        }]
    }

    fn open(&mut self, pid: u32) -> bool {
        let mut state = self.state.write();
        if pid != state.pid || !state.alive || state.deny_open {
            return false;
        }
        state.opened = true;
        true
    }

    fn close(&mut self) {
        self.state.write().opened = false;
    }

    fn is_alive(&self) -> bool {
        let state = self.state.read();
        state.opened && state.alive
    }

    fn is_64_bit(&self) -> bool {
        self.state.read().is_64_bit
    }

    fn modules(&self) -> Vec<ModuleInfo> {
        self.state.read().modules.clone()
    }

    fn read(&self, addr: u64, dst: &mut [u8]) -> bool {
        let state = self.state.read();
        state.opened && Self::copy_in(&state.regions, addr, dst, true)
    }

    fn write(&self, addr: u64, src: &[u8]) -> bool {
        let mut state = self.state.write();
        state.opened && Self::copy_out(&mut state.regions, addr, src, true)
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        self.state
            .read()
            .regions
            .iter()
            .map(|r| MemoryRegion::new(MemoryRange::new(r.start, r.end()), r.protection, r.name.clone()))
            .collect()
    }

    fn set_protection(&self, addr: u64, size: usize, protection: Protection) -> Option<Protection> {
        let mut state = self.state.write();
        let end = addr.checked_add(size as u64)?;
        Self::split_at(&mut state.regions, addr);
        Self::split_at(&mut state.regions, end);
        let mut previous = None;
        for region in state.regions.iter_mut().filter(|r| r.start >= addr && r.end() <= end) {
            previous.get_or_insert(region.protection);
            region.protection = protection;
        }
        previous
    }

    fn kill(&self, pid: u32) -> bool {
        let mut state = self.state.write();
        if pid != state.pid || !state.alive {
            return false;
        }
        state.alive = false;
        true
    }

    fn created_at(&self, pid: u32) -> u64 {
        let state = self.state.read();
        if pid == state.pid {
            state.created_at
        } else {
            0
        }
    }
}
