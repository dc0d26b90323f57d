// Mon Oct 19 2026 - Alex

use crate::memory::{MemoryRange, MemoryRegion, ModuleInfo, ProcessApi, ProcessInfo, Protection};
use ahash::AHashMap;
use log::{debug, trace};
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELF_CLASS_64: u8 = 2;

/// procfs-backed access to another process on Linux.
#[derive(Debug, Default)]
pub struct LinuxProcessApi {
    pid: u32,
    mem: Option<File>,
    is_64_bit: bool,
}

impl LinuxProcessApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn proc_path(&self, leaf: &str) -> String {
        format!("/proc/{}/{}", self.pid, leaf)
    }

    fn read_exe_class(pid: u32) -> Option<bool> {
        let file = File::open(format!("/proc/{}/exe", pid)).ok()?;
        let mut ident = [0u8; 5];
        file.read_exact_at(&mut ident, 0).ok()?;
        if ident[..4] != ELF_MAGIC {
            return None;
        }
        Some(ident[4] == ELF_CLASS_64)
    }

    fn process_name(pid: u32) -> Option<String> {
        if let Ok(exe) = fs::read_link(format!("/proc/{}/exe", pid)) {
            if let Some(name) = exe.file_name() {
                return Some(name.to_string_lossy().into_owned());
            }
        }
        fs::read_to_string(format!("/proc/{}/comm", pid))
            .ok()
            .map(|s| s.trim_end().to_string())
    }

    fn status_field(status: &str, key: &str) -> Option<u32> {
        status
            .lines()
            .find_map(|line| line.strip_prefix(key))
            .and_then(|rest| rest.trim_start_matches(':').trim().parse().ok())
    }
}

/// Parses the text of `/proc/<pid>/maps`.
pub fn parse_maps(text: &str) -> Vec<MemoryRegion> {
    text.lines().filter_map(parse_map_line).collect()
}

fn parse_map_line(line: &str) -> Option<MemoryRegion> {
    let mut parts = line.split_whitespace();
    let (start, end) = parts.next()?.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    let perms = parts.next()?.as_bytes();
    let protection = Protection::from_rwx(
        perms.first() == Some(&b'r'),
        perms.get(1) == Some(&b'w'),
        perms.get(2) == Some(&b'x'),
    );
    // offset, device, inode
    parts.nth(2)?;
    let path = parts.collect::<Vec<_>>().join(" ");
    Some(MemoryRegion::new(MemoryRange::new(start, end), protection, path))
}

/// Groups file-backed regions into modules keyed by file name.
pub fn modules_from_regions(regions: &[MemoryRegion]) -> Vec<ModuleInfo> {
    let mut spans: AHashMap<String, (u64, u64)> = AHashMap::new();
    let mut order = Vec::new();
    for region in regions.iter().filter(|r| r.name().starts_with('/')) {
        let name = Path::new(region.name())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let span = spans.entry(name.clone()).or_insert_with(|| {
            order.push(name);
            (region.start(), region.end())
        });
        span.0 = span.0.min(region.start());
        span.1 = span.1.max(region.end());
    }
    order
        .into_iter()
        .filter_map(|name| {
            let (base, end) = *spans.get(&name)?;
            Some(ModuleInfo::new(name, base, end - base))
        })
        .collect()
}

/// Field 22 (start time in clock ticks) of a `/proc/<pid>/stat` line.
pub fn parse_start_time(stat: &str) -> Option<u64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().nth(19)?.parse().ok()
}

impl ProcessApi for LinuxProcessApi {
    fn processes(&self) -> Vec<ProcessInfo> {
        let Ok(entries) = fs::read_dir("/proc") else {
            return Vec::new();
        };
        let mut out: Vec<ProcessInfo> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .filter_map(|pid| {
                let status = fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
                Some(ProcessInfo {
                    id: pid,
                    parent_id: Self::status_field(&status, "PPid").unwrap_or(0),
                    thread_count: Self::status_field(&status, "Threads").unwrap_or(1),
                    name: Self::process_name(pid)?,
                })
            })
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }

    fn open(&mut self, pid: u32) -> bool {
        self.close();
        let path = format!("/proc/{}/mem", pid);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .or_else(|_| File::open(&path));
        match file {
            Ok(file) => {
                self.pid = pid;
                self.mem = Some(file);
                self.is_64_bit = Self::read_exe_class(pid).unwrap_or(cfg!(target_pointer_width = "64"));
                debug!("Opened {} ({}-bit)", path, if self.is_64_bit { 64 } else { 32 });
                true
            }
            Err(e) => {
                debug!("Failed to open {}: {}", path, e);
                false
            }
        }
    }

    fn close(&mut self) {
        self.mem = None;
    }

    fn is_alive(&self) -> bool {
        self.mem.is_some() && Path::new(&self.proc_path("stat")).exists()
    }

    fn is_64_bit(&self) -> bool {
        self.is_64_bit
    }

    fn modules(&self) -> Vec<ModuleInfo> {
        modules_from_regions(&self.regions())
    }

    fn read(&self, addr: u64, dst: &mut [u8]) -> bool {
        match &self.mem {
            Some(mem) => mem.read_exact_at(dst, addr).is_ok(),
            None => false,
        }
    }

    fn write(&self, addr: u64, src: &[u8]) -> bool {
        match &self.mem {
            Some(mem) => mem.write_all_at(src, addr).is_ok(),
            None => false,
        }
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        if self.mem.is_none() {
            return Vec::new();
        }
        match fs::read_to_string(self.proc_path("maps")) {
            Ok(text) => parse_maps(&text),
            Err(e) => {
                trace!("Failed to read maps for {}: {}", self.pid, e);
                Vec::new()
            }
        }
    }

    fn set_protection(&self, _addr: u64, _size: usize, _protection: Protection) -> Option<Protection> {
        None
    }

    fn kill(&self, pid: u32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) == 0 }
    }

    fn created_at(&self, pid: u32) -> u64 {
        fs::read_to_string(format!("/proc/{}/stat", pid))
            .ok()
            .and_then(|s| parse_start_time(&s))
            .unwrap_or(0)
    }
}
