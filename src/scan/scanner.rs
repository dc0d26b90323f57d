// Wed Oct 21 2026 - Alex

use crate::config::Config;
use crate::memory::process::read_span;
use crate::memory::{MemoryError, MemoryRange, MemoryRegion, ProcessHandle};
use crate::scan::{Matcher, Scan, ScanKind};
use crate::utils::logging::ScopedTimer;
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

/// Largest value `scan_reduce` re-reads per address.
pub const MAX_REDUCE_VALUE_SIZE: usize = 64;

pub struct Scanner<'p> {
    process: &'p ProcessHandle,
    config: Config,
}

impl<'p> Scanner<'p> {
    pub fn new(process: &'p ProcessHandle) -> Self {
        Self::with_config(process, &Config::default())
    }

    pub fn with_config(process: &'p ProcessHandle, config: &Config) -> Self {
        Self {
            process,
            config: config.clone(),
        }
    }

    pub fn process(&self) -> &'p ProcessHandle {
        self.process
    }

    fn block_size(&self, scan: &Scan) -> usize {
        match scan.kind() {
            ScanKind::Value => self.config.basic_block_size,
            ScanKind::Bytes | ScanKind::Regex => self.config.string_block_size,
        }
    }

    /// Bytes read past each block so a match starting near its end is
    /// still seen whole.
    fn overlap(&self, scan: &Scan) -> usize {
        match scan.kind() {
            ScanKind::Value | ScanKind::Bytes => scan.value_size().saturating_sub(1),
            ScanKind::Regex => self.config.regex_overlap,
        }
    }

    fn scan_regions(&self, scan: &Scan) -> Vec<MemoryRegion> {
        let (read, write, execute) = scan.access();
        let forced = scan.protection().is_some();
        self.process
            .regions_in(scan.begin(), scan.size())
            .into_iter()
            .filter(|r| forced || r.protection().grants_any(read, write, execute))
            .collect()
    }

    /// Addresses in the scan window whose bytes match the scan value.
    ///
    /// Results from a single-threaded scan are in address order; a threaded
    /// scan returns them in no particular order.
    pub fn scan(&self, scan: &Scan) -> Vec<u64> {
        let _timer = ScopedTimer::new("scan");
        let regions = self.scan_regions(scan);
        let window = MemoryRange::from_start_size(scan.begin(), scan.size());

        let results = if !scan.threaded() || scan.size() <= self.config.threading_threshold {
            self.scan_single(scan, &regions, window)
        } else {
            self.scan_threaded(scan, &regions, window)
        };
        debug!(
            "Scan for {} ({} bytes) found {} results in {} regions",
            scan.type_name(),
            scan.value_size(),
            results.len(),
            regions.len()
        );
        results
    }

    fn scan_single(&self, scan: &Scan, regions: &[MemoryRegion], window: MemoryRange) -> Vec<u64> {
        let matcher = Matcher::new(scan);
        let max = scan.max_results();
        let mut results = Vec::new();
        self.process.walk_regions(
            regions,
            window,
            scan.protection(),
            true,
            self.block_size(scan),
            self.overlap(scan),
            |start, len, data| match data {
                Some(data) => matcher.find(start, data, len, |addr| {
                    results.push(addr);
                    max != 0 && results.len() >= max
                }),
                None => false,
            },
        );
        results
    }

    fn scan_threaded(&self, scan: &Scan, regions: &[MemoryRegion], window: MemoryRange) -> Vec<u64> {
        let block_size = self.block_size(scan) as u64;
        let overlap = self.overlap(scan);
        // each block with the number of bytes to read from its start
        let blocks: Vec<(MemoryRange, usize)> = regions
            .iter()
            .filter_map(|r| r.range().intersect(&window))
            .flat_map(|r| {
                r.blocks(block_size)
                    .map(|b| (b, read_span(&b, &r, overlap)))
                    .collect::<Vec<_>>()
            })
            .collect();

        let n_threads = self
            .config
            .scan_threads
            .max(1 + blocks.len() / self.config.min_regions_per_thread.max(1))
            .min(self.config.max_threads)
            .max(1);
        debug!("Scanning {} blocks on {} threads", blocks.len(), n_threads);

        let matcher = Matcher::new(scan);
        let max = scan.max_results();
        let next = AtomicUsize::new(0);
        let done = AtomicBool::new(false);
        let results = Mutex::new(Vec::new());

        thread::scope(|s| {
            for _ in 0..n_threads {
                s.spawn(|| {
                    let mut data = Vec::new();
                    while !done.load(Ordering::Acquire) {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some((block, span)) = blocks.get(i) else {
                            done.store(true, Ordering::Release);
                            return;
                        };
                        let span = *span;
                        data.resize(span, 0);
                        let ok = {
                            let _guard = scan.protection().map(|p| self.process.protect(block.start(), span, p));
                            self.process.read(block.start(), &mut data[..span])
                        };
                        if !ok {
                            trace!("Skipping unreadable block {}", block);
                            continue;
                        }
                        let stop = matcher.find(block.start(), &data[..span], block.size() as usize, |addr| {
                            let mut results = results.lock();
                            if max != 0 && results.len() >= max {
                                return true;
                            }
                            results.push(addr);
                            max != 0 && results.len() >= max
                        });
                        if stop {
                            done.store(true, Ordering::Release);
                            return;
                        }
                    }
                });
            }
        });

        results.into_inner()
    }

    /// Keeps the previous matches whose bytes still equal the scan value.
    pub fn scan_reduce(&self, previous: &[u64], scan: &Scan) -> Result<Vec<u64>, MemoryError> {
        if scan.is_regex() {
            return Err(MemoryError::InvalidScan("regex scans cannot be reduced".to_string()));
        }
        let value = scan.value_bytes();
        if value.len() > MAX_REDUCE_VALUE_SIZE {
            return Err(MemoryError::LimitExceeded(format!(
                "reduce supports values up to {} bytes, got {}",
                MAX_REDUCE_VALUE_SIZE,
                value.len()
            )));
        }

        let mut raw = [0u8; MAX_REDUCE_VALUE_SIZE];
        let current = &mut raw[..value.len()];
        let mut results = Vec::with_capacity(previous.len());
        for &addr in previous {
            let _guard = scan.protection().map(|p| self.process.protect(addr, value.len(), p));
            if self.process.read(addr, current) && current == value {
                results.push(addr);
            }
        }
        debug!("Reduced {} results to {}", previous.len(), results.len());
        Ok(results)
    }

    /// Scans, then repeatedly lets `modify` change the scan value or the
    /// target and narrows the results, until `modify` returns `false`.
    pub fn scan_modify<F>(&self, scan: &mut Scan, mut modify: F) -> Result<Vec<u64>, MemoryError>
    where
        F: FnMut(&mut Scan) -> bool,
    {
        let mut results = self.scan(scan);
        loop {
            let keep_going = modify(scan);
            results = self.scan_reduce(&results, scan)?;
            if !keep_going {
                break;
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SCAN_BLOCK_SIZE_STRING;
    use crate::memory::{Protection, SimulatedProcess};

    fn fixture() -> (SimulatedProcess, ProcessHandle) {
        let sim = SimulatedProcess::new(77, "target");
        sim.map_region(0x10000, 0x10000, Protection::READ_WRITE, "heap");
        sim.map_region(0x30000, 0x1000, Protection::READ_ONLY, "rodata");
        sim.map_region(0x40000, 0x1000, Protection::NO_ACCESS, "guard");
        let mut process = ProcessHandle::new(sim.clone());
        assert!(process.attach(77).unwrap());
        (sim, process)
    }

    #[test]
    fn test_scan_finds_written_value() {
        let (_sim, process) = fixture();
        assert!(process.write_value(0x12344, 0xDEADBEEFu32));
        let scanner = Scanner::new(&process);
        let scan = Scan::value(0xDEADBEEFu32, 0x10000, 0x40000);
        assert_eq!(scanner.scan(&scan), vec![0x12344]);
    }

    #[test]
    fn test_scan_skips_unaligned_and_filters_protection() {
        let (sim, process) = fixture();
        sim.poke(0x12346, &7u32.to_ne_bytes());
        sim.poke(0x30010, &7u32.to_ne_bytes());
        sim.poke(0x40010, &7u32.to_ne_bytes());
        let scanner = Scanner::new(&process);

        let read = Scan::value(7u32, 0, u64::MAX).with_threaded(false);
        assert_eq!(scanner.scan(&read), vec![0x30010]);

        let writable = Scan::value(7u32, 0, u64::MAX).with_access(false, true, false).unwrap();
        assert!(scanner.scan(&writable).is_empty());

        let forced = Scan::value(7u32, 0, u64::MAX).with_protection(Protection::READ_WRITE);
        let mut found = scanner.scan(&forced);
        found.sort_unstable();
        assert_eq!(found, vec![0x30010, 0x40010]);
        assert_eq!(sim.protection_at(0x40000), Some(Protection::NO_ACCESS));
    }

    #[test]
    fn test_string_and_regex_scans() {
        let (sim, process) = fixture();
        sim.poke(0x10003, b"player_one");
        sim.poke(0x10101, b"player_two");
        let scanner = Scanner::new(&process);
        let s = Scan::string("player_", 0x10000, 0x1000).unwrap();
        assert_eq!(scanner.scan(&s), vec![0x10003, 0x10101]);
        let r = Scan::regex("player_t[a-z]+", 0x10000, 0x1000).unwrap();
        assert_eq!(scanner.scan(&r), vec![0x10101]);
    }

    fn large_fixture() -> (SimulatedProcess, ProcessHandle) {
        let sim = SimulatedProcess::new(78, "target");
        sim.map_region(0x1000_0000, 0x40_0000, Protection::READ_WRITE, "heap");
        let mut process = ProcessHandle::new(sim.clone());
        assert!(process.attach(78).unwrap());
        (sim, process)
    }

    fn scan_both_ways(process: &ProcessHandle, scan: &Scan) -> (Vec<u64>, Vec<u64>) {
        let single = Scanner::new(process).scan(&scan.clone().with_threaded(false));
        let config = Config::default().with_threading_threshold(0).with_max_threads(4);
        let mut threaded = Scanner::with_config(process, &config).scan(scan);
        threaded.sort_unstable();
        (single, threaded)
    }

    #[test]
    fn test_string_across_block_edge() {
        let (sim, process) = large_fixture();
        let edge = 0x1000_0000 + SCAN_BLOCK_SIZE_STRING as u64;
        sim.poke(edge - 3, b"player_one");
        let scan = Scan::string("player_one", 0x1000_0000, 0x40_0000).unwrap();
        let (single, threaded) = scan_both_ways(&process, &scan);
        assert_eq!(single, vec![edge - 3]);
        assert_eq!(threaded, vec![edge - 3]);
    }

    #[test]
    fn test_regex_across_block_edge_reported_once() {
        let (sim, process) = large_fixture();
        let edge = 0x1000_0000 + SCAN_BLOCK_SIZE_STRING as u64;
        sim.poke(edge - 4, b"player_one");
        // read by the first block as well, but it starts in the second
        sim.poke(edge + 0x20, b"player_two");
        let scan = Scan::regex("player_[a-z]+", 0x1000_0000, 0x40_0000).unwrap();
        let (single, threaded) = scan_both_ways(&process, &scan);
        assert_eq!(single, vec![edge - 4, edge + 0x20]);
        assert_eq!(threaded, single);
    }

    #[test]
    fn test_value_across_block_edge_with_unaligned_begin() {
        let (sim, process) = large_fixture();
        sim.poke(0x1004_0000, &0xDEADBEEFu32.to_ne_bytes());
        // blocks start at 0x1000_0001, so the second one begins at 0x1004_0001
        let scan = Scan::value(0xDEADBEEFu32, 0x1000_0001, 0x10_0000 - 1);
        let (single, threaded) = scan_both_ways(&process, &scan);
        assert_eq!(single, vec![0x1004_0000]);
        assert_eq!(threaded, vec![0x1004_0000]);
    }

    #[test]
    fn test_max_results() {
        let (_sim, process) = fixture();
        let scanner = Scanner::new(&process);
        let scan = Scan::value(0u64, 0x10000, 0x10000).with_max_results(5);
        assert_eq!(scanner.scan(&scan), vec![0x10000, 0x10008, 0x10010, 0x10018, 0x10020]);
    }

    #[test]
    fn test_threaded_matches_single() {
        let (sim, process) = fixture();
        let expected: Vec<u64> = (0..40).map(|i| 0x10000 + i * 0x300 + 4).collect();
        for &addr in &expected {
            sim.poke(addr, &0x5A5A5A5Au32.to_ne_bytes());
        }
        let mut config = Config::default().with_threading_threshold(0).with_max_threads(4);
        config.basic_block_size = 0x400;
        let scanner = Scanner::with_config(&process, &config);

        let single = scanner.scan(&Scan::value(0x5A5A5A5Au32, 0x10000, 0x40000).with_threaded(false));
        assert_eq!(single, expected);

        let mut threaded = scanner.scan(&Scan::value(0x5A5A5A5Au32, 0x10000, 0x40000));
        threaded.sort_unstable();
        assert_eq!(threaded, expected);

        let capped = scanner.scan(&Scan::value(0x5A5A5A5Au32, 0x10000, 0x40000).with_max_results(7));
        assert_eq!(capped.len(), 7);
    }

    #[test]
    fn test_scan_modify_narrows() {
        let (sim, process) = fixture();
        let a = 0x11000u64;
        let b = 0x12000u64;
        let c = 0x13000u64;
        for addr in [a, b, c] {
            sim.poke(addr, &10u32.to_ne_bytes());
        }
        let scanner = Scanner::new(&process);
        let mut scan = Scan::value(10u32, 0x10000, 0x10000);
        let mut round = 0;
        let results = scanner
            .scan_modify(&mut scan, |scan| {
                round += 1;
                match round {
                    1 => {
                        scan.set_value(11u32).unwrap();
                        sim.poke(a, &11u32.to_ne_bytes());
                        sim.poke(b, &11u32.to_ne_bytes());
                        true
                    }
                    _ => {
                        scan.set_value(12u32).unwrap();
                        sim.poke(b, &12u32.to_ne_bytes());
                        false
                    }
                }
            })
            .unwrap();
        assert_eq!(round, 2);
        assert_eq!(results, vec![b]);
    }

    #[test]
    fn test_reduce_limits() {
        let (_sim, process) = fixture();
        let scanner = Scanner::new(&process);
        let regex = Scan::regex("a", 0, 16).unwrap();
        assert!(matches!(scanner.scan_reduce(&[0x10000], &regex), Err(MemoryError::InvalidScan(_))));
        let big = Scan::bytes(&[1u8; 65], 0, 16).unwrap();
        assert!(matches!(scanner.scan_reduce(&[0x10000], &big), Err(MemoryError::LimitExceeded(_))));
        let zero = Scan::value(0u32, 0, 16);
        assert_eq!(scanner.scan_reduce(&[0x10000, 0x50000], &zero).unwrap(), vec![0x10000]);
    }
}
