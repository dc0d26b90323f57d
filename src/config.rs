// Tue Oct 20 2026 - Alex

use crate::memory::MemoryError;
use crate::pointer_scan::PointerScanSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const SCAN_BLOCK_SIZE_BASIC: usize = 256 * 1024;
pub const SCAN_BLOCK_SIZE_STRING: usize = 2 * 1024 * 1024;
pub const REGEX_SCAN_OVERLAP: usize = 4096;
pub const MIN_SCAN_SIZE_FOR_THREADING: u64 = 2 * 1024 * 1024;
pub const MIN_SCAN_REGIONS_PER_THREAD: usize = 32;
pub const MIN_RESULTS_PER_FILE: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker threads requested for a threaded scan, before the
    /// region-count heuristic raises it.
    pub scan_threads: usize,
    pub max_threads: usize,
    pub basic_block_size: usize,
    pub string_block_size: usize,
    /// Bytes past each block a regex scan also reads. Regex matches longer
    /// than this that cross a block boundary are missed.
    pub regex_overlap: usize,
    pub threading_threshold: u64,
    pub min_regions_per_thread: usize,
    pub min_results_per_file: usize,
    pub pointer_scan: PointerScanSettings,
    pub enable_verbose_output: bool,
    pub enable_progress_bars: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_threads: 1,
            max_threads: num_cpus::get(),
            basic_block_size: SCAN_BLOCK_SIZE_BASIC,
            string_block_size: SCAN_BLOCK_SIZE_STRING,
            regex_overlap: REGEX_SCAN_OVERLAP,
            threading_threshold: MIN_SCAN_SIZE_FOR_THREADING,
            min_regions_per_thread: MIN_SCAN_REGIONS_PER_THREAD,
            min_results_per_file: MIN_RESULTS_PER_FILE,
            pointer_scan: PointerScanSettings::default(),
            enable_verbose_output: false,
            enable_progress_bars: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MemoryError> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| MemoryError::InvalidFormat(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate().map_err(MemoryError::InvalidFormat)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MemoryError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| MemoryError::InvalidFormat(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_threads = threads;
        self
    }

    pub fn with_scan_threads(mut self, threads: usize) -> Self {
        self.scan_threads = threads;
        self
    }

    pub fn with_threading_threshold(mut self, bytes: u64) -> Self {
        self.threading_threshold = bytes;
        self
    }

    pub fn with_pointer_scan(mut self, settings: PointerScanSettings) -> Self {
        self.pointer_scan = settings;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_threads == 0 || self.scan_threads == 0 {
            return Err("thread counts must be greater than 0".to_string());
        }
        if self.basic_block_size == 0 || self.string_block_size == 0 {
            return Err("scan block sizes must be greater than 0".to_string());
        }
        if self.min_regions_per_thread == 0 {
            return Err("min_regions_per_thread must be greater than 0".to_string());
        }
        if self.min_results_per_file == 0 {
            return Err("min_results_per_file must be greater than 0".to_string());
        }
        self.pointer_scan.validate()
    }
}
