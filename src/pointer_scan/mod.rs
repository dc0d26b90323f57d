// Tue Oct 20 2026 - Alex

pub mod bits;
pub mod convert;
pub mod file;
pub mod header;
pub mod record;

pub use bits::bit_count;
pub use file::{result_path, PointerScanFile};
pub use header::{Compression, PointerScanHeader, MAX_LEVEL};
pub use record::PointerScanRecord;

use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Limits a pointer-scan file is sized for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerScanSettings {
    pub max_level: u32,
    pub max_offset: u64,
    pub compressed: bool,
    /// Offsets are multiples of 4 and packed without their low two bits.
    pub aligned: bool,
    /// Offsets every path ends with, in the order they are applied.
    pub ends_with: Vec<i64>,
}

impl Default for PointerScanSettings {
    fn default() -> Self {
        Self {
            max_level: 7,
            max_offset: 4095,
            compressed: true,
            aligned: true,
            ends_with: Vec::new(),
        }
    }
}

impl PointerScanSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_level == 0 || self.max_level > MAX_LEVEL {
            return Err(format!("max_level must be between 1 and {}", MAX_LEVEL));
        }
        if self.max_offset == 0 || self.max_offset > u32::MAX as u64 {
            return Err("max_offset must fit in 32 bits and be non-zero".to_string());
        }
        if self.ends_with.len() > self.max_level as usize {
            return Err("more ends_with offsets than max_level".to_string());
        }
        if self.ends_with.iter().any(|v| !(0..=u32::MAX as i64).contains(v)) {
            return Err("ends_with offsets must fit in 32 bits".to_string());
        }
        Ok(())
    }
}

impl From<&Config> for PointerScanSettings {
    fn from(config: &Config) -> Self {
        config.pointer_scan.clone()
    }
}
