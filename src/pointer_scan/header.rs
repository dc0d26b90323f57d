// Tue Oct 20 2026 - Alex

use crate::memory::MemoryError;
use bytes::{Buf, BufMut, BytesMut};
use indexmap::IndexMap;

pub const MAGIC: u8 = 0xCE;
pub const MIN_VERSION: u8 = 2;
pub const CURRENT_VERSION: u8 = 2;
/// Deepest chain a record can hold.
pub const MAX_LEVEL: u32 = 16;

/// Bit widths and shared suffix of a compressed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compression {
    pub aligned: bool,
    pub bits_module_index: u8,
    pub bits_module_offset: u8,
    pub bits_level: u8,
    pub bits_offset: u8,
    /// Offsets every record ends with, in on-disk order (last applied first).
    pub ends_with: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerScanHeader {
    pub magic: u8,
    pub version: u8,
    /// Module name to the padding value stored after it.
    pub modules: IndexMap<String, u64>,
    pub max_level: u32,
    pub compression: Option<Compression>,
    pub did_base_range_scan: u8,
    pub original_base_scan_range: u64,
}

fn need(buf: &[u8], n: usize, what: &str) -> Result<(), MemoryError> {
    if buf.len() < n {
        return Err(MemoryError::InvalidFormat(format!("truncated header while reading {}", what)));
    }
    Ok(())
}

impl PointerScanHeader {
    pub fn parse(data: &[u8]) -> Result<Self, MemoryError> {
        let mut buf = data;

        need(buf, 2, "magic")?;
        let magic = buf.get_u8();
        if magic != MAGIC {
            return Err(MemoryError::InvalidFormat(format!("bad magic {:#04x}", magic)));
        }
        let version = buf.get_u8();
        if version < MIN_VERSION {
            return Err(MemoryError::UnsupportedVersion {
                found: version,
                minimum: MIN_VERSION,
            });
        }

        need(buf, 4, "module count")?;
        let module_count = buf.get_u32_le();
        let mut modules = IndexMap::new();
        for i in 0..module_count {
            need(buf, 4, "module name length")?;
            let len = buf.get_u32_le() as usize;
            need(buf, len + 8, "module name")?;
            let name = String::from_utf8_lossy(&buf[..len]).into_owned();
            buf.advance(len);
            let padding = buf.get_u64_le();
            if modules.insert(name.clone(), padding).is_some() {
                return Err(MemoryError::InvalidFormat(format!("module {} ({}) listed twice", i, name)));
            }
        }

        need(buf, 5, "level")?;
        let max_level = buf.get_u32_le();
        if max_level == 0 || max_level > MAX_LEVEL {
            return Err(MemoryError::InvalidFormat(format!("max level {} out of range", max_level)));
        }

        let compression = if buf.get_u8() != 0 {
            need(buf, 6, "compression")?;
            let aligned = buf.get_u8() != 0;
            let bits_module_index = buf.get_u8();
            let bits_module_offset = buf.get_u8();
            let bits_level = buf.get_u8();
            let bits_offset = buf.get_u8();
            let ends = buf.get_u8() as usize;
            need(buf, ends * 4, "ends-with offsets")?;
            let ends_with = (0..ends).map(|_| buf.get_u32_le()).collect();
            let compression = Compression {
                aligned,
                bits_module_index,
                bits_module_offset,
                bits_level,
                bits_offset,
                ends_with,
            };
            compression.check(max_level)?;
            Some(compression)
        } else {
            None
        };

        need(buf, 1, "base range flag")?;
        let did_base_range_scan = buf.get_u8();
        let original_base_scan_range = if did_base_range_scan != 0 {
            need(buf, 8, "base range")?;
            buf.get_u64_le()
        } else {
            0
        };

        Ok(Self {
            magic,
            version,
            modules,
            max_level,
            compression,
            did_base_range_scan,
            original_base_scan_range,
        })
    }

    pub fn to_bytes(&self) -> Result<BytesMut, MemoryError> {
        let mut out = BytesMut::with_capacity(64);
        out.put_u8(self.magic);
        out.put_u8(self.version);
        out.put_u32_le(self.modules.len() as u32);
        for (name, padding) in &self.modules {
            out.put_u32_le(name.len() as u32);
            out.put_slice(name.as_bytes());
            out.put_u64_le(*padding);
        }
        out.put_u32_le(self.max_level);
        match &self.compression {
            Some(c) => {
                c.check(self.max_level)?;
                out.put_u8(1);
                out.put_u8(c.aligned as u8);
                out.put_u8(c.bits_module_index);
                out.put_u8(c.bits_module_offset);
                out.put_u8(c.bits_level);
                out.put_u8(c.bits_offset);
                out.put_u8(c.ends_with.len() as u8);
                for v in &c.ends_with {
                    out.put_u32_le(*v);
                }
            }
            None => out.put_u8(0),
        }
        out.put_u8(self.did_base_range_scan);
        if self.did_base_range_scan != 0 {
            out.put_u64_le(self.original_base_scan_range);
        }
        Ok(out)
    }

    /// On-disk size of one record.
    pub fn entry_size(&self) -> usize {
        match &self.compression {
            Some(c) => {
                let free = (self.max_level as usize).saturating_sub(c.ends_with.len());
                let bits = c.bits_module_offset as usize
                    + c.bits_module_index as usize
                    + c.bits_level as usize
                    + c.bits_offset as usize * free;
                bits.div_ceil(8)
            }
            None => 16 + 4 * self.max_level as usize,
        }
    }
}

impl Compression {
    fn check(&self, max_level: u32) -> Result<(), MemoryError> {
        if self.ends_with.len() > max_level as usize {
            return Err(MemoryError::InvalidFormat(format!(
                "{} ends-with offsets exceed max level {}",
                self.ends_with.len(),
                max_level
            )));
        }
        if self.bits_module_offset > 64
            || self.bits_module_index > 32
            || self.bits_level > 32
            || self.bits_offset > 32
        {
            return Err(MemoryError::InvalidFormat("field bit width out of range".to_string()));
        }
        Ok(())
    }
}
