// Tue Oct 20 2026 - Alex

use crate::memory::MemoryError;
use crate::pointer_scan::bits::{max_for_bits, BitReader, BitWriter};
use crate::pointer_scan::header::{Compression, PointerScanHeader};
use bytes::{Buf, BufMut};

/// One pointer path result: `module + module_offset`, then `offsets`
/// applied in order with a dereference before each.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointerScanRecord {
    pub module_index: u32,
    pub module_offset: u64,
    pub offsets: Vec<i64>,
}

impl PointerScanRecord {
    pub fn new(module_index: u32, module_offset: u64, offsets: Vec<i64>) -> Self {
        Self {
            module_index,
            module_offset,
            offsets,
        }
    }

    pub fn level(&self) -> usize {
        self.offsets.len()
    }

    /// Writes the record into `out`, which is exactly `header.entry_size()`
    /// zeroed bytes.
    pub(crate) fn encode(&self, header: &PointerScanHeader, out: &mut [u8]) -> Result<(), MemoryError> {
        if self.offsets.len() > header.max_level as usize {
            return Err(MemoryError::LimitExceeded(format!(
                "record has {} offsets, file allows {}",
                self.offsets.len(),
                header.max_level
            )));
        }
        if self.module_index as usize >= header.modules.len() {
            return Err(MemoryError::InvalidFormat(format!(
                "module index {} outside module table of {}",
                self.module_index,
                header.modules.len()
            )));
        }
        match &header.compression {
            Some(c) => self.encode_packed(c, out),
            None => self.encode_plain(header.max_level, out),
        }
    }

    fn encode_plain(&self, max_level: u32, mut out: &mut [u8]) -> Result<(), MemoryError> {
        let offsets = self
            .offsets
            .iter()
            .rev()
            .map(|&off| {
                i32::try_from(off)
                    .map_err(|_| MemoryError::LimitExceeded(format!("offset {:#x} does not fit in 32 bits", off)))
            })
            .collect::<Result<Vec<i32>, MemoryError>>()?;

        out.put_u32_le(self.module_index);
        out.put_u64_le(self.module_offset);
        out.put_u32_le(offsets.len() as u32);
        for off in offsets {
            out.put_i32_le(off);
        }
        for _ in self.offsets.len()..max_level as usize {
            out.put_u32_le(0xCECE_CECE);
        }
        Ok(())
    }

    fn encode_packed(&self, c: &Compression, out: &mut [u8]) -> Result<(), MemoryError> {
        let fits = |value: u64, bits: u8, what: &str| {
            if value > max_for_bits(bits as u32) {
                Err(MemoryError::LimitExceeded(format!("{} {:#x} needs more than {} bits", what, value, bits)))
            } else {
                Ok(())
            }
        };

        let ends = c.ends_with.len();
        let disk: Vec<i64> = self.offsets.iter().rev().copied().collect();
        if disk.len() < ends || disk.iter().zip(&c.ends_with).any(|(a, b)| *a != *b as i64) {
            return Err(MemoryError::LimitExceeded(
                "record does not end with the file's shared offsets".to_string(),
            ));
        }

        fits(self.module_offset, c.bits_module_offset, "module offset")?;
        fits(self.module_index as u64, c.bits_module_index, "module index")?;
        fits((disk.len() - ends) as u64, c.bits_level, "level")?;

        let mut writer = BitWriter::new(out);
        writer.write(self.module_offset, c.bits_module_offset as u32);
        writer.write(self.module_index as u64, c.bits_module_index as u32);
        writer.write((disk.len() - ends) as u64, c.bits_level as u32);
        for &off in &disk[ends..] {
            if off < 0 {
                return Err(MemoryError::LimitExceeded(format!("negative offset {} cannot be packed", off)));
            }
            let mut value = off as u64;
            if c.aligned {
                if value % 4 != 0 {
                    return Err(MemoryError::LimitExceeded(format!("offset {:#x} is not 4-byte aligned", off)));
                }
                value >>= 2;
            }
            fits(value, c.bits_offset, "offset")?;
            writer.write(value, c.bits_offset as u32);
        }
        Ok(())
    }

    pub(crate) fn decode(header: &PointerScanHeader, data: &[u8]) -> Result<Self, MemoryError> {
        let (module_index, module_offset, disk) = match &header.compression {
            Some(c) => {
                let mut reader = BitReader::new(data);
                let module_offset = reader.read(c.bits_module_offset as u32);
                let module_index = reader.read(c.bits_module_index as u32) as u32;
                let free = reader.read(c.bits_level as u32) as usize;
                let count = free + c.ends_with.len();
                if count > header.max_level as usize {
                    return Err(MemoryError::InvalidFormat(format!(
                        "record level {} exceeds max level {}",
                        count, header.max_level
                    )));
                }
                let mut disk: Vec<i64> = c.ends_with.iter().map(|v| *v as i64).collect();
                for _ in 0..free {
                    let value = reader.read(c.bits_offset as u32);
                    disk.push(if c.aligned { (value << 2) as i64 } else { value as i64 });
                }
                (module_index, module_offset, disk)
            }
            None => {
                let mut buf = data;
                let module_index = buf.get_u32_le();
                let module_offset = buf.get_u64_le();
                let count = buf.get_u32_le() as usize;
                if count > header.max_level as usize {
                    return Err(MemoryError::InvalidFormat(format!(
                        "record level {} exceeds max level {}",
                        count, header.max_level
                    )));
                }
                let disk = (0..count).map(|_| buf.get_i32_le() as i64).collect();
                (module_index, module_offset, disk)
            }
        };

        if module_index as usize >= header.modules.len() {
            return Err(MemoryError::InvalidFormat(format!(
                "record references module {} of {}",
                module_index,
                header.modules.len()
            )));
        }

        let mut offsets = disk;
        offsets.reverse();
        Ok(Self {
            module_index,
            module_offset,
            offsets,
        })
    }
}
