// Mon Oct 19 2026 - Alex

use crate::memory::MemoryError;
use goblin::mach::Mach;
use goblin::Object;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Elf,
    Pe,
    MachO,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageEntry {
    pub format: ImageFormat,
    pub is_64_bit: bool,
    /// Entry point relative to the image base for PE, absolute for ELF and Mach-O.
    pub entry: u64,
}

/// Reads the entry point of an executable on disk.
pub fn entry_point<P: AsRef<Path>>(path: P) -> Result<ImageEntry, MemoryError> {
    let data = fs::read(path.as_ref())?;
    parse_entry(&data)
}

pub fn parse_entry(data: &[u8]) -> Result<ImageEntry, MemoryError> {
    let object = Object::parse(data)
        .map_err(|e| MemoryError::BinaryParseError(format!("Failed to parse image: {}", e)))?;

    match object {
        Object::Elf(elf) => Ok(ImageEntry {
            format: ImageFormat::Elf,
            is_64_bit: elf.is_64,
            entry: elf.entry,
        }),
        Object::PE(pe) => Ok(ImageEntry {
            format: ImageFormat::Pe,
            is_64_bit: pe.is_64,
            entry: pe.entry as u64,
        }),
        Object::Mach(Mach::Binary(macho)) => Ok(ImageEntry {
            format: ImageFormat::MachO,
            is_64_bit: macho.is_64,
            entry: macho.entry,
        }),
        Object::Mach(Mach::Fat(_)) => Err(MemoryError::BinaryParseError(
            "Fat binaries not supported".to_string(),
        )),
        _ => Err(MemoryError::BinaryParseError(
            "Unrecognized executable format".to_string(),
        )),
    }
}
