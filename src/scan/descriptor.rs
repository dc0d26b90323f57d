// Wed Oct 21 2026 - Alex

use crate::memory::{MemoryError, Protection, Scalar};
use regex::bytes::Regex;
use std::any::{type_name, TypeId};
use std::fmt;

const INLINE_VALUE_SIZE: usize = 16;

#[derive(Clone)]
enum ScanValue {
    Inline([u8; INLINE_VALUE_SIZE], usize),
    Heap(Vec<u8>),
}

impl ScanValue {
    fn new(bytes: &[u8]) -> Self {
        if bytes.len() <= INLINE_VALUE_SIZE {
            let mut data = [0u8; INLINE_VALUE_SIZE];
            data[..bytes.len()].copy_from_slice(bytes);
            ScanValue::Inline(data, bytes.len())
        } else {
            ScanValue::Heap(bytes.to_vec())
        }
    }

    fn as_slice(&self) -> &[u8] {
        match self {
            ScanValue::Inline(data, len) => &data[..*len],
            ScanValue::Heap(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// Fixed-width value compared at value-size aligned addresses.
    Value,
    /// Byte string compared at every offset.
    Bytes,
    /// Regular expression over raw bytes.
    Regex,
}

/// What to search for and where.
#[derive(Clone)]
pub struct Scan {
    value: ScanValue,
    type_id: TypeId,
    type_name: &'static str,
    kind: ScanKind,
    regex: Option<Regex>,
    begin: u64,
    size: u64,
    max_results: usize,
    read: bool,
    write: bool,
    execute: bool,
    protection: Option<Protection>,
    threaded: bool,
}

impl Scan {
    fn build(
        bytes: &[u8],
        type_id: TypeId,
        type_name: &'static str,
        kind: ScanKind,
        begin: u64,
        size: u64,
    ) -> Result<Self, MemoryError> {
        if bytes.is_empty() {
            return Err(MemoryError::InvalidScan("scan value must not be empty".to_string()));
        }
        let regex = match kind {
            ScanKind::Regex => Some(compile(bytes)?),
            _ => None,
        };
        Ok(Self {
            value: ScanValue::new(bytes),
            type_id,
            type_name,
            kind,
            regex,
            begin,
            size,
            max_results: 0,
            read: true,
            write: false,
            execute: false,
            protection: None,
            threaded: true,
        })
    }

    pub fn value<T: Scalar>(value: T, begin: u64, size: u64) -> Self {
        Self {
            value: ScanValue::new(&value.to_vec()),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            kind: ScanKind::Value,
            regex: None,
            begin,
            size,
            max_results: 0,
            read: true,
            write: false,
            execute: false,
            protection: None,
            threaded: true,
        }
    }

    pub fn bytes(bytes: &[u8], begin: u64, size: u64) -> Result<Self, MemoryError> {
        Self::build(bytes, TypeId::of::<Vec<u8>>(), "bytes", ScanKind::Bytes, begin, size)
    }

    pub fn string(value: &str, begin: u64, size: u64) -> Result<Self, MemoryError> {
        Self::build(value.as_bytes(), TypeId::of::<String>(), "string", ScanKind::Bytes, begin, size)
    }

    pub fn regex(pattern: &str, begin: u64, size: u64) -> Result<Self, MemoryError> {
        Self::build(pattern.as_bytes(), TypeId::of::<String>(), "string", ScanKind::Regex, begin, size)
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Regions qualify when they grant any of the requested accesses. At
    /// least one must be requested.
    pub fn with_access(mut self, read: bool, write: bool, execute: bool) -> Result<Self, MemoryError> {
        if !(read || write || execute) {
            return Err(MemoryError::InvalidScan(
                "one of read, write or execute must be set".to_string(),
            ));
        }
        self.read = read;
        self.write = write;
        self.execute = execute;
        Ok(self)
    }

    /// Protection forced on each block while it is read. Every committed
    /// region is scanned when this is set.
    pub fn with_protection(mut self, protection: Protection) -> Self {
        self.protection = Some(protection);
        self
    }

    pub fn with_threaded(mut self, threaded: bool) -> Self {
        self.threaded = threaded;
        self
    }

    pub fn set_value<T: Scalar>(&mut self, value: T) -> Result<(), MemoryError> {
        self.check_type(TypeId::of::<T>(), type_name::<T>())?;
        self.value = ScanValue::new(&value.to_vec());
        Ok(())
    }

    pub fn set_bytes(&mut self, bytes: &[u8]) -> Result<(), MemoryError> {
        self.check_type(TypeId::of::<Vec<u8>>(), "bytes")?;
        self.replace_bytes(bytes)
    }

    pub fn set_string(&mut self, value: &str) -> Result<(), MemoryError> {
        self.check_type(TypeId::of::<String>(), "string")?;
        self.replace_bytes(value.as_bytes())
    }

    fn replace_bytes(&mut self, bytes: &[u8]) -> Result<(), MemoryError> {
        if bytes.is_empty() {
            return Err(MemoryError::InvalidScan("scan value must not be empty".to_string()));
        }
        if self.kind == ScanKind::Regex {
            self.regex = Some(compile(bytes)?);
        }
        self.value = ScanValue::new(bytes);
        Ok(())
    }

    fn check_type(&self, type_id: TypeId, name: &str) -> Result<(), MemoryError> {
        if type_id != self.type_id {
            return Err(MemoryError::InvalidScan(format!(
                "cannot change scan value type from {} to {}",
                self.type_name, name
            )));
        }
        Ok(())
    }

    pub fn value_bytes(&self) -> &[u8] {
        self.value.as_slice()
    }

    pub fn value_size(&self) -> usize {
        self.value.as_slice().len()
    }

    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    pub fn is_regex(&self) -> bool {
        self.kind == ScanKind::Regex
    }

    pub(crate) fn compiled_regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn begin(&self) -> u64 {
        self.begin
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn access(&self) -> (bool, bool, bool) {
        (self.read, self.write, self.execute)
    }

    pub fn protection(&self) -> Option<Protection> {
        self.protection
    }

    pub fn threaded(&self) -> bool {
        self.threaded
    }
}

fn compile(pattern: &[u8]) -> Result<Regex, MemoryError> {
    let pattern = std::str::from_utf8(pattern)
        .map_err(|_| MemoryError::InvalidScan("regex pattern must be valid UTF-8".to_string()))?;
    Regex::new(pattern).map_err(|e| MemoryError::InvalidScan(format!("invalid regex: {}", e)))
}

impl fmt::Debug for Scan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scan")
            .field("type", &self.type_name)
            .field("kind", &self.kind)
            .field("value_size", &self.value_size())
            .field("begin", &format_args!("{:#x}", self.begin))
            .field("size", &format_args!("{:#x}", self.size))
            .field("max_results", &self.max_results)
            .field("threaded", &self.threaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_is_checked() {
        let mut scan = Scan::value(10u32, 0, 0x1000);
        assert_eq!(scan.value_bytes(), &10u32.to_ne_bytes());
        scan.set_value(11u32).unwrap();
        assert_eq!(scan.value_bytes(), &11u32.to_ne_bytes());
        assert!(matches!(scan.set_value(11i32), Err(MemoryError::InvalidScan(_))));
        assert!(scan.set_string("x").is_err());
    }

    #[test]
    fn test_large_values_go_to_heap() {
        let long = "a".repeat(40);
        let mut scan = Scan::string(&long, 0, 0x1000).unwrap();
        assert_eq!(scan.value_size(), 40);
        scan.set_string("short").unwrap();
        assert_eq!(scan.value_bytes(), b"short");
        assert!(scan.set_bytes(b"abc").is_err());
    }

    #[test]
    fn test_access_required() {
        let scan = Scan::value(1u8, 0, 16);
        assert!(scan.clone().with_access(false, false, false).is_err());
        let scan = scan.with_access(false, true, false).unwrap();
        assert_eq!(scan.access(), (false, true, false));
    }

    #[test]
    fn test_regex_compiles() {
        assert!(Scan::regex("he(l+)o", 0, 16).is_ok());
        assert!(matches!(Scan::regex("he(l+o", 0, 16), Err(MemoryError::InvalidScan(_))));
        assert!(Scan::bytes(&[], 0, 16).is_err());
    }
}
