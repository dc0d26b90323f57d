// Mon Oct 19 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Process not found: {0}")]
    ProcessNotFound(String),
    #[error("Module not found: {0}")]
    ModuleNotFound(String),
    #[error("Failed to attach to process {0}")]
    AttachFailed(u32),
    #[error("Not attached to a process")]
    NotAttached,
    #[error("Out of bounds: offset {offset} + size {size} exceeds {limit}")]
    OutOfBounds { offset: usize, size: usize, limit: usize },
    #[error("Wrong address kind: {0}")]
    WrongAddressKind(String),
    #[error("Invalid address id: {0}")]
    InvalidAddressId(u32),
    #[error("Address {0} is still referenced by other addresses")]
    HasDependents(u32),
    #[error("Cyclic address dependency at {0}")]
    CyclicDependency(u32),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Unsupported version {found} (minimum {minimum})")]
    UnsupportedVersion { found: u8, minimum: u8 },
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
    #[error("Invalid scan: {0}")]
    InvalidScan(String),
    #[error("Binary parse error: {0}")]
    BinaryParseError(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl MemoryError {
    pub fn out_of_bounds(offset: usize, size: usize, limit: usize) -> Self {
        Self::OutOfBounds { offset, size, limit }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProcessNotFound(_) | Self::ModuleNotFound(_))
    }
}
