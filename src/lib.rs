// Mon Oct 19 2026 - Alex

pub mod address;
pub mod config;
pub mod decode;
pub mod memory;
pub mod pointer_scan;
pub mod scan;
pub mod utils;

pub use address::{AddressGraph, AddressId, AddressType};
pub use config::Config;
pub use decode::InstructionDecoder;
pub use memory::{Buffer, MemoryError, ProcessHandle, Protection};
pub use pointer_scan::{PointerScanFile, PointerScanRecord, PointerScanSettings};
pub use scan::{Scan, Scanner};
