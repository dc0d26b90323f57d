// Wed Oct 21 2026 - Alex

pub mod descriptor;
pub mod matcher;
pub mod scanner;

pub use descriptor::{Scan, ScanKind};
pub(crate) use matcher::Matcher;
pub use scanner::{Scanner, MAX_REDUCE_VALUE_SIZE};
