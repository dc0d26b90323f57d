// Mon Oct 19 2026 - Alex

pub mod binary;
pub mod buffer;
pub mod error;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod process;
pub mod protection;
pub mod range;
pub mod region;
pub mod scalar;
pub mod simulated;
pub mod traits;

pub use binary::{entry_point, ImageEntry, ImageFormat};
pub use buffer::Buffer;
pub use error::MemoryError;
#[cfg(target_os = "linux")]
pub use linux::LinuxProcessApi;
pub use process::{Arch, ProcessHandle};
pub use protection::{ProtectGuard, Protection};
pub use range::MemoryRange;
pub use region::{MemoryRegion, ModuleInfo, ProcessInfo};
pub use scalar::Scalar;
pub use simulated::SimulatedProcess;
pub use traits::ProcessApi;
