// Tue Oct 20 2026 - Alex

pub mod graph;
pub mod names;
pub mod registry;

pub use graph::{
    AddressGraph, AddressId, AddressKind, AddressNode, AddressType, Backup, DynamicPath, MIN_VALID_ADDRESS,
    UPDATE_ALL,
};
pub use names::NameTable;
pub use registry::UpdateRegistry;
