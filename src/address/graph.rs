// Tue Oct 20 2026 - Alex

use crate::address::{NameTable, UpdateRegistry};
use crate::memory::{MemoryError, ProcessHandle};
use log::{debug, warn};
use std::fmt;

pub const UPDATE_ALL: u32 = u32::MAX;

/// Dynamic results below this are treated as unresolved and trigger backups.
pub const MIN_VALID_ADDRESS: u64 = 0x10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressId {
    index: u32,
    generation: u32,
}

impl AddressId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    Manual,
    Static,
    Dynamic,
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Manual => write!(f, "manual"),
            AddressType::Static => write!(f, "static"),
            AddressType::Dynamic => write!(f, "dynamic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub parent: AddressId,
    pub offsets: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicPath {
    pub parent: AddressId,
    pub offsets: Vec<i64>,
    pub add_first_offset_to_parent: bool,
    pub backups: Vec<Backup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressKind {
    Manual,
    Static { module_name: String, offset: u64 },
    Dynamic(DynamicPath),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

#[derive(Debug, Clone)]
pub struct AddressNode {
    kind: AddressKind,
    value: u64,
    state: LoadState,
    name_handle: u32,
    update_mask: u32,
    auto_update: bool,
}

impl AddressNode {
    fn new(kind: AddressKind, value: u64, state: LoadState) -> Self {
        Self {
            kind,
            value,
            state,
            name_handle: NameTable::EMPTY,
            update_mask: UPDATE_ALL,
            auto_update: false,
        }
    }

    pub fn kind(&self) -> &AddressKind {
        &self.kind
    }

    pub fn address_type(&self) -> AddressType {
        match self.kind {
            AddressKind::Manual => AddressType::Manual,
            AddressKind::Static { .. } => AddressType::Static,
            AddressKind::Dynamic(_) => AddressType::Dynamic,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn update_mask(&self) -> u32 {
        self.update_mask
    }

    pub fn auto_updates(&self) -> bool {
        self.auto_update
    }
}

/// Same type and same resolved value, regardless of how it was reached.
impl PartialEq for AddressNode {
    fn eq(&self, other: &Self) -> bool {
        self.address_type() == other.address_type() && self.value == other.value
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<AddressNode>,
}

/// Arena of Manual, Static and Dynamic addresses with their names and the
/// set of addresses reloaded by `update_all`.
#[derive(Debug, Clone)]
pub struct AddressGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    names: NameTable,
    registry: UpdateRegistry<AddressId>,
    update_mask: u32,
}

impl Default for AddressGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressGraph {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            names: NameTable::new(),
            registry: UpdateRegistry::new(),
            update_mask: UPDATE_ALL,
        }
    }

    fn insert(&mut self, node: AddressNode) -> AddressId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                AddressId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                AddressId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    pub fn add_manual(&mut self, value: u64) -> AddressId {
        self.insert(AddressNode::new(AddressKind::Manual, value, LoadState::Loaded))
    }

    pub fn add_static(&mut self, module_name: &str, offset: u64) -> AddressId {
        let kind = AddressKind::Static {
            module_name: module_name.to_string(),
            offset,
        };
        self.insert(AddressNode::new(kind, 0, LoadState::Unloaded))
    }

    /// The first offset is added to the parent's value without a dereference.
    pub fn add_dynamic(&mut self, parent: AddressId, offsets: &[i64]) -> Result<AddressId, MemoryError> {
        self.add_dynamic_with(parent, offsets, true)
    }

    pub fn add_dynamic_with(
        &mut self,
        parent: AddressId,
        offsets: &[i64],
        add_first_offset_to_parent: bool,
    ) -> Result<AddressId, MemoryError> {
        self.get(parent)?;
        let kind = AddressKind::Dynamic(DynamicPath {
            parent,
            offsets: offsets.to_vec(),
            add_first_offset_to_parent,
            backups: Vec::new(),
        });
        Ok(self.insert(AddressNode::new(kind, 0, LoadState::Unloaded)))
    }

    /// Copies a node. The copy gets its own name handle and joins the
    /// update registry if the source was in it.
    pub fn duplicate(&mut self, id: AddressId) -> Result<AddressId, MemoryError> {
        let source = self.get(id)?.clone();
        let name = self.names.get(source.name_handle).to_string();
        let auto_update = source.auto_update;
        let mut node = source;
        node.auto_update = false;
        node.name_handle = if name.is_empty() {
            NameTable::EMPTY
        } else {
            self.names.add(&name)
        };
        let copy = self.insert(node);
        if auto_update {
            self.auto_update(copy)?;
        }
        Ok(copy)
    }

    /// Fails with `HasDependents` while another node uses `id` as a parent
    /// or backup parent.
    pub fn remove(&mut self, id: AddressId) -> Result<(), MemoryError> {
        self.get(id)?;
        let in_use = self.iter().any(|(other, node)| {
            other != id
                && matches!(&node.kind, AddressKind::Dynamic(path)
                    if path.parent == id || path.backups.iter().any(|b| b.parent == id))
        });
        if in_use {
            return Err(MemoryError::HasDependents(id.index));
        }

        self.registry.remove(&id);
        let slot = &mut self.slots[id.index as usize];
        if let Some(node) = slot.node.take() {
            self.names.remove(node.name_handle);
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Ok(())
    }

    pub fn contains(&self, id: AddressId) -> bool {
        self.get(id).is_ok()
    }

    pub fn get(&self, id: AddressId) -> Result<&AddressNode, MemoryError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(MemoryError::InvalidAddressId(id.index))
    }

    fn get_mut(&mut self, id: AddressId) -> Result<&mut AddressNode, MemoryError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(MemoryError::InvalidAddressId(id.index))
    }

    pub fn iter(&self) -> impl Iterator<Item = (AddressId, &AddressNode)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.node.as_ref().map(|node| {
                (
                    AddressId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    node,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value(&self, id: AddressId) -> Result<u64, MemoryError> {
        self.get(id).map(|n| n.value)
    }

    pub fn loaded(&self, id: AddressId) -> Result<bool, MemoryError> {
        self.get(id).map(|n| n.loaded())
    }

    pub fn address_type(&self, id: AddressId) -> Result<AddressType, MemoryError> {
        self.get(id).map(|n| n.address_type())
    }

    /// Equal when both nodes have the same type and resolved value.
    pub fn equals(&self, a: AddressId, b: AddressId) -> Result<bool, MemoryError> {
        Ok(self.get(a)? == self.get(b)?)
    }

    fn dynamic(&self, id: AddressId) -> Result<&DynamicPath, MemoryError> {
        match &self.get(id)?.kind {
            AddressKind::Dynamic(path) => Ok(path),
            _ => Err(MemoryError::WrongAddressKind(format!("{} is not a dynamic address", id))),
        }
    }

    fn dynamic_mut(&mut self, id: AddressId) -> Result<&mut DynamicPath, MemoryError> {
        match &mut self.get_mut(id)?.kind {
            AddressKind::Dynamic(path) => Ok(path),
            _ => Err(MemoryError::WrongAddressKind(format!("{} is not a dynamic address", id))),
        }
    }

    pub fn parent(&self, id: AddressId) -> Result<AddressId, MemoryError> {
        self.dynamic(id).map(|p| p.parent)
    }

    pub fn offsets(&self, id: AddressId) -> Result<&[i64], MemoryError> {
        self.dynamic(id).map(|p| p.offsets.as_slice())
    }

    pub fn add_first_offset_to_parent(&self, id: AddressId) -> Result<bool, MemoryError> {
        self.dynamic(id).map(|p| p.add_first_offset_to_parent)
    }

    pub fn add_offsets(&mut self, id: AddressId, offsets: &[i64]) -> Result<(), MemoryError> {
        self.dynamic_mut(id)?.offsets.extend_from_slice(offsets);
        Ok(())
    }

    /// Removes the last `n` offsets, or all of them when `n` is 0.
    pub fn pop_offsets(&mut self, id: AddressId, n: usize) -> Result<(), MemoryError> {
        let path = self.dynamic_mut(id)?;
        let len = path.offsets.len();
        if n > len {
            return Err(MemoryError::LimitExceeded(format!(
                "cannot pop {} offsets from a path of {}",
                n, len
            )));
        }
        let keep = if n == 0 { 0 } else { len - n };
        path.offsets.truncate(keep);
        Ok(())
    }

    pub fn backups(&self, id: AddressId) -> Result<&[Backup], MemoryError> {
        self.dynamic(id).map(|p| p.backups.as_slice())
    }

    /// Registers an alternate path tried when `id` resolves below
    /// `MIN_VALID_ADDRESS`.
    pub fn add_backup(&mut self, id: AddressId, parent: AddressId, offsets: &[i64]) -> Result<(), MemoryError> {
        self.get(parent)?;
        self.dynamic_mut(id)?.backups.push(Backup {
            parent,
            offsets: offsets.to_vec(),
        });
        Ok(())
    }

    pub fn module_name(&self, id: AddressId) -> Result<&str, MemoryError> {
        match &self.get(id)?.kind {
            AddressKind::Static { module_name, .. } => Ok(module_name),
            _ => Err(MemoryError::WrongAddressKind(format!("{} is not a static address", id))),
        }
    }

    pub fn module_offset(&self, id: AddressId) -> Result<u64, MemoryError> {
        match &self.get(id)?.kind {
            AddressKind::Static { offset, .. } => Ok(*offset),
            _ => Err(MemoryError::WrongAddressKind(format!("{} is not a static address", id))),
        }
    }

    pub fn load(&mut self, process: &ProcessHandle, id: AddressId) -> Result<u64, MemoryError> {
        let node = self.get(id)?;
        match &node.kind {
            AddressKind::Manual => Ok(node.value),
            AddressKind::Static { module_name, offset } => {
                let offset = *offset;
                let value = process.mask(process.module_base(module_name)?.wrapping_add(offset));
                let node = self.get_mut(id)?;
                node.value = value;
                node.state = if value != offset { LoadState::Loaded } else { LoadState::Unloaded };
                Ok(value)
            }
            AddressKind::Dynamic(path) => {
                if node.state == LoadState::Loading {
                    return Err(MemoryError::CyclicDependency(id.index));
                }
                let path = path.clone();
                self.get_mut(id)?.state = LoadState::Loading;
                let resolved = self.resolve_dynamic(process, &path);
                let node = self.get_mut(id)?;
                match resolved {
                    Ok(value) => {
                        node.value = value;
                        node.state = if value != 0 { LoadState::Loaded } else { LoadState::Unloaded };
                        Ok(value)
                    }
                    Err(e) => {
                        node.value = 0;
                        node.state = LoadState::Unloaded;
                        Err(e)
                    }
                }
            }
        }
    }

    fn follow_from(
        &mut self,
        process: &ProcessHandle,
        parent: AddressId,
        offsets: &[i64],
        add_first_offset_to_parent: bool,
    ) -> Result<u64, MemoryError> {
        if !self.loaded(parent)? {
            self.load(process, parent)?;
        }
        let base = self.value(parent)?;
        Ok(process.follow(base, offsets, add_first_offset_to_parent))
    }

    fn resolve_dynamic(&mut self, process: &ProcessHandle, path: &DynamicPath) -> Result<u64, MemoryError> {
        let value = self.follow_from(process, path.parent, &path.offsets, path.add_first_offset_to_parent)?;
        if value >= MIN_VALID_ADDRESS {
            return Ok(value);
        }
        for (i, backup) in path.backups.iter().enumerate() {
            let candidate =
                self.follow_from(process, backup.parent, &backup.offsets, path.add_first_offset_to_parent)?;
            if candidate >= MIN_VALID_ADDRESS && is_readable(process, candidate) {
                debug!("Resolved {:#x} through backup {}", candidate, i);
                return Ok(candidate);
            }
        }
        Ok(value)
    }

    pub fn unload(&mut self, id: AddressId) -> Result<(), MemoryError> {
        let node = self.get_mut(id)?;
        if matches!(node.kind, AddressKind::Manual) {
            return Ok(());
        }
        node.value = 0;
        node.state = LoadState::Unloaded;
        Ok(())
    }

    /// Loads `id` if its update mask shares a bit with `mask`.
    pub fn update(&mut self, process: &ProcessHandle, id: AddressId, mask: u32) -> Result<(), MemoryError> {
        if self.get(id)?.update_mask & mask != 0 {
            self.load(process, id)?;
        }
        Ok(())
    }

    /// Best-effort check that the resolved value points at readable memory.
    pub fn valid(&self, process: &ProcessHandle, id: AddressId) -> Result<bool, MemoryError> {
        Ok(is_readable(process, self.value(id)?))
    }

    pub fn name(&self, id: AddressId) -> Result<&str, MemoryError> {
        let handle = self.get(id)?.name_handle;
        Ok(self.names.get(handle))
    }

    pub fn set_name(&mut self, id: AddressId, name: &str) -> Result<(), MemoryError> {
        let handle = self.get(id)?.name_handle;
        let new_handle = match (name.is_empty(), handle) {
            (true, NameTable::EMPTY) => NameTable::EMPTY,
            (true, h) => {
                self.names.remove(h);
                NameTable::EMPTY
            }
            (false, NameTable::EMPTY) => self.names.add(name),
            (false, h) => {
                self.names.set(h, name);
                h
            }
        };
        self.get_mut(id)?.name_handle = new_handle;
        Ok(())
    }

    pub fn find_by_name(&self, name: &str) -> Option<AddressId> {
        if name.is_empty() {
            return None;
        }
        self.iter()
            .find(|(_, node)| self.names.get(node.name_handle) == name)
            .map(|(id, _)| id)
    }

    pub fn set_update_mask(&mut self, id: AddressId, mask: u32) -> Result<(), MemoryError> {
        self.get_mut(id)?.update_mask = mask;
        Ok(())
    }

    pub fn global_update_mask(&self) -> u32 {
        self.update_mask
    }

    pub fn set_global_update_mask(&mut self, mask: u32) {
        self.update_mask = mask;
    }

    /// Adds `id` to the set reloaded by `update_all`. Manual addresses never
    /// change and are rejected.
    pub fn auto_update(&mut self, id: AddressId) -> Result<(), MemoryError> {
        let node = self.get_mut(id)?;
        if matches!(node.kind, AddressKind::Manual) {
            return Err(MemoryError::WrongAddressKind(format!(
                "{} is a manual address and cannot auto-update",
                id
            )));
        }
        node.auto_update = true;
        self.registry.insert(id);
        Ok(())
    }

    pub fn stop_auto_update(&mut self, id: AddressId) -> Result<(), MemoryError> {
        self.get_mut(id)?.auto_update = false;
        self.registry.remove(&id);
        Ok(())
    }

    pub fn auto_updating(&self) -> &[AddressId] {
        self.registry.as_slice()
    }

    /// Unloads every registered address, then reloads those whose mask
    /// matches the graph mask. Returns how many ended up loaded.
    pub fn update_all(&mut self, process: &ProcessHandle) -> usize {
        let ids = self.registry.as_slice().to_vec();
        for &id in &ids {
            // registered ids are always live
            let _ = self.unload(id);
        }
        let mask = self.update_mask;
        let mut loaded = 0;
        for &id in &ids {
            match self.update(process, id, mask) {
                Ok(()) => {}
                Err(e) => warn!("Failed to update address {}: {}", id, e),
            }
            if self.loaded(id).unwrap_or(false) {
                loaded += 1;
            }
        }
        debug!("Updated {}/{} addresses", loaded, ids.len());
        loaded
    }
}

fn is_readable(process: &ProcessHandle, addr: u64) -> bool {
    let mut byte = [0u8; 1];
    process.read(addr, &mut byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Protection, SimulatedProcess};

    const MODULE_BASE: u64 = 0x400000;
    const HEAP: u64 = 0x20000;

    /// game.exe+0x100 -> HEAP; HEAP+0x10 -> HEAP+0x200; value at HEAP+0x208.
    fn fixture() -> (SimulatedProcess, ProcessHandle) {
        let sim = SimulatedProcess::new(5, "game.exe");
        sim.add_module("game.exe", MODULE_BASE, 0x1000);
        sim.map_region(HEAP, 0x1000, Protection::READ_WRITE, "heap");
        sim.poke(MODULE_BASE + 0x100, &HEAP.to_ne_bytes());
        sim.poke(HEAP + 0x10, &(HEAP + 0x200).to_ne_bytes());
        sim.poke(HEAP + 0x208, &1234u32.to_ne_bytes());
        let mut process = ProcessHandle::new(sim.clone());
        assert!(process.attach(5).unwrap());
        (sim, process)
    }

    #[test]
    fn test_manual_is_loaded() {
        let (_sim, process) = fixture();
        let mut graph = AddressGraph::new();
        let a = graph.add_manual(0x1234);
        assert!(graph.loaded(a).unwrap());
        assert_eq!(graph.load(&process, a).unwrap(), 0x1234);
        graph.unload(a).unwrap();
        assert_eq!(graph.value(a).unwrap(), 0x1234);
        assert!(graph.auto_update(a).is_err());
    }

    #[test]
    fn test_static_load() {
        let (_sim, process) = fixture();
        let mut graph = AddressGraph::new();
        let s = graph.add_static("game.exe", 0x100);
        assert!(!graph.loaded(s).unwrap());
        assert_eq!(graph.load(&process, s).unwrap(), MODULE_BASE + 0x100);
        assert!(graph.loaded(s).unwrap());

        let missing = graph.add_static("missing.dll", 0x100);
        assert!(matches!(graph.load(&process, missing), Err(MemoryError::ModuleNotFound(_))));
        assert!(!graph.loaded(missing).unwrap());
    }

    #[test]
    fn test_dynamic_loads_parent_transitively() {
        let (_sim, process) = fixture();
        let mut graph = AddressGraph::new();
        let s = graph.add_static("game.exe", 0x100);
        let d = graph.add_dynamic(s, &[0, 0x10, 8]).unwrap();
        assert!(!graph.loaded(s).unwrap());
        assert_eq!(graph.load(&process, d).unwrap(), HEAP + 0x208);
        assert!(graph.loaded(s).unwrap());
        assert!(graph.loaded(d).unwrap());
        assert_eq!(process.read_value::<u32>(graph.value(d).unwrap()), Some(1234));

        let deref_first = graph.add_dynamic_with(s, &[0x10, 8], false).unwrap();
        assert_eq!(graph.load(&process, deref_first).unwrap(), HEAP + 0x208);
        assert!(graph.equals(d, deref_first).unwrap());
        assert!(!graph.equals(d, s).unwrap());
    }

    #[test]
    fn test_offset_mutation_requires_dynamic() {
        let mut graph = AddressGraph::new();
        let s = graph.add_static("game.exe", 0x100);
        let d = graph.add_dynamic(s, &[1, 2]).unwrap();
        assert!(matches!(graph.add_offsets(s, &[1]), Err(MemoryError::WrongAddressKind(_))));
        assert!(graph.pop_offsets(s, 1).is_err());
        assert!(graph.module_name(d).is_err());

        graph.add_offsets(d, &[3, 4]).unwrap();
        assert_eq!(graph.offsets(d).unwrap(), &[1, 2, 3, 4]);
        graph.pop_offsets(d, 1).unwrap();
        assert_eq!(graph.offsets(d).unwrap(), &[1, 2, 3]);
        assert!(graph.pop_offsets(d, 4).is_err());
        graph.pop_offsets(d, 0).unwrap();
        assert!(graph.offsets(d).unwrap().is_empty());
    }

    #[test]
    fn test_update_all_is_idempotent() {
        let (sim, process) = fixture();
        let mut graph = AddressGraph::new();
        let s = graph.add_static("game.exe", 0x100);
        let d = graph.add_dynamic(s, &[0, 0x10, 8]).unwrap();
        graph.auto_update(d).unwrap();
        graph.auto_update(s).unwrap();

        assert_eq!(graph.update_all(&process), 2);
        let first = (graph.value(s).unwrap(), graph.value(d).unwrap());
        assert_eq!(graph.update_all(&process), 2);
        assert_eq!((graph.value(s).unwrap(), graph.value(d).unwrap()), first);

        // repointing the chain is picked up on the next sweep
        sim.poke(HEAP + 0x10, &(HEAP + 0x400).to_ne_bytes());
        graph.update_all(&process);
        assert_eq!(graph.value(d).unwrap(), HEAP + 0x408);
    }

    #[test]
    fn test_update_mask_gates_reload() {
        let (_sim, process) = fixture();
        let mut graph = AddressGraph::new();
        let a = graph.add_static("game.exe", 0x100);
        let b = graph.add_static("game.exe", 0x200);
        graph.auto_update(a).unwrap();
        graph.auto_update(b).unwrap();
        graph.set_update_mask(a, 0b01).unwrap();
        graph.set_update_mask(b, 0b10).unwrap();
        graph.set_global_update_mask(0b10);
        assert_eq!(graph.update_all(&process), 1);
        assert!(!graph.loaded(a).unwrap());
        assert_eq!(graph.value(b).unwrap(), MODULE_BASE + 0x200);
    }

    #[test]
    fn test_registry_remove_keeps_others_reloadable() {
        let (_sim, process) = fixture();
        let mut graph = AddressGraph::new();
        let ids: Vec<_> = (0..5).map(|i| graph.add_static("game.exe", 0x100 + i * 8)).collect();
        for &id in &ids {
            graph.auto_update(id).unwrap();
        }
        graph.stop_auto_update(ids[1]).unwrap();
        graph.stop_auto_update(ids[1]).unwrap();
        assert_eq!(graph.auto_updating().len(), 4);
        assert_eq!(graph.update_all(&process), 4);
        for (i, &id) in ids.iter().enumerate() {
            if i == 1 {
                assert!(!graph.loaded(id).unwrap());
            } else {
                assert_eq!(graph.value(id).unwrap(), MODULE_BASE + 0x100 + i as u64 * 8);
            }
        }
    }

    #[test]
    fn test_backup_used_when_primary_invalid() {
        let (sim, process) = fixture();
        let mut graph = AddressGraph::new();
        let s = graph.add_static("game.exe", 0x100);
        // primary path lands on a null pointer
        let d = graph.add_dynamic(s, &[0, 0x20, 8]).unwrap();
        graph.add_backup(d, s, &[0, 0x30, 8]).unwrap();
        graph.add_backup(d, s, &[0, 0x10, 8]).unwrap();
        sim.poke(HEAP + 0x30, &0x100u64.to_ne_bytes());
        assert_eq!(graph.load(&process, d).unwrap(), HEAP + 0x208);
        assert_eq!(graph.backups(d).unwrap().len(), 2);
    }

    #[test]
    fn test_cyclic_backup_is_error() {
        let (_sim, process) = fixture();
        let mut graph = AddressGraph::new();
        let s = graph.add_static("game.exe", 0x100);
        let d = graph.add_dynamic(s, &[0, 0x20, 8]).unwrap();
        graph.add_backup(d, d, &[0]).unwrap();
        assert!(matches!(graph.load(&process, d), Err(MemoryError::CyclicDependency(_))));
        assert!(!graph.loaded(d).unwrap());
    }

    #[test]
    fn test_names_and_removal() {
        let mut graph = AddressGraph::new();
        let s = graph.add_static("game.exe", 0x100);
        let d = graph.add_dynamic(s, &[8]).unwrap();
        graph.set_name(s, "base").unwrap();
        graph.set_name(d, "health").unwrap();
        assert_eq!(graph.find_by_name("health"), Some(d));
        assert_eq!(graph.name(s).unwrap(), "base");

        let copy = graph.duplicate(d).unwrap();
        assert_eq!(graph.name(copy).unwrap(), "health");
        graph.set_name(copy, "health2").unwrap();
        assert_eq!(graph.name(d).unwrap(), "health");

        assert!(matches!(graph.remove(s), Err(MemoryError::HasDependents(_))));
        graph.remove(d).unwrap();
        graph.remove(copy).unwrap();
        assert!(!graph.contains(d));
        assert!(matches!(graph.value(d), Err(MemoryError::InvalidAddressId(_))));
        graph.remove(s).unwrap();
        assert!(graph.is_empty());

        // reused slot gets a fresh generation
        let fresh = graph.add_manual(1);
        assert!(graph.contains(fresh));
        assert_eq!(fresh.index(), s.index());
        assert_ne!(fresh, s);
        assert!(!graph.contains(s));
        assert_eq!(graph.find_by_name("base"), None);
    }

    #[test]
    fn test_valid_reads_one_byte() {
        let (_sim, process) = fixture();
        let mut graph = AddressGraph::new();
        let good = graph.add_manual(HEAP);
        let bad = graph.add_manual(0x10);
        assert!(graph.valid(&process, good).unwrap());
        assert!(!graph.valid(&process, bad).unwrap());
    }
}
