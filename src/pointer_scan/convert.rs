// Tue Oct 20 2026 - Alex

use crate::address::{AddressGraph, AddressId, AddressKind};
use crate::memory::MemoryError;
use crate::pointer_scan::file::PointerScanFile;
use crate::pointer_scan::record::PointerScanRecord;
use crate::pointer_scan::PointerScanSettings;
use ahash::AHashMap;
use log::debug;

impl PointerScanFile {
    /// Adds one node per record to `graph` and returns them in record order.
    ///
    /// Records sharing a module and module offset share one Static parent.
    /// A record without offsets is that Static node; the others become
    /// Dynamic children that dereference before each offset.
    pub fn to_addresses(&self, graph: &mut AddressGraph) -> Result<Vec<AddressId>, MemoryError> {
        let mut statics: AHashMap<(u32, u64), AddressId> = AHashMap::new();
        let mut ids = Vec::with_capacity(self.len());

        for record in self.records() {
            let key = (record.module_index, record.module_offset);
            let parent = match statics.get(&key) {
                Some(id) => *id,
                None => {
                    let module = self.module_name(record.module_index).ok_or_else(|| {
                        MemoryError::InvalidFormat(format!("record references module {}", record.module_index))
                    })?;
                    let id = graph.add_static(module, record.module_offset);
                    statics.insert(key, id);
                    id
                }
            };
            if record.offsets.is_empty() {
                ids.push(parent);
            } else {
                ids.push(graph.add_dynamic_with(parent, &record.offsets, false)?);
            }
        }

        debug!("Built {} addresses over {} static bases", ids.len(), statics.len());
        Ok(ids)
    }

    /// Builds a file from Static nodes and Dynamic nodes whose parent is
    /// Static.
    pub fn from_addresses(
        graph: &AddressGraph,
        ids: &[AddressId],
        settings: &PointerScanSettings,
    ) -> Result<Self, MemoryError> {
        let mut file = PointerScanFile::new(settings)?;
        for &id in ids {
            let (base, offsets) = match graph.get(id)?.kind() {
                AddressKind::Static { .. } => (id, Vec::new()),
                AddressKind::Dynamic(path) => {
                    let offsets = match (path.add_first_offset_to_parent, path.offsets.split_first()) {
                        (false, _) => path.offsets.clone(),
                        (true, None) => Vec::new(),
                        (true, Some((0, rest))) => rest.to_vec(),
                        (true, Some((first, _))) => {
                            return Err(MemoryError::InvalidFormat(format!(
                                "{} adds {:#x} to its base before the first read",
                                id, first
                            )))
                        }
                    };
                    (path.parent, offsets)
                }
                AddressKind::Manual => {
                    return Err(MemoryError::WrongAddressKind(format!("{} is a manual address", id)));
                }
            };

            let (module_name, module_offset) = match graph.get(base)?.kind() {
                AddressKind::Static { module_name, offset } => (module_name.as_str(), *offset),
                _ => {
                    return Err(MemoryError::WrongAddressKind(format!(
                        "{} does not hang off a static address",
                        id
                    )))
                }
            };
            let module_index = file.add_module(module_name);
            file.push(PointerScanRecord::new(module_index, module_offset, offsets))?;
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressType;
    use crate::memory::{ProcessHandle, Protection, SimulatedProcess};

    #[test]
    fn test_graph_file_graph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.ptr");

        let mut graph = AddressGraph::new();
        let base = graph.add_static("game.exe", 0x2010);
        let other = graph.add_static("engine.dll", 0x80);
        let a = graph.add_dynamic_with(base, &[0x18, 0x4], false).unwrap();
        let b = graph.add_dynamic_with(base, &[0x20], false).unwrap();
        let c = graph.add_dynamic(other, &[0, 0x3FC]).unwrap();

        let file = PointerScanFile::from_addresses(&graph, &[base, a, b, c], &PointerScanSettings::default()).unwrap();
        file.save(&path, true).unwrap();
        let loaded = PointerScanFile::load(&path, false).unwrap();
        assert_eq!(loaded.module_names().collect::<Vec<_>>(), vec!["game.exe", "engine.dll"]);

        let mut rebuilt = AddressGraph::new();
        let ids = loaded.to_addresses(&mut rebuilt).unwrap();
        assert_eq!(ids.len(), 4);
        // three records share game.exe+0x2010
        assert_eq!(rebuilt.len(), 5);
        assert_eq!(rebuilt.address_type(ids[0]).unwrap(), AddressType::Static);
        assert_eq!(rebuilt.module_offset(ids[0]).unwrap(), 0x2010);
        assert_eq!(rebuilt.parent(ids[1]).unwrap(), ids[0]);
        assert_eq!(rebuilt.parent(ids[2]).unwrap(), ids[0]);
        assert_eq!(rebuilt.offsets(ids[1]).unwrap(), &[0x18, 0x4]);
        assert_eq!(rebuilt.offsets(ids[3]).unwrap(), &[0x3FC]);
        assert!(!rebuilt.add_first_offset_to_parent(ids[3]).unwrap());
        assert_eq!(rebuilt.module_name(rebuilt.parent(ids[3]).unwrap()).unwrap(), "engine.dll");
    }

    #[test]
    fn test_rebuilt_paths_resolve() {
        let sim = SimulatedProcess::new(5, "game");
        sim.add_module("game.exe", 0x40_0000, 0x1000);
        sim.map_region(0x50_0000, 0x1000, Protection::READ_WRITE, "heap");
        let mut process = ProcessHandle::new(sim.clone());
        assert!(process.attach(5).unwrap());
        sim.poke(0x40_0100, &0x50_0000u64.to_ne_bytes());
        sim.poke(0x50_0010, &0x50_0800u64.to_ne_bytes());

        let mut file = PointerScanFile::new(&PointerScanSettings::default()).unwrap();
        let m = file.add_module("game.exe");
        file.push(PointerScanRecord::new(m, 0x100, vec![0x10, 0x24])).unwrap();

        let mut graph = AddressGraph::new();
        let ids = file.to_addresses(&mut graph).unwrap();
        assert_eq!(graph.load(&process, ids[0]).unwrap(), 0x50_0824);
    }

    #[test]
    fn test_rejects_unrepresentable_nodes() {
        let mut graph = AddressGraph::new();
        let settings = PointerScanSettings::default();
        let manual = graph.add_manual(0x1000);
        assert!(matches!(
            PointerScanFile::from_addresses(&graph, &[manual], &settings),
            Err(MemoryError::WrongAddressKind(_))
        ));
        let off_manual = graph.add_dynamic(manual, &[0, 8]).unwrap();
        assert!(matches!(
            PointerScanFile::from_addresses(&graph, &[off_manual], &settings),
            Err(MemoryError::WrongAddressKind(_))
        ));
        let base = graph.add_static("a.so", 0x10);
        let shifted = graph.add_dynamic(base, &[8, 8]).unwrap();
        assert!(PointerScanFile::from_addresses(&graph, &[shifted], &settings).is_err());
        let too_far = graph.add_dynamic_with(base, &[0x10000], false).unwrap();
        assert!(matches!(
            PointerScanFile::from_addresses(&graph, &[too_far], &settings),
            Err(MemoryError::LimitExceeded(_))
        ));
    }
}
