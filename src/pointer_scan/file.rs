// Tue Oct 20 2026 - Alex

use crate::config::{Config, MIN_RESULTS_PER_FILE};
use crate::memory::MemoryError;
use crate::pointer_scan::bits::{bit_count, max_for_bits};
use crate::pointer_scan::header::{Compression, PointerScanHeader, CURRENT_VERSION, MAGIC};
use crate::pointer_scan::record::PointerScanRecord;
use crate::pointer_scan::PointerScanSettings;
use crate::utils::logging::ScopedTimer;
use indexmap::IndexMap;
use log::{debug, info};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const BITS_MODULE_OFFSET: u8 = 32;

/// A pointer-scan header plus its results, in file-index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerScanFile {
    header: PointerScanHeader,
    records: Vec<PointerScanRecord>,
}

/// `<path>.results.<index>`
pub fn result_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".results.{}", index));
    PathBuf::from(name)
}

fn count_result_files(path: &Path) -> usize {
    (0..).take_while(|&i| result_path(path, i).exists()).count()
}

impl PointerScanFile {
    /// An empty file whose bit widths are derived from `settings`.
    pub fn new(settings: &PointerScanSettings) -> Result<Self, MemoryError> {
        settings.validate().map_err(MemoryError::LimitExceeded)?;

        let compression = settings.compressed.then(|| {
            let offset_limit = if settings.aligned {
                settings.max_offset >> 2
            } else {
                settings.max_offset
            };
            Compression {
                aligned: settings.aligned,
                bits_module_index: 0,
                bits_module_offset: BITS_MODULE_OFFSET,
                bits_level: bit_count(settings.max_level as u64) as u8,
                bits_offset: bit_count(offset_limit) as u8,
                ends_with: settings.ends_with.iter().rev().map(|v| *v as u32).collect(),
            }
        });

        Ok(Self {
            header: PointerScanHeader {
                magic: MAGIC,
                version: CURRENT_VERSION,
                modules: IndexMap::new(),
                max_level: settings.max_level,
                compression,
                did_base_range_scan: 0,
                original_base_scan_range: 0,
            },
            records: Vec::new(),
        })
    }

    pub fn header(&self) -> &PointerScanHeader {
        &self.header
    }

    pub fn records(&self) -> &[PointerScanRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.header.modules.keys().map(String::as_str)
    }

    pub fn module_name(&self, index: u32) -> Option<&str> {
        self.header.modules.get_index(index as usize).map(|(name, _)| name.as_str())
    }

    /// Index of `name` in the module table, adding it when missing.
    pub fn add_module(&mut self, name: &str) -> u32 {
        if let Some(index) = self.header.modules.get_index_of(name) {
            return index as u32;
        }
        let (index, _) = self.header.modules.insert_full(name.to_string(), 0);
        if let Some(c) = self.header.compression.as_mut() {
            let needed = bit_count(self.header.modules.len() as u64) as u8;
            c.bits_module_index = c.bits_module_index.max(needed);
        }
        index as u32
    }

    /// Settings that would produce this file's header.
    pub fn settings(&self) -> PointerScanSettings {
        match &self.header.compression {
            Some(c) => {
                let shift = if c.aligned { 2 } else { 0 };
                PointerScanSettings {
                    max_level: self.header.max_level,
                    max_offset: max_for_bits(c.bits_offset as u32 + shift),
                    compressed: true,
                    aligned: c.aligned,
                    ends_with: c.ends_with.iter().rev().map(|v| *v as i64).collect(),
                }
            }
            None => PointerScanSettings {
                max_level: self.header.max_level,
                max_offset: u32::MAX as u64,
                compressed: false,
                aligned: false,
                ends_with: Vec::new(),
            },
        }
    }

    /// Appends a record after checking it can be encoded.
    pub fn push(&mut self, record: PointerScanRecord) -> Result<(), MemoryError> {
        let mut scratch = vec![0u8; self.header.entry_size()];
        record.encode(&self.header, &mut scratch)?;
        self.records.push(record);
        Ok(())
    }

    /// Reads the header at `path` and every `<path>.results.<N>` file.
    ///
    /// A threaded load splits the result files into contiguous index ranges
    /// and joins the ranges in index order, so both modes return the same
    /// sequence.
    pub fn load<P: AsRef<Path>>(path: P, threaded: bool) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        let _timer = ScopedTimer::new("pointer scan load");
        let header = PointerScanHeader::parse(&fs::read(path)?)?;

        let file_count = count_result_files(path);
        let records = if threaded && file_count > 1 {
            let threads = rayon::current_num_threads().clamp(1, file_count);
            let indices: Vec<usize> = (0..file_count).collect();
            let chunks = indices
                .par_chunks(file_count.div_ceil(threads))
                .map(|chunk| {
                    let mut out = Vec::new();
                    for &i in chunk {
                        out.extend(read_result_file(&header, &result_path(path, i))?);
                    }
                    Ok::<_, MemoryError>(out)
                })
                .collect::<Result<Vec<Vec<_>>, MemoryError>>()?;
            chunks.into_iter().flatten().collect()
        } else {
            let mut out = Vec::new();
            for i in 0..file_count {
                out.extend(read_result_file(&header, &result_path(path, i))?);
            }
            out
        };

        info!(
            "Loaded {} pointer paths from {} result files of {}",
            records.len(),
            file_count,
            path.display()
        );
        Ok(Self { header, records })
    }

    /// Writes the header and the results, one file when `single_file` is
    /// set, otherwise one per `MIN_RESULTS_PER_FILE` results.
    pub fn save<P: AsRef<Path>>(&self, path: P, single_file: bool) -> Result<usize, MemoryError> {
        self.save_split(path.as_ref(), single_file, MIN_RESULTS_PER_FILE)
    }

    pub fn save_with_config<P: AsRef<Path>>(
        &self,
        path: P,
        single_file: bool,
        config: &Config,
    ) -> Result<usize, MemoryError> {
        self.save_split(path.as_ref(), single_file, config.min_results_per_file.max(1))
    }

    fn save_split(&self, path: &Path, single_file: bool, per_file: usize) -> Result<usize, MemoryError> {
        let file_count = if single_file {
            1
        } else {
            1 + self.records.len() / per_file
        };
        self.save_sharded(path, file_count)?;
        Ok(file_count)
    }

    /// Writes exactly `file_count` result files of contiguous records.
    pub fn save_sharded<P: AsRef<Path>>(&self, path: P, file_count: usize) -> Result<(), MemoryError> {
        let path = path.as_ref();
        let _timer = ScopedTimer::new("pointer scan save");
        let file_count = file_count.max(1);
        fs::write(path, self.header.to_bytes()?)?;

        let per_file = self.records.len().div_ceil(file_count).max(1);
        let entry_size = self.header.entry_size();
        (0..file_count)
            .into_par_iter()
            .map(|i| {
                let start = (i * per_file).min(self.records.len());
                let end = (start + per_file).min(self.records.len());
                let mut data = vec![0u8; (end - start) * entry_size];
                for (record, out) in self.records[start..end].iter().zip(data.chunks_exact_mut(entry_size)) {
                    record.encode(&self.header, out)?;
                }
                fs::write(result_path(path, i), data)?;
                Ok::<_, MemoryError>(())
            })
            .collect::<Result<Vec<()>, MemoryError>>()?;

        let mut stale = file_count;
        while result_path(path, stale).exists() {
            fs::remove_file(result_path(path, stale))?;
            stale += 1;
        }
        if stale > file_count {
            debug!("Removed {} stale result files", stale - file_count);
        }

        info!(
            "Saved {} pointer paths to {} result files of {}",
            self.records.len(),
            file_count,
            path.display()
        );
        Ok(())
    }
}

fn read_result_file(header: &PointerScanHeader, path: &Path) -> Result<Vec<PointerScanRecord>, MemoryError> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }
    // SAFETY: the result file is only read, and nothing in this process
    // writes to it while the map is alive.
    let map = unsafe { Mmap::map(&file)? };
    let entry_size = header.entry_size();
    if entry_size == 0 || map.len() % entry_size != 0 {
        return Err(MemoryError::InvalidFormat(format!(
            "{} is {} bytes, not a multiple of the {} byte entry size",
            path.display(),
            map.len(),
            entry_size
        )));
    }
    map.chunks_exact(entry_size)
        .map(|data| PointerScanRecord::decode(header, data))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(count: usize) -> PointerScanFile {
        let mut file = PointerScanFile::new(&PointerScanSettings::default()).unwrap();
        let a = file.add_module("game.exe");
        let b = file.add_module("engine.dll");
        for i in 0..count {
            let module = if i % 3 == 0 { b } else { a };
            let offsets = (0..(i % 5) as i64).map(|k| (k * 8 + i as i64 * 4) % 4096).collect();
            file.push(PointerScanRecord::new(module, 0x1000 + i as u64 * 8, offsets)).unwrap();
        }
        file
    }

    #[test]
    fn test_settings_round_trip() {
        let settings = PointerScanSettings {
            ends_with: vec![0x20, 0x8],
            ..PointerScanSettings::default()
        };
        let file = PointerScanFile::new(&settings).unwrap();
        assert_eq!(file.settings(), settings);
        let c = file.header().compression.as_ref().unwrap();
        assert_eq!((c.bits_level, c.bits_offset, c.bits_module_offset), (3, 10, 32));
        assert_eq!(c.ends_with, vec![0x8, 0x20]);
    }

    #[test]
    fn test_module_bits_grow() {
        let mut file = PointerScanFile::new(&PointerScanSettings::default()).unwrap();
        assert_eq!(file.add_module("a"), 0);
        assert_eq!(file.add_module("b"), 1);
        assert_eq!(file.add_module("a"), 0);
        assert_eq!(file.add_module("c"), 2);
        assert_eq!(file.header().compression.as_ref().unwrap().bits_module_index, 2);
        assert_eq!(file.module_name(2), Some("c"));
    }

    #[test]
    fn test_single_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.ptr");
        let file = synthetic(40);
        assert_eq!(file.save(&path, true).unwrap(), 1);
        assert!(result_path(&path, 0).exists());
        let loaded = PointerScanFile::load(&path, false).unwrap();
        assert_eq!(loaded, file);
        assert_eq!(loaded.module_names().collect::<Vec<_>>(), vec!["game.exe", "engine.dll"]);
    }

    #[test]
    fn test_threaded_read_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.ptr");
        let file = synthetic(1000);
        file.save_sharded(&path, 5).unwrap();
        assert_eq!(count_result_files(&path), 5);
        for i in 0..5 {
            let len = fs::metadata(result_path(&path, i)).unwrap().len() as usize;
            assert_eq!(len, 200 * file.header().entry_size());
        }

        let sequential = PointerScanFile::load(&path, false).unwrap();
        let threaded = PointerScanFile::load(&path, true).unwrap();
        assert_eq!(sequential.len(), 1000);
        assert_eq!(threaded.records(), sequential.records());
        assert_eq!(threaded.records(), file.records());
    }

    #[test]
    fn test_resave_removes_stale_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.ptr");
        let file = synthetic(600);
        assert_eq!(file.save(&path, false).unwrap(), 3);
        assert_eq!(count_result_files(&path), 3);
        assert_eq!(file.save(&path, true).unwrap(), 1);
        assert_eq!(count_result_files(&path), 1);
        assert_eq!(PointerScanFile::load(&path, true).unwrap().len(), 600);

        let config = Config {
            min_results_per_file: 100,
            ..Config::default()
        };
        assert_eq!(file.save_with_config(&path, false, &config).unwrap(), 7);
    }

    #[test]
    fn test_uncompressed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.ptr");
        let settings = PointerScanSettings {
            compressed: false,
            aligned: false,
            ..PointerScanSettings::default()
        };
        let mut file = PointerScanFile::new(&settings).unwrap();
        let m = file.add_module("libc.so.6");
        file.push(PointerScanRecord::new(m, 0x1_0000_0010, vec![-0x10, 0x3])).unwrap();
        file.save(&path, false).unwrap();
        let loaded = PointerScanFile::load(&path, false).unwrap();
        assert_eq!(loaded.records(), file.records());
        assert_eq!(loaded.header().entry_size(), 16 + 4 * 7);
    }

    #[test]
    fn test_rejects_bad_header_and_partial_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ptr");
        fs::write(&path, [0xCE, 1, 0, 0, 0, 0]).unwrap();
        assert!(matches!(
            PointerScanFile::load(&path, false),
            Err(MemoryError::UnsupportedVersion { .. })
        ));

        let file = synthetic(10);
        file.save(&path, true).unwrap();
        let mut data = fs::read(result_path(&path, 0)).unwrap();
        data.pop();
        fs::write(result_path(&path, 0), data).unwrap();
        assert!(matches!(PointerScanFile::load(&path, false), Err(MemoryError::InvalidFormat(_))));
    }

    #[test]
    fn test_push_rejects_unencodable() {
        let mut file = synthetic(0);
        assert!(file.push(PointerScanRecord::new(0, 0, vec![0x2000])).is_err());
        assert!(file.push(PointerScanRecord::new(9, 0, vec![])).is_err());
        assert!(file.is_empty());
    }
}
