// Tue Oct 20 2026 - Alex

use crate::memory::{MemoryError, ProcessHandle, Scalar};
use std::fmt;

pub const INLINE_CAPACITY: usize = 48;

enum Storage<'a> {
    Empty,
    Inline { data: [u8; INLINE_CAPACITY], len: usize },
    Heap(Vec<u8>),
    View(&'a mut [u8]),
}

/// Bytes staged between the controller and a target process.
///
/// Small buffers live inline; larger ones on the heap. A view aliases a
/// range of another buffer for as long as that buffer is borrowed.
pub struct Buffer<'a> {
    storage: Storage<'a>,
    pointer_size: usize,
}

impl Buffer<'static> {
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        Self::with_pointer_size(size, std::mem::size_of::<usize>())
    }

    /// A buffer whose pointer accessors use the target's pointer width.
    pub fn for_process(process: &ProcessHandle, size: usize) -> Result<Self, MemoryError> {
        Self::with_pointer_size(size, process.pointer_size())
    }

    pub fn with_pointer_size(size: usize, pointer_size: usize) -> Result<Self, MemoryError> {
        if size == 0 {
            return Err(MemoryError::LimitExceeded("buffer size must be non-zero".to_string()));
        }
        Ok(Self {
            storage: Self::owned_storage(size),
            pointer_size,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MemoryError> {
        let mut buffer = Self::new(bytes.len())?;
        buffer.as_mut_slice().copy_from_slice(bytes);
        Ok(buffer)
    }
}

impl<'a> Buffer<'a> {
    fn owned_storage(size: usize) -> Storage<'static> {
        if size <= INLINE_CAPACITY {
            Storage::Inline {
                data: [0u8; INLINE_CAPACITY],
                len: size,
            }
        } else {
            Storage::Heap(vec![0u8; size])
        }
    }

    /// Aliases `parent[offset..offset + size]`. The range must lie inside the
    /// parent, and the view cannot be resized.
    pub fn view(parent: &'a mut Buffer<'_>, offset: usize, size: usize) -> Result<Buffer<'a>, MemoryError> {
        if size == 0 {
            return Err(MemoryError::LimitExceeded("buffer size must be non-zero".to_string()));
        }
        parent.check_bounds(offset, size)?;
        let pointer_size = parent.pointer_size;
        Ok(Buffer {
            storage: Storage::View(&mut parent.as_mut_slice()[offset..offset + size]),
            pointer_size,
        })
    }

    pub fn size(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_view(&self) -> bool {
        matches!(self.storage, Storage::View(_))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline { .. })
    }

    pub fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            Storage::Empty => &[],
            Storage::Inline { data, len } => &data[..*len],
            Storage::Heap(v) => v,
            Storage::View(s) => s,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Empty => &mut [],
            Storage::Inline { data, len } => &mut data[..*len],
            Storage::Heap(v) => v,
            Storage::View(s) => s,
        }
    }

    /// Moves the storage out, leaving this buffer empty.
    pub fn take(&mut self) -> Buffer<'a> {
        Buffer {
            storage: std::mem::replace(&mut self.storage, Storage::Empty),
            pointer_size: self.pointer_size,
        }
    }

    pub fn resize(&mut self, size: usize) -> Result<(), MemoryError> {
        if size == self.size() {
            return Ok(());
        }
        if size == 0 {
            return Err(MemoryError::LimitExceeded("buffer size must be non-zero".to_string()));
        }
        let storage = std::mem::replace(&mut self.storage, Storage::Empty);
        self.storage = match storage {
            Storage::View(s) => {
                self.storage = Storage::View(s);
                return Err(MemoryError::NotSupported("cannot resize a buffer view".to_string()));
            }
            Storage::Inline { mut data, len } if size <= INLINE_CAPACITY => {
                if size < len {
                    data[size..len].fill(0);
                }
                Storage::Inline { data, len: size }
            }
            Storage::Inline { data, len } => {
                let mut v = vec![0u8; size];
                v[..len].copy_from_slice(&data[..len]);
                Storage::Heap(v)
            }
            Storage::Heap(v) if size <= INLINE_CAPACITY => {
                let mut data = [0u8; INLINE_CAPACITY];
                data[..size].copy_from_slice(&v[..size]);
                Storage::Inline { data, len: size }
            }
            Storage::Heap(mut v) => {
                v.resize(size, 0);
                Storage::Heap(v)
            }
            Storage::Empty => Self::owned_storage(size),
        };
        Ok(())
    }

    pub fn clear(&mut self) {
        self.as_mut_slice().fill(0);
    }

    fn check_bounds(&self, offset: usize, size: usize) -> Result<(), MemoryError> {
        let limit = self.size();
        match offset.checked_add(size) {
            Some(end) if end <= limit => Ok(()),
            _ => Err(MemoryError::out_of_bounds(offset, size, limit)),
        }
    }

    /// Fills `self[offset..offset + size]` from target memory at `addr`.
    pub fn read_from(
        &mut self,
        process: &ProcessHandle,
        addr: u64,
        offset: usize,
        size: usize,
    ) -> Result<bool, MemoryError> {
        self.check_bounds(offset, size)?;
        Ok(process.read(addr, &mut self.as_mut_slice()[offset..offset + size]))
    }

    /// Writes `self[offset..offset + size]` to target memory at `addr`.
    pub fn write_to(
        &self,
        process: &ProcessHandle,
        addr: u64,
        offset: usize,
        size: usize,
    ) -> Result<bool, MemoryError> {
        self.check_bounds(offset, size)?;
        Ok(process.write(addr, &self.as_slice()[offset..offset + size]))
    }

    /// Copies `size` bytes from `self[offset..]` into `dst[dst_offset..]`.
    pub fn read_buffer(
        &self,
        offset: usize,
        dst: &mut Buffer<'_>,
        dst_offset: usize,
        size: usize,
    ) -> Result<(), MemoryError> {
        self.check_bounds(offset, size)?;
        dst.check_bounds(dst_offset, size)?;
        dst.as_mut_slice()[dst_offset..dst_offset + size].copy_from_slice(&self.as_slice()[offset..offset + size]);
        Ok(())
    }

    /// Copies `size` bytes from `src[src_offset..]` into `self[offset..]`.
    pub fn write_buffer(
        &mut self,
        offset: usize,
        src: &Buffer<'_>,
        src_offset: usize,
        size: usize,
    ) -> Result<(), MemoryError> {
        src.read_buffer(src_offset, self, offset, size)
    }

    pub fn read_bytes(&self, offset: usize, size: usize) -> Result<&[u8], MemoryError> {
        self.check_bounds(offset, size)?;
        Ok(&self.as_slice()[offset..offset + size])
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), MemoryError> {
        self.check_bounds(offset, bytes.len())?;
        self.as_mut_slice()[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_value<T: Scalar>(&self, offset: usize) -> Result<T, MemoryError> {
        self.read_bytes(offset, T::SIZE).map(T::from_bytes)
    }

    pub fn write_value<T: Scalar>(&mut self, offset: usize, value: T) -> Result<(), MemoryError> {
        self.check_bounds(offset, T::SIZE)?;
        value.write_bytes(&mut self.as_mut_slice()[offset..offset + T::SIZE]);
        Ok(())
    }

    pub fn read_ptr(&self, offset: usize) -> Result<u64, MemoryError> {
        match self.pointer_size {
            4 => self.read_value::<u32>(offset).map(u64::from),
            _ => self.read_value::<u64>(offset),
        }
    }

    pub fn write_ptr(&mut self, offset: usize, value: u64) -> Result<(), MemoryError> {
        match self.pointer_size {
            4 => self.write_value(offset, value as u32),
            _ => self.write_value(offset, value),
        }
    }

    /// Reads `size` bytes as text, or up to the first null when `size` is 0.
    pub fn read_string(&self, offset: usize, size: usize) -> Result<String, MemoryError> {
        let size = if size == 0 { self.strlen(offset)?.min(self.size() - offset) } else { size };
        let raw = self.read_bytes(offset, size)?;
        let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..len]).into_owned())
    }

    /// Writes the string bytes without a terminator.
    pub fn write_string(&mut self, offset: usize, value: &str) -> Result<(), MemoryError> {
        self.write_bytes(offset, value.as_bytes())
    }

    /// Bounded strnlen from `offset`. Without a null in range the result is
    /// one past the remaining size.
    pub fn strlen(&self, offset: usize) -> Result<usize, MemoryError> {
        self.check_bounds(offset, 0)?;
        let rest = &self.as_slice()[offset..];
        Ok(rest.iter().position(|&b| b == 0).unwrap_or(rest.len() + 1))
    }
}

impl Clone for Buffer<'_> {
    fn clone(&self) -> Self {
        let bytes = self.as_slice();
        let mut storage = Self::owned_storage(bytes.len());
        match &mut storage {
            Storage::Inline { data, len } => data[..*len].copy_from_slice(bytes),
            Storage::Heap(v) => v.copy_from_slice(bytes),
            _ => {}
        }
        if bytes.is_empty() {
            storage = Storage::Empty;
        }
        Buffer {
            storage,
            pointer_size: self.pointer_size,
        }
    }
}

impl PartialEq for Buffer<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Buffer<'_> {}

impl fmt::Debug for Buffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.storage {
            Storage::Empty => "empty",
            Storage::Inline { .. } => "inline",
            Storage::Heap(_) => "heap",
            Storage::View(_) => "view",
        };
        f.debug_struct("Buffer")
            .field("kind", &kind)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Protection, SimulatedProcess};

    #[test]
    fn test_zero_size_rejected() {
        assert!(Buffer::new(0).is_err());
        let mut b = Buffer::new(4).unwrap();
        assert!(b.resize(0).is_err());
    }

    #[test]
    fn test_write_then_read_round_trips() {
        let mut b = Buffer::new(64).unwrap();
        for offset in [0usize, 1, 7, 56] {
            b.write_value(offset, 0x0102030405060708u64).unwrap();
            assert_eq!(b.read_value::<u64>(offset).unwrap(), 0x0102030405060708);
        }
        b.write_value(60, -1.25f32).unwrap();
        assert_eq!(b.read_value::<f32>(60).unwrap(), -1.25);
    }

    #[test]
    fn test_out_of_bounds_is_error() {
        let mut b = Buffer::new(8).unwrap();
        assert!(matches!(b.write_value(5, 1u32), Err(MemoryError::OutOfBounds { .. })));
        assert!(matches!(b.read_value::<u64>(1), Err(MemoryError::OutOfBounds { .. })));
        assert!(b.read_bytes(usize::MAX, 2).is_err());
        assert!(b.write_bytes(8, &[]).is_ok());
    }

    #[test]
    fn test_resize_preserves_prefix() {
        let mut b = Buffer::new(32).unwrap();
        for i in 0..32 {
            b.write_value(i, i as u8).unwrap();
        }
        let original = b.as_slice().to_vec();

        b.resize(200).unwrap();
        assert!(!b.is_inline());
        assert_eq!(&b.as_slice()[..32], &original[..]);
        assert!(b.as_slice()[32..].iter().all(|&x| x == 0));

        b.resize(32).unwrap();
        assert!(b.is_inline());
        assert_eq!(b.as_slice(), &original[..]);

        b.resize(16).unwrap();
        b.resize(32).unwrap();
        assert_eq!(&b.as_slice()[..16], &original[..16]);
        assert!(b.as_slice()[16..].iter().all(|&x| x == 0));
    }

    #[test]
    fn test_view_aliases_parent() {
        let mut parent = Buffer::new(100).unwrap();
        {
            let mut view = Buffer::view(&mut parent, 10, 8).unwrap();
            assert!(view.is_view());
            view.write_value(0, 0xAABBCCDDu32).unwrap();
            assert!(view.resize(16).is_err());
            assert!(view.write_value(6, 1u32).is_err());
        }
        assert_eq!(parent.read_value::<u32>(10).unwrap(), 0xAABBCCDD);
        assert!(Buffer::view(&mut parent, 96, 8).is_err());
    }

    #[test]
    fn test_clone_and_take() {
        let mut parent = Buffer::new(16).unwrap();
        parent.write_value(0, 9u32).unwrap();
        let view = Buffer::view(&mut parent, 0, 4).unwrap();
        let copy = view.clone();
        assert!(!copy.is_view());
        assert_eq!(copy.read_value::<u32>(0).unwrap(), 9);

        let mut owner = Buffer::new(100).unwrap();
        let moved = owner.take();
        assert_eq!(moved.size(), 100);
        assert!(owner.is_empty());
        assert!(!owner.is_view());
    }

    #[test]
    fn test_strlen_and_strings() {
        let mut b = Buffer::new(16).unwrap();
        b.write_string(0, "hello").unwrap();
        assert_eq!(b.strlen(0).unwrap(), 5);
        assert_eq!(b.read_string(0, 0).unwrap(), "hello");
        b.write_bytes(0, &[b'x'; 16]).unwrap();
        assert_eq!(b.strlen(10).unwrap(), 7);
        assert_eq!(b.read_string(10, 0).unwrap(), "xxxxxx");
    }

    #[test]
    fn test_buffer_copies() {
        let mut a = Buffer::from_bytes(&[1, 2, 3, 4, 5, 6]).unwrap();
        let mut b = Buffer::new(4).unwrap();
        a.read_buffer(2, &mut b, 0, 4).unwrap();
        assert_eq!(b.as_slice(), &[3, 4, 5, 6]);
        assert!(a.read_buffer(3, &mut b, 0, 4).is_err());
        a.write_buffer(0, &b, 2, 2).unwrap();
        assert_eq!(a.as_slice(), &[5, 6, 3, 4, 5, 6]);
        assert_ne!(a, b);
        assert_eq!(b.clone(), b);
    }

    #[test]
    fn test_process_round_trip() {
        let sim = SimulatedProcess::new(3, "t").with_32_bit();
        sim.map_region(0x5000, 0x100, Protection::READ_WRITE, "heap");
        let mut process = ProcessHandle::new(sim.clone());
        assert!(process.attach(3).unwrap());

        let mut b = Buffer::for_process(&process, 12).unwrap();
        b.write_ptr(0, 0xdeadbeef).unwrap();
        b.write_value(4, 77u64).unwrap();
        assert!(process.write_buffer(0x5000, &b));
        assert_eq!(sim.peek(0x5000, 4), Some(0xdeadbeefu32.to_ne_bytes().to_vec()));

        let mut back = Buffer::for_process(&process, 12).unwrap();
        assert!(process.read_buffer(0x5000, &mut back));
        assert_eq!(back, b);
        assert!(!back.read_from(&process, 0x9000, 0, 4).unwrap());
        assert!(back.read_from(&process, 0x5000, 10, 4).is_err());
    }
}
