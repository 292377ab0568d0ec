//! Shared memory heaps handed to the host.
//!
//! A [`MemoryHeap`] is a fixed-size block shared through `Arc`; a [`Memory`]
//! names a byte range of one heap. Frame delivery passes `Memory` values so
//! the host reads the same buffer the capture thread writes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::traits::{HalError, Result};

/// A fixed-size block of shared memory.
#[derive(Debug)]
pub struct MemoryHeap {
    name: &'static str,
    data: Mutex<Box<[u8]>>,
}

impl MemoryHeap {
    /// Allocate a zeroed heap of `size` bytes.
    #[must_use]
    pub fn new(size: usize, name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            data: Mutex::new(vec![0u8; size].into_boxed_slice()),
        })
    }

    /// Heap name, for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Heap size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Lock the heap contents.
    pub fn lock(&self) -> MutexGuard<'_, Box<[u8]>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A byte range of a [`MemoryHeap`].
#[derive(Debug, Clone)]
pub struct Memory {
    heap: Arc<MemoryHeap>,
    offset: usize,
    len: usize,
}

impl Memory {
    /// Create a view of `len` bytes starting at `offset`.
    pub fn new(heap: &Arc<MemoryHeap>, offset: usize, len: usize) -> Result<Self> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| HalError::InvalidArgument("memory region overflows".to_owned()))?;
        if end > heap.size() {
            return Err(HalError::InvalidArgument(format!(
                "region {offset}..{end} exceeds heap `{}` of {} bytes",
                heap.name(),
                heap.size()
            )));
        }
        Ok(Self {
            heap: Arc::clone(heap),
            offset,
            len,
        })
    }

    /// A view covering all of `heap`.
    #[must_use]
    pub fn from_heap(heap: &Arc<MemoryHeap>) -> Self {
        Self {
            heap: Arc::clone(heap),
            offset: 0,
            len: heap.size(),
        }
    }

    /// Allocate a dedicated heap holding `bytes` and return a view covering it.
    #[must_use]
    pub fn from_bytes(bytes: &[u8], name: &'static str) -> Self {
        let heap = MemoryHeap::new(bytes.len(), name);
        heap.lock().copy_from_slice(bytes);
        Self {
            heap,
            offset: 0,
            len: bytes.len(),
        }
    }

    /// The heap backing this region.
    #[must_use]
    pub const fn heap(&self) -> &Arc<MemoryHeap> {
        &self.heap
    }

    /// Byte offset into the heap.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the region is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Run `f` with the region's bytes borrowed under the heap lock.
    pub fn with_bytes<R, F: FnOnce(&[u8]) -> R>(&self, f: F) -> R {
        let data = self.heap.lock();
        f(data.get(self.offset..self.offset + self.len).unwrap_or(&[]))
    }

    /// Run `f` with the region's bytes mutably borrowed under the heap lock.
    pub fn with_bytes_mut<R, F: FnOnce(&mut [u8]) -> R>(&self, f: F) -> R {
        let mut data = self.heap.lock();
        f(data.get_mut(self.offset..self.offset + self.len).unwrap_or(&mut []))
    }

    /// Copy the region's bytes out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.with_bytes(<[u8]>::to_vec)
    }
}
