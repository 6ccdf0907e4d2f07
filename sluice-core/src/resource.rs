//! Shared resources.
//!
//! Resources are owned by the fragment and handed to operators by reference.
//! A resource that needs exclusive access synchronizes internally; the
//! scheduler never serializes resource use on an operator's behalf.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A dependency shared by several operators (allocator, serializer, ...).
pub trait Resource: Any + Send + Sync + Debug {
    /// Short kind name for logging.
    fn kind(&self) -> &'static str;
}

/// Named resources owned by a fragment.
#[derive(Debug, Default, Clone)]
pub struct ResourceSet {
    entries: HashMap<String, ResourceEntry>,
}

#[derive(Debug, Clone)]
struct ResourceEntry {
    kind: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl ResourceSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resource.
    pub fn insert<R: Resource>(&mut self, name: impl Into<String>, resource: Arc<R>) {
        let kind = resource.kind();
        self.entries.insert(
            name.into(),
            ResourceEntry {
                kind,
                value: resource,
            },
        );
    }

    /// Look up a resource by name and type.
    pub fn get<R: Resource>(&self, name: &str) -> Option<Arc<R>> {
        let entry = self.entries.get(name)?;
        Arc::clone(&entry.value).downcast::<R>().ok()
    }

    /// The kind of the named resource.
    pub fn kind_of(&self, name: &str) -> Option<&'static str> {
        self.entries.get(name).map(|e| e.kind)
    }

    /// Whether a resource with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A pool of fixed-size host memory blocks.
///
/// Blocks are handed out by [`BlockMemoryPool::allocate`] and return to the
/// pool when the [`MemoryBlock`] is dropped.
#[derive(Debug)]
pub struct BlockMemoryPool {
    block_size: usize,
    num_blocks: usize,
    free: Arc<Mutex<Vec<Box<[u8]>>>>,
}

impl BlockMemoryPool {
    /// Preallocate `num_blocks` blocks of `block_size` bytes.
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        let free = (0..num_blocks)
            .map(|_| vec![0u8; block_size].into_boxed_slice())
            .collect();
        Self {
            block_size,
            num_blocks,
            free: Arc::new(Mutex::new(free)),
        }
    }

    /// Take a block, or None if every block is in use.
    pub fn allocate(&self) -> Option<MemoryBlock> {
        let data = self.free.lock().pop()?;
        Some(MemoryBlock {
            data: Some(data),
            pool: Arc::clone(&self.free),
        })
    }

    /// Blocks currently free.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Size of each block in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }
}

impl Resource for BlockMemoryPool {
    fn kind(&self) -> &'static str {
        "block_memory_pool"
    }
}

/// A block borrowed from a [`BlockMemoryPool`].
#[derive(Debug)]
pub struct MemoryBlock {
    data: Option<Box<[u8]>>,
    pool: Arc<Mutex<Vec<Box<[u8]>>>>,
}

impl Deref for MemoryBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for MemoryBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for MemoryBlock {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.lock().push(data);
        }
    }
}
