//! Kernel argument buffers
//!
//! Each buffer is backed by a host mirror owned by the manager. The mirror is
//! handed to the device as the buffer's host pointer; migrations move data
//! between it and device memory. Buffers are keyed by flat argument index,
//! and the load / store sets are derived from the access flags.

use std::collections::{BTreeMap, BTreeSet};

use bytemuck::Pod;

use crate::backend::{placement_for_tag, AcceleratorApi, BankPlacement, DeviceResult, MemFlags};
use crate::loader::xclbin::ArgInfo;

use super::DeviceSession;

/// One device buffer and its host mirror
#[derive(Debug)]
pub struct BufferRecord<B> {
    // Dropped before `host`, which backs it.
    buffer: B,
    host: Box<[u8]>,
    flags: MemFlags,
    placement: Option<BankPlacement>,
}

impl<B> BufferRecord<B> {
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn host(&self) -> &[u8] {
        &self.host
    }

    /// Writes are only seen by the device after the next load
    pub fn host_mut(&mut self) -> &mut [u8] {
        &mut self.host
    }

    pub fn len(&self) -> usize {
        self.host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    pub fn flags(&self) -> MemFlags {
        self.flags
    }

    /// `None` for indices outside the container's argument table
    pub fn placement(&self) -> Option<BankPlacement> {
        self.placement
    }
}

/// Buffers of one session
pub struct BufferManager<A: AcceleratorApi> {
    records: BTreeMap<usize, BufferRecord<A::Buffer>>,
    load: BTreeSet<usize>,
    store: BTreeSet<usize>,
}

impl<A: AcceleratorApi> Default for BufferManager<A> {
    fn default() -> Self {
        BufferManager {
            records: BTreeMap::new(),
            load: BTreeSet::new(),
            store: BTreeSet::new(),
        }
    }
}

impl<A: AcceleratorApi> BufferManager<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the buffer for argument `index` over `host`
    ///
    /// The buffer size is the host memory length. Indices known to the
    /// argument table get a placement request from their memory tag; other
    /// indices get a plain buffer. A previous buffer for `index` is released.
    pub fn create_buffer(
        &mut self,
        session: &DeviceSession<A>,
        args: &[ArgInfo],
        index: usize,
        flags: MemFlags,
        host: Vec<u8>,
    ) -> DeviceResult<&A::Buffer> {
        let placement = args.get(index).map(|arg| {
            let placement = placement_for_tag(arg.tag.as_deref());
            if placement.is_placed() {
                tracing::debug!(
                    "Argument {} ('{}') assigned to {}",
                    index,
                    arg.name,
                    arg.tag.as_deref().unwrap_or_default()
                );
            }
            placement
        });

        let mut host = host.into_boxed_slice();
        let flags = flags | MemFlags::USE_HOST_PTR;
        // SAFETY: the boxed slice's heap allocation does not move when the
        // box is moved into the record, and the record drops the buffer
        // before the mirror.
        let buffer = unsafe {
            session.api().create_buffer(
                session.context(),
                flags,
                host.as_mut_ptr(),
                host.len(),
                placement,
            )?
        };

        self.load.remove(&index);
        self.store.remove(&index);
        if flags.is_loaded() {
            self.load.insert(index);
        }
        if flags.is_stored() {
            self.store.insert(index);
        }
        tracing::trace!(
            "Buffer for argument {}: {} bytes, load={}, store={}",
            index,
            host.len(),
            flags.is_loaded(),
            flags.is_stored()
        );

        if self.records.contains_key(&index) {
            tracing::debug!("Replacing buffer for argument {}", index);
        }
        let record = BufferRecord {
            buffer,
            host,
            flags,
            placement,
        };
        self.records.insert(index, record);
        Ok(&self.records[&index].buffer)
    }

    /// Typed variant of [`create_buffer`](Self::create_buffer)
    pub fn create_buffer_from_slice<T: Pod>(
        &mut self,
        session: &DeviceSession<A>,
        args: &[ArgInfo],
        index: usize,
        flags: MemFlags,
        data: &[T],
    ) -> DeviceResult<&A::Buffer> {
        let bytes = bytemuck::cast_slice::<T, u8>(data).to_vec();
        self.create_buffer(session, args, index, flags, bytes)
    }

    pub fn record(&self, index: usize) -> Option<&BufferRecord<A::Buffer>> {
        self.records.get(&index)
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut BufferRecord<A::Buffer>> {
        self.records.get_mut(&index)
    }

    pub fn buffer(&self, index: usize) -> Option<&A::Buffer> {
        self.records.get(&index).map(|r| &r.buffer)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Argument indices migrated to the device on load
    pub fn load_set(&self) -> &BTreeSet<usize> {
        &self.load
    }

    /// Argument indices migrated back to the host on store
    pub fn store_set(&self) -> &BTreeSet<usize> {
        &self.store
    }

    pub fn load_buffers(&self) -> Vec<A::Buffer> {
        self.collect(&self.load)
    }

    pub fn store_buffers(&self) -> Vec<A::Buffer> {
        self.collect(&self.store)
    }

    pub fn load_bytes(&self) -> u64 {
        self.bytes(&self.load)
    }

    pub fn store_bytes(&self) -> u64 {
        self.bytes(&self.store)
    }

    fn collect(&self, set: &BTreeSet<usize>) -> Vec<A::Buffer> {
        set.iter()
            .filter_map(|i| self.records.get(i))
            .map(|r| r.buffer.clone())
            .collect()
    }

    fn bytes(&self, set: &BTreeSet<usize>) -> u64 {
        set.iter()
            .filter_map(|i| self.records.get(i))
            .map(|r| r.len() as u64)
            .sum()
    }
}

impl<A: AcceleratorApi> std::fmt::Debug for BufferManager<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferManager")
            .field("buffers", &self.records.keys().collect::<Vec<_>>())
            .field("load", &self.load)
            .field("store", &self.store)
            .finish()
    }
}
