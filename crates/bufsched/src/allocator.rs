// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Free-list allocator for fixed-size buffer slabs.
//!
//! Owns every payload slab in the pool: free slabs sit on a LIFO list, slabs
//! in use are attached to Assigned buffers tracked in the assigned set. The
//! allocator is internally synchronized; the scheduler lock never covers it.
//!
//! Returning a slab is split into `detach` (claim the slab and drop the
//! assigned-set entry) and `push_free` (make it allocatable again), so the
//! scheduler can settle its counters in between and `nr_free` never
//! understates the free list.
//!
//! Slab allocation is fallible (`Vec::try_reserve_exact`), so host memory
//! exhaustion surfaces as [`Error::AllocFailed`] instead of aborting. Batch
//! grows are all-or-nothing.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::buffer::{Buffer, BufferHandle, BufferState};
use crate::error::{Error, Result};

pub(crate) struct BufferAllocator {
    buffer_size: usize,
    /// LIFO free list: consecutive gets reuse the most recently freed slabs.
    free: Mutex<Vec<Box<[u8]>>>,
    /// Currently Assigned buffers, keyed by handle.
    assigned: DashMap<BufferHandle, Arc<Buffer>>,
}

impl BufferAllocator {
    /// Prepare an empty pool handing out `buffer_size`-byte slabs.
    pub(crate) fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            free: Mutex::new(Vec::new()),
            assigned: DashMap::new(),
        }
    }

    /// Allocate `count` fresh zeroed slabs onto the free list.
    ///
    /// All-or-nothing: on host allocation failure nothing is added and
    /// [`Error::AllocFailed`] is returned.
    pub(crate) fn new_slabs(&self, count: usize) -> Result<()> {
        let mut batch: Vec<Box<[u8]>> = Vec::new();
        batch
            .try_reserve_exact(count)
            .map_err(|_| Error::AllocFailed(count))?;

        for _ in 0..count {
            let mut slab: Vec<u8> = Vec::new();
            slab.try_reserve_exact(self.buffer_size)
                .map_err(|_| Error::AllocFailed(count))?;
            slab.resize(self.buffer_size, 0);
            batch.push(slab.into_boxed_slice());
        }

        self.free.lock().append(&mut batch);
        Ok(())
    }

    /// Pop a free slab and hand it out as an Assigned buffer stamped with
    /// `handle`.
    pub(crate) fn get(&self, handle: BufferHandle) -> Result<Arc<Buffer>> {
        if self.assigned.contains_key(&handle) {
            return Err(Error::AlreadyAssigned(handle));
        }

        let storage = self.free.lock().pop().ok_or(Error::FreeListExhausted)?;
        let buf = Arc::new(Buffer::new_assigned(handle, storage));

        if self.assigned.insert(handle, Arc::clone(&buf)).is_some() {
            // Lost a race on the same handle; the service must not do this.
            log::error!(
                "[ALLOC] duplicate assignment of {:?} replaced a live buffer",
                handle
            );
        }
        Ok(buf)
    }

    /// Claim a buffer's slab: drop its assigned-set entry and take the
    /// payload storage. Returns `None` when the buffer holds no storage
    /// (already freed or evicted). The caller decides the buffer's next
    /// state and hands the slab to [`push_free`](Self::push_free).
    pub(crate) fn detach(&self, buf: &Arc<Buffer>) -> Option<Box<[u8]>> {
        self.assigned.remove(&buf.handle());
        buf.inner().data.take()
    }

    /// Return a claimed slab to the free list.
    pub(crate) fn push_free(&self, storage: Box<[u8]>) {
        debug_assert_eq!(storage.len(), self.buffer_size);
        self.free.lock().push(storage);
    }

    /// Swapin path: attach a free slab under an existing (Evicted) buffer
    /// identity and re-enter it into the assigned set. The state flip to
    /// Assigned happens in the swapper once the payload is restored.
    pub(crate) fn attach_from_free(&self, buf: &Arc<Buffer>) -> Result<()> {
        let handle = buf.handle();
        if self.assigned.contains_key(&handle) {
            return Err(Error::AlreadyAssigned(handle));
        }

        let storage = self.free.lock().pop().ok_or(Error::FreeListExhausted)?;

        {
            let mut inner = buf.inner();
            if inner.data.is_some() {
                drop(inner);
                self.free.lock().push(storage);
                return Err(Error::InvalidState(format!(
                    "buffer {:?} already has payload attached",
                    handle
                )));
            }
            inner.data = Some(storage);
        }

        self.assigned.insert(handle, Arc::clone(buf));
        Ok(())
    }

    /// Memory-full swapin: steal the storage of the just-evicted donor `src`
    /// for the swapin target `dst`, swapping their assigned-set entries.
    pub(crate) fn transfer(&self, dst: &Arc<Buffer>, src: &Arc<Buffer>) -> Result<()> {
        if self.assigned.contains_key(&dst.handle()) {
            return Err(Error::AlreadyAssigned(dst.handle()));
        }

        let storage = {
            let mut src_inner = src.inner();
            if src_inner.state != BufferState::Evicted {
                return Err(Error::InvalidState(format!(
                    "transfer donor {:?} is not evicted",
                    src.handle()
                )));
            }
            src_inner
                .data
                .take()
                .ok_or(Error::NotResident(src.handle()))?
        };
        self.assigned.remove(&src.handle());

        {
            let mut dst_inner = dst.inner();
            if dst_inner.data.is_some() {
                drop(dst_inner);
                // Undo: give the donor its slab back.
                src.inner().data = Some(storage);
                self.assigned.insert(src.handle(), Arc::clone(src));
                return Err(Error::InvalidState(format!(
                    "transfer target {:?} already has payload attached",
                    dst.handle()
                )));
            }
            dst_inner.data = Some(storage);
        }

        self.assigned.insert(dst.handle(), Arc::clone(dst));
        Ok(())
    }

    /// Drop up to `count` slabs from the cold end of the free list. Returns
    /// the number actually freed.
    pub(crate) fn shrink(&self, count: usize) -> usize {
        let mut free = self.free.lock();
        let count = count.min(free.len());
        free.drain(..count);
        count
    }

    /// Number of slabs currently on the free list.
    pub(crate) fn free_len(&self) -> usize {
        self.free.lock().len()
    }

    /// Number of currently Assigned buffers.
    pub(crate) fn assigned_len(&self) -> usize {
        self.assigned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_allocator(slabs: usize) -> BufferAllocator {
        let alloc = BufferAllocator::new(64);
        alloc.new_slabs(slabs).expect("slab allocation should succeed");
        alloc
    }

    /// Free a buffer the way the scheduler does: detach, mark Free, push.
    fn free_buffer(alloc: &BufferAllocator, buf: &Arc<Buffer>) {
        let storage = alloc.detach(buf).expect("assigned buffer should hold storage");
        buf.inner().state = BufferState::Free;
        alloc.push_free(storage);
    }

    #[test]
    fn test_new_slabs_populate_free_list() {
        let alloc = make_allocator(4);
        assert_eq!(alloc.free_len(), 4);
        assert_eq!(alloc.assigned_len(), 0);
    }

    #[test]
    fn test_get_detach_roundtrip() {
        let alloc = make_allocator(2);

        let buf = alloc.get(BufferHandle(7)).expect("get should succeed");
        assert_eq!(alloc.free_len(), 1);
        assert_eq!(alloc.assigned_len(), 1);
        assert_eq!(buf.state(), BufferState::Assigned);

        free_buffer(&alloc, &buf);
        assert_eq!(alloc.free_len(), 2);
        assert_eq!(alloc.assigned_len(), 0);
        assert_eq!(buf.state(), BufferState::Free);
    }

    #[test]
    fn test_lifo_reuse_of_freed_storage() {
        let alloc = make_allocator(1);

        let buf = alloc.get(BufferHandle(1)).expect("get should succeed");
        buf.write_bytes(0, b"warm").expect("write should succeed");
        free_buffer(&alloc, &buf);

        // The next get must reuse the just-freed slab, stale bytes included.
        let buf2 = alloc.get(BufferHandle(2)).expect("get should succeed");
        let mut out = [0u8; 4];
        buf2.read_bytes(0, &mut out).expect("read should succeed");
        assert_eq!(&out, b"warm");
    }

    #[test]
    fn test_duplicate_handle_rejected() {
        let alloc = make_allocator(2);

        let _buf = alloc.get(BufferHandle(1)).expect("get should succeed");
        let err = alloc
            .get(BufferHandle(1))
            .expect_err("duplicate handle should fail");
        assert!(matches!(err, Error::AlreadyAssigned(BufferHandle(1))));
    }

    #[test]
    fn test_exhaustion_reported() {
        let alloc = make_allocator(1);

        let _buf = alloc.get(BufferHandle(1)).expect("get should succeed");
        let err = alloc
            .get(BufferHandle(2))
            .expect_err("empty free list should fail");
        assert!(matches!(err, Error::FreeListExhausted));
    }

    #[test]
    fn test_detach_after_free_yields_nothing() {
        let alloc = make_allocator(2);
        let buf = alloc.get(BufferHandle(1)).expect("get should succeed");
        free_buffer(&alloc, &buf);

        assert!(alloc.detach(&buf).is_none());
        assert_eq!(alloc.free_len(), 2);
    }

    #[test]
    fn test_detach_and_attach_from_free() {
        let alloc = make_allocator(1);
        let buf = alloc.get(BufferHandle(9)).expect("get should succeed");
        buf.inner().state = BufferState::Evicted;

        let storage = alloc.detach(&buf).expect("storage should be attached");
        alloc.push_free(storage);
        assert_eq!(alloc.free_len(), 1);
        assert_eq!(alloc.assigned_len(), 0);
        assert!(!buf.is_resident());

        alloc.attach_from_free(&buf).expect("attach should succeed");
        assert_eq!(alloc.free_len(), 0);
        assert_eq!(alloc.assigned_len(), 1);
        assert!(buf.is_resident());
    }

    #[test]
    fn test_attach_from_free_requires_detached_target() {
        let alloc = make_allocator(2);
        let buf = alloc.get(BufferHandle(1)).expect("get should succeed");

        let err = alloc
            .attach_from_free(&buf)
            .expect_err("attach to resident buffer should fail");
        assert!(matches!(err, Error::AlreadyAssigned(BufferHandle(1))));
        assert_eq!(alloc.free_len(), 1);
    }

    #[test]
    fn test_transfer_steals_donor_storage() {
        let alloc = make_allocator(2);

        let donor = alloc.get(BufferHandle(1)).expect("get should succeed");
        donor.write_bytes(0, b"gone").expect("write should succeed");
        donor.inner().state = BufferState::Evicted;

        let target = alloc.get(BufferHandle(2)).expect("get should succeed");
        target.inner().state = BufferState::Evicted;
        let storage = alloc.detach(&target).expect("storage should be attached");
        drop(storage); // memory full: no free slab to fall back to

        alloc
            .transfer(&target, &donor)
            .expect("transfer should succeed");
        assert!(target.is_resident());
        assert!(!donor.is_resident());
        assert_eq!(alloc.assigned_len(), 1);

        // The stolen slab carries the donor's bytes until overwritten.
        let mut out = [0u8; 4];
        target.read_bytes(0, &mut out).expect("read should succeed");
        assert_eq!(&out, b"gone");
    }

    #[test]
    fn test_transfer_requires_evicted_donor() {
        let alloc = make_allocator(2);
        let donor = alloc.get(BufferHandle(1)).expect("get should succeed");
        let target = alloc.get(BufferHandle(2)).expect("get should succeed");
        target.inner().state = BufferState::Evicted;
        let storage = alloc.detach(&target).expect("storage should be attached");
        alloc.push_free(storage);

        let err = alloc
            .transfer(&target, &donor)
            .expect_err("assigned donor should be rejected");
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(donor.is_resident());
    }

    #[test]
    fn test_shrink_caps_at_free_len() {
        let alloc = make_allocator(3);
        assert_eq!(alloc.shrink(10), 3);
        assert_eq!(alloc.free_len(), 0);
        assert_eq!(alloc.shrink(1), 0);
    }
}
