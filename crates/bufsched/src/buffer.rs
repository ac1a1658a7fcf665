// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffer objects and handles.
//!
//! A [`Buffer`] is a fixed-size payload region plus metadata. The payload
//! storage is detachable: the allocator takes it back on free and on
//! eviction, and re-attaches storage on swapin. The buffer object itself is
//! shared (`Arc<Buffer>`) and outlives any single assignment, so the
//! buffering service can keep holding it across evict/swapin cycles.

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};

/// Opaque identifier chosen by the buffering service to name a logical
/// object across evict/swapin cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Lifecycle state of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Storage returned to the free list; the object awaits reuse or drop.
    Free,
    /// Storage attached, handle present in the assigned set.
    Assigned,
    /// Payload lives only in the swap slot; storage is detached.
    Evicted,
}

/// Mutable interior of a buffer: state plus the detachable payload storage.
pub(crate) struct BufferInner {
    pub(crate) state: BufferState,
    pub(crate) data: Option<Box<[u8]>>,
}

/// A fixed-size data buffer identified by a [`BufferHandle`].
pub struct Buffer {
    handle: BufferHandle,
    size: usize,
    inner: Mutex<BufferInner>,
}

impl Buffer {
    /// Build an Assigned buffer around freshly attached storage.
    pub(crate) fn new_assigned(handle: BufferHandle, storage: Box<[u8]>) -> Self {
        let size = storage.len();
        Self {
            handle,
            size,
            inner: Mutex::new(BufferInner {
                state: BufferState::Assigned,
                data: Some(storage),
            }),
        }
    }

    /// Lock the mutable interior. Crate-internal: the allocator detaches and
    /// attaches storage through this, the swapper reads/writes payload and
    /// flips the state through it.
    pub(crate) fn inner(&self) -> MutexGuard<'_, BufferInner> {
        self.inner.lock()
    }

    /// The handle this buffer was assigned under.
    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Fixed payload size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BufferState {
        self.inner.lock().state
    }

    /// True when the payload storage is attached and readable/writable.
    pub fn is_resident(&self) -> bool {
        self.inner.lock().data.is_some()
    }

    /// Copy `src` into the payload at `offset`.
    ///
    /// Fails with [`Error::NotResident`] when the payload is detached
    /// (buffer Evicted or already freed) and [`Error::OutOfBounds`] when the
    /// range exceeds the fixed buffer size.
    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.check_range(offset, src.len())?;
        let mut inner = self.inner.lock();
        let data = inner.data.as_mut().ok_or(Error::NotResident(self.handle))?;
        data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Copy payload bytes at `offset` into `dst`.
    pub fn read_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.check_range(offset, dst.len())?;
        let inner = self.inner.lock();
        let data = inner.data.as_ref().ok_or(Error::NotResident(self.handle))?;
        dst.copy_from_slice(&data[offset..offset + dst.len()]);
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        if offset.saturating_add(len) > self.size {
            return Err(Error::OutOfBounds {
                offset,
                len,
                capacity: self.size,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("state", &inner.state)
            .field("resident", &inner.data.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_buffer(size: usize) -> Buffer {
        Buffer::new_assigned(BufferHandle(1), vec![0u8; size].into_boxed_slice())
    }

    #[test]
    fn test_write_read_roundtrip() {
        let buf = make_buffer(64);
        buf.write_bytes(8, b"payload").expect("write should succeed");

        let mut out = [0u8; 7];
        buf.read_bytes(8, &mut out).expect("read should succeed");
        assert_eq!(&out, b"payload");
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let buf = make_buffer(16);
        let err = buf
            .write_bytes(10, &[0u8; 8])
            .expect_err("write past end should fail");
        assert!(matches!(err, Error::OutOfBounds { capacity: 16, .. }));
    }

    #[test]
    fn test_detached_payload_not_resident() {
        let buf = make_buffer(16);
        buf.inner().data.take();

        assert!(!buf.is_resident());
        let err = buf
            .read_bytes(0, &mut [0u8; 4])
            .expect_err("read of detached payload should fail");
        assert!(matches!(err, Error::NotResident(BufferHandle(1))));
    }

    #[test]
    fn test_new_assigned_state() {
        let buf = make_buffer(16);
        assert_eq!(buf.state(), BufferState::Assigned);
        assert_eq!(buf.size(), 16);
        assert_eq!(buf.handle(), BufferHandle(1));
    }
}
