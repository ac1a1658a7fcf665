// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recency index of evictable buffers.
//!
//! Tracks Assigned buffers ordered by the most recent `mark_updated` call;
//! the coldest entry is the next eviction candidate. Freshly allocated
//! buffers are exempt until their first `mark_updated`. The index has no
//! internal lock: it lives inside the scheduler state and is guarded by the
//! scheduler lock.

use std::sync::Arc;

use lru::LruCache;

use crate::buffer::{Buffer, BufferHandle};

pub(crate) struct MruIndex {
    inner: LruCache<BufferHandle, Arc<Buffer>>,
}

impl MruIndex {
    pub(crate) fn new() -> Self {
        Self {
            inner: LruCache::unbounded(),
        }
    }

    /// Insert at the hot end, or promote if already present. Idempotent:
    /// repeated touches keep exactly one entry.
    pub(crate) fn touch(&mut self, buf: &Arc<Buffer>) {
        self.inner.put(buf.handle(), Arc::clone(buf));
    }

    /// Remove and return the coldest entry (the eviction candidate).
    pub(crate) fn take_coldest(&mut self) -> Option<Arc<Buffer>> {
        self.inner.pop_lru().map(|(_, buf)| buf)
    }

    /// Detach a specific buffer; safe when it is not linked.
    pub(crate) fn remove(&mut self, handle: BufferHandle) -> Option<Arc<Buffer>> {
        self.inner.pop(&handle)
    }

    pub(crate) fn contains(&self, handle: BufferHandle) -> bool {
        self.inner.contains(&handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
