// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffer scheduler: the public orchestration layer.
//!
//! Ties the free-list allocator, the swapper, and the MRU index together
//! under one lock-and-condvar pair, and runs the resize controller worker for
//! the lifetime of the scheduler. Client calls (`alloc`, `free`,
//! `mark_updated`) never perform I/O; `swapin` may block on the swap file.
//!
//! ## Counter discipline
//!
//! `nr_free` never understates the free list: credits are applied before
//! slabs are pushed, debits after slabs are popped. This keeps the counters
//! non-negative under any interleaving of client calls and the controller,
//! at the cost of `nr_free` briefly overstating the list during grows.

mod mru;
mod resize;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::allocator::BufferAllocator;
use crate::buffer::{Buffer, BufferHandle, BufferState};
use crate::config::SchedConfig;
use crate::error::{Error, Result};
use crate::metrics::{MetricsSnapshot, SchedMetrics};
use crate::swap::Swapper;

use mru::MruIndex;

/// Synchronous eviction attempts before `alloc` reports exhaustion.
const MAX_ALLOC_EVICTIONS: usize = 3;

/// Counters and flags guarded by the scheduler lock.
pub(crate) struct SchedState {
    pub(crate) nr_free: usize,
    pub(crate) nr_assigned: usize,
    /// Slabs allocated so far (grown and shrunk by the controller).
    pub(crate) capacity: usize,
    pub(crate) resize_req: bool,
    pub(crate) shrink_req: bool,
    pub(crate) shutdown: bool,
    pub(crate) mru: MruIndex,
}

/// State shared between client calls and the resize controller.
pub(crate) struct SchedShared {
    pub(crate) config: SchedConfig,
    pub(crate) state: Mutex<SchedState>,
    pub(crate) cond: Condvar,
    pub(crate) allocator: BufferAllocator,
    pub(crate) swapper: Swapper,
    pub(crate) metrics: SchedMetrics,
}

/// Point-in-time copy of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCounters {
    pub nr_free: usize,
    pub nr_assigned: usize,
    pub capacity: usize,
}

/// Memory manager for fixed-size data buffers with swap-backed eviction.
///
/// See the [crate docs](crate) for an overview and example.
pub struct BufferScheduler {
    shared: Arc<SchedShared>,
    worker: Option<JoinHandle<()>>,
}

impl BufferScheduler {
    /// Validate the configuration, eagerly allocate the initial slab pool,
    /// and start the resize controller.
    pub fn new(config: SchedConfig) -> Result<Self> {
        config.validate()?;

        let allocator = BufferAllocator::new(config.buffer_size);
        allocator.new_slabs(config.initial_capacity)?;

        let swapper = Swapper::new(config.buffer_size, config.swap_path.clone())?;

        let state = SchedState {
            nr_free: config.initial_capacity,
            nr_assigned: 0,
            capacity: config.initial_capacity,
            resize_req: false,
            shrink_req: false,
            shutdown: false,
            mru: MruIndex::new(),
        };

        let shared = Arc::new(SchedShared {
            config,
            state: Mutex::new(state),
            cond: Condvar::new(),
            allocator,
            swapper,
            metrics: SchedMetrics::default(),
        });

        let worker_shared = Arc::clone(&shared);
        #[allow(clippy::expect_used)] // thread spawn failure is unrecoverable
        let worker = thread::Builder::new()
            .name("bufsched-resize".to_string())
            .spawn(move || resize::run(worker_shared))
            .expect("Failed to spawn resize controller thread");

        log::info!(
            "[SCHED] pool ready: buffer_size={} max_pool_size={} initial_capacity={}",
            shared.config.buffer_size,
            shared.config.max_pool_size,
            shared.config.initial_capacity
        );

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Assign a buffer to `handle` from the free list.
    ///
    /// Returns without waiting for the controller; dropping below the
    /// low-water mark only signals it. When the free list is drained faster
    /// than the controller replenishes it, the call evicts MRU-tail buffers
    /// synchronously; with no eviction candidates left it reports
    /// [`Error::FreeListExhausted`] and the caller may retry later.
    pub fn alloc(&self, handle: BufferHandle) -> Result<Arc<Buffer>> {
        let mut attempts = 0;
        let buf = loop {
            match self.shared.allocator.get(handle) {
                Ok(buf) => break buf,
                Err(Error::FreeListExhausted) => {
                    attempts += 1;
                    if attempts > MAX_ALLOC_EVICTIONS {
                        return Err(Error::FreeListExhausted);
                    }
                    self.evict_coldest()?;
                }
                Err(e) => return Err(e),
            }
        };

        {
            let mut st = self.shared.state.lock();
            st.nr_assigned += 1;
            st.nr_free -= 1;

            if st.nr_free <= self.shared.config.min_free {
                st.resize_req = true;
                self.shared.cond.notify_one();
            }
        }

        self.shared.metrics.record_alloc();
        Ok(buf)
    }

    /// Return an Assigned buffer to the free list.
    pub fn free(&self, buf: &Arc<Buffer>) -> Result<()> {
        let handle = buf.handle();
        let Some(storage) = self.shared.allocator.detach(buf) else {
            return Err(Error::NotFound(handle));
        };
        buf.inner().state = BufferState::Free;

        {
            let mut st = self.shared.state.lock();
            st.mru.remove(handle);
            st.nr_assigned -= 1;
            st.nr_free += 1;

            if st.nr_free == self.shared.config.max_free {
                st.shrink_req = true;
                self.shared.cond.notify_one();
            }
        }

        self.shared.allocator.push_free(storage);
        self.shared.metrics.record_free();
        Ok(())
    }

    /// Re-insert the buffer at the MRU head (most recently updated).
    ///
    /// No counter changes. No-op on Free or Evicted buffers: only Assigned
    /// buffers are eviction candidates.
    pub fn mark_updated(&self, buf: &Arc<Buffer>) {
        let mut st = self.shared.state.lock();
        if buf.state() != BufferState::Assigned {
            return;
        }
        st.mru.touch(buf);
        self.shared.metrics.record_mark_updated();
    }

    /// Re-materialize a previously evicted buffer.
    ///
    /// When the pool has free memory the payload is restored into a free
    /// slab; when memory is full the MRU-tail buffer is evicted and its slab
    /// is stolen, leaving the counters untouched (one Assigned leaves, one
    /// enters). On failure the buffer stays Evicted and the counters match
    /// the pre-call state.
    pub fn swapin(&self, buf: &Arc<Buffer>) -> Result<()> {
        let handle = buf.handle();
        if buf.state() != BufferState::Evicted {
            return Err(Error::InvalidState(format!(
                "swapin target {:?} is not evicted",
                handle
            )));
        }
        if !self.shared.swapper.has_slot(handle) {
            return Err(Error::SwapSlotMissing(handle));
        }

        let memory_full = { self.shared.state.lock().nr_free == 0 };

        let mut attached_from_free = false;
        if !memory_full {
            match self.shared.allocator.attach_from_free(buf) {
                Ok(()) => {
                    let mut st = self.shared.state.lock();
                    st.nr_free -= 1;
                    st.nr_assigned += 1;
                    attached_from_free = true;
                }
                // The free list drained between the check and the pop; fall
                // through to the eviction path.
                Err(Error::FreeListExhausted) => {}
                Err(e) => return Err(e),
            }
        }

        if !attached_from_free {
            let victim = { self.shared.state.lock().mru.take_coldest() };
            let Some(victim) = victim else {
                return Err(Error::FreeListExhausted);
            };

            if let Err(e) = self.shared.swapper.swapout(&victim) {
                log::warn!("[SCHED] swapout of {:?} failed: {}", victim.handle(), e);
                self.shared.state.lock().mru.touch(&victim);
                return Err(e);
            }
            self.shared.metrics.record_swapout();
            self.shared.metrics.record_eviction();

            if let Err(e) = self.shared.allocator.transfer(buf, &victim) {
                // The victim is already on swap; reclaim its slab instead of
                // stranding it on the evicted object.
                if let Some(storage) = self.shared.allocator.detach(&victim) {
                    {
                        let mut st = self.shared.state.lock();
                        st.nr_free += 1;
                        st.nr_assigned -= 1;
                    }
                    self.shared.allocator.push_free(storage);
                }
                return Err(e);
            }
        }

        match self.shared.swapper.swapin(buf) {
            Ok(()) => {
                self.shared.metrics.record_swapin();
                Ok(())
            }
            Err(e) => {
                // Leave the buffer Evicted; give its slab back and settle the
                // counters as if the target had never entered the pool.
                if let Some(storage) = self.shared.allocator.detach(buf) {
                    {
                        let mut st = self.shared.state.lock();
                        st.nr_free += 1;
                        st.nr_assigned -= 1;
                    }
                    self.shared.allocator.push_free(storage);
                }
                Err(e)
            }
        }
    }

    /// Snapshot of the pool counters.
    pub fn counters(&self) -> PoolCounters {
        let st = self.shared.state.lock();
        PoolCounters {
            nr_free: st.nr_free,
            nr_assigned: st.nr_assigned,
            capacity: st.capacity,
        }
    }

    /// Snapshot of the operation metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// The configuration this scheduler was built with.
    pub fn config(&self) -> &SchedConfig {
        &self.shared.config
    }

    /// Evict one MRU-tail buffer to swap so `alloc` can make progress when
    /// the free list is empty.
    fn evict_coldest(&self) -> Result<()> {
        let victim = { self.shared.state.lock().mru.take_coldest() };
        let Some(victim) = victim else {
            return Err(Error::FreeListExhausted);
        };

        match self.shared.swapper.swapout(&victim) {
            Ok(()) => {}
            // Lost a race with free(); a slab was reclaimed either way.
            Err(Error::NotResident(_)) => return Ok(()),
            Err(e) => {
                self.shared.state.lock().mru.touch(&victim);
                return Err(e);
            }
        }

        let Some(storage) = self.shared.allocator.detach(&victim) else {
            return Ok(());
        };
        {
            let mut st = self.shared.state.lock();
            st.nr_free += 1;
            st.nr_assigned -= 1;
        }
        self.shared.allocator.push_free(storage);
        self.shared.metrics.record_swapout();
        self.shared.metrics.record_eviction();
        Ok(())
    }
}

impl Drop for BufferScheduler {
    fn drop(&mut self) {
        {
            let mut st = self.shared.state.lock();
            st.shutdown = true;
            self.shared.cond.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        log::debug!("[SCHED] scheduler destroyed");
    }
}
