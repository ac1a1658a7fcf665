// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resize controller: the scheduler's background worker.
//!
//! Waits on the scheduler condvar for coalesced grow/shrink requests and
//! keeps the pool inside its watermarks: grows the slab pool while there is
//! headroom, evicts MRU-tail buffers to swap once the ceiling is reached, and
//! halves the free surplus when the high-water mark fires. The scheduler lock
//! is held only for accounting; slab allocation and swap I/O run outside it.

use std::sync::Arc;

use crate::error::Error;

use super::SchedShared;

/// Worker entry point; runs until `shutdown` is set.
pub(crate) fn run(shared: Arc<SchedShared>) {
    log::debug!("[RESIZE] controller running");

    loop {
        let mut st = shared.state.lock();
        while !st.resize_req && !st.shrink_req && !st.shutdown {
            shared.cond.wait(&mut st);
        }
        if st.shutdown {
            break;
        }

        if st.shrink_req {
            st.shrink_req = false;
            let count = st.nr_free / 2;
            drop(st);
            shrink_pool(&shared, count);
        } else {
            st.resize_req = false;
            if st.nr_free + st.nr_assigned >= shared.config.max_pool_size {
                drop(st);
                evict_batch(&shared);
            } else {
                grow_pool(&shared, st);
            }
        }
    }

    log::debug!("[RESIZE] controller stopped");
}

/// Add slabs according to the sizing policy: double the working set while
/// demand outruns capacity, clamp to the `max_free` window near the ceiling,
/// otherwise allocate exactly the remaining headroom.
fn grow_pool(shared: &SchedShared, mut st: parking_lot::MutexGuard<'_, super::SchedState>) {
    let config = &shared.config;
    let want = config.max_pool_size - st.nr_free - st.nr_assigned;

    let count = if want > st.capacity {
        st.capacity
    } else if want > config.max_free {
        config.max_free - 1
    } else {
        want
    };

    // Credit the counters before the slabs exist; alloc callers that outrun
    // the allocation fall back to the eviction path instead of underflowing.
    st.capacity += count;
    st.nr_free += count;
    drop(st);

    match shared.allocator.new_slabs(count) {
        Ok(()) => {
            shared.metrics.record_grow();
            log::debug!("[RESIZE] grew pool by {} slabs", count);

            let mut st = shared.state.lock();
            // Keep growing until the pool clears the low-water mark or hits
            // the ceiling; a single alloc signal must be enough to finish the
            // warmup.
            if st.nr_free <= config.min_free
                && st.nr_free + st.nr_assigned < config.max_pool_size
            {
                st.resize_req = true;
            }
        }
        Err(e) => {
            log::error!("[RESIZE] slab allocation of {} buffers failed: {}", count, e);
            let mut st = shared.state.lock();
            st.nr_free -= count;
            st.capacity -= count;
        }
    }
}

/// Evict up to `swapout_batch` MRU-tail buffers to the swap file.
fn evict_batch(shared: &SchedShared) {
    log::debug!(
        "[RESIZE] pool ceiling reached, evicting up to {} buffers",
        shared.config.swapout_batch
    );

    for _ in 0..shared.config.swapout_batch {
        let victim = { shared.state.lock().mru.take_coldest() };
        let Some(victim) = victim else {
            log::warn!("[RESIZE] no eviction candidates; pool stays saturated");
            break;
        };

        match shared.swapper.swapout(&victim) {
            Ok(()) => {}
            Err(Error::NotResident(_)) => {
                // Lost a race with free(); the slab was already reclaimed.
                continue;
            }
            Err(e) => {
                log::warn!("[RESIZE] swapout of {:?} failed: {}", victim.handle(), e);
                shared.state.lock().mru.touch(&victim);
                break;
            }
        }

        let Some(storage) = shared.allocator.detach(&victim) else {
            continue;
        };
        {
            let mut st = shared.state.lock();
            st.nr_free += 1;
            st.nr_assigned -= 1;
        }
        shared.allocator.push_free(storage);
        shared.metrics.record_swapout();
        shared.metrics.record_eviction();
    }
}

/// Release `count` slabs from the free list and settle the counters with the
/// number actually freed (concurrent allocs may have drained the list).
fn shrink_pool(shared: &SchedShared, count: usize) {
    let freed = shared.allocator.shrink(count);

    {
        let mut st = shared.state.lock();
        st.nr_free -= freed;
        st.capacity -= freed;
    }

    if freed > 0 {
        shared.metrics.record_shrink();
    }
    log::debug!("[RESIZE] released {} of {} requested slabs", freed, count);
}
