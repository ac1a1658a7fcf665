// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # bufsched - Swap-backed buffer scheduler
//!
//! A memory manager for fixed-size data buffers, built for buffering services
//! that cache large contiguous payloads (I/O blocks, message bodies). It
//! reconciles three competing pressures:
//!
//! - keep a pool of ready-to-use buffers so client `alloc` is fast,
//! - cap resident memory at an operator-chosen ceiling,
//! - when the ceiling is reached, evict cold buffers to a backing store
//!   instead of failing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bufsched::{BufferHandle, BufferScheduler, SchedConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let sched = BufferScheduler::new(SchedConfig::new(4096, 1000))?;
//!
//!     // Assign a buffer to a handle chosen by the service.
//!     let buf = sched.alloc(BufferHandle(1))?;
//!     buf.write_bytes(0, b"block payload")?;
//!
//!     // Tell the scheduler the contents changed; recently updated buffers
//!     // are evicted last.
//!     sched.mark_updated(&buf);
//!
//!     // ... later, if the buffer was evicted under memory pressure:
//!     if !buf.is_resident() {
//!         sched.swapin(&buf)?;
//!     }
//!
//!     sched.free(&buf)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                      Buffering Service                        |
//! |        alloc / free / mark_updated / swapin by handle         |
//! +---------------------------------------------------------------+
//! |                        Scheduler                              |
//! |   counters + watermarks | MRU index | resize controller       |
//! +-------------------------------+-------------------------------+
//! |          Allocator            |           Swapper             |
//! |  free list (LIFO) + slabs     |   slot file on stable storage |
//! +-------------------------------+-------------------------------+
//! ```
//!
//! The scheduler hands out slabs from the allocator's free list and signals a
//! background **resize controller** when the pool crosses its watermarks: the
//! controller grows the slab pool while there is headroom, halves the free
//! surplus above the high-water mark, and once the hard ceiling is reached
//! evicts the least-recently-updated buffers to the swap file. `swapin`
//! restores an evicted payload, stealing the coldest buffer's slab when
//! memory is full.
//!
//! Client calls never wait on the controller and never perform I/O, with one
//! exception: `swapin` (and `alloc` under extreme pressure) blocks on the
//! swap file.
//!
//! ## Modules Overview
//!
//! - [`sched`](BufferScheduler) - the public scheduler API (start here)
//! - [`SchedConfig`] - pool sizing and watermarks
//! - [`Buffer`] / [`BufferHandle`] - the shared buffer objects
//! - [`MetricsSnapshot`] - operation counters

/// Free-list allocator for fixed-size slabs.
mod allocator;
/// Buffer objects and handles.
mod buffer;
/// Pool sizing and watermark configuration.
mod config;
/// Error types.
mod error;
/// Operation counters.
mod metrics;
/// Scheduler orchestration and the resize controller.
mod sched;
/// Swap subsystem (slot file).
mod swap;

pub use buffer::{Buffer, BufferHandle, BufferState};
pub use config::{
    SchedConfig, DEFAULT_INITIAL_CAPACITY, DEFAULT_MIN_FREE, DEFAULT_SWAPOUT_BATCH,
};
pub use error::{Error, Result};
pub use metrics::MetricsSnapshot;
pub use sched::{BufferScheduler, PoolCounters};
