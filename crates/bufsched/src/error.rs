// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the buffer scheduler.
//!
//! One flat enum covers every failure surface of the crate: configuration,
//! allocator, buffer payload access, and the swapper. Lock primitives
//! (`parking_lot`) cannot fail, so the lock-error class of the original
//! design has no runtime representation here.

use crate::buffer::BufferHandle;

/// Errors returned by buffer scheduler operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Scheduler configuration failed validation (reason in message).
    InvalidConfig(String),

    // ========================================================================
    // Allocator Errors
    // ========================================================================
    /// Host allocation of a slab batch failed (count of requested slabs).
    AllocFailed(usize),
    /// The free list is empty and no eviction candidate was available.
    FreeListExhausted,
    /// The handle is not currently assigned.
    NotFound(BufferHandle),
    /// The handle is already assigned to a live buffer.
    AlreadyAssigned(BufferHandle),

    // ========================================================================
    // Buffer Payload Errors
    // ========================================================================
    /// The buffer's payload storage is detached (buffer is Evicted or Free).
    NotResident(BufferHandle),
    /// Payload access outside the fixed buffer size.
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    /// Operation applied to a buffer in an incompatible state.
    InvalidState(String),

    // ========================================================================
    // Swapper Errors
    // ========================================================================
    /// The handle has no backing-store slot (it was never evicted).
    SwapSlotMissing(BufferHandle),
    /// Reading or writing slot payload failed.
    SwapIo(std::io::Error),
    /// Opening, sizing, or seeking the slot file failed.
    SwapSyscall(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Configuration
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            // Allocator
            Error::AllocFailed(count) => {
                write!(f, "Slab allocation failed ({} buffers requested)", count)
            }
            Error::FreeListExhausted => write!(f, "No free buffers available"),
            Error::NotFound(handle) => write!(f, "Buffer {:?} not assigned", handle),
            Error::AlreadyAssigned(handle) => {
                write!(f, "Buffer {:?} already assigned", handle)
            }
            // Payload
            Error::NotResident(handle) => {
                write!(f, "Buffer {:?} payload not resident", handle)
            }
            Error::OutOfBounds {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "Payload access out of bounds: offset {} + len {} > capacity {}",
                offset, len, capacity
            ),
            Error::InvalidState(msg) => write!(f, "Invalid buffer state: {}", msg),
            // Swapper
            Error::SwapSlotMissing(handle) => {
                write!(f, "No swap slot for buffer {:?}", handle)
            }
            Error::SwapIo(e) => write!(f, "Swap I/O failed: {}", e),
            Error::SwapSyscall(e) => write!(f, "Swap file operation failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::SwapIo(e) | Error::SwapSyscall(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenient alias for API results using the crate's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;
