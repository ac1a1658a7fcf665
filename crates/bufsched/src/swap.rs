// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Swap subsystem: migrates buffer payloads between RAM and a slot file.
//!
//! Every handle that has ever been evicted owns one slot (`buffer_size`
//! bytes) in the backing file for the swapper's lifetime; re-evictions reuse
//! the slot. The file is scratch storage, unlinked on drop; nothing survives
//! the process on purpose.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::buffer::{Buffer, BufferHandle, BufferState};
use crate::error::{Error, Result};

/// Distinguishes swap files of multiple schedulers within one process.
static SWAP_FILE_SEQ: AtomicU64 = AtomicU64::new(0);

pub(crate) struct Swapper {
    buffer_size: usize,
    file: Mutex<File>,
    path: PathBuf,
    /// Slot index per handle; stable for the swapper's lifetime.
    slots: DashMap<BufferHandle, u64>,
    next_slot: AtomicU64,
}

impl Swapper {
    /// Create the slot file. `path = None` picks a per-process scratch file
    /// under the system temp directory.
    pub(crate) fn new(buffer_size: usize, path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(|| {
            let seq = SWAP_FILE_SEQ.fetch_add(1, Ordering::Relaxed);
            std::env::temp_dir().join(format!(
                "bufsched-{}-{}.swap",
                std::process::id(),
                seq
            ))
        });

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(Error::SwapSyscall)?;

        log::debug!("[SWAP] slot file at {}", path.display());

        Ok(Self {
            buffer_size,
            file: Mutex::new(file),
            path,
            slots: DashMap::new(),
            next_slot: AtomicU64::new(0),
        })
    }

    /// Write `buf`'s payload to its slot and mark the buffer Evicted.
    ///
    /// The storage stays attached; the caller dissociates it through the
    /// allocator (`detach_to_free` or `transfer`). The buffer's inner lock is
    /// held across the write so the payload cannot mutate mid-flight.
    pub(crate) fn swapout(&self, buf: &Buffer) -> Result<()> {
        let handle = buf.handle();
        let slot = *self
            .slots
            .entry(handle)
            .or_insert_with(|| self.next_slot.fetch_add(1, Ordering::Relaxed));

        let mut inner = buf.inner();
        let data = inner.data.as_ref().ok_or(Error::NotResident(handle))?;

        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(slot * self.buffer_size as u64))
                .map_err(Error::SwapSyscall)?;
            file.write_all(data).map_err(Error::SwapIo)?;
        }

        inner.state = BufferState::Evicted;
        log::debug!("[SWAP] evicted {:?} to slot {}", handle, slot);
        Ok(())
    }

    /// Read the payload for `buf`'s handle back into its freshly attached
    /// storage and mark the buffer Assigned.
    pub(crate) fn swapin(&self, buf: &Buffer) -> Result<()> {
        let handle = buf.handle();
        let slot = *self
            .slots
            .get(&handle)
            .ok_or(Error::SwapSlotMissing(handle))?;

        let mut inner = buf.inner();
        let data = inner.data.as_mut().ok_or(Error::NotResident(handle))?;

        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(slot * self.buffer_size as u64))
                .map_err(Error::SwapSyscall)?;
            file.read_exact(data).map_err(Error::SwapIo)?;
        }

        inner.state = BufferState::Assigned;
        log::debug!("[SWAP] restored {:?} from slot {}", handle, slot);
        Ok(())
    }

    /// True when the handle has a backing slot (was evicted at least once).
    pub(crate) fn has_slot(&self, handle: BufferHandle) -> bool {
        self.slots.contains_key(&handle)
    }
}

impl Drop for Swapper {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!(
                "[SWAP] failed to unlink slot file {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
