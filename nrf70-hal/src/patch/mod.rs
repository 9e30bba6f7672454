//! Chunked firmware patch transfer.
//!
//! A patch image is moved into RPU memory in pieces of at most
//! [`MAX_PATCH_CHUNK_SIZE`] bytes. Each piece is copied into a freshly
//! allocated staging buffer, written with one block write in the target
//! processor's context, and the buffer is released before the next piece.
//!
//! The image is split with [`slice::chunks`]: every chunk but the last is
//! full, the last one holds the rest. A size that is an exact multiple of the
//! chunk size therefore ends with a full chunk, never an empty one.
//!
//! Nothing is rolled back: when a chunk fails, the chunks before it stay in
//! RPU memory.

use alloc::vec::Vec;
use core::fmt;

use crate::bus::Bus;
use crate::error::Error;
use crate::hal::Hal;
use crate::memory_map::AddressMap;
use crate::power::PowerPolicy;
use crate::processor::Processor;

//=============================================================================
// Constants
//=============================================================================

/// Largest block written to the RPU in one transfer (bytes).
pub const MAX_PATCH_CHUNK_SIZE: usize = 8192;

/// Number of chunks an image of `size` bytes is split into.
#[inline]
pub const fn chunk_count(size: usize) -> usize {
    size.div_ceil(MAX_PATCH_CHUNK_SIZE)
}

//=============================================================================
// Patch kinds
//=============================================================================

/// The two images every processor needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PatchKind {
    /// Resident base image ("bimg").
    Primary,
    /// Secondary/delta image ("bin").
    Secondary,
}

impl PatchKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            PatchKind::Primary => "bimg",
            PatchKind::Secondary => "bin",
        }
    }
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=============================================================================
// Staging buffers
//=============================================================================

/// Source of staging buffers for chunk transfers.
pub trait StagingAllocator {
    /// Empty buffer with room for at least `len` bytes, `None` if out of memory.
    fn allocate(&mut self, len: usize) -> Option<Vec<u8>>;
}

/// Global allocator, reporting failure instead of aborting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Heap;

impl StagingAllocator for Heap {
    fn allocate(&mut self, len: usize) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).ok()?;
        Some(buf)
    }
}

impl<A: StagingAllocator + ?Sized> StagingAllocator for &mut A {
    fn allocate(&mut self, len: usize) -> Option<Vec<u8>> {
        A::allocate(self, len)
    }
}

//=============================================================================
// Transfer
//=============================================================================

impl<B: Bus, M: AddressMap, P: PowerPolicy<B>> Hal<B, M, P> {
    /// Write one chunk to `dest` in `processor`'s context.
    ///
    /// Any failure is reported as [`Error::WriteFailure`] at `dest`. The
    /// context is back on [`Processor::DEFAULT`] when this returns.
    pub fn transfer_chunk(&mut self, processor: Processor, dest: u32, chunk: &[u8]) -> Result<(), Error> {
        let mut hal = self.target(processor);
        hal.mem_write(dest, chunk).map_err(|e| {
            error!("{} chunk write to 0x{:08X} failed: {:?}", processor, dest, e);
            Error::WriteFailure { addr: dest }
        })
    }

    /// Load one patch image to `dest`, staging chunks on the heap.
    pub fn load_patch(&mut self, processor: Processor, kind: PatchKind, dest: u32, data: &[u8]) -> Result<(), Error> {
        self.load_patch_with(&mut Heap, processor, kind, dest, data)
    }

    /// Load one patch image to `dest`, staging chunks with `alloc`.
    ///
    /// Stops at the first chunk that cannot be allocated or written.
    pub fn load_patch_with<A: StagingAllocator>(
        &mut self,
        mut alloc: A,
        processor: Processor,
        kind: PatchKind,
        dest: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        let count = chunk_count(data.len());
        debug!(
            "{} {} patch: {} bytes in {} chunks to 0x{:08X}",
            processor,
            kind,
            data.len(),
            count,
            dest
        );

        for (i, chunk) in data.chunks(MAX_PATCH_CHUNK_SIZE).enumerate() {
            let Some(addr) = u32::try_from(i * MAX_PATCH_CHUNK_SIZE)
                .ok()
                .and_then(|offset| dest.checked_add(offset))
            else {
                error!(
                    "{} {} chunk {}/{}: runs past the RPU address space from 0x{:08X}",
                    processor,
                    kind,
                    i + 1,
                    count,
                    dest
                );
                return Err(Error::WriteFailure { addr: dest });
            };

            let Some(mut staging) = alloc.allocate(chunk.len()) else {
                error!(
                    "{} {} chunk {}/{}: no memory for {} bytes",
                    processor,
                    kind,
                    i + 1,
                    count,
                    chunk.len()
                );
                return Err(Error::AllocationFailure {
                    size_bytes: chunk.len(),
                });
            };
            staging.extend_from_slice(chunk);

            debug!("{} {} chunk {}/{}, size {}", processor, kind, i + 1, count, chunk.len());
            self.transfer_chunk(processor, addr, &staging)?;
        }

        Ok(())
    }
}
