// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference-counted memory blocks.
//!
//! Array data and the variable-size payloads of strings and var dimensions
//! live in memory blocks owned by a [`MemoryBlockArena`]. Arrmeta refers to
//! a block through a [`BlockRef`] handle.
//!
//! # Handle encoding
//!
//! `BlockRef` packs the slot index into the lower 32 bits and the slot
//! generation into the upper 32 bits. Generations start at 1, so the all
//! zero value is the null reference. When the last reference is released
//! the slot generation is bumped, which turns every outstanding copy of
//! the handle into a detectable [`Error::StaleBlockRef`].
//!
//! # Block kinds
//!
//! - **Fixed**: one aligned allocation, sized at creation.
//! - **Pod**: chunked bump allocator. Allocations never move; `reset`
//!   drops them all, `finalize` forbids further allocation.

use parking_lot::Mutex;
use std::fmt;
use std::sync::OnceLock;

use crate::config::{MAX_DATA_ALIGNMENT, POD_BLOCK_MAX_CHUNK};
use crate::error::{Error, Result};

/// Handle to a memory block owned by an arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockRef(u64);

impl BlockRef {
    /// The null reference.
    pub const NULL: BlockRef = BlockRef(0);

    fn new(index: u32, generation: u32) -> Self {
        Self((u64::from(generation) << 32) | u64::from(index))
    }

    fn index(self) -> usize {
        (self.0 & 0xFFFF_FFFF) as usize
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw encoding, as stored in arrmeta.
    #[inline]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "BlockRef(null)")
        } else {
            write!(f, "BlockRef({}@{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Storage strategy of a memory block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Fixed,
    Pod,
}

struct Chunk {
    storage: Box<[u8]>,
    used: usize,
}

impl Chunk {
    fn new(size: usize) -> Self {
        Self {
            storage: vec![0u8; size].into_boxed_slice(),
            used: 0,
        }
    }

    /// Bump-allocate `size` bytes aligned to `align` (a power of two).
    fn try_allocate(&mut self, size: usize, align: usize) -> Option<*mut u8> {
        let base = self.storage.as_mut_ptr() as usize;
        let start = (base + self.used + align - 1) & !(align - 1);
        let end = start - base + size;
        if end > self.storage.len() {
            return None;
        }
        self.used = end;
        // SAFETY: start - base + size <= storage.len(), so the offset stays
        // inside the boxed allocation.
        Some(unsafe { self.storage.as_mut_ptr().add(start - base) })
    }
}

struct PodStorage {
    chunks: Vec<Chunk>,
    initial_chunk: usize,
    finalized: bool,
}

impl PodStorage {
    fn allocate(&mut self, size: usize, align: usize) -> *mut u8 {
        if let Some(ptr) = self
            .chunks
            .last_mut()
            .and_then(|chunk| chunk.try_allocate(size, align))
        {
            return ptr;
        }
        let grown = self
            .chunks
            .last()
            .map_or(self.initial_chunk, |c| (c.storage.len() * 2).min(POD_BLOCK_MAX_CHUNK));
        let mut chunk = Chunk::new(grown.max(size + align));
        let ptr = chunk.try_allocate(size, align);
        self.chunks.push(chunk);
        // A fresh chunk of at least size + align bytes always fits.
        ptr.unwrap_or(std::ptr::null_mut())
    }

    fn allocated_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.used).sum()
    }
}

enum Storage {
    Fixed { buf: Box<[u8]>, offset: usize },
    Pod(PodStorage),
}

struct Block {
    refcount: usize,
    storage: Storage,
}

struct Slot {
    generation: u32,
    block: Option<Block>,
}

#[derive(Default)]
struct Slots {
    entries: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Slots {
    fn insert(&mut self, block: Block) -> BlockRef {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.entries[index as usize];
            slot.block = Some(block);
            return BlockRef::new(index, slot.generation);
        }
        let index = self.entries.len() as u32;
        self.entries.push(Slot {
            generation: 1,
            block: Some(block),
        });
        BlockRef::new(index, 1)
    }

    fn get_mut(&mut self, r: BlockRef) -> Result<&mut Block> {
        match self.entries.get_mut(r.index()) {
            Some(slot) if slot.generation == r.generation() => {
                slot.block.as_mut().ok_or(Error::StaleBlockRef(r))
            }
            _ => Err(Error::StaleBlockRef(r)),
        }
    }

    fn remove(&mut self, r: BlockRef) {
        if let Some(slot) = self.entries.get_mut(r.index()) {
            slot.block = None;
            slot.generation = slot.generation.wrapping_add(1).max(1);
            self.free.push(r.index() as u32);
            self.live -= 1;
        }
    }
}

/// Owner of all memory blocks of one process (or one test).
///
/// Refcount updates happen under a single `parking_lot::Mutex`, so blocks
/// may be retained and released from any thread. Data pointers handed
/// out by the arena stay valid until the block is freed or reset.
pub struct MemoryBlockArena {
    slots: Mutex<Slots>,
}

impl MemoryBlockArena {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Allocate a fixed block of `size` bytes aligned to `align`.
    ///
    /// Returns the handle (refcount 1) and a pointer to the zeroed data.
    pub fn allocate_fixed(&self, size: usize, align: usize) -> Result<(BlockRef, *mut u8)> {
        let align = checked_alignment(align)?;
        let mut buf = vec![0u8; size + align].into_boxed_slice();
        let base = buf.as_mut_ptr() as usize;
        let offset = ((base + align - 1) & !(align - 1)) - base;
        // SAFETY: offset < align and the buffer holds size + align bytes.
        let data = unsafe { buf.as_mut_ptr().add(offset) };

        let r = self.slots.lock().insert(Block {
            refcount: 1,
            storage: Storage::Fixed { buf, offset },
        });
        log::trace!("[memblock] fixed block {} ({} bytes, align {})", r, size, align);
        Ok((r, data))
    }

    /// Create an empty pod block whose first chunk holds `initial_chunk` bytes.
    pub fn allocate_pod(&self, initial_chunk: usize) -> BlockRef {
        let r = self.slots.lock().insert(Block {
            refcount: 1,
            storage: Storage::Pod(PodStorage {
                chunks: Vec::new(),
                initial_chunk: initial_chunk.clamp(1, POD_BLOCK_MAX_CHUNK),
                finalized: false,
            }),
        });
        log::trace!("[memblock] pod block {}", r);
        r
    }

    /// Add one reference.
    pub fn retain(&self, r: BlockRef) -> Result<()> {
        let mut slots = self.slots.lock();
        slots.get_mut(r)?.refcount += 1;
        Ok(())
    }

    /// Drop one reference, freeing the block when it was the last one.
    pub fn release(&self, r: BlockRef) -> Result<()> {
        let mut slots = self.slots.lock();
        let block = slots.get_mut(r)?;
        block.refcount -= 1;
        if block.refcount == 0 {
            slots.remove(r);
            log::trace!("[memblock] freed block {}", r);
        }
        Ok(())
    }

    /// Number of live references to the block.
    pub fn use_count(&self, r: BlockRef) -> Result<usize> {
        let mut slots = self.slots.lock();
        Ok(slots.get_mut(r)?.refcount)
    }

    pub fn kind(&self, r: BlockRef) -> Result<BlockKind> {
        let mut slots = self.slots.lock();
        Ok(match slots.get_mut(r)?.storage {
            Storage::Fixed { .. } => BlockKind::Fixed,
            Storage::Pod(_) => BlockKind::Pod,
        })
    }

    /// Data pointer of a fixed block.
    pub fn fixed_data(&self, r: BlockRef) -> Result<*mut u8> {
        let mut slots = self.slots.lock();
        match &mut slots.get_mut(r)?.storage {
            Storage::Fixed { buf, offset } => {
                let offset = *offset;
                // SAFETY: offset was computed inside the buffer at allocation.
                Ok(unsafe { buf.as_mut_ptr().add(offset) })
            }
            Storage::Pod(_) => Err(Error::InvalidArgument(format!(
                "memory block {} is a pod block, not a fixed block",
                r
            ))),
        }
    }

    /// Bump-allocate `size` bytes from a pod block.
    ///
    /// The returned memory is zeroed on first use of a chunk and stays at
    /// the same address until the block is reset or freed.
    pub fn pod_allocate(&self, r: BlockRef, size: usize, align: usize) -> Result<*mut u8> {
        let align = checked_alignment(align)?;
        let mut slots = self.slots.lock();
        match &mut slots.get_mut(r)?.storage {
            Storage::Pod(pod) if pod.finalized => Err(Error::BlockFinalized(r)),
            Storage::Pod(pod) => Ok(pod.allocate(size, align)),
            Storage::Fixed { .. } => Err(Error::InvalidArgument(format!(
                "memory block {} is a fixed block, not a pod block",
                r
            ))),
        }
    }

    /// Bytes handed out by a pod block so far (including padding).
    pub fn pod_allocated_bytes(&self, r: BlockRef) -> Result<usize> {
        let mut slots = self.slots.lock();
        match &slots.get_mut(r)?.storage {
            Storage::Pod(pod) => Ok(pod.allocated_bytes()),
            Storage::Fixed { .. } => Ok(0),
        }
    }

    /// Drop every allocation of a pod block and allow allocation again.
    ///
    /// No-op on fixed blocks.
    pub fn reset(&self, r: BlockRef) -> Result<()> {
        let mut slots = self.slots.lock();
        if let Storage::Pod(pod) = &mut slots.get_mut(r)?.storage {
            pod.chunks.clear();
            pod.finalized = false;
        }
        Ok(())
    }

    /// Forbid further allocation from a pod block.
    ///
    /// No-op on fixed blocks.
    pub fn finalize(&self, r: BlockRef) -> Result<()> {
        let mut slots = self.slots.lock();
        if let Storage::Pod(pod) = &mut slots.get_mut(r)?.storage {
            pod.finalized = true;
        }
        Ok(())
    }

    pub fn is_finalized(&self, r: BlockRef) -> Result<bool> {
        let mut slots = self.slots.lock();
        Ok(match &slots.get_mut(r)?.storage {
            Storage::Pod(pod) => pod.finalized,
            Storage::Fixed { .. } => true,
        })
    }

    /// Number of blocks currently alive.
    pub fn live_blocks(&self) -> usize {
        self.slots.lock().live
    }
}

impl Default for MemoryBlockArena {
    fn default() -> Self {
        Self::new()
    }
}

fn checked_alignment(align: usize) -> Result<usize> {
    let align = align.max(1);
    if !align.is_power_of_two() || align > MAX_DATA_ALIGNMENT {
        return Err(Error::InvalidArgument(format!(
            "alignment {} must be a power of two no larger than {}",
            align, MAX_DATA_ALIGNMENT
        )));
    }
    Ok(align)
}

static GLOBAL_ARENA: OnceLock<MemoryBlockArena> = OnceLock::new();

/// The process-wide arena used by arrmeta and kernels.
pub fn global_arena() -> &'static MemoryBlockArena {
    GLOBAL_ARENA.get_or_init(MemoryBlockArena::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_blockref() {
        assert!(BlockRef::NULL.is_null());
        assert_eq!(BlockRef::from_bits(0), BlockRef::NULL);
        assert_eq!(format!("{}", BlockRef::NULL), "BlockRef(null)");
    }

    #[test]
    fn test_retain_release_frees_on_last() {
        let arena = MemoryBlockArena::new();
        let r = arena.allocate_pod(64);
        assert!(!r.is_null());
        assert_eq!(arena.use_count(r).expect("live"), 1);

        arena.retain(r).expect("retain");
        assert_eq!(arena.use_count(r).expect("live"), 2);

        arena.release(r).expect("release");
        assert_eq!(arena.live_blocks(), 1);
        arena.release(r).expect("release");
        assert_eq!(arena.live_blocks(), 0);

        assert_eq!(arena.use_count(r), Err(Error::StaleBlockRef(r)));
        assert_eq!(arena.release(r), Err(Error::StaleBlockRef(r)));
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let arena = MemoryBlockArena::new();
        let first = arena.allocate_pod(16);
        arena.release(first).expect("release");

        let second = arena.allocate_pod(16);
        assert_ne!(first, second);
        assert_eq!(first.index(), second.index());
        assert!(arena.retain(first).is_err());
        assert_eq!(arena.use_count(second).expect("live"), 1);
    }

    #[test]
    fn test_fixed_block_alignment() {
        let arena = MemoryBlockArena::new();
        let (r, ptr) = arena.allocate_fixed(24, 8).expect("allocate");
        assert_eq!(ptr as usize % 8, 0);
        assert_eq!(arena.fixed_data(r).expect("data"), ptr);
        assert_eq!(arena.kind(r).expect("kind"), BlockKind::Fixed);
        assert!(arena.pod_allocate(r, 8, 8).is_err());
        arena.release(r).expect("release");
    }

    #[test]
    fn test_pod_allocations_are_stable() {
        let arena = MemoryBlockArena::new();
        let r = arena.allocate_pod(32);

        let mut ptrs = Vec::new();
        for i in 0..64u8 {
            let p = arena.pod_allocate(r, 7, 1).expect("allocate");
            // SAFETY: p points to 7 writable bytes owned by the block.
            unsafe { std::ptr::write_bytes(p, i, 7) };
            ptrs.push(p);
        }
        for (i, p) in ptrs.iter().enumerate() {
            // SAFETY: allocations stay valid until reset or free.
            let bytes = unsafe { std::slice::from_raw_parts(*p, 7) };
            assert!(bytes.iter().all(|&b| b == i as u8));
        }
        assert!(arena.pod_allocated_bytes(r).expect("bytes") >= 64 * 7);
        arena.release(r).expect("release");
    }

    #[test]
    fn test_pod_alignment_and_large_request() {
        let arena = MemoryBlockArena::new();
        let r = arena.allocate_pod(16);
        arena.pod_allocate(r, 1, 1).expect("allocate");
        let p = arena.pod_allocate(r, 8, 8).expect("allocate");
        assert_eq!(p as usize % 8, 0);
        let big = arena.pod_allocate(r, 10_000, 4).expect("allocate");
        assert_eq!(big as usize % 4, 0);
        arena.release(r).expect("release");
    }

    #[test]
    fn test_finalize_and_reset() {
        let arena = MemoryBlockArena::new();
        let r = arena.allocate_pod(64);
        arena.pod_allocate(r, 8, 8).expect("allocate");
        arena.finalize(r).expect("finalize");
        assert!(arena.is_finalized(r).expect("live"));
        assert_eq!(arena.pod_allocate(r, 8, 8), Err(Error::BlockFinalized(r)));

        arena.reset(r).expect("reset");
        assert_eq!(arena.pod_allocated_bytes(r).expect("bytes"), 0);
        arena.pod_allocate(r, 8, 8).expect("allocate after reset");
        arena.release(r).expect("release");
    }

    #[test]
    fn test_bad_alignment_rejected() {
        let arena = MemoryBlockArena::new();
        assert!(arena.allocate_fixed(8, 3).is_err());
        assert!(arena.allocate_fixed(8, 64).is_err());
    }
}
