// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Arrmeta: out-of-band per-instance layout bytes.
//!
//! The layout of an arrmeta block is determined entirely by its type
//! (see each variant's `arrmeta_*` methods). This module provides the
//! field accessors the variants share and [`Arrmeta`], an owning buffer
//! that runs the type's lifecycle (construct on creation, destruct on
//! drop).

use std::fmt;

use crate::config::runtime_config;
use crate::error::{Error, Result};
use crate::memblock::{global_arena, BlockRef};
use crate::types::Type;

const ISIZE: usize = std::mem::size_of::<isize>();

#[inline]
pub(crate) fn read_isize(arrmeta: &[u8], at: usize) -> isize {
    let mut bytes = [0u8; ISIZE];
    bytes.copy_from_slice(&arrmeta[at..at + ISIZE]);
    isize::from_ne_bytes(bytes)
}

#[inline]
pub(crate) fn write_isize(arrmeta: &mut [u8], at: usize, value: isize) {
    arrmeta[at..at + ISIZE].copy_from_slice(&value.to_ne_bytes());
}

#[inline]
pub(crate) fn read_blockref(arrmeta: &[u8], at: usize) -> BlockRef {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&arrmeta[at..at + 8]);
    BlockRef::from_bits(u64::from_ne_bytes(bytes))
}

#[inline]
pub(crate) fn write_blockref(arrmeta: &mut [u8], at: usize, r: BlockRef) {
    arrmeta[at..at + 8].copy_from_slice(&r.to_bits().to_ne_bytes());
}

/// Verify that an arrmeta slice is large enough for `tp`.
pub(crate) fn check_len(tp: &Type, arrmeta: &[u8]) -> Result<()> {
    if arrmeta.len() < tp.arrmeta_size() {
        return Err(Error::InvalidArrmeta(format!(
            "type {} needs {} arrmeta bytes, got {}",
            tp,
            tp.arrmeta_size(),
            arrmeta.len()
        )));
    }
    Ok(())
}

// ============================================================================
// Blockref field lifecycle, shared by strings and var dims
// ============================================================================

pub(crate) fn construct_blockref(arrmeta: &mut [u8], at: usize, blockref_alloc: bool) {
    let r = if blockref_alloc {
        global_arena().allocate_pod(runtime_config().eval_context().pod_chunk_size)
    } else {
        BlockRef::NULL
    };
    write_blockref(arrmeta, at, r);
}

pub(crate) fn copy_blockref(
    dst: &mut [u8],
    src: &[u8],
    at: usize,
    embedded: Option<BlockRef>,
) -> Result<()> {
    let src_ref = read_blockref(src, at);
    let r = if src_ref.is_null() {
        embedded.unwrap_or(BlockRef::NULL)
    } else {
        src_ref
    };
    if !r.is_null() {
        global_arena().retain(r)?;
    }
    write_blockref(dst, at, r);
    Ok(())
}

pub(crate) fn reset_blockref(arrmeta: &[u8], at: usize) -> Result<()> {
    let r = read_blockref(arrmeta, at);
    if r.is_null() {
        return Ok(());
    }
    global_arena().reset(r)
}

pub(crate) fn finalize_blockref(arrmeta: &[u8], at: usize) -> Result<()> {
    let r = read_blockref(arrmeta, at);
    if r.is_null() {
        return Ok(());
    }
    global_arena().finalize(r)
}

pub(crate) fn destruct_blockref(arrmeta: &mut [u8], at: usize) {
    let r = read_blockref(arrmeta, at);
    if r.is_null() {
        return;
    }
    if let Err(e) = global_arena().release(r) {
        log::warn!("[arrmeta] release during destruct failed: {}", e);
    }
    write_blockref(arrmeta, at, BlockRef::NULL);
}

pub(crate) fn blockref_is_unique(arrmeta: &[u8], at: usize) -> bool {
    let r = read_blockref(arrmeta, at);
    r.is_null() || global_arena().use_count(r).map_or(false, |n| n == 1)
}

pub(crate) fn debug_print_blockref(
    arrmeta: &[u8],
    at: usize,
    out: &mut dyn fmt::Write,
    indent: &str,
) -> fmt::Result {
    let r = read_blockref(arrmeta, at);
    if r.is_null() {
        return writeln!(out, "{}blockref: null", indent);
    }
    match global_arena().use_count(r) {
        Ok(n) => writeln!(out, "{}blockref: {} (use count {})", indent, r, n),
        Err(_) => writeln!(out, "{}blockref: {} (stale)", indent, r),
    }
}

// ============================================================================
// Owning arrmeta buffer
// ============================================================================

/// Arrmeta bytes together with the type that owns their layout.
///
/// Construction runs the type's default or copy constructor; dropping the
/// value runs its destructor, releasing any memory block references.
pub struct Arrmeta {
    tp: Type,
    bytes: Vec<u8>,
}

impl Arrmeta {
    /// Default-construct arrmeta for `tp`.
    ///
    /// `shape` supplies sizes for dimensions whose size is not part of the
    /// type (`strided`). With `blockref_alloc`, strings and var dims get
    /// a fresh pod memory block.
    pub fn default_construct(tp: &Type, shape: &[isize], blockref_alloc: bool) -> Result<Self> {
        let mut bytes = vec![0u8; tp.arrmeta_size()];
        tp.arrmeta_default_construct(&mut bytes, shape, blockref_alloc)?;
        Ok(Self {
            tp: tp.clone(),
            bytes,
        })
    }

    /// Copy-construct from existing arrmeta of the same type.
    ///
    /// Memory block references are shared, not duplicated. `embedded`
    /// is used wherever the source holds a null reference.
    pub fn copy_construct(tp: &Type, src: &[u8], embedded: Option<BlockRef>) -> Result<Self> {
        check_len(tp, src)?;
        let mut bytes = vec![0u8; tp.arrmeta_size()];
        tp.arrmeta_copy_construct(&mut bytes, src, embedded)?;
        Ok(Self {
            tp: tp.clone(),
            bytes,
        })
    }

    #[must_use]
    pub fn type_(&self) -> &Type {
        &self.tp
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Drop all allocations held by the memory blocks this arrmeta references.
    pub fn reset_buffers(&mut self) -> Result<()> {
        self.tp.arrmeta_reset_buffers(&mut self.bytes)
    }

    /// Freeze the memory blocks this arrmeta references.
    pub fn finalize_buffers(&mut self) -> Result<()> {
        self.tp.arrmeta_finalize_buffers(&mut self.bytes)
    }

    /// Whether no other arrmeta shares the referenced memory blocks.
    pub fn is_unique_data_owner(&self) -> bool {
        self.tp.is_unique_data_owner(&self.bytes)
    }

    /// Copy sharing every memory block this arrmeta references.
    ///
    /// Fails with [`Error::StaleBlockRef`] if a referenced block was
    /// already freed.
    pub fn try_clone(&self) -> Result<Self> {
        Self::copy_construct(&self.tp, &self.bytes, None)
    }

    /// Human-readable dump of the arrmeta fields.
    pub fn debug_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.tp.arrmeta_debug_print(&self.bytes, &mut out, "");
        out
    }
}

impl fmt::Debug for Arrmeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arrmeta")
            .field("type", &self.tp.to_string())
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Drop for Arrmeta {
    fn drop(&mut self) {
        self.tp.arrmeta_destruct(&mut self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isize_field_round_trip() {
        let mut buf = [0u8; 16];
        write_isize(&mut buf, 8, -42);
        assert_eq!(read_isize(&buf, 8), -42);
        assert_eq!(read_isize(&buf, 0), 0);
    }

    #[test]
    fn test_blockref_field_lifecycle() {
        let mut a = [0u8; 8];
        construct_blockref(&mut a, 0, true);
        let r = read_blockref(&a, 0);
        assert!(!r.is_null());
        assert!(blockref_is_unique(&a, 0));

        let mut b = [0u8; 8];
        copy_blockref(&mut b, &a, 0, None).expect("copy");
        assert_eq!(read_blockref(&b, 0), r);
        assert_eq!(global_arena().use_count(r).expect("live"), 2);
        assert!(!blockref_is_unique(&a, 0));

        destruct_blockref(&mut b, 0);
        assert!(read_blockref(&b, 0).is_null());
        destruct_blockref(&mut b, 0);
        assert_eq!(global_arena().use_count(r).expect("live"), 1);

        destruct_blockref(&mut a, 0);
        assert!(global_arena().use_count(r).is_err());
    }

    #[test]
    fn test_try_clone_reports_stale_block() {
        let tp = Type::string(crate::string_encodings::StringEncoding::Utf8);
        let am = Arrmeta::default_construct(&tp, &[], true).expect("arrmeta");
        let copy = am.try_clone().expect("clone");
        assert_eq!(copy.as_bytes(), am.as_bytes());
        drop(copy);

        let block = read_blockref(am.as_bytes(), 0);
        global_arena().release(block).expect("release");
        assert!(matches!(am.try_clone(), Err(Error::StaleBlockRef(_))));
    }

    #[test]
    fn test_copy_uses_embedded_when_null() {
        let embedded = global_arena().allocate_pod(32);
        let src = [0u8; 8];
        let mut dst = [0u8; 8];
        copy_blockref(&mut dst, &src, 0, Some(embedded)).expect("copy");
        assert_eq!(read_blockref(&dst, 0), embedded);
        assert_eq!(global_arena().use_count(embedded).expect("live"), 2);

        destruct_blockref(&mut dst, 0);
        global_arena().release(embedded).expect("release");
    }
}
