// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Kernel builder: append-only storage for the units of one operation.
//!
//! Units are addressed by offset. A composite unit at offset `k` finds its
//! first child at `k + 1`; further children record their offsets inside
//! the parent. Units are dropped in reverse order of construction.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::kernels::unit::{DimAssign, DimSource, DimTarget, KernelUnit};
use crate::kernels::{apply_single_index, format_shape, KernelRequest};
use crate::memblock::global_arena;

/// Maximum number of source operands a unit accepts.
const MAX_SRC: usize = 2;

pub(crate) struct KernelNode {
    request: KernelRequest,
    unit: KernelUnit,
}

/// Buffer of kernel units for one resolved operation.
#[derive(Default)]
pub struct KernelBuilder {
    nodes: Vec<KernelNode>,
}

impl std::fmt::Debug for KernelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelBuilder")
            .field("units", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl KernelBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Number of units placed so far; also the next free offset.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Place `unit` at `offset`, returning the next free offset.
    pub(crate) fn push(
        &mut self,
        offset: usize,
        request: KernelRequest,
        unit: KernelUnit,
    ) -> Result<usize> {
        if offset != self.nodes.len() {
            return Err(Error::InvalidArgument(format!(
                "kernel unit placed at offset {} but the builder holds {} units",
                offset,
                self.nodes.len()
            )));
        }
        log::trace!("[kernels] unit {} at {} ({:?})", unit, offset, request);
        self.nodes.push(KernelNode { request, unit });
        Ok(offset + 1)
    }

    pub(crate) fn unit_mut(&mut self, offset: usize) -> Option<&mut KernelUnit> {
        self.nodes.get_mut(offset).map(|n| &mut n.unit)
    }

    /// Drop every unit at `len` and beyond, newest first.
    pub fn truncate(&mut self, len: usize) {
        while self.nodes.len() > len {
            self.nodes.pop();
        }
    }

    /// Drop all units.
    pub fn reset(&mut self) {
        self.truncate(0);
    }

    /// One line per unit, for debugging.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let _ = writeln!(out, "{:3}: {} [{:?}]", i, node.unit, node.request);
        }
        out
    }

    fn node(&self, offset: usize) -> Result<&KernelNode> {
        self.nodes
            .get(offset)
            .ok_or_else(|| Error::InvalidArgument(format!("no kernel unit at offset {}", offset)))
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Run the unit at `offset` on one element.
    ///
    /// Index kernels write the projected element pointer into `dst`.
    ///
    /// # Safety
    ///
    /// `dst` and `src` must point to valid elements of the types (and
    /// arrmeta) the unit was resolved for.
    pub unsafe fn single(&mut self, offset: usize, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        match &self.node(offset)?.unit {
            KernelUnit::Dim(d) => {
                let d = *d;
                self.dim_single(offset, d, dst, src[0])
            }
            KernelUnit::DimIndex { index, stride } => {
                let p = src[0].offset(index * stride);
                self.single(offset + 1, dst, &[p])
            }
            KernelUnit::VarIndex { index, stride, offset: var_offset } => {
                let (index, stride, var_offset) = (*index, *stride, *var_offset);
                let (begin, size) = read_var(src[0]);
                let i = apply_single_index(index, size)?;
                let p = begin.cast_const().offset(var_offset + i * stride);
                self.single(offset + 1, dst, &[p])
            }
            KernelUnit::Chain(_) => self.chain_single(offset, dst, src),
            KernelUnit::Fieldwise(steps) => {
                let steps = steps.clone();
                for step in steps.iter() {
                    self.single(step.child, dst.add(step.dst_offset), &[src[0].add(step.src_offset)])?;
                }
                Ok(())
            }
            leaf => leaf.exec_leaf(dst, src),
        }
    }

    /// Run the unit at `offset` on `count` elements at the given strides.
    ///
    /// # Safety
    ///
    /// Every `dst + k * dst_stride` and `src[j] + k * src_stride[j]` for
    /// `k < count` must point to valid elements.
    pub unsafe fn strided(
        &mut self,
        offset: usize,
        dst: *mut u8,
        dst_stride: isize,
        src: &[*const u8],
        src_stride: &[isize],
        count: usize,
    ) -> Result<()> {
        let nsrc = src.len().min(MAX_SRC);
        if let KernelUnit::Copy { size } = self.node(offset)?.unit {
            if nsrc == 1 && dst_stride == size as isize && src_stride[0] == size as isize {
                std::ptr::copy_nonoverlapping(src[0], dst, size * count);
                return Ok(());
            }
        }
        let mut cur = [std::ptr::null::<u8>(); MAX_SRC];
        cur[..nsrc].copy_from_slice(&src[..nsrc]);
        let mut d = dst;
        for _ in 0..count {
            self.single(offset, d, &cur[..nsrc])?;
            d = d.offset(dst_stride);
            for j in 0..nsrc {
                cur[j] = cur[j].offset(src_stride[j]);
            }
        }
        Ok(())
    }

    /// Evaluate a comparison kernel on one pair of elements.
    ///
    /// # Safety
    ///
    /// `src0` and `src1` must point to valid elements of the compared types.
    pub unsafe fn compare(
        &mut self,
        offset: usize,
        src0: *const u8,
        src1: *const u8,
    ) -> Result<bool> {
        let mut out = 0u8;
        self.single(offset, &mut out, &[src0, src1])?;
        Ok(out != 0)
    }

    /// Run an index kernel, returning the projected element pointer.
    ///
    /// # Safety
    ///
    /// `data` must point to a valid element of the indexed type.
    pub unsafe fn project(&mut self, offset: usize, data: *const u8) -> Result<*const u8> {
        let mut out: *const u8 = std::ptr::null();
        self.single(offset, (&mut out as *mut *const u8).cast(), &[data])?;
        Ok(out)
    }

    unsafe fn chain_single(
        &mut self,
        offset: usize,
        dst: *mut u8,
        src: &[*const u8],
    ) -> Result<()> {
        let (temp, second) = match self.nodes.get_mut(offset).map(|n| &mut n.unit) {
            Some(KernelUnit::Chain(c)) => (c.temp.data_ptr(), c.second),
            _ => return Err(Error::InvalidArgument(format!("no chain unit at offset {}", offset))),
        };
        let mut result = self.single(offset + 1, temp, src);
        if result.is_ok() {
            result = self.single(second, dst, &[temp.cast_const()]);
        }
        // The temporary is reset after every invocation, failed or not.
        let reset = match self.nodes.get_mut(offset).map(|n| &mut n.unit) {
            Some(KernelUnit::Chain(c)) => c.temp.reset(),
            _ => Ok(()),
        };
        result.and(reset)
    }

    unsafe fn dim_single(
        &mut self,
        offset: usize,
        d: DimAssign,
        dst: *mut u8,
        src: *const u8,
    ) -> Result<()> {
        let (src_ptr, src_size, src_stride) = match d.src {
            DimSource::Broadcast => (src, None, 0),
            DimSource::Strided { size, stride } => (src, Some(size), stride),
            DimSource::Var { stride, offset: var_offset } => {
                let (begin, size) = read_var(src);
                (begin.cast_const().offset(var_offset), Some(size), stride)
            }
        };

        let (dst_ptr, dst_size, dst_stride) = match d.dst {
            DimTarget::Strided { size, stride } => (dst, size, stride),
            DimTarget::Var {
                block,
                stride,
                offset: var_offset,
                align,
            } => {
                let (begin, size) = read_var(dst);
                if begin.is_null() {
                    let n = src_size.unwrap_or(1);
                    let p = if n == 0 {
                        std::ptr::null_mut()
                    } else {
                        if block.is_null() {
                            return Err(Error::InvalidArrmeta(
                                "var dimension destination has no memory block".to_string(),
                            ));
                        }
                        global_arena().pod_allocate(block, (n * stride) as usize, align)?
                    };
                    write_var(dst, p, n);
                    (p, n, stride)
                } else {
                    (begin.offset(var_offset), size, stride)
                }
            }
        };

        let src_stride = match src_size {
            Some(n) if n == dst_size => src_stride,
            None | Some(1) => 0,
            Some(n) => {
                return Err(Error::Broadcast {
                    dst_shape: format_shape(&[dst_size]),
                    src_shape: format_shape(&[n]),
                })
            }
        };
        if dst_size <= 0 {
            return Ok(());
        }
        self.strided(offset + 1, dst_ptr, dst_stride, &[src_ptr], &[src_stride], dst_size as usize)
    }
}

impl Drop for KernelBuilder {
    fn drop(&mut self) {
        self.truncate(0);
    }
}

/// Read the `(begin, size)` pair of var dimension data.
///
/// # Safety
///
/// `data` must point to var dimension data.
pub(crate) unsafe fn read_var(data: *const u8) -> (*mut u8, isize) {
    let begin = data.cast::<*mut u8>().read_unaligned();
    let size = data.add(std::mem::size_of::<usize>()).cast::<isize>().read_unaligned();
    (begin, size)
}

/// # Safety
///
/// `data` must point to writable var dimension data.
pub(crate) unsafe fn write_var(data: *mut u8, begin: *mut u8, size: isize) {
    data.cast::<*mut u8>().write_unaligned(begin);
    data.add(std::mem::size_of::<usize>()).cast::<isize>().write_unaligned(size);
}
