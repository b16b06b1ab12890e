// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Kernel units.
//!
//! A unit is one typed step of a resolved operation. Leaf units act on
//! data directly; composite units (dimension loops, index projections,
//! chains, fieldwise struct assignment) forward to child units placed at
//! later offsets of the same builder.

use std::fmt;
use std::sync::Arc;

use crate::arrmeta::Arrmeta;
use crate::config::AssignErrorMode;
use crate::error::{Error, Result};
use crate::kernels::ComparisonType;
use crate::memblock::BlockRef;
use crate::types::builtin as builtin_ops;
use crate::types::string as string_ops;
use crate::types::time as time_ops;
use crate::types::{BuiltinTypeId, StringLayout, TimeField, TimeZone, Type};

/// One typed execution step.
pub(crate) enum KernelUnit {
    /// Copy `size` bytes.
    Copy { size: usize },
    /// Write the source pointer into the destination slot (index chains).
    Identity,
    BuiltinAssign {
        dst: BuiltinTypeId,
        src: BuiltinTypeId,
        errmode: AssignErrorMode,
    },
    BuiltinCompare {
        lhs: BuiltinTypeId,
        rhs: BuiltinTypeId,
        comparison: ComparisonType,
    },
    /// Lexicographic comparison of `size` raw bytes.
    BytesCompare {
        size: usize,
        comparison: ComparisonType,
    },
    StringAssign {
        dst: StringLayout,
        dst_block: BlockRef,
        src: StringLayout,
        errmode: AssignErrorMode,
    },
    StringCompare {
        lhs: StringLayout,
        rhs: StringLayout,
        comparison: ComparisonType,
    },
    StringToBuiltin {
        dst: BuiltinTypeId,
        src: StringLayout,
        errmode: AssignErrorMode,
    },
    StringToTime {
        tz: TimeZone,
        src: StringLayout,
        errmode: AssignErrorMode,
    },
    /// Render an arrmeta-free scalar into a string.
    FormatToString {
        dst: StringLayout,
        dst_block: BlockRef,
        src_tp: Type,
        errmode: AssignErrorMode,
    },
    /// Read one time field (or the whole `struct` record).
    TimeGet(TimeField),
    /// Write a time from a `{hour, minute, second, tick}` record.
    TimeSetStruct { tz: TimeZone, errmode: AssignErrorMode },
    /// Loop over one dimension, child at `offset + 1`.
    Dim(DimAssign),
    /// Project into a strided dimension, child at `offset + 1`.
    DimIndex { index: isize, stride: isize },
    /// Project into a var dimension, child at `offset + 1`.
    VarIndex { index: isize, stride: isize, offset: isize },
    /// Two-step conversion through a temporary value.
    Chain(ChainUnit),
    /// Per-field assignment between structs.
    Fieldwise(Arc<[FieldStep]>),
}

/// Destination side of a dimension loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DimTarget {
    Strided { size: isize, stride: isize },
    /// Unallocated var data is allocated from `block` on first write.
    Var {
        block: BlockRef,
        stride: isize,
        offset: isize,
        align: usize,
    },
}

/// Source side of a dimension loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DimSource {
    /// Source has no such dimension; repeat it.
    Broadcast,
    Strided { size: isize, stride: isize },
    Var { stride: isize, offset: isize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DimAssign {
    pub(crate) dst: DimTarget,
    pub(crate) src: DimSource,
}

/// One field of a fieldwise struct assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldStep {
    pub(crate) dst_offset: usize,
    pub(crate) src_offset: usize,
    /// Builder offset of the field's child kernel.
    pub(crate) child: usize,
}

/// Owned scratch element used between the two steps of a chain.
pub(crate) struct TempBuffer {
    data: Vec<u64>,
    arrmeta: Arrmeta,
    reset: bool,
}

impl TempBuffer {
    pub(crate) fn new(tp: &Type) -> Result<Self> {
        if tp.data_size() == 0 || tp.ndim() > 0 {
            return Err(Error::unsupported("temporary buffer", tp));
        }
        let arrmeta = Arrmeta::default_construct(tp, &[], true)?;
        let words = tp.data_size().div_ceil(8);
        Ok(Self {
            data: vec![0u64; words],
            arrmeta,
            reset: tp.flags().contains(crate::types::TypeFlags::BLOCKREF),
        })
    }

    pub(crate) fn data_ptr(&mut self) -> *mut u8 {
        self.data.as_mut_ptr().cast()
    }

    pub(crate) fn arrmeta(&self) -> &[u8] {
        self.arrmeta.as_bytes()
    }

    pub(crate) fn type_(&self) -> &Type {
        self.arrmeta.type_()
    }

    /// Release whatever the last step allocated for the temporary.
    pub(crate) fn reset(&mut self) -> Result<()> {
        if self.reset {
            self.arrmeta.reset_buffers()?;
        }
        Ok(())
    }
}

/// First step at `offset + 1` writes the temporary, second step at
/// `second` reads it.
pub(crate) struct ChainUnit {
    pub(crate) temp: TempBuffer,
    pub(crate) second: usize,
}

impl KernelUnit {
    /// Execute a leaf unit.
    ///
    /// # Safety
    ///
    /// `dst` and every `src` pointer must reference valid elements of the
    /// types the unit was resolved for.
    pub(crate) unsafe fn exec_leaf(&self, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        match self {
            KernelUnit::Copy { size } => {
                std::ptr::copy_nonoverlapping(src[0], dst, *size);
                Ok(())
            }
            KernelUnit::Identity => {
                dst.cast::<*const u8>().write_unaligned(src[0]);
                Ok(())
            }
            KernelUnit::BuiltinAssign {
                dst: dst_id,
                src: src_id,
                errmode,
            } => builtin_ops::assign(*dst_id, dst, *src_id, src[0], *errmode),
            KernelUnit::BuiltinCompare {
                lhs,
                rhs,
                comparison,
            } => {
                let r = builtin_ops::compare(*lhs, src[0], *rhs, src[1], *comparison);
                *dst = u8::from(r);
                Ok(())
            }
            KernelUnit::BytesCompare { size, comparison } => {
                let a = std::slice::from_raw_parts(src[0], *size);
                let b = std::slice::from_raw_parts(src[1], *size);
                *dst = u8::from(comparison.holds(Some(a.cmp(b))));
                Ok(())
            }
            KernelUnit::StringAssign {
                dst: dst_layout,
                dst_block,
                src: src_layout,
                errmode,
            } => string_ops::assign(*dst_layout, *dst_block, dst, *src_layout, src[0], *errmode),
            KernelUnit::StringCompare {
                lhs,
                rhs,
                comparison,
            } => {
                let r = string_ops::compare(*lhs, src[0], *rhs, src[1], *comparison)?;
                *dst = u8::from(r);
                Ok(())
            }
            KernelUnit::StringToBuiltin {
                dst: dst_id,
                src: src_layout,
                errmode,
            } => {
                let text = string_ops::read_utf8(*src_layout, src[0], *errmode)?;
                builtin_ops::parse_into(*dst_id, dst, &text, *errmode)
            }
            KernelUnit::StringToTime {
                tz,
                src: src_layout,
                errmode,
            } => {
                let text = string_ops::read_utf8(*src_layout, src[0], *errmode)?;
                let ticks = time_ops::parse_ticks(&text, *tz, *errmode)?;
                dst.cast::<i64>().write_unaligned(ticks);
                Ok(())
            }
            KernelUnit::FormatToString {
                dst: dst_layout,
                dst_block,
                src_tp,
                errmode,
            } => {
                let text = src_tp.data_to_string(&[], src[0])?;
                string_ops::store_utf8(*dst_layout, *dst_block, dst, &text, *errmode)
            }
            KernelUnit::TimeGet(field) => {
                time_ops::get_field(*field, dst, src[0]);
                Ok(())
            }
            KernelUnit::TimeSetStruct { tz, errmode } => {
                time_ops::set_from_struct(dst, src[0], *tz, *errmode)
            }
            KernelUnit::Dim(_)
            | KernelUnit::DimIndex { .. }
            | KernelUnit::VarIndex { .. }
            | KernelUnit::Chain(_)
            | KernelUnit::Fieldwise(_) => Err(Error::InvalidArgument(format!(
                "{} is not a leaf kernel",
                self
            ))),
        }
    }
}

impl fmt::Display for KernelUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelUnit::Copy { size } => write!(f, "copy({} bytes)", size),
            KernelUnit::Identity => write!(f, "identity"),
            KernelUnit::BuiltinAssign { dst, src, errmode } => {
                write!(f, "assign({} <- {}, {})", dst.name(), src.name(), errmode)
            }
            KernelUnit::BuiltinCompare { lhs, rhs, comparison } => {
                write!(f, "compare({} {} {})", lhs.name(), comparison, rhs.name())
            }
            KernelUnit::BytesCompare { size, comparison } => {
                write!(f, "compare(bytes[{}] {})", size, comparison)
            }
            KernelUnit::StringAssign { dst, src, .. } => write!(f, "string_assign({} <- {})", dst, src),
            KernelUnit::StringCompare { lhs, rhs, comparison } => {
                write!(f, "string_compare({} {} {})", lhs, comparison, rhs)
            }
            KernelUnit::StringToBuiltin { dst, src, .. } => write!(f, "parse({} <- {})", dst.name(), src),
            KernelUnit::StringToTime { tz, src, .. } => write!(f, "parse_time({} <- {})", tz, src),
            KernelUnit::FormatToString { dst, src_tp, .. } => write!(f, "format({} <- {})", dst, src_tp),
            KernelUnit::TimeGet(field) => write!(f, "time_get({})", field.name()),
            KernelUnit::TimeSetStruct { errmode, .. } => write!(f, "time_set(struct, {})", errmode),
            KernelUnit::Dim(d) => write!(f, "dim({:?} <- {:?})", d.dst, d.src),
            KernelUnit::DimIndex { index, stride } => write!(f, "dim_index({} * {})", index, stride),
            KernelUnit::VarIndex { index, stride, offset } => {
                write!(f, "var_index({} * {} + {})", index, stride, offset)
            }
            KernelUnit::Chain(c) => write!(f, "chain(via {}, second at {})", c.temp.type_(), c.second),
            KernelUnit::Fieldwise(steps) => write!(f, "fieldwise({} fields)", steps.len()),
        }
    }
}
