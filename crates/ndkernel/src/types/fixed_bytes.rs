// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-size opaque byte blobs.

use std::fmt;

use super::{Type, TypeHeader, TypeId, TypeKind, TypeOps, TypeVariant};
use crate::config::MAX_DATA_ALIGNMENT;
use crate::error::{Error, Result};
use crate::kernels::{AssignRequest, CompareRequest, KernelBuilder, KernelUnit, Side};
use crate::memblock::BlockRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedBytesType {
    pub size: usize,
    pub alignment: usize,
}

impl Type {
    /// `bytes[size, align=alignment]`.
    ///
    /// The alignment must be a power of two no larger than the data
    /// alignment limit, and must divide `size`.
    pub fn fixed_bytes(size: usize, alignment: usize) -> Result<Type> {
        if !alignment.is_power_of_two() || alignment > MAX_DATA_ALIGNMENT {
            return Err(Error::InvalidArgument(format!(
                "bytes alignment {} must be a power of two no larger than {}",
                alignment, MAX_DATA_ALIGNMENT
            )));
        }
        if size % alignment != 0 {
            return Err(Error::InvalidArgument(format!(
                "bytes size {} is not a multiple of its alignment {}",
                size, alignment
            )));
        }
        Ok(Type::from_variant(TypeVariant::FixedBytes(FixedBytesType { size, alignment })))
    }
}

impl TypeOps for FixedBytesType {
    fn header(&self) -> TypeHeader {
        TypeHeader::scalar(TypeId::FixedBytes, TypeKind::Bytes, self.size, self.alignment)
    }

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        if self.alignment == 1 {
            write!(f, "bytes[{}]", self.size)
        } else {
            write!(f, "bytes[{}, align={}]", self.size, self.alignment)
        }
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        _arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        out.write_str("0x")?;
        for b in std::slice::from_raw_parts(data, self.size) {
            write!(out, "{:02x}", b)?;
        }
        Ok(())
    }

    fn is_lossless_assignment(&self, dst: &Type, src: &Type) -> bool {
        matches!(
            (dst.variant(), src.variant()),
            (TypeVariant::FixedBytes(d), TypeVariant::FixedBytes(s)) if d.size == s.size
        )
    }

    fn arrmeta_default_construct(
        &self,
        _arrmeta: &mut [u8],
        _shape: &[isize],
        _blockref_alloc: bool,
    ) -> Result<()> {
        Ok(())
    }

    fn arrmeta_copy_construct(
        &self,
        _dst: &mut [u8],
        _src: &[u8],
        _embedded: Option<BlockRef>,
    ) -> Result<()> {
        Ok(())
    }

    fn arrmeta_reset_buffers(&self, _arrmeta: &mut [u8]) -> Result<()> {
        Ok(())
    }

    fn arrmeta_finalize_buffers(&self, _arrmeta: &mut [u8]) -> Result<()> {
        Ok(())
    }

    fn arrmeta_destruct(&self, _arrmeta: &mut [u8]) {}

    fn arrmeta_debug_print(
        &self,
        _arrmeta: &[u8],
        _out: &mut dyn fmt::Write,
        _indent: &str,
    ) -> fmt::Result {
        Ok(())
    }

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &AssignRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        match (side, req.src_tp.variant()) {
            (Side::Lhs, TypeVariant::FixedBytes(src)) if src.size == self.size => {
                ckb.push(offset, req.request, KernelUnit::Copy { size: self.size })
            }
            (Side::Lhs, _) => req.src_tp.make_assignment_kernel(ckb, offset, req, Side::Rhs),
            (Side::Rhs, _) => Err(req.unsupported()),
        }
    }

    fn make_comparison_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &CompareRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        match (side, req.src1_tp.variant()) {
            (Side::Lhs, TypeVariant::FixedBytes(rhs)) if rhs.size == self.size => ckb.push(
                offset,
                req.request,
                KernelUnit::BytesCompare {
                    size: self.size,
                    comparison: req.comparison,
                },
            ),
            (Side::Lhs, _) => req.src1_tp.make_comparison_kernel(ckb, offset, req, Side::Rhs),
            (Side::Rhs, _) => Err(req.not_comparable()),
        }
    }
}
