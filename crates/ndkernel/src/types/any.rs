// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `Any`: the symbolic type matching every type.

use std::fmt;

use super::{Type, TypeFlags, TypeHeader, TypeId, TypeKind, TypeOps, TypeVariant};
use crate::error::{Error, Result};
use crate::memblock::BlockRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnyType;

impl Type {
    pub fn any() -> Type {
        Type::from_variant(TypeVariant::Any(AnyType))
    }
}

impl TypeOps for AnyType {
    fn header(&self) -> TypeHeader {
        TypeHeader {
            flags: TypeFlags::SYMBOLIC,
            ..TypeHeader::scalar(TypeId::Any, TypeKind::Pattern, 0, 1)
        }
    }

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        f.write_str("Any")
    }

    unsafe fn print_data(
        &self,
        _out: &mut dyn fmt::Write,
        _arrmeta: &[u8],
        _data: *const u8,
    ) -> fmt::Result {
        Err(fmt::Error)
    }

    fn type_at_dimension(
        &self,
        this: &Type,
        _arrmeta_offset: &mut usize,
        _i: usize,
        _total_ndim: usize,
    ) -> Result<Type> {
        Ok(this.clone())
    }

    unsafe fn at_single(
        &self,
        this: &Type,
        _i0: isize,
        _arrmeta: &mut &[u8],
        _data: &mut *const u8,
    ) -> Result<Type> {
        Ok(this.clone())
    }

    fn default_data_size(&self, this: &Type, _shape: &[isize]) -> Result<usize> {
        Err(Error::unsupported("default_data_size", this))
    }

    fn arrmeta_default_construct(
        &self,
        _arrmeta: &mut [u8],
        _shape: &[isize],
        _blockref_alloc: bool,
    ) -> Result<()> {
        Err(Error::unsupported("arrmeta_default_construct", &"Any"))
    }

    fn arrmeta_copy_construct(
        &self,
        _dst: &mut [u8],
        _src: &[u8],
        _embedded: Option<BlockRef>,
    ) -> Result<()> {
        Err(Error::unsupported("arrmeta_copy_construct", &"Any"))
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
}
