// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dimension types: `N * T`, `strided * T` and `var * T`.
//!
//! Arrmeta of a dimension is its own header followed by the element's
//! arrmeta:
//!
//! | Dimension | Header                                  | Data              |
//! |-----------|-----------------------------------------|-------------------|
//! | fixed     | `size: isize`, `stride: isize`          | `N` elements      |
//! | strided   | `size: isize`, `stride: isize`          | none (instance)   |
//! | var       | `blockref`, `stride: isize`, `offset: isize` | `(begin, size)` |
//!
//! The stride sits at byte 8 in every layout.

use std::collections::BTreeMap;
use std::fmt;

use super::{IndexStep, Type, TypeFlags, TypeHeader, TypeId, TypeKind, TypeOps, TypeVariant};
use crate::arrmeta::{
    blockref_is_unique, construct_blockref, copy_blockref, debug_print_blockref, destruct_blockref,
    finalize_blockref, read_blockref, read_isize, reset_blockref, write_isize,
};
use crate::config::{STRIDED_DIM_ARRMETA_SIZE, VAR_DIM_ARRMETA_SIZE, VAR_DIM_DATA_SIZE};
use crate::error::{Error, Result};
use crate::kernels::{
    apply_single_index, format_shape, read_var, resolve_assignment, AssignRequest, DimAssign,
    DimSource, DimTarget, IndexCursor, KernelBuilder, KernelRequest, KernelUnit, Side,
};
use crate::memblock::BlockRef;
use crate::properties::Callable;

const STRIDE_AT: usize = 8;
const VAR_OFFSET_AT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedDimType {
    pub dim_size: usize,
    pub element: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StridedDimType {
    pub element: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDimType {
    pub element: Type,
}

impl Type {
    /// `dim_size * element`.
    pub fn fixed_dim(dim_size: usize, element: Type) -> Result<Type> {
        check_element("fixed", &element)?;
        Ok(Type::from_variant(TypeVariant::FixedDim(FixedDimType { dim_size, element })))
    }

    /// `strided * element`; the size lives in the arrmeta.
    pub fn strided_dim(element: Type) -> Type {
        Type::from_variant(TypeVariant::StridedDim(StridedDimType { element }))
    }

    /// `var * element`.
    pub fn var_dim(element: Type) -> Result<Type> {
        check_element("var", &element)?;
        Ok(Type::from_variant(TypeVariant::VarDim(VarDimType { element })))
    }

    /// Wrap `dtype` in fixed dimensions of the given sizes, outermost first.
    pub fn fixed_array(shape: &[usize], dtype: Type) -> Result<Type> {
        shape.iter().rev().try_fold(dtype, |tp, &n| Type::fixed_dim(n, tp))
    }
}

/// Elements of fixed and var dims are laid out contiguously, so they need
/// a known data size.
fn check_element(dim: &str, element: &Type) -> Result<()> {
    if element.data_size() == 0 && !element.is_symbolic() {
        return Err(Error::InvalidArgument(format!(
            "{} dimension element {} has no fixed data size",
            dim, element
        )));
    }
    Ok(())
}

// ============================================================================
// Shared implementation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dim {
    Fixed(usize),
    Strided,
    Var,
}

impl Dim {
    fn header_size(self) -> usize {
        match self {
            Dim::Var => VAR_DIM_ARRMETA_SIZE,
            Dim::Fixed(_) | Dim::Strided => STRIDED_DIM_ARRMETA_SIZE,
        }
    }

    /// Size known from the type and arrmeta alone.
    fn static_size(self, arrmeta: &[u8]) -> Option<isize> {
        match self {
            Dim::Fixed(n) => Some(n as isize),
            Dim::Strided => Some(read_isize(arrmeta, 0)),
            Dim::Var => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Dim::Fixed(_) => "fixed_dim",
            Dim::Strided => "strided_dim",
            Dim::Var => "var_dim",
        }
    }
}

fn elem_shape(shape: &[isize]) -> &[isize] {
    shape.get(1..).unwrap_or(&[])
}

fn header(dim: Dim, element: &Type) -> TypeHeader {
    let inherited = element.flags().inherited();
    let (type_id, data_size, data_alignment, flags) = match dim {
        Dim::Fixed(n) => {
            (TypeId::FixedDim, n * element.data_size(), element.data_alignment(), inherited)
        }
        Dim::Strided => (
            TypeId::StridedDim,
            0,
            element.data_alignment(),
            inherited | TypeFlags::VAR_SIZE,
        ),
        Dim::Var => (
            TypeId::VarDim,
            VAR_DIM_DATA_SIZE,
            std::mem::align_of::<usize>(),
            inherited | TypeFlags::BLOCKREF,
        ),
    };
    TypeHeader {
        type_id,
        kind: TypeKind::Dim,
        data_size,
        data_alignment: data_alignment.max(1),
        arrmeta_size: dim.header_size() + element.arrmeta_size(),
        flags,
        ndim: 1 + element.ndim(),
    }
}

fn print_type(dim: Dim, element: &Type, f: &mut dyn fmt::Write) -> fmt::Result {
    match dim {
        Dim::Fixed(n) => write!(f, "{} * {}", n, element),
        Dim::Strided => write!(f, "strided * {}", element),
        Dim::Var => write!(f, "var * {}", element),
    }
}

/// # Safety
///
/// `data` must point to a valid dimension instance.
unsafe fn print_data(
    dim: Dim,
    element: &Type,
    out: &mut dyn fmt::Write,
    arrmeta: &[u8],
    data: *const u8,
) -> fmt::Result {
    let stride = read_isize(arrmeta, STRIDE_AT);
    let (begin, size) = match dim.static_size(arrmeta) {
        Some(n) => (data, n),
        None => {
            let (begin, n) = read_var(data);
            if begin.is_null() {
                return out.write_str("[]");
            }
            (begin.cast_const().offset(read_isize(arrmeta, VAR_OFFSET_AT)), n)
        }
    };
    let elem_arrmeta = &arrmeta[dim.header_size()..];
    out.write_char('[')?;
    for i in 0..size {
        if i > 0 {
            out.write_str(", ")?;
        }
        element.print_data(out, elem_arrmeta, begin.offset(i * stride))?;
    }
    out.write_char(']')
}

fn default_construct(
    dim: Dim,
    element: &Type,
    arrmeta: &mut [u8],
    shape: &[isize],
    blockref_alloc: bool,
) -> Result<()> {
    let inner = elem_shape(shape);
    let stride = if element.is_symbolic() {
        0
    } else {
        element.default_data_size(inner)? as isize
    };
    match dim {
        Dim::Fixed(n) => {
            if let Some(&s) = shape.first() {
                if s >= 0 && s as usize != n {
                    return Err(Error::InvalidArgument(format!(
                        "shape {} does not match fixed dimension of size {}",
                        s, n
                    )));
                }
            }
            write_isize(arrmeta, 0, n as isize);
            write_isize(arrmeta, STRIDE_AT, stride);
        }
        Dim::Strided => {
            let n = match shape.first() {
                Some(&n) if n >= 0 => n,
                _ => {
                    return Err(Error::InvalidArgument(
                        "strided dimension needs a size in the shape".to_string(),
                    ))
                }
            };
            write_isize(arrmeta, 0, n);
            write_isize(arrmeta, STRIDE_AT, stride);
        }
        Dim::Var => {
            construct_blockref(arrmeta, 0, blockref_alloc);
            write_isize(arrmeta, STRIDE_AT, stride);
            write_isize(arrmeta, VAR_OFFSET_AT, 0);
        }
    }
    let h = dim.header_size();
    if let Err(e) = element.arrmeta_default_construct(&mut arrmeta[h..], inner, blockref_alloc) {
        if dim == Dim::Var {
            destruct_blockref(arrmeta, 0);
        }
        return Err(e);
    }
    Ok(())
}

fn copy_construct(
    dim: Dim,
    element: &Type,
    dst: &mut [u8],
    src: &[u8],
    embedded: Option<BlockRef>,
) -> Result<()> {
    let h = dim.header_size();
    if dim == Dim::Var {
        copy_blockref(dst, src, 0, embedded)?;
        dst[STRIDE_AT..h].copy_from_slice(&src[STRIDE_AT..h]);
    } else {
        dst[..h].copy_from_slice(&src[..h]);
    }
    if let Err(e) = element.arrmeta_copy_construct(&mut dst[h..], &src[h..], embedded) {
        if dim == Dim::Var {
            destruct_blockref(dst, 0);
        }
        return Err(e);
    }
    Ok(())
}

fn reset_buffers(dim: Dim, element: &Type, arrmeta: &mut [u8]) -> Result<()> {
    if dim == Dim::Var {
        reset_blockref(arrmeta, 0)?;
    }
    element.arrmeta_reset_buffers(&mut arrmeta[dim.header_size()..])
}

fn finalize_buffers(dim: Dim, element: &Type, arrmeta: &mut [u8]) -> Result<()> {
    if dim == Dim::Var {
        finalize_blockref(arrmeta, 0)?;
    }
    element.arrmeta_finalize_buffers(&mut arrmeta[dim.header_size()..])
}

fn destruct(dim: Dim, element: &Type, arrmeta: &mut [u8]) {
    element.arrmeta_destruct(&mut arrmeta[dim.header_size()..]);
    if dim == Dim::Var {
        destruct_blockref(arrmeta, 0);
    }
}

fn debug_print(
    dim: Dim,
    element: &Type,
    arrmeta: &[u8],
    out: &mut dyn fmt::Write,
    indent: &str,
) -> fmt::Result {
    let inner = format!("{} ", indent);
    writeln!(out, "{}{} arrmeta", indent, dim.name())?;
    match dim {
        Dim::Fixed(_) | Dim::Strided => writeln!(out, "{}size: {}", inner, read_isize(arrmeta, 0))?,
        Dim::Var => debug_print_blockref(arrmeta, 0, out, &inner)?,
    }
    writeln!(out, "{}stride: {}", inner, read_isize(arrmeta, STRIDE_AT))?;
    if dim == Dim::Var {
        writeln!(out, "{}offset: {}", inner, read_isize(arrmeta, VAR_OFFSET_AT))?;
    }
    element.arrmeta_debug_print(&arrmeta[dim.header_size()..], out, &inner)
}

/// # Safety
///
/// `data` must point to a valid dimension instance.
unsafe fn at_single(
    dim: Dim,
    element: &Type,
    i0: isize,
    arrmeta: &mut &[u8],
    data: &mut *const u8,
) -> Result<Type> {
    let am: &[u8] = *arrmeta;
    let stride = read_isize(am, STRIDE_AT);
    match dim.static_size(am) {
        Some(size) => {
            let i = apply_single_index(i0, size)?;
            *data = data.wrapping_offset(i * stride);
        }
        None => {
            if data.is_null() {
                return Err(Error::InvalidArgument(
                    "indexing a var dimension requires data".to_string(),
                ));
            }
            let (begin, size) = read_var(*data);
            let i = apply_single_index(i0, size)?;
            *data = begin
                .cast_const()
                .offset(read_isize(am, VAR_OFFSET_AT) + i * stride);
        }
    }
    *arrmeta = &am[dim.header_size()..];
    Ok(element.clone())
}

/// # Safety
///
/// `data`, when present, must point to a valid dimension instance.
unsafe fn shape(
    dim: Dim,
    element: &Type,
    ndim: usize,
    i: usize,
    out_shape: &mut [isize],
    arrmeta: Option<&[u8]>,
    data: Option<*const u8>,
) {
    if i >= ndim || i >= out_shape.len() {
        return;
    }
    out_shape[i] = match (dim, arrmeta, data) {
        (Dim::Fixed(n), _, _) => n as isize,
        (Dim::Strided, Some(am), _) => read_isize(am, 0),
        (Dim::Var, _, Some(p)) if !p.is_null() => read_var(p).1,
        _ => -1,
    };
    let elem_arrmeta = arrmeta.map(|am| &am[dim.header_size()..]);
    element.shape(ndim, i + 1, out_shape, elem_arrmeta, None);
}

fn make_assignment(
    dim: Dim,
    element: &Type,
    ckb: &mut KernelBuilder,
    offset: usize,
    req: &AssignRequest<'_>,
    side: Side,
) -> Result<usize> {
    if side == Side::Rhs {
        return Err(req.unsupported());
    }
    let (dst_tp, src_tp) = (req.dst_tp, req.src_tp);
    let broadcast_error = || Error::Broadcast {
        dst_shape: format_shape(&dst_tp.shape_from_arrmeta(Some(req.dst_arrmeta))),
        src_shape: format_shape(&src_tp.shape_from_arrmeta(Some(req.src_arrmeta))),
    };
    if src_tp.ndim() > dst_tp.ndim() {
        return Err(broadcast_error());
    }

    let dst_am = req.dst_arrmeta;
    let dst_stride = read_isize(dst_am, STRIDE_AT);
    let target = match dim.static_size(dst_am) {
        Some(size) => DimTarget::Strided {
            size,
            stride: dst_stride,
        },
        None => DimTarget::Var {
            block: read_blockref(dst_am, 0),
            stride: dst_stride,
            offset: read_isize(dst_am, VAR_OFFSET_AT),
            align: element.data_alignment(),
        },
    };
    let dst_elem_am = &dst_am[dim.header_size()..];

    if src_tp.ndim() < dst_tp.ndim() {
        ckb.push(
            offset,
            req.request,
            KernelUnit::Dim(DimAssign {
                dst: target,
                src: DimSource::Broadcast,
            }),
        )?;
        let child = req.with(element, dst_elem_am, src_tp, req.src_arrmeta, KernelRequest::Strided);
        return resolve_assignment(ckb, offset + 1, &child);
    }

    let (src_dim, src_elem) = match src_tp.variant() {
        TypeVariant::FixedDim(d) => (Dim::Fixed(d.dim_size), &d.element),
        TypeVariant::StridedDim(d) => (Dim::Strided, &d.element),
        TypeVariant::VarDim(d) => (Dim::Var, &d.element),
        _ => return Err(req.unsupported()),
    };
    let src_am = req.src_arrmeta;
    let src_stride = read_isize(src_am, STRIDE_AT);
    let source = match src_dim.static_size(src_am) {
        Some(size) => DimSource::Strided {
            size,
            stride: src_stride,
        },
        None => DimSource::Var {
            stride: src_stride,
            offset: read_isize(src_am, VAR_OFFSET_AT),
        },
    };
    if let (DimTarget::Strided { size: d, .. }, DimSource::Strided { size: s, .. }) = (target, source) {
        if s != d && s != 1 {
            return Err(broadcast_error());
        }
    }

    ckb.push(
        offset,
        req.request,
        KernelUnit::Dim(DimAssign {
            dst: target,
            src: source,
        }),
    )?;
    let child = req.with(
        element,
        dst_elem_am,
        src_elem,
        &src_am[src_dim.header_size()..],
        KernelRequest::Strided,
    );
    resolve_assignment(ckb, offset + 1, &child)
}

#[allow(clippy::too_many_arguments)]
fn make_index(
    dim: Dim,
    element: &Type,
    this: &Type,
    ckb: &mut KernelBuilder,
    offset: usize,
    arrmeta: &[u8],
    cursor: &mut IndexCursor<'_>,
    request: KernelRequest,
) -> Result<IndexStep> {
    let Some(index) = cursor.next_index() else {
        let end = ckb.push(offset, request, KernelUnit::Identity)?;
        return Ok(IndexStep {
            dst_type: this.clone(),
            arrmeta_offset: 0,
            end_offset: end,
        });
    };
    let stride = read_isize(arrmeta, STRIDE_AT);
    let unit = match dim.static_size(arrmeta) {
        Some(size) => KernelUnit::DimIndex {
            index: apply_single_index(index, size)?,
            stride,
        },
        None => KernelUnit::VarIndex {
            index,
            stride,
            offset: read_isize(arrmeta, VAR_OFFSET_AT),
        },
    };
    ckb.push(offset, request, unit)?;
    let h = dim.header_size();
    let step = element.make_index_kernel(ckb, offset + 1, &arrmeta[h..], cursor, request)?;
    Ok(IndexStep {
        dst_type: step.dst_type,
        arrmeta_offset: h + step.arrmeta_offset,
        end_offset: step.end_offset,
    })
}

/// Same dimension kind (and size, for fixed dims) over lossless elements.
fn dims_lossless(dst: &Type, src: &Type) -> bool {
    let same_dim = match (dst.variant(), src.variant()) {
        (TypeVariant::FixedDim(d), TypeVariant::FixedDim(s)) => d.dim_size == s.dim_size,
        (TypeVariant::StridedDim(_), TypeVariant::StridedDim(_)) | (TypeVariant::VarDim(_), TypeVariant::VarDim(_)) => true,
        _ => false,
    };
    match (dst.element_type(), src.element_type()) {
        (Some(d), Some(s)) => same_dim && Type::is_lossless_assignment(d, s),
        _ => false,
    }
}

fn default_data_size(dim: Dim, element: &Type, this: &Type, shape: &[isize]) -> Result<usize> {
    let n = match (dim, shape.first()) {
        (Dim::Var, _) => return Ok(VAR_DIM_DATA_SIZE),
        (Dim::Fixed(n), _) => n,
        (Dim::Strided, Some(&n)) if n >= 0 => n as usize,
        (Dim::Strided, _) => {
            return Err(Error::InvalidArgument(format!(
                "a size is required for the strided dimension of {}",
                this
            )))
        }
    };
    Ok(n * element.default_data_size(elem_shape(shape))?)
}

// ============================================================================
// TypeOps
// ============================================================================

macro_rules! impl_dim_ops {
    ($ty:ty, $self_:ident => $dim:expr) => {
        impl TypeOps for $ty {
            fn header(&self) -> TypeHeader {
                let $self_ = self;
                header($dim, &self.element)
            }

            fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
                let $self_ = self;
                print_type($dim, &self.element, f)
            }

            unsafe fn print_data(
                &self,
                out: &mut dyn fmt::Write,
                arrmeta: &[u8],
                data: *const u8,
            ) -> fmt::Result {
                let $self_ = self;
                print_data($dim, &self.element, out, arrmeta, data)
            }

            fn is_strided(&self) -> bool {
                let $self_ = self;
                $dim != Dim::Var
            }

            fn is_unique_data_owner(&self, arrmeta: &[u8]) -> bool {
                let $self_ = self;
                let dim = $dim;
                (dim != Dim::Var || blockref_is_unique(arrmeta, 0))
                    && self.element.is_unique_data_owner(&arrmeta[dim.header_size()..])
            }

            fn is_lossless_assignment(&self, dst: &Type, src: &Type) -> bool {
                dims_lossless(dst, src)
            }

            fn canonical_type(&self, this: &Type) -> Type {
                this.with_replaced_dtype(this.dtype().canonical_type())
                    .unwrap_or_else(|_| this.clone())
            }

            fn value_type(&self, this: &Type) -> Type {
                this.with_replaced_dtype(this.dtype().value_type())
                    .unwrap_or_else(|_| this.clone())
            }

            fn operand_type(&self, this: &Type) -> Type {
                this.with_replaced_dtype(this.dtype().operand_type())
                    .unwrap_or_else(|_| this.clone())
            }

            fn type_at_dimension(
                &self,
                this: &Type,
                arrmeta_offset: &mut usize,
                i: usize,
                total_ndim: usize,
            ) -> Result<Type> {
                if i == 0 {
                    return Ok(this.clone());
                }
                let $self_ = self;
                *arrmeta_offset += $dim.header_size();
                self.element.type_at_dimension(arrmeta_offset, i - 1, total_ndim + 1)
            }

            unsafe fn at_single(
                &self,
                _this: &Type,
                i0: isize,
                arrmeta: &mut &[u8],
                data: &mut *const u8,
            ) -> Result<Type> {
                let $self_ = self;
                at_single($dim, &self.element, i0, arrmeta, data)
            }

            unsafe fn dim_size(
                &self,
                this: &Type,
                arrmeta: &[u8],
                data: *const u8,
            ) -> Result<isize> {
                let $self_ = self;
                match $dim.static_size(arrmeta) {
                    Some(n) => Ok(n),
                    None if !data.is_null() => Ok(read_var(data).1),
                    None => Err(Error::unsupported("dim_size without data", this)),
                }
            }

            unsafe fn shape(
                &self,
                ndim: usize,
                i: usize,
                out_shape: &mut [isize],
                arrmeta: Option<&[u8]>,
                data: Option<*const u8>,
            ) {
                let $self_ = self;
                shape($dim, &self.element, ndim, i, out_shape, arrmeta, data)
            }

            fn strides(&self, i: usize, out_strides: &mut [isize], arrmeta: &[u8]) {
                let $self_ = self;
                let dim = $dim;
                if dim == Dim::Var || i >= out_strides.len() {
                    return;
                }
                out_strides[i] = read_isize(arrmeta, STRIDE_AT);
                self.element.strides(i + 1, out_strides, &arrmeta[dim.header_size()..]);
            }

            fn default_data_size(&self, this: &Type, shape: &[isize]) -> Result<usize> {
                let $self_ = self;
                default_data_size($dim, &self.element, this, shape)
            }

            fn arrmeta_default_construct(
                &self,
                arrmeta: &mut [u8],
                shape: &[isize],
                blockref_alloc: bool,
            ) -> Result<()> {
                let $self_ = self;
                default_construct($dim, &self.element, arrmeta, shape, blockref_alloc)
            }

            fn arrmeta_copy_construct(
                &self,
                dst: &mut [u8],
                src: &[u8],
                embedded: Option<BlockRef>,
            ) -> Result<()> {
                let $self_ = self;
                copy_construct($dim, &self.element, dst, src, embedded)
            }

            fn arrmeta_reset_buffers(&self, arrmeta: &mut [u8]) -> Result<()> {
                let $self_ = self;
                reset_buffers($dim, &self.element, arrmeta)
            }

            fn arrmeta_finalize_buffers(&self, arrmeta: &mut [u8]) -> Result<()> {
                let $self_ = self;
                finalize_buffers($dim, &self.element, arrmeta)
            }

            fn arrmeta_destruct(&self, arrmeta: &mut [u8]) {
                let $self_ = self;
                destruct($dim, &self.element, arrmeta)
            }

            fn arrmeta_debug_print(
                &self,
                arrmeta: &[u8],
                out: &mut dyn fmt::Write,
                indent: &str,
            ) -> fmt::Result {
                let $self_ = self;
                debug_print($dim, &self.element, arrmeta, out, indent)
            }

            fn make_assignment_kernel(
                &self,
                ckb: &mut KernelBuilder,
                offset: usize,
                req: &AssignRequest<'_>,
                side: Side,
            ) -> Result<usize> {
                let $self_ = self;
                make_assignment($dim, &self.element, ckb, offset, req, side)
            }

            fn make_index_kernel(
                &self,
                this: &Type,
                ckb: &mut KernelBuilder,
                offset: usize,
                arrmeta: &[u8],
                cursor: &mut IndexCursor<'_>,
                request: KernelRequest,
            ) -> Result<IndexStep> {
                let $self_ = self;
                make_index($dim, &self.element, this, ckb, offset, arrmeta, cursor, request)
            }

            // Arrays forward to the innermost type's registries, one level.
            fn dynamic_array_properties(&self) -> BTreeMap<String, Callable> {
                self.element.dtype().dynamic_array_properties()
            }

            fn dynamic_array_functions(&self) -> BTreeMap<String, Callable> {
                self.element.dtype().dynamic_array_functions()
            }
        }
    };
}

impl_dim_ops!(FixedDimType, t => Dim::Fixed(t.dim_size));
impl_dim_ops!(StridedDimType, _t => Dim::Strided);
impl_dim_ops!(VarDimType, _t => Dim::Var);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrmeta::Arrmeta;
    use crate::config::{AssignErrorMode, EvalContext};
    use crate::kernels::{make_assignment_kernel, make_index_kernel, write_var};
    use crate::memblock::global_arena;
    use crate::types::BuiltinTypeId;

    fn int32() -> Type {
        Type::builtin(BuiltinTypeId::Int32)
    }

    #[test]
    fn test_headers() {
        let fixed = Type::fixed_dim(3, int32()).expect("fixed");
        assert_eq!(fixed.data_size(), 12);
        assert_eq!(fixed.arrmeta_size(), 16);
        assert!(fixed.is_strided());

        let strided = Type::strided_dim(fixed.clone());
        assert_eq!(strided.data_size(), 0);
        assert!(strided.flags().contains(TypeFlags::VAR_SIZE));
        assert_eq!(strided.ndim(), 2);
        assert_eq!(strided.to_string(), "strided * 3 * int32");

        let var = Type::var_dim(int32()).expect("var");
        assert_eq!(var.data_size(), 16);
        assert_eq!(var.arrmeta_size(), 24);
        assert!(var.flags().contains(TypeFlags::BLOCKREF));
        assert!(!var.is_strided());
    }

    #[test]
    fn test_contiguous_element_required() {
        let strided = Type::strided_dim(int32());
        assert!(matches!(Type::fixed_dim(2, strided.clone()), Err(Error::InvalidArgument(_))));
        assert!(matches!(Type::var_dim(strided), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_default_construct_strides() {
        let tp = Type::strided_dim(Type::fixed_dim(4, Type::builtin(BuiltinTypeId::Float64)).expect("fixed"));
        let am = Arrmeta::default_construct(&tp, &[5, 4], true).expect("arrmeta");
        assert_eq!(read_isize(am.as_bytes(), 0), 5);
        assert_eq!(read_isize(am.as_bytes(), 8), 32);
        assert_eq!(read_isize(am.as_bytes(), 16), 4);
        assert_eq!(read_isize(am.as_bytes(), 24), 8);
        assert_eq!(tp.shape_from_arrmeta(Some(am.as_bytes())), vec![5, 4]);

        let mut strides = [0isize; 2];
        tp.strides(0, &mut strides, am.as_bytes());
        assert_eq!(strides, [32, 8]);

        assert!(Arrmeta::default_construct(&tp, &[], true).is_err());
        assert!(Arrmeta::default_construct(&tp, &[5, 3], true).is_err());
    }

    #[test]
    fn test_type_at_dimension() {
        let tp = Type::fixed_dim(2, Type::var_dim(int32()).expect("var")).expect("fixed");
        let mut offset = 0;
        let inner = tp.type_at_dimension(&mut offset, 2, 0).expect("type_at");
        assert_eq!(inner, int32());
        assert_eq!(offset, 16 + 24);
        let err = tp.type_at_dimension(&mut 0, 3, 0).unwrap_err();
        assert!(matches!(err, Error::TooManyIndices { nindices: 3, ndim: 2, .. }));
    }

    #[test]
    fn test_at_single_negative_index() {
        let tp = Type::fixed_dim(3, int32()).expect("fixed");
        let am = Arrmeta::default_construct(&tp, &[], true).expect("arrmeta");
        let data = [10i32, 20, 30];
        let mut arrmeta = am.as_bytes();
        let mut p = data.as_ptr().cast::<u8>();
        // SAFETY: data is a 3 * int32 instance.
        let elem = unsafe { tp.at_single(-1, &mut arrmeta, &mut p) }.expect("at");
        assert_eq!(elem, int32());
        assert!(arrmeta.is_empty());
        // SAFETY: p points inside data.
        assert_eq!(unsafe { p.cast::<i32>().read_unaligned() }, 30);

        let mut arrmeta = am.as_bytes();
        let mut p = data.as_ptr().cast::<u8>();
        // SAFETY: out of range indices fail before touching data.
        let err = unsafe { tp.at_single(3, &mut arrmeta, &mut p) }.unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { index: 3, dim_size: 3 }));
    }

    #[test]
    fn test_broadcast_into_fixed() {
        let tp = Type::fixed_dim(4, int32()).expect("fixed");
        let am = Arrmeta::default_construct(&tp, &[], true).expect("arrmeta");
        let mut ckb = KernelBuilder::new();
        let end = make_assignment_kernel(
            &mut ckb,
            0,
            &tp,
            am.as_bytes(),
            &int32(),
            &[],
            KernelRequest::Single,
            AssignErrorMode::Default,
            &EvalContext::default(),
        )
        .expect("kernel");
        assert_eq!(end, 2);

        let src = 7i32;
        let mut dst = [0i32; 4];
        // SAFETY: dst is a 4 * int32 instance and src an int32.
        unsafe { ckb.single(0, dst.as_mut_ptr().cast(), &[(&src as *const i32).cast()]) }
            .expect("run");
        assert_eq!(dst, [7; 4]);
    }

    #[test]
    fn test_size_mismatch_rejected_at_resolve() {
        let dst = Type::fixed_dim(3, int32()).expect("fixed");
        let src = Type::fixed_dim(2, int32()).expect("fixed");
        let dst_am = Arrmeta::default_construct(&dst, &[], true).expect("arrmeta");
        let src_am = Arrmeta::default_construct(&src, &[], true).expect("arrmeta");
        let mut ckb = KernelBuilder::new();
        let err = make_assignment_kernel(
            &mut ckb,
            0,
            &dst,
            dst_am.as_bytes(),
            &src,
            src_am.as_bytes(),
            KernelRequest::Single,
            AssignErrorMode::Default,
            &EvalContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Broadcast { .. }));
        assert!(ckb.is_empty());
    }

    #[test]
    fn test_var_destination_allocates() {
        let dst = Type::var_dim(Type::builtin(BuiltinTypeId::Float64)).expect("var");
        let src = Type::fixed_dim(3, int32()).expect("fixed");
        let dst_am = Arrmeta::default_construct(&dst, &[], true).expect("arrmeta");
        let src_am = Arrmeta::default_construct(&src, &[], true).expect("arrmeta");
        let mut ckb = KernelBuilder::new();
        make_assignment_kernel(
            &mut ckb,
            0,
            &dst,
            dst_am.as_bytes(),
            &src,
            src_am.as_bytes(),
            KernelRequest::Single,
            AssignErrorMode::Default,
            &EvalContext::default(),
        )
        .expect("kernel");

        let data = [1i32, 2, 3];
        let mut var = [0u8; 16];
        // SAFETY: var is zeroed var dimension data; data is 3 * int32.
        unsafe {
            write_var(var.as_mut_ptr(), std::ptr::null_mut(), 0);
            ckb.single(0, var.as_mut_ptr(), &[data.as_ptr().cast()]).expect("run");
            let (begin, size) = read_var(var.as_ptr());
            assert_eq!(size, 3);
            assert!(!begin.is_null());
            assert_eq!(begin.cast::<f64>().add(2).read_unaligned(), 3.0);
            assert_eq!(
                dst.data_to_string(dst_am.as_bytes(), var.as_ptr()).expect("print"),
                "[1, 2, 3]"
            );
        }
        let block = read_blockref(dst_am.as_bytes(), 0);
        assert!(global_arena().pod_allocated_bytes(block).expect("bytes") >= 24);
    }

    #[test]
    fn test_index_var_dim_checked_at_invoke() {
        let tp = Type::var_dim(int32()).expect("var");
        let am = Arrmeta::default_construct(&tp, &[], true).expect("arrmeta");
        let mut ckb = KernelBuilder::new();
        let step = make_index_kernel(&mut ckb, 0, &tp, am.as_bytes(), &[5], KernelRequest::Single)
            .expect("index");
        assert_eq!(step.dst_type, int32());
        assert_eq!(step.arrmeta_offset, 24);

        let mut values = [4i32, 5];
        let mut var = [0u8; 16];
        // SAFETY: var describes the two values above.
        unsafe {
            write_var(var.as_mut_ptr(), values.as_mut_ptr().cast(), 2);
            let err = ckb.project(0, var.as_ptr()).unwrap_err();
            assert!(matches!(err, Error::IndexOutOfBounds { index: 5, dim_size: 2 }));
        }
    }

    #[test]
    fn test_debug_print_nests() {
        let tp = Type::var_dim(Type::string(crate::string_encodings::StringEncoding::Utf8))
            .expect("var");
        let am = Arrmeta::default_construct(&tp, &[], true).expect("arrmeta");
        let s = am.debug_string();
        assert!(s.contains("var_dim arrmeta"));
        assert!(s.contains("stride: 16"));
        assert!(s.contains("string arrmeta"));
    }
}
