// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Kernel construction.
//!
//! Given concrete types and arrmeta, the entry points in this module
//! resolve an operation (assignment, comparison, property access,
//! indexing) into a chain of [`KernelUnit`]s appended to a
//! [`KernelBuilder`]. Each entry point takes the offset at which to place
//! its root unit and returns the next free offset. Dimension types place
//! one unit for the dimension and recurse into their element at the
//! following offset.
//!
//! On any resolve-time failure the builder is truncated back to the
//! length it had on entry, so no partial chain survives.
//!
//! # Example
//!
//! ```rust
//! use ndkernel::config::{AssignErrorMode, EvalContext};
//! use ndkernel::kernels::{make_assignment_kernel, KernelBuilder, KernelRequest};
//! use ndkernel::types::{BuiltinTypeId, Type};
//!
//! let dst_tp = Type::builtin(BuiltinTypeId::Float64);
//! let src_tp = Type::builtin(BuiltinTypeId::Int32);
//! let mut ckb = KernelBuilder::new();
//! make_assignment_kernel(
//!     &mut ckb, 0, &dst_tp, &[], &src_tp, &[],
//!     KernelRequest::Single, AssignErrorMode::Default, &EvalContext::default(),
//! ).unwrap();
//!
//! let src = 7i32;
//! let mut dst = 0f64;
//! unsafe {
//!     ckb.single(0, (&mut dst as *mut f64).cast(), &[(&src as *const i32).cast()]).unwrap();
//! }
//! assert_eq!(dst, 7.0);
//! ```

mod builder;
mod unit;


pub use builder::KernelBuilder;

pub(crate) use builder::read_var;
#[cfg(test)]
pub(crate) use builder::write_var;
pub(crate) use unit::{
    ChainUnit, DimAssign, DimSource, DimTarget, FieldStep, KernelUnit, TempBuffer,
};

use std::cmp::Ordering;
use std::fmt;

use crate::arrmeta::check_len;
use crate::config::{AssignErrorMode, EvalContext};
use crate::error::{Error, Result};
use crate::types::{IndexStep, Type};

/// Invocation form a kernel unit is instantiated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelRequest {
    /// One element per call.
    Single,
    /// `count` elements per call, at the given strides.
    Strided,
}

/// Comparison a comparison kernel evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonType {
    LessThan,
    LessEqual,
    Equal,
    NotEqual,
    GreaterEqual,
    GreaterThan,
    /// Strict weak ordering for sorting; NaN sorts last.
    SortingLess,
}

impl ComparisonType {
    /// Evaluate against an ordering; `None` means unordered (NaN).
    #[inline]
    pub(crate) fn holds(self, ord: Option<Ordering>) -> bool {
        let Some(ord) = ord else {
            return self == ComparisonType::NotEqual;
        };
        match self {
            ComparisonType::LessThan | ComparisonType::SortingLess => ord == Ordering::Less,
            ComparisonType::LessEqual => ord != Ordering::Greater,
            ComparisonType::Equal => ord == Ordering::Equal,
            ComparisonType::NotEqual => ord != Ordering::Equal,
            ComparisonType::GreaterEqual => ord != Ordering::Less,
            ComparisonType::GreaterThan => ord == Ordering::Greater,
        }
    }

    /// Whether only equality information is needed.
    #[inline]
    pub(crate) fn is_equality(self) -> bool {
        matches!(self, ComparisonType::Equal | ComparisonType::NotEqual)
    }
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            ComparisonType::LessThan => "<",
            ComparisonType::LessEqual => "<=",
            ComparisonType::Equal => "==",
            ComparisonType::NotEqual => "!=",
            ComparisonType::GreaterEqual => ">=",
            ComparisonType::GreaterThan => ">",
            ComparisonType::SortingLess => "sorting_less",
        };
        f.write_str(op)
    }
}

/// Role of a type in a binary kernel: destination (or first operand) on
/// the left, source (or second operand) on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lhs,
    Rhs,
}

/// Inputs of assignment kernel resolution.
#[derive(Clone, Copy)]
pub struct AssignRequest<'a> {
    pub dst_tp: &'a Type,
    pub dst_arrmeta: &'a [u8],
    pub src_tp: &'a Type,
    pub src_arrmeta: &'a [u8],
    pub request: KernelRequest,
    /// Already resolved against the evaluation context; never `Default`.
    pub errmode: AssignErrorMode,
    pub ectx: &'a EvalContext,
}

impl<'a> AssignRequest<'a> {
    /// Same settings, different operands.
    pub(crate) fn with<'b>(
        &self,
        dst_tp: &'b Type,
        dst_arrmeta: &'b [u8],
        src_tp: &'b Type,
        src_arrmeta: &'b [u8],
        request: KernelRequest,
    ) -> AssignRequest<'b>
    where
        'a: 'b,
    {
        AssignRequest {
            dst_tp,
            dst_arrmeta,
            src_tp,
            src_arrmeta,
            request,
            errmode: self.errmode,
            ectx: self.ectx,
        }
    }

    pub(crate) fn unsupported(&self) -> Error {
        Error::Unsupported {
            operation: "make_assignment_kernel".to_string(),
            type_repr: format!("{} -> {}", self.src_tp, self.dst_tp),
        }
    }
}

/// Inputs of comparison kernel resolution.
#[derive(Clone, Copy)]
pub struct CompareRequest<'a> {
    pub src0_tp: &'a Type,
    pub src0_arrmeta: &'a [u8],
    pub src1_tp: &'a Type,
    pub src1_arrmeta: &'a [u8],
    pub comparison: ComparisonType,
    pub request: KernelRequest,
    pub ectx: &'a EvalContext,
}

impl CompareRequest<'_> {
    pub(crate) fn not_comparable(&self) -> Error {
        Error::NotComparable {
            lhs: self.src0_tp.to_string(),
            rhs: self.src1_tp.to_string(),
            comparison: self.comparison,
        }
    }
}

// ============================================================================
// Index cursor
// ============================================================================

/// Remaining indices threaded through index kernel construction.
#[derive(Debug, Clone)]
pub struct IndexCursor<'a> {
    indices: &'a [isize],
    pos: usize,
}

impl<'a> IndexCursor<'a> {
    pub fn new(indices: &'a [isize]) -> Self {
        Self { indices, pos: 0 }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.indices.len()
    }

    /// Indices not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.indices.len() - self.pos
    }

    /// Indices consumed so far.
    #[inline]
    pub fn depth(&self) -> usize {
        self.pos
    }

    /// Consume the next index.
    pub fn next_index(&mut self) -> Option<isize> {
        let i = self.indices.get(self.pos).copied()?;
        self.pos += 1;
        Some(i)
    }
}

/// Wrap a negative index once and check it against `dim_size`.
pub fn apply_single_index(index: isize, dim_size: isize) -> Result<isize> {
    let wrapped = if index < 0 { index + dim_size } else { index };
    if wrapped < 0 || wrapped >= dim_size {
        return Err(Error::IndexOutOfBounds { index, dim_size });
    }
    Ok(wrapped)
}

// ============================================================================
// Entry points
// ============================================================================

fn truncate_on_error<T>(
    ckb: &mut KernelBuilder,
    mark: usize,
    what: &str,
    result: Result<T>,
) -> Result<T> {
    if let Err(e) = &result {
        log::debug!("[kernels] {} failed: {}", what, e);
        ckb.truncate(mark);
    }
    result
}

/// Build a kernel assigning `src_tp` values into `dst_tp`.
#[allow(clippy::too_many_arguments)]
pub fn make_assignment_kernel(
    ckb: &mut KernelBuilder,
    offset: usize,
    dst_tp: &Type,
    dst_arrmeta: &[u8],
    src_tp: &Type,
    src_arrmeta: &[u8],
    request: KernelRequest,
    errmode: AssignErrorMode,
    ectx: &EvalContext,
) -> Result<usize> {
    check_len(dst_tp, dst_arrmeta)?;
    check_len(src_tp, src_arrmeta)?;
    let req = AssignRequest {
        dst_tp,
        dst_arrmeta,
        src_tp,
        src_arrmeta,
        request,
        errmode: ectx.resolve(errmode),
        ectx,
    };
    log::debug!(
        "[kernels] assignment {} <- {} ({:?}, errmode={})",
        dst_tp,
        src_tp,
        request,
        req.errmode
    );
    let mark = ckb.len();
    let result = resolve_assignment(ckb, offset, &req);
    truncate_on_error(ckb, mark, "assignment", result)
}

/// Dispatch an assignment to the variant responsible for it.
pub(crate) fn resolve_assignment(
    ckb: &mut KernelBuilder,
    offset: usize,
    req: &AssignRequest<'_>,
) -> Result<usize> {
    let (dst_tp, src_tp) = (req.dst_tp, req.src_tp);
    if dst_tp.ndim() > 0 {
        return dst_tp.make_assignment_kernel(ckb, offset, req, Side::Lhs);
    }
    if src_tp.ndim() > 0 {
        return Err(Error::Broadcast {
            dst_shape: "()".to_string(),
            src_shape: format_shape(&src_tp.shape_from_arrmeta(Some(req.src_arrmeta))),
        });
    }
    if dst_tp.is_expression() {
        return dst_tp.make_assignment_kernel(ckb, offset, req, Side::Lhs);
    }
    if src_tp.is_expression() {
        return src_tp.make_assignment_kernel(ckb, offset, req, Side::Rhs);
    }
    if dst_tp == src_tp && dst_tp.is_pod() {
        return ckb.push(
            offset,
            req.request,
            KernelUnit::Copy {
                size: dst_tp.data_size(),
            },
        );
    }
    dst_tp.make_assignment_kernel(ckb, offset, req, Side::Lhs)
}

pub(crate) fn format_shape(shape: &[isize]) -> String {
    let dims: Vec<String> = shape
        .iter()
        .map(|&n| if n < 0 { "var".to_string() } else { n.to_string() })
        .collect();
    format!("({})", dims.join(", "))
}

/// Build a kernel comparing `src0_tp` against `src1_tp`.
///
/// The kernel writes one `bool` byte to its destination.
#[allow(clippy::too_many_arguments)]
pub fn make_comparison_kernel(
    ckb: &mut KernelBuilder,
    offset: usize,
    src0_tp: &Type,
    src0_arrmeta: &[u8],
    src1_tp: &Type,
    src1_arrmeta: &[u8],
    comparison: ComparisonType,
    request: KernelRequest,
    ectx: &EvalContext,
) -> Result<usize> {
    check_len(src0_tp, src0_arrmeta)?;
    check_len(src1_tp, src1_arrmeta)?;
    let req = CompareRequest {
        src0_tp,
        src0_arrmeta,
        src1_tp,
        src1_arrmeta,
        comparison,
        request,
        ectx,
    };
    log::debug!("[kernels] comparison {} {} {}", src0_tp, comparison, src1_tp);
    let mark = ckb.len();
    let result = if src0_tp.ndim() > 0 || src1_tp.ndim() > 0 || src0_tp.is_symbolic() || src1_tp.is_symbolic() {
        Err(req.not_comparable())
    } else {
        src0_tp.make_comparison_kernel(ckb, offset, &req, Side::Lhs)
    };
    truncate_on_error(ckb, mark, "comparison", result)
}

/// Build a kernel reading elementwise property `property_index` of
/// `src_tp` into a value of the property's type.
#[allow(clippy::too_many_arguments)]
pub fn make_elwise_property_getter_kernel(
    ckb: &mut KernelBuilder,
    offset: usize,
    dst_arrmeta: &[u8],
    src_tp: &Type,
    src_arrmeta: &[u8],
    property_index: usize,
    request: KernelRequest,
    errmode: AssignErrorMode,
    ectx: &EvalContext,
) -> Result<usize> {
    check_len(src_tp, src_arrmeta)?;
    let errmode = ectx.resolve(errmode);
    log::debug!(
        "[kernels] property getter #{} of {} (errmode={})",
        property_index,
        src_tp,
        errmode
    );
    let mark = ckb.len();
    let result = src_tp.make_elwise_property_getter_kernel(
        ckb,
        offset,
        dst_arrmeta,
        src_arrmeta,
        property_index,
        request,
        errmode,
        ectx,
    );
    truncate_on_error(ckb, mark, "property getter", result)
}

/// Build a kernel writing elementwise property `property_index` of
/// `dst_tp` from a value of the property's type.
#[allow(clippy::too_many_arguments)]
pub fn make_elwise_property_setter_kernel(
    ckb: &mut KernelBuilder,
    offset: usize,
    dst_tp: &Type,
    dst_arrmeta: &[u8],
    property_index: usize,
    src_arrmeta: &[u8],
    request: KernelRequest,
    errmode: AssignErrorMode,
    ectx: &EvalContext,
) -> Result<usize> {
    check_len(dst_tp, dst_arrmeta)?;
    let errmode = ectx.resolve(errmode);
    log::debug!(
        "[kernels] property setter #{} of {} (errmode={})",
        property_index,
        dst_tp,
        errmode
    );
    let mark = ckb.len();
    let result = dst_tp.make_elwise_property_setter_kernel(
        ckb,
        offset,
        dst_arrmeta,
        property_index,
        src_arrmeta,
        request,
        errmode,
        ectx,
    );
    truncate_on_error(ckb, mark, "property setter", result)
}

/// Build a kernel projecting a data pointer through `indices`.
///
/// The kernel writes the projected element pointer into its destination
/// slot. The returned [`IndexStep`] names the element type and where its
/// arrmeta starts inside `src_arrmeta`.
pub fn make_index_kernel(
    ckb: &mut KernelBuilder,
    offset: usize,
    src_tp: &Type,
    src_arrmeta: &[u8],
    indices: &[isize],
    request: KernelRequest,
) -> Result<IndexStep> {
    check_len(src_tp, src_arrmeta)?;
    log::debug!("[kernels] index {:?} into {}", indices, src_tp);
    let mark = ckb.len();
    let mut cursor = IndexCursor::new(indices);
    let result = src_tp.make_index_kernel(ckb, offset, src_arrmeta, &mut cursor, request);
    truncate_on_error(ckb, mark, "index", result)
}
