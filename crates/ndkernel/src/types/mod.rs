// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime type descriptors.
//!
//! A [`Type`] is an immutable, `Arc`-shared description of how one array
//! element is laid out in memory and which arrmeta accompanies it. Every
//! descriptor is one variant of a closed family:
//!
//! | Variant        | Syntax                                   |
//! |----------------|------------------------------------------|
//! | builtin        | `int32`, `float64`, `complex[float32]`   |
//! | fixed bytes    | `bytes[16]`, `bytes[8, align=8]`          |
//! | string         | `string`, `string['utf16']`              |
//! | fixed string   | `fixed_string[10, 'ascii']`              |
//! | time           | `time`, `time[tz='UTC']`                 |
//! | struct         | `{x: int32, y: float64}`                 |
//! | dims           | `3 * T`, `strided * T`, `var * T`        |
//! | expressions    | `view[...]`, `convert[...]`, `property[...]` |
//! | pattern        | `Any`                                    |
//!
//! Behaviour is provided by [`TypeOps`], implemented by each variant
//! struct and reached through an exhaustive `match` on the variant tag.
//!
//! # Example
//!
//! ```rust
//! use ndkernel::types::{BuiltinTypeId, Type};
//!
//! let tp = Type::fixed_dim(3, Type::builtin(BuiltinTypeId::Int32)).unwrap();
//! assert_eq!(tp.to_string(), "3 * int32");
//! assert_eq!(tp.data_size(), 12);
//! assert_eq!(tp.ndim(), 1);
//! ```

mod any;
pub(crate) mod builtin;
mod cstruct;
mod dim;
mod expr;
mod fixed_bytes;
mod parse;
mod registry;
pub(crate) mod string;
pub(crate) mod time;

#[cfg(test)]
mod tests;

pub use any::AnyType;
pub use builtin::{BuiltinType, BuiltinTypeId};
pub use cstruct::{CStructField, CStructType};
pub use dim::{FixedDimType, StridedDimType, VarDimType};
pub use expr::{ConvertType, PropertyType, ViewType};
pub use fixed_bytes::FixedBytesType;
pub use parse::parse_type_with_registry;
pub use registry::{global_registry, TypeRegistry};
pub use string::{FixedStringType, StringType};
pub use time::{time_hmst_type, TimeField, TimeHmst, TimeType, TimeZone};

pub(crate) use string::StringLayout;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use crate::config::{AssignErrorMode, EvalContext};
use crate::error::{Error, Result};
use crate::kernels::{
    AssignRequest, CompareRequest, IndexCursor, KernelBuilder, KernelRequest, Side,
};
use crate::memblock::BlockRef;
use crate::properties::{Callable, PropertyInfo, TypePropertyValue};

// ============================================================================
// Header
// ============================================================================

/// Variant tag of a type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    Builtin(BuiltinTypeId),
    FixedBytes,
    String,
    FixedString,
    Time,
    CStruct,
    FixedDim,
    StridedDim,
    VarDim,
    View,
    Convert,
    Property,
    Any,
}

/// Coarse classification of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Bool,
    Int,
    UInt,
    Real,
    Complex,
    String,
    Bytes,
    Datetime,
    Struct,
    Dim,
    Expression,
    Pattern,
    Custom,
    Void,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKind::Bool => "bool",
            TypeKind::Int => "int",
            TypeKind::UInt => "uint",
            TypeKind::Real => "real",
            TypeKind::Complex => "complex",
            TypeKind::String => "string",
            TypeKind::Bytes => "bytes",
            TypeKind::Datetime => "datetime",
            TypeKind::Struct => "struct",
            TypeKind::Dim => "dim",
            TypeKind::Expression => "expression",
            TypeKind::Pattern => "pattern",
            TypeKind::Custom => "custom",
            TypeKind::Void => "void",
        };
        f.write_str(name)
    }
}

/// Type flag bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeFlags(u32);

impl TypeFlags {
    pub const NONE: TypeFlags = TypeFlags(0);
    /// Values are computed from an operand (view, convert, property).
    pub const EXPRESSION: TypeFlags = TypeFlags(1 << 0);
    /// Arrmeta holds memory block references.
    pub const BLOCKREF: TypeFlags = TypeFlags(1 << 1);
    /// Element data requires destruction.
    pub const DESTRUCTOR: TypeFlags = TypeFlags(1 << 2);
    /// Data size depends on the instance (strided dims).
    pub const VAR_SIZE: TypeFlags = TypeFlags(1 << 3);
    /// Pattern type that cannot hold data.
    pub const SYMBOLIC: TypeFlags = TypeFlags(1 << 4);

    /// Flags a dimension inherits from its element.
    const INHERITED: TypeFlags = TypeFlags(Self::BLOCKREF.0 | Self::DESTRUCTOR.0 | Self::SYMBOLIC.0);

    #[inline]
    pub fn contains(self, other: TypeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn inherited(self) -> TypeFlags {
        TypeFlags(self.0 & Self::INHERITED.0)
    }
}

impl BitOr for TypeFlags {
    type Output = TypeFlags;

    fn bitor(self, rhs: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for TypeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::EXPRESSION, "EXPRESSION"),
            (Self::BLOCKREF, "BLOCKREF"),
            (Self::DESTRUCTOR, "DESTRUCTOR"),
            (Self::VAR_SIZE, "VAR_SIZE"),
            (Self::SYMBOLIC, "SYMBOLIC"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "TypeFlags({})", set.join(" | "))
    }
}

/// Fixed attributes of a descriptor, computed once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeHeader {
    pub type_id: TypeId,
    pub kind: TypeKind,
    /// Bytes per element; `0` for symbolic and instance-sized types.
    pub data_size: usize,
    pub data_alignment: usize,
    pub arrmeta_size: usize,
    pub flags: TypeFlags,
    /// Number of leading dimensions.
    pub ndim: usize,
}

impl TypeHeader {
    pub(crate) fn scalar(
        type_id: TypeId,
        kind: TypeKind,
        data_size: usize,
        data_alignment: usize,
    ) -> Self {
        Self {
            type_id,
            kind,
            data_size,
            data_alignment,
            arrmeta_size: 0,
            flags: TypeFlags::NONE,
            ndim: 0,
        }
    }
}

// ============================================================================
// Behaviour contract
// ============================================================================

/// Operations every type variant provides.
///
/// The arrmeta lifecycle methods have no default: a variant without
/// per-instance state implements them as no-ops. Everything else defaults
/// to scalar behaviour.
pub trait TypeOps {
    fn header(&self) -> TypeHeader;

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result;

    /// Print one element.
    ///
    /// # Safety
    ///
    /// `data` must point to a valid element described by this type and
    /// `arrmeta`.
    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result;

    fn is_expression(&self) -> bool {
        false
    }

    fn is_strided(&self) -> bool {
        false
    }

    fn is_unique_data_owner(&self, _arrmeta: &[u8]) -> bool {
        true
    }

    /// Whether every `src` value is representable in `dst`. Answers only
    /// what this variant knows; `false` otherwise.
    fn is_lossless_assignment(&self, _dst: &Type, _src: &Type) -> bool {
        false
    }

    fn canonical_type(&self, this: &Type) -> Type {
        this.clone()
    }

    fn value_type(&self, this: &Type) -> Type {
        this.clone()
    }

    fn operand_type(&self, this: &Type) -> Type {
        this.clone()
    }

    // ------------------------------------------------------------------
    // Dimensional navigation
    // ------------------------------------------------------------------

    /// Type after stripping `i` leading dimensions. `arrmeta_offset` is
    /// advanced past the arrmeta of every stripped dimension.
    fn type_at_dimension(
        &self,
        this: &Type,
        _arrmeta_offset: &mut usize,
        i: usize,
        total_ndim: usize,
    ) -> Result<Type> {
        if i == 0 {
            Ok(this.clone())
        } else {
            Err(Error::TooManyIndices {
                type_repr: this.to_string(),
                nindices: total_ndim + i,
                ndim: total_ndim,
            })
        }
    }

    /// Index the leading dimension, advancing `arrmeta` and `data`.
    ///
    /// # Safety
    ///
    /// `data` must point to a valid element of this type.
    unsafe fn at_single(
        &self,
        this: &Type,
        _i0: isize,
        _arrmeta: &mut &[u8],
        _data: &mut *const u8,
    ) -> Result<Type> {
        Err(Error::TooManyIndices {
            type_repr: this.to_string(),
            nindices: 1,
            ndim: 0,
        })
    }

    /// Size of the leading dimension.
    ///
    /// # Safety
    ///
    /// `data`, when non-null, must point to a valid element of this type.
    unsafe fn dim_size(&self, this: &Type, _arrmeta: &[u8], _data: *const u8) -> Result<isize> {
        Err(Error::unsupported(
            "Cannot get the leading dimension size of scalar type; dim_size",
            this,
        ))
    }

    /// Fill `out_shape[i..ndim]`; `-1` marks sizes that vary per element.
    ///
    /// # Safety
    ///
    /// `data`, when present, must point to a valid element of this type.
    unsafe fn shape(
        &self,
        _ndim: usize,
        _i: usize,
        _out_shape: &mut [isize],
        _arrmeta: Option<&[u8]>,
        _data: Option<*const u8>,
    ) {
    }

    /// Fill `out_strides[i..]` for strided dimensions.
    fn strides(&self, _i: usize, _out_strides: &mut [isize], _arrmeta: &[u8]) {}

    /// Data size of one element with the given shape.
    fn default_data_size(&self, this: &Type, _shape: &[isize]) -> Result<usize> {
        Ok(this.data_size())
    }

    // ------------------------------------------------------------------
    // Arrmeta lifecycle
    // ------------------------------------------------------------------

    fn arrmeta_default_construct(
        &self,
        arrmeta: &mut [u8],
        shape: &[isize],
        blockref_alloc: bool,
    ) -> Result<()>;

    fn arrmeta_copy_construct(
        &self,
        dst: &mut [u8],
        src: &[u8],
        embedded: Option<BlockRef>,
    ) -> Result<()>;

    fn arrmeta_reset_buffers(&self, arrmeta: &mut [u8]) -> Result<()>;

    fn arrmeta_finalize_buffers(&self, arrmeta: &mut [u8]) -> Result<()>;

    fn arrmeta_destruct(&self, arrmeta: &mut [u8]);

    fn arrmeta_debug_print(
        &self,
        arrmeta: &[u8],
        out: &mut dyn fmt::Write,
        indent: &str,
    ) -> fmt::Result;

    // ------------------------------------------------------------------
    // Kernel construction
    // ------------------------------------------------------------------

    /// Build an assignment kernel where this type plays `side`.
    ///
    /// As destination, an unknown source is handed to the source type.
    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &AssignRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        match side {
            Side::Lhs => req.src_tp.make_assignment_kernel(ckb, offset, req, Side::Rhs),
            Side::Rhs => Err(Error::Unsupported {
                operation: "make_assignment_kernel".to_string(),
                type_repr: format!("{} -> {}", req.src_tp, req.dst_tp),
            }),
        }
    }

    /// Build a comparison kernel where this type plays `side`.
    fn make_comparison_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &CompareRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        match side {
            Side::Lhs => req.src1_tp.make_comparison_kernel(ckb, offset, req, Side::Rhs),
            Side::Rhs => Err(req.not_comparable()),
        }
    }

    /// Build the index projection chain for the indices left in `cursor`.
    ///
    /// Returns the result type, the arrmeta bytes consumed, and the next
    /// free builder offset.
    fn make_index_kernel(
        &self,
        this: &Type,
        ckb: &mut KernelBuilder,
        offset: usize,
        _arrmeta: &[u8],
        cursor: &mut IndexCursor<'_>,
        request: KernelRequest,
    ) -> Result<IndexStep> {
        if cursor.is_empty() {
            let end = ckb.push(offset, request, crate::kernels::KernelUnit::Identity)?;
            return Ok(IndexStep {
                dst_type: this.clone(),
                arrmeta_offset: 0,
                end_offset: end,
            });
        }
        Err(Error::TooManyIndices {
            type_repr: this.to_string(),
            nindices: cursor.depth() + cursor.remaining(),
            ndim: cursor.depth(),
        })
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    fn elwise_property_index(&self, this: &Type, name: &str) -> Result<usize> {
        Err(Error::UnknownProperty {
            type_repr: this.to_string(),
            name: name.to_string(),
        })
    }

    fn elwise_property_type(&self, this: &Type, index: usize) -> Result<PropertyInfo> {
        Err(Error::UnknownProperty {
            type_repr: this.to_string(),
            name: format!("#{}", index),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn make_elwise_property_getter_kernel(
        &self,
        this: &Type,
        _ckb: &mut KernelBuilder,
        _offset: usize,
        _dst_arrmeta: &[u8],
        _src_arrmeta: &[u8],
        _property_index: usize,
        _request: KernelRequest,
        _errmode: AssignErrorMode,
        _ectx: &EvalContext,
    ) -> Result<usize> {
        Err(Error::unsupported("make_elwise_property_getter_kernel", this))
    }

    #[allow(clippy::too_many_arguments)]
    fn make_elwise_property_setter_kernel(
        &self,
        this: &Type,
        _ckb: &mut KernelBuilder,
        _offset: usize,
        _dst_arrmeta: &[u8],
        _property_index: usize,
        _src_arrmeta: &[u8],
        _request: KernelRequest,
        _errmode: AssignErrorMode,
        _ectx: &EvalContext,
    ) -> Result<usize> {
        Err(Error::unsupported("make_elwise_property_setter_kernel", this))
    }

    fn dynamic_type_properties(&self) -> Vec<(&'static str, TypePropertyValue)> {
        Vec::new()
    }

    fn dynamic_array_properties(&self) -> BTreeMap<String, Callable> {
        BTreeMap::new()
    }

    fn dynamic_array_functions(&self) -> BTreeMap<String, Callable> {
        BTreeMap::new()
    }
}

/// Outcome of index kernel construction.
#[derive(Debug, Clone)]
pub struct IndexStep {
    /// Type of the projected element.
    pub dst_type: Type,
    /// Bytes of source arrmeta consumed; the projected element's arrmeta
    /// starts here.
    pub arrmeta_offset: usize,
    /// Next free builder offset.
    pub end_offset: usize,
}

// ============================================================================
// Type handle
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TypeVariant {
    Builtin(BuiltinType),
    FixedBytes(FixedBytesType),
    String(StringType),
    FixedString(FixedStringType),
    Time(TimeType),
    CStruct(CStructType),
    FixedDim(FixedDimType),
    StridedDim(StridedDimType),
    VarDim(VarDimType),
    View(ViewType),
    Convert(ConvertType),
    Property(PropertyType),
    Any(AnyType),
}

/// Dispatch on the variant tag.
macro_rules! dispatch {
    ($tp:expr, $t:ident => $body:expr) => {
        match &$tp.0.variant {
            TypeVariant::Builtin($t) => $body,
            TypeVariant::FixedBytes($t) => $body,
            TypeVariant::String($t) => $body,
            TypeVariant::FixedString($t) => $body,
            TypeVariant::Time($t) => $body,
            TypeVariant::CStruct($t) => $body,
            TypeVariant::FixedDim($t) => $body,
            TypeVariant::StridedDim($t) => $body,
            TypeVariant::VarDim($t) => $body,
            TypeVariant::View($t) => $body,
            TypeVariant::Convert($t) => $body,
            TypeVariant::Property($t) => $body,
            TypeVariant::Any($t) => $body,
        }
    };
}

struct TypeInner {
    header: TypeHeader,
    variant: TypeVariant,
}

/// Shared handle to an immutable type descriptor.
#[derive(Clone)]
pub struct Type(Arc<TypeInner>);

impl Type {
    pub(crate) fn from_variant(variant: TypeVariant) -> Type {
        let header = match &variant {
            TypeVariant::Builtin(t) => t.header(),
            TypeVariant::FixedBytes(t) => t.header(),
            TypeVariant::String(t) => t.header(),
            TypeVariant::FixedString(t) => t.header(),
            TypeVariant::Time(t) => t.header(),
            TypeVariant::CStruct(t) => t.header(),
            TypeVariant::FixedDim(t) => t.header(),
            TypeVariant::StridedDim(t) => t.header(),
            TypeVariant::VarDim(t) => t.header(),
            TypeVariant::View(t) => t.header(),
            TypeVariant::Convert(t) => t.header(),
            TypeVariant::Property(t) => t.header(),
            TypeVariant::Any(t) => t.header(),
        };
        Type(Arc::new(TypeInner { header, variant }))
    }

    pub(crate) fn variant(&self) -> &TypeVariant {
        &self.0.variant
    }

    // ------------------------------------------------------------------
    // Header accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn header(&self) -> &TypeHeader {
        &self.0.header
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.0.header.type_id
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.0.header.kind
    }

    #[inline]
    pub fn data_size(&self) -> usize {
        self.0.header.data_size
    }

    #[inline]
    pub fn data_alignment(&self) -> usize {
        self.0.header.data_alignment
    }

    #[inline]
    pub fn arrmeta_size(&self) -> usize {
        self.0.header.arrmeta_size
    }

    #[inline]
    pub fn flags(&self) -> TypeFlags {
        self.0.header.flags
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.0.header.ndim
    }

    #[inline]
    pub fn is_builtin(&self) -> bool {
        matches!(self.0.variant, TypeVariant::Builtin(_))
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.ndim() == 0
    }

    #[inline]
    pub fn is_symbolic(&self) -> bool {
        self.flags().contains(TypeFlags::SYMBOLIC)
    }

    /// Plain bytes: no arrmeta, no references, fixed size.
    #[inline]
    pub fn is_pod(&self) -> bool {
        self.data_size() > 0
            && self.arrmeta_size() == 0
            && !self.flags().contains(TypeFlags::BLOCKREF)
            && !self.is_expression()
            && !self.is_symbolic()
    }

    pub fn builtin_id(&self) -> Option<BuiltinTypeId> {
        match &self.0.variant {
            TypeVariant::Builtin(b) => Some(b.id),
            _ => None,
        }
    }

    /// Element type of a dimension, `None` for scalars.
    pub fn element_type(&self) -> Option<&Type> {
        match &self.0.variant {
            TypeVariant::FixedDim(d) => Some(&d.element),
            TypeVariant::StridedDim(d) => Some(&d.element),
            TypeVariant::VarDim(d) => Some(&d.element),
            _ => None,
        }
    }

    /// Innermost non-dimension type.
    pub fn dtype(&self) -> Type {
        let mut tp = self;
        while let Some(elem) = tp.element_type() {
            tp = elem;
        }
        tp.clone()
    }

    /// Rebuild the dimension chain around a different innermost type.
    pub fn with_replaced_dtype(&self, dtype: Type) -> Result<Type> {
        match &self.0.variant {
            TypeVariant::FixedDim(d) => {
                Type::fixed_dim(d.dim_size, d.element.with_replaced_dtype(dtype)?)
            }
            TypeVariant::StridedDim(d) => {
                Ok(Type::strided_dim(d.element.with_replaced_dtype(dtype)?))
            }
            TypeVariant::VarDim(d) => Type::var_dim(d.element.with_replaced_dtype(dtype)?),
            _ => Ok(dtype),
        }
    }

    // ------------------------------------------------------------------
    // Forwarded behaviour
    // ------------------------------------------------------------------

    pub fn is_expression(&self) -> bool {
        dispatch!(self, t => t.is_expression())
    }

    pub fn is_strided(&self) -> bool {
        dispatch!(self, t => t.is_strided())
    }

    pub fn is_unique_data_owner(&self, arrmeta: &[u8]) -> bool {
        dispatch!(self, t => t.is_unique_data_owner(arrmeta))
    }

    pub fn canonical_type(&self) -> Type {
        dispatch!(self, t => t.canonical_type(self))
    }

    /// Type of the values an expression produces; identity otherwise.
    pub fn value_type(&self) -> Type {
        dispatch!(self, t => t.value_type(self))
    }

    /// Type of the stored operand of an expression; identity otherwise.
    pub fn operand_type(&self) -> Type {
        dispatch!(self, t => t.operand_type(self))
    }

    /// Whether assigning any `src` value into `dst` loses nothing.
    pub fn is_lossless_assignment(dst: &Type, src: &Type) -> bool {
        if dst == src {
            return true;
        }
        let by_dst = dispatch!(dst, t => t.is_lossless_assignment(dst, src));
        by_dst || dispatch!(src, t => t.is_lossless_assignment(dst, src))
    }

    /// Print one element.
    ///
    /// # Safety
    ///
    /// `data` must point to a valid element described by this type and
    /// `arrmeta`.
    pub unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        dispatch!(self, t => t.print_data(out, arrmeta, data))
    }

    /// Render one element into a `String`.
    ///
    /// # Safety
    ///
    /// See [`Type::print_data`].
    pub unsafe fn data_to_string(&self, arrmeta: &[u8], data: *const u8) -> Result<String> {
        let mut out = String::new();
        self.print_data(&mut out, arrmeta, data)?;
        Ok(out)
    }

    pub fn type_at_dimension(
        &self,
        arrmeta_offset: &mut usize,
        i: usize,
        total_ndim: usize,
    ) -> Result<Type> {
        dispatch!(self, t => t.type_at_dimension(self, arrmeta_offset, i, total_ndim))
    }

    /// Type after stripping `i` leading dimensions.
    pub fn type_at(&self, i: usize) -> Result<Type> {
        let mut offset = 0;
        self.type_at_dimension(&mut offset, i, 0)
    }

    /// Index the leading dimension, advancing `arrmeta` and `data`.
    ///
    /// # Safety
    ///
    /// `data` must point to a valid element of this type.
    pub unsafe fn at_single(
        &self,
        i0: isize,
        arrmeta: &mut &[u8],
        data: &mut *const u8,
    ) -> Result<Type> {
        dispatch!(self, t => t.at_single(self, i0, arrmeta, data))
    }

    /// # Safety
    ///
    /// `data`, when non-null, must point to a valid element of this type.
    pub unsafe fn dim_size(&self, arrmeta: &[u8], data: *const u8) -> Result<isize> {
        dispatch!(self, t => t.dim_size(self, arrmeta, data))
    }

    /// # Safety
    ///
    /// `data`, when present, must point to a valid element of this type.
    pub unsafe fn shape(
        &self,
        ndim: usize,
        i: usize,
        out_shape: &mut [isize],
        arrmeta: Option<&[u8]>,
        data: Option<*const u8>,
    ) {
        dispatch!(self, t => t.shape(ndim, i, out_shape, arrmeta, data))
    }

    /// Shape of all dimensions as far as the type and arrmeta determine it.
    pub fn shape_from_arrmeta(&self, arrmeta: Option<&[u8]>) -> Vec<isize> {
        let mut out = vec![-1; self.ndim()];
        // SAFETY: no data pointer is supplied.
        unsafe { self.shape(self.ndim(), 0, &mut out, arrmeta, None) };
        out
    }

    pub fn strides(&self, i: usize, out_strides: &mut [isize], arrmeta: &[u8]) {
        dispatch!(self, t => t.strides(i, out_strides, arrmeta))
    }

    pub fn default_data_size(&self, shape: &[isize]) -> Result<usize> {
        dispatch!(self, t => t.default_data_size(self, shape))
    }

    pub fn arrmeta_default_construct(
        &self,
        arrmeta: &mut [u8],
        shape: &[isize],
        blockref_alloc: bool,
    ) -> Result<()> {
        crate::arrmeta::check_len(self, arrmeta)?;
        dispatch!(self, t => t.arrmeta_default_construct(arrmeta, shape, blockref_alloc))
    }

    pub fn arrmeta_copy_construct(
        &self,
        dst: &mut [u8],
        src: &[u8],
        embedded: Option<BlockRef>,
    ) -> Result<()> {
        crate::arrmeta::check_len(self, dst)?;
        crate::arrmeta::check_len(self, src)?;
        dispatch!(self, t => t.arrmeta_copy_construct(dst, src, embedded))
    }

    pub fn arrmeta_reset_buffers(&self, arrmeta: &mut [u8]) -> Result<()> {
        dispatch!(self, t => t.arrmeta_reset_buffers(arrmeta))
    }

    pub fn arrmeta_finalize_buffers(&self, arrmeta: &mut [u8]) -> Result<()> {
        dispatch!(self, t => t.arrmeta_finalize_buffers(arrmeta))
    }

    pub fn arrmeta_destruct(&self, arrmeta: &mut [u8]) {
        dispatch!(self, t => t.arrmeta_destruct(arrmeta))
    }

    pub fn arrmeta_debug_print(
        &self,
        arrmeta: &[u8],
        out: &mut dyn fmt::Write,
        indent: &str,
    ) -> fmt::Result {
        dispatch!(self, t => t.arrmeta_debug_print(arrmeta, out, indent))
    }

    pub(crate) fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &AssignRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        dispatch!(self, t => t.make_assignment_kernel(ckb, offset, req, side))
    }

    pub(crate) fn make_comparison_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &CompareRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        dispatch!(self, t => t.make_comparison_kernel(ckb, offset, req, side))
    }

    pub(crate) fn make_index_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        arrmeta: &[u8],
        cursor: &mut IndexCursor<'_>,
        request: KernelRequest,
    ) -> Result<IndexStep> {
        dispatch!(self, t => t.make_index_kernel(self, ckb, offset, arrmeta, cursor, request))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn make_elwise_property_getter_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        dst_arrmeta: &[u8],
        src_arrmeta: &[u8],
        property_index: usize,
        request: KernelRequest,
        errmode: AssignErrorMode,
        ectx: &EvalContext,
    ) -> Result<usize> {
        dispatch!(self, t => t.make_elwise_property_getter_kernel(
            self, ckb, offset, dst_arrmeta, src_arrmeta, property_index, request, errmode, ectx
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn make_elwise_property_setter_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        dst_arrmeta: &[u8],
        property_index: usize,
        src_arrmeta: &[u8],
        request: KernelRequest,
        errmode: AssignErrorMode,
        ectx: &EvalContext,
    ) -> Result<usize> {
        dispatch!(self, t => t.make_elwise_property_setter_kernel(
            self, ckb, offset, dst_arrmeta, property_index, src_arrmeta, request, errmode, ectx
        ))
    }

    pub fn elwise_property_index(&self, name: &str) -> Result<usize> {
        dispatch!(self, t => t.elwise_property_index(self, name))
    }

    pub fn elwise_property_type(&self, index: usize) -> Result<PropertyInfo> {
        dispatch!(self, t => t.elwise_property_type(self, index))
    }

    /// Named properties of the type itself (e.g. `tz` of a time type).
    pub fn dynamic_type_properties(&self) -> Vec<(&'static str, TypePropertyValue)> {
        dispatch!(self, t => t.dynamic_type_properties())
    }

    /// Named properties of arrays of this type.
    pub fn dynamic_array_properties(&self) -> BTreeMap<String, Callable> {
        dispatch!(self, t => t.dynamic_array_properties())
    }

    /// Named functions of arrays of this type.
    pub fn dynamic_array_functions(&self) -> BTreeMap<String, Callable> {
        dispatch!(self, t => t.dynamic_array_functions())
    }

    /// Look up one type property by name.
    pub fn type_property(&self, name: &str) -> Result<TypePropertyValue> {
        self.dynamic_type_properties()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| Error::UnknownProperty {
                type_repr: self.to_string(),
                name: name.to_string(),
            })
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Type) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.variant == other.0.variant
    }
}

impl Eq for Type {}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, t => t.print_type(f))
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self)
    }
}

impl From<BuiltinTypeId> for Type {
    fn from(id: BuiltinTypeId) -> Type {
        Type::builtin(id)
    }
}

impl std::str::FromStr for Type {
    type Err = Error;

    fn from_str(s: &str) -> Result<Type> {
        parse_type_with_registry(s, global_registry())
    }
}
