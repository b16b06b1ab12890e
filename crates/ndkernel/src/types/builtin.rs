// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builtin scalar types.
//!
//! Assignment between builtins goes through a [`Scalar`] intermediate:
//! the source is widened to `i64`, `u64`, `f64` or a complex pair, then
//! narrowed into the destination with the checks the error mode asks
//! for (overflow, fractional loss, inexact rounding).

use std::cmp::Ordering;
use std::fmt;

use super::{Type, TypeHeader, TypeId, TypeKind, TypeOps, TypeVariant};
use crate::config::AssignErrorMode;
use crate::error::{Error, Result};
use crate::kernels::{
    AssignRequest, CompareRequest, ComparisonType, KernelBuilder, KernelUnit, Side,
};
use crate::memblock::BlockRef;
use crate::types::StringLayout;

/// Identifier of a builtin scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinTypeId {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    ComplexFloat32,
    ComplexFloat64,
}

impl BuiltinTypeId {
    pub const ALL: [BuiltinTypeId; 13] = [
        BuiltinTypeId::Bool,
        BuiltinTypeId::Int8,
        BuiltinTypeId::Int16,
        BuiltinTypeId::Int32,
        BuiltinTypeId::Int64,
        BuiltinTypeId::UInt8,
        BuiltinTypeId::UInt16,
        BuiltinTypeId::UInt32,
        BuiltinTypeId::UInt64,
        BuiltinTypeId::Float32,
        BuiltinTypeId::Float64,
        BuiltinTypeId::ComplexFloat32,
        BuiltinTypeId::ComplexFloat64,
    ];

    pub fn size(self) -> usize {
        match self {
            BuiltinTypeId::Bool | BuiltinTypeId::Int8 | BuiltinTypeId::UInt8 => 1,
            BuiltinTypeId::Int16 | BuiltinTypeId::UInt16 => 2,
            BuiltinTypeId::Int32 | BuiltinTypeId::UInt32 | BuiltinTypeId::Float32 => 4,
            BuiltinTypeId::Int64
            | BuiltinTypeId::UInt64
            | BuiltinTypeId::Float64
            | BuiltinTypeId::ComplexFloat32 => 8,
            BuiltinTypeId::ComplexFloat64 => 16,
        }
    }

    pub fn alignment(self) -> usize {
        match self {
            BuiltinTypeId::ComplexFloat32 => 4,
            BuiltinTypeId::ComplexFloat64 => 8,
            other => other.size(),
        }
    }

    pub fn kind(self) -> TypeKind {
        match self {
            BuiltinTypeId::Bool => TypeKind::Bool,
            BuiltinTypeId::Int8
            | BuiltinTypeId::Int16
            | BuiltinTypeId::Int32
            | BuiltinTypeId::Int64 => TypeKind::Int,
            BuiltinTypeId::UInt8
            | BuiltinTypeId::UInt16
            | BuiltinTypeId::UInt32
            | BuiltinTypeId::UInt64 => TypeKind::UInt,
            BuiltinTypeId::Float32 | BuiltinTypeId::Float64 => TypeKind::Real,
            BuiltinTypeId::ComplexFloat32 | BuiltinTypeId::ComplexFloat64 => TypeKind::Complex,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinTypeId::Bool => "bool",
            BuiltinTypeId::Int8 => "int8",
            BuiltinTypeId::Int16 => "int16",
            BuiltinTypeId::Int32 => "int32",
            BuiltinTypeId::Int64 => "int64",
            BuiltinTypeId::UInt8 => "uint8",
            BuiltinTypeId::UInt16 => "uint16",
            BuiltinTypeId::UInt32 => "uint32",
            BuiltinTypeId::UInt64 => "uint64",
            BuiltinTypeId::Float32 => "float32",
            BuiltinTypeId::Float64 => "float64",
            BuiltinTypeId::ComplexFloat32 => "complex[float32]",
            BuiltinTypeId::ComplexFloat64 => "complex[float64]",
        }
    }

    /// Look up a builtin by name; accepts a few common aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let id = match name {
            "bool" => BuiltinTypeId::Bool,
            "int8" => BuiltinTypeId::Int8,
            "int16" => BuiltinTypeId::Int16,
            "int32" | "int" => BuiltinTypeId::Int32,
            "int64" => BuiltinTypeId::Int64,
            "uint8" => BuiltinTypeId::UInt8,
            "uint16" => BuiltinTypeId::UInt16,
            "uint32" => BuiltinTypeId::UInt32,
            "uint64" => BuiltinTypeId::UInt64,
            "float32" => BuiltinTypeId::Float32,
            "float64" | "real" => BuiltinTypeId::Float64,
            "complex[float32]" | "complex64" => BuiltinTypeId::ComplexFloat32,
            "complex[float64]" | "complex128" | "complex" => BuiltinTypeId::ComplexFloat64,
            _ => return None,
        };
        Some(id)
    }

    fn int_range(self) -> Option<(i128, i128)> {
        let range = match self {
            BuiltinTypeId::Int8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            BuiltinTypeId::Int16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            BuiltinTypeId::Int32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            BuiltinTypeId::Int64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            BuiltinTypeId::UInt8 => (0, i128::from(u8::MAX)),
            BuiltinTypeId::UInt16 => (0, i128::from(u16::MAX)),
            BuiltinTypeId::UInt32 => (0, i128::from(u32::MAX)),
            BuiltinTypeId::UInt64 => (0, i128::from(u64::MAX)),
            _ => return None,
        };
        Some(range)
    }
}

impl fmt::Display for BuiltinTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Descriptor payload of a builtin scalar type.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinType {
    pub id: BuiltinTypeId,
}

impl Type {
    pub fn builtin(id: BuiltinTypeId) -> Type {
        Type::from_variant(TypeVariant::Builtin(BuiltinType { id }))
    }
}

// ============================================================================
// Scalar intermediate
// ============================================================================

/// Widened value of any builtin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Real(f64),
    Complex(f64, f64),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::UInt(u) => write!(f, "{}", u),
            Scalar::Real(r) => write!(f, "{}", r),
            Scalar::Complex(re, im) => write_complex(f, *re, *im),
        }
    }
}

fn write_complex(f: &mut dyn fmt::Write, re: impl fmt::Display, im: f64) -> fmt::Result {
    if im.is_sign_negative() {
        write!(f, "({} - {}j)", re, -im)
    } else {
        write!(f, "({} + {}j)", re, im)
    }
}

/// Read a builtin value.
///
/// # Safety
///
/// `src` must point to `id.size()` readable bytes.
pub(crate) unsafe fn read_scalar(id: BuiltinTypeId, src: *const u8) -> Scalar {
    match id {
        BuiltinTypeId::Bool => Scalar::Bool(src.read() != 0),
        BuiltinTypeId::Int8 => Scalar::Int(i64::from(src.cast::<i8>().read())),
        BuiltinTypeId::Int16 => Scalar::Int(i64::from(src.cast::<i16>().read_unaligned())),
        BuiltinTypeId::Int32 => Scalar::Int(i64::from(src.cast::<i32>().read_unaligned())),
        BuiltinTypeId::Int64 => Scalar::Int(src.cast::<i64>().read_unaligned()),
        BuiltinTypeId::UInt8 => Scalar::UInt(u64::from(src.read())),
        BuiltinTypeId::UInt16 => Scalar::UInt(u64::from(src.cast::<u16>().read_unaligned())),
        BuiltinTypeId::UInt32 => Scalar::UInt(u64::from(src.cast::<u32>().read_unaligned())),
        BuiltinTypeId::UInt64 => Scalar::UInt(src.cast::<u64>().read_unaligned()),
        BuiltinTypeId::Float32 => Scalar::Real(f64::from(src.cast::<f32>().read_unaligned())),
        BuiltinTypeId::Float64 => Scalar::Real(src.cast::<f64>().read_unaligned()),
        BuiltinTypeId::ComplexFloat32 => {
            let p = src.cast::<f32>();
            Scalar::Complex(f64::from(p.read_unaligned()), f64::from(p.add(1).read_unaligned()))
        }
        BuiltinTypeId::ComplexFloat64 => {
            let p = src.cast::<f64>();
            Scalar::Complex(p.read_unaligned(), p.add(1).read_unaligned())
        }
    }
}

fn overflow(value: Scalar, id: BuiltinTypeId) -> Error {
    Error::invalid_value(value, &id, "overflow")
}

/// Real part of a value bound for a non-complex destination.
fn drop_imaginary(value: Scalar, id: BuiltinTypeId, errmode: AssignErrorMode) -> Result<Scalar> {
    match value {
        Scalar::Complex(re, im) => {
            if im != 0.0 && errmode.checks_overflow() {
                return Err(Error::invalid_value(value, &id, "nonzero imaginary part"));
            }
            Ok(Scalar::Real(re))
        }
        other => Ok(other),
    }
}

/// Narrow to an integer in `id`'s range; `NoCheck` wraps through `as`.
fn to_integer(value: Scalar, id: BuiltinTypeId, errmode: AssignErrorMode) -> Result<i128> {
    let (min, max) = id.int_range().unwrap_or((i128::MIN, i128::MAX));
    let v = match drop_imaginary(value, id, errmode)? {
        Scalar::Bool(b) => i128::from(b),
        Scalar::Int(i) => i128::from(i),
        Scalar::UInt(u) => i128::from(u),
        Scalar::Real(f) | Scalar::Complex(f, _) => {
            if f.is_nan() || f < min as f64 || f > max as f64 {
                if errmode.checks_overflow() {
                    return Err(overflow(value, id));
                }
            } else if errmode.checks_fractional() && f.fract() != 0.0 {
                return Err(Error::invalid_value(value, &id, "fractional part would be lost"));
            }
            f as i128
        }
    };
    if (v < min || v > max) && errmode.checks_overflow() {
        return Err(overflow(value, id));
    }
    Ok(v)
}

fn to_float(
    value: Scalar,
    id: BuiltinTypeId,
    errmode: AssignErrorMode,
    single: bool,
) -> Result<f64> {
    let exact = |f: f64, back: i128, v: i128| -> Result<f64> {
        if errmode.checks_inexact() && back != v {
            return Err(Error::invalid_value(value, &id, "value would be rounded"));
        }
        Ok(f)
    };
    match drop_imaginary(value, id, errmode)? {
        Scalar::Bool(b) => Ok(f64::from(u8::from(b))),
        Scalar::Int(i) => {
            let f = if single { f64::from(i as f32) } else { i as f64 };
            exact(f, f as i128, i128::from(i))
        }
        Scalar::UInt(u) => {
            let f = if single { f64::from(u as f32) } else { u as f64 };
            exact(f, f as i128, i128::from(u))
        }
        Scalar::Real(f) | Scalar::Complex(f, _) => {
            if single && f.is_finite() && f.abs() > f64::from(f32::MAX) {
                if errmode.checks_overflow() {
                    return Err(overflow(value, id));
                }
            } else if single
                && errmode.checks_inexact()
                && !f.is_nan()
                && f64::from(f as f32) != f
            {
                return Err(Error::invalid_value(value, &id, "value would be rounded"));
            }
            Ok(f)
        }
    }
}

fn to_complex(
    value: Scalar,
    id: BuiltinTypeId,
    errmode: AssignErrorMode,
    single: bool,
) -> Result<(f64, f64)> {
    match value {
        Scalar::Complex(re, im) => {
            let re = to_float(Scalar::Real(re), id, errmode, single)?;
            let im = to_float(Scalar::Real(im), id, errmode, single)?;
            Ok((re, im))
        }
        other => Ok((to_float(other, id, errmode, single)?, 0.0)),
    }
}

fn to_bool(value: Scalar, id: BuiltinTypeId, errmode: AssignErrorMode) -> Result<bool> {
    let v = drop_imaginary(value, id, errmode)?;
    let (truthy, exact) = match v {
        Scalar::Bool(b) => (b, true),
        Scalar::Int(i) => (i != 0, i == 0 || i == 1),
        Scalar::UInt(u) => (u != 0, u <= 1),
        Scalar::Real(f) | Scalar::Complex(f, _) => (f != 0.0, f == 0.0 || f == 1.0),
    };
    if !exact && errmode.checks_overflow() {
        return Err(overflow(value, id));
    }
    Ok(truthy)
}

/// Store `value` into a builtin destination.
///
/// # Safety
///
/// `dst` must point to `id.size()` writable bytes.
pub(crate) unsafe fn write_scalar(
    id: BuiltinTypeId,
    dst: *mut u8,
    value: Scalar,
    errmode: AssignErrorMode,
) -> Result<()> {
    let int = |v: Scalar| to_integer(v, id, errmode);
    match id {
        BuiltinTypeId::Bool => dst.write(u8::from(to_bool(value, id, errmode)?)),
        BuiltinTypeId::Int8 => dst.cast::<i8>().write(int(value)? as i8),
        BuiltinTypeId::Int16 => dst.cast::<i16>().write_unaligned(int(value)? as i16),
        BuiltinTypeId::Int32 => dst.cast::<i32>().write_unaligned(int(value)? as i32),
        BuiltinTypeId::Int64 => dst.cast::<i64>().write_unaligned(int(value)? as i64),
        BuiltinTypeId::UInt8 => dst.write(int(value)? as u8),
        BuiltinTypeId::UInt16 => dst.cast::<u16>().write_unaligned(int(value)? as u16),
        BuiltinTypeId::UInt32 => dst.cast::<u32>().write_unaligned(int(value)? as u32),
        BuiltinTypeId::UInt64 => dst.cast::<u64>().write_unaligned(int(value)? as u64),
        BuiltinTypeId::Float32 => {
            let f = to_float(value, id, errmode, true)?;
            dst.cast::<f32>().write_unaligned(f as f32)
        }
        BuiltinTypeId::Float64 => {
            let f = to_float(value, id, errmode, false)?;
            dst.cast::<f64>().write_unaligned(f)
        }
        BuiltinTypeId::ComplexFloat32 => {
            let (re, im) = to_complex(value, id, errmode, true)?;
            let p = dst.cast::<f32>();
            p.write_unaligned(re as f32);
            p.add(1).write_unaligned(im as f32);
        }
        BuiltinTypeId::ComplexFloat64 => {
            let (re, im) = to_complex(value, id, errmode, false)?;
            let p = dst.cast::<f64>();
            p.write_unaligned(re);
            p.add(1).write_unaligned(im);
        }
    }
    Ok(())
}

/// Assign one builtin element to another.
///
/// # Safety
///
/// `dst` and `src` must point to elements of `dst_id` and `src_id`.
pub(crate) unsafe fn assign(
    dst_id: BuiltinTypeId,
    dst: *mut u8,
    src_id: BuiltinTypeId,
    src: *const u8,
    errmode: AssignErrorMode,
) -> Result<()> {
    write_scalar(dst_id, dst, read_scalar(src_id, src), errmode)
}

fn real_part(v: Scalar) -> Scalar {
    match v {
        Scalar::Bool(b) => Scalar::Int(i64::from(b)),
        other => other,
    }
}

fn cmp_real(a: Scalar, b: Scalar) -> Option<Ordering> {
    match (real_part(a), real_part(b)) {
        (Scalar::Int(x), Scalar::Int(y)) => Some(x.cmp(&y)),
        (Scalar::UInt(x), Scalar::UInt(y)) => Some(x.cmp(&y)),
        (Scalar::Int(x), Scalar::UInt(y)) => Some(i128::from(x).cmp(&i128::from(y))),
        (Scalar::UInt(x), Scalar::Int(y)) => Some(i128::from(x).cmp(&i128::from(y))),
        (x, y) => as_f64(x).partial_cmp(&as_f64(y)),
    }
}

fn as_f64(v: Scalar) -> f64 {
    match v {
        Scalar::Bool(b) => f64::from(u8::from(b)),
        Scalar::Int(i) => i as f64,
        Scalar::UInt(u) => u as f64,
        Scalar::Real(f) | Scalar::Complex(f, _) => f,
    }
}

/// NaN-last total order used by `SortingLess`.
fn sorting_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Compare two builtin elements.
///
/// # Safety
///
/// `a` and `b` must point to elements of `a_id` and `b_id`.
pub(crate) unsafe fn compare(
    a_id: BuiltinTypeId,
    a: *const u8,
    b_id: BuiltinTypeId,
    b: *const u8,
    comparison: ComparisonType,
) -> bool {
    let (x, y) = (read_scalar(a_id, a), read_scalar(b_id, b));
    let complex = matches!(x, Scalar::Complex(..)) || matches!(y, Scalar::Complex(..));
    let imag = |v: Scalar| match v {
        Scalar::Complex(_, im) => im,
        _ => 0.0,
    };
    if comparison == ComparisonType::SortingLess {
        let ord = match cmp_real(x, y) {
            Some(ord) if !complex => ord,
            _ => sorting_cmp(as_f64(x), as_f64(y)).then_with(|| sorting_cmp(imag(x), imag(y))),
        };
        return ord == Ordering::Less;
    }
    if complex {
        let equal = as_f64(x) == as_f64(y) && imag(x) == imag(y);
        return if comparison == ComparisonType::Equal { equal } else { !equal };
    }
    comparison.holds(cmp_real(x, y))
}

/// Parse text into a builtin destination.
///
/// # Safety
///
/// `dst` must point to `id.size()` writable bytes.
pub(crate) unsafe fn parse_into(
    id: BuiltinTypeId,
    dst: *mut u8,
    text: &str,
    errmode: AssignErrorMode,
) -> Result<()> {
    let s = text.trim();
    let value = match id.kind() {
        TypeKind::Bool => match s {
            "True" | "true" | "1" => Scalar::Bool(true),
            "False" | "false" | "0" => Scalar::Bool(false),
            _ => return Err(Error::invalid_value(format!("\"{}\"", s), &id, "not a boolean")),
        },
        TypeKind::Int | TypeKind::UInt => {
            if let Ok(i) = s.parse::<i64>() {
                Scalar::Int(i)
            } else if let Ok(u) = s.parse::<u64>() {
                Scalar::UInt(u)
            } else {
                return Err(Error::invalid_value(format!("\"{}\"", s), &id, "not an integer"));
            }
        }
        TypeKind::Real => match s.parse::<f64>() {
            Ok(f) => Scalar::Real(f),
            Err(_) => return Err(Error::invalid_value(format!("\"{}\"", s), &id, "not a number")),
        },
        _ => return Err(Error::unsupported("parsing strings", &id)),
    };
    write_scalar(id, dst, value, errmode)
}

/// Whether every `src` value fits in `dst` exactly.
pub(crate) fn is_lossless(dst: BuiltinTypeId, src: BuiltinTypeId) -> bool {
    use TypeKind::{Complex, Int, Real, UInt};
    if dst == src || src == BuiltinTypeId::Bool {
        return true;
    }
    let (ds, ss) = (dst.size(), src.size());
    match (dst.kind(), src.kind()) {
        (Int, Int) | (UInt, UInt) | (Real, Real) | (Complex, Complex) => ds >= ss,
        (Int, UInt) => ds > ss,
        (Real, Int) | (Real, UInt) => ss * 2 <= ds,
        (Complex, Int) | (Complex, UInt) => ss * 4 <= ds,
        (Complex, Real) => ds / 2 >= ss,
        _ => false,
    }
}

// ============================================================================
// TypeOps
// ============================================================================

impl TypeOps for BuiltinType {
    fn header(&self) -> TypeHeader {
        TypeHeader::scalar(TypeId::Builtin(self.id), self.id.kind(), self.id.size(), self.id.alignment())
    }

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        f.write_str(self.id.name())
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        _arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        match self.id {
            BuiltinTypeId::Float32 => write!(out, "{}", data.cast::<f32>().read_unaligned()),
            BuiltinTypeId::ComplexFloat32 => {
                let p = data.cast::<f32>();
                write_complex(out, p.read_unaligned(), f64::from(p.add(1).read_unaligned()))
            }
            id => write!(out, "{}", read_scalar(id, data)),
        }
    }

    fn is_lossless_assignment(&self, dst: &Type, src: &Type) -> bool {
        match (dst.builtin_id(), src.builtin_id()) {
            (Some(d), Some(s)) => is_lossless(d, s),
            _ => false,
        }
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
        match side {
            Side::Lhs => {
                if let Some(src_id) = req.src_tp.builtin_id() {
                    let unit = if src_id == self.id {
                        KernelUnit::Copy { size: self.id.size() }
                    } else {
                        KernelUnit::BuiltinAssign {
                            dst: self.id,
                            src: src_id,
                            errmode: req.errmode,
                        }
                    };
                    return ckb.push(offset, req.request, unit);
                }
                if let Some(src) = StringLayout::of(req.src_tp) {
                    return ckb.push(
                        offset,
                        req.request,
                        KernelUnit::StringToBuiltin {
                            dst: self.id,
                            src,
                            errmode: req.errmode,
                        },
                    );
                }
                req.src_tp.make_assignment_kernel(ckb, offset, req, Side::Rhs)
            }
            Side::Rhs => Err(req.unsupported()),
        }
    }

    fn make_comparison_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &CompareRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        match side {
            Side::Lhs => match req.src1_tp.builtin_id() {
                Some(rhs) => {
                    let complex = self.id.kind() == TypeKind::Complex || rhs.kind() == TypeKind::Complex;
                    if complex && !req.comparison.is_equality() && req.comparison != ComparisonType::SortingLess {
                        return Err(req.not_comparable());
                    }
                    ckb.push(
                        offset,
                        req.request,
                        KernelUnit::BuiltinCompare {
                            lhs: self.id,
                            rhs,
                            comparison: req.comparison,
                        },
                    )
                }
                None => req.src1_tp.make_comparison_kernel(ckb, offset, req, Side::Rhs),
            },
            Side::Rhs => Err(req.not_comparable()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assign_value<S: Copy, D: Copy + Default>(
        dst_id: BuiltinTypeId,
        src_id: BuiltinTypeId,
        src: S,
        errmode: AssignErrorMode,
    ) -> Result<D> {
        let mut dst = D::default();
        // SAFETY: both locals match the ids' sizes in every call below.
        unsafe {
            assign(
                dst_id,
                (&mut dst as *mut D).cast(),
                src_id,
                (&src as *const S).cast(),
                errmode,
            )?;
        }
        Ok(dst)
    }

    #[test]
    fn test_int32_to_int8_overflow() {
        let err = assign_value::<i32, i8>(BuiltinTypeId::Int8, BuiltinTypeId::Int32, 300, AssignErrorMode::Overflow)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { ref value, ref type_repr, .. } if value == "300" && type_repr == "int8"));

        let wrapped: i8 =
            assign_value(BuiltinTypeId::Int8, BuiltinTypeId::Int32, 300i32, AssignErrorMode::NoCheck).expect("nocheck");
        assert_eq!(wrapped, 44);
    }

    #[test]
    fn test_float_to_int_fractional() {
        let r = assign_value::<f64, i32>(BuiltinTypeId::Int32, BuiltinTypeId::Float64, 2.5, AssignErrorMode::Fractional);
        assert!(r.is_err());
        let v: i32 =
            assign_value(BuiltinTypeId::Int32, BuiltinTypeId::Float64, 2.5f64, AssignErrorMode::Overflow).expect("overflow");
        assert_eq!(v, 2);
    }

    #[test]
    fn test_inexact_float32() {
        let r = assign_value::<f64, f32>(BuiltinTypeId::Float32, BuiltinTypeId::Float64, 0.1, AssignErrorMode::Inexact);
        assert!(r.is_err());
        let v: f32 = assign_value(BuiltinTypeId::Float32, BuiltinTypeId::Float64, 0.5f64, AssignErrorMode::Inexact)
            .expect("exact");
        assert_eq!(v, 0.5);
        let big = assign_value::<i32, f32>(BuiltinTypeId::Float32, BuiltinTypeId::Int32, 16_777_217, AssignErrorMode::Inexact);
        assert!(big.is_err());
    }

    #[test]
    fn test_negative_to_unsigned() {
        let r = assign_value::<i16, u16>(BuiltinTypeId::UInt16, BuiltinTypeId::Int16, -1, AssignErrorMode::Overflow);
        assert!(r.is_err());
        let v: u16 = assign_value(BuiltinTypeId::UInt16, BuiltinTypeId::Int16, -1i16, AssignErrorMode::NoCheck)
            .expect("nocheck");
        assert_eq!(v, u16::MAX);
    }

    #[test]
    fn test_bool_assignment() {
        let v: u8 = assign_value(BuiltinTypeId::Bool, BuiltinTypeId::Int32, 1i32, AssignErrorMode::Overflow).expect("one");
        assert_eq!(v, 1);
        assert!(assign_value::<i32, u8>(BuiltinTypeId::Bool, BuiltinTypeId::Int32, 2, AssignErrorMode::Overflow).is_err());
    }

    #[test]
    fn test_complex_to_real() {
        let src = [1.5f64, 0.0];
        let v: f64 = assign_value(BuiltinTypeId::Float64, BuiltinTypeId::ComplexFloat64, src, AssignErrorMode::Overflow)
            .expect("real complex");
        assert_eq!(v, 1.5);
        let src = [1.5f64, 2.0];
        assert!(
            assign_value::<[f64; 2], f64>(BuiltinTypeId::Float64, BuiltinTypeId::ComplexFloat64, src, AssignErrorMode::Overflow)
                .is_err()
        );
    }

    #[test]
    fn test_compare_mixed_signedness() {
        let a = -1i32;
        let b = 1u64;
        // SAFETY: locals match the ids.
        let lt = unsafe {
            compare(
                BuiltinTypeId::Int32,
                (&a as *const i32).cast(),
                BuiltinTypeId::UInt64,
                (&b as *const u64).cast(),
                ComparisonType::LessThan,
            )
        };
        assert!(lt);
    }

    #[test]
    fn test_sorting_less_nan_last() {
        let nan = f64::NAN;
        let one = 1.0f64;
        let p = |v: &f64| (v as *const f64).cast::<u8>();
        // SAFETY: locals are float64.
        unsafe {
            assert!(compare(BuiltinTypeId::Float64, p(&one), BuiltinTypeId::Float64, p(&nan), ComparisonType::SortingLess));
            assert!(!compare(BuiltinTypeId::Float64, p(&nan), BuiltinTypeId::Float64, p(&one), ComparisonType::SortingLess));
            assert!(!compare(BuiltinTypeId::Float64, p(&nan), BuiltinTypeId::Float64, p(&nan), ComparisonType::Equal));
            assert!(compare(BuiltinTypeId::Float64, p(&nan), BuiltinTypeId::Float64, p(&nan), ComparisonType::NotEqual));
        }
    }

    #[test]
    fn test_lossless_table() {
        assert!(is_lossless(BuiltinTypeId::Int64, BuiltinTypeId::Int32));
        assert!(!is_lossless(BuiltinTypeId::Int32, BuiltinTypeId::Int64));
        assert!(is_lossless(BuiltinTypeId::Int32, BuiltinTypeId::UInt16));
        assert!(!is_lossless(BuiltinTypeId::Int32, BuiltinTypeId::UInt32));
        assert!(is_lossless(BuiltinTypeId::Float64, BuiltinTypeId::Int32));
        assert!(!is_lossless(BuiltinTypeId::Float32, BuiltinTypeId::Int32));
        assert!(is_lossless(BuiltinTypeId::ComplexFloat64, BuiltinTypeId::Float64));
        assert!(!is_lossless(BuiltinTypeId::Bool, BuiltinTypeId::Int8));
    }

    #[test]
    fn test_parse_into() {
        let mut v = 0i16;
        // SAFETY: v is an int16.
        unsafe {
            parse_into(BuiltinTypeId::Int16, (&mut v as *mut i16).cast(), " -12 ", AssignErrorMode::Fractional)
                .expect("parse");
        }
        assert_eq!(v, -12);
        let mut b = 0u8;
        // SAFETY: b is a bool byte.
        let r = unsafe { parse_into(BuiltinTypeId::Bool, &mut b, "maybe", AssignErrorMode::Fractional) };
        assert!(r.is_err());
    }

    #[test]
    fn test_print_data() {
        let tp = Type::builtin(BuiltinTypeId::ComplexFloat64);
        let v = [1.5f64, -2.0];
        // SAFETY: v is a complex[float64].
        let s = unsafe { tp.data_to_string(&[], v.as_ptr().cast()) }.expect("print");
        assert_eq!(s, "(1.5 - 2j)");

        let tp = Type::builtin(BuiltinTypeId::Float32);
        let f = 0.1f32;
        // SAFETY: f is a float32.
        let s = unsafe { tp.data_to_string(&[], (&f as *const f32).cast()) }.expect("print");
        assert_eq!(s, "0.1");
    }
}
