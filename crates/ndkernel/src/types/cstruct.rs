// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Struct type with C layout.
//!
//! Field data is placed at increasing offsets padded to each field's
//! alignment; field arrmeta is concatenated in field order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::{Type, TypeFlags, TypeHeader, TypeId, TypeKind, TypeOps, TypeVariant};
use crate::error::{Error, Result};
use crate::kernels::{
    resolve_assignment, AssignRequest, CompareRequest, FieldStep, KernelBuilder, KernelRequest,
    KernelUnit, Side,
};
use crate::memblock::BlockRef;

#[derive(Debug, Clone, PartialEq)]
pub struct CStructField {
    pub name: String,
    pub tp: Type,
    pub data_offset: usize,
    pub arrmeta_offset: usize,
}

impl CStructField {
    fn arrmeta<'a>(&self, arrmeta: &'a [u8]) -> &'a [u8] {
        &arrmeta[self.arrmeta_offset..self.arrmeta_offset + self.tp.arrmeta_size()]
    }

    fn arrmeta_mut<'a>(&self, arrmeta: &'a mut [u8]) -> &'a mut [u8] {
        &mut arrmeta[self.arrmeta_offset..self.arrmeta_offset + self.tp.arrmeta_size()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CStructType {
    fields: Vec<CStructField>,
    data_size: usize,
    data_alignment: usize,
    arrmeta_size: usize,
    flags: TypeFlags,
}

fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

impl CStructType {
    fn layout(fields: Vec<(String, Type)>) -> Self {
        let mut data_offset = 0;
        let mut arrmeta_offset = 0;
        let mut data_alignment = 1;
        let mut flags = TypeFlags::NONE;
        let mut out = Vec::with_capacity(fields.len());
        for (name, tp) in fields {
            let align = tp.data_alignment().max(1);
            data_offset = align_up(data_offset, align);
            data_alignment = data_alignment.max(align);
            flags = flags | tp.flags().inherited();
            let size = tp.data_size();
            let am = tp.arrmeta_size();
            out.push(CStructField {
                name,
                tp,
                data_offset,
                arrmeta_offset,
            });
            data_offset += size;
            arrmeta_offset += am;
        }
        Self {
            fields: out,
            data_size: align_up(data_offset, data_alignment),
            data_alignment,
            arrmeta_size: arrmeta_offset,
            flags,
        }
    }

    pub fn fields(&self) -> &[CStructField] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

impl Type {
    /// Struct of the given fields, laid out in order with C padding.
    pub fn cstruct(fields: Vec<(String, Type)>) -> Result<Type> {
        let mut seen = HashSet::new();
        for (name, tp) in &fields {
            if name.is_empty() || !seen.insert(name.as_str()) {
                return Err(Error::InvalidArgument(format!("invalid or duplicate struct field name '{}'", name)));
            }
            if tp.data_size() == 0 || tp.is_symbolic() || tp.is_expression() {
                return Err(Error::InvalidArgument(format!(
                    "struct field '{}' of type {} has no fixed data layout",
                    name, tp
                )));
            }
        }
        Ok(Type::cstruct_unchecked(fields))
    }

    pub(crate) fn cstruct_unchecked(fields: Vec<(String, Type)>) -> Type {
        Type::from_variant(TypeVariant::CStruct(CStructType::layout(fields)))
    }
}

impl TypeOps for CStructType {
    fn header(&self) -> TypeHeader {
        TypeHeader {
            type_id: TypeId::CStruct,
            kind: TypeKind::Struct,
            data_size: self.data_size,
            data_alignment: self.data_alignment,
            arrmeta_size: self.arrmeta_size,
            flags: self.flags,
            ndim: 0,
        }
    }

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        f.write_char('{')?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", field.name, field.tp)?;
        }
        f.write_char('}')
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        out.write_char('{')?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            write!(out, "{}: ", field.name)?;
            field.tp.print_data(out, field.arrmeta(arrmeta), data.add(field.data_offset))?;
        }
        out.write_char('}')
    }

    fn is_unique_data_owner(&self, arrmeta: &[u8]) -> bool {
        self.fields.iter().all(|f| f.tp.is_unique_data_owner(f.arrmeta(arrmeta)))
    }

    fn is_lossless_assignment(&self, dst: &Type, src: &Type) -> bool {
        let (TypeVariant::CStruct(d), TypeVariant::CStruct(s)) = (dst.variant(), src.variant()) else {
            return false;
        };
        d.fields.len() == s.fields.len()
            && d.fields.iter().all(|df| {
                s.field_index(&df.name)
                    .is_some_and(|j| Type::is_lossless_assignment(&df.tp, &s.fields[j].tp))
            })
    }

    fn arrmeta_default_construct(
        &self,
        arrmeta: &mut [u8],
        shape: &[isize],
        blockref_alloc: bool,
    ) -> Result<()> {
        for (i, field) in self.fields.iter().enumerate() {
            if let Err(e) = field.tp.arrmeta_default_construct(field.arrmeta_mut(arrmeta), shape, blockref_alloc) {
                self.destruct_prefix(arrmeta, i);
                return Err(e);
            }
        }
        Ok(())
    }

    fn arrmeta_copy_construct(
        &self,
        dst: &mut [u8],
        src: &[u8],
        embedded: Option<BlockRef>,
    ) -> Result<()> {
        for (i, field) in self.fields.iter().enumerate() {
            if let Err(e) = field.tp.arrmeta_copy_construct(field.arrmeta_mut(dst), field.arrmeta(src), embedded) {
                self.destruct_prefix(dst, i);
                return Err(e);
            }
        }
        Ok(())
    }

    fn arrmeta_reset_buffers(&self, arrmeta: &mut [u8]) -> Result<()> {
        for field in &self.fields {
            field.tp.arrmeta_reset_buffers(field.arrmeta_mut(arrmeta))?;
        }
        Ok(())
    }

    fn arrmeta_finalize_buffers(&self, arrmeta: &mut [u8]) -> Result<()> {
        for field in &self.fields {
            field.tp.arrmeta_finalize_buffers(field.arrmeta_mut(arrmeta))?;
        }
        Ok(())
    }

    fn arrmeta_destruct(&self, arrmeta: &mut [u8]) {
        self.destruct_prefix(arrmeta, self.fields.len());
    }

    fn arrmeta_debug_print(
        &self,
        arrmeta: &[u8],
        out: &mut dyn fmt::Write,
        indent: &str,
    ) -> fmt::Result {
        writeln!(out, "{}struct arrmeta", indent)?;
        let nested = format!("{}  ", indent);
        for field in &self.fields {
            if field.tp.arrmeta_size() > 0 {
                writeln!(out, "{} field {} ({}):", indent, field.name, field.tp)?;
                field.tp.arrmeta_debug_print(field.arrmeta(arrmeta), out, &nested)?;
            }
        }
        Ok(())
    }

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &AssignRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        if side == Side::Rhs {
            return Err(req.unsupported());
        }
        let TypeVariant::CStruct(src) = req.src_tp.variant() else {
            return req.src_tp.make_assignment_kernel(ckb, offset, req, Side::Rhs);
        };
        if src.fields.len() != self.fields.len() {
            return Err(req.unsupported());
        }

        let mut cur = ckb.push(offset, req.request, KernelUnit::Fieldwise(Arc::from(Vec::new())))?;
        let mut steps = Vec::with_capacity(self.fields.len());
        for df in &self.fields {
            let sf = match src.field_index(&df.name) {
                Some(j) => &src.fields[j],
                None => return Err(req.unsupported()),
            };
            let child = cur;
            let sub = req.with(
                &df.tp,
                df.arrmeta(req.dst_arrmeta),
                &sf.tp,
                sf.arrmeta(req.src_arrmeta),
                KernelRequest::Single,
            );
            cur = resolve_assignment(ckb, child, &sub)?;
            steps.push(FieldStep {
                dst_offset: df.data_offset,
                src_offset: sf.data_offset,
                child,
            });
        }
        if let Some(unit) = ckb.unit_mut(offset) {
            *unit = KernelUnit::Fieldwise(Arc::from(steps));
        }
        Ok(cur)
    }

    fn make_comparison_kernel(
        &self,
        _ckb: &mut KernelBuilder,
        _offset: usize,
        req: &CompareRequest<'_>,
        _side: Side,
    ) -> Result<usize> {
        Err(req.not_comparable())
    }
}

impl CStructType {
    /// Destruct the arrmeta of the first `n` fields, last first.
    fn destruct_prefix(&self, arrmeta: &mut [u8], n: usize) {
        for field in self.fields[..n].iter().rev() {
            field.tp.arrmeta_destruct(field.arrmeta_mut(arrmeta));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrmeta::Arrmeta;
    use crate::config::{AssignErrorMode, EvalContext};
    use crate::kernels::make_assignment_kernel;
    use crate::memblock::global_arena;
    use crate::string_encodings::StringEncoding;
    use crate::types::BuiltinTypeId;

    fn field(name: &str, tp: Type) -> (String, Type) {
        (name.to_string(), tp)
    }

    #[test]
    fn test_layout() {
        let tp = Type::cstruct(vec![
            field("a", Type::builtin(BuiltinTypeId::Int8)),
            field("b", Type::builtin(BuiltinTypeId::Float64)),
            field("c", Type::builtin(BuiltinTypeId::Int16)),
        ])
        .expect("struct");
        assert_eq!((tp.data_size(), tp.data_alignment()), (24, 8));
        let TypeVariant::CStruct(s) = tp.variant() else {
            panic!("not a struct");
        };
        let offsets: Vec<usize> = s.fields().iter().map(|f| f.data_offset).collect();
        assert_eq!(offsets, [0, 8, 16]);
        assert_eq!(tp.to_string(), "{a: int8, b: float64, c: int16}");
        assert!(tp.is_pod());
    }

    #[test]
    fn test_rejects_bad_fields() {
        let dup = Type::cstruct(vec![
            field("a", Type::builtin(BuiltinTypeId::Int8)),
            field("a", Type::builtin(BuiltinTypeId::Int8)),
        ]);
        assert!(matches!(dup, Err(Error::InvalidArgument(_))));
        let any = Type::cstruct(vec![field("x", Type::any())]);
        assert!(any.is_err());
    }

    #[test]
    fn test_arrmeta_with_string_field() {
        let tp = Type::cstruct(vec![
            field("id", Type::builtin(BuiltinTypeId::Int32)),
            field("name", Type::string(StringEncoding::Utf8)),
        ])
        .expect("struct");
        assert!(tp.flags().contains(TypeFlags::BLOCKREF));
        assert!(!tp.is_pod());
        let am = Arrmeta::default_construct(&tp, &[], true).expect("arrmeta");
        let block = crate::arrmeta::read_blockref(am.as_bytes(), 0);
        assert!(am.is_unique_data_owner());
        let copy = am.try_clone().expect("clone");
        assert!(!am.is_unique_data_owner());
        drop(copy);
        assert_eq!(global_arena().use_count(block).expect("live"), 1);
        assert!(am.debug_string().contains("field name"));
        drop(am);
        assert!(global_arena().use_count(block).is_err());
    }

    #[test]
    fn test_fieldwise_assignment_by_name() {
        let dst_tp = Type::cstruct(vec![
            field("x", Type::builtin(BuiltinTypeId::Float64)),
            field("y", Type::builtin(BuiltinTypeId::Int64)),
        ])
        .expect("dst");
        let src_tp = Type::cstruct(vec![
            field("y", Type::builtin(BuiltinTypeId::Int16)),
            field("x", Type::builtin(BuiltinTypeId::Int32)),
        ])
        .expect("src");

        #[repr(C)]
        struct Src {
            y: i16,
            _pad: i16,
            x: i32,
        }
        #[repr(C)]
        #[derive(Default)]
        struct Dst {
            x: f64,
            y: i64,
        }

        let mut ckb = KernelBuilder::new();
        let end = make_assignment_kernel(
            &mut ckb,
            0,
            &dst_tp,
            &[],
            &src_tp,
            &[],
            KernelRequest::Single,
            AssignErrorMode::Default,
            &EvalContext::default(),
        )
        .expect("resolve");
        assert_eq!(end, 3);

        let src = Src { y: -3, _pad: 0, x: 7 };
        let mut dst = Dst::default();
        // SAFETY: Src and Dst match the struct layouts.
        unsafe { ckb.single(0, (&mut dst as *mut Dst).cast(), &[(&src as *const Src).cast()]) }
            .expect("run");
        assert_eq!((dst.x, dst.y), (7.0, -3));

        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let tp = Type::cstruct(vec![field("a", Type::builtin(BuiltinTypeId::UInt8)), field("b", Type::builtin(BuiltinTypeId::Bool))])
            .expect("print");
        // SAFETY: data holds at least two bytes.
        let s = unsafe { tp.data_to_string(&[], data.as_ptr()) }.expect("print");
        assert_eq!(s, "{a: 1, b: True}");
    }

    #[test]
    fn test_mismatched_fields_unsupported() {
        let a = Type::cstruct(vec![field("x", Type::builtin(BuiltinTypeId::Int32))]).expect("a");
        let b = Type::cstruct(vec![field("z", Type::builtin(BuiltinTypeId::Int32))]).expect("b");
        let mut ckb = KernelBuilder::new();
        let r = make_assignment_kernel(
            &mut ckb,
            0,
            &a,
            &[],
            &b,
            &[],
            KernelRequest::Single,
            AssignErrorMode::Default,
            &EvalContext::default(),
        );
        assert!(matches!(r, Err(Error::Unsupported { .. })));
        assert!(ckb.is_empty());
    }
}
