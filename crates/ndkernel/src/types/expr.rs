// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Expression types.
//!
//! An expression type stores its operand's bytes and arrmeta but presents
//! a different value type. Reading yields the value; writing goes back
//! through to the operand.
//!
//! - `view[as=V, original=O]` reinterprets plain bytes of equal size.
//! - `convert[to=V, from=O]` converts with the assignment kernels.
//! - `property[operand=O, name='p']` projects an elementwise property.
//!
//! Operands and values are concrete scalars; expressions do not nest.

use std::fmt;

use super::{Type, TypeFlags, TypeHeader, TypeId, TypeKind, TypeOps, TypeVariant};
use crate::config::{runtime_config, AssignErrorMode, EvalContext};
use crate::error::{Error, Result};
use crate::kernels::{
    make_assignment_kernel, resolve_assignment, AssignRequest, ChainUnit, KernelBuilder,
    KernelRequest, KernelUnit, Side, TempBuffer,
};
use crate::memblock::BlockRef;

fn check_scalar(role: &str, tp: &Type) -> Result<()> {
    if tp.ndim() > 0 || tp.is_symbolic() || tp.is_expression() || tp.data_size() == 0 {
        return Err(Error::InvalidArgument(format!(
            "expression {} type must be a concrete scalar, got {}",
            role, tp
        )));
    }
    Ok(())
}

fn expression_header(type_id: TypeId, operand: &Type) -> TypeHeader {
    TypeHeader {
        type_id,
        kind: TypeKind::Expression,
        data_size: operand.data_size(),
        data_alignment: operand.data_alignment(),
        arrmeta_size: operand.arrmeta_size(),
        flags: TypeFlags::EXPRESSION | operand.flags().inherited(),
        ndim: 0,
    }
}

/// Evaluate an expression element into its value type and render it.
unsafe fn evaluate_to_string(this: &Type, arrmeta: &[u8], data: *const u8) -> Result<String> {
    let value = this.value_type();
    let mut temp = TempBuffer::new(&value)?;
    let mut ckb = KernelBuilder::new();
    make_assignment_kernel(
        &mut ckb,
        0,
        &value,
        temp.arrmeta(),
        this,
        arrmeta,
        KernelRequest::Single,
        AssignErrorMode::Default,
        &runtime_config().eval_context(),
    )?;
    let p = temp.data_ptr();
    ckb.single(0, p, &[data])?;
    value.data_to_string(temp.arrmeta(), p)
}

unsafe fn print_value(
    this: &Type,
    out: &mut dyn fmt::Write,
    arrmeta: &[u8],
    data: *const u8,
) -> fmt::Result {
    match evaluate_to_string(this, arrmeta, data) {
        Ok(s) => out.write_str(&s),
        Err(e) => {
            log::debug!("[types] cannot evaluate {} for printing: {}", this, e);
            Err(fmt::Error)
        }
    }
}

/// Place a two-step kernel through a temporary of `temp_tp` at `offset`.
///
/// `first` writes the temporary (placed at `offset + 1`), `second` reads
/// it. Both receive the builder, their offset and the temporary's
/// arrmeta.
fn push_chain(
    ckb: &mut KernelBuilder,
    offset: usize,
    request: KernelRequest,
    temp_tp: &Type,
    first: impl FnOnce(&mut KernelBuilder, usize, &[u8]) -> Result<usize>,
    second: impl FnOnce(&mut KernelBuilder, usize, &[u8]) -> Result<usize>,
) -> Result<usize> {
    let temp = TempBuffer::new(temp_tp)?;
    // Units copy what they need out of arrmeta at resolve time; the
    // buffer itself lives in the chain unit.
    let temp_arrmeta = temp.arrmeta().to_vec();
    ckb.push(offset, request, KernelUnit::Chain(ChainUnit { temp, second: 0 }))?;
    let mid = first(ckb, offset + 1, &temp_arrmeta)?;
    let end = second(ckb, mid, &temp_arrmeta)?;
    if let Some(KernelUnit::Chain(c)) = ckb.unit_mut(offset) {
        c.second = mid;
    }
    Ok(end)
}

macro_rules! forward_arrmeta_ops {
    ($operand:ident) => {
        fn arrmeta_default_construct(
            &self,
            arrmeta: &mut [u8],
            shape: &[isize],
            blockref_alloc: bool,
        ) -> Result<()> {
            self.$operand.arrmeta_default_construct(arrmeta, shape, blockref_alloc)
        }

        fn arrmeta_copy_construct(
            &self,
            dst: &mut [u8],
            src: &[u8],
            embedded: Option<BlockRef>,
        ) -> Result<()> {
            self.$operand.arrmeta_copy_construct(dst, src, embedded)
        }

        fn arrmeta_reset_buffers(&self, arrmeta: &mut [u8]) -> Result<()> {
            self.$operand.arrmeta_reset_buffers(arrmeta)
        }

        fn arrmeta_finalize_buffers(&self, arrmeta: &mut [u8]) -> Result<()> {
            self.$operand.arrmeta_finalize_buffers(arrmeta)
        }

        fn arrmeta_destruct(&self, arrmeta: &mut [u8]) {
            self.$operand.arrmeta_destruct(arrmeta)
        }

        fn arrmeta_debug_print(
            &self,
            arrmeta: &[u8],
            out: &mut dyn fmt::Write,
            indent: &str,
        ) -> fmt::Result {
            self.$operand.arrmeta_debug_print(arrmeta, out, indent)
        }

        fn is_unique_data_owner(&self, arrmeta: &[u8]) -> bool {
            self.$operand.is_unique_data_owner(arrmeta)
        }
    };
}

// ============================================================================
// view
// ============================================================================

/// Bytes of `operand` read as `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewType {
    pub value: Type,
    pub operand: Type,
}

impl Type {
    /// `view[as=value, original=operand]`. Both must be plain bytes of the
    /// same size.
    pub fn view(value: Type, operand: Type) -> Result<Type> {
        check_scalar("value", &value)?;
        check_scalar("operand", &operand)?;
        if !value.is_pod() || !operand.is_pod() || value.data_size() != operand.data_size() {
            return Err(Error::InvalidArgument(format!(
                "cannot view {} as {}: both need plain data of the same size",
                operand, value
            )));
        }
        Ok(Type::from_variant(TypeVariant::View(ViewType { value, operand })))
    }
}

impl TypeOps for ViewType {
    fn header(&self) -> TypeHeader {
        expression_header(TypeId::View, &self.operand)
    }

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        write!(f, "view[as={}, original={}]", self.value, self.operand)
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        _arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        self.value.print_data(out, &[], data)
    }

    fn is_expression(&self) -> bool {
        true
    }

    fn canonical_type(&self, _this: &Type) -> Type {
        self.value.clone()
    }

    fn value_type(&self, _this: &Type) -> Type {
        self.value.clone()
    }

    fn operand_type(&self, _this: &Type) -> Type {
        self.operand.clone()
    }

    forward_arrmeta_ops!(operand);

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &AssignRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        let child = match side {
            Side::Lhs => req.with(&self.value, &[], req.src_tp, req.src_arrmeta, req.request),
            Side::Rhs => req.with(req.dst_tp, req.dst_arrmeta, &self.value, &[], req.request),
        };
        resolve_assignment(ckb, offset, &child)
    }
}

// ============================================================================
// convert
// ============================================================================

/// `operand` values presented as `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertType {
    pub value: Type,
    pub operand: Type,
}

impl Type {
    /// `convert[to=value, from=operand]`.
    pub fn convert(value: Type, operand: Type) -> Result<Type> {
        check_scalar("value", &value)?;
        check_scalar("operand", &operand)?;
        Ok(Type::from_variant(TypeVariant::Convert(ConvertType { value, operand })))
    }
}

impl TypeOps for ConvertType {
    fn header(&self) -> TypeHeader {
        expression_header(TypeId::Convert, &self.operand)
    }

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        write!(f, "convert[to={}, from={}]", self.value, self.operand)
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        print_value(&Type::from_variant(TypeVariant::Convert(self.clone())), out, arrmeta, data)
    }

    fn is_expression(&self) -> bool {
        true
    }

    fn canonical_type(&self, _this: &Type) -> Type {
        self.value.clone()
    }

    fn value_type(&self, _this: &Type) -> Type {
        self.value.clone()
    }

    fn operand_type(&self, _this: &Type) -> Type {
        self.operand.clone()
    }

    forward_arrmeta_ops!(operand);

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &AssignRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        let (value, operand) = (&self.value, &self.operand);
        let (dst_tp, dst_am) = (req.dst_tp, req.dst_arrmeta);
        let (src_tp, src_am) = (req.src_tp, req.src_arrmeta);
        let single = KernelRequest::Single;
        match side {
            // operand <- value <- src
            Side::Lhs if src_tp == value => {
                let req = req.with(operand, dst_am, src_tp, src_am, req.request);
                resolve_assignment(ckb, offset, &req)
            }
            Side::Lhs => push_chain(
                ckb,
                offset,
                req.request,
                value,
                |ckb, at, temp_am| {
                    resolve_assignment(ckb, at, &req.with(value, temp_am, src_tp, src_am, single))
                },
                |ckb, at, temp_am| {
                    resolve_assignment(ckb, at, &req.with(operand, dst_am, value, temp_am, single))
                },
            ),
            // dst <- value <- operand
            Side::Rhs if dst_tp == value => {
                let req = req.with(dst_tp, dst_am, operand, src_am, req.request);
                resolve_assignment(ckb, offset, &req)
            }
            Side::Rhs => push_chain(
                ckb,
                offset,
                req.request,
                value,
                |ckb, at, temp_am| {
                    resolve_assignment(ckb, at, &req.with(value, temp_am, operand, src_am, single))
                },
                |ckb, at, temp_am| {
                    resolve_assignment(ckb, at, &req.with(dst_tp, dst_am, value, temp_am, single))
                },
            ),
        }
    }
}

// ============================================================================
// property
// ============================================================================

/// Elementwise property `name` of `operand`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyType {
    pub operand: Type,
    pub name: String,
    /// Index of the property in the operand's table.
    pub index: usize,
    pub value: Type,
    pub readable: bool,
    pub writable: bool,
}

impl Type {
    /// `property[operand=operand, name='name']`.
    pub fn property(operand: &Type, name: &str) -> Result<Type> {
        check_scalar("operand", operand)?;
        let index = operand.elwise_property_index(name)?;
        let info = operand.elwise_property_type(index)?;
        check_scalar("value", &info.value_type)?;
        Ok(Type::from_variant(TypeVariant::Property(PropertyType {
            operand: operand.clone(),
            name: info.name.to_string(),
            index,
            value: info.value_type,
            readable: info.readable,
            writable: info.writable,
        })))
    }
}

impl PropertyType {
    #[allow(clippy::too_many_arguments)]
    fn getter(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        dst_arrmeta: &[u8],
        src_arrmeta: &[u8],
        request: KernelRequest,
        errmode: AssignErrorMode,
        ectx: &EvalContext,
    ) -> Result<usize> {
        if !self.readable {
            return Err(Error::unsupported(format!("reading property '{}'", self.name), &self.operand));
        }
        self.operand
            .make_elwise_property_getter_kernel(ckb, offset, dst_arrmeta, src_arrmeta, self.index, request, errmode, ectx)
    }

    #[allow(clippy::too_many_arguments)]
    fn setter(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        dst_arrmeta: &[u8],
        src_arrmeta: &[u8],
        request: KernelRequest,
        errmode: AssignErrorMode,
        ectx: &EvalContext,
    ) -> Result<usize> {
        if !self.writable {
            return Err(Error::unsupported(
                format!("writing read-only property '{}'", self.name),
                &self.operand,
            ));
        }
        self.operand
            .make_elwise_property_setter_kernel(ckb, offset, dst_arrmeta, self.index, src_arrmeta, request, errmode, ectx)
    }
}

impl TypeOps for PropertyType {
    fn header(&self) -> TypeHeader {
        expression_header(TypeId::Property, &self.operand)
    }

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        write!(f, "property[operand={}, name='{}']", self.operand, self.name)
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        print_value(&Type::from_variant(TypeVariant::Property(self.clone())), out, arrmeta, data)
    }

    fn is_expression(&self) -> bool {
        true
    }

    fn canonical_type(&self, _this: &Type) -> Type {
        self.value.clone()
    }

    fn value_type(&self, _this: &Type) -> Type {
        self.value.clone()
    }

    fn operand_type(&self, _this: &Type) -> Type {
        self.operand.clone()
    }

    forward_arrmeta_ops!(operand);

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &AssignRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        let value = &self.value;
        let (dst_tp, dst_am) = (req.dst_tp, req.dst_arrmeta);
        let (src_tp, src_am) = (req.src_tp, req.src_arrmeta);
        let single = KernelRequest::Single;
        match side {
            Side::Lhs if src_tp == value => {
                self.setter(ckb, offset, dst_am, src_am, req.request, req.errmode, req.ectx)
            }
            Side::Lhs => push_chain(
                ckb,
                offset,
                req.request,
                value,
                |ckb, at, temp_am| {
                    resolve_assignment(ckb, at, &req.with(value, temp_am, src_tp, src_am, single))
                },
                |ckb, at, temp_am| self.setter(ckb, at, dst_am, temp_am, single, req.errmode, req.ectx),
            ),
            Side::Rhs if dst_tp == value => {
                self.getter(ckb, offset, dst_am, src_am, req.request, req.errmode, req.ectx)
            }
            Side::Rhs => push_chain(
                ckb,
                offset,
                req.request,
                value,
                |ckb, at, temp_am| self.getter(ckb, at, temp_am, src_am, single, req.errmode, req.ectx),
                |ckb, at, temp_am| {
                    resolve_assignment(ckb, at, &req.with(dst_tp, dst_am, value, temp_am, single))
                },
            ),
        }
    }
}
