// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::cast_sign_loss)] // Test data conversions
#![allow(clippy::cast_possible_wrap)] // Test conversions
#![allow(clippy::missing_panics_doc)] // Tests panic on failure
#![allow(clippy::unreadable_literal)] // Large test constants

//! End-to-end scenarios through the public kernel entry points.

use ndkernel::kernels::{make_assignment_kernel, make_comparison_kernel, make_index_kernel};
use ndkernel::types::{TimeHmst, TimeZone};
use ndkernel::{
    AssignErrorMode, BuiltinTypeId, ComparisonType, Error, EvalContext, KernelBuilder, KernelRequest, Type,
};

fn assign(dst: &Type, src: &Type, errmode: AssignErrorMode) -> ndkernel::Result<KernelBuilder> {
    let mut ckb = KernelBuilder::new();
    make_assignment_kernel(
        &mut ckb,
        0,
        dst,
        &[],
        src,
        &[],
        KernelRequest::Single,
        errmode,
        &EvalContext::default(),
    )?;
    Ok(ckb)
}

#[test]
fn int32_300_into_int8() {
    let dst = Type::builtin(BuiltinTypeId::Int8);
    let src = Type::builtin(BuiltinTypeId::Int32);
    let value = 300i32;

    for errmode in [AssignErrorMode::Overflow, AssignErrorMode::Fractional, AssignErrorMode::Inexact] {
        let mut ckb = assign(&dst, &src, errmode).expect("kernel");
        let mut out = 0i8;
        // SAFETY: out is int8, value is int32.
        let r = unsafe { ckb.single(0, (&mut out as *mut i8).cast(), &[(&value as *const i32).cast()]) };
        match r {
            Err(Error::InvalidValue { .. }) => {}
            other => panic!("{}: expected InvalidValue, got {:?}", errmode, other),
        }
    }

    let mut ckb = assign(&dst, &src, AssignErrorMode::NoCheck).expect("kernel");
    let mut out = 0i8;
    // SAFETY: as above.
    unsafe { ckb.single(0, (&mut out as *mut i8).cast(), &[(&value as *const i32).cast()]) }
        .expect("run");
    assert_eq!(out, 44);
}

#[test]
fn utc_time_prints_and_exposes_fields() {
    let tp = Type::time_with_zone(TimeZone::Utc);
    let ticks = TimeHmst::new(13, 45, 30, 0).to_ticks();
    // SAFETY: ticks is a time element.
    let printed = unsafe { tp.data_to_string(&[], (&ticks as *const i64).cast()) }.expect("print");
    assert_eq!(printed, "13:45:30Z");

    let int32 = Type::builtin(BuiltinTypeId::Int32);
    for (name, expected) in [("hour", 13), ("minute", 45)] {
        let prop = Type::property(&tp, name).expect("property");
        assert_eq!(prop.value_type(), int32);
        let mut ckb = assign(&int32, &prop, AssignErrorMode::Default).expect("kernel");
        let mut out = -1i32;
        // SAFETY: the property type stores a time element.
        unsafe { ckb.single(0, (&mut out as *mut i32).cast(), &[(&ticks as *const i64).cast()]) }
            .expect("run");
        assert_eq!(out, expected, "{}", name);
    }
}

#[test]
fn utc_and_abstract_times_are_not_comparable() {
    let utc = Type::time_with_zone(TimeZone::Utc);
    let abstract_tp = Type::time();
    for comparison in [ComparisonType::Equal, ComparisonType::LessThan] {
        let mut ckb = KernelBuilder::new();
        let err = make_comparison_kernel(
            &mut ckb,
            0,
            &utc,
            &[],
            &abstract_tp,
            &[],
            comparison,
            KernelRequest::Single,
            &EvalContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotComparable { .. }), "{}", err);
        assert!(ckb.is_empty());
    }
}

#[test]
fn scalar_indexing_boundary() {
    let tp = Type::time();
    let mut ckb = KernelBuilder::new();
    let step = make_index_kernel(&mut ckb, 0, &tp, &[], &[], KernelRequest::Single)
        .expect("zero indices");
    assert_eq!(step.dst_type, tp);

    let mut ckb = KernelBuilder::new();
    match make_index_kernel(&mut ckb, 0, &tp, &[], &[0, 1], KernelRequest::Single) {
        Err(Error::TooManyIndices { nindices, ndim, .. }) => {
            assert_eq!(ndim, 0);
            assert!(nindices >= 1);
        }
        other => panic!("expected TooManyIndices, got {:?}", other.map(|s| s.dst_type.to_string())),
    }
}

#[test]
fn descriptors_are_reflexive_and_distinct() {
    let types: Vec<Type> = ["int8", "uint8", "time", "time[tz='UTC']", "string", "2 * int8", "var * int8"]
        .iter()
        .map(|s| s.parse().expect("parse"))
        .collect();
    for (i, a) in types.iter().enumerate() {
        assert_eq!(a, &a.clone());
        for b in &types[i + 1..] {
            assert_ne!(a, b);
        }
    }
}
