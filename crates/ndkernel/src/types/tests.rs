// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-variant descriptor tests.

use super::*;
use crate::arrmeta::Arrmeta;
use crate::kernels::{make_index_kernel, KernelBuilder, KernelRequest};
use crate::string_encodings::StringEncoding;

const PRINTED_FORMS: &[&str] = &[
    "bool",
    "int8",
    "uint64",
    "float32",
    "complex[float32]",
    "complex[float64]",
    "bytes[16]",
    "bytes[8, align=8]",
    "string",
    "string['utf16']",
    "fixed_string[10]",
    "fixed_string[10, 'ascii']",
    "time",
    "time[tz='UTC']",
    "{x: int32, y: float64}",
    "3 * int32",
    "strided * 3 * float64",
    "var * string",
    "var * {name: string, at: time}",
    "view[as=uint32, original=float32]",
    "convert[to=float64, from=int32]",
    "convert[to=string, from=int32]",
    "property[operand=time, name='struct']",
    "2 * property[operand=time[tz='UTC'], name='hour']",
    "Any",
    "strided * var * Any",
];

#[test]
fn test_parse_print_round_trip() {
    for s in PRINTED_FORMS {
        let tp: Type = s.parse().unwrap_or_else(|e| panic!("{}: {}", s, e));
        assert_eq!(tp.to_string(), *s);
        let again: Type = tp.to_string().parse().expect("reparse");
        assert_eq!(again, tp, "{}", s);
    }
}

#[test]
fn test_reflexive_and_distinct() {
    let types: Vec<Type> = PRINTED_FORMS
        .iter()
        .map(|s| s.parse::<Type>().expect("parse"))
        .collect();
    for (i, a) in types.iter().enumerate() {
        let same = a.clone();
        assert_eq!(a, &same);
        for b in &types[i + 1..] {
            if a.type_id() != b.type_id() {
                assert_ne!(a, b, "{} vs {}", a, b);
            }
        }
    }
}

#[test]
fn test_structural_equality() {
    let a = Type::fixed_dim(3, Type::string(StringEncoding::Utf8)).expect("dim");
    let b: Type = "3 * string".parse().expect("parse");
    assert_eq!(a, b);
    assert_ne!(a, Type::fixed_dim(4, Type::string(StringEncoding::Utf8)).expect("dim"));
    assert_ne!(
        Type::string(StringEncoding::Utf8),
        Type::string(StringEncoding::Utf16)
    );
}

#[test]
fn test_scalar_indexing_boundary() {
    let tp = Type::builtin(BuiltinTypeId::Float64);
    let mut ckb = KernelBuilder::new();
    let step = make_index_kernel(&mut ckb, 0, &tp, &[], &[], KernelRequest::Single)
        .expect("no indices");
    assert_eq!(step.dst_type, tp);
    assert_eq!(step.arrmeta_offset, 0);

    let mut ckb = KernelBuilder::new();
    let err = make_index_kernel(&mut ckb, 0, &tp, &[], &[0], KernelRequest::Single).unwrap_err();
    assert!(matches!(err, Error::TooManyIndices { nindices: 1, ndim: 0, .. }), "{}", err);
    assert!(ckb.is_empty());

    let err = tp.type_at(1).unwrap_err();
    assert!(matches!(err, Error::TooManyIndices { nindices: 1, ndim: 0, .. }));
}

#[test]
fn test_too_many_indices_after_dims() {
    let tp: Type = "2 * 3 * int32".parse().expect("parse");
    let am = Arrmeta::default_construct(&tp, &[], true).expect("arrmeta");
    let mut ckb = KernelBuilder::new();
    let err = make_index_kernel(&mut ckb, 0, &tp, am.as_bytes(), &[0, 0, 0], KernelRequest::Single)
        .unwrap_err();
    assert!(matches!(err, Error::TooManyIndices { nindices: 3, ndim: 2, .. }), "{}", err);
    assert!(ckb.is_empty());
}

#[test]
fn test_dtype_and_replacement() {
    let tp: Type = "3 * var * time".parse().expect("parse");
    assert_eq!(tp.dtype(), Type::time());
    assert_eq!(tp.ndim(), 2);
    let replaced = tp.with_replaced_dtype(Type::builtin(BuiltinTypeId::Int64)).expect("replace");
    assert_eq!(replaced.to_string(), "3 * var * int64");
}

#[test]
fn test_canonical_strips_expressions() {
    let tp: Type = "3 * convert[to=float64, from=int32]".parse().expect("parse");
    assert_eq!(tp.data_size(), 12);
    assert_eq!(tp.canonical_type().to_string(), "3 * float64");
    assert_eq!(tp.value_type().to_string(), "3 * float64");
    assert_eq!(tp.operand_type().to_string(), "3 * int32");
}

#[test]
fn test_array_registries_forward_to_dtype() {
    let tp: Type = "strided * var * time[tz='UTC']".parse().expect("parse");
    let props = tp.dynamic_array_properties();
    assert!(props.contains_key("hour"));
    assert!(tp.dynamic_array_functions().contains_key("to_struct"));
    let hour = props["hour"].call(&tp).expect("call");
    assert_eq!(
        hour.to_string(),
        "strided * var * property[operand=time[tz='UTC'], name='hour']"
    );
    assert!(Type::builtin(BuiltinTypeId::Int8).dynamic_array_properties().is_empty());
}

#[test]
fn test_lossless_assignment() {
    let parse = |s: &str| s.parse::<Type>().expect("parse");
    assert!(Type::is_lossless_assignment(&parse("int64"), &parse("int32")));
    assert!(!Type::is_lossless_assignment(&parse("int32"), &parse("int64")));
    assert!(Type::is_lossless_assignment(&parse("3 * float64"), &parse("3 * float32")));
    assert!(!Type::is_lossless_assignment(&parse("var * float64"), &parse("3 * float32")));
    assert!(!Type::is_lossless_assignment(&parse("4 * float64"), &parse("3 * float32")));
    assert!(Type::is_lossless_assignment(&parse("bytes[4]"), &parse("bytes[4, align=4]")));
}

#[test]
fn test_flags_propagate() {
    let tp: Type = "3 * {a: int8, b: string}".parse().expect("parse");
    assert!(tp.flags().contains(TypeFlags::BLOCKREF));
    assert!(!tp.is_pod());
    assert!(!tp.is_symbolic());
    let sym: Type = "var * Any".parse().expect("parse");
    assert!(sym.is_symbolic());
    assert!(format!("{:?}", sym.flags()).contains("SYMBOLIC"));
}
