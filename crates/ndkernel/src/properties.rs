// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Property descriptions.
//!
//! Elementwise properties (`hour` of a time, ...) are exposed per type by
//! index. Array properties and functions wrap them as [`Callable`]s that
//! map an array type to the type of the property view over it.

use std::fmt;

use crate::error::Result;
use crate::types::Type;

/// Description of one elementwise property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub value_type: Type,
    pub readable: bool,
    pub writable: bool,
}

/// Value of a type-level property.
#[derive(Debug, Clone, PartialEq)]
pub enum TypePropertyValue {
    Int(isize),
    Str(String),
    Type(Type),
}

impl fmt::Display for TypePropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypePropertyValue::Int(i) => write!(f, "{}", i),
            TypePropertyValue::Str(s) => write!(f, "'{}'", s),
            TypePropertyValue::Type(t) => write!(f, "{}", t),
        }
    }
}

/// Array property or function backed by an elementwise property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callable {
    pub name: String,
    /// Elementwise property the callable projects.
    pub property: &'static str,
}

impl Callable {
    pub fn new(name: impl Into<String>, property: &'static str) -> Self {
        Self {
            name: name.into(),
            property,
        }
    }

    pub fn signature(&self) -> &'static str {
        "(self: Any) -> Any"
    }

    /// Type of the property view over an array of `self_tp`.
    ///
    /// The dimensions of `self_tp` are kept; the innermost type is wrapped
    /// in a `property[...]` expression.
    pub fn call(&self, self_tp: &Type) -> Result<Type> {
        let dtype = self_tp.dtype();
        let prop = Type::property(&dtype, self.property)?;
        self_tp.with_replaced_dtype(prop)
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.signature())
    }
}
