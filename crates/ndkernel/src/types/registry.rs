// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named types for the type-string parser.
//!
//! A [`TypeRegistry`] maps identifiers to descriptors so that type strings
//! can refer to them by name:
//!
//! ```rust
//! use ndkernel::types::{parse_type_with_registry, Type, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! registry.register("point", "{x: float64, y: float64}".parse::<Type>().unwrap()).unwrap();
//! let tp = parse_type_with_registry("var * point", &registry).unwrap();
//! assert_eq!(tp.to_string(), "var * {x: float64, y: float64}");
//! ```
//!
//! # Performance
//!
//! - `DashMap`: sharded concurrent map, no global lock on lookup
//! - `Arc<str>` keys: registering clones nothing but the name once

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use super::{BuiltinTypeId, Type};
use crate::error::{Error, Result};

/// Words the parser treats as syntax; they cannot name a registered type.
const RESERVED: &[&str] = &[
    "Any",
    "bytes",
    "complex",
    "convert",
    "fixed_string",
    "property",
    "string",
    "strided",
    "time",
    "var",
    "view",
];

/// Concurrent name -> type map.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: Arc<DashMap<Arc<str>, Type>>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tp` under `name`, replacing any previous entry.
    ///
    /// Returns the previous type. Names must be identifiers and may not
    /// shadow builtin names or syntax keywords.
    pub fn register(&self, name: &str, tp: Type) -> Result<Option<Type>> {
        validate_name(name)?;
        log::debug!("[types] register {} = {}", name, tp);
        Ok(self.types.insert(Arc::from(name), tp))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Type> {
        self.types.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<Type> {
        self.types.remove(name).map(|(_, tp)| tp)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|e| e.key().to_string()).collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn clear(&self) {
        self.types.clear();
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry").field("names", &self.names()).finish()
    }
}

fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let well_formed = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !well_formed {
        return Err(Error::InvalidArgument(format!("'{}' is not a valid type name", name)));
    }
    if RESERVED.contains(&name) || BuiltinTypeId::from_name(name).is_some() {
        return Err(Error::InvalidArgument(format!(
            "'{}' is reserved and cannot name a registered type",
            name
        )));
    }
    Ok(())
}

static GLOBAL_REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

/// Registry consulted by `Type::from_str`.
pub fn global_registry() -> &'static TypeRegistry {
    GLOBAL_REGISTRY.get_or_init(TypeRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_replace() {
        let registry = TypeRegistry::new();
        let i32_tp = Type::builtin(BuiltinTypeId::Int32);
        assert!(registry.register("index_t", i32_tp.clone()).expect("register").is_none());
        let prev = registry
            .register("index_t", Type::builtin(BuiltinTypeId::Int64))
            .expect("register");
        assert_eq!(prev, Some(i32_tp));
        assert_eq!(registry.get("index_t"), Some(Type::builtin(BuiltinTypeId::Int64)));
        assert_eq!(registry.names(), ["index_t"]);
        assert!(registry.remove("index_t").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejected_names() {
        let registry = TypeRegistry::new();
        let tp = Type::builtin(BuiltinTypeId::Int8);
        for name in ["", "1abc", "a-b", "int32", "var", "Any", "complex64"] {
            assert!(registry.register(name, tp.clone()).is_err(), "{}", name);
        }
    }

    #[test]
    fn test_clones_share_entries() {
        let registry = TypeRegistry::new();
        let other = registry.clone();
        registry.register("flag", Type::builtin(BuiltinTypeId::Bool)).expect("register");
        assert!(other.contains("flag"));
        assert_eq!(other.len(), 1);
    }
}
