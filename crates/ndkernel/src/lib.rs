// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # ndkernel - dynamic array type descriptors and kernels
//!
//! Runtime type descriptors for n-dimensional array elements, the
//! per-instance arrmeta that accompanies them, reference-counted memory
//! blocks, and the kernel machinery that resolves assignment, comparison,
//! indexing and property access between concrete types.
//!
//! ## Quick Start
//!
//! ```rust
//! use ndkernel::{Result, Type};
//!
//! fn main() -> Result<()> {
//!     let tp: Type = "3 * {hour: int8, minute: int8}".parse()?;
//!     assert_eq!(tp.ndim(), 1);
//!     assert_eq!(tp.data_size(), 6);
//!
//!     let tm: Type = "time[tz='UTC']".parse()?;
//!     assert_eq!(tm.to_string(), "time[tz='UTC']");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                         Kernel Resolution                          |
//! |   assignment | comparison | index projection | property get/set    |
//! +---------------------------------------------------------------------+
//! |                          Type Descriptors                          |
//! |   builtin | bytes | string | time | struct | dims | expressions    |
//! +---------------------------------------------------------------------+
//! |                      Arrmeta + Memory Blocks                       |
//! |   strides, var-dim offsets, block references, pod arenas           |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Type`] | Shared, immutable type descriptor |
//! | [`Arrmeta`] | Owned per-instance arrmeta for one type |
//! | [`KernelBuilder`] | Resolved kernel units, ready to invoke |
//! | [`BlockRef`] | Handle to a reference-counted memory block |

/// Arrmeta buffers and their lifecycle helpers.
pub mod arrmeta;
/// Global configuration (layout constants, error modes, evaluation context).
pub mod config;
/// Error type shared by every module.
pub mod error;
/// Kernel resolution and invocation.
pub mod kernels;
/// Reference-counted fixed and pod memory blocks.
pub mod memblock;
/// Elementwise and dynamic property descriptions.
pub mod properties;
/// String encodings and codepoint transcoding.
pub mod string_encodings;
/// Type descriptors.
pub mod types;

pub use arrmeta::Arrmeta;
pub use config::{AssignErrorMode, EvalContext};
pub use error::{Error, Result};
pub use kernels::{ComparisonType, KernelBuilder, KernelRequest};
pub use memblock::BlockRef;
pub use types::{BuiltinTypeId, Type, TypeId, TypeKind};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
