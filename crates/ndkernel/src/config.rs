// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global configuration: constants and the evaluation context.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (tick ratios, arrmeta
//!   field sizes, pod block chunk sizes)
//! - **Level 2 (Dynamic)**: [`RuntimeConfig`] holding the process-wide
//!   default [`EvalContext`] behind an `ArcSwap`
//!
//! # Example
//!
//! ```ignore
//! use ndkernel::config::*;
//!
//! let ectx = runtime_config().eval_context();
//! assert_eq!(ectx.errmode, AssignErrorMode::Fractional);
//!
//! runtime_config().set_eval_context(EvalContext {
//!     errmode: AssignErrorMode::NoCheck,
//!     ..EvalContext::default()
//! });
//! ```

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};

// =======================================================================
// Time Constants (ticks are 100 ns)
// =======================================================================

/// Ticks per microsecond.
pub const TICKS_PER_MICROSECOND: i64 = 10;

/// Ticks per millisecond.
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Ticks per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks per minute.
pub const TICKS_PER_MINUTE: i64 = 60 * TICKS_PER_SECOND;

/// Ticks per hour.
pub const TICKS_PER_HOUR: i64 = 60 * TICKS_PER_MINUTE;

/// Ticks per day. Valid time values lie in `[0, TICKS_PER_DAY)`.
pub const TICKS_PER_DAY: i64 = 24 * TICKS_PER_HOUR;

/// Maximum number of fractional-second digits accepted by the time parser.
pub const TIME_FRACTION_DIGITS: usize = 7;

// =======================================================================
// Arrmeta Field Layout
// =======================================================================

/// Size of a memory block reference stored inside arrmeta.
pub const BLOCKREF_ARRMETA_SIZE: usize = 8;

/// Arrmeta size of fixed and strided dimensions (`dim_size`, `stride`).
pub const STRIDED_DIM_ARRMETA_SIZE: usize = 2 * std::mem::size_of::<isize>();

/// Arrmeta size of var dimensions (`blockref`, `stride`, `offset`).
pub const VAR_DIM_ARRMETA_SIZE: usize = BLOCKREF_ARRMETA_SIZE + 2 * std::mem::size_of::<isize>();

/// Data size of a var dimension element (`begin` pointer, `size`).
pub const VAR_DIM_DATA_SIZE: usize = std::mem::size_of::<usize>() + std::mem::size_of::<isize>();

/// Data size of a variable-length string (`begin`, `end` pointers).
pub const STRING_DATA_SIZE: usize = 2 * std::mem::size_of::<usize>();

/// Largest data alignment a type may request.
pub const MAX_DATA_ALIGNMENT: usize = 8;

// =======================================================================
// Memory Block Sizing
// =======================================================================

/// Default size of the first chunk of a pod memory block.
pub const POD_BLOCK_INITIAL_CHUNK: usize = 2048;

/// Upper bound for geometric chunk growth in pod memory blocks.
pub const POD_BLOCK_MAX_CHUNK: usize = 1 << 20;

// =======================================================================
// Evaluation Context
// =======================================================================

/// Strictness applied when a value is assigned across types.
///
/// `NoCheck` through `Inexact` are ordered from least to most strict.
/// `Default` is not a checking mode; [`EvalContext::resolve`] replaces it
/// with the context's mode when the kernel is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "config-yaml",
    derive(serde::Deserialize, serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum AssignErrorMode {
    /// No checks; out-of-range values wrap or truncate.
    #[cfg_attr(feature = "config-yaml", serde(rename = "nocheck"))]
    NoCheck,
    /// Reject overflow.
    Overflow,
    /// Reject overflow and loss of a fractional part.
    Fractional,
    /// Reject any value that does not round trip exactly.
    Inexact,
    /// Use the error mode of the evaluation context.
    Default,
}

impl AssignErrorMode {
    #[inline]
    pub fn checks_overflow(self) -> bool {
        !matches!(self, AssignErrorMode::NoCheck)
    }

    #[inline]
    pub fn checks_fractional(self) -> bool {
        matches!(self, AssignErrorMode::Fractional | AssignErrorMode::Inexact)
    }

    #[inline]
    pub fn checks_inexact(self) -> bool {
        matches!(self, AssignErrorMode::Inexact)
    }
}

impl fmt::Display for AssignErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssignErrorMode::NoCheck => "nocheck",
            AssignErrorMode::Overflow => "overflow",
            AssignErrorMode::Fractional => "fractional",
            AssignErrorMode::Inexact => "inexact",
            AssignErrorMode::Default => "default",
        };
        f.write_str(name)
    }
}

/// Settings consulted while kernels are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "config-yaml",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct EvalContext {
    /// Error mode substituted for [`AssignErrorMode::Default`].
    pub errmode: AssignErrorMode,
    /// Initial chunk size of pod blocks allocated for arrmeta.
    pub pod_chunk_size: usize,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self {
            errmode: AssignErrorMode::Fractional,
            pod_chunk_size: POD_BLOCK_INITIAL_CHUNK,
        }
    }
}

impl EvalContext {
    /// Replace `Default` with this context's error mode.
    #[inline]
    #[must_use]
    pub fn resolve(&self, errmode: AssignErrorMode) -> AssignErrorMode {
        match errmode {
            AssignErrorMode::Default => match self.errmode {
                AssignErrorMode::Default => AssignErrorMode::Fractional,
                other => other,
            },
            other => other,
        }
    }

    fn validate(self) -> Result<Self> {
        if self.pod_chunk_size == 0 || self.pod_chunk_size > POD_BLOCK_MAX_CHUNK {
            return Err(Error::Config(format!(
                "pod_chunk_size must be in 1..={}, got {}",
                POD_BLOCK_MAX_CHUNK, self.pod_chunk_size
            )));
        }
        Ok(self)
    }

    /// Parse an evaluation context from a YAML document.
    ///
    /// ```yaml
    /// errmode: inexact
    /// pod_chunk_size: 4096
    /// ```
    #[cfg(feature = "config-yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let ectx: EvalContext = serde_yaml::from_str(yaml)?;
        ectx.validate()
    }

    /// Load an evaluation context from a YAML file.
    #[cfg(feature = "config-yaml")]
    pub fn load_yaml(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        log::debug!("[config] loading eval context from {}", path.display());
        Self::from_yaml_str(&text)
    }
}

// =======================================================================
// Runtime Configuration (Dynamic, Lock-Free)
// =======================================================================

/// Shared runtime configuration.
///
/// The default [`EvalContext`] lives in an `ArcSwap` so kernel resolution
/// reads it with an atomic load.
#[derive(Clone)]
pub struct RuntimeConfig {
    eval_context: Arc<ArcSwap<EvalContext>>,
}

impl RuntimeConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            eval_context: Arc::new(ArcSwap::from_pointee(EvalContext::default())),
        }
    }

    /// Current default evaluation context.
    #[inline]
    #[must_use]
    pub fn eval_context(&self) -> EvalContext {
        **self.eval_context.load()
    }

    /// Replace the default evaluation context.
    pub fn set_eval_context(&self, ectx: EvalContext) -> Result<()> {
        let ectx = ectx.validate()?;
        log::debug!(
            "[config] default eval context: errmode={} pod_chunk_size={}",
            ectx.errmode,
            ectx.pod_chunk_size
        );
        self.eval_context.store(Arc::new(ectx));
        Ok(())
    }

    /// Restore the built-in defaults.
    pub fn reset(&self) {
        self.eval_context.store(Arc::new(EvalContext::default()));
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

static RUNTIME_CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// Process-wide runtime configuration.
pub fn runtime_config() -> &'static RuntimeConfig {
    RUNTIME_CONFIG.get_or_init(RuntimeConfig::new)
}
