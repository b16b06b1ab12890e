// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate error type.
//!
//! Every resolve-time and invoke-time failure in the type model and the
//! kernel layer is reported through [`Error`]. Types are rendered through
//! their `Display` form when they appear in a message.

use std::fmt;

use crate::kernels::ComparisonType;
use crate::memblock::BlockRef;

/// Errors raised by type construction, arrmeta management and kernels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// No kernel or operation exists for the given type.
    Unsupported {
        operation: String,
        type_repr: String,
    },
    /// More indices were supplied than the type has dimensions.
    TooManyIndices {
        type_repr: String,
        nindices: usize,
        ndim: usize,
    },
    /// The two operand types cannot be compared with this comparison.
    NotComparable {
        lhs: String,
        rhs: String,
        comparison: ComparisonType,
    },
    /// Source and destination dimensions cannot be broadcast together.
    Broadcast { dst_shape: String, src_shape: String },
    /// Lookup of a named property that the type does not provide.
    UnknownProperty { type_repr: String, name: String },
    /// Factory arguments do not describe a valid type.
    InvalidArgument(String),

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// A value cannot be represented in the destination type under the
    /// active error mode.
    InvalidValue {
        value: String,
        type_repr: String,
        reason: String,
    },
    /// An index fell outside `[-dim_size, dim_size)`.
    IndexOutOfBounds { index: isize, dim_size: isize },
    /// Malformed type string.
    TypeParse {
        input: String,
        position: usize,
        message: String,
    },

    // ========================================================================
    // Memory Errors
    // ========================================================================
    /// The memory block behind this reference has already been freed.
    StaleBlockRef(BlockRef),
    /// Allocation attempted on a finalized pod block.
    BlockFinalized(BlockRef),
    /// Arrmeta bytes do not match the layout their type requires.
    InvalidArrmeta(String),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Configuration could not be loaded.
    Config(String),
    /// A formatter reported an error while printing.
    Format,
}

impl Error {
    pub(crate) fn unsupported(operation: impl Into<String>, tp: &impl fmt::Display) -> Self {
        Error::Unsupported {
            operation: operation.into(),
            type_repr: tp.to_string(),
        }
    }

    pub(crate) fn invalid_value(
        value: impl fmt::Display,
        tp: &impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidValue {
            value: value.to_string(),
            type_repr: tp.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unsupported {
                operation,
                type_repr,
            } => write!(f, "{} has not been implemented for {}", operation, type_repr),
            Error::TooManyIndices {
                type_repr,
                nindices,
                ndim,
            } => write!(
                f,
                "Provided {} indices, but type {} only has {} dimensions",
                nindices, type_repr, ndim
            ),
            Error::NotComparable {
                lhs,
                rhs,
                comparison,
            } => write!(f, "Cannot compare {} {} {}", lhs, comparison, rhs),
            Error::Broadcast {
                dst_shape,
                src_shape,
            } => write!(f, "Cannot broadcast shape {} into {}", src_shape, dst_shape),
            Error::UnknownProperty { type_repr, name } => {
                write!(f, "Type {} has no property named '{}'", type_repr, name)
            }
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidValue {
                value,
                type_repr,
                reason,
            } => write!(f, "Invalid value {} for type {}: {}", value, type_repr, reason),
            Error::IndexOutOfBounds { index, dim_size } => write!(
                f,
                "Index {} is out of bounds for dimension of size {}",
                index, dim_size
            ),
            Error::TypeParse {
                input,
                position,
                message,
            } => write!(
                f,
                "Failed to parse type \"{}\" at position {}: {}",
                input, position, message
            ),
            Error::StaleBlockRef(r) => write!(f, "Stale memory block reference {}", r),
            Error::BlockFinalized(r) => write!(f, "Memory block {} is finalized", r),
            Error::InvalidArrmeta(msg) => write!(f, "Invalid arrmeta: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Format => write!(f, "Formatting error"),
        }
    }
}

impl std::error::Error for Error {}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::Format
    }
}

#[cfg(feature = "config-yaml")]
impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Convenient alias for results using the crate [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_indices_message() {
        let err = Error::TooManyIndices {
            type_repr: "int32".to_string(),
            nindices: 1,
            ndim: 0,
        };
        assert_eq!(
            err.to_string(),
            "Provided 1 indices, but type int32 only has 0 dimensions"
        );
    }

    #[test]
    fn test_unsupported_names_type() {
        let err = Error::unsupported("make_assignment_kernel", &"bytes[4]");
        assert!(err.to_string().contains("bytes[4]"));
    }

    #[test]
    fn test_from_fmt_error() {
        let err: Error = fmt::Error.into();
        assert_eq!(err, Error::Format);
    }
}
