//! Error types for the matcher build stage.
//!
//! Failures fall into three classes with different caller contracts:
//! resource-limit violations are recoverable (retry with a smaller batch or
//! a different strategy), reserved-id reuse indicates a defect in the
//! upstream batch producer and is not recoverable, and engine-builder
//! failures are propagated unchanged rather than reinterpreted. The enum is
//! `#[non_exhaustive]` so variants can be added without breaking callers;
//! consumers should include a fallback match arm.

use std::fmt;

/// Errors raised by [`build_matcher`](crate::build_matcher).
///
/// Use [`is_resource_limit`](BuildError::is_resource_limit) and
/// [`is_internal_invariant`](BuildError::is_internal_invariant) to decide
/// whether a failure is worth retrying with a reduced batch.
#[derive(Debug)]
#[non_exhaustive]
pub enum BuildError {
    /// Batch exceeds the configured literal count ceiling.
    TooManyLiterals { count: usize, max: u32 },
    /// A single pattern exceeds the per-literal length ceiling.
    LiteralTooLong { id: u32, len: usize, max: u32 },
    /// Summed pattern lengths exceed the aggregate character budget.
    TotalCharsExceeded { total: u64, max: u64 },
    /// Compiled engine payload exceeds the configured size ceiling.
    CompiledTooLarge { bytes: usize, max: u64 },
    /// A literal uses the id reserved for engine-internal use.
    ReservedIdUsed { id: u32 },
    /// The multi-literal automaton probe failed to build.
    AutomatonBuild { reason: String },
}

impl BuildError {
    /// True for failures the caller can recover from by reducing or
    /// splitting the batch.
    pub fn is_resource_limit(&self) -> bool {
        matches!(
            self,
            Self::TooManyLiterals { .. }
                | Self::LiteralTooLong { .. }
                | Self::TotalCharsExceeded { .. }
                | Self::CompiledTooLarge { .. }
        )
    }

    /// True for defect-class failures in the upstream batch producer.
    pub fn is_internal_invariant(&self) -> bool {
        matches!(self, Self::ReservedIdUsed { .. })
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyLiterals { count, max } => {
                write!(f, "too many literals: {count} (max: {max})")
            }
            Self::LiteralTooLong { id, len, max } => {
                write!(f, "literal {id} too long: {len} bytes (max: {max})")
            }
            Self::TotalCharsExceeded { total, max } => {
                write!(f, "literal batch too large: {total} chars (max: {max})")
            }
            Self::CompiledTooLarge { bytes, max } => {
                write!(f, "compiled matcher too large: {bytes} bytes (max: {max})")
            }
            Self::ReservedIdUsed { id } => {
                write!(f, "reserved literal id {id:#x} used by input")
            }
            Self::AutomatonBuild { reason } => {
                write!(f, "multi-literal automaton build failed: {reason}")
            }
        }
    }
}

impl std::error::Error for BuildError {}
