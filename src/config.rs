//! Build-time configuration: resource ceilings, engine feature flags,
//! hardware capability flags, and the optional trace hook.
//!
//! Configuration is pipeline-scoped: it outlives any individual build call
//! and is shared read-only across concurrent builds. No build call mutates
//! it, so no locking is required.
//!
//! # Invariants
//! - Limits are validated at construction and in const contexts.
//! - The trace hook is optional and must be cheap when absent; production
//!   configurations leave it unset.

use std::fmt;
use std::sync::Arc;

use crate::bytecode::EngineKind;
use crate::literal::Literal;

/// Hard ceilings enforced before and during matcher construction.
///
/// Count, per-literal length, and aggregate character checks run before any
/// engine is invoked; the compiled-size ceiling is checked after building,
/// since payload size is not known beforehand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatcherLimits {
    /// Maximum number of literals in one batch.
    pub max_literal_count: u32,

    /// Maximum byte length of a single literal pattern.
    pub max_literal_len: u32,

    /// Aggregate budget for the summed pattern lengths of a batch.
    pub max_total_chars: u64,

    /// Maximum byte size of a compiled engine payload.
    pub max_compiled_bytes: u64,
}

impl MatcherLimits {
    /// Safe defaults sized for large production pattern sets.
    pub const DEFAULT: Self = Self {
        max_literal_count: 1 << 20,
        max_literal_len: 16 * 1024,
        max_total_chars: 64 * 1024 * 1024,
        max_compiled_bytes: 256 * 1024 * 1024,
    };

    /// Restrictive limits for testing or constrained environments.
    pub const RESTRICTIVE: Self = Self {
        max_literal_count: 64,
        max_literal_len: 64,
        max_total_chars: 4 * 1024,
        max_compiled_bytes: 64 * 1024,
    };

    /// Validates that limits are internally consistent.
    ///
    /// # Panics
    ///
    /// Panics if limits are invalid (indicates a configuration bug).
    #[track_caller]
    pub const fn validate(&self) {
        assert!(self.max_literal_count > 0, "literal count limit must be > 0");
        assert!(self.max_literal_len > 0, "literal length limit must be > 0");
        assert!(
            self.max_total_chars >= self.max_literal_len as u64,
            "aggregate budget below per-literal length limit"
        );
        assert!(
            self.max_compiled_bytes > 0,
            "compiled size limit must be > 0"
        );

        assert!(
            self.max_literal_count <= 1 << 24,
            "unreasonably large literal count limit"
        );
        assert!(
            self.max_literal_len <= 1 << 30,
            "unreasonably large literal length limit"
        );
    }
}

impl Default for MatcherLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// Compile-time validation of the shipped limit sets.
const _: () = MatcherLimits::DEFAULT.validate();
const _: () = MatcherLimits::RESTRICTIVE.validate();

/// Hardware capability flags for the build target.
///
/// These describe the machine the compiled matcher will run on, which is
/// not necessarily the build host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HwCaps {
    /// Wide (256-bit) vector instructions are available.
    pub wide_vector: bool,
}

/// Observer for build-stage diagnostics.
///
/// All methods have no-op defaults; implementations should stay cheap and
/// avoid allocation. The hook replaces any process-global debug dump: it is
/// injected per configuration and carries no shared mutable state.
pub trait BuildTrace {
    /// Called once per build with the incoming literal batch.
    fn on_batch(&self, _lits: &[Literal]) {}

    /// Called after engine selection, before the builder runs.
    fn on_engine_selected(&self, _kind: EngineKind) {}
}

/// Configuration consumed read-only by every build call.
#[derive(Clone)]
pub struct BuildConfig {
    /// Resource ceilings.
    pub limits: MatcherLimits,

    /// Allow the single-literal specialist engine.
    pub allow_single_literal: bool,

    /// Allow the wide-vector layout of the multi-literal engine.
    pub allow_wide_vector: bool,

    /// Capabilities of the machine the matcher will run on.
    pub hw: HwCaps,

    /// Optional diagnostics hook; `None` in production configurations.
    pub trace: Option<Arc<dyn BuildTrace + Send + Sync>>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            limits: MatcherLimits::DEFAULT,
            allow_single_literal: true,
            allow_wide_vector: true,
            hw: HwCaps::default(),
            trace: None,
        }
    }
}

impl fmt::Debug for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildConfig")
            .field("limits", &self.limits)
            .field("allow_single_literal", &self.allow_single_literal)
            .field("allow_wide_vector", &self.allow_wide_vector)
            .field("hw", &self.hw)
            .field("trace", &self.trace.as_ref().map(|_| "<hook>"))
            .finish()
    }
}
