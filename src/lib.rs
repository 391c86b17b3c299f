//! Literal-matcher build stage: compiles a batch of fixed byte patterns
//! into self-describing matcher bytecode.
//!
//! ## Scope
//! This crate is the build orchestration seam of a literal-matching
//! backend. Given a batch of [`Literal`] records it enforces resource
//! ceilings, picks one of two engines (a single-literal specialist or a
//! general multi-literal engine), and packages the winner's opaque payload
//! into one tagged, cache-line-aligned allocation a runtime can dispatch on
//! without knowing which engine produced it. The engines' matching
//! algorithms and the runtime scan loop live elsewhere.
//!
//! ## Key invariants
//! - Resource checks run before any engine work; failure is fail-fast and
//!   total, so no partial blob ever escapes.
//! - Exactly one engine builder runs per build call.
//! - A built blob is self-contained: [`bytecode_size`] recovers its exact
//!   size from the blob alone, and reports 0 for foreign or corrupt input
//!   instead of failing.
//! - [`BuildConfig`] is read-only during builds and safe to share across
//!   concurrent calls on independent batches.
//!
//! ## Build flow (single call)
//! 1) Resource guard: count, per-literal length, aggregate budget,
//!    reserved-id defect check.
//! 2) Engine selection from batch shape and configuration flags.
//! 3) One engine builder compiles its payload (or reports "nothing to
//!    match", which propagates as `Ok(None)`).
//! 4) Compiled-size ceiling check, then packaging behind the tagged header.
//!
//! ## Notable entry points
//! - [`build_matcher`]: the build call.
//! - [`bytecode_size`]: size introspection over a previously built blob.
//! - [`flood_prone_run_len`]: heuristic for runtime flood-guard decisions.

mod bytecode;
mod config;
mod error;
mod literal;
mod matcher;

pub use bytecode::{EngineKind, MatcherBytecode, BYTECODE_HEADER_BYTES, CACHE_LINE_BYTES};
pub use config::{BuildConfig, BuildTrace, HwCaps, MatcherLimits};
pub use error::BuildError;
pub use literal::{GroupMask, Literal, MaskConstraint, RESERVED_LITERAL_ID};
pub use matcher::{build_matcher, bytecode_size, flood_prone_run_len, FLOOD_RUN_UNBOUNDED};
