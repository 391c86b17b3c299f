//! Build orchestration for the literal matcher.
//!
//! This module is the seam between the compile-time decision procedure and
//! the binary artifact: it validates the batch against configured ceilings,
//! picks one of the two engines, invokes its builder, and packages the
//! resulting payload behind a tagged header. The size inspector and the
//! flood heuristic are independent entry points usable long after the
//! build, given only a blob or batch metadata respectively.
//!
//! # Build flow
//! `batch -> resource guard -> engine selector -> (one) builder -> packager`
//!
//! # Key invariants
//! - The guard runs before any engine work; the first violation wins and no
//!   partial state survives a failure.
//! - Exactly one engine builder runs per call; there is no fallback chain.
//! - An empty builder result propagates as `Ok(None)`: no matcher is
//!   needed, which is not a failure.
//! - For every blob the packager produces,
//!   `bytecode_size(blob.as_bytes()) == blob.len()`.

mod multi;
mod single;

use crate::bytecode::{EngineKind, MatcherBytecode, BYTECODE_HEADER_BYTES};
use crate::config::{BuildConfig, BuildTrace as _};
use crate::error::BuildError;
use crate::literal::{GroupMask, Literal, RESERVED_LITERAL_ID};

/// Flood run length meaning "no limit": the selected engine is immune to
/// repeated-byte floods.
pub const FLOOD_RUN_UNBOUNDED: usize = usize::MAX;

/// Minimum repeated-byte run length considered a slowdown risk for every
/// engine configuration except the single-literal specialist.
///
/// Calibrated against the current engine implementations; revisit alongside
/// the wide bucket budgets in `multi` if their flood handling changes.
const FLOOD_SAFE_RUN_LEN: usize = 3;

/// Compiles a literal batch into matcher bytecode.
///
/// Selects the single-literal specialist when the batch qualifies and the
/// general multi-literal engine otherwise, then packages the winning
/// engine's payload behind a tagged, cache-line-aligned header.
/// `prefer_compact` is passed through to the multi-literal builder.
/// `expected_groups` is consumed only by debug-time invariant checks.
///
/// Returns `Ok(None)` when the chosen builder legitimately produced no
/// payload: callers must treat that as "no matcher needed".
///
/// # Errors
///
/// Resource-limit violations (`is_resource_limit`) are raised before any
/// engine is invoked when detectable from the batch alone; only the
/// compiled-size check runs after building. Reserved-id reuse is a
/// defect-class failure (`is_internal_invariant`). Builder failures are
/// propagated unchanged.
pub fn build_matcher(
    lits: &[Literal],
    prefer_compact: bool,
    cfg: &BuildConfig,
    expected_groups: GroupMask,
) -> Result<Option<MatcherBytecode>, BuildError> {
    debug_assert!(!lits.is_empty(), "empty literal batch");
    if let Some(trace) = &cfg.trace {
        trace.on_batch(lits);
    }

    check_limits(lits, cfg)?;

    debug_assert!(
        lits.iter().all(|lit| lit.groups != 0),
        "literal with zero group mask"
    );
    debug_assert_eq!(
        lits.iter().fold(0, |acc, lit| acc | lit.groups) & !expected_groups,
        0,
        "literal groups outside the expected set"
    );

    let kind = if single::eligible(lits, cfg) {
        EngineKind::SingleLiteral
    } else {
        EngineKind::MultiLiteral
    };
    if let Some(trace) = &cfg.trace {
        trace.on_engine_selected(kind);
    }

    let payload = match kind {
        EngineKind::SingleLiteral => single::build(&lits[0]),
        EngineKind::MultiLiteral => multi::build(lits, prefer_compact, cfg)?,
    };
    let Some(payload) = payload else {
        return Ok(None);
    };
    debug_assert!(!payload.is_empty(), "builder produced a zero-size payload");

    if payload.len() as u64 > cfg.limits.max_compiled_bytes {
        return Err(BuildError::CompiledTooLarge {
            bytes: payload.len(),
            max: cfg.limits.max_compiled_bytes,
        });
    }

    Ok(Some(MatcherBytecode::assemble(kind, &payload)))
}

/// Validates the batch against configured ceilings before any engine work.
///
/// Checks run cheapest-first and exit on the first violation: literal
/// count, then per-literal length and the incremental aggregate budget.
fn check_limits(lits: &[Literal], cfg: &BuildConfig) -> Result<(), BuildError> {
    let limits = &cfg.limits;

    if lits.len() > limits.max_literal_count as usize {
        return Err(BuildError::TooManyLiterals {
            count: lits.len(),
            max: limits.max_literal_count,
        });
    }

    let mut total_chars = 0u64;
    for lit in lits {
        debug_assert!(!lit.pattern.is_empty(), "empty literal pattern");

        if lit.pattern.len() > limits.max_literal_len as usize {
            return Err(BuildError::LiteralTooLong {
                id: lit.id,
                len: lit.pattern.len(),
                max: limits.max_literal_len,
            });
        }
        total_chars += lit.pattern.len() as u64;
        if total_chars > limits.max_total_chars {
            return Err(BuildError::TotalCharsExceeded {
                total: total_chars,
                max: limits.max_total_chars,
            });
        }

        // The all-ones id is reserved for engine-internal use; its presence
        // is a defect in the batch producer, not a limit violation.
        if lit.id == RESERVED_LITERAL_ID {
            return Err(BuildError::ReservedIdUsed { id: lit.id });
        }
    }

    Ok(())
}

/// Computes a blob's total size from the blob alone.
///
/// Reads the engine tag from the header and delegates to the matching
/// engine's size function over the payload region. Returns 0 for a foreign
/// or corrupt blob: too short, unrecognized tag, or an engine size function
/// reporting 0. For every blob produced by [`build_matcher`] the result
/// equals the built size exactly.
pub fn bytecode_size(blob: &[u8]) -> usize {
    if blob.len() <= BYTECODE_HEADER_BYTES {
        return 0;
    }
    let Some(kind) = EngineKind::from_tag(blob[0]) else {
        return 0;
    };

    let payload = &blob[BYTECODE_HEADER_BYTES..];
    let table = match kind {
        EngineKind::SingleLiteral => single::table_size(payload),
        EngineKind::MultiLiteral => multi::table_size(payload),
    };
    if table == 0 {
        return 0;
    }

    BYTECODE_HEADER_BYTES + table
}

impl MatcherBytecode {
    /// Size reported by the engine behind the header tag; agrees with
    /// [`len`](Self::len) for every blob this crate builds.
    pub fn reported_size(&self) -> usize {
        bytecode_size(self.as_bytes())
    }
}

/// Minimum repeated-byte run length below which the engine that selection
/// *would* pick is considered safe from pathological slowdown.
///
/// Pure function of the literal count and configuration: no blob and no
/// engine invocation. Callers use it to decide whether runtime flood guards
/// are needed; [`FLOOD_RUN_UNBOUNDED`] means the engine is flood-immune.
pub fn flood_prone_run_len(num_literals: usize, cfg: &BuildConfig) -> usize {
    if cfg.allow_single_literal && num_literals <= 1 {
        return FLOOD_RUN_UNBOUNDED;
    }

    if cfg.allow_wide_vector {
        if num_literals <= multi::WIDE_BUCKET_LITERALS {
            return FLOOD_SAFE_RUN_LEN;
        }
        if cfg.hw.wide_vector && num_literals <= multi::WIDE_VECTOR_BUCKET_LITERALS {
            return FLOOD_SAFE_RUN_LEN;
        }
    }

    // Conservative fallback for large or non-wide configurations.
    FLOOD_SAFE_RUN_LEN
}

/// Reads a little-endian u64 at `off`; caller guarantees bounds.
pub(crate) fn read_u64_le(bytes: &[u8], off: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[off..off + 8]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildTrace, HwCaps, MatcherLimits};
    use crate::literal::MaskConstraint;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingTrace {
        batches: Mutex<usize>,
        engines: Mutex<Vec<EngineKind>>,
    }

    impl BuildTrace for RecordingTrace {
        fn on_batch(&self, _lits: &[Literal]) {
            *self.batches.lock().unwrap() += 1;
        }

        fn on_engine_selected(&self, kind: EngineKind) {
            self.engines.lock().unwrap().push(kind);
        }
    }

    fn restrictive() -> BuildConfig {
        BuildConfig {
            limits: MatcherLimits::RESTRICTIVE,
            ..BuildConfig::default()
        }
    }

    fn batch(count: usize, pattern_len: usize) -> Vec<Literal> {
        (0..count)
            .map(|i| {
                let byte = b'a' + (i % 26) as u8;
                let mut pattern = vec![byte; pattern_len];
                pattern[0] = b'0' + (i / 26 % 10) as u8;
                Literal::new(i as u32, pattern, 1 << (i % 64))
            })
            .collect()
    }

    #[test]
    fn count_over_limit_fails_before_any_engine() {
        let trace = Arc::new(RecordingTrace::default());
        let cfg = BuildConfig {
            trace: Some(trace.clone()),
            ..restrictive()
        };
        let lits = batch(65, 4);

        let err = build_matcher(&lits, false, &cfg, GroupMask::MAX).unwrap_err();
        assert!(matches!(err, BuildError::TooManyLiterals { count: 65, .. }));
        assert!(err.is_resource_limit());

        // The guard fired before selection: the batch hook ran, the engine
        // hook never did.
        assert_eq!(*trace.batches.lock().unwrap(), 1);
        assert!(trace.engines.lock().unwrap().is_empty());
    }

    #[test]
    fn per_literal_length_over_limit_fails() {
        let mut lits = batch(2, 4);
        lits[1].pattern = vec![b'x'; 65];

        let err = build_matcher(&lits, false, &restrictive(), GroupMask::MAX).unwrap_err();
        assert!(matches!(
            err,
            BuildError::LiteralTooLong { id: 1, len: 65, .. }
        ));
    }

    #[test]
    fn aggregate_budget_fails_when_all_lengths_are_legal() {
        // Three 64-byte literals: each length sits at the per-literal
        // ceiling, but the sum blows the aggregate budget.
        let cfg = BuildConfig {
            limits: MatcherLimits {
                max_total_chars: 128,
                ..MatcherLimits::RESTRICTIVE
            },
            ..BuildConfig::default()
        };
        let lits = batch(3, 64);
        let err = build_matcher(&lits, false, &cfg, GroupMask::MAX).unwrap_err();
        assert!(matches!(
            err,
            BuildError::TotalCharsExceeded { total: 192, max: 128 }
        ));
    }

    #[test]
    fn reserved_id_is_a_defect_regardless_of_limits() {
        let mut lits = batch(2, 4);
        lits[0].id = RESERVED_LITERAL_ID;

        let err = build_matcher(&lits, false, &BuildConfig::default(), GroupMask::MAX).unwrap_err();
        assert!(matches!(err, BuildError::ReservedIdUsed { .. }));
        assert!(err.is_internal_invariant());
        assert!(!err.is_resource_limit());
    }

    #[test]
    fn selector_prefers_the_specialist_for_one_unconstrained_literal() {
        let trace = Arc::new(RecordingTrace::default());
        let cfg = BuildConfig {
            trace: Some(trace.clone()),
            ..BuildConfig::default()
        };
        let lits = vec![Literal::new(1, b"abc".as_slice(), 1)];

        let blob = build_matcher(&lits, false, &cfg, GroupMask::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(blob.engine_kind(), Some(EngineKind::SingleLiteral));
        assert_eq!(
            trace.engines.lock().unwrap().as_slice(),
            &[EngineKind::SingleLiteral]
        );
    }

    #[test]
    fn selector_falls_back_to_multi_for_masked_or_plural_batches() {
        let cfg = BuildConfig::default();

        let two = batch(2, 4);
        let blob = build_matcher(&two, false, &cfg, GroupMask::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(blob.engine_kind(), Some(EngineKind::MultiLiteral));

        let masked = vec![Literal::new(1, b"abc".as_slice(), 1)
            .with_constraint(MaskConstraint::new([0xff], [b'a']))];
        let blob = build_matcher(&masked, false, &cfg, GroupMask::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(blob.engine_kind(), Some(EngineKind::MultiLiteral));

        let disabled = BuildConfig {
            allow_single_literal: false,
            ..BuildConfig::default()
        };
        let one = vec![Literal::new(1, b"abc".as_slice(), 1)];
        let blob = build_matcher(&one, false, &disabled, GroupMask::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(blob.engine_kind(), Some(EngineKind::MultiLiteral));
    }

    #[test]
    fn size_round_trips_for_both_engines() {
        let cfg = BuildConfig::default();

        let single = build_matcher(
            &[Literal::new(1, b"abc".as_slice(), 1)],
            false,
            &cfg,
            GroupMask::MAX,
        )
        .unwrap()
        .unwrap();
        assert_eq!(single.reported_size(), single.len());
        assert!(single.reported_size() > 0);

        let multi = build_matcher(&batch(10, 8), false, &cfg, GroupMask::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(multi.reported_size(), multi.len());
    }

    #[test]
    fn equivalent_content_is_larger_under_the_multi_engine() {
        let cfg = BuildConfig::default();
        let single = build_matcher(
            &[Literal::new(1, b"abc".as_slice(), 1)],
            false,
            &cfg,
            GroupMask::MAX,
        )
        .unwrap()
        .unwrap();
        let multi = build_matcher(
            &[
                Literal::new(1, b"abc".as_slice(), 1),
                Literal::new(2, b"xyz".as_slice(), 2),
            ],
            false,
            &cfg,
            GroupMask::MAX,
        )
        .unwrap()
        .unwrap();

        assert_ne!(single.engine_kind(), multi.engine_kind());
        assert!(multi.len() > single.len());
    }

    #[test]
    fn compiled_size_ceiling_applies_after_building() {
        let cfg = BuildConfig {
            limits: MatcherLimits {
                max_compiled_bytes: 8,
                ..MatcherLimits::RESTRICTIVE
            },
            ..BuildConfig::default()
        };
        let err = build_matcher(
            &[Literal::new(1, b"abc".as_slice(), 1)],
            false,
            &cfg,
            GroupMask::MAX,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::CompiledTooLarge { .. }));
        assert!(err.is_resource_limit());
    }

    #[test]
    fn inspector_rejects_foreign_blobs() {
        assert_eq!(bytecode_size(&[]), 0);
        assert_eq!(bytecode_size(&[0u8; BYTECODE_HEADER_BYTES]), 0);

        let blob = build_matcher(
            &[Literal::new(1, b"abc".as_slice(), 1)],
            false,
            &BuildConfig::default(),
            GroupMask::MAX,
        )
        .unwrap()
        .unwrap();

        // Unrecognized tag.
        let mut bytes = blob.as_bytes().to_vec();
        bytes[0] = 0x7f;
        assert_eq!(bytecode_size(&bytes), 0);

        // Truncated payload.
        assert_eq!(bytecode_size(&blob.as_bytes()[..blob.len() - 1]), 0);
    }

    #[test]
    fn flood_threshold_matches_the_policy_table() {
        let base = BuildConfig::default();
        assert_eq!(flood_prone_run_len(0, &base), FLOOD_RUN_UNBOUNDED);
        assert_eq!(flood_prone_run_len(1, &base), FLOOD_RUN_UNBOUNDED);
        assert_eq!(flood_prone_run_len(48, &base), 3);
        assert_eq!(flood_prone_run_len(49, &base), 3);
        assert_eq!(flood_prone_run_len(200, &base), 3);

        let wide_hw = BuildConfig {
            hw: HwCaps { wide_vector: true },
            ..BuildConfig::default()
        };
        assert_eq!(flood_prone_run_len(96, &wide_hw), 3);
        assert_eq!(flood_prone_run_len(200, &wide_hw), 3);

        let no_specialist = BuildConfig {
            allow_single_literal: false,
            ..BuildConfig::default()
        };
        assert_eq!(flood_prone_run_len(1, &no_specialist), 3);

        let no_wide = BuildConfig {
            allow_wide_vector: false,
            ..BuildConfig::default()
        };
        assert_eq!(flood_prone_run_len(48, &no_wide), 3);
    }
}
