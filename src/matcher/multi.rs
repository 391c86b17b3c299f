//! Multi-literal engine builder.
//!
//! The general engine handles any batch shape, including a degenerate
//! single literal. Building runs in two steps: probe an automaton over the
//! (case-folded, deduped) pattern universe to pick a table layout and
//! capture a heap hint, then serialize the batch into a flat little-endian
//! table the runtime rehydrates without this crate's help:
//!
//! ```text
//! offset  0  u64  total_size
//! offset  8  u32  literal_count
//! offset 12  u8   layout          (see `TableLayout`)
//! offset 13  u8   flags           (bit 0: any nocase, bit 1: any masked)
//! offset 14  u16  reserved, zeroed
//! offset 16  u32  heap_hint       (probe automaton heap bytes, saturated)
//! then per literal:
//!   u32 id, u64 groups, u8 flags (bit 0: nocase, bit 1: masked),
//!   u8 reserved, u32 pattern_len, u32 mask_len,
//!   [pattern][mask][value]
//! ```

use aho_corasick::{packed, AhoCorasickBuilder, AhoCorasickKind, MatchKind};
use ahash::AHashSet;

use crate::config::{BuildConfig, HwCaps};
use crate::error::BuildError;
use crate::literal::Literal;
use crate::matcher::read_u64_le;

pub(crate) const TABLE_HEADER_BYTES: usize = 20;
pub(crate) const LITERAL_RECORD_BYTES: usize = 22;

/// Most literals the wide-vector layout can bucket on baseline hardware.
pub(crate) const WIDE_BUCKET_LITERALS: usize = 48;

/// Wide-layout bucket budget when wide-vector instructions are available.
pub(crate) const WIDE_VECTOR_BUCKET_LITERALS: usize = 96;

const FLAG_ANY_NOCASE: u8 = 1 << 0;
const FLAG_ANY_MASKED: u8 = 1 << 1;

const LIT_FLAG_NOCASE: u8 = 1 << 0;
const LIT_FLAG_MASKED: u8 = 1 << 1;

/// Table layout the runtime should instantiate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum TableLayout {
    /// Dense automaton, throughput-first.
    Dense = 0,
    /// Compact automaton, memory-first (the "prefer compact" hint).
    Compact = 1,
    /// Packed wide-vector searcher over small batches.
    PackedWide = 2,
}

/// True if the batch is small enough for the wide-vector layout.
pub(crate) fn fits_wide(count: usize, hw: HwCaps) -> bool {
    count <= WIDE_BUCKET_LITERALS || (hw.wide_vector && count <= WIDE_VECTOR_BUCKET_LITERALS)
}

/// Compiles the general table for a literal batch.
///
/// `prefer_compact` trades throughput for a smaller runtime automaton.
/// Returns `Ok(None)` when the batch reduces to nothing meaningful to
/// match; probe failures are propagated unchanged.
pub(crate) fn build(
    lits: &[Literal],
    prefer_compact: bool,
    cfg: &BuildConfig,
) -> Result<Option<Vec<u8>>, BuildError> {
    if lits.is_empty() {
        return Ok(None);
    }

    // Pattern universe for the probe: case-fold nocase literals and dedup.
    // The automaton treats identical patterns as one, so feeding duplicates
    // would only skew the heap hint.
    let mut seen: AHashSet<Vec<u8>> = AHashSet::with_capacity(lits.len());
    let mut patterns: Vec<Vec<u8>> = Vec::with_capacity(lits.len());
    for lit in lits {
        debug_assert!(!lit.pattern.is_empty(), "empty literal pattern");
        let pat = if lit.nocase {
            lit.pattern.to_ascii_lowercase()
        } else {
            lit.pattern.clone()
        };
        if seen.insert(pat.clone()) {
            patterns.push(pat);
        }
    }

    let (layout, heap_hint) = probe_layout(&patterns, lits.len(), prefer_compact, cfg)?;
    Ok(Some(serialize(lits, layout, heap_hint)))
}

/// Picks the table layout by building a throwaway automaton over the
/// pattern universe and measuring it.
fn probe_layout(
    patterns: &[Vec<u8>],
    literal_count: usize,
    prefer_compact: bool,
    cfg: &BuildConfig,
) -> Result<(TableLayout, u32), BuildError> {
    if cfg.allow_wide_vector && fits_wide(literal_count, cfg.hw) {
        let searcher = packed::Config::new()
            .match_kind(packed::MatchKind::LeftmostLongest)
            .builder()
            .extend(patterns)
            .build();
        if let Some(searcher) = searcher {
            return Ok((TableLayout::PackedWide, saturate(searcher.memory_usage())));
        }
        // Packed searcher unavailable for this pattern set or build host;
        // fall through to the general automaton.
    }

    let kind = if prefer_compact {
        AhoCorasickKind::ContiguousNFA
    } else {
        AhoCorasickKind::DFA
    };
    let automaton = AhoCorasickBuilder::new()
        .match_kind(MatchKind::Standard)
        .kind(Some(kind))
        .prefilter(true)
        .build(patterns)
        .map_err(|err| BuildError::AutomatonBuild {
            reason: err.to_string(),
        })?;

    let layout = if prefer_compact {
        TableLayout::Compact
    } else {
        TableLayout::Dense
    };
    Ok((layout, saturate(automaton.memory_usage())))
}

fn saturate(bytes: usize) -> u32 {
    u32::try_from(bytes).unwrap_or(u32::MAX)
}

fn serialize(lits: &[Literal], layout: TableLayout, heap_hint: u32) -> Vec<u8> {
    let mut total = TABLE_HEADER_BYTES;
    let mut flags = 0u8;
    for lit in lits {
        total += LITERAL_RECORD_BYTES + lit.pattern.len();
        if lit.nocase {
            flags |= FLAG_ANY_NOCASE;
        }
        if let Some(c) = &lit.constraint {
            flags |= FLAG_ANY_MASKED;
            total += c.mask.len() + c.value.len();
        }
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(total as u64).to_le_bytes());
    out.extend_from_slice(&(lits.len() as u32).to_le_bytes());
    out.push(layout as u8);
    out.push(flags);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&heap_hint.to_le_bytes());

    for lit in lits {
        let mut lit_flags = 0u8;
        if lit.nocase {
            lit_flags |= LIT_FLAG_NOCASE;
        }
        if lit.constraint.is_some() {
            lit_flags |= LIT_FLAG_MASKED;
        }
        let mask_len = lit.constraint.as_ref().map_or(0, |c| c.mask.len());

        out.extend_from_slice(&lit.id.to_le_bytes());
        out.extend_from_slice(&lit.groups.to_le_bytes());
        out.push(lit_flags);
        out.push(0);
        out.extend_from_slice(&(lit.pattern.len() as u32).to_le_bytes());
        out.extend_from_slice(&(mask_len as u32).to_le_bytes());
        out.extend_from_slice(&lit.pattern);
        if let Some(c) = &lit.constraint {
            out.extend_from_slice(&c.mask);
            out.extend_from_slice(&c.value);
        }
    }
    debug_assert_eq!(out.len(), total);

    out
}

/// Reports the table's byte size from the payload alone.
///
/// Returns 0 for anything that does not parse as a well-formed table.
pub(crate) fn table_size(payload: &[u8]) -> usize {
    if payload.len() < TABLE_HEADER_BYTES {
        return 0;
    }
    let total = read_u64_le(payload, 0) as usize;
    if total < TABLE_HEADER_BYTES || total > payload.len() {
        return 0;
    }
    if payload[12] > TableLayout::PackedWide as u8 {
        return 0;
    }

    // Cheap consistency check: the fixed per-literal records alone must fit.
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&payload[8..12]);
    let count = u32::from_le_bytes(buf) as usize;
    if total - TABLE_HEADER_BYTES < count.saturating_mul(LITERAL_RECORD_BYTES) {
        return 0;
    }

    total
}
