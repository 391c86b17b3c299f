//! Single-literal engine builder.
//!
//! The specialist handles exactly one unconstrained literal. Its payload is
//! a flat little-endian table the runtime interprets directly:
//!
//! ```text
//! offset  0  u64  total_size      (== TABLE_HEADER_BYTES + pattern_len)
//! offset  8  u32  id
//! offset 12  u32  pattern_len
//! offset 16  u32  anchor_offset   (offset of the scan anchor byte)
//! offset 20  u8   flags           (bit 0: case-insensitive)
//! offset 21  u8[3] reserved, zeroed
//! offset 24  pattern bytes        (ASCII-folded to lowercase when nocase)
//! ```
//!
//! The anchor byte seeds the runtime's vectorized sweep; it is chosen as
//! the rarest byte of the pattern so candidate positions stay sparse even
//! in text-heavy input.

use crate::config::BuildConfig;
use crate::literal::Literal;
use crate::matcher::read_u64_le;

pub(crate) const TABLE_HEADER_BYTES: usize = 24;

const FLAG_NOCASE: u8 = 1 << 0;

/// True if the batch qualifies for the single-literal specialist.
///
/// Requires the specialist to be enabled, exactly one literal, and no
/// supplementary mask constraint.
pub(crate) fn eligible(lits: &[Literal], cfg: &BuildConfig) -> bool {
    if !cfg.allow_single_literal {
        return false;
    }
    if lits.len() != 1 {
        return false;
    }
    if lits[0].constraint.is_some() {
        return false;
    }
    true
}

/// Compiles the specialist table for one literal.
///
/// Returns `None` when there is nothing meaningful to match; callers treat
/// that as "no matcher needed", not a failure.
pub(crate) fn build(lit: &Literal) -> Option<Vec<u8>> {
    debug_assert!(!lit.pattern.is_empty(), "empty literal pattern");
    debug_assert!(lit.constraint.is_none(), "masked literal in specialist");

    let pattern = if lit.nocase {
        lit.pattern.to_ascii_lowercase()
    } else {
        lit.pattern.clone()
    };

    let total = TABLE_HEADER_BYTES + pattern.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(total as u64).to_le_bytes());
    out.extend_from_slice(&lit.id.to_le_bytes());
    out.extend_from_slice(&(pattern.len() as u32).to_le_bytes());
    out.extend_from_slice(&anchor_offset(&pattern).to_le_bytes());
    out.push(if lit.nocase { FLAG_NOCASE } else { 0 });
    out.extend_from_slice(&[0u8; 3]);
    out.extend_from_slice(&pattern);
    debug_assert_eq!(out.len(), total);

    Some(out)
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

    // Cross-check the recorded pattern length against the total.
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&payload[12..16]);
    let pattern_len = u32::from_le_bytes(buf) as usize;
    if total - TABLE_HEADER_BYTES != pattern_len {
        return 0;
    }

    total
}

/// Rough rarity classes for anchor selection. Higher is rarer in typical
/// scanned input: English-heavy text and source code.
fn byte_rarity(b: u8) -> u8 {
    match b {
        b' ' | b'e' | b't' | b'a' | b'o' | b'i' | b'n' => 0,
        b's' | b'r' | b'h' | b'l' | b'd' | b'u' | b'c' => 1,
        b'0'..=b'9' => 2,
        b'A'..=b'Z' | b'a'..=b'z' => 3,
        0x21..=0x7e => 4,
        _ => 5,
    }
}

/// Offset of the rarest byte in the pattern. Ties resolve to the latest
/// offset so the runtime confirms near the literal tail.
fn anchor_offset(pattern: &[u8]) -> u32 {
    let mut best_off = 0usize;
    let mut best_rarity = 0u8;
    for (off, &b) in pattern.iter().enumerate() {
        let rarity = byte_rarity(b);
        if rarity >= best_rarity {
            best_rarity = rarity;
            best_off = off;
        }
    }
    best_off as u32
}
