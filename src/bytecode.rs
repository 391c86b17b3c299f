//! Tagged, cache-line-aligned bytecode artifact produced by the build stage.
//!
//! A [`MatcherBytecode`] is one contiguous allocation: a fixed-size header
//! whose first byte is the engine tag, followed by the chosen engine's
//! opaque payload. Header and payload share the allocation and are freed as
//! a unit; there are no internal ownership boundaries. The artifact is
//! immutable after construction and self-contained: interpreting it later
//! requires neither the original literal batch nor any builder state.
//!
//! # Invariants
//! - The allocation is aligned to [`CACHE_LINE_BYTES`].
//! - `len == BYTECODE_HEADER_BYTES + payload_len` and `payload_len > 0`.
//! - Reserved header bytes are zeroed, so identical inputs produce
//!   byte-identical blobs.

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::fmt;
use std::ptr::NonNull;

/// Cache-line size the blob is aligned to.
///
/// This constant is not queried from the hardware. If you target a platform
/// with a different coherence granule, adjust it accordingly.
pub const CACHE_LINE_BYTES: usize = 64;

/// Size of the blob header: the engine tag plus zeroed reserved space,
/// rounded up to a full cache line so the payload starts aligned.
pub const BYTECODE_HEADER_BYTES: usize = CACHE_LINE_BYTES;

/// Engine that produced a bytecode payload.
///
/// Tags are stable wire values: the runtime dispatches on the tag byte
/// without knowing which builder ran. Exactly two values are recognized;
/// anything else marks a foreign or corrupt blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Specialist for exactly one unconstrained literal.
    SingleLiteral,
    /// General engine handling any batch shape.
    MultiLiteral,
}

impl EngineKind {
    /// Wire tag stored in the blob header.
    pub const fn tag(self) -> u8 {
        match self {
            Self::SingleLiteral => 0,
            Self::MultiLiteral => 1,
        }
    }

    /// Decodes a header tag; `None` for unrecognized values.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::SingleLiteral),
            1 => Some(Self::MultiLiteral),
            _ => None,
        }
    }
}

/// Compiled literal-matcher artifact: engine tag plus opaque payload in one
/// cache-line-aligned allocation.
///
/// Owned exclusively by the caller; dropping it releases the whole
/// allocation at once.
pub struct MatcherBytecode {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

// SAFETY: the allocation is exclusively owned, never aliased mutably, and
// immutable after construction.
unsafe impl Send for MatcherBytecode {}
unsafe impl Sync for MatcherBytecode {}

impl MatcherBytecode {
    /// Packages an engine payload behind a tagged header.
    ///
    /// Allocates `BYTECODE_HEADER_BYTES + payload.len()` bytes aligned to
    /// the cache line, zeroes the header, writes the tag, and copies the
    /// payload verbatim.
    pub(crate) fn assemble(kind: EngineKind, payload: &[u8]) -> Self {
        debug_assert!(!payload.is_empty(), "empty engine payload");

        let total = BYTECODE_HEADER_BYTES + payload.len();
        // Payload length is bounded by the compiled-size ceiling, so the
        // layout is always representable.
        let layout = Layout::from_size_align(total, CACHE_LINE_BYTES).expect("bytecode layout");

        // SAFETY: layout is valid and has non-zero size.
        let raw = unsafe { alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            handle_alloc_error(layout);
        };

        // SAFETY: the allocation is `total` bytes; header and payload ranges
        // are disjoint and in bounds.
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, BYTECODE_HEADER_BYTES);
            *ptr.as_ptr() = kind.tag();
            std::ptr::copy_nonoverlapping(
                payload.as_ptr(),
                ptr.as_ptr().add(BYTECODE_HEADER_BYTES),
                payload.len(),
            );
        }

        Self {
            ptr,
            len: total,
            layout,
        }
    }

    /// Total size in bytes (header plus payload).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: a blob is never assembled without a payload.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The whole artifact, header included.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: ptr/len describe one live allocation we own.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Engine recorded in the header tag; `None` for an unrecognized tag.
    pub fn engine_kind(&self) -> Option<EngineKind> {
        EngineKind::from_tag(self.as_bytes()[0])
    }

    /// The engine-specific payload region after the header.
    pub fn payload(&self) -> &[u8] {
        &self.as_bytes()[BYTECODE_HEADER_BYTES..]
    }
}

impl Drop for MatcherBytecode {
    fn drop(&mut self) {
        // Avoid panicking in Drop (double-panics during unwind can abort).
        unsafe {
            dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

impl fmt::Debug for MatcherBytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherBytecode")
            .field("engine", &self.engine_kind())
            .field("len", &self.len)
            .finish()
    }
}
