//! Fuzz target for the bytecode size inspector.
//!
//! The inspector runs on blobs it did not necessarily build, so it must
//! never panic, overread, or report a size beyond the buffer it was given.
//! Foreign or corrupt input reports 0.
//!
//! # Running
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_bytecode_size
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

use litmatch::bytecode_size;

fuzz_target!(|data: &[u8]| {
    let size = bytecode_size(data);
    assert!(size == 0 || size <= data.len());
});
