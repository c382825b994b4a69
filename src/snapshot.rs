//! Snapshot capture and restore: versioned opaque blobs of console state.
//!
//! Blob layout (little-endian): 4-byte magic `FHSS`, u16 format version,
//! then the console's own serialized payload. The header is validated
//! before the console is touched, so a malformed or incompatible blob fails
//! the restore cleanly with the console's pre-call state intact; a payload
//! the console itself rejects leaves it in a consistent post-error state by
//! the [`Console::restore_state`] contract. Either way the caller keeps
//! running.

use crate::error::RestoreError;
use crate::vm::Console;

const MAGIC: [u8; 4] = *b"FHSS";
const VERSION: u16 = 1;
const HEADER_LEN: usize = 6;

/// Serialize the console's complete internal state as of this call.
pub fn capture(console: &dyn Console) -> Vec<u8> {
    let payload = console.capture_state();
    let mut blob = Vec::with_capacity(HEADER_LEN + payload.len());
    blob.extend_from_slice(&MAGIC);
    blob.extend_from_slice(&VERSION.to_le_bytes());
    blob.extend_from_slice(&payload);
    blob
}

/// Replace the console's internal state with a previously captured blob.
pub fn restore(console: &mut dyn Console, blob: &[u8]) -> Result<(), RestoreError> {
    if blob.len() < HEADER_LEN {
        return Err(RestoreError::TooShort(blob.len()));
    }
    if blob[..4] != MAGIC {
        return Err(RestoreError::BadMagic);
    }
    let version = u16::from_le_bytes([blob[4], blob[5]]);
    if version != VERSION {
        // Reject incompatible versions outright; no migration.
        return Err(RestoreError::UnsupportedVersion(version));
    }
    console.restore_state(&blob[HEADER_LEN..])
}
