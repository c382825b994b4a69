//! Error taxonomy for the host loop.
//!
//! Three kinds of error cross the console boundary, and one wraps them for
//! the session's caller:
//!
//! - [`ImageError`] – malformed program image at create/load time. The
//!   session stays Stopped/Uninitialized; the old program keeps running.
//! - [`RestoreError`] – malformed or version-incompatible snapshot. The
//!   console is left with its pre-restore content, never half-applied.
//! - [`FatalError`] – the console reports an unrecoverable internal
//!   condition during step or audio fill. Forces an immediate stop; no
//!   automatic retry.
//! - [`SessionError`] – what [`Session`](crate::session::Session) operations
//!   report. The session is the single point deciding user-visible reporting;
//!   transient no-ops (a callback firing while Stopped) are absorbed silently
//!   and never appear here.

use thiserror::Error;

use crate::session::SessionState;

/// Program image rejected at create or hot-swap time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("program image too short: {0} bytes")]
    TooShort(usize),
    #[error("program image has an unrecognized magic number")]
    BadMagic,
    #[error("invalid program image: {0}")]
    Invalid(String),
}

/// Snapshot blob rejected during restore. The console state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    #[error("snapshot too short: {0} bytes")]
    TooShort(usize),
    #[error("snapshot has an unrecognized magic number")]
    BadMagic,
    #[error("snapshot version {0} is not supported")]
    UnsupportedVersion(u16),
    #[error("invalid snapshot payload: {0}")]
    Payload(String),
}

/// Unrecoverable condition reported by the console during step or audio fill.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fatal console error: {0}")]
pub struct FatalError(pub String);

/// Errors reported by session operations to the embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session was destroyed; no further operations are valid.
    #[error("session is destroyed")]
    Destroyed,
    /// The operation is not allowed in the current lifecycle state.
    #[error("{op} is not valid while the session is {state:?}")]
    InvalidState {
        op: &'static str,
        state: SessionState,
    },
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Restore(#[from] RestoreError),
    #[error(transparent)]
    Fatal(#[from] FatalError),
}
