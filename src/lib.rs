//! Famihost: a real-time host loop for a cycle-stepped virtual console.
//!
//! The console itself (CPU, video, audio synthesis) is an external
//! collaborator behind the [`vm::Console`] trait; this crate owns everything
//! around it, the parts with real temporal and resource-ownership hazards:
//! two independently clocked callback domains (display vsync and the audio
//! pull thread) racing against one non-reentrant console that must be freed
//! exactly once.
//!
//! ## Modules
//!
//! - **audio** – pull-based feeder, rodio source adapter, output pipeline;
//!   silence while stopped, full suspension while muted
//! - **error** – image / restore / fatal taxonomy, session-level reporting
//! - **frame** – host-side RGBA frame view, pixel presentation boundary
//! - **input** – key and touch routing to edge-triggered controller buttons
//! - **pacer** – fixed-rate frame pacing over a variable-rate callback;
//!   phase-preserving, never over-stepping
//! - **session** – lifecycle state machine: initialize / start / stop /
//!   mute / rom swap / snapshot / destroy
//! - **snapshot** – versioned opaque state blobs, clean-failure restore
//! - **testcard** – minimal built-in console for the CLI and tests
//! - **vm** – the foreign console contract and the release-once handle

pub mod audio;
pub mod error;
pub mod frame;
pub mod input;
pub mod pacer;
pub mod session;
pub mod snapshot;
pub mod testcard;
pub mod vm;
