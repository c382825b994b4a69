//! Opaque console contract and the shared, release-once handle around it.
//!
//! The host loop never names a concrete console. Everything it drives sits
//! behind the [`Console`] trait: one `step` call advances exactly one virtual
//! frame, `fill_audio` produces samples from the console's own audio clock
//! (kept in lockstep with its step count), and the frame buffer is a
//! `width × height × 4` RGBA region re-read after every step.
//!
//! [`VmHandle`] is the single ownership point. The frame scheduler runs on
//! the display thread while rodio pulls audio from its playback thread, so
//! every console entry point goes through one mutex; the Running flag lives
//! inside the same mutex so a state check and the call it gates are atomic.
//! Release happens exactly once: the console is `take`n out of the slot, and
//! any later access observes an empty slot instead of freed state.

use std::sync::{Arc, Mutex};

use crate::error::{FatalError, ImageError, RestoreError};

/// Fixed contract of the virtual console the host drives.
///
/// `step` and `fill_audio` are not reentrant; [`VmHandle`] guarantees at most
/// one in-flight call by routing everything through its mutex.
pub trait Console: Send {
    /// Advance exactly one virtual frame of emulated time.
    fn step(&mut self) -> Result<(), FatalError>;

    /// Frame dimensions in pixels; fixed for the lifetime of a loaded program.
    fn frame_size(&self) -> (usize, usize);

    /// Current RGBA frame buffer, `width * height * 4` bytes. Valid only
    /// until the next call that mutates the console; callers copy, not alias.
    fn frame_buffer(&self) -> &[u8];

    /// Press or release one of up to 8 controller buttons.
    fn set_button(&mut self, index: u8, pressed: bool);

    /// Fill `out` in place with mono f32 samples at [`Console::sample_rate`].
    fn fill_audio(&mut self, out: &mut [f32]) -> Result<(), FatalError>;

    /// Audio sample rate in Hz; fixed per session.
    fn sample_rate(&self) -> u32;

    /// Replace the running program in place. The frame buffer may move;
    /// views into it must be refreshed afterwards.
    fn load_image(&mut self, image: &[u8]) -> Result<(), ImageError>;

    /// Serialize the complete internal state as of this call.
    fn capture_state(&self) -> Vec<u8>;

    /// Replace the complete internal state with `bytes`. On error the
    /// console keeps a consistent state, never a half-applied one.
    fn restore_state(&mut self, bytes: &[u8]) -> Result<(), RestoreError>;
}

/// Creates consoles from program images. The session owns one factory so
/// `initialize` can allocate a console without naming its type.
pub trait ConsoleFactory {
    fn create(&self, image: &[u8]) -> Result<Box<dyn Console>, ImageError>;
}

struct Slot {
    console: Option<Box<dyn Console>>,
    running: bool,
}

/// Shared, mutex-guarded, release-once owner of one console.
///
/// Clones share the same slot: the session, the frame scheduler, and the
/// audio feeder all see the same console and the same Running flag.
#[derive(Clone)]
pub struct VmHandle {
    slot: Arc<Mutex<Slot>>,
}

impl VmHandle {
    pub fn new(console: Box<dyn Console>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                console: Some(console),
                running: false,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        // A panic while holding the lock poisons it; the slot data is still
        // consistent enough to keep serving silence / no-ops.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against the console if it has not been released.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn Console) -> R) -> Option<R> {
        let mut slot = self.lock();
        slot.console.as_mut().map(|c| f(c.as_mut()))
    }

    /// Run `f` only while the session is Running and the console is live.
    /// The check and the call happen under one lock, so a concurrent stop
    /// cannot slip in between them.
    pub fn when_running<R>(&self, f: impl FnOnce(&mut dyn Console) -> R) -> Option<R> {
        let mut slot = self.lock();
        if !slot.running {
            return None;
        }
        slot.console.as_mut().map(|c| f(c.as_mut()))
    }

    /// Gate for the two real-time callers. Flipped by the session on
    /// start/stop; callbacks arriving while false no-op safely.
    pub fn set_running(&self, running: bool) {
        self.lock().running = running;
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn is_released(&self) -> bool {
        self.lock().console.is_none()
    }

    /// Release the console exactly once. Returns false if it was already
    /// released; the underlying instance is never freed twice.
    pub fn release(&self) -> bool {
        let mut slot = self.lock();
        slot.running = false;
        slot.console.take().is_some()
    }
}
