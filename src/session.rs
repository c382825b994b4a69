//! Session lifecycle: the one entry point the embedding application sees.
//!
//! A [`Session`] owns the console handle and coordinates the frame
//! scheduler, the audio pipeline, and the input router through the state
//! machine
//!
//! ```text
//! Uninitialized → Initializing → Running ⇄ Stopped → Destroyed
//! ```
//!
//! Start and stop always move both real-time domains together; mute is an
//! audio-only toggle; a rom swap is serialized as stop → load → start on the
//! same handle. The Running gate lives inside the handle's mutex, so once
//! `stop` returns, neither the display callback nor the audio thread can
//! issue another `step` or `fill_audio` until `start` flips the gate back.
//!
//! Fatal errors from either domain force an immediate stop and surface from
//! [`Session::on_vsync`]; recovering requires an explicit
//! [`Session::initialize`]. After [`Session::destroy`] every operation
//! reports [`SessionError::Destroyed`].

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::audio::{AudioFeeder, AudioPipeline, FatalSlot, FeederSource};
use crate::error::{FatalError, SessionError};
use crate::frame::PixelSink;
use crate::input::{Haptics, InputRouter};
use crate::pacer::FrameScheduler;
use crate::snapshot;
use crate::vm::{ConsoleFactory, VmHandle};

/// Virtual frame rate the scheduler paces to.
pub const TARGET_FPS: f64 = 60.0;

/// Lifecycle states. `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Running,
    Stopped,
    Destroyed,
}

/// Owns one console session end to end.
pub struct Session {
    state: SessionState,
    factory: Box<dyn ConsoleFactory>,
    handle: Option<VmHandle>,
    scheduler: FrameScheduler,
    router: InputRouter,
    audio: Option<AudioPipeline>,
    audio_enabled: bool,
    muted: bool,
    fatal: FatalSlot,
}

impl Session {
    pub fn new(
        factory: Box<dyn ConsoleFactory>,
        sink: Box<dyn PixelSink>,
        haptics: Box<dyn Haptics>,
    ) -> Self {
        Self::build(factory, sink, haptics, true)
    }

    /// Session that never opens a platform audio pipeline. For embedders
    /// that only want video, and for deterministic tests.
    pub fn without_audio(
        factory: Box<dyn ConsoleFactory>,
        sink: Box<dyn PixelSink>,
        haptics: Box<dyn Haptics>,
    ) -> Self {
        Self::build(factory, sink, haptics, false)
    }

    fn build(
        factory: Box<dyn ConsoleFactory>,
        sink: Box<dyn PixelSink>,
        haptics: Box<dyn Haptics>,
        audio_enabled: bool,
    ) -> Self {
        Self {
            state: SessionState::Uninitialized,
            factory,
            handle: None,
            scheduler: FrameScheduler::new(TARGET_FPS, sink),
            router: InputRouter::new(haptics),
            audio: None,
            audio_enabled,
            muted: false,
            fatal: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Allocate a console for `image`, wire the input router, and prime the
    /// frame view. Ends Stopped, or Running when `autostart` is set.
    ///
    /// Valid from Uninitialized and from Stopped (the recovery path after a
    /// fatal error, which replaces the old console).
    pub fn initialize(&mut self, image: &[u8], autostart: bool) -> Result<(), SessionError> {
        match self.state {
            SessionState::Destroyed => return Err(SessionError::Destroyed),
            SessionState::Uninitialized | SessionState::Stopped => {}
            state => {
                return Err(SessionError::InvalidState {
                    op: "initialize",
                    state,
                });
            }
        }
        let previous = self.state;
        self.state = SessionState::Initializing;
        let console = match self.factory.create(image) {
            Ok(console) => console,
            Err(err) => {
                // Image rejected: fall back to where we were.
                self.state = previous;
                return Err(err.into());
            }
        };
        // Re-initialization replaces the old console; release it first so
        // exactly one handle is ever live.
        if let Some(old) = self.handle.take() {
            self.audio = None;
            self.router.detach();
            old.release();
        }
        self.clear_fatal();
        let handle = VmHandle::new(console);
        handle.with(|c| self.scheduler.view_mut().copy_from(c));
        self.router.attach();
        self.handle = Some(handle);
        self.state = SessionState::Stopped;
        log::info!("session initialized ({} byte image)", image.len());
        if autostart {
            self.start()?;
        }
        Ok(())
    }

    /// Stopped → Running: arm the scheduler and open the running gate; the
    /// audio pipeline resumes unless muted. Already Running is a no-op.
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Destroyed => return Err(SessionError::Destroyed),
            SessionState::Running => return Ok(()),
            SessionState::Stopped => {}
            state => return Err(SessionError::InvalidState { op: "start", state }),
        }
        let handle = self
            .handle
            .clone()
            .ok_or(SessionError::InvalidState {
                op: "start",
                state: self.state,
            })?;
        self.ensure_audio(&handle);
        handle.set_running(true);
        self.scheduler.start(Instant::now());
        if let Some(audio) = &self.audio {
            if self.muted {
                audio.pause();
            } else {
                audio.resume();
            }
        }
        self.state = SessionState::Running;
        log::info!("session started");
        Ok(())
    }

    /// Running → Stopped: suspend audio, disarm the scheduler, close the
    /// running gate. Safe to call when already Stopped.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Destroyed {
            return Err(SessionError::Destroyed);
        }
        self.stop_inner();
        Ok(())
    }

    /// Audio-only toggle; start/stop state is untouched. While muted the
    /// pipeline is suspended entirely, not zero-filling.
    pub fn set_muted(&mut self, muted: bool) -> Result<(), SessionError> {
        if self.state == SessionState::Destroyed {
            return Err(SessionError::Destroyed);
        }
        self.muted = muted;
        if let Some(audio) = &self.audio {
            if muted {
                audio.pause();
            } else if self.state == SessionState::Running {
                audio.resume();
            }
        }
        Ok(())
    }

    /// Hot-swap the program image on the same handle: stop → load → start.
    /// No step or audio fill lands in between; the frame view is re-queried
    /// because the underlying buffer may have moved.
    ///
    /// A rejected image leaves the session Stopped with the old program
    /// still loaded.
    pub fn change_rom(&mut self, image: &[u8]) -> Result<(), SessionError> {
        match self.state {
            SessionState::Destroyed => return Err(SessionError::Destroyed),
            SessionState::Running | SessionState::Stopped => {}
            state => {
                return Err(SessionError::InvalidState {
                    op: "change_rom",
                    state,
                });
            }
        }
        self.stop_inner();
        let handle = self
            .handle
            .clone()
            .ok_or(SessionError::InvalidState {
                op: "change_rom",
                state: self.state,
            })?;
        if let Some(result) = handle.with(|c| c.load_image(image)) {
            result?;
        }
        handle.with(|c| self.scheduler.view_mut().copy_from(c));
        log::info!("rom swapped ({} byte image)", image.len());
        self.start()
    }

    /// Capture the console's complete state as an opaque versioned blob.
    pub fn save_state(&self) -> Result<Vec<u8>, SessionError> {
        if self.state == SessionState::Destroyed {
            return Err(SessionError::Destroyed);
        }
        self.handle
            .as_ref()
            .and_then(|handle| handle.with(|c| snapshot::capture(&*c)))
            .ok_or(SessionError::InvalidState {
                op: "save_state",
                state: self.state,
            })
    }

    /// Restore a previously captured blob. A malformed or incompatible blob
    /// fails cleanly; the session keeps running with its pre-call state.
    pub fn load_state(&mut self, blob: &[u8]) -> Result<(), SessionError> {
        if self.state == SessionState::Destroyed {
            return Err(SessionError::Destroyed);
        }
        let Some(handle) = self.handle.clone() else {
            return Err(SessionError::InvalidState {
                op: "load_state",
                state: self.state,
            });
        };
        match handle.with(|c| snapshot::restore(c, blob)) {
            Some(result) => result?,
            None => {
                return Err(SessionError::InvalidState {
                    op: "load_state",
                    state: self.state,
                });
            }
        }
        // Restored pixels replace whatever the view held.
        handle.with(|c| self.scheduler.view_mut().copy_from(c));
        Ok(())
    }

    /// Raw key press/release. Returns whether the event was consumed (the
    /// caller should then suppress default platform handling).
    pub fn key_event(&mut self, id: &str, pressed: bool) -> Result<bool, SessionError> {
        if self.state == SessionState::Destroyed {
            return Err(SessionError::Destroyed);
        }
        let Some(handle) = &self.handle else {
            return Ok(false);
        };
        Ok(self.router.key_event(handle, id, pressed))
    }

    /// Named on-screen control press/release.
    pub fn touch_event(&mut self, name: &str, pressed: bool) -> Result<bool, SessionError> {
        if self.state == SessionState::Destroyed {
            return Err(SessionError::Destroyed);
        }
        let Some(handle) = &self.handle else {
            return Ok(false);
        };
        Ok(self.router.touch_event(handle, name, pressed))
    }

    /// Whether an on-screen control is currently shown pressed.
    pub fn touch_pressed(&self, name: &str) -> bool {
        self.router.touch_pressed(name)
    }

    /// Display-callback entry point. Returns whether a virtual frame was
    /// advanced. A fatal error, from this step or parked by the audio
    /// thread since the last callback, stops the session and surfaces as
    /// [`SessionError::Fatal`].
    pub fn on_vsync(&mut self, now: Instant) -> Result<bool, SessionError> {
        if self.state == SessionState::Destroyed {
            return Err(SessionError::Destroyed);
        }
        if let Some(err) = self.take_fatal() {
            return Err(self.fail(err));
        }
        let Some(handle) = self.handle.clone() else {
            return Ok(false);
        };
        match self.scheduler.on_vsync(now, &handle) {
            Ok(advanced) => Ok(advanced),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Tear everything down: stop both domains, drop the audio pipeline,
    /// detach the input router, release the console exactly once. Terminal;
    /// calling destroy again is a no-op, every other call errors.
    pub fn destroy(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        self.stop_inner();
        self.audio = None;
        self.router.detach();
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
        self.state = SessionState::Destroyed;
        log::info!("session destroyed");
    }

    fn stop_inner(&mut self) {
        if let Some(audio) = &self.audio {
            audio.pause();
        }
        self.scheduler.stop();
        if let Some(handle) = &self.handle {
            handle.set_running(false);
        }
        if self.state == SessionState::Running {
            self.state = SessionState::Stopped;
            log::info!("session stopped");
        }
    }

    /// Open the audio pipeline once per console. Failure (no output device)
    /// downgrades to video-only rather than failing the session.
    fn ensure_audio(&mut self, handle: &VmHandle) {
        if !self.audio_enabled || self.audio.is_some() {
            return;
        }
        let Some(sample_rate) = handle.with(|c| c.sample_rate()) else {
            return;
        };
        let feeder = AudioFeeder::new(handle.clone(), self.fatal.clone());
        match AudioPipeline::open(FeederSource::new(feeder, sample_rate)) {
            Ok(pipeline) => {
                pipeline.pause();
                self.audio = Some(pipeline);
            }
            Err(err) => log::warn!("running without audio: {err}"),
        }
    }

    fn take_fatal(&mut self) -> Option<FatalError> {
        self.fatal.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn clear_fatal(&mut self) {
        *self.fatal.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn fail(&mut self, err: FatalError) -> SessionError {
        log::error!("{err}; stopping session");
        self.stop_inner();
        SessionError::Fatal(err)
    }
}
