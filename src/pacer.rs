//! Frame pacing: fixed-rate stepping driven by a variable-rate callback.
//!
//! The display callback (window vsync) fires at whatever cadence the
//! platform picks: 60 Hz, 75 Hz, 144 Hz, or irregularly. The pacer turns
//! that into at most one virtual-frame advance per required interval
//! `T = 1s / target_rate`:
//!
//! - callbacks arriving less than `T` after the last advance are skipped
//!   outright (no step, no present), so a fast display never over-steps;
//! - when an advance is due, the reference tick is rebased to
//!   `now - (elapsed mod T)`, which preserves phase and keeps rounding error
//!   from accumulating into drift.
//!
//! The pacer is armed when the scheduler starts, not when it is built, so a
//! long pause before the first callback never registers as backlog.

use std::time::{Duration, Instant};

use crate::error::FatalError;
use crate::frame::{FrameView, PixelSink};
use crate::vm::VmHandle;

/// Throttle turning an arbitrary callback cadence into a fixed advance rate.
pub struct FramePacer {
    interval: Duration,
    last_tick: Option<Instant>,
}

impl FramePacer {
    /// Target rate in Hz, e.g. 60.0 for NTSC-style pacing.
    pub fn new(target_hz: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / target_hz),
            last_tick: None,
        }
    }

    /// Start pacing, with `now` as the reference tick.
    pub fn arm(&mut self, now: Instant) {
        self.last_tick = Some(now);
    }

    /// Stop pacing. Idempotent; a disarmed pacer reports nothing due.
    pub fn disarm(&mut self) {
        self.last_tick = None;
    }

    pub fn is_armed(&self) -> bool {
        self.last_tick.is_some()
    }

    /// True when one advance is due at `now`. Rebases the reference tick
    /// phase-preservingly when it fires.
    pub fn due(&mut self, now: Instant) -> bool {
        let Some(last) = self.last_tick else {
            return false;
        };
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.interval {
            return false;
        }
        let rem = Duration::from_nanos((elapsed.as_nanos() % self.interval.as_nanos()) as u64);
        self.last_tick = Some(now - rem);
        true
    }
}

/// Drives the console at the pacer's rate and hands each finished frame to
/// the pixel sink.
pub struct FrameScheduler {
    pacer: FramePacer,
    view: FrameView,
    sink: Box<dyn PixelSink>,
}

impl FrameScheduler {
    pub fn new(target_hz: f64, sink: Box<dyn PixelSink>) -> Self {
        Self {
            pacer: FramePacer::new(target_hz),
            view: FrameView::new(),
            sink,
        }
    }

    /// Arm the pacer at `now`. Called from session start, so the first
    /// advance is measured from the moment the session began running.
    pub fn start(&mut self, now: Instant) {
        self.pacer.arm(now);
    }

    /// Prevent any further advances. Idempotent.
    pub fn stop(&mut self) {
        self.pacer.disarm();
    }

    pub fn view_mut(&mut self) -> &mut FrameView {
        &mut self.view
    }

    /// Display-callback entry point: perform at most one virtual-frame
    /// advance (step, copy frame, present). Returns whether it advanced.
    ///
    /// A fatal step error disarms the scheduler before propagating, so no
    /// later callback steps a console that just reported it is broken.
    pub fn on_vsync(&mut self, now: Instant, handle: &VmHandle) -> Result<bool, FatalError> {
        if !self.pacer.due(now) {
            return Ok(false);
        }
        let view = &mut self.view;
        let stepped = handle.when_running(|console| {
            console.step()?;
            view.copy_from(console);
            Ok::<(), FatalError>(())
        });
        match stepped {
            // Fired while stopped or released: absorb silently.
            None => Ok(false),
            Some(Err(err)) => {
                self.pacer.disarm();
                Err(err)
            }
            Some(Ok(())) => {
                self.sink
                    .present(self.view.pixels(), self.view.width(), self.view.height());
                Ok(true)
            }
        }
    }
}
