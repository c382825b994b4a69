//! Pull-based audio: feeder, rodio source adapter, and output pipeline.
//!
//! The platform mixer pulls sample blocks on its own clock (rodio's playback
//! thread) with no tolerance for missed deadlines, so the feeder does no
//! allocation on the hot path: the destination buffer is handed straight to
//! the console's `fill_audio`, which fills it in place from its internally
//! advanced audio clock. A pull that arrives while the session is not
//! Running never touches the console; the mixer gets silence instead.
//!
//! Muting pauses the rodio sink outright (the pipeline stops pulling, it
//! does not zero-fill) and unmuting resumes the same sink with the same
//! appended source, so the feeder is registered exactly once per pipeline.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::{OutputStream, Sink, Source};
use thiserror::Error;

use crate::error::FatalError;
use crate::vm::VmHandle;

/// Samples per pull block. One block is the unit the source refills between
/// iterator items, matching the fixed per-session request size of the mixer.
pub const BLOCK_SIZE: usize = 2048;

/// Where the feeder parks a fatal fill error for the session to pick up on
/// the next display callback; the audio thread cannot stop the session
/// itself.
pub type FatalSlot = Arc<Mutex<Option<FatalError>>>;

/// Produces sample blocks on demand from the console.
pub struct AudioFeeder {
    handle: VmHandle,
    fatal: FatalSlot,
}

impl AudioFeeder {
    pub fn new(handle: VmHandle, fatal: FatalSlot) -> Self {
        Self { handle, fatal }
    }

    /// Synchronously produce exactly `out.len()` samples.
    ///
    /// Running: forwarded to the console's audio generator in place. Stopped
    /// or released: zero-filled, console untouched. A fatal fill error is
    /// recorded, the running gate is dropped so neither clock domain issues
    /// further console calls, and this block degrades to silence.
    pub fn fill(&mut self, out: &mut [f32]) {
        match self.handle.when_running(|console| console.fill_audio(&mut *out)) {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                log::error!("audio fill failed: {err}");
                self.handle.set_running(false);
                *self.fatal.lock().unwrap_or_else(|e| e.into_inner()) = Some(err);
                out.fill(0.0);
            }
            None => out.fill(0.0),
        }
    }
}

/// Endless mono `rodio::Source` pulling fixed blocks from an [`AudioFeeder`].
pub struct FeederSource {
    feeder: AudioFeeder,
    sample_rate: u32,
    block: Vec<f32>,
    pos: usize,
}

impl FeederSource {
    pub fn new(feeder: AudioFeeder, sample_rate: u32) -> Self {
        Self {
            feeder,
            sample_rate,
            // Start exhausted so the first sample triggers a fill.
            block: vec![0.0; BLOCK_SIZE],
            pos: BLOCK_SIZE,
        }
    }
}

impl Iterator for FeederSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos == self.block.len() {
            self.feeder.fill(&mut self.block);
            self.pos = 0;
        }
        let sample = self.block[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for FeederSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Opening the platform audio output failed. The session logs this and runs
/// video-only; hosts without an audio device are still usable.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("failed to create audio sink: {0}")]
    Play(#[from] rodio::PlayError),
}

/// Platform audio output: rodio stream plus the sink the source is appended
/// to. Dropping it tears the pipeline down entirely.
pub struct AudioPipeline {
    _stream: OutputStream,
    sink: Sink,
}

impl AudioPipeline {
    /// Open the default output and append `source` to a fresh sink.
    pub fn open(source: FeederSource) -> Result<Self, AudioError> {
        let (stream, stream_handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&stream_handle)?;
        sink.append(source);
        Ok(Self {
            _stream: stream,
            sink,
        })
    }

    /// Suspend pulling entirely (mute / session stop).
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume pulling with the already-appended source.
    pub fn resume(&self) {
        self.sink.play();
    }

    pub fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }
}
