//! Built-in test-card console: a minimal [`Console`] implementation.
//!
//! Renders a scrolling color pattern and plays a fixed-frequency tone, with
//! fully deterministic, snapshotable state. It exists so the CLI front end
//! and the integration tests have something to drive; it deliberately
//! contains no emulation machinery. Real consoles live behind the same
//! trait in their own crates.
//!
//! Program image layout (8 bytes, little-endian): magic `TCRD`, tone
//! frequency in Hz (u16), pattern selector (u8), reserved (u8).

use std::f32::consts::TAU;

use crate::error::{FatalError, ImageError, RestoreError};
use crate::vm::{Console, ConsoleFactory};

pub const WIDTH: usize = 256;
pub const HEIGHT: usize = 240;
pub const SAMPLE_RATE: u32 = 44_100;

const IMAGE_MAGIC: [u8; 4] = *b"TCRD";
const IMAGE_LEN: usize = 8;
/// tone u16 + pattern u8 + frame_count u64 + phase f32.
const STATE_LEN: usize = 15;

/// Build a test-card program image for the given tone and pattern.
pub fn image(tone_hz: u16, pattern: u8) -> Vec<u8> {
    let mut image = Vec::with_capacity(IMAGE_LEN);
    image.extend_from_slice(&IMAGE_MAGIC);
    image.extend_from_slice(&tone_hz.to_le_bytes());
    image.push(pattern);
    image.push(0);
    image
}

fn parse_image(image: &[u8]) -> Result<(u16, u8), ImageError> {
    if image.len() < IMAGE_LEN {
        return Err(ImageError::TooShort(image.len()));
    }
    if image[..4] != IMAGE_MAGIC {
        return Err(ImageError::BadMagic);
    }
    Ok((u16::from_le_bytes([image[4], image[5]]), image[6]))
}

/// Deterministic pattern-and-tone console.
pub struct TestCard {
    tone_hz: u16,
    pattern: u8,
    frame_count: u64,
    /// Tone phase in radians; advances per generated sample, so audio is
    /// continuous across pull blocks.
    phase: f32,
    frame: Vec<u8>,
}

impl TestCard {
    pub fn from_image(image: &[u8]) -> Result<Self, ImageError> {
        let (tone_hz, pattern) = parse_image(image)?;
        let mut card = Self {
            tone_hz,
            pattern,
            frame_count: 0,
            phase: 0.0,
            frame: vec![0; WIDTH * HEIGHT * 4],
        };
        card.redraw();
        Ok(card)
    }

    /// Regenerate the frame buffer from (pattern, frame_count). Pure, so a
    /// restored snapshot reproduces pixels exactly.
    fn redraw(&mut self) {
        let scroll = self.frame_count as usize;
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let i = (y * WIDTH + x) * 4;
                self.frame[i] = ((x + scroll) & 0xFF) as u8;
                self.frame[i + 1] = (y & 0xFF) as u8;
                self.frame[i + 2] = self.pattern.wrapping_mul(0x1F) ^ ((x ^ y) & 0xFF) as u8;
                self.frame[i + 3] = 0xFF;
            }
        }
    }
}

impl Console for TestCard {
    fn step(&mut self) -> Result<(), FatalError> {
        self.frame_count += 1;
        self.redraw();
        Ok(())
    }

    fn frame_size(&self) -> (usize, usize) {
        (WIDTH, HEIGHT)
    }

    fn frame_buffer(&self) -> &[u8] {
        &self.frame
    }

    fn set_button(&mut self, _index: u8, _pressed: bool) {
        // The test card has no game logic to react to input.
    }

    fn fill_audio(&mut self, out: &mut [f32]) -> Result<(), FatalError> {
        let step = TAU * self.tone_hz as f32 / SAMPLE_RATE as f32;
        for sample in out.iter_mut() {
            *sample = 0.25 * self.phase.sin();
            self.phase += step;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn load_image(&mut self, image: &[u8]) -> Result<(), ImageError> {
        // Validate before mutating so a bad image leaves the old program
        // running.
        let (tone_hz, pattern) = parse_image(image)?;
        self.tone_hz = tone_hz;
        self.pattern = pattern;
        self.frame_count = 0;
        self.phase = 0.0;
        // Fresh allocation: the frame buffer moves, like a reloaded console
        // remapping its memory.
        self.frame = vec![0; WIDTH * HEIGHT * 4];
        self.redraw();
        Ok(())
    }

    fn capture_state(&self) -> Vec<u8> {
        let mut state = Vec::with_capacity(STATE_LEN);
        state.extend_from_slice(&self.tone_hz.to_le_bytes());
        state.push(self.pattern);
        state.extend_from_slice(&self.frame_count.to_le_bytes());
        state.extend_from_slice(&self.phase.to_le_bytes());
        state
    }

    fn restore_state(&mut self, bytes: &[u8]) -> Result<(), RestoreError> {
        if bytes.len() != STATE_LEN {
            return Err(RestoreError::Payload(format!(
                "expected {STATE_LEN} state bytes, got {}",
                bytes.len()
            )));
        }
        self.tone_hz = u16::from_le_bytes([bytes[0], bytes[1]]);
        self.pattern = bytes[2];
        self.frame_count = u64::from_le_bytes(bytes[3..11].try_into().unwrap());
        self.phase = f32::from_le_bytes(bytes[11..15].try_into().unwrap());
        self.redraw();
        Ok(())
    }
}

/// Factory handing [`Session`](crate::session::Session) fresh test cards.
pub struct TestCardFactory;

impl ConsoleFactory for TestCardFactory {
    fn create(&self, image: &[u8]) -> Result<Box<dyn Console>, ImageError> {
        Ok(Box::new(TestCard::from_image(image)?))
    }
}
