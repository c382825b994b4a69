//! Frame buffer view and the pixel presentation boundary.
//!
//! The console's frame buffer is only valid between mutating calls, so the
//! view copies it out under the handle's lock once per virtual frame instead
//! of aliasing console memory. Re-reading every frame also covers the
//! hot-swap case where the underlying buffer moves: the first refresh after
//! `change_rom` re-queries everything.

use crate::vm::Console;

/// Presentation boundary: receives one RGBA frame per virtual frame.
pub trait PixelSink {
    fn present(&mut self, rgba: &[u8], width: usize, height: usize);
}

/// Sink that discards all video output. Used headless and in tests.
pub struct NullPixelSink;

impl PixelSink for NullPixelSink {
    fn present(&mut self, _rgba: &[u8], _width: usize, _height: usize) {}
}

/// Host-side copy of the console's RGBA frame buffer.
pub struct FrameView {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    argb: Vec<u32>,
}

impl Default for FrameView {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameView {
    /// Empty view; sizes itself on the first [`FrameView::copy_from`].
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            argb: Vec::new(),
        }
    }

    /// Create a black view sized for `console`'s current frame dimensions.
    pub fn for_console(console: &dyn Console) -> Self {
        let (width, height) = console.frame_size();
        Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
            argb: vec![0; width * height],
        }
    }

    /// Re-query and copy the console's frame buffer. Resizes if the loaded
    /// program changed the frame dimensions.
    pub fn copy_from(&mut self, console: &dyn Console) {
        let (width, height) = console.frame_size();
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.pixels.resize(width * height * 4, 0);
            self.argb.resize(width * height, 0);
        }
        let src = console.frame_buffer();
        let n = src.len().min(self.pixels.len());
        self.pixels[..n].copy_from_slice(&src[..n]);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// RGBA bytes, row-major, `width * height * 4` long.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Repack RGBA bytes as 0RGB u32 pixels for minifb.
    pub fn as_argb(&mut self) -> &[u32] {
        for (px, chunk) in self.argb.iter_mut().zip(self.pixels.chunks_exact(4)) {
            *px = (chunk[0] as u32) << 16 | (chunk[1] as u32) << 8 | chunk[2] as u32;
        }
        &self.argb
    }
}
