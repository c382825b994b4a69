//! Host loop entry point.
//!
//! Runs a session against the built-in test-card console in a display
//! window. Game buttons: L/K (A/B), Shift/Enter (Select/Start), WASD
//! (d-pad). F5 saves state, F7 restores it, M toggles mute, Tab hot-swaps
//! between two bundled program images, Escape quits.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use famihost::error::SessionError;
use famihost::frame::PixelSink;
use famihost::input::NullHaptics;
use famihost::session::Session;
use famihost::testcard::{self, HEIGHT, TestCardFactory, WIDTH};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

/// Pixel sink backed by a buffer the window loop presents from. The session
/// writes a frame per advance; the loop shows whatever is latest.
struct WindowSink {
    pixels: Arc<Mutex<Vec<u32>>>,
}

impl PixelSink for WindowSink {
    fn present(&mut self, rgba: &[u8], _width: usize, _height: usize) {
        let mut pixels = self.pixels.lock().unwrap();
        for (px, chunk) in pixels.iter_mut().zip(rgba.chunks_exact(4)) {
            *px = (chunk[0] as u32) << 16 | (chunk[1] as u32) << 8 | chunk[2] as u32;
        }
    }
}

/// Raw identifier for a key, as the input router maps them.
fn key_id(key: Key) -> Option<&'static str> {
    match key {
        Key::L => Some("l"),
        Key::K => Some("k"),
        Key::LeftShift | Key::RightShift => Some("Shift"),
        Key::Enter => Some("Enter"),
        Key::W => Some("w"),
        Key::S => Some("s"),
        Key::A => Some("a"),
        Key::D => Some("d"),
        _ => None,
    }
}

fn main() {
    env_logger::init();

    let rom_a = testcard::image(440, 0);
    let rom_b = testcard::image(660, 3);

    let pixels = Arc::new(Mutex::new(vec![0u32; WIDTH * HEIGHT]));
    let mut session = Session::new(
        Box::new(TestCardFactory),
        Box::new(WindowSink {
            pixels: pixels.clone(),
        }),
        Box::new(NullHaptics),
    );
    session
        .initialize(&rom_a, true)
        .expect("failed to initialize session");

    let mut window = Window::new(
        "Famihost",
        WIDTH,
        HEIGHT,
        WindowOptions {
            resize: true,
            scale: minifb::Scale::FitScreen,
            scale_mode: minifb::ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        },
    )
    .expect("Failed to create window");

    window.set_target_fps(60);

    let mut save: Option<Vec<u8>> = None;
    let mut on_rom_a = true;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        for key in window.get_keys_pressed(KeyRepeat::No) {
            if let Some(id) = key_id(key) {
                session.key_event(id, true).expect("session gone");
                continue;
            }
            match key {
                Key::F5 => match session.save_state() {
                    Ok(blob) => save = Some(blob),
                    Err(err) => log::warn!("save failed: {err}"),
                },
                Key::F7 => {
                    if let Some(blob) = &save {
                        if let Err(err) = session.load_state(blob) {
                            log::warn!("load failed: {err}");
                        }
                    }
                }
                Key::M => {
                    let muted = !session.is_muted();
                    session.set_muted(muted).expect("session gone");
                }
                Key::Tab => {
                    on_rom_a = !on_rom_a;
                    let rom = if on_rom_a { &rom_a } else { &rom_b };
                    if let Err(err) = session.change_rom(rom) {
                        log::warn!("rom swap failed: {err}");
                    }
                }
                _ => {}
            }
        }
        for key in window.get_keys_released() {
            if let Some(id) = key_id(key) {
                session.key_event(id, false).expect("session gone");
            }
        }

        match session.on_vsync(Instant::now()) {
            Ok(_) => {}
            Err(SessionError::Fatal(err)) => {
                eprintln!("{err}");
                break;
            }
            Err(err) => {
                eprintln!("unexpected session error: {err}");
                break;
            }
        }

        let frame = pixels.lock().unwrap();
        window
            .update_with_buffer(&frame, WIDTH, HEIGHT)
            .expect("Failed to update window");
        drop(frame);
    }

    session.destroy();
}
