//! Snapshot round-trip behavioral identity, observed from the outside: the
//! pixel frames a session presents after a capture → restore are exactly
//! the frames it would have presented without the detour.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use famihost::frame::PixelSink;
use famihost::input::NullHaptics;
use famihost::session::Session;
use famihost::testcard::{self, TestCardFactory};

/// Sink that keeps every presented frame.
struct RecordingSink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl PixelSink for RecordingSink {
    fn present(&mut self, rgba: &[u8], _width: usize, _height: usize) {
        self.frames.lock().unwrap().push(rgba.to_vec());
    }
}

fn session() -> (Session, Arc<Mutex<Vec<Vec<u8>>>>) {
    let frames = Arc::new(Mutex::new(Vec::new()));
    let session = Session::without_audio(
        Box::new(TestCardFactory),
        Box::new(RecordingSink {
            frames: frames.clone(),
        }),
        Box::new(NullHaptics),
    );
    (session, frames)
}

fn advance(session: &mut Session, frames: usize) {
    let mut advanced = 0;
    while advanced < frames {
        if session
            .on_vsync(Instant::now() + Duration::from_millis(100))
            .unwrap()
        {
            advanced += 1;
        }
    }
}

#[test]
fn restore_replays_the_exact_frames_capture_saw_coming() {
    let (mut session, frames) = session();
    session.initialize(&testcard::image(330, 2), true).unwrap();
    advance(&mut session, 3);

    let blob = session.save_state().unwrap();
    advance(&mut session, 2);
    let after_capture: Vec<Vec<u8>> = frames.lock().unwrap()[3..5].to_vec();

    session.load_state(&blob).unwrap();
    advance(&mut session, 2);
    let after_restore: Vec<Vec<u8>> = frames.lock().unwrap()[5..7].to_vec();

    assert_eq!(after_capture, after_restore);
}

#[test]
fn round_tripped_blob_is_byte_identical() {
    let (mut session, _frames) = session();
    session.initialize(&testcard::image(330, 2), true).unwrap();
    advance(&mut session, 4);
    session.stop().unwrap();

    let blob = session.save_state().unwrap();
    session.load_state(&blob).unwrap();
    assert_eq!(session.save_state().unwrap(), blob);
}

#[test]
fn restore_works_across_a_rom_swap() {
    // Save under one program, swap, then restoring brings the old program
    // state back (the snapshot carries the whole console state).
    let (mut session, _frames) = session();
    session.initialize(&testcard::image(330, 2), true).unwrap();
    advance(&mut session, 3);
    let blob = session.save_state().unwrap();

    session.change_rom(&testcard::image(550, 7)).unwrap();
    advance(&mut session, 1);

    session.load_state(&blob).unwrap();
    assert_eq!(session.save_state().unwrap(), blob);
}
