//! End-to-end lifecycle tests against a scripted console that records every
//! call it receives, so call ordering across stop / swap / start / destroy
//! is checkable as a ledger.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use famihost::error::{FatalError, ImageError, RestoreError, SessionError};
use famihost::frame::NullPixelSink;
use famihost::input::NullHaptics;
use famihost::session::{Session, SessionState};
use famihost::vm::{Console, ConsoleFactory};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Step,
    FillAudio,
    SetButton(u8, bool),
    LoadImage,
    Capture,
    Restore,
}

type CallLog = Arc<Mutex<Vec<Call>>>;

struct Recorder {
    log: CallLog,
    drops: Arc<AtomicUsize>,
    /// Fail fatally on the nth remaining step when set.
    steps_until_fatal: Option<usize>,
    frame: Vec<u8>,
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl Console for Recorder {
    fn step(&mut self) -> Result<(), FatalError> {
        self.log.lock().unwrap().push(Call::Step);
        if let Some(n) = &mut self.steps_until_fatal {
            if *n == 0 {
                return Err(FatalError("scripted failure".into()));
            }
            *n -= 1;
        }
        Ok(())
    }
    fn frame_size(&self) -> (usize, usize) {
        (2, 2)
    }
    fn frame_buffer(&self) -> &[u8] {
        &self.frame
    }
    fn set_button(&mut self, index: u8, pressed: bool) {
        self.log.lock().unwrap().push(Call::SetButton(index, pressed));
    }
    fn fill_audio(&mut self, out: &mut [f32]) -> Result<(), FatalError> {
        self.log.lock().unwrap().push(Call::FillAudio);
        out.fill(0.1);
        Ok(())
    }
    fn sample_rate(&self) -> u32 {
        44_100
    }
    fn load_image(&mut self, _image: &[u8]) -> Result<(), ImageError> {
        self.log.lock().unwrap().push(Call::LoadImage);
        Ok(())
    }
    fn capture_state(&self) -> Vec<u8> {
        self.log.lock().unwrap().push(Call::Capture);
        vec![0xAB]
    }
    fn restore_state(&mut self, bytes: &[u8]) -> Result<(), RestoreError> {
        self.log.lock().unwrap().push(Call::Restore);
        if bytes != [0xAB] {
            return Err(RestoreError::Payload("not a recorder state".into()));
        }
        Ok(())
    }
}

struct RecorderFactory {
    log: CallLog,
    drops: Arc<AtomicUsize>,
    steps_until_fatal: Option<usize>,
}

impl ConsoleFactory for RecorderFactory {
    fn create(&self, image: &[u8]) -> Result<Box<dyn Console>, ImageError> {
        if image.is_empty() {
            return Err(ImageError::TooShort(0));
        }
        Ok(Box::new(Recorder {
            log: self.log.clone(),
            drops: self.drops.clone(),
            steps_until_fatal: self.steps_until_fatal,
            frame: vec![0; 16],
        }))
    }
}

struct Rig {
    session: Session,
    log: CallLog,
    drops: Arc<AtomicUsize>,
}

fn rig_with_fatal(steps_until_fatal: Option<usize>) -> Rig {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let drops = Arc::new(AtomicUsize::new(0));
    let session = Session::without_audio(
        Box::new(RecorderFactory {
            log: log.clone(),
            drops: drops.clone(),
            steps_until_fatal,
        }),
        Box::new(NullPixelSink),
        Box::new(NullHaptics),
    );
    Rig { session, log, drops }
}

fn rig() -> Rig {
    rig_with_fatal(None)
}

/// A vsync instant far enough past start for one advance to be due.
fn due() -> Instant {
    Instant::now() + Duration::from_millis(100)
}

#[test]
fn change_rom_lands_no_step_between_stop_and_start() {
    let mut r = rig();
    r.session.initialize(b"rom", true).unwrap();
    assert!(r.session.on_vsync(due()).unwrap());
    assert!(r.session.on_vsync(due()).unwrap());

    r.session.change_rom(b"other").unwrap();
    assert_eq!(r.session.state(), SessionState::Running);
    assert!(r.session.on_vsync(due()).unwrap());

    // The ledger shows the swap as a clean stop → load → start: the two
    // pre-swap steps, then load_image with nothing in between, then the
    // post-swap step.
    assert_eq!(
        *r.log.lock().unwrap(),
        vec![Call::Step, Call::Step, Call::LoadImage, Call::Step]
    );
}

#[test]
fn change_rom_reuses_the_same_console_instance() {
    let mut r = rig();
    r.session.initialize(b"rom", true).unwrap();
    r.session.change_rom(b"other").unwrap();
    // A swap never destroys the instance; only destroy does.
    assert_eq!(r.drops.load(Ordering::SeqCst), 0);
}

#[test]
fn stopped_session_steps_nothing() {
    let mut r = rig();
    r.session.initialize(b"rom", true).unwrap();
    assert!(r.session.on_vsync(due()).unwrap());
    r.session.stop().unwrap();

    for _ in 0..5 {
        assert!(!r.session.on_vsync(due()).unwrap());
    }
    assert_eq!(*r.log.lock().unwrap(), vec![Call::Step]);
}

#[test]
fn destroy_releases_the_console_exactly_once() {
    let mut r = rig();
    r.session.initialize(b"rom", true).unwrap();
    r.session.destroy();
    assert_eq!(r.drops.load(Ordering::SeqCst), 1);
    // Idempotent destroy, and no second release.
    r.session.destroy();
    assert_eq!(r.drops.load(Ordering::SeqCst), 1);
}

#[test]
fn destroy_then_any_call_reports_an_error() {
    let mut r = rig();
    r.session.initialize(b"rom", true).unwrap();
    r.session.destroy();
    assert_eq!(r.session.start(), Err(SessionError::Destroyed));
    assert_eq!(r.session.on_vsync(due()), Err(SessionError::Destroyed));
    assert_eq!(r.session.key_event("w", true), Err(SessionError::Destroyed));
    // And nothing reached the released console.
    assert!(!r.log.lock().unwrap().contains(&Call::SetButton(4, true)));
}

#[test]
fn fatal_step_stops_the_session_until_reinitialized() {
    let mut r = rig_with_fatal(Some(2));
    r.session.initialize(b"rom", true).unwrap();
    assert!(r.session.on_vsync(due()).unwrap());
    assert!(r.session.on_vsync(due()).unwrap());

    // Third step fails fatally: surfaced once, session forced to Stopped.
    match r.session.on_vsync(due()) {
        Err(SessionError::Fatal(err)) => assert_eq!(err, FatalError("scripted failure".into())),
        other => panic!("expected fatal error, got {other:?}"),
    }
    assert_eq!(r.session.state(), SessionState::Stopped);

    // No auto-restart: later callbacks absorb silently.
    assert!(!r.session.on_vsync(due()).unwrap());

    // Explicit initialize recovers with a fresh console.
    r.session.initialize(b"rom", true).unwrap();
    assert_eq!(r.session.state(), SessionState::Running);
    assert!(r.session.on_vsync(due()).unwrap());
    assert_eq!(r.drops.load(Ordering::SeqCst), 1);
}

#[test]
fn input_edges_reach_the_console_while_stopped_or_running() {
    let mut r = rig();
    r.session.initialize(b"rom", false).unwrap();
    assert!(r.session.key_event("l", true).unwrap());
    r.session.start().unwrap();
    assert!(r.session.key_event("l", false).unwrap());
    assert_eq!(
        *r.log.lock().unwrap(),
        vec![Call::SetButton(0, true), Call::SetButton(0, false)]
    );
}

#[test]
fn load_state_failure_is_reported_and_session_continues() {
    let mut r = rig();
    r.session.initialize(b"rom", true).unwrap();
    let good = r.session.save_state().unwrap();

    // Corrupt the payload but keep a valid header.
    let mut bad = good.clone();
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    assert!(matches!(
        r.session.load_state(&bad),
        Err(SessionError::Restore(RestoreError::Payload(_)))
    ));

    // Still running, and the good blob restores fine.
    assert_eq!(r.session.state(), SessionState::Running);
    r.session.load_state(&good).unwrap();
    assert!(r.session.on_vsync(due()).unwrap());
}
