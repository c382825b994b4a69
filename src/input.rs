//! Input routing: raw key and touch events to controller button edges.
//!
//! The router holds a fixed map from raw key identifiers (and, separately,
//! named on-screen touch controls) to one of 8 controller button indices.
//! Mapped events are forwarded to the console as press/release edges and
//! reported as consumed, so the caller can suppress the platform's default
//! handling; unmapped identifiers are ignored with no side effect.
//!
//! Button state mirrors the console's controller as one bit per button
//! (bit 0 = A through bit 7 = Right), so auto-repeat and duplicate events
//! collapse: only actual transitions reach the console. Touch controls
//! additionally keep a local pressed visual flag and fire one haptic pulse
//! per press edge.
//!
//! Attach/detach is symmetric: a detached router drops every event, and
//! detaching clears all local state, so a stop → start cycle never doubles
//! up forwarding.

use std::collections::{HashMap, HashSet};

use crate::vm::VmHandle;

/// Haptic actuator for touch controls. Press edges fire one short pulse;
/// release edges never do.
pub trait Haptics {
    fn pulse(&mut self);
}

/// Haptics for hosts without an actuator.
pub struct NullHaptics;

impl Haptics for NullHaptics {
    fn pulse(&mut self) {}
}

/// Default key bindings: A, B, Select, Start, Up, Down, Left, Right.
const DEFAULT_KEY_MAP: [(&str, u8); 8] = [
    ("l", 0),
    ("k", 1),
    ("Shift", 2),
    ("Enter", 3),
    ("w", 4),
    ("s", 5),
    ("a", 6),
    ("d", 7),
];

/// Default named touch controls, one per button.
const DEFAULT_TOUCH_MAP: [(&str, u8); 8] = [
    ("a", 0),
    ("b", 1),
    ("select", 2),
    ("start", 3),
    ("up", 4),
    ("down", 5),
    ("left", 6),
    ("right", 7),
];

/// Routes raw input events to console button edges.
pub struct InputRouter {
    keys: HashMap<String, u8>,
    touches: HashMap<String, u8>,
    /// One bit per button index; mirrors what the console has been told.
    state: u8,
    /// Touch controls currently shown pressed.
    touched: HashSet<String>,
    attached: bool,
    haptics: Box<dyn Haptics>,
}

impl InputRouter {
    /// Router with the default key and touch bindings.
    pub fn new(haptics: Box<dyn Haptics>) -> Self {
        Self {
            keys: DEFAULT_KEY_MAP
                .iter()
                .map(|&(id, idx)| (id.to_string(), idx))
                .collect(),
            touches: DEFAULT_TOUCH_MAP
                .iter()
                .map(|&(id, idx)| (id.to_string(), idx))
                .collect(),
            state: 0,
            touched: HashSet::new(),
            attached: false,
            haptics,
        }
    }

    /// Start delivering events. Attaching twice is a no-op.
    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Stop delivering events and clear all pressed state, so a later
    /// attach starts from scratch instead of replaying stale edges.
    pub fn detach(&mut self) {
        self.attached = false;
        self.state = 0;
        self.touched.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Raw key press/release. Returns true when the event was mapped and
    /// consumed (caller suppresses default handling).
    pub fn key_event(&mut self, handle: &VmHandle, id: &str, pressed: bool) -> bool {
        if !self.attached {
            return false;
        }
        let Some(&index) = self.keys.get(id) else {
            return false;
        };
        self.forward_edge(handle, index, pressed);
        true
    }

    /// Named touch control press/release. Press edges also flip the local
    /// visual flag and fire one haptic pulse.
    pub fn touch_event(&mut self, handle: &VmHandle, name: &str, pressed: bool) -> bool {
        if !self.attached {
            return false;
        }
        let Some(&index) = self.touches.get(name) else {
            return false;
        };
        if pressed {
            if self.touched.insert(name.to_string()) {
                self.haptics.pulse();
            }
        } else {
            self.touched.remove(name);
        }
        self.forward_edge(handle, index, pressed);
        true
    }

    /// Whether a touch control is currently shown pressed.
    pub fn touch_pressed(&self, name: &str) -> bool {
        self.touched.contains(name)
    }

    /// Forward only actual transitions; duplicates (key auto-repeat) are
    /// swallowed by the state mirror.
    fn forward_edge(&mut self, handle: &VmHandle, index: u8, pressed: bool) {
        let bit = 1u8 << index;
        let was = self.state & bit != 0;
        if was == pressed {
            return;
        }
        if pressed {
            self.state |= bit;
        } else {
            self.state &= !bit;
        }
        handle.with(|console| console.set_button(index, pressed));
    }
}
