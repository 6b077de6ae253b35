//! Joystick numbering and conversion.
//!
//! The physical DB9 ports (and keyboard joystick emulation) are numbered 0
//! (the mouse port) and 1 (the joystick port).  When USB joysticks are
//! attached they take over the primary slots, and the physical ports are
//! shifted up.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::JoyState;
use crate::constants::NUM_DB9_PORTS;

/// Maps a physical joystick port to the slot the core sees it in.
///
/// - No USB joysticks: unchanged.
/// - Port 0 becomes slot 0 if `prefer_db9` is set, otherwise the slot after
///   the USB joysticks (`usb_sticks + 1`).
/// - Port 1 becomes slot 0 with one USB joystick (which takes slot 1),
///   otherwise `usb_sticks`.
pub fn renumber(port: u8, usb_sticks: u8, prefer_db9: bool) -> u8 {
    if usb_sticks == 0 {
        return port;
    }
    if port == 0 {
        if prefer_db9 { 0 } else { usb_sticks.saturating_add(1) }
    } else if usb_sticks == 1 {
        0
    } else {
        usb_sticks
    }
}

/// The slot a USB joystick takes.  The first replaces the physical
/// joystick port (slot 1), the second the mouse port (slot 0), and any more
/// follow on.
pub fn usb_slot(index: u8) -> u8 {
    match index {
        0 => 1,
        1 => 0,
        n => n,
    }
}

/// Derives an analog axis value from the two digital directions.
pub fn dig2ana(min: bool, max: bool) -> i8 {
    match (min, max) {
        (true, false) => -128,
        (false, true) => 127,
        _ => 0,
    }
}

/// The analog (x, y) position for a digital state.
pub fn analog(state: JoyState) -> (i8, i8) {
    (
        dig2ana(
            state.contains(JoyState::LEFT),
            state.contains(JoyState::RIGHT),
        ),
        dig2ana(state.contains(JoyState::UP), state.contains(JoyState::DOWN)),
    )
}

/// Change detection for the DB9 ports.
#[derive(Debug, Default)]
pub struct Db9Ports {
    last: [JoyState; NUM_DB9_PORTS],
    resend: bool,
}

impl Db9Ports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample of `port`, returning the new state if it changed,
    /// or if a resend is pending.
    pub fn sample(&mut self, port: usize, state: JoyState) -> Option<JoyState> {
        let last = self.last.get_mut(port)?;
        let changed = *last != state;
        *last = state;
        if changed || self.resend {
            Some(state)
        } else {
            None
        }
    }

    /// Reports every port on the next round of samples, changed or not.
    pub fn resend(&mut self) {
        self.resend = true;
    }

    /// Ends a round of samples.
    pub fn sampled(&mut self) {
        self.resend = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_without_usb() {
        assert_eq!(renumber(0, 0, false), 0);
        assert_eq!(renumber(1, 0, false), 1);
        assert_eq!(renumber(0, 0, true), 0);
    }

    #[test]
    fn shifted_by_usb() {
        // One USB stick takes slot 1
        assert_eq!(renumber(1, 1, false), 0);
        assert_eq!(renumber(0, 1, false), 2);
        // Two take slots 0 and 1
        assert_eq!(renumber(1, 2, false), 2);
        assert_eq!(renumber(0, 2, false), 3);
        assert_eq!(renumber(0, 2, true), 0);
        assert_eq!(renumber(1, 3, true), 3);
    }

    #[test]
    fn usb_sticks_take_primary_slots() {
        assert_eq!(usb_slot(0), 1);
        assert_eq!(usb_slot(1), 0);
        assert_eq!(usb_slot(2), 2);
        // With two USB sticks, the physical ports follow them
        assert_eq!(renumber(1, 2, false), 2);
        assert_eq!(renumber(0, 2, false), 3);
    }

    #[test]
    fn analog_from_digital() {
        assert_eq!(dig2ana(true, false), -128);
        assert_eq!(dig2ana(false, true), 127);
        assert_eq!(dig2ana(true, true), 0);
        assert_eq!(dig2ana(false, false), 0);
        assert_eq!(analog(JoyState::LEFT | JoyState::DOWN), (-128, 127));
        assert_eq!(analog(JoyState::BTN1), (0, 0));
    }

    #[test]
    fn db9_edges() {
        let mut ports = Db9Ports::new();
        assert_eq!(ports.sample(0, JoyState::empty()), None);
        assert_eq!(ports.sample(0, JoyState::UP), Some(JoyState::UP));
        assert_eq!(ports.sample(0, JoyState::UP), None);
        assert_eq!(ports.sample(1, JoyState::UP), Some(JoyState::UP));
        assert_eq!(ports.sample(0, JoyState::empty()), Some(JoyState::empty()));
        assert_eq!(ports.sample(2, JoyState::UP), None);
    }

    #[test]
    fn db9_resend() {
        let mut ports = Db9Ports::new();
        assert_eq!(ports.sample(0, JoyState::UP), Some(JoyState::UP));
        ports.resend();
        assert_eq!(ports.sample(0, JoyState::UP), Some(JoyState::UP));
        assert_eq!(ports.sample(1, JoyState::empty()), Some(JoyState::empty()));
        ports.sampled();
        assert_eq!(ports.sample(0, JoyState::UP), None);
    }
}
