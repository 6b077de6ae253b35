//! Per-core wire encodings of keys and joysticks.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use heapless::Vec;

use crate::input::JoyState;
use crate::input::keycodes::{KeyCode, OSD};

/// Longest PS/2 sequence for a single key - Pause.
pub const PS2_MAX_SEQUENCE: usize = 8;

pub type Ps2Sequence = Vec<u8, PS2_MAX_SEQUENCE>;

const PS2_PAUSE: u8 = 0x77;
const PS2_PAUSE_SEQUENCE: [u8; PS2_MAX_SEQUENCE] = [0xe1, 0x14, 0x77, 0xe1, 0xf0, 0x14, 0xf0, 0x77];
const PS2_EXT: u8 = 0xe0;
const PS2_BREAK: u8 = 0xf0;

const BREAK: u16 = 0x80;

/// The PS/2 set 2 bytes for a key make or break.  Pause has no break.
pub fn ps2_sequence(code: KeyCode, make: bool) -> Ps2Sequence {
    let mut seq = Ps2Sequence::new();
    if code.code() == PS2_PAUSE && !code.is_ext() {
        if make {
            let _ = seq.extend_from_slice(&PS2_PAUSE_SEQUENCE);
        }
        return seq;
    }
    if code.is_ext() {
        let _ = seq.push(PS2_EXT);
    }
    if !make {
        let _ = seq.push(PS2_BREAK);
    }
    let _ = seq.push(code.code());
    seq
}

/// The value queued for a Minimig key - the raw key with bit 7 set on
/// break, and the OSD flag kept so the key can be routed to the OSD
/// channel.
pub fn minimig_code(code: KeyCode, make: bool) -> u16 {
    let mut value = code.code() as u16 | (code.raw() & OSD);
    if !make {
        value |= BREAK;
    }
    value
}

/// Whether a queued Minimig value goes on the OSD keyboard channel.
pub fn minimig_is_osd(value: u16) -> bool {
    value & OSD != 0
}

/// The byte for a serial keyboard link (IKBD, Archimedes) - bit 7 set on
/// break.
pub fn serial_code(code: KeyCode, make: bool) -> u8 {
    if make {
        code.code() & 0x7f
    } else {
        code.code() | BREAK as u8
    }
}

/// An IKBD joystick state byte - up, down, left and right in bits 0-3, and
/// fire in bit 7.
pub fn ikbd_joystick(state: JoyState) -> u8 {
    let mut byte = 0;
    for (bit, ikbd) in [
        (JoyState::UP, 0x01),
        (JoyState::DOWN, 0x02),
        (JoyState::LEFT, 0x04),
        (JoyState::RIGHT, 0x08),
        (JoyState::BTN1, 0x80),
    ] {
        if state.contains(bit) {
            byte |= ikbd;
        }
    }
    byte
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::keycodes::{AMIGA, EXT, PS2};

    #[test]
    fn ps2_plain_and_extended() {
        let a = PS2.lookup(0x04, false);
        assert_eq!(ps2_sequence(a, true).as_slice(), &[0x1c]);
        assert_eq!(ps2_sequence(a, false).as_slice(), &[0xf0, 0x1c]);

        let up = PS2.lookup(0x52, false);
        assert_eq!(ps2_sequence(up, true).as_slice(), &[0xe0, 0x75]);
        assert_eq!(ps2_sequence(up, false).as_slice(), &[0xe0, 0xf0, 0x75]);
    }

    #[test]
    fn ps2_pause() {
        let pause = PS2.lookup(0x48, false);
        assert_eq!(ps2_sequence(pause, true).as_slice(), &PS2_PAUSE_SEQUENCE);
        assert!(ps2_sequence(pause, false).is_empty());
        // An extended 0x77 isn't Pause
        let ext = KeyCode::new(EXT | 0x77);
        assert_eq!(ps2_sequence(ext, true).as_slice(), &[0xe0, 0x77]);
    }

    #[test]
    fn minimig_codes() {
        let a = AMIGA.lookup(0x04, false);
        assert_eq!(minimig_code(a, true), 0x20);
        assert_eq!(minimig_code(a, false), 0xa0);
        let home = AMIGA.lookup(0x4a, false);
        assert!(minimig_is_osd(minimig_code(home, true)));
        assert_eq!(minimig_code(home, false) & 0xff, 0xec);
        assert!(!minimig_is_osd(minimig_code(a, false)));
    }

    #[test]
    fn serial_codes() {
        assert_eq!(serial_code(KeyCode::new(0x1e), true), 0x1e);
        assert_eq!(serial_code(KeyCode::new(0x1e), false), 0x9e);
    }

    #[test]
    fn ikbd_joystick_bits() {
        assert_eq!(ikbd_joystick(JoyState::UP | JoyState::BTN1), 0x81);
        assert_eq!(ikbd_joystick(JoyState::RIGHT | JoyState::DOWN), 0x0a);
        assert_eq!(ikbd_joystick(JoyState::BTN2), 0);
    }
}
