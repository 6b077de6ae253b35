//! Input handling - turning USB HID reports, DB9 joystick ports and the
//! front panel buttons into what the active core expects.
//!
//! The flow for the keyboard is:
//! - priority arbitration between keyboards,
//! - the remap table,
//! - keyboard joystick/mouse emulation (which claims some keys),
//! - the [`translator::InputTranslator`], which diffs the report against
//!   the previous one and emits core specific make/break [`Event`]s,
//! - per core encoding, and the [`ratelimit::KeyboardRateLimiter`], in
//!   [`crate::dispatch`].

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub mod bridge;
pub mod buttons;
pub mod emulation;
pub mod joystick;
pub mod keycodes;
pub mod leds;
pub mod mouse;
pub mod profile;
pub mod ratelimit;
pub mod remap;
pub mod translator;

use bitflags::bitflags;

use crate::constants::HID_MAX_KEYS;
use keycodes::KeyCode;

bitflags! {
    /// USB HID keyboard modifier bits.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const LCTRL = 0x01;
        const LSHIFT = 0x02;
        const LALT = 0x04;
        const LGUI = 0x08;
        const RCTRL = 0x10;
        const RSHIFT = 0x20;
        const RALT = 0x40;
        const RGUI = 0x80;
    }
}

bitflags! {
    /// Digital joystick state, as sent to the cores.  Also used for the
    /// keyboard emulation state.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct JoyState: u8 {
        const RIGHT = 0x01;
        const LEFT = 0x02;
        const DOWN = 0x04;
        const UP = 0x08;
        const BTN1 = 0x10;
        const BTN2 = 0x20;
        const BTN3 = 0x40;
        const BTN4 = 0x80;

        const MOVE = Self::RIGHT.bits() | Self::LEFT.bits() | Self::DOWN.bits() | Self::UP.bits();
        const BUTTONS = Self::BTN1.bits() | Self::BTN2.bits() | Self::BTN3.bits() | Self::BTN4.bits();
    }
}

impl JoyState {
    /// The two mouse buttons this state represents, in bit 0 (left) and bit
    /// 1 (right).
    pub fn mouse_buttons(&self) -> u8 {
        let mut buttons = 0;
        if self.contains(JoyState::BTN1) {
            buttons |= 0x01;
        }
        if self.contains(JoyState::BTN2) {
            buttons |= 0x02;
        }
        buttons
    }

    /// The relative mouse step this state represents, -1, 0 or 1 on each
    /// axis.  Opposing directions cancel.
    pub fn mouse_step(&self) -> (i8, i8) {
        let axis = |neg: JoyState, pos: JoyState| -> i8 {
            match (self.contains(neg), self.contains(pos)) {
                (true, false) => -1,
                (false, true) => 1,
                _ => 0,
            }
        };
        (
            axis(JoyState::LEFT, JoyState::RIGHT),
            axis(JoyState::UP, JoyState::DOWN),
        )
    }
}

bitflags! {
    /// USB HID keyboard LEDs.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KbdLeds: u8 {
        const NUM_LOCK = 0x01;
        const CAPS_LOCK = 0x02;
        const SCROLL_LOCK = 0x04;
    }
}

/// A USB HID boot protocol keyboard report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HidReport {
    pub modifiers: Modifiers,
    pub keys: [u8; HID_MAX_KEYS],
}

impl HidReport {
    pub fn new(modifiers: Modifiers, keys: &[u8]) -> Self {
        let mut report = Self {
            modifiers,
            keys: [0; HID_MAX_KEYS],
        };
        for (dst, src) in report.keys.iter_mut().zip(keys) {
            *dst = *src;
        }
        report
    }

    /// Whether no keys or modifiers are down.
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty() && self.keys.iter().all(|k| *k == 0)
    }

    /// Whether the key is down.
    pub fn contains(&self, key: u8) -> bool {
        key != 0 && self.keys.contains(&key)
    }

    /// Clears repeats of a key, keeping its first slot.
    pub fn dedup(&mut self) {
        for i in 1..HID_MAX_KEYS {
            let key = self.keys[i];
            if key != 0 && self.keys[..i].contains(&key) {
                self.keys[i] = 0;
            }
        }
    }

    /// The keys which are down.
    pub fn pressed(&self) -> impl Iterator<Item = u8> + '_ {
        self.keys.iter().copied().filter(|k| *k != 0)
    }
}

/// Why the keyboard reset combination was pressed.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetRequest {
    /// The combination without shift - reset the core.  Sent once when the
    /// combination is pressed (`true`) and once when released (`false`).
    Core(bool),

    /// The combination with left shift - restart the firmware.
    Firmware,
}

/// Something produced by the input translation, to be sent to the core or
/// the rest of the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A key make or break, in the active core's code space.
    Key { code: KeyCode, make: bool },

    /// Mouse movement and buttons (bit 0 left, bit 1 right).
    Mouse { buttons: u8, dx: i8, dy: i8 },

    /// Joystick state for physical port 0 (mouse port) or 1 (joystick port),
    /// before renumbering.
    Joystick { port: u8, state: JoyState },

    /// A key for the OSD menu, in Amiga key codes.
    OsdKey(u8),

    /// The OSD has been opened or closed.
    OsdVisible(bool),

    /// A keyboard LED the firmware wants changed.
    Led { leds: KbdLeds, on: bool },

    /// The reset key combination.
    Reset(ResetRequest),
}
