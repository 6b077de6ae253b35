//! Per-core input and storage behaviour.
//!
//! A [`CoreProfile`] is resolved once, when the core is detected, so the I/O
//! loop doesn't need to keep checking the core type.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::keycodes::{AMIGA, ARCHIE, ATARI, KeyMap, PS2};
use crate::types::CoreType;

/// How keys are sent to the core.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardLink {
    /// Amiga raw key codes, rate limited, on KEYBOARD (or KBD_OSD).
    Amiga,

    /// Atari ST IKBD bytes, rate limited.
    Ikbd,

    /// Archimedes key numbers, rate limited.
    Archie,

    /// PS/2 set 2 sequences, unthrottled.
    Ps2,

    /// The core takes no keyboard input.
    None,
}

impl KeyboardLink {
    /// Whether this link goes through the keyboard rate limiter.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            KeyboardLink::Amiga | KeyboardLink::Ikbd | KeyboardLink::Archie
        )
    }
}

/// How mouse movement is sent to the core.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseStyle {
    Minimig,
    Ps2,
    Ikbd,
    Archie,
    None,
}

/// Everything the I/O loop needs to know about the active core.
pub struct CoreProfile {
    pub keymap: Option<&'static KeyMap>,
    pub keyboard: KeyboardLink,
    pub mouse: MouseStyle,

    /// While the OSD is open, keys go only to the OSD.  Minimig forwards
    /// keys to its own OSD, so keeps receiving them.
    pub osd_captures_keys: bool,

    /// The core requests sectors from an emulated SD card.
    pub sd_emulation: bool,

    /// The core takes analog joystick values, derived from the digital
    /// state.
    pub analog_joystick: bool,

    /// Joysticks 0 and 1 are sent over IKBD.
    pub ikbd_joysticks: bool,

    /// The OSD owns the core's reset.
    pub osd_reset: bool,
}

static MINIMIG: CoreProfile = CoreProfile {
    keymap: Some(&AMIGA),
    keyboard: KeyboardLink::Amiga,
    mouse: MouseStyle::Minimig,
    osd_captures_keys: false,
    sd_emulation: false,
    analog_joystick: false,
    ikbd_joysticks: false,
    osd_reset: true,
};

static PACE: CoreProfile = CoreProfile {
    keymap: None,
    keyboard: KeyboardLink::None,
    mouse: MouseStyle::None,
    osd_captures_keys: false,
    sd_emulation: false,
    analog_joystick: false,
    ikbd_joysticks: false,
    osd_reset: false,
};

static ATARI_ST: CoreProfile = CoreProfile {
    keymap: Some(&ATARI),
    keyboard: KeyboardLink::Ikbd,
    mouse: MouseStyle::Ikbd,
    osd_captures_keys: true,
    sd_emulation: false,
    analog_joystick: false,
    ikbd_joysticks: true,
    osd_reset: false,
};

static EIGHT_BIT: CoreProfile = CoreProfile {
    keymap: Some(&PS2),
    keyboard: KeyboardLink::Ps2,
    mouse: MouseStyle::Ps2,
    osd_captures_keys: true,
    sd_emulation: true,
    analog_joystick: true,
    ikbd_joysticks: false,
    osd_reset: false,
};

static ARCHIMEDES: CoreProfile = CoreProfile {
    keymap: Some(&ARCHIE),
    keyboard: KeyboardLink::Archie,
    mouse: MouseStyle::Archie,
    osd_captures_keys: true,
    sd_emulation: false,
    analog_joystick: false,
    ikbd_joysticks: false,
    osd_reset: false,
};

impl CoreProfile {
    /// The profile for a core, or None for cores without user I/O.
    pub fn for_core(core: CoreType) -> Option<&'static CoreProfile> {
        match core {
            CoreType::MinimigV1 | CoreType::MinimigV2 => Some(&MINIMIG),
            CoreType::Pace => Some(&PACE),
            CoreType::AtariSt => Some(&ATARI_ST),
            CoreType::Generic8Bit => Some(&EIGHT_BIT),
            CoreType::Archimedes => Some(&ARCHIMEDES),
            CoreType::Unknown | CoreType::Dumb => None,
        }
    }
}
