//! USB HID usage to core scancode tables.
//!
//! Each table entry is a core scancode in the low byte, plus flags in the
//! high byte which change how the key is handled.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use crate::constants::KEYCODE_MAX;

/// No scancode - the key is ignored.
pub const MISS: u16 = 0x00ff;

/// Sent to Minimig on the OSD keyboard channel.
pub const OSD: u16 = 0x0100;

/// Opens (or closes) the OSD.
pub const OSD_OPEN: u16 = 0x0200;

/// Caps lock - the core sees alternating make and break on each press.
pub const CAPS_LOCK_TOGGLE: u16 = 0x0400;

/// Selects the keyboard emulation mode.  The low nibble picks a mode
/// directly (1 mouse, 2 joystick 0, 3 joystick 1, 4 none), 0 cycles.
pub const NUM_LOCK_TOGGLE: u16 = 0x0800;

/// PS/2 extended key, prefixed with `e0`.
pub const EXT: u16 = 0x1000;

/// Number of entries in each table.
pub const KEYMAP_LEN: usize = KEYCODE_MAX as usize + 1;

/// OSD menu key, in Amiga key codes.
pub const KEY_MENU: u8 = 0x69;

/// Set on an OSD key code on release.
pub const KEY_UPSTROKE: u8 = 0x80;

/// A core scancode with its handling flags.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCode(u16);

impl KeyCode {
    pub const MISS: KeyCode = KeyCode(MISS);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }

    /// The scancode itself.
    pub fn code(&self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub fn is_miss(&self) -> bool {
        self.0 == MISS
    }

    pub fn is_ext(&self) -> bool {
        self.0 & EXT != 0
    }

    pub fn is_osd(&self) -> bool {
        self.0 & OSD != 0
    }

    pub fn opens_osd(&self) -> bool {
        self.0 & OSD_OPEN != 0
    }

    pub fn is_caps_toggle(&self) -> bool {
        self.0 & CAPS_LOCK_TOGGLE != 0
    }

    /// For an emulation mode select key, the mode selector (0 cycles).
    pub fn emulation_select(&self) -> Option<u8> {
        (self.0 & NUM_LOCK_TOGGLE != 0).then_some((self.0 & 0x0f) as u8)
    }
}

/// A core's keyboard layout.
pub struct KeyMap {
    pub name: &'static str,
    keys: &'static [u16; KEYMAP_LEN],

    /// Modifier scancodes, in USB modifier bit order.
    modifiers: [u16; 8],

    /// What the menu key sends instead of opening the OSD, when configured
    /// to act as right GUI.
    menu_as_rgui: Option<u16>,
}

// The USB usage of the Menu (Application) key.
const USB_MENU: u8 = 0x65;

impl KeyMap {
    /// Looks up a USB usage.  Usages outside the table are ignored.
    pub fn lookup(&self, usb: u8, menu_as_rgui: bool) -> KeyCode {
        if usb == USB_MENU && menu_as_rgui {
            if let Some(code) = self.menu_as_rgui {
                return KeyCode(code);
            }
        }
        self.keys
            .get(usb as usize)
            .map_or(KeyCode::MISS, |k| KeyCode(*k))
    }

    /// The scancode for modifier bit `bit`.
    pub fn modifier(&self, bit: usize) -> KeyCode {
        self.modifiers
            .get(bit)
            .map_or(KeyCode::MISS, |k| KeyCode(*k))
    }
}

/// The OSD's Amiga key code for a USB usage, if it has one.
pub fn osd_code(usb: u8) -> Option<u8> {
    let code = AMIGA.lookup(usb, false);
    (!code.is_miss()).then_some(code.code())
}

#[rustfmt::skip]
static USB_TO_AMIGA: [u16; KEYMAP_LEN] = [
    MISS, MISS, MISS, MISS,                     // 00: no event, errors
    0x20, 0x35, 0x33, 0x22, 0x12, 0x23, 0x24,   // 04: a-g
    0x25, 0x17, 0x26, 0x27, 0x28, 0x37, 0x36,   // 0b: h-n
    0x18, 0x19, 0x10, 0x13, 0x21, 0x14, 0x16,   // 12: o-u
    0x34, 0x11, 0x32, 0x15, 0x31,               // 19: v-z
    0x01, 0x02, 0x03, 0x04, 0x05,               // 1e: 1-5
    0x06, 0x07, 0x08, 0x09, 0x0a,               // 23: 6-0
    0x44, 0x45, 0x41, 0x42, 0x40,               // 28: return, esc, backspace, tab, space
    0x0b, 0x0c, 0x1a, 0x1b, 0x0d, 0x2b,         // 2d: - = [ ] \ europe 1
    0x29, 0x2a, 0x00, 0x38, 0x39, 0x3a,         // 33: ; ' ` , . /
    0x62 | CAPS_LOCK_TOGGLE,                    // 39: caps lock
    0x50, 0x51, 0x52, 0x53, 0x54,               // 3a: F1-F5
    0x55, 0x56, 0x57, 0x58, 0x59,               // 3f: F6-F10
    0x5f,                                       // 44: F11 (help)
    OSD_OPEN,                                   // 45: F12
    MISS, MISS, MISS, MISS,                     // 46: print screen, scroll lock, pause, insert
    0x6c | OSD, 0x6d | OSD,                     // 4a: home, page up
    0x46,                                       // 4c: delete
    0x6e | OSD, 0x6f | OSD,                     // 4d: end, page down
    0x4e, 0x4f, 0x4d, 0x4c,                     // 4f: right, left, down, up
    NUM_LOCK_TOGGLE,                            // 53: num lock
    0x5c, 0x5d, 0x4a, 0x5e, 0x43,               // 54: KP / * - + enter
    0x1d, 0x1e, 0x1f, 0x2d, 0x2e,               // 59: KP 1-5
    0x2f, 0x3d, 0x3e, 0x3f, 0x0f, 0x3c,         // 5e: KP 6-9 0 .
    0x30,                                       // 64: europe 2
    OSD_OPEN,                                   // 65: menu
    MISS, MISS,                                 // 66: power, KP =
    MISS, MISS, MISS, MISS,                     // 68: F13-F16
    NUM_LOCK_TOGGLE | 1, NUM_LOCK_TOGGLE | 2,   // 6c: F17, F18
    NUM_LOCK_TOGGLE | 3, NUM_LOCK_TOGGLE | 4,   // 6e: F19, F20
    MISS, MISS, MISS, MISS,                     // 70: F21-F24
];

#[rustfmt::skip]
static USB_TO_ATARI: [u16; KEYMAP_LEN] = [
    MISS, MISS, MISS, MISS,                     // 00: no event, errors
    0x1e, 0x30, 0x2e, 0x20, 0x12, 0x21, 0x22,   // 04: a-g
    0x23, 0x17, 0x24, 0x25, 0x26, 0x32, 0x31,   // 0b: h-n
    0x18, 0x19, 0x10, 0x13, 0x1f, 0x14, 0x16,   // 12: o-u
    0x2f, 0x11, 0x2d, 0x15, 0x2c,               // 19: v-z
    0x02, 0x03, 0x04, 0x05, 0x06,               // 1e: 1-5
    0x07, 0x08, 0x09, 0x0a, 0x0b,               // 23: 6-0
    0x1c, 0x01, 0x0e, 0x0f, 0x39,               // 28: return, esc, backspace, tab, space
    0x0c, 0x0d, 0x1a, 0x1b, 0x2b, 0x2b,         // 2d: - = [ ] \ europe 1
    0x27, 0x28, 0x29, 0x33, 0x34, 0x35,         // 33: ; ' ` , . /
    0x3a,                                       // 39: caps lock
    0x3b, 0x3c, 0x3d, 0x3e, 0x3f,               // 3a: F1-F5
    0x40, 0x41, 0x42, 0x43, 0x44,               // 3f: F6-F10
    0x61,                                       // 44: F11 (undo)
    OSD_OPEN,                                   // 45: F12
    MISS, MISS, MISS,                           // 46: print screen, scroll lock, pause
    0x52, 0x47, 0x62,                           // 49: insert, home (clr), page up (help)
    0x53,                                       // 4c: delete
    MISS, 0x61,                                 // 4d: end, page down (undo)
    0x4d, 0x4b, 0x50, 0x48,                     // 4f: right, left, down, up
    NUM_LOCK_TOGGLE,                            // 53: num lock
    0x65, 0x66, 0x4a, 0x4e, 0x72,               // 54: KP / * - + enter
    0x6d, 0x6e, 0x6f, 0x6a, 0x6b,               // 59: KP 1-5
    0x6c, 0x67, 0x68, 0x69, 0x70, 0x71,         // 5e: KP 6-9 0 .
    0x60,                                       // 64: europe 2
    OSD_OPEN,                                   // 65: menu
    MISS, MISS,                                 // 66: power, KP =
    MISS, MISS, MISS, MISS,                     // 68: F13-F16
    NUM_LOCK_TOGGLE | 1, NUM_LOCK_TOGGLE | 2,   // 6c: F17, F18
    NUM_LOCK_TOGGLE | 3, NUM_LOCK_TOGGLE | 4,   // 6e: F19, F20
    MISS, MISS, MISS, MISS,                     // 70: F21-F24
];

// PS/2 scancode set 2.  Pause (0x77) has its own multi-byte sequence.
#[rustfmt::skip]
static USB_TO_PS2: [u16; KEYMAP_LEN] = [
    MISS, MISS, MISS, MISS,                     // 00: no event, errors
    0x1c, 0x32, 0x21, 0x23, 0x24, 0x2b, 0x34,   // 04: a-g
    0x33, 0x43, 0x3b, 0x42, 0x4b, 0x3a, 0x31,   // 0b: h-n
    0x44, 0x4d, 0x15, 0x2d, 0x1b, 0x2c, 0x3c,   // 12: o-u
    0x2a, 0x1d, 0x22, 0x35, 0x1a,               // 19: v-z
    0x16, 0x1e, 0x26, 0x25, 0x2e,               // 1e: 1-5
    0x36, 0x3d, 0x3e, 0x46, 0x45,               // 23: 6-0
    0x5a, 0x76, 0x66, 0x0d, 0x29,               // 28: return, esc, backspace, tab, space
    0x4e, 0x55, 0x54, 0x5b, 0x5d, 0x5d,         // 2d: - = [ ] \ europe 1
    0x4c, 0x52, 0x0e, 0x41, 0x49, 0x4a,         // 33: ; ' ` , . /
    0x58,                                       // 39: caps lock
    0x05, 0x06, 0x04, 0x0c, 0x03,               // 3a: F1-F5
    0x0b, 0x83, 0x0a, 0x01, 0x09,               // 3f: F6-F10
    0x78,                                       // 44: F11
    OSD_OPEN,                                   // 45: F12
    EXT | 0x7c, 0x7e, 0x77,                     // 46: print screen, scroll lock, pause
    EXT | 0x70, EXT | 0x6c, EXT | 0x7d,         // 49: insert, home, page up
    EXT | 0x71,                                 // 4c: delete
    EXT | 0x69, EXT | 0x7a,                     // 4d: end, page down
    EXT | 0x74, EXT | 0x6b, EXT | 0x72, EXT | 0x75, // 4f: right, left, down, up
    NUM_LOCK_TOGGLE,                            // 53: num lock
    EXT | 0x4a, 0x7c, 0x7b, 0x79, EXT | 0x5a,   // 54: KP / * - + enter
    0x69, 0x72, 0x7a, 0x6b, 0x73,               // 59: KP 1-5
    0x74, 0x6c, 0x75, 0x7d, 0x70, 0x71,         // 5e: KP 6-9 0 .
    0x61,                                       // 64: europe 2
    OSD_OPEN,                                   // 65: menu
    MISS, MISS,                                 // 66: power, KP =
    MISS, MISS, MISS, MISS,                     // 68: F13-F16
    NUM_LOCK_TOGGLE | 1, NUM_LOCK_TOGGLE | 2,   // 6c: F17, F18
    NUM_LOCK_TOGGLE | 3, NUM_LOCK_TOGGLE | 4,   // 6e: F19, F20
    MISS, MISS, MISS, MISS,                     // 70: F21-F24
];

#[rustfmt::skip]
static USB_TO_ARCHIE: [u16; KEYMAP_LEN] = [
    MISS, MISS, MISS, MISS,                     // 00: no event, errors
    0x3c, 0x52, 0x50, 0x3e, 0x29, 0x3f, 0x40,   // 04: a-g
    0x41, 0x2e, 0x42, 0x43, 0x44, 0x54, 0x53,   // 0b: h-n
    0x2f, 0x30, 0x27, 0x2a, 0x3d, 0x2b, 0x2d,   // 12: o-u
    0x51, 0x28, 0x4f, 0x2c, 0x4e,               // 19: v-z
    0x11, 0x12, 0x13, 0x14, 0x15,               // 1e: 1-5
    0x16, 0x17, 0x18, 0x19, 0x1a,               // 23: 6-0
    0x47, 0x00, 0x1e, 0x26, 0x5f,               // 28: return, esc, backspace, tab, space
    0x1b, 0x1c, 0x31, 0x32, 0x33, 0x33,         // 2d: - = [ ] \ europe 1
    0x45, 0x46, 0x10, 0x55, 0x56, 0x57,         // 33: ; ' ` , . /
    0x5d,                                       // 39: caps lock
    0x01, 0x02, 0x03, 0x04, 0x05,               // 3a: F1-F5
    0x06, 0x07, 0x08, 0x09, 0x0a,               // 3f: F6-F10
    0x0b,                                       // 44: F11
    OSD_OPEN,                                   // 45: F12
    0x0d, 0x0e, 0x0f,                           // 46: print screen, scroll lock, break
    0x1f, 0x20, 0x21,                           // 49: insert, home, page up
    0x34,                                       // 4c: delete
    0x35, 0x36,                                 // 4d: end (copy), page down
    0x64, 0x62, 0x63, 0x59,                     // 4f: right, left, down, up
    NUM_LOCK_TOGGLE,                            // 53: num lock
    0x23, 0x24, 0x3a, 0x4b, 0x67,               // 54: KP / * - + enter
    0x5a, 0x5b, 0x5c, 0x48, 0x49,               // 59: KP 1-5
    0x4a, 0x37, 0x38, 0x39, 0x65, 0x66,         // 5e: KP 6-9 0 .
    MISS,                                       // 64: europe 2
    OSD_OPEN,                                   // 65: menu
    MISS, MISS,                                 // 66: power, KP =
    MISS, MISS, MISS, MISS,                     // 68: F13-F16
    NUM_LOCK_TOGGLE | 1, NUM_LOCK_TOGGLE | 2,   // 6c: F17, F18
    NUM_LOCK_TOGGLE | 3, NUM_LOCK_TOGGLE | 4,   // 6e: F19, F20
    MISS, MISS, MISS, MISS,                     // 70: F21-F24
];

pub static AMIGA: KeyMap = KeyMap {
    name: "amiga",
    keys: &USB_TO_AMIGA,
    modifiers: [0x63, 0x60, 0x64, 0x66, 0x63, 0x61, 0x65, 0x67],
    menu_as_rgui: Some(0x67),
};

/// Used by the Atari ST, via IKBD.
pub static ATARI: KeyMap = KeyMap {
    name: "atari",
    keys: &USB_TO_ATARI,
    modifiers: [0x1d, 0x2a, 0x38, MISS, 0x1d, 0x36, 0x38, MISS],
    menu_as_rgui: None,
};

/// Used by the 8-bit cores.
pub static PS2: KeyMap = KeyMap {
    name: "ps2",
    keys: &USB_TO_PS2,
    modifiers: [
        0x14,
        0x12,
        0x11,
        EXT | 0x1f,
        EXT | 0x14,
        0x59,
        EXT | 0x11,
        EXT | 0x27,
    ],
    menu_as_rgui: Some(EXT | 0x27),
};

pub static ARCHIE: KeyMap = KeyMap {
    name: "archie",
    keys: &USB_TO_ARCHIE,
    modifiers: [0x36, 0x4c, 0x5e, MISS, 0x61, 0x58, 0x60, MISS],
    menu_as_rgui: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_line_up() {
        // Spot check the last entries of each table, to catch a row being
        // dropped or duplicated.
        for map in [&AMIGA, &ATARI, &PS2, &ARCHIE] {
            assert_eq!(map.lookup(0x65, false).raw(), OSD_OPEN, "{}", map.name);
            assert_eq!(map.lookup(0x45, false).raw(), OSD_OPEN, "{}", map.name);
            assert_eq!(map.lookup(0x53, false).emulation_select(), Some(0), "{}", map.name);
            assert_eq!(map.lookup(0x6f, false).emulation_select(), Some(4), "{}", map.name);
            assert!(map.lookup(0x73, false).is_miss(), "{}", map.name);
            assert!(map.lookup(0x74, false).is_miss(), "{}", map.name);
        }
    }

    #[test]
    fn amiga_codes() {
        assert_eq!(AMIGA.lookup(0x04, false).code(), 0x20);
        assert_eq!(AMIGA.lookup(0x29, false).code(), 0x45);
        assert_eq!(AMIGA.lookup(0x3a, false).code(), 0x50);
        assert_eq!(AMIGA.lookup(0x52, false).code(), 0x4c);
        assert!(AMIGA.lookup(0x39, false).is_caps_toggle());
        assert!(AMIGA.lookup(0x4a, false).is_osd());
        assert_eq!(osd_code(0x28), Some(0x44));
        assert_eq!(osd_code(0x47), None);
    }

    #[test]
    fn caps_toggle_is_amiga_only() {
        for map in [&ATARI, &PS2, &ARCHIE] {
            assert!(!map.lookup(0x39, false).is_caps_toggle(), "{}", map.name);
        }
    }

    #[test]
    fn ps2_extended() {
        let up = PS2.lookup(0x52, false);
        assert!(up.is_ext());
        assert_eq!(up.code(), 0x75);
        assert!(PS2.modifier(7).is_ext());
        assert!(PS2.modifier(3).is_ext());
        assert!(!PS2.modifier(1).is_ext());
    }

    #[test]
    fn menu_as_rgui() {
        assert_eq!(AMIGA.lookup(0x65, true).raw(), 0x67);
        assert_eq!(PS2.lookup(0x65, true).raw(), EXT | 0x27);
        assert!(ATARI.lookup(0x65, true).opens_osd());
    }

    #[test]
    fn missing_modifiers() {
        assert!(ATARI.modifier(3).is_miss());
        assert!(ARCHIE.modifier(7).is_miss());
        assert!(AMIGA.modifier(8).is_miss());
    }
}
