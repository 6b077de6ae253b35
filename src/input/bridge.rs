//! The HID bridge protocol.
//!
//! USB host duties are handled by a separate co-processor, which forwards
//! HID events to us over a UART.  Each frame is:
//!
//! ```text
//! 0xa5 kind len payload[len]
//! ```
//!
//! | kind | payload |
//! |------|---------|
//! | 0x01 | keyboard: priority, modifiers, k0..k5 |
//! | 0x02 | mouse: buttons, dx, dy |
//! | 0x03 | joystick: index, state |
//! | 0x04 | joystick count: count |
//! | 0x81 | (to the bridge) keyboard LEDs: leds |
//!
//! The decoder is fed a byte at a time, and resynchronises on the sync byte
//! after a malformed frame.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use heapless::Vec;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::{HidReport, JoyState, KbdLeds, Modifiers};
use crate::constants::{HID_BRIDGE_MAX_PAYLOAD, HID_MAX_KEYS};

pub const SYNC: u8 = 0xa5;

/// Frame kinds.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Keyboard = 0x01,
    Mouse = 0x02,
    Joystick = 0x03,
    JoystickCount = 0x04,
    KbdLeds = 0x81,
}

impl TryFrom<u8> for FrameKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(FrameKind::Keyboard),
            0x02 => Ok(FrameKind::Mouse),
            0x03 => Ok(FrameKind::Joystick),
            0x04 => Ok(FrameKind::JoystickCount),
            0x81 => Ok(FrameKind::KbdLeds),
            _ => Err(()),
        }
    }
}

/// An event from the HID bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HidInput {
    /// A keyboard report.  Lower priority numbers win.
    Keyboard { priority: u8, report: HidReport },

    Mouse { buttons: u8, dx: i8, dy: i8 },

    /// USB joystick `index`, counting from 0.
    Joystick { index: u8, state: JoyState },

    /// The number of USB joysticks attached has changed.
    JoystickCount(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Sync,
    Kind,
    Len,
    Payload,
}

/// Byte at a time frame decoder.
#[derive(Debug)]
pub struct BridgeDecoder {
    state: State,
    kind: u8,
    len: usize,
    payload: Vec<u8, HID_BRIDGE_MAX_PAYLOAD>,
}

impl Default for BridgeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Sync,
            kind: 0,
            len: 0,
            payload: Vec::new(),
        }
    }

    /// Feeds a byte, returning an event if it completed a frame.
    pub fn push(&mut self, byte: u8) -> Option<HidInput> {
        match self.state {
            State::Sync => {
                if byte == SYNC {
                    self.state = State::Kind;
                } else {
                    trace!("Bridge skipping 0x{:02x}", byte);
                }
                None
            }
            State::Kind => {
                self.kind = byte;
                self.state = State::Len;
                None
            }
            State::Len => {
                if byte as usize > HID_BRIDGE_MAX_PAYLOAD {
                    warn!("Bridge frame too long {}", byte);
                    self.state = if byte == SYNC { State::Kind } else { State::Sync };
                    return None;
                }
                self.len = byte as usize;
                self.payload.clear();
                self.state = State::Payload;
                if self.len == 0 { self.finish() } else { None }
            }
            State::Payload => {
                let _ = self.payload.push(byte);
                if self.payload.len() >= self.len {
                    self.finish()
                } else {
                    None
                }
            }
        }
    }

    fn finish(&mut self) -> Option<HidInput> {
        self.state = State::Sync;
        let p = self.payload.as_slice();
        let input = match FrameKind::try_from(self.kind) {
            Ok(FrameKind::Keyboard) if p.len() >= 2 => {
                let keys = &p[2..p.len().min(2 + HID_MAX_KEYS)];
                Some(HidInput::Keyboard {
                    priority: p[0],
                    report: HidReport::new(Modifiers::from_bits_retain(p[1]), keys),
                })
            }
            Ok(FrameKind::Mouse) if p.len() >= 3 => Some(HidInput::Mouse {
                buttons: p[0],
                dx: p[1] as i8,
                dy: p[2] as i8,
            }),
            Ok(FrameKind::Joystick) if p.len() >= 2 => Some(HidInput::Joystick {
                index: p[0],
                state: JoyState::from_bits_retain(p[1]),
            }),
            Ok(FrameKind::JoystickCount) if !p.is_empty() => Some(HidInput::JoystickCount(p[0])),
            _ => None,
        };
        if input.is_none() {
            debug!("Bridge dropped frame kind 0x{:02x} len {}", self.kind, p.len());
        }
        input
    }
}

/// Builds the frame which sets the keyboard LEDs.
pub fn led_frame(leds: KbdLeds) -> [u8; 4] {
    [SYNC, FrameKind::KbdLeds as u8, 1, leds.bits()]
}
