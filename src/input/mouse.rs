//! Mouse movement accumulation.
//!
//! USB mice report far more often than most cores want to hear about it, so
//! movement is summed and sent every [`MOUSE_INTERVAL`] in the core's
//! packet format.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use embassy_time::Instant;
use heapless::Vec;

use crate::constants::MOUSE_INTERVAL;

/// A mouse packet, ready to send.
pub type MousePacket = Vec<u8, 3>;

/// The packet format a core expects.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseFormat {
    /// `dx dy buttons`, each axis clamped to a byte, with the excess
    /// carried into the following packets.
    Minimig,

    /// Standard 3 byte PS/2 packet, y axis inverted, with overflow flags.
    Ps2,

    /// IKBD relative mouse packet, clamped like Minimig.
    Ikbd,

    /// `dx dy` - the buttons go as keys.
    Archie,
}

#[derive(Debug)]
pub struct MouseAccumulator {
    format: MouseFormat,
    x: i16,
    y: i16,

    // Buttons seen this frame, and in the latest report.
    frame_buttons: Option<u8>,
    latest: u8,

    pending: bool,
    next: Option<Instant>,
}

// Takes up to one byte's worth of movement from an axis.
fn take_clamped(pos: &mut i16) -> u8 {
    let value = if *pos < -128 {
        -128
    } else if *pos > 127 {
        127
    } else {
        *pos
    };
    *pos -= value;
    value as i8 as u8
}

impl MouseAccumulator {
    pub fn new(format: MouseFormat) -> Self {
        Self {
            format,
            x: 0,
            y: 0,
            frame_buttons: None,
            latest: 0,
            pending: false,
            next: None,
        }
    }

    /// Adds a USB mouse report.  Buttons are bit 0 left, bit 1 right, bit 2
    /// middle.
    pub fn add(&mut self, buttons: u8, dx: i8, dy: i8) {
        self.x = self.x.saturating_add(dx as i16);
        self.y = match self.format {
            MouseFormat::Ps2 => self.y.saturating_sub(dy as i16),
            _ => self.y.saturating_add(dy as i16),
        };
        self.frame_buttons = Some(self.frame_buttons.unwrap_or(0) | (buttons & 0x03));
        self.latest = buttons & 0x03;
        self.pending = true;
    }

    /// Returns a packet if one is due and there's anything to send.
    pub fn poll(&mut self, now: Instant) -> Option<MousePacket> {
        if self.next.is_some_and(|next| now < next) {
            return None;
        }
        self.next = Some(now + MOUSE_INTERVAL);
        if !self.pending {
            return None;
        }

        // A button pressed and released within a frame is still seen.
        let buttons = self.frame_buttons.take().unwrap_or(self.latest);
        let mut packet = MousePacket::new();
        match self.format {
            MouseFormat::Ps2 => {
                for byte in self.ps2_packet(buttons) {
                    let _ = packet.push(byte);
                }
                self.x = 0;
                self.y = 0;
            }
            MouseFormat::Minimig | MouseFormat::Ikbd | MouseFormat::Archie => {
                let x = take_clamped(&mut self.x);
                let y = take_clamped(&mut self.y);
                let bytes = match self.format {
                    MouseFormat::Minimig => [x, y, buttons],
                    MouseFormat::Ikbd => [
                        0xf8 | ((buttons & 0x01) << 1) | ((buttons & 0x02) >> 1),
                        x,
                        y,
                    ],
                    _ => [x, y, 0],
                };
                let len = if self.format == MouseFormat::Archie { 2 } else { 3 };
                let _ = packet.extend_from_slice(&bytes[..len]);
            }
        }

        self.pending = self.x != 0 || self.y != 0;
        Some(packet)
    }

    // YOvfl, XOvfl, dy sign, dx sign, 1, middle, right, left; dx; dy
    fn ps2_packet(&self, buttons: u8) -> [u8; 3] {
        let mut flags = 0x08 | buttons;
        let mut axis = |pos: i16, sign: u8, overflow: u8| -> u8 {
            if pos < 0 {
                flags |= sign;
            }
            if pos < -255 {
                flags |= overflow;
                0x80
            } else if pos > 255 {
                flags |= overflow;
                0xff
            } else {
                pos as u8
            }
        };
        let x = axis(self.x, 0x10, 0x40);
        let y = axis(self.y, 0x20, 0x80);
        [flags, x, y]
    }
}

/// Archimedes mouse buttons are sent as key numbers.
#[derive(Debug, Default)]
pub struct ArchieButtons {
    last: u8,
}

impl ArchieButtons {
    // (USB button bit, key number) - left, middle, right
    const KEYS: [(u8, u8); 3] = [(0x01, 0x70), (0x04, 0x71), (0x02, 0x72)];

    pub fn new() -> Self {
        Self::default()
    }

    /// Returns (key number, make) for each button that changed.
    pub fn update(&mut self, buttons: u8) -> Vec<(u8, bool), 3> {
        let mut keys = Vec::new();
        for (bit, key) in Self::KEYS {
            if (self.last ^ buttons) & bit != 0 {
                let _ = keys.push((key, buttons & bit != 0));
            }
        }
        self.last = buttons;
        keys
    }
}
