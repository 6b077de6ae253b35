//! Keyboard LED ownership, shared between the core and the firmware.
//!
//! A core can take control of any of the caps, num and scroll lock LEDs by
//! setting that LED's control bit in its LED status byte, and then drives
//! it with the matching status bit.  LEDs the core doesn't control show the
//! firmware's state - the caps lock latch and the emulation mode.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use embassy_time::Instant;
use heapless::Vec;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::KbdLeds;
use crate::constants::KBD_LED_INTERVAL;

const FLAG_MASK: u8 = 0xc0;
const FLAG_STATUS: u8 = 0x40;

// (LED, control bit, status bit)
const LED_BITS: [(KbdLeds, u8, u8); 3] = [
    (KbdLeds::CAPS_LOCK, 0x01, 0x02),
    (KbdLeds::NUM_LOCK, 0x04, 0x08),
    (KbdLeds::SCROLL_LOCK, 0x10, 0x20),
];

#[derive(Debug, Default)]
pub struct KbdLedSync {
    // The core's last valid LED byte.
    core: u8,

    // The firmware's own LED state.
    firmware: KbdLeds,

    next_poll: Option<Instant>,
}

impl KbdLedSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a firmware LED change.  Returns the LEDs which should be
    /// changed on the keyboard, which excludes those the core controls.
    pub fn set(&mut self, leds: KbdLeds, on: bool) -> KbdLeds {
        self.firmware.set(leds, on);
        let mut forward = KbdLeds::empty();
        for (led, control, _) in LED_BITS {
            if leds.contains(led) && self.core & control == 0 {
                forward |= led;
            }
        }
        forward
    }

    /// Whether it's time to read the core's LED byte again.
    pub fn due(&mut self, now: Instant) -> bool {
        if self.next_poll.is_some_and(|next| now < next) {
            return false;
        }
        self.next_poll = Some(now + KBD_LED_INTERVAL);
        true
    }

    /// Processes the core's LED byte.  Returns the keyboard LED changes
    /// needed.
    pub fn update(&mut self, byte: u8) -> Vec<(KbdLeds, bool), 3> {
        let byte = if byte & FLAG_MASK == FLAG_STATUS {
            byte
        } else {
            0
        };

        let mut changes = Vec::new();
        for (led, control, status) in LED_BITS {
            let mask = control | status;
            if (self.core & mask) == (byte & mask) {
                continue;
            }
            let on = if byte & control != 0 {
                byte & status != 0
            } else {
                self.firmware.contains(led)
            };
            trace!("Keyboard LED 0x{:02x} -> {}", led.bits(), on);
            let _ = changes.push((led, on));
        }
        self.core = byte;
        changes
    }
}
