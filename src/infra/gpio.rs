//! This file handles GPIO pin allocation.
//!
//! The source code serves as the master list of pin assignments for the
//! hardware.  Pins driven by a peripheral function (SPI, UART, ADC) are
//! typed by embassy-rp, so they are taken directly from the peripherals in
//! [`crate::entry`]:
//!
//! | Function          | Pins                          |
//! |-------------------|-------------------------------|
//! | HID bridge UART0  | TX 0, RX 1                    |
//! | SD card SPI1      | SCK 10, MOSI 11, MISO 12, CS 13 |
//! | FPGA link SPI0    | MISO 16, SCK 18, MOSI 19      |
//! | Panel ADC         | 26 (menu), 27 (user), 28 (switch 1) |
//!
//! Everything else is a plain GPIO, allocated by [`config`] and handed out
//! by the [`Gpio`] object.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_rp::gpio::{AnyPin, Input, Level, Output, Pin, Pull};

use crate::constants::{NUM_DB9_PORTS, NUM_GPIO_PINS};

/// Lines on each DB9 port - up, down, left, right, fire.
pub const DB9_LINES: usize = 5;

/// GPIO configurations for different boards.
pub mod config {
    use super::{LinkCsPins, PinConfig};

    /// Configuration for the v0.1 board.
    pub fn userio_v0_1() -> PinConfig {
        PinConfig {
            status_display_pin: 25,
            link_cs: LinkCsPins {
                io: 17,
                fpga: 20,
                osd: 21,
            },
            db9: [[2, 3, 4, 5, 6], [7, 8, 9, 14, 15]],
        }
    }
}

/// Chip selects for the three FPGA link targets.
#[derive(Clone, Copy)]
pub struct LinkCsPins {
    pub io: u8,
    pub fpga: u8,
    pub osd: u8,
}

/// Pin configuration for a board.
#[derive(Clone)]
pub struct PinConfig {
    pub status_display_pin: u8,
    pub link_cs: LinkCsPins,

    /// Per port: up, down, left, right, fire.
    pub db9: [[u8; DB9_LINES]; NUM_DB9_PORTS],
}

impl Default for PinConfig {
    fn default() -> Self {
        config::userio_v0_1()
    }
}

/// Hands out the plain GPIOs by number.
pub struct Gpio {
    pins: [Option<AnyPin>; NUM_GPIO_PINS],
    config: PinConfig,
}

impl Gpio {
    /// Takes ownership of the pins which aren't used by a peripheral.
    pub fn new<const N: usize>(pins: [AnyPin; N], config: Option<PinConfig>) -> Self {
        let mut gpio = Self {
            pins: [const { None }; NUM_GPIO_PINS],
            config: config.unwrap_or_default(),
        };
        for pin in pins {
            let index = pin.pin() as usize;
            if let Some(slot) = gpio.pins.get_mut(index) {
                *slot = Some(pin);
            }
        }
        gpio
    }

    pub fn config(&self) -> &PinConfig {
        &self.config
    }

    /// Takes a pin as an output.  Pin allocation is fixed at build time, so
    /// a pin that's missing or already taken is a bug.
    pub fn take_output(&mut self, index: u8, level: Level) -> Output<'static> {
        Output::new(self.take(index), level)
    }

    /// Takes a pin as an input.
    pub fn take_input(&mut self, index: u8, pull: Pull) -> Input<'static> {
        Input::new(self.take(index), pull)
    }

    fn take(&mut self, index: u8) -> AnyPin {
        match self.pins.get_mut(index as usize).and_then(Option::take) {
            Some(pin) => pin,
            None => panic!("GPIO {} not available", index),
        }
    }
}
