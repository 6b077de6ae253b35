//! The firmware's side of the dispatcher's [`Host`] - the keyboard LEDs
//! (via the HID bridge), the DB9 ports, the panel ADC and the status LED.
//!
//! The OSD menu runs outside this firmware, so OSD notifications are only
//! logged.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_rp::adc::{Adc, Blocking as AdcBlocking, Channel};
use embassy_rp::gpio::Input;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{Async, UartTx};

use crate::constants::NUM_DB9_PORTS;
use crate::host::Host;
use crate::infra::display::{DisplayType, update_status};
use crate::infra::gpio::DB9_LINES;
use crate::input::bridge::led_frame;
use crate::input::buttons::Panel;
use crate::input::{JoyState, KbdLeds};

// DB9 lines, in the order they're wired.
const DB9_BITS: [JoyState; DB9_LINES] = [
    JoyState::UP,
    JoyState::DOWN,
    JoyState::LEFT,
    JoyState::RIGHT,
    JoyState::BTN1,
];

/// A panel ADC input, and the [`Panel`] channel it feeds.
pub struct PanelInput {
    pub channel: Channel<'static>,
    pub panel_channel: usize,
}

pub struct FirmwareHost {
    bridge_tx: UartTx<'static, UART0, Async>,
    db9: [[Input<'static>; DB9_LINES]; NUM_DB9_PORTS],
    adc: Adc<'static, AdcBlocking>,
    panel_inputs: [PanelInput; 3],
    panel: Panel,
    kbd_leds: KbdLeds,
}

impl FirmwareHost {
    pub fn new(
        bridge_tx: UartTx<'static, UART0, Async>,
        db9: [[Input<'static>; DB9_LINES]; NUM_DB9_PORTS],
        adc: Adc<'static, AdcBlocking>,
        panel_inputs: [PanelInput; 3],
    ) -> Self {
        Self {
            bridge_tx,
            db9,
            adc,
            panel_inputs,
            panel: Panel::empty(),
            kbd_leds: KbdLeds::empty(),
        }
    }
}

impl Host for FirmwareHost {
    fn set_kbd_led(&mut self, leds: KbdLeds, on: bool) {
        self.kbd_leds.set(leds, on);
        if self
            .bridge_tx
            .blocking_write(&led_frame(self.kbd_leds))
            .is_err()
        {
            warn!("Failed to send keyboard LEDs");
        }
    }

    fn osd_key(&mut self, code: u8) {
        trace!("OSD key 0x{:02x}", code);
    }

    fn osd_visible(&mut self, visible: bool) {
        debug!("OSD visible {}", visible);
    }

    fn osd_reset(&mut self) {
        info!("OSD core reset requested");
    }

    fn error_message(&mut self, msg: &str) {
        error!("{}", msg);
    }

    fn disk_activity(&mut self, active: bool) {
        update_status(if active {
            DisplayType::Disk
        } else {
            DisplayType::Ready
        });
    }

    fn read_db9(&mut self, port: usize) -> JoyState {
        let Some(lines) = self.db9.get(port) else {
            return JoyState::empty();
        };
        // Active low.
        lines
            .iter()
            .zip(DB9_BITS)
            .filter(|(line, _)| line.is_low())
            .fold(JoyState::empty(), |state, (_, bit)| state | bit)
    }

    fn read_panel(&mut self) -> Panel {
        for input in self.panel_inputs.iter_mut() {
            match self.adc.blocking_read(&mut input.channel) {
                Ok(sample) => {
                    self.panel = self
                        .panel
                        .with_sample(input.panel_channel, (sample >> 4) as u8);
                }
                Err(e) => debug!("ADC read failed {}", e),
            }
        }
        self.panel
    }
}
