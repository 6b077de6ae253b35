//! The services the I/O loop needs from the rest of the firmware.
//!
//! Everything here is outside the FPGA link - the USB keyboard LEDs, the
//! OSD menu, the disk activity LED and the physical inputs.  The firmware
//! implements it over embassy-rp peripherals and the HID bridge, and the
//! tests implement it with a recording mock.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use crate::input::buttons::Panel;
use crate::input::{JoyState, KbdLeds};

pub trait Host {
    /// Sets the LEDs on attached USB keyboards.
    fn set_kbd_led(&mut self, leds: KbdLeds, on: bool);

    /// Queues a key for the OSD menu, as an Amiga key code, with bit 7 set
    /// on release.
    fn osd_key(&mut self, code: u8);

    /// Tells the OSD it has been opened or closed from the keyboard.
    fn osd_visible(&mut self, visible: bool);

    /// Asks the OSD to reset the core, for cores where the OSD owns the
    /// reset (Minimig).
    fn osd_reset(&mut self);

    /// Shows an error message to the user.
    fn error_message(&mut self, msg: &str);

    /// Turns the disk activity indicator on or off.
    fn disk_activity(&mut self, active: bool);

    /// Samples a DB9 joystick port, returning active (pressed) bits.
    fn read_db9(&mut self, port: usize) -> JoyState;

    /// Samples the front panel buttons and switches.
    fn read_panel(&mut self) -> Panel;
}
