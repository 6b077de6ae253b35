//! The FPGA link over SPI, with a chip select per target.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::link::{CoreLink, Target};

/// Drives the link.  Chip selects are active low, and at most one is
/// asserted at a time.
pub struct SpiLink<B, P> {
    bus: B,
    io: P,
    fpga: P,
    osd: P,
}

impl<B, P> SpiLink<B, P>
where
    B: SpiBus,
    P: OutputPin,
{
    /// Takes the bus and the chip selects, which must start deasserted
    /// (high).
    pub fn new(bus: B, io: P, fpga: P, osd: P) -> Self {
        Self { bus, io, fpga, osd }
    }

    fn cs(&mut self, target: Target) -> &mut P {
        match target {
            Target::Io => &mut self.io,
            Target::Fpga => &mut self.fpga,
            Target::Osd => &mut self.osd,
        }
    }
}

impl<B, P> CoreLink for SpiLink<B, P>
where
    B: SpiBus,
    P: OutputPin,
{
    fn select(&mut self, target: Target) {
        if self.cs(target).set_low().is_err() {
            warn!("Failed to select {}", target);
        }
    }

    fn deselect(&mut self) {
        // Wait for the last byte to leave before releasing the target.
        let _ = self.bus.flush();
        let _ = self.io.set_high();
        let _ = self.fpga.set_high();
        let _ = self.osd.set_high();
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        let mut buf = [byte];
        match self.bus.transfer_in_place(&mut buf) {
            Ok(()) => buf[0],
            Err(_) => {
                warn!("Link transfer of 0x{:02x} failed", byte);
                0xff
            }
        }
    }
}
