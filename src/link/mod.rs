//! The synchronous serial link to the FPGA.
//!
//! The [`CoreLink`] trait is the raw link - chip select and byte exchange.
//! It is implemented over SPI by the firmware, and by a recording mock in
//! the tests.  [`UserIo`] builds the core's framed commands on top of it,
//! and is available on every [`CoreLink`].

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub mod opcodes;

use heapless::String;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::constants::{MAX_CONFIG_ITEM_LEN, SECTOR_SIZE};
use crate::storage::{ImageFile, Sector, SdRequest, StorageError};
use opcodes::*;

/// A single item from a core's config string.
pub type ConfigItem = String<MAX_CONFIG_ITEM_LEN>;

/// The FPGA has a number of independently selected channels.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The user I/O command channel - input, status and storage.
    Io,

    /// The data I/O channel, used to upload files into the core.
    Fpga,

    /// The OSD channel.
    Osd,
}

/// Raw access to the FPGA link.
///
/// A transaction is a `select()`, any number of `transfer()`s and a
/// `deselect()`.  The link is full duplex, so every byte sent clocks a byte
/// back.
pub trait CoreLink {
    /// Asserts the chip select for the target.
    fn select(&mut self, target: Target);

    /// Releases whichever chip select is asserted.
    fn deselect(&mut self);

    /// Exchanges one byte.
    fn transfer(&mut self, byte: u8) -> u8;
}

/// The user I/O and data I/O commands, built on a [`CoreLink`].
pub trait UserIo: CoreLink {
    /// Starts a user I/O command, leaving the channel selected for the
    /// payload.
    fn cmd_cont(&mut self, cmd: u8) {
        self.select(Target::Io);
        self.transfer(cmd);
    }

    /// Sends a command with no payload.
    fn cmd(&mut self, cmd: u8) {
        self.cmd_cont(cmd);
        self.deselect();
    }

    /// Sends a command with a single byte payload.
    fn cmd8(&mut self, cmd: u8, data: u8) {
        self.cmd_cont(cmd);
        self.transfer(data);
        self.deselect();
    }

    /// Sends a command with a 32-bit, little-endian, payload.
    fn cmd32(&mut self, cmd: u8, data: u32) {
        self.cmd_cont(cmd);
        self.write_bytes(&data.to_le_bytes());
        self.deselect();
    }

    /// Sends a command with an arbitrary payload.
    fn cmd_bytes(&mut self, cmd: u8, data: &[u8]) {
        self.cmd_cont(cmd);
        self.write_bytes(data);
        self.deselect();
    }

    /// Writes bytes within a transaction.
    fn write_bytes(&mut self, data: &[u8]) {
        for byte in data {
            self.transfer(*byte);
        }
    }

    /// Reads a byte within a transaction.
    fn read_byte(&mut self) -> u8 {
        self.transfer(0x00)
    }

    /// Reads the core's identification byte.
    fn read_core_id(&mut self) -> u8 {
        self.select(Target::Io);
        let id = self.transfer(0xff);
        self.deselect();
        id
    }

    /// Reads the core's identification byte while a core is running.  The
    /// old Minimig core needs an extra clock after the chip select is
    /// released.
    fn poll_core_id(&mut self) -> u8 {
        let id = self.read_core_id();
        self.transfer(0xff);
        id
    }

    /// Reads the storage request status.  The current protocol (`0x6x`)
    /// includes the drive index, the legacy one (`0x5x`) doesn't.
    fn sd_status(&mut self) -> SdRequest {
        self.cmd_cont(UIO_GET_SDSTAT);
        let status = self.read_byte();
        let drive = if (status & 0xf0) == 0x60 {
            self.read_byte() & 0x01
        } else {
            0
        };
        let mut lba = [0u8; 4];
        for byte in lba.iter_mut() {
            *byte = self.read_byte();
        }
        self.deselect();

        SdRequest::new(status, drive, u32::from_be_bytes(lba))
    }

    /// Reads the keyboard LED byte the core would like shown.
    fn kbd_led_status(&mut self) -> u8 {
        self.cmd_cont(UIO_GET_KBD_LED);
        let leds = self.read_byte();
        self.deselect();
        leds
    }

    /// Sends the SD card's CID and CSD, plus whether it is high capacity, so
    /// a core emulating an SD card can present the same identity.
    fn send_sd_config(&mut self, cid: &[u8; 16], csd: &[u8; 16], high_capacity: bool) {
        self.cmd_cont(UIO_SET_SDCONF);
        self.write_bytes(cid);
        self.write_bytes(csd);
        self.transfer(high_capacity as u8);
        self.deselect();
    }

    /// Sends the 8-bit core's status word.  Older cores only read the first
    /// byte.
    fn send_status(&mut self, status: u32) {
        self.cmd8(UIO_SET_STATUS, status as u8);
        self.cmd32(UIO_SET_STATUS2, status);
    }

    /// Retrieves item `index` from the core's config string.
    ///
    /// Returns None if the core has no config string, or the item is empty
    /// or missing.
    fn config_string_item(&mut self, index: u8) -> Option<ConfigItem> {
        self.cmd_cont(UIO_GET_STRING);
        let mut byte = self.read_byte();
        if byte == CONFIG_STRING_NONE || byte == CONFIG_STRING_A800 {
            self.deselect();
            return None;
        }

        let mut item = ConfigItem::new();
        let mut item_index = 0u8;
        while byte != 0 && byte != 0xff && item_index <= index {
            if byte == CONFIG_STRING_SEPARATOR {
                item_index = item_index.saturating_add(1);
            } else if item_index == index && item.push(byte as char).is_err() {
                break;
            }
            byte = self.read_byte();
        }
        self.deselect();

        if item.is_empty() { None } else { Some(item) }
    }

    /// Sends a sector to the core, completing a read request.
    fn send_sector(&mut self, data: &Sector) {
        self.cmd_bytes(UIO_SECTOR_RD, data);
    }

    /// Fetches a sector from the core, for a write request.
    fn receive_sector(&mut self, data: &mut Sector) {
        self.cmd_cont(UIO_SECTOR_WR);
        for byte in data.iter_mut() {
            *byte = self.read_byte();
        }
        self.deselect();
    }

    /// Tells the core which slot the next file transfer is for.
    fn set_file_index(&mut self, index: u8) {
        self.select(Target::Fpga);
        self.transfer(DIO_FILE_INDEX);
        self.transfer(index);
        self.deselect();
    }

    /// Uploads a whole file into the core over the data I/O channel.
    ///
    /// The core is sent the slot index, a directory entry carrying the
    /// extension and size, then the file in 512 byte chunks.
    fn file_tx<F: ImageFile>(
        &mut self,
        file: &mut F,
        index: u8,
        ext: &str,
    ) -> Result<(), StorageError> {
        let size = u32::try_from(file.len()).map_err(|_| StorageError::OutOfBounds)?;
        debug!("Uploading {} bytes to index {}", size, index);

        self.set_file_index(index);

        // Directory entry: name, ext, attr, reserved, size
        let mut ext_bytes = [b' '; 3];
        for (dst, src) in ext_bytes.iter_mut().zip(ext.bytes()) {
            *dst = src.to_ascii_uppercase();
        }
        self.select(Target::Fpga);
        self.transfer(DIO_FILE_INFO);
        self.write_bytes(&[0; 8]);
        self.write_bytes(&ext_bytes);
        self.write_bytes(&[0; 17]);
        self.write_bytes(&size.to_le_bytes());
        self.deselect();

        self.select(Target::Fpga);
        self.transfer(DIO_FILE_TX);
        self.transfer(0xff);
        self.deselect();

        file.seek(0)?;
        let mut remaining = size as usize;
        let mut buf = [0u8; SECTOR_SIZE];
        let result = loop {
            if remaining == 0 {
                break Ok(());
            }
            if let Err(e) = file.read(&mut buf) {
                break Err(e);
            }
            let chunk = remaining.min(SECTOR_SIZE);
            self.select(Target::Fpga);
            self.transfer(DIO_FILE_TX_DAT);
            self.write_bytes(&buf[..chunk]);
            self.deselect();
            remaining -= chunk;
        };

        // Always signal the end of the transfer, so the core isn't left
        // waiting.
        self.select(Target::Fpga);
        self.transfer(DIO_FILE_TX);
        self.transfer(0x00);
        self.deselect();

        result
    }
}

impl<T: CoreLink + ?Sized> UserIo for T {}
