//! SD card emulation for the core.
//!
//! The core sees an SD card, implemented in the FPGA, which forwards sector
//! requests to us.  We serve those either from the physical SD card (when
//! no image is mounted into the requested drive slot) or from a mounted
//! disk image file.  The [`SdBlockCache`] sits between the two, and the
//! [`SdEmulator`] runs the request protocol with the core.
//!
//! The SD card and the filesystem are external collaborators, accessed via
//! the [`SectorStore`], [`ImageFile`] and [`FileSystem`] traits.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub mod cache;
pub mod card;
pub mod emulator;

pub use cache::{DriveSlot, SdBlockCache};
pub use emulator::{SdAction, SdEmulator, SdRequest, SdStatus};

use crate::constants::SECTOR_SIZE;

/// A single sector's worth of data.
pub type Sector = [u8; SECTOR_SIZE];

/// Errors from the storage layer.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The physical medium failed to read or write.
    Io,

    /// The sector requested is beyond the end of the image.
    OutOfBounds,

    /// The drive slot index is not supported.
    InvalidDrive,

    /// No medium is present.
    NoMedium,
}

/// The raw storage medium - the physical SD card.
///
/// Calls are synchronous, and may stall the I/O loop while the medium is
/// accessed.
pub trait SectorStore {
    /// Reads a single sector.
    fn read(&mut self, lba: u32, buf: &mut Sector) -> Result<(), StorageError>;

    /// Writes a single sector.
    fn write(&mut self, lba: u32, buf: &Sector) -> Result<(), StorageError>;

    /// Number of sectors on the medium.
    fn sector_count(&mut self) -> u32;

    /// Whether this is an SDHC (block addressed) card.
    fn is_high_capacity(&self) -> bool;

    /// Retrieves the card's CID and CSD registers.
    fn card_info(&mut self, cid: &mut [u8; 16], csd: &mut [u8; 16]);
}

/// A disk image file which can be mounted into a drive slot.
pub trait ImageFile {
    /// Size of the file in bytes.
    fn len(&self) -> u64;

    /// Whether the file is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds whatever index is needed for fast random access to the
    /// file's sectors.  Called on mount.
    fn build_index(&mut self) -> Result<(), StorageError>;

    /// Moves to the given sector.
    fn seek(&mut self, lba: u32) -> Result<(), StorageError>;

    /// Reads the sector at the current position, and moves on one sector.
    /// A partial final sector is zero padded.
    fn read(&mut self, buf: &mut Sector) -> Result<(), StorageError>;

    /// Writes the sector at the current position, and moves on one sector.
    fn write(&mut self, buf: &Sector) -> Result<(), StorageError>;

    /// Number of whole or partial sectors in the file.
    fn sector_count(&self) -> u32 {
        let sectors = self.len().div_ceil(SECTOR_SIZE as u64);
        u32::try_from(sectors).unwrap_or(u32::MAX)
    }

    /// Whether the given sector lies within the file.
    fn contains(&self, lba: u32) -> bool {
        lba < self.sector_count()
    }
}

/// The filesystem on the SD card, used to find files belonging to the
/// active core.
pub trait FileSystem {
    type File: ImageFile;

    /// Opens an 8.3 file, given as the 11 character name without the dot,
    /// as it is stored in the directory entry (for example `"NES     ROM"`).
    fn open(&mut self, name: &str) -> Option<Self::File>;
}
