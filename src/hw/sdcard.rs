//! The physical SD card, and the FAT filesystem on it.
//!
//! The card is shared between the raw [`SdStore`] (serving the core's
//! sector requests when no image is mounted) and the [`SdFs`] volume
//! manager (opening disk images and the core's ROM and CFG files).  Both
//! hold a [`SharedCard`] referencing the one static card driver.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use core::cell::RefCell;
use core::fmt::Write;
#[allow(unused_imports)]
use defmt::{Debug2Format, debug, error, info, trace, warn};
use embassy_embedded_hal::shared_bus::blocking::spi::SpiDevice;
use embassy_rp::gpio::Output;
use embassy_rp::peripherals::SPI1;
use embassy_rp::spi::{Blocking, Spi};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Delay;
use embedded_sdmmc::{
    Block, BlockCount, BlockDevice, BlockIdx, Mode, RawDirectory, RawFile, SdCard, TimeSource,
    Timestamp, VolumeIdx, VolumeManager,
};
use heapless::String;

use crate::constants::{SECTOR_SHIFT, SECTOR_SIZE};
use crate::storage::{FileSystem, ImageFile, Sector, SectorStore, StorageError, card};

pub type SdBus = Mutex<NoopRawMutex, RefCell<Spi<'static, SPI1, Blocking>>>;
pub type SdSpiDevice = SpiDevice<'static, NoopRawMutex, Spi<'static, SPI1, Blocking>, Output<'static>>;
pub type SdCardDriver = SdCard<SdSpiDevice, Delay>;
pub type Volumes = VolumeManager<SharedCard, FixedClock>;

/// A handle on the card driver, which takes `&self` for block access.
#[derive(Clone, Copy)]
pub struct SharedCard(pub &'static SdCardDriver);

impl BlockDevice for SharedCard {
    type Error = <SdCardDriver as BlockDevice>::Error;

    fn read(&self, blocks: &mut [Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        self.0.read(blocks, start_block_idx)
    }

    fn write(&self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        self.0.write(blocks, start_block_idx)
    }

    fn num_blocks(&self) -> Result<BlockCount, Self::Error> {
        self.0.num_blocks()
    }
}

/// There's no RTC, so files are stamped with a fixed date.
pub struct FixedClock;

impl TimeSource for FixedClock {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

//
// Raw card
//

pub struct SdStore {
    card: SharedCard,
    sectors: u32,
    high_capacity: bool,
}

impl SdStore {
    /// Initialises the card, if present.  Without a card every access
    /// fails, and the core sees an empty medium.
    pub fn new(card: SharedCard) -> Self {
        let sectors = match card.0.num_bytes() {
            Ok(bytes) => u32::try_from(bytes >> SECTOR_SHIFT).unwrap_or(u32::MAX),
            Err(e) => {
                warn!("No SD card: {}", Debug2Format(&e));
                0
            }
        };
        let high_capacity = matches!(
            card.0.get_card_type(),
            Some(embedded_sdmmc::sdcard::CardType::SDHC)
        );
        info!("SD card {} sectors, SDHC {}", sectors, high_capacity);
        Self {
            card,
            sectors,
            high_capacity,
        }
    }
}

impl SectorStore for SdStore {
    fn read(&mut self, lba: u32, buf: &mut Sector) -> Result<(), StorageError> {
        if self.sectors == 0 {
            return Err(StorageError::NoMedium);
        }
        let mut blocks = [Block::new()];
        self.card.read(&mut blocks, BlockIdx(lba)).map_err(|e| {
            warn!("SD read {} failed: {}", lba, Debug2Format(&e));
            StorageError::Io
        })?;
        buf.copy_from_slice(&blocks[0].contents);
        Ok(())
    }

    fn write(&mut self, lba: u32, buf: &Sector) -> Result<(), StorageError> {
        if self.sectors == 0 {
            return Err(StorageError::NoMedium);
        }
        let mut blocks = [Block::new()];
        blocks[0].contents.copy_from_slice(buf);
        self.card.write(&blocks, BlockIdx(lba)).map_err(|e| {
            warn!("SD write {} failed: {}", lba, Debug2Format(&e));
            StorageError::Io
        })
    }

    fn sector_count(&mut self) -> u32 {
        self.sectors
    }

    fn is_high_capacity(&self) -> bool {
        self.high_capacity
    }

    fn card_info(&mut self, cid: &mut [u8; 16], csd: &mut [u8; 16]) {
        *cid = card::cid();
        *csd = card::csd(self.sectors, self.high_capacity);
    }
}

//
// Filesystem
//

pub struct SdFs {
    volumes: &'static Volumes,
    root: Option<RawDirectory>,
}

impl SdFs {
    /// Opens the first partition's root directory.
    pub fn new(volumes: &'static Volumes) -> Self {
        let root = volumes
            .open_raw_volume(VolumeIdx(0))
            .and_then(|volume| volumes.open_root_dir(volume));
        let root = match root {
            Ok(root) => Some(root),
            Err(e) => {
                warn!("No FAT volume: {}", Debug2Format(&e));
                None
            }
        };
        Self { volumes, root }
    }
}

// Converts a directory entry style name ("NES     ROM") to "NES.ROM".
fn dotted_name(name: &str) -> Option<String<12>> {
    let base = name.get(..8)?.trim_end();
    let ext = name.get(8..)?.trim_end();
    let mut dotted = String::new();
    write!(dotted, "{}.{}", base, ext).ok()?;
    Some(dotted)
}

impl FileSystem for SdFs {
    type File = SdImage;

    fn open(&mut self, name: &str) -> Option<SdImage> {
        let root = self.root?;
        let dotted = dotted_name(name)?;
        let file = match self
            .volumes
            .open_file_in_dir(root, dotted.as_str(), Mode::ReadWriteAppend)
        {
            Ok(file) => file,
            Err(e) => {
                debug!("Can't open {}: {}", dotted.as_str(), Debug2Format(&e));
                return None;
            }
        };
        let len = self.volumes.file_length(file).unwrap_or(0);
        debug!("Opened {} ({} bytes)", dotted.as_str(), len);
        Some(SdImage {
            volumes: self.volumes,
            file,
            len,
        })
    }
}

/// An open file, mountable as a disk image.
pub struct SdImage {
    volumes: &'static Volumes,
    file: RawFile,
    len: u32,
}

impl ImageFile for SdImage {
    fn len(&self) -> u64 {
        self.len as u64
    }

    /// Nothing is indexed.  `embedded-sdmmc` keeps the file's cluster
    /// chain private, so a seek backwards walks the chain again from the
    /// first cluster, and a seek forwards walks on from the current one.
    /// Large images with scattered access can stall the I/O loop.
    fn build_index(&mut self) -> Result<(), StorageError> {
        debug!("No seek index for {} byte image", self.len);
        Ok(())
    }

    fn seek(&mut self, lba: u32) -> Result<(), StorageError> {
        let offset = lba
            .checked_mul(SECTOR_SIZE as u32)
            .ok_or(StorageError::OutOfBounds)?;
        self.volumes
            .file_seek_from_start(self.file, offset)
            .map_err(|e| {
                debug!("Seek to {} failed: {}", lba, Debug2Format(&e));
                StorageError::OutOfBounds
            })
    }

    fn read(&mut self, buf: &mut Sector) -> Result<(), StorageError> {
        buf.fill(0);
        self.volumes.read(self.file, buf).map(|_| ()).map_err(|e| {
            warn!("Image read failed: {}", Debug2Format(&e));
            StorageError::Io
        })
    }

    fn write(&mut self, buf: &Sector) -> Result<(), StorageError> {
        self.volumes.write(self.file, buf).map_err(|e| {
            warn!("Image write failed: {}", Debug2Format(&e));
            StorageError::Io
        })
    }
}

impl Drop for SdImage {
    fn drop(&mut self) {
        if let Err(e) = self.volumes.close_file(self.file) {
            warn!("Failed to close image: {}", Debug2Format(&e));
        }
    }
}
