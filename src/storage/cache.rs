//! A single sector read-ahead, write-through, cache in front of the storage
//! medium and the mounted disk images.
//!
//! Cores tend to read sequentially, so after serving a read we immediately
//! load the following sector, so it is ready before the core asks for it.
//! That keeps the I/O loop off the slow path (an uncached SD card access,
//! which stalls the whole loop) in the common case.
//!
//! The cache is keyed on (drive, lba).  Writes go straight to the backing
//! store, and invalidate the cache entry rather than updating it.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::{ImageFile, Sector, SectorStore, StorageError};
use crate::constants::{NUM_DRIVE_SLOTS, SECTOR_SIZE};

/// The LBA used to mark the cache entry as invalid.
const INVALID_LBA: u32 = 0xffff_ffff;

/// What backs a drive slot.
pub enum DriveSlot<F> {
    /// No image mounted - requests go straight to the raw medium.
    Absent,

    /// A mounted disk image.
    Mounted(F),
}

impl<F: ImageFile> DriveSlot<F> {
    /// Whether an image is mounted.
    pub fn is_mounted(&self) -> bool {
        matches!(self, DriveSlot::Mounted(_))
    }
}

// The single cache entry.
struct CacheEntry {
    drive: u8,
    lba: u32,
    data: Sector,
}

impl CacheEntry {
    const fn new() -> Self {
        Self {
            drive: 0,
            lba: INVALID_LBA,
            data: [0; SECTOR_SIZE],
        }
    }

    fn is_valid(&self) -> bool {
        self.lba != INVALID_LBA
    }

    fn holds(&self, drive: u8, lba: u32) -> bool {
        self.is_valid() && self.drive == drive && self.lba == lba
    }
}

/// Counters, used for debug logging and tests.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from the cache.
    pub hits: u32,

    /// Reads which had to go to the backing store.
    pub misses: u32,

    /// Sectors loaded speculatively.
    pub read_aheads: u32,
}

/// The sector cache.  Owns the storage medium and the drive slots - nothing
/// else accesses them directly.
pub struct SdBlockCache<S, F> {
    store: S,
    slots: [DriveSlot<F>; NUM_DRIVE_SLOTS],
    entry: CacheEntry,
    stats: CacheStats,
}

impl<S: SectorStore, F: ImageFile> SdBlockCache<S, F> {
    /// Creates the cache, with both drive slots passing through to the raw
    /// medium.
    pub fn new(store: S) -> Self {
        Self {
            store,
            slots: [DriveSlot::Absent, DriveSlot::Absent],
            entry: CacheEntry::new(),
            stats: CacheStats::default(),
        }
    }

    /// The raw medium.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The raw medium, mutably.  Bypasses the cache, so must only be used
    /// for non-sector operations, like reading the card's registers.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Cache counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Returns the (drive, lba) currently cached, if any.
    pub fn cached(&self) -> Option<(u8, u32)> {
        self.entry
            .is_valid()
            .then_some((self.entry.drive, self.entry.lba))
    }

    /// Drops the cached sector.
    pub fn invalidate(&mut self) {
        self.entry.lba = INVALID_LBA;
    }

    /// Returns a drive slot.
    pub fn slot(&self, drive: u8) -> Option<&DriveSlot<F>> {
        self.slots.get(drive as usize)
    }

    /// Mounts an image into a drive slot, replacing whatever was there.
    pub fn mount(&mut self, drive: u8, mut file: F) -> Result<(), StorageError> {
        let slot = self
            .slots
            .get_mut(drive as usize)
            .ok_or(StorageError::InvalidDrive)?;

        file.build_index()?;
        *slot = DriveSlot::Mounted(file);
        self.invalidate();
        Ok(())
    }

    /// Unmounts the image from a drive slot, returning it.  The slot goes
    /// back to passing through to the raw medium.
    pub fn unmount(&mut self, drive: u8) -> Result<Option<F>, StorageError> {
        let slot = self
            .slots
            .get_mut(drive as usize)
            .ok_or(StorageError::InvalidDrive)?;

        self.entry.lba = INVALID_LBA;
        match core::mem::replace(slot, DriveSlot::Absent) {
            DriveSlot::Mounted(file) => Ok(Some(file)),
            DriveSlot::Absent => Ok(None),
        }
    }

    /// Returns sector `lba` of `drive`, from the cache if present, or
    /// otherwise loaded from the backing store into the cache.
    ///
    /// An out of bounds request, for a mounted image or the raw medium,
    /// leaves the cache untouched.
    pub fn read(&mut self, drive: u8, lba: u32) -> Result<&Sector, StorageError> {
        if drive as usize >= self.slots.len() {
            return Err(StorageError::InvalidDrive);
        }
        if !self.in_bounds(drive, lba) {
            debug!("Read of drive {} lba {} out of bounds", drive, lba);
            return Err(StorageError::OutOfBounds);
        }

        // Cache identity is (drive, lba), so another drive's sector is of
        // no use.
        if self.entry.drive != drive {
            self.invalidate();
        }

        if self.entry.holds(drive, lba) {
            self.stats.hits += 1;
            trace!("Cache hit drive {} lba {}", drive, lba);
        } else {
            self.stats.misses += 1;
            self.load(drive, lba)?;
        }

        Ok(&self.entry.data)
    }

    /// Loads the sector following `lba` into the cache, if it is within the
    /// image (or medium).  Returns whether it was loaded.
    pub fn read_ahead(&mut self, drive: u8, lba: u32) -> bool {
        let Some(next) = lba.checked_add(1) else {
            return false;
        };
        if !self.in_bounds(drive, next) {
            trace!("No read-ahead past end of drive {} at {}", drive, lba);
            return false;
        }

        match self.load(drive, next) {
            Ok(()) => {
                self.stats.read_aheads += 1;
                true
            }
            Err(e) => {
                debug!("Read-ahead of drive {} lba {} failed: {}", drive, next, e);
                false
            }
        }
    }

    /// Writes a sector straight through to the backing store.  If the
    /// sector is cached, the cache entry is dropped.
    pub fn write(&mut self, drive: u8, lba: u32, data: &Sector) -> Result<(), StorageError> {
        if self.entry.drive != drive || self.entry.holds(drive, lba) {
            self.invalidate();
        }

        match self
            .slots
            .get_mut(drive as usize)
            .ok_or(StorageError::InvalidDrive)?
        {
            DriveSlot::Mounted(file) => {
                if !file.contains(lba) {
                    return Err(StorageError::OutOfBounds);
                }
                file.seek(lba)?;
                file.write(data)
            }
            DriveSlot::Absent => self.store.write(lba, data),
        }
    }

    // Whether the sector exists on the drive.  If the medium can't tell us
    // its size we assume it does.
    fn in_bounds(&mut self, drive: u8, lba: u32) -> bool {
        match self.slots.get(drive as usize) {
            Some(DriveSlot::Mounted(file)) => file.contains(lba),
            Some(DriveSlot::Absent) => {
                let count = self.store.sector_count();
                count == 0 || lba < count
            }
            None => false,
        }
    }

    // Loads a sector into the cache entry.  An I/O failure invalidates the
    // entry, as it may have been partially overwritten.
    fn load(&mut self, drive: u8, lba: u32) -> Result<(), StorageError> {
        let result = match self
            .slots
            .get_mut(drive as usize)
            .ok_or(StorageError::InvalidDrive)?
        {
            DriveSlot::Mounted(file) => {
                if !file.contains(lba) {
                    return Err(StorageError::OutOfBounds);
                }
                file.seek(lba).and_then(|_| file.read(&mut self.entry.data))
            }
            DriveSlot::Absent => self.store.read(lba, &mut self.entry.data),
        };

        match result {
            Ok(()) => {
                self.entry.drive = drive;
                self.entry.lba = lba;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load drive {} lba {}: {}", drive, lba, e);
                self.invalidate();
                Err(e)
            }
        }
    }
}
