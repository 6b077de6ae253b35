//! Runs the core's SD card request protocol.
//!
//! Each I/O loop iteration the core is asked whether it has a sector request
//! pending.  Reads are served from the [`SdBlockCache`], followed by a
//! read-ahead.  Writes are fetched from the core and written through.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use bitflags::bitflags;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::{ImageFile, SdBlockCache, SectorStore, StorageError};
use crate::constants::SECTOR_SIZE;
use crate::host::Host;
use crate::link::opcodes::{UIO_SET_SDINFO, UIO_SET_SDSTAT};
use crate::link::{CoreLink, UserIo};

/// Shown once per mount if a core which doesn't understand SDHC addressing
/// accesses an SDHC card.
pub const SDHC_WARNING: &str = " This core does not support\n SDHC cards. Using them may\n lead to data corruption.\n\n Please use an SD card <2GB!";

bitflags! {
    /// The low nibble of the core's storage status byte.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SdStatus: u8 {
        /// A sector read is pending.
        const READ = 0x01;

        /// A sector write is pending.
        const WRITE = 0x02;

        /// The core is using SDHC (block) addressing.
        const HIGH_CAPACITY = 0x04;

        /// The core wants the SD card's CID/CSD sent again.
        const CONFIG_REQUEST = 0x08;
    }
}

/// A storage request, as read from the core.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdRequest {
    status: u8,
    drive: u8,
    lba: u32,
}

impl SdRequest {
    pub fn new(status: u8, drive: u8, lba: u32) -> Self {
        Self { status, drive, lba }
    }

    /// Whether this is a real request.  The high nibble is `0x5` for the
    /// legacy protocol and `0x6` for the current one, which protects us
    /// against cores that don't implement the command at all.
    pub fn is_valid(&self) -> bool {
        matches!(self.status & 0xf0, 0x50 | 0x60)
    }

    pub fn flags(&self) -> SdStatus {
        SdStatus::from_bits_truncate(self.status)
    }

    /// The drive slot the request is for.
    pub fn drive(&self) -> u8 {
        self.drive
    }

    pub fn lba(&self) -> u32 {
        self.lba
    }

    /// Whether a sector read or write is pending.
    pub fn is_access(&self) -> bool {
        self.flags()
            .intersects(SdStatus::READ | SdStatus::WRITE)
    }

    pub fn is_read(&self) -> bool {
        self.flags() & (SdStatus::READ | SdStatus::WRITE) == SdStatus::READ
    }

    pub fn is_write(&self) -> bool {
        self.flags() & (SdStatus::READ | SdStatus::WRITE) == SdStatus::WRITE
    }
}

/// What [`SdEmulator::poll`] did.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdAction {
    /// No valid request was pending.
    Idle,

    /// The request only asked for the SD config.
    Config,

    /// A sector was sent to the core.
    Read { drive: u8, lba: u32 },

    /// A sector from the core was written.
    Write { drive: u8, lba: u32 },

    /// The request couldn't be serviced.
    Failed(StorageError),
}

/// The SD card request handler.
#[derive(Default)]
pub struct SdEmulator {
    // Set once the SDHC warning has been shown for the current mount.
    sdhc_warned: bool,
}

impl SdEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards the SD card's CID, CSD and capacity type to the core, so
    /// a core implementing an SD card can present the same identity.
    pub fn send_config<L, S, F>(&mut self, link: &mut L, cache: &mut SdBlockCache<S, F>)
    where
        L: CoreLink,
        S: SectorStore,
        F: ImageFile,
    {
        let mut cid = [0u8; 16];
        let mut csd = [0u8; 16];
        let store = cache.store_mut();
        store.card_info(&mut cid, &mut csd);
        let high_capacity = store.is_high_capacity();
        debug!("Sending SD config, SDHC {}", high_capacity);
        link.send_sd_config(&cid, &csd, high_capacity);
    }

    /// Mounts an image into a drive slot and tells the core about it.
    pub fn mount<L, S, F>(
        &mut self,
        link: &mut L,
        cache: &mut SdBlockCache<S, F>,
        drive: u8,
        file: F,
    ) -> Result<(), StorageError>
    where
        L: CoreLink,
        S: SectorStore,
        F: ImageFile,
    {
        let size = file.len();
        cache.mount(drive, file)?;
        info!("Mounted {} byte image in drive {}", size, drive);
        self.sdhc_warned = false;
        self.notify(link, drive, size);
        Ok(())
    }

    /// Unmounts the image from a drive slot, and tells the core.
    pub fn unmount<L, S, F>(
        &mut self,
        link: &mut L,
        cache: &mut SdBlockCache<S, F>,
        drive: u8,
    ) -> Result<Option<F>, StorageError>
    where
        L: CoreLink,
        S: SectorStore,
        F: ImageFile,
    {
        let file = cache.unmount(drive)?;
        info!("Unmounted drive {}", drive);
        self.sdhc_warned = false;
        self.notify(link, drive, 0);
        Ok(file)
    }

    // Sends the image size (little endian, with room for extension), then
    // flags the change of image.
    fn notify<L: CoreLink>(&mut self, link: &mut L, drive: u8, size: u64) {
        link.cmd_cont(UIO_SET_SDINFO);
        link.write_bytes(&(size as u32).to_le_bytes());
        link.write_bytes(&[0; 12]);
        link.deselect();
        link.cmd8(UIO_SET_SDSTAT, drive);
    }

    /// Handles any pending storage request from the core.
    ///
    /// Medium accesses happen inline, so an uncached load stalls the caller
    /// for its duration.
    pub fn poll<L, S, F, H>(
        &mut self,
        link: &mut L,
        cache: &mut SdBlockCache<S, F>,
        host: &mut H,
    ) -> SdAction
    where
        L: CoreLink,
        S: SectorStore,
        F: ImageFile,
        H: Host,
    {
        let req = link.sd_status();
        if !req.is_valid() {
            return SdAction::Idle;
        }

        let flags = req.flags();
        if flags.contains(SdStatus::CONFIG_REQUEST) {
            info!("Core requests SD config");
            self.send_config(link, cache);
        }

        // Warn, once, about a core using byte addressing on an SDHC card.
        // We carry on regardless.
        if cache.store().is_high_capacity()
            && req.is_access()
            && !flags.contains(SdStatus::HIGH_CAPACITY)
            && !self.sdhc_warned
        {
            warn!("Core does not support SDHC");
            host.error_message(SDHC_WARNING);
            self.sdhc_warned = true;
        }

        let (drive, lba) = (req.drive(), req.lba());
        if req.is_write() {
            trace!("SD write drive {} lba {}", drive, lba);

            // Always fetch the data, even if we can't write it, to complete
            // the request.
            let mut data = [0u8; SECTOR_SIZE];
            link.receive_sector(&mut data);

            host.disk_activity(true);
            let result = cache.write(drive, lba, &data);
            host.disk_activity(false);

            match result {
                Ok(()) => SdAction::Write { drive, lba },
                Err(e) => {
                    warn!("SD write drive {} lba {} failed: {}", drive, lba, e);
                    SdAction::Failed(e)
                }
            }
        } else if req.is_read() {
            trace!("SD read drive {} lba {}", drive, lba);

            host.disk_activity(true);
            let action = match cache.read(drive, lba) {
                Ok(data) => {
                    link.send_sector(data);
                    cache.read_ahead(drive, lba);
                    SdAction::Read { drive, lba }
                }
                Err(e) => {
                    warn!("SD read drive {} lba {} not serviced: {}", drive, lba, e);
                    SdAction::Failed(e)
                }
            };
            host.disk_activity(false);
            action
        } else {
            SdAction::Config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::opcodes::{UIO_GET_SDSTAT, UIO_SECTOR_RD, UIO_SECTOR_WR, UIO_SET_SDCONF};
    use crate::test::{MemImage, MemStore, MockHost, MockLink};

    fn read_req(drive: u8, lba: u32) -> [u8; 6] {
        let l = lba.to_be_bytes();
        [0x61, drive, l[0], l[1], l[2], l[3]]
    }

    fn write_req(drive: u8, lba: u32) -> [u8; 6] {
        let l = lba.to_be_bytes();
        [0x62, drive, l[0], l[1], l[2], l[3]]
    }

    #[test]
    fn scenario_mount_read_write_read() {
        let mut link = MockLink::new();
        let mut host = MockHost::new();
        let mut cache = SdBlockCache::new(MemStore::new(1000));
        let mut sd = SdEmulator::new();

        sd.mount(&mut link, &mut cache, 0, MemImage::new(100 * SECTOR_SIZE))
            .unwrap();
        let frames = link.take_frames();
        assert_eq!(frames[0].1[0], UIO_SET_SDINFO);
        assert_eq!(&frames[0].1[1..5], &(100 * SECTOR_SIZE as u32).to_le_bytes());
        assert_eq!(frames[1].1, vec![UIO_SET_SDSTAT, 0]);

        // Read LBA 5 - a miss, then read-ahead of 6
        link.respond(UIO_GET_SDSTAT, &read_req(0, 5));
        assert_eq!(
            sd.poll(&mut link, &mut cache, &mut host),
            SdAction::Read { drive: 0, lba: 5 }
        );
        assert_eq!(cache.cached(), Some((0, 6)));
        let stats = cache.stats();
        assert_eq!((stats.misses, stats.read_aheads), (1, 1));

        // Read LBA 6 - a hit
        link.respond(UIO_GET_SDSTAT, &read_req(0, 6));
        sd.poll(&mut link, &mut cache, &mut host);
        assert_eq!(cache.stats().hits, 1);
        let sent = link.last_frame_for(UIO_SECTOR_RD).unwrap();
        assert_eq!(&sent[1..], &MemImage::pattern(6)[..]);

        // Write LBA 6
        link.respond(UIO_GET_SDSTAT, &write_req(0, 6));
        link.respond(UIO_SECTOR_WR, &[0xa5; SECTOR_SIZE]);
        assert_eq!(
            sd.poll(&mut link, &mut cache, &mut host),
            SdAction::Write { drive: 0, lba: 6 }
        );

        // And read it back
        link.respond(UIO_GET_SDSTAT, &read_req(0, 6));
        sd.poll(&mut link, &mut cache, &mut host);
        let sent = link.last_frame_for(UIO_SECTOR_RD).unwrap();
        assert!(sent[1..].iter().all(|b| *b == 0xa5));
        assert_eq!(cache.store().writes(), 0);
    }

    #[test]
    fn invalid_status_is_ignored() {
        let mut link = MockLink::new();
        let mut host = MockHost::new();
        let mut cache = SdBlockCache::<_, MemImage>::new(MemStore::new(10));
        let mut sd = SdEmulator::new();

        link.respond(UIO_GET_SDSTAT, &[0xff, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(sd.poll(&mut link, &mut cache, &mut host), SdAction::Idle);
        link.respond(UIO_GET_SDSTAT, &[0x01, 0, 0, 0, 0]);
        assert_eq!(sd.poll(&mut link, &mut cache, &mut host), SdAction::Idle);
        assert!(link.last_frame_for(UIO_SECTOR_RD).is_none());
        assert_eq!(cache.store().reads(), 0);
    }

    #[test]
    fn sdhc_warning_once_per_mount() {
        let mut link = MockLink::new();
        let mut host = MockHost::new();
        let mut store = MemStore::new(10);
        store.set_high_capacity(true);
        let mut cache = SdBlockCache::new(store);
        let mut sd = SdEmulator::new();

        // Legacy protocol read, without the SDHC flag
        for _ in 0..3 {
            link.respond(UIO_GET_SDSTAT, &[0x51, 0, 0, 0, 1]);
            assert_eq!(
                sd.poll(&mut link, &mut cache, &mut host),
                SdAction::Read { drive: 0, lba: 1 }
            );
        }
        assert_eq!(host.errors.len(), 1);

        sd.mount(&mut link, &mut cache, 1, MemImage::new(SECTOR_SIZE))
            .unwrap();
        link.respond(UIO_GET_SDSTAT, &[0x51, 0, 0, 0, 1]);
        sd.poll(&mut link, &mut cache, &mut host);
        assert_eq!(host.errors.len(), 2);

        // A core using SDHC addressing is fine
        let mut sd = SdEmulator::new();
        link.respond(UIO_GET_SDSTAT, &[0x55, 0, 0, 0, 1]);
        sd.poll(&mut link, &mut cache, &mut host);
        assert_eq!(host.errors.len(), 2);
    }

    #[test]
    fn config_request_resends_config() {
        let mut link = MockLink::new();
        let mut host = MockHost::new();
        let mut cache = SdBlockCache::<_, MemImage>::new(MemStore::new(10));
        let mut sd = SdEmulator::new();

        link.respond(UIO_GET_SDSTAT, &[0x58, 0, 0, 0, 0]);
        assert_eq!(sd.poll(&mut link, &mut cache, &mut host), SdAction::Config);
        let config = link.last_frame_for(UIO_SET_SDCONF).unwrap();
        assert_eq!(config.len(), 1 + 33);
        assert_eq!(config[33], 0);
    }

    #[test]
    fn out_of_bounds_write_still_fetches_data() {
        let mut link = MockLink::new();
        let mut host = MockHost::new();
        let mut cache = SdBlockCache::new(MemStore::new(10));
        let mut sd = SdEmulator::new();
        sd.mount(&mut link, &mut cache, 0, MemImage::new(2 * SECTOR_SIZE))
            .unwrap();

        link.respond(UIO_GET_SDSTAT, &write_req(0, 2));
        assert_eq!(
            sd.poll(&mut link, &mut cache, &mut host),
            SdAction::Failed(StorageError::OutOfBounds)
        );
        assert_eq!(link.last_frame_for(UIO_SECTOR_WR).unwrap().len(), 1 + SECTOR_SIZE);
    }
}
