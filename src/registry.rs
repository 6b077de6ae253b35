//! Tracks which core is loaded into the FPGA.
//!
//! The core is identified once at startup by [`CoreTypeRegistry::detect`],
//! and then checked on every I/O loop iteration by
//! [`CoreTypeRegistry::poll`].  If a different identification byte keeps
//! coming back, a new core is being loaded (usually over JTAG), and the
//! firmware must restart once it is up, rather than carry on talking to a
//! half configured FPGA.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use core::fmt::Write;
use heapless::String;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::constants::{
    CONFIG_FILE_NAME_LEN, CORE_MISMATCH_LIMIT, MAX_CONFIG_FILE_LEN, MAX_CORE_NAME_LEN, SECTOR_SIZE,
};
use crate::input::profile::CoreProfile;
use crate::link::opcodes::UIO_STATUS_RESET;
use crate::link::{CoreLink, UserIo};
use crate::storage::{FileSystem, ImageFile, SdBlockCache, SdEmulator, SectorStore};
use crate::types::CoreType;

/// The core's name, from its config string.
pub type CoreName = String<MAX_CORE_NAME_LEN>;

/// The result of checking the core.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    /// The core is the one we detected.
    Active,

    /// A different identification byte came back.  Holds the number of
    /// consecutive mismatches.
    Mismatch(u8),

    /// A new core is being loaded.  Nothing should be sent to the FPGA.
    Reloading,

    /// The new core is up, so the firmware must restart.
    Restart,
}

pub struct CoreTypeRegistry {
    core: CoreType,
    profile: Option<&'static CoreProfile>,
    name: CoreName,
    has_config_string: bool,

    // Shadow of the 8-bit core's status word.
    status: u32,

    mismatches: u8,
    reloading: bool,
}

impl Default for CoreTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreTypeRegistry {
    pub fn new() -> Self {
        Self {
            core: CoreType::Unknown,
            profile: None,
            name: CoreName::new(),
            has_config_string: false,
            status: 0,
            mismatches: 0,
            reloading: false,
        }
    }

    /// The active core.
    pub fn core(&self) -> CoreType {
        self.core
    }

    /// The active core's profile.  None if nothing should be dispatched to
    /// the core.
    pub fn profile(&self) -> Option<&'static CoreProfile> {
        self.profile
    }

    /// The core's name, empty if it hasn't got one.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_config_string(&self) -> bool {
        self.has_config_string
    }

    /// The 8-bit core's status word, as last sent.
    pub fn status(&self) -> u32 {
        self.status
    }

    /// Identifies the core.  For 8-bit cores this also forwards the SD card
    /// config, reads the core's name, and loads any CFG, ROM and VHD files
    /// named after the core while holding it in reset.
    pub fn detect<L, S, F, FS>(
        &mut self,
        link: &mut L,
        sd: &mut SdEmulator,
        cache: &mut SdBlockCache<S, F>,
        fs: &mut FS,
    ) -> CoreType
    where
        L: CoreLink,
        S: SectorStore,
        F: ImageFile,
        FS: FileSystem<File = F>,
    {
        self.name.clear();
        self.has_config_string = false;
        self.mismatches = 0;
        self.reloading = false;

        let id = link.read_core_id();
        self.core = CoreType::from_id(id);
        self.profile = CoreProfile::for_core(self.core);

        match self.core {
            CoreType::Unknown => warn!("Unable to identify core 0x{:02x}", id),
            CoreType::Dumb => info!("Identified core without user interface"),
            CoreType::Generic8Bit => {
                info!("Identified 8-bit core");
                self.detect_8bit(link, sd, cache, fs);
            }
            core => info!("Identified core {}", core),
        }

        self.core
    }

    fn detect_8bit<L, S, F, FS>(
        &mut self,
        link: &mut L,
        sd: &mut SdEmulator,
        cache: &mut SdBlockCache<S, F>,
        fs: &mut FS,
    ) where
        L: CoreLink,
        S: SectorStore,
        F: ImageFile,
        FS: FileSystem<File = F>,
    {
        // The core may implement its own SD card, using ours.
        sd.send_config(link, cache);

        // Item 0 of the config string is the core's name.
        let item = link.config_string_item(0);
        self.has_config_string = item.is_some();
        for c in item.iter().flat_map(|name| name.chars()).take(MAX_CORE_NAME_LEN) {
            let _ = self.name.push(c);
        }
        info!("Core name is \"{}\"", self.name.as_str());

        self.set_status(link, UIO_STATUS_RESET, UIO_STATUS_RESET);

        if let Some(mut file_name) = self.file_name("CFG") {
            debug!("Loading config {}", file_name.as_str());
            if let Some(mut file) = fs.open(&file_name) {
                if file.len() <= MAX_CONFIG_FILE_LEN {
                    self.load_status(link, &mut file);
                }
            }

            file_name.truncate(8);
            let _ = file_name.push_str("ROM");
            if let Some(mut file) = fs.open(&file_name) {
                info!("Uploading {}", file_name.as_str());
                if let Err(e) = link.file_tx(&mut file, 0, "ROM") {
                    warn!("ROM upload failed: {}", e);
                }
            }

            file_name.truncate(8);
            let _ = file_name.push_str("VHD");
            if let Some(file) = fs.open(&file_name) {
                if let Err(e) = sd.mount(link, cache, 0, file) {
                    warn!("Failed to mount {}: {}", file_name.as_str(), e);
                }
            }
        }

        self.set_status(link, 0, UIO_STATUS_RESET);
    }

    // Reads a saved status word, little endian.
    fn load_status<L: CoreLink, F: ImageFile>(&mut self, link: &mut L, file: &mut F) {
        let mut sector = [0u8; SECTOR_SIZE];
        match file.seek(0).and_then(|_| file.read(&mut sector)) {
            Ok(()) => {
                let status = u32::from_le_bytes([sector[0], sector[1], sector[2], sector[3]]);
                info!("Loaded status 0x{:08x}", status);
                self.set_status(link, status, u32::MAX);
            }
            Err(e) => warn!("Failed to read config: {}", e),
        }
    }

    /// The directory entry name of a file belonging to this core - the core
    /// name padded to 8, followed by the extension.
    pub fn file_name(&self, ext: &str) -> Option<String<CONFIG_FILE_NAME_LEN>> {
        if self.name.is_empty() {
            return None;
        }
        let mut name = String::new();
        let base = self.name.get(..self.name.len().min(8)).unwrap_or("");
        write!(name, "{:<8}{:.3}", base, ext).ok()?;
        Some(name)
    }

    /// Updates the masked bits of the 8-bit core's status word, and sends
    /// it.
    pub fn set_status<L: CoreLink>(&mut self, link: &mut L, status: u32, mask: u32) {
        self.status = (self.status & !mask) | (status & mask);
        trace!("Core status 0x{:08x}", self.status);
        link.send_status(self.status);
    }

    /// Checks the core is still the one detected.  Called every I/O loop
    /// iteration.
    pub fn poll<L: CoreLink>(&mut self, link: &mut L) -> CoreState {
        let id = link.poll_core_id();

        if self.reloading {
            // Wait for a valid id, which means the new core is up.
            return if CoreType::is_valid_id(id) {
                info!("New core 0x{:02x} is up", id);
                CoreState::Restart
            } else {
                CoreState::Reloading
            };
        }

        if CoreType::from_id(id) == self.core {
            self.mismatches = 0;
            return CoreState::Active;
        }

        self.mismatches = self.mismatches.saturating_add(1);
        if self.mismatches >= CORE_MISMATCH_LIMIT {
            warn!("Core changed to 0x{:02x} - waiting for reload", id);
            self.reloading = true;
            CoreState::Reloading
        } else {
            CoreState::Mismatch(self.mismatches)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Target;
    use crate::link::opcodes::*;
    use crate::test::{MemImage, MemStore, MockFs, MockLink};

    struct Rig {
        link: MockLink,
        sd: SdEmulator,
        cache: SdBlockCache<MemStore, MemImage>,
        fs: MockFs,
        registry: CoreTypeRegistry,
    }

    impl Rig {
        fn new(id: u8) -> Self {
            let mut link = MockLink::new();
            link.set_core_id(id);
            Self {
                link,
                sd: SdEmulator::new(),
                cache: SdBlockCache::new(MemStore::new(64)),
                fs: MockFs::new(),
                registry: CoreTypeRegistry::new(),
            }
        }

        fn detect(&mut self) -> CoreType {
            self.registry
                .detect(&mut self.link, &mut self.sd, &mut self.cache, &mut self.fs)
        }
    }

    #[test]
    fn unknown_core_has_no_profile() {
        let mut rig = Rig::new(0xb3);
        assert_eq!(rig.detect(), CoreType::Unknown);
        assert!(rig.registry.profile().is_none());
        let mut rig = Rig::new(0xa0);
        assert_eq!(rig.detect(), CoreType::Dumb);
        assert!(rig.registry.profile().is_none());
    }

    #[test]
    fn non_8bit_detect_is_one_read() {
        let mut rig = Rig::new(0xa3);
        assert_eq!(rig.detect(), CoreType::AtariSt);
        assert_eq!(rig.link.frames(), vec![(Target::Io, vec![0xff])]);
        assert!(rig.registry.profile().is_some());
    }

    #[test]
    fn detect_8bit_sequence() {
        let mut rig = Rig::new(0xa4);
        rig.link.respond(UIO_GET_STRING, b"NES;F,NES\0");
        rig.fs.add("NES     CFG", &[0x12, 0x34, 0x00, 0x00]);
        rig.fs.add("NES     ROM", &[0xaa; 100]);
        rig.fs.add("NES     VHD", &[0x55; 1024]);

        assert_eq!(rig.detect(), CoreType::Generic8Bit);
        assert_eq!(rig.registry.name(), "NES");
        assert!(rig.registry.has_config_string());
        assert_eq!(rig.fs.opened, vec!["NES     CFG", "NES     ROM", "NES     VHD"]);
        assert!(matches!(
            rig.cache.slot(0),
            Some(crate::storage::DriveSlot::Mounted(_))
        ));

        // Order of the user I/O commands
        let cmds: Vec<u8> = rig
            .link
            .frames()
            .iter()
            .filter(|(t, _)| *t == Target::Io)
            .map(|(_, f)| f[0])
            .collect();
        let pos = |cmd: u8| cmds.iter().position(|c| *c == cmd).unwrap();
        let sdconf = pos(UIO_SET_SDCONF);
        let string = pos(UIO_GET_STRING);
        let reset = pos(UIO_SET_STATUS);
        let sdinfo = pos(UIO_SET_SDINFO);
        let release = cmds.iter().rposition(|c| *c == UIO_SET_STATUS).unwrap();
        assert!(sdconf < string && string < reset && reset < sdinfo && sdinfo < release);

        // Reset asserted, then the saved status, then reset released
        let status: Vec<Vec<u8>> = rig.link.frames_for(UIO_SET_STATUS);
        assert_eq!(status.first().unwrap(), &vec![UIO_SET_STATUS, 0x01]);
        assert_eq!(status[1], vec![UIO_SET_STATUS, 0x12]);
        assert_eq!(status.last().unwrap(), &vec![UIO_SET_STATUS, 0x12]);
        assert_eq!(rig.registry.status(), 0x3412);

        // The ROM went over the data channel
        assert!(rig
            .link
            .frames()
            .iter()
            .any(|(t, f)| *t == Target::Fpga && f[0] == DIO_FILE_TX_DAT && f.len() == 101));
    }

    #[test]
    fn detect_8bit_without_config_string() {
        let mut rig = Rig::new(0xa4);
        rig.link.respond(UIO_GET_STRING, &[0xff]);
        assert_eq!(rig.detect(), CoreType::Generic8Bit);
        assert_eq!(rig.registry.name(), "");
        assert!(rig.fs.opened.is_empty());
        // Reset still pulsed
        assert_eq!(rig.link.frames_for(UIO_SET_STATUS).len(), 2);
        assert_eq!(rig.registry.status(), 0);
    }

    #[test]
    fn oversized_cfg_ignored() {
        let mut rig = Rig::new(0xa4);
        rig.link.respond(UIO_GET_STRING, b"C64\0");
        rig.fs.add("C64     CFG", &[0xff; 5]);
        rig.detect();
        assert_eq!(rig.registry.status(), 0);
    }

    #[test]
    fn file_names() {
        let mut registry = CoreTypeRegistry::new();
        assert_eq!(registry.file_name("CFG"), None);
        registry.name.push_str("ZXSPECTRUM").unwrap();
        assert_eq!(registry.file_name("ROM").as_deref(), Some("ZXSPECTRROM"));
    }

    #[test]
    fn reload_after_mismatch_limit() {
        let mut rig = Rig::new(0xa1);
        rig.detect();
        assert_eq!(rig.registry.poll(&mut rig.link), CoreState::Active);

        rig.link.set_core_id(0x00);
        for i in 1..CORE_MISMATCH_LIMIT {
            assert_eq!(rig.registry.poll(&mut rig.link), CoreState::Mismatch(i));
        }
        assert_eq!(rig.registry.poll(&mut rig.link), CoreState::Reloading);
        assert_eq!(rig.registry.poll(&mut rig.link), CoreState::Reloading);
        rig.link.set_core_id(0xa4);
        assert_eq!(rig.registry.poll(&mut rig.link), CoreState::Restart);
    }

    #[test]
    fn transient_glitch_tolerated() {
        let mut rig = Rig::new(0xa5);
        rig.detect();
        rig.link.queue_core_ids(&[0x00, 0xff]);
        assert_eq!(rig.registry.poll(&mut rig.link), CoreState::Mismatch(1));
        assert_eq!(rig.registry.poll(&mut rig.link), CoreState::Mismatch(2));
        assert_eq!(rig.registry.poll(&mut rig.link), CoreState::Active);
        assert_eq!(rig.registry.poll(&mut rig.link), CoreState::Active);
        // Polls clock an extra byte for the old Minimig core
        assert!(rig.link.idle_clocks() >= 4);
    }
}
