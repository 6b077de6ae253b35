//! Test objects for pico-userio - a recording FPGA link, in-memory storage
//! and a recording host.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use std::collections::VecDeque;

use crate::constants::SECTOR_SIZE;
use crate::host::Host;
use crate::input::buttons::Panel;
use crate::input::{JoyState, KbdLeds};
use crate::link::{CoreLink, Target};
use crate::storage::{FileSystem, ImageFile, Sector, SectorStore, StorageError};

//
// FPGA link
//

/// Records every transaction on the link, and plays back scripted
/// responses.
///
/// The first byte clocked back in a user I/O transaction is the core id.
/// Later bytes come from the response queued (with [`MockLink::respond`])
/// for the command byte that started the transaction, or are 0x00 if none
/// was queued.
pub struct MockLink {
    core_id: u8,
    core_ids: VecDeque<u8>,
    responses: Vec<(u8, VecDeque<u8>)>,
    frames: Vec<(Target, Vec<u8>)>,
    current: Option<(Target, Vec<u8>)>,
    active: Option<VecDeque<u8>>,
    idle_clocks: u32,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            core_id: 0x55,
            core_ids: VecDeque::new(),
            responses: Vec::new(),
            frames: Vec::new(),
            current: None,
            active: None,
            idle_clocks: 0,
        }
    }

    /// Sets the id returned once any queued ids are used up.
    pub fn set_core_id(&mut self, id: u8) {
        self.core_id = id;
    }

    /// Queues ids to be returned by successive core id reads.
    pub fn queue_core_ids(&mut self, ids: &[u8]) {
        self.core_ids.extend(ids);
    }

    /// Queues the bytes returned by the next transaction starting with
    /// `cmd`.
    pub fn respond(&mut self, cmd: u8, data: &[u8]) {
        self.responses.push((cmd, data.iter().copied().collect()));
    }

    pub fn frames(&self) -> Vec<(Target, Vec<u8>)> {
        self.frames.clone()
    }

    pub fn take_frames(&mut self) -> Vec<(Target, Vec<u8>)> {
        std::mem::take(&mut self.frames)
    }

    /// User I/O transactions which started with `cmd`.
    pub fn frames_for(&self, cmd: u8) -> Vec<Vec<u8>> {
        self.frames
            .iter()
            .filter(|(t, f)| *t == Target::Io && f.first() == Some(&cmd))
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn last_frame_for(&self, cmd: u8) -> Option<Vec<u8>> {
        self.frames_for(cmd).pop()
    }

    /// Bytes clocked with no chip select asserted.
    pub fn idle_clocks(&self) -> u32 {
        self.idle_clocks
    }
}

impl CoreLink for MockLink {
    fn select(&mut self, target: Target) {
        assert!(self.current.is_none(), "select while selected");
        self.current = Some((target, Vec::new()));
    }

    fn deselect(&mut self) {
        if let Some(frame) = self.current.take() {
            self.frames.push(frame);
        }
        self.active = None;
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        let Some((target, frame)) = self.current.as_mut() else {
            self.idle_clocks += 1;
            return 0xff;
        };
        frame.push(byte);

        if *target != Target::Io {
            return 0x00;
        }

        if frame.len() == 1 {
            if let Some(pos) = self.responses.iter().position(|(cmd, _)| *cmd == byte) {
                self.active = Some(self.responses.remove(pos).1);
            }
            if byte == 0xff {
                return self.core_ids.pop_front().unwrap_or(self.core_id);
            }
            return self.core_id;
        }

        self.active
            .as_mut()
            .and_then(|r| r.pop_front())
            .unwrap_or(0x00)
    }
}

//
// Storage
//

/// Deterministic sector contents, so tests can check which sector was
/// sent.
fn pattern_byte(lba: u32, offset: usize) -> u8 {
    (lba as u8).wrapping_mul(31) ^ (offset as u8)
}

/// A disk image held in memory.
pub struct MemImage {
    data: Vec<u8>,
    pos: usize,
    indexed: bool,
}

impl MemImage {
    /// Creates an image of `len` bytes, filled with [`MemImage::pattern`].
    pub fn new(len: usize) -> Self {
        let data = (0..len)
            .map(|i| pattern_byte((i / SECTOR_SIZE) as u32, i % SECTOR_SIZE))
            .collect();
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            indexed: false,
        }
    }

    /// The contents of sector `lba` of a new image.
    pub fn pattern(lba: u32) -> Sector {
        let mut sector = [0; SECTOR_SIZE];
        for (i, byte) in sector.iter_mut().enumerate() {
            *byte = pattern_byte(lba, i);
        }
        sector
    }

    /// Whether the image has been indexed by a mount.
    pub fn indexed(&self) -> bool {
        self.indexed
    }
}

impl ImageFile for MemImage {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn build_index(&mut self) -> Result<(), StorageError> {
        self.indexed = true;
        Ok(())
    }

    fn seek(&mut self, lba: u32) -> Result<(), StorageError> {
        self.pos = lba as usize * SECTOR_SIZE;
        Ok(())
    }

    fn read(&mut self, buf: &mut Sector) -> Result<(), StorageError> {
        buf.fill(0);
        let start = self.pos.min(self.data.len());
        let end = (self.pos + SECTOR_SIZE).min(self.data.len());
        buf[..end - start].copy_from_slice(&self.data[start..end]);
        self.pos += SECTOR_SIZE;
        Ok(())
    }

    fn write(&mut self, buf: &Sector) -> Result<(), StorageError> {
        let start = self.pos.min(self.data.len());
        let end = (self.pos + SECTOR_SIZE).min(self.data.len());
        self.data[start..end].copy_from_slice(&buf[..end - start]);
        self.pos += SECTOR_SIZE;
        Ok(())
    }
}

/// A raw medium held in memory.
pub struct MemStore {
    sectors: Vec<Sector>,
    reads: u32,
    writes: u32,
    fail_reads: bool,
    high_capacity: bool,
}

impl MemStore {
    pub fn new(sectors: u32) -> Self {
        Self {
            sectors: (0..sectors).map(MemImage::pattern).collect(),
            reads: 0,
            writes: 0,
            fail_reads: false,
            high_capacity: false,
        }
    }

    pub fn reads(&self) -> u32 {
        self.reads
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }

    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn set_high_capacity(&mut self, high_capacity: bool) {
        self.high_capacity = high_capacity;
    }
}

impl SectorStore for MemStore {
    fn read(&mut self, lba: u32, buf: &mut Sector) -> Result<(), StorageError> {
        if self.fail_reads {
            return Err(StorageError::Io);
        }
        self.reads += 1;
        let sector = self
            .sectors
            .get(lba as usize)
            .ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(sector);
        Ok(())
    }

    fn write(&mut self, lba: u32, buf: &Sector) -> Result<(), StorageError> {
        self.writes += 1;
        let sector = self
            .sectors
            .get_mut(lba as usize)
            .ok_or(StorageError::OutOfBounds)?;
        sector.copy_from_slice(buf);
        Ok(())
    }

    fn sector_count(&mut self) -> u32 {
        self.sectors.len() as u32
    }

    fn is_high_capacity(&self) -> bool {
        self.high_capacity
    }

    fn card_info(&mut self, cid: &mut [u8; 16], csd: &mut [u8; 16]) {
        cid.fill(0x11);
        csd.fill(0x22);
    }
}

/// A filesystem holding a few named files.
#[derive(Default)]
pub struct MockFs {
    files: Vec<(String, Vec<u8>)>,
    pub opened: Vec<String>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, named as in a directory entry (`"NES     ROM"`).
    pub fn add(&mut self, name: &str, data: &[u8]) {
        self.files.push((name.to_string(), data.to_vec()));
    }
}

impl FileSystem for MockFs {
    type File = MemImage;

    fn open(&mut self, name: &str) -> Option<MemImage> {
        self.opened.push(name.to_string());
        self.files
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| MemImage::from_bytes(data.clone()))
    }
}

//
// Host
//

/// Records everything sent to the host, and returns configurable inputs.
#[derive(Default)]
pub struct MockHost {
    pub leds: Vec<(KbdLeds, bool)>,
    pub osd_keys: Vec<u8>,
    pub osd_visible: Vec<bool>,
    pub osd_resets: u32,
    pub errors: Vec<String>,
    pub disk: Vec<bool>,
    pub db9: [JoyState; 2],
    pub panel: Panel,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Host for MockHost {
    fn set_kbd_led(&mut self, leds: KbdLeds, on: bool) {
        self.leds.push((leds, on));
    }

    fn osd_key(&mut self, code: u8) {
        self.osd_keys.push(code);
    }

    fn osd_visible(&mut self, visible: bool) {
        self.osd_visible.push(visible);
    }

    fn osd_reset(&mut self) {
        self.osd_resets += 1;
    }

    fn error_message(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn disk_activity(&mut self, active: bool) {
        self.disk.push(active);
    }

    fn read_db9(&mut self, port: usize) -> JoyState {
        self.db9.get(port).copied().unwrap_or_default()
    }

    fn read_panel(&mut self) -> Panel {
        self.panel
    }
}
