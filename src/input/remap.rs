//! User configured key remapping, applied to USB usages before anything
//! else looks at them.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use heapless::Vec;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::HidReport;
use crate::constants::MAX_REMAP;

/// Why a remap entry was rejected.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapError {
    /// Not of the form `xx,yy`.
    Malformed,

    /// Usage 0 can't be remapped.
    NoKey,

    /// The table already holds [`MAX_REMAP`] entries.
    Full,
}

/// Up to [`MAX_REMAP`] (from, to) USB usage pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    entries: Vec<(u8, u8), MAX_REMAP>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds an entry.  If `from` is already remapped the first entry wins.
    pub fn add(&mut self, from: u8, to: u8) -> Result<(), RemapError> {
        if from == 0 {
            return Err(RemapError::NoKey);
        }
        self.entries
            .push((from, to))
            .map_err(|_| RemapError::Full)
    }

    /// Parses and adds an entry of two comma separated hex bytes, such as
    /// `"39,e0"`.
    pub fn add_str(&mut self, entry: &str) -> Result<(), RemapError> {
        let entry = entry.trim();
        let (from, to) = entry.split_once(',').ok_or(RemapError::Malformed)?;
        if from.len() != 2 || to.len() != 2 {
            return Err(RemapError::Malformed);
        }
        let from = u8::from_str_radix(from, 16).map_err(|_| RemapError::Malformed)?;
        let to = u8::from_str_radix(to, 16).map_err(|_| RemapError::Malformed)?;
        self.add(from, to)?;
        debug!("Key remap entry {} = 0x{:02x},0x{:02x}", self.len() - 1, from, to);
        Ok(())
    }

    /// Remaps a single usage.
    pub fn map(&self, key: u8) -> u8 {
        self.entries
            .iter()
            .find(|(from, _)| *from == key)
            .map_or(key, |(_, to)| *to)
    }

    /// Remaps every key in a report.  Modifiers are left alone.
    pub fn apply(&self, report: &mut HidReport) {
        if self.entries.is_empty() {
            return;
        }
        for key in report.keys.iter_mut().filter(|k| **k != 0) {
            *key = self.map(*key);
        }
    }
}
