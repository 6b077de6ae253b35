//! Run-time user settings.
//!
//! The settings are read from the `[mist]` section of the ini file on the
//! SD card by an external parser, which calls [`Config::apply`] for each
//! key/value pair.  Anything not set keeps its default.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::input::remap::{RemapError, RemapTable};

/// Why a setting was rejected.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The key isn't a setting we know.
    UnknownKey,

    /// The value couldn't be parsed for this key.
    InvalidValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Keep the physical mouse port as joystick 0 when USB joysticks are
    /// attached.
    pub joystick0_prefer_db9: bool,

    /// The Menu key acts as right GUI rather than opening the OSD.
    pub key_menu_as_rgui: bool,

    /// Which keyboard reset combination to use, 0 to 2.
    pub reset_combo: u8,

    pub scandoubler_disable: bool,
    pub ypbpr: bool,

    pub key_remap: RemapTable,
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue),
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a single setting.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key.trim() {
            "joystick0_prefer_db9" => self.joystick0_prefer_db9 = parse_bool(value)?,
            "key_menu_as_rgui" => self.key_menu_as_rgui = parse_bool(value)?,
            "scandoubler_disable" => self.scandoubler_disable = parse_bool(value)?,
            "ypbpr" => self.ypbpr = parse_bool(value)?,
            "reset_combo" => {
                let combo: u8 = value.trim().parse().map_err(|_| ConfigError::InvalidValue)?;
                if combo > 2 {
                    return Err(ConfigError::InvalidValue);
                }
                self.reset_combo = combo;
            }
            "key_remap" => match self.key_remap.add_str(value) {
                Ok(()) => (),
                Err(RemapError::Full) => warn!("Key remap table full - ignoring entry"),
                Err(_) => return Err(ConfigError::InvalidValue),
            },
            _ => return Err(ConfigError::UnknownKey),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_REMAP;

    #[test]
    fn defaults() {
        let config = Config::new();
        assert!(!config.joystick0_prefer_db9);
        assert_eq!(config.reset_combo, 0);
        assert!(config.key_remap.is_empty());
    }

    #[test]
    fn booleans() {
        let mut config = Config::new();
        config.apply("joystick0_prefer_db9", "1").unwrap();
        config.apply("ypbpr", " true ").unwrap();
        config.apply("scandoubler_disable", "0").unwrap();
        assert!(config.joystick0_prefer_db9);
        assert!(config.ypbpr);
        assert!(!config.scandoubler_disable);
        assert_eq!(config.apply("ypbpr", "maybe"), Err(ConfigError::InvalidValue));
    }

    #[test]
    fn reset_combo_range() {
        let mut config = Config::new();
        config.apply("reset_combo", "2").unwrap();
        assert_eq!(config.reset_combo, 2);
        assert_eq!(config.apply("reset_combo", "3"), Err(ConfigError::InvalidValue));
        assert_eq!(config.reset_combo, 2);
    }

    #[test]
    fn seventeenth_remap_ignored() {
        let mut config = Config::new();
        config.apply("key_remap", "2a,4c").unwrap();
        assert_eq!(config.key_remap.map(0x2a), 0x4c);
        for _ in 1..MAX_REMAP {
            config.apply("key_remap", "04,05").unwrap();
        }
        assert_eq!(config.key_remap.len(), MAX_REMAP);
        assert_eq!(config.apply("key_remap", "06,07"), Ok(()));
        assert_eq!(config.key_remap.len(), MAX_REMAP);
        assert_eq!(config.key_remap.map(0x06), 0x06);
    }

    #[test]
    fn unknown_key() {
        let mut config = Config::new();
        assert_eq!(config.apply("video_mode", "1"), Err(ConfigError::UnknownKey));
        assert_eq!(config.apply("key_remap", "zz"), Err(ConfigError::InvalidValue));
    }
}
