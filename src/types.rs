//! Types shared between the core detection, input and storage modules.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

/// The hardware core currently loaded into the FPGA, as identified by the
/// byte it returns on the user I/O channel.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CoreType {
    /// Any identification byte we don't recognise.  Nothing is dispatched
    /// to the core.
    #[default]
    Unknown = 0x55,

    /// A core without a user interface.
    Dumb = 0xa0,

    /// The original Minimig (Amiga) core.
    MinimigV1 = 0xa1,

    /// A PACE core.  Joysticks only.
    Pace = 0xa2,

    /// The MiST Atari ST core.
    AtariSt = 0xa3,

    /// The generic 8-bit core family, which may carry a config string and
    /// use SD card emulation.
    Generic8Bit = 0xa4,

    /// The Minimig AGA core.
    MinimigV2 = 0xa5,

    /// The Archimedes core.
    Archimedes = 0xa6,
}

impl CoreType {
    /// Converts an identification byte, mapping anything not on the allow
    /// list to [`CoreType::Unknown`].
    pub fn from_id(id: u8) -> Self {
        CoreType::try_from(id).unwrap_or(CoreType::Unknown)
    }

    /// Whether this byte looks like a valid core identification, recognised
    /// or not.  Used to spot when a newly loaded core has come up.
    pub fn is_valid_id(id: u8) -> bool {
        (id & 0xf0) == 0xa0
    }

    /// Whether user I/O traffic (input, storage) is sent to this core.
    pub fn has_user_io(&self) -> bool {
        !matches!(self, CoreType::Unknown | CoreType::Dumb)
    }

    /// Whether this is one of the Minimig variants.
    pub fn is_minimig(&self) -> bool {
        matches!(self, CoreType::MinimigV1 | CoreType::MinimigV2)
    }
}

impl TryFrom<u8> for CoreType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xa0 => Ok(CoreType::Dumb),
            0xa1 => Ok(CoreType::MinimigV1),
            0xa2 => Ok(CoreType::Pace),
            0xa3 => Ok(CoreType::AtariSt),
            0xa4 => Ok(CoreType::Generic8Bit),
            0xa5 => Ok(CoreType::MinimigV2),
            0xa6 => Ok(CoreType::Archimedes),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list() {
        assert_eq!(CoreType::from_id(0xa4), CoreType::Generic8Bit);
        assert_eq!(CoreType::from_id(0xa1), CoreType::MinimigV1);
        assert_eq!(CoreType::from_id(0xa7), CoreType::Unknown);
        assert_eq!(CoreType::from_id(0xff), CoreType::Unknown);
        assert!(CoreType::try_from(0x00).is_err());
    }

    #[test]
    fn valid_ids() {
        assert!(CoreType::is_valid_id(0xa7));
        assert!(!CoreType::is_valid_id(0xff));
        assert!(!CoreType::Dumb.has_user_io());
        assert!(CoreType::Pace.has_user_io());
    }
}
