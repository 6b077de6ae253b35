//! Command bytes understood by the core's user I/O and data I/O channels.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

//
// User I/O channel
//

pub const UIO_STATUS: u8 = 0x00;
pub const UIO_BUT_SW: u8 = 0x01;
pub const UIO_JOYSTICK0: u8 = 0x02;
pub const UIO_JOYSTICK1: u8 = 0x03;
pub const UIO_MOUSE: u8 = 0x04;
pub const UIO_KEYBOARD: u8 = 0x05;
pub const UIO_KBD_OSD: u8 = 0x06;

/// The Atari ST core takes IKBD bytes on the joystick 0 command.
pub const UIO_IKBD_OUT: u8 = UIO_JOYSTICK0;

pub const UIO_JOYSTICK2: u8 = 0x10;
pub const UIO_GET_STRING: u8 = 0x14;
pub const UIO_SET_STATUS: u8 = 0x15;
pub const UIO_GET_SDSTAT: u8 = 0x16;
pub const UIO_SECTOR_RD: u8 = 0x17;
pub const UIO_SECTOR_WR: u8 = 0x18;
pub const UIO_SET_SDCONF: u8 = 0x19;
pub const UIO_ASTICK: u8 = 0x1a;
pub const UIO_SET_SDSTAT: u8 = 0x1c;
pub const UIO_SET_SDINFO: u8 = 0x1d;
pub const UIO_SET_STATUS2: u8 = 0x1e;
pub const UIO_GET_KBD_LED: u8 = 0x1f;
pub const UIO_JOYSTICK0_EXT: u8 = 0x60;

//
// Data I/O channel
//

pub const DIO_FILE_TX: u8 = 0x53;
pub const DIO_FILE_TX_DAT: u8 = 0x54;
pub const DIO_FILE_INDEX: u8 = 0x55;
pub const DIO_FILE_INFO: u8 = 0x56;

//
// Values carried by the commands
//

/// Reset bit in the 8-bit core's status word.
pub const UIO_STATUS_RESET: u32 = 0x01;

/// First byte of a config string reply from a core without one.
pub const CONFIG_STRING_NONE: u8 = 0xff;

/// The Atari 800 core replies to a config string request with its status
/// byte.
pub const CONFIG_STRING_A800: u8 = 0xa4;

/// Config string item separator.
pub const CONFIG_STRING_SEPARATOR: u8 = b';';
