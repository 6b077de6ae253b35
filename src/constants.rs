//! This module contains constants for pico-userio.
//!
//! Timers are all expressed as embassy-time Durations.  The portable logic
//! compares them against Instants passed in by the I/O task, so none of it
//! ever reads the clock itself.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use embassy_time::Duration;
use static_assertions::const_assert;

//
// Watchdog timers
//

/// Watchdog timer - the watchdog resets the system if it isn't feed at
/// least this frequently.  The watchdog task can't run while the I/O loop is
/// stalled on the SD card, so this must exceed [`IO_WATCHDOG_TIMER`].
pub const WATCHDOG_HW_TIMEOUT: Duration = Duration::from_secs(4);

/// How often the watchdog checks that all of its tasks have been fed.
pub const WATCHDOG_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// How often the I/O task must feed the watchdog to prevent a reset.  This
/// has to allow for an uncached sector load from a slow SD card, which
/// stalls the I/O loop.
pub const IO_WATCHDOG_TIMER: Duration = Duration::from_secs(2);

/// How often the status display must feed the watchdog to prevent a reset.
pub const STATUS_DISPLAY_WATCHDOG_TIMER: Duration = Duration::from_secs(1);

/// How often the HID bridge task must feed the watchdog to prevent a reset.
pub const HID_BRIDGE_WATCHDOG_TIMER: Duration = Duration::from_secs(1);

//
// Task main runner and related timers.
//

// Timer for the StatusDisplay spend on and off when blinking.
pub const STATUS_DISPLAY_BLINK_TIMER: Duration = Duration::from_millis(100);

// Timer for the StatusDisplay to pause between doing work.
pub const STATUS_DISPLAY_TIMER: Duration = Duration::from_millis(50);

// How often we aim to log from our primary loops to prove they are still
// alive.
pub const LOOP_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// How often the I/O loop pauses so other tasks can run.
pub const IO_LOOP_TIMER: Duration = Duration::from_micros(100);

/// Longest the HID bridge task waits for UART data before feeding the
/// watchdog.
pub const HID_BRIDGE_READ_TIMEOUT: Duration = Duration::from_millis(250);

//
// I/O loop software timers
//

/// Minimum gap between two codes on a serial keyboard link.
pub const KBD_RATE_INTERVAL: Duration = Duration::from_millis(10);

/// Minimum gap between two bytes on the Atari ST's IKBD link (7812.5 baud).
pub const IKBD_RATE_INTERVAL: Duration = Duration::from_millis(2);

/// How often keyboard driven mouse emulation moves the pointer.
pub const EMU_MOUSE_INTERVAL: Duration = Duration::from_millis(5);

/// How often accumulated mouse movement is sent to cores which take it at a
/// limited rate (50Hz).
pub const MOUSE_INTERVAL: Duration = Duration::from_millis(20);

/// How often the core is asked which keyboard LEDs it wants lit.
pub const KBD_LED_INTERVAL: Duration = Duration::from_millis(100);

/// How often the ADC buttons and switches are sampled.
pub const ADC_INTERVAL: Duration = Duration::from_millis(25);

/// How long the menu button must be held to toggle the scandoubler.
pub const MENU_LONG_PRESS: Duration = Duration::from_secs(1);

//
// Core detection
//

/// Number of consecutive polls with an unexpected core ID before we decide
/// the core is being reloaded.
pub const CORE_MISMATCH_LIMIT: u8 = 255;

/// Maximum length of a core name, taken from the core's config string.
pub const MAX_CORE_NAME_LEN: usize = 16;

/// Maximum length of a single config string item.
pub const MAX_CONFIG_ITEM_LEN: usize = 128;

/// Length of an 8.3 file name without the dot, as built from the core name.
pub const CONFIG_FILE_NAME_LEN: usize = 11;

/// Maximum size of the CFG file holding a core's saved status word.
pub const MAX_CONFIG_FILE_LEN: u64 = 4;

//
// Input handling
//

/// Number of simultaneous keys in a USB HID boot keyboard report.
pub const HID_MAX_KEYS: usize = 6;

/// Highest USB key usage that the scancode tables cover.
pub const KEYCODE_MAX: u8 = 0x73;

/// Number of key remap entries supported.
pub const MAX_REMAP: usize = 16;

/// Number of codes the keyboard rate limiter queue holds.
pub const KBD_QUEUE_SIZE: usize = 16;
const_assert!(KBD_QUEUE_SIZE.is_power_of_two());

/// Maximum number of events a single HID report can produce.  6 breaks, 6
/// makes, 8 modifier edges, plus OSD, LED and emulation notifications.
pub const MAX_EVENTS: usize = 48;
const_assert!(MAX_EVENTS >= 2 * HID_MAX_KEYS + 8);

/// Joystick slots supported by the cores.
pub const MAX_JOYSTICKS: u8 = 6;

/// Physical DB9 joystick ports.
pub const NUM_DB9_PORTS: usize = 2;

//
// Storage emulation
//

/// Size of a sector, as exchanged with the core.
pub const SECTOR_SIZE: usize = 512;
const_assert!(SECTOR_SIZE.is_power_of_two());

/// Shift to convert between bytes and sectors.
pub const SECTOR_SHIFT: u32 = 9;
const_assert!((1usize << SECTOR_SHIFT) == SECTOR_SIZE);

/// Number of drive slots a disk image can be mounted into.
pub const NUM_DRIVE_SLOTS: usize = 2;

/// Size of the SD card config block sent to the core - CID, CSD and a flags
/// byte.
pub const SD_CONFIG_LEN: usize = 33;

//
// HID bridge
//

/// Largest payload in a HID bridge frame.
pub const HID_BRIDGE_MAX_PAYLOAD: usize = 16;

/// Number of HID events buffered between the bridge task and the I/O task.
pub const HID_CHANNEL_SIZE: usize = 16;

/// HID bridge UART baud rate.
pub const HID_BRIDGE_BAUD: u32 = 115_200;

//
// Firmware peripherals
//

/// SPI clock for the FPGA link.
pub const LINK_SPI_FREQUENCY: u32 = 16_000_000;

/// SPI clock while the SD card is initialised.  Cards only guarantee to
/// respond at up to 400kHz until then.
pub const SD_INIT_FREQUENCY: u32 = 400_000;

/// SPI clock once the SD card is initialised.
pub const SD_SPI_FREQUENCY: u32 = 16_000_000;

/// Number of GPIOs on the RP2040 and RP2350A.
pub const NUM_GPIO_PINS: usize = 30;
