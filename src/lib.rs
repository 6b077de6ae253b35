//! pico-userio
//!
//! This implements the I/O controller that sits alongside an FPGA running a
//! retro-computer "core" (Minimig, Atari ST, Archimedes, generic 8-bit and
//! others).  It:
//! - detects which core is loaded,
//! - translates USB keyboard, mouse and joystick input, along with the
//!   physical DB9 joystick ports, into what the active core expects, and
//! - emulates an SD card for the core, backed either by the physical card or
//!   by a mounted disk image.
//!
//! The input translation and storage emulation logic is portable, and is
//! unit tested on the host.  The firmware glue (SPI link, SD card, GPIO, ADC,
//! watchdog, status LED and USB host bridge UART) is only built for the Pico.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#![cfg_attr(target_os = "none", no_std)]

// Provide some feature guidance when compiling the firmware.
#[cfg(all(target_os = "none", not(any(feature = "pico", feature = "pico2"))))]
compile_error!("Either 'pico' or 'pico2' feature must be enabled");
#[cfg(all(feature = "pico", feature = "pico2"))]
compile_error!("Features 'pico' and 'pico2' cannot be enabled simultaneously");

// This must come first, so the logging macros are visible to all of the
// other modules.
mod fmt;

// Portable modules.
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod host;
pub mod input;
pub mod link;
pub mod registry;
pub mod storage;
pub mod types;

#[cfg(test)]
mod test;

// Firmware only modules.
#[cfg(target_os = "none")]
pub mod entry;
#[cfg(target_os = "none")]
mod hw;
#[cfg(target_os = "none")]
mod infra;
#[cfg(target_os = "none")]
mod util;

#[cfg(target_os = "none")]
pub use entry::{common_main, defmt_panic_handler, panic_handler};

// Extra binary information that picotool can read.
#[cfg(target_os = "none")]
#[unsafe(link_section = ".bi_entries")]
#[used]
pub static PICOTOOL_ENTRIES: [embassy_rp::binary_info::EntryAddr; 4] = [
    embassy_rp::binary_info::rp_program_name!(c"pico-userio by piers.rocks"),
    embassy_rp::binary_info::rp_program_description!(c"An I/O controller for FPGA retro-computer cores, translating USB input and emulating the core's SD card."),
    embassy_rp::binary_info::rp_cargo_version!(),
    embassy_rp::binary_info::rp_program_build_attribute!(),
];

// A note about state ownership
//
// All of the state that the I/O loop works on (the active core, the pressed
// key set, the emulation state, the sector cache, and so on) is held in
// fields of objects constructed once at startup and owned by the
// [`dispatch::Dispatcher`].  The dispatcher is in turn owned by the I/O task,
// so there is a single writer for all of it and no locking is needed.
//
// Statics are only used for the firmware glue, where embassy tasks need
// 'static references - the watchdog, the status display, the shared SPI bus
// and the channels between the HID bridge and the I/O task.  Those follow
// the usual rules:
//
// - Use StaticCell for statics that cannot be initialized at compile time.
//
// - Use ConstStaticCell for statics that can be initialized at compile time.
//
// - If you need mutable access, you need to use a Mutex.  If you are using a
//   embassy_sync::mutex::Mutex (which is async) you do not need a RefCell for
//   interior mutability.  If you use a blocking_mutex::Mutex you do.
//   Generally use CriticalSectionRawMutex.
