// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use defmt_rtt as _;
#[cfg(target_os = "none")]
use pico_userio_rs::{defmt_panic_handler, panic_handler};

#[cfg(target_os = "none")]
#[embassy_executor::main]
async fn main(spawner: embassy_executor::Spawner) -> ! {
    pico_userio_rs::common_main(spawner, env!("CARGO_BIN_NAME")).await
}

// The firmware only runs on the Pico.
#[cfg(not(target_os = "none"))]
fn main() {}

// Custom defmt panic handler
#[cfg(target_os = "none")]
#[defmt::panic_handler]
fn defmt_panic() -> ! {
    defmt_panic_handler()
}

// Custom core panic handler
#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    panic_handler(info)
}
