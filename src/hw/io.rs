//! The I/O task, which runs the dispatcher.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_rp::gpio::Output;
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{Blocking, Spi};
use embassy_time::{Instant, Timer};
use static_cell::StaticCell;

use super::bridge::HID_CHANNEL;
use super::host::FirmwareHost;
use super::link::SpiLink;
use super::sdcard::{SdFs, SdStore};
use crate::constants::{IO_LOOP_TIMER, IO_WATCHDOG_TIMER, LOOP_LOG_INTERVAL};
use crate::dispatch::{Dispatcher, LoopState};
use crate::infra::display::{DisplayType, update_status};
use crate::infra::watchdog::{TaskId, WatchdogType, reboot_normal};

pub type FirmwareLink = SpiLink<Spi<'static, SPI0, Blocking>, Output<'static>>;
pub type FirmwareDispatcher = Dispatcher<FirmwareLink, SdStore, SdFs, FirmwareHost>;

// The dispatcher is large, so it lives here rather than in the task's
// arguments.
static DISPATCHER: StaticCell<FirmwareDispatcher> = StaticCell::new();

/// Stores the dispatcher, ready to be handed to [`io_task`].
pub fn create_dispatcher(dispatcher: FirmwareDispatcher) -> &'static mut FirmwareDispatcher {
    DISPATCHER.init(dispatcher)
}

#[embassy_executor::task]
pub async fn io_task(
    watchdog: &'static WatchdogType,
    dispatcher: &'static mut FirmwareDispatcher,
) -> ! {
    let id = TaskId::IoLoop;
    watchdog.register_task(&id, IO_WATCHDOG_TIMER).await;

    let core = dispatcher.start();
    info!("Core {} detected", core);
    update_status(DisplayType::Ready);

    let mut last_state = LoopState::Running;
    let mut next_log_instant = Instant::now();
    loop {
        let now = Instant::now();
        if now >= next_log_instant {
            trace!("I/O loop, core {} state {}", dispatcher.core(), last_state);
            next_log_instant += LOOP_LOG_INTERVAL;
        }

        watchdog.feed(&id).await;

        while let Ok(input) = HID_CHANNEL.try_receive() {
            dispatcher.handle_hid(input, now);
        }

        let state = dispatcher.poll(now);
        if state != last_state {
            debug!("I/O loop state {} -> {}", last_state, state);
            match state {
                LoopState::Restart => reboot_normal(),
                LoopState::Reloading => update_status(DisplayType::Detecting),
                LoopState::Running | LoopState::Idle => update_status(DisplayType::Ready),
            }
            last_state = state;
        }

        Timer::after(IO_LOOP_TIMER).await;
    }
}
