//! Contains a multi-task capable watchdog, that ensures all of the
//! long-running tasks are still running, and resets the device if not.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_rp::peripherals::WATCHDOG as p_WATCHDOG;
use static_cell::StaticCell;
use task_watchdog::embassy_rp::{WatchdogRunner, watchdog_run};
use task_watchdog::{Id, WatchdogConfig};

use crate::constants::{WATCHDOG_CHECK_INTERVAL, WATCHDOG_HW_TIMEOUT};

pub type WatchdogType = WatchdogRunner<TaskId, NUM_TASK_IDS>;

// Holds the watchdog, so every task can be given a 'static reference to it.
static WATCHDOG: StaticCell<WatchdogType> = StaticCell::new();

/// The tasks which are policed by the watchdog.
#[derive(Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum TaskId {
    /// The I/O loop, which owns the dispatcher.
    IoLoop = 0,

    /// The status LED.
    Display,

    /// The HID bridge UART receiver.
    HidBridge,

    /// The is the number of tasks which are policed by the watchdog.
    Num,
}
impl Id for TaskId {}
const NUM_TASK_IDS: usize = TaskId::Num as usize;

/// Creates the watchdog.  It doesn't start until [`watchdog_task`] runs.
pub fn create_watchdog(p_watchdog: p_WATCHDOG) -> &'static WatchdogType {
    let config = WatchdogConfig {
        hardware_timeout: WATCHDOG_HW_TIMEOUT,
        check_interval: WATCHDOG_CHECK_INTERVAL,
    };
    WATCHDOG.init(WatchdogRunner::new(p_watchdog, config))
}

/// A task to run the watchdog.
#[embassy_executor::task]
pub async fn watchdog_task(watchdog: &'static WatchdogType) -> ! {
    watchdog_run(watchdog.create_task()).await
}

/// Performs a normal reboot (as opposed to entering BOOTSEL mode).  Used
/// when a new core has been loaded, as all of the session state has to be
/// rebuilt.
pub fn reboot_normal() -> ! {
    info!("Rebooting");
    cortex_m::peripheral::SCB::sys_reset()
}
