//! Handles displaying status of the device on the LED.
//!
//! - Blinking: detecting the core, or waiting for a new one to load.
//! - Off: a core is running.
//! - On: the SD card is being accessed.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use core::cell::RefCell;
#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_rp::gpio::Output;
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embassy_time::{Duration, Instant, Timer};

use super::watchdog::{TaskId, WatchdogType};
use crate::constants::{
    STATUS_DISPLAY_BLINK_TIMER, STATUS_DISPLAY_TIMER, STATUS_DISPLAY_WATCHDOG_TIMER,
};

// Shared between the status task and anything updating the status, hence
// the Mutex, and the RefCell for mutability.
static STATUS_DISPLAY: Mutex<CriticalSectionRawMutex, RefCell<Option<StatusDisplay>>> =
    Mutex::new(RefCell::new(None));

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum DisplayType {
    /// Looking for a core - blinking.
    Detecting,

    /// A core is running - off.
    Ready,

    /// SD card access in progress - on.
    Disk,
}

pub struct StatusDisplay {
    led: Output<'static>,
    status: DisplayType,
    last_toggle: Instant,
    led_on: bool,
}

impl StatusDisplay {
    /// Creates the status display, initially blinking, and stores it for
    /// [`status_task`] to drive.
    pub fn create_static(led: Output<'static>) {
        let display = Self {
            led,
            status: DisplayType::Detecting,
            last_toggle: Instant::now(),
            led_on: true,
        };
        STATUS_DISPLAY.lock(|d| *d.borrow_mut() = Some(display));
    }

    fn update(&mut self, status: DisplayType) {
        if self.status == status {
            return;
        }
        self.status = status;
        match status {
            DisplayType::Ready => self.set(false),
            DisplayType::Disk => self.set(true),
            DisplayType::Detecting => (),
        }
    }

    // Returns how long until the LED next needs changing.
    fn do_work(&mut self) -> Duration {
        if self.status != DisplayType::Detecting {
            return STATUS_DISPLAY_BLINK_TIMER;
        }

        let elapsed = Instant::now().duration_since(self.last_toggle);
        if elapsed >= STATUS_DISPLAY_BLINK_TIMER {
            self.set(!self.led_on);
            STATUS_DISPLAY_BLINK_TIMER
        } else {
            STATUS_DISPLAY_BLINK_TIMER - elapsed
        }
    }

    fn set(&mut self, on: bool) {
        if on {
            self.led.set_high();
        } else {
            self.led.set_low();
        }
        self.led_on = on;
        self.last_toggle = Instant::now();
    }
}

/// Drives the status LED.
#[embassy_executor::task]
pub async fn status_task(watchdog: &'static WatchdogType) -> ! {
    let id = TaskId::Display;
    watchdog.register_task(&id, STATUS_DISPLAY_WATCHDOG_TIMER).await;

    loop {
        watchdog.feed(&id).await;

        let next_update = STATUS_DISPLAY
            .lock(|d| d.borrow_mut().as_mut().map(StatusDisplay::do_work))
            .unwrap_or(STATUS_DISPLAY_TIMER);

        Timer::after(Duration::min(next_update, STATUS_DISPLAY_TIMER)).await;
    }
}

/// Changes what the status LED shows.
pub fn update_status(status: DisplayType) {
    STATUS_DISPLAY.lock(|d| {
        if let Some(display) = d.borrow_mut().as_mut() {
            display.update(status);
        }
    });
}
