//! The HID bridge UART receiver.
//!
//! The USB host co-processor sends HID events as framed bytes.  This task
//! decodes them and passes them to the I/O task over [`HID_CHANNEL`].  The
//! LED frames going the other way are written by the I/O task's host
//! object, which owns the UART's TX half.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{Async, UartRx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Instant, with_timeout};
use portable_atomic::{AtomicU32, Ordering};

use crate::constants::{
    HID_BRIDGE_READ_TIMEOUT, HID_BRIDGE_WATCHDOG_TIMER, HID_CHANNEL_SIZE, LOOP_LOG_INTERVAL,
};
use crate::infra::watchdog::{TaskId, WatchdogType};
use crate::input::bridge::{BridgeDecoder, HidInput};

/// Decoded HID events, waiting for the I/O task.
pub static HID_CHANNEL: Channel<CriticalSectionRawMutex, HidInput, HID_CHANNEL_SIZE> =
    Channel::new();

// Events dropped because the I/O task fell behind.
static DROPPED: AtomicU32 = AtomicU32::new(0);

#[embassy_executor::task]
pub async fn hid_bridge_task(
    watchdog: &'static WatchdogType,
    mut rx: UartRx<'static, UART0, Async>,
) -> ! {
    let id = TaskId::HidBridge;
    watchdog.register_task(&id, HID_BRIDGE_WATCHDOG_TIMER).await;

    let mut decoder = BridgeDecoder::new();
    let mut next_log_instant = Instant::now();
    loop {
        if Instant::now() >= next_log_instant {
            trace!("HID bridge loop, {} dropped", DROPPED.load(Ordering::Relaxed));
            next_log_instant += LOOP_LOG_INTERVAL;
        }

        watchdog.feed(&id).await;

        // Time out regularly, so we keep feeding the watchdog while the
        // bridge is quiet.
        let mut byte = [0u8; 1];
        match with_timeout(HID_BRIDGE_READ_TIMEOUT, rx.read(&mut byte)).await {
            Ok(Ok(())) => {
                if let Some(input) = decoder.push(byte[0]) {
                    if HID_CHANNEL.try_send(input).is_err() {
                        DROPPED.fetch_add(1, Ordering::Relaxed);
                        debug!("HID channel full - input dropped");
                    }
                }
            }
            Ok(Err(e)) => debug!("HID bridge UART error {}", e),
            Err(_) => (),
        }
    }
}
