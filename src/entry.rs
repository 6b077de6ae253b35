//! Start of day.  Sets up the peripherals, builds the dispatcher and spawns
//! the tasks.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use core::cell::RefCell;
#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_embedded_hal::shared_bus::blocking::spi::SpiDevice;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel, Config as AdcConfig};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output, Pin, Pull};
use embassy_rp::peripherals::UART0;
use embassy_rp::spi::{Config as SpiConfig, Spi};
use embassy_rp::uart::{Config as UartConfig, InterruptHandler as UartInterruptHandler, Uart};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Delay;
use embedded_sdmmc::{SdCard, VolumeManager};
use static_cell::StaticCell;

use crate::config::Config;
use crate::constants::{
    HID_BRIDGE_BAUD, LINK_SPI_FREQUENCY, NUM_DB9_PORTS, SD_INIT_FREQUENCY, SD_SPI_FREQUENCY,
};
use crate::dispatch::Dispatcher;
use crate::hw::bridge::hid_bridge_task;
use crate::hw::host::{FirmwareHost, PanelInput};
use crate::hw::io::{create_dispatcher, io_task};
use crate::hw::link::SpiLink;
use crate::hw::sdcard::{FixedClock, SdBus, SdCardDriver, SdFs, SdStore, SharedCard, Volumes};
use crate::infra::display::{StatusDisplay, status_task};
use crate::infra::gpio::{DB9_LINES, Gpio};
use crate::infra::watchdog::{create_watchdog, reboot_normal, watchdog_task};
use crate::input::buttons::{CH_MENU, CH_SWITCH1, CH_USER};
use crate::util::built::log_fw_info;

//
// Statics
//

// The SD card's SPI bus, shared with the card driver via a SpiDevice.
static SD_SPI_BUS: StaticCell<SdBus> = StaticCell::new();

// The SD card driver, shared by the raw store and the FAT volume manager.
static SD_CARD: StaticCell<SdCardDriver> = StaticCell::new();

static VOLUMES: StaticCell<Volumes> = StaticCell::new();

bind_interrupts!(struct Irqs {
    UART0_IRQ => UartInterruptHandler<UART0>;
});

/// Called by the binary's main().
pub async fn common_main(spawner: Spawner, bin_name: &str) -> ! {
    let p = embassy_rp::init(Default::default());

    log_fw_info(bin_name);

    // Start the watchdog first, so a hang during setup resets us.
    let watchdog = create_watchdog(p.WATCHDOG);
    spawn_or_reboot(spawner.spawn(watchdog_task(watchdog)), "Watchdog");

    // Take the plain GPIOs.
    let mut gpio = Gpio::new(
        [
            p.PIN_2.degrade(),
            p.PIN_3.degrade(),
            p.PIN_4.degrade(),
            p.PIN_5.degrade(),
            p.PIN_6.degrade(),
            p.PIN_7.degrade(),
            p.PIN_8.degrade(),
            p.PIN_9.degrade(),
            p.PIN_14.degrade(),
            p.PIN_15.degrade(),
            p.PIN_17.degrade(),
            p.PIN_20.degrade(),
            p.PIN_21.degrade(),
            p.PIN_25.degrade(),
        ],
        None,
    );
    let pins = gpio.config().clone();

    // The status LED blinks until a core is detected.
    StatusDisplay::create_static(gpio.take_output(pins.status_display_pin, Level::Low));
    spawn_or_reboot(spawner.spawn(status_task(watchdog)), "Status display");

    // FPGA link.
    let mut link_config = SpiConfig::default();
    link_config.frequency = LINK_SPI_FREQUENCY;
    let link_bus = Spi::new_blocking(p.SPI0, p.PIN_18, p.PIN_19, p.PIN_16, link_config);
    let link = SpiLink::new(
        link_bus,
        gpio.take_output(pins.link_cs.io, Level::High),
        gpio.take_output(pins.link_cs.fpga, Level::High),
        gpio.take_output(pins.link_cs.osd, Level::High),
    );

    // SD card.  It must be initialised at a low clock, after which it can
    // be sped up.
    let mut sd_config = SpiConfig::default();
    sd_config.frequency = SD_INIT_FREQUENCY;
    let sd_bus = Spi::new_blocking(p.SPI1, p.PIN_10, p.PIN_11, p.PIN_12, sd_config);
    let sd_bus: &'static SdBus = SD_SPI_BUS.init(Mutex::new(RefCell::new(sd_bus)));
    let sd_device = SpiDevice::new(sd_bus, Output::new(p.PIN_13, Level::High));
    let card: &'static SdCardDriver = SD_CARD.init(SdCard::new(sd_device, Delay));
    let store = SdStore::new(SharedCard(card));
    sd_bus.lock(|bus| bus.borrow_mut().set_frequency(SD_SPI_FREQUENCY));
    let volumes: &'static Volumes = VOLUMES.init(VolumeManager::new(SharedCard(card), FixedClock));
    let fs = SdFs::new(volumes);

    // HID bridge UART.
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = HID_BRIDGE_BAUD;
    let uart = Uart::new(
        p.UART0,
        p.PIN_0,
        p.PIN_1,
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let (bridge_tx, bridge_rx) = uart.split();

    // DB9 ports, active low.
    let db9: [[_; DB9_LINES]; NUM_DB9_PORTS] = pins
        .db9
        .map(|port| port.map(|pin| gpio.take_input(pin, Pull::Up)));

    // Panel buttons.
    let adc = Adc::new_blocking(p.ADC, AdcConfig::default());
    let panel_inputs = [
        PanelInput {
            channel: Channel::new_pin(p.PIN_26, Pull::None),
            panel_channel: CH_MENU,
        },
        PanelInput {
            channel: Channel::new_pin(p.PIN_27, Pull::None),
            panel_channel: CH_USER,
        },
        PanelInput {
            channel: Channel::new_pin(p.PIN_28, Pull::None),
            panel_channel: CH_SWITCH1,
        },
    ];
    let host = FirmwareHost::new(bridge_tx, db9, adc, panel_inputs);

    // The configuration file is parsed off-device, so the defaults apply.
    let dispatcher = create_dispatcher(Dispatcher::new(link, store, fs, host, Config::default()));

    spawn_or_reboot(spawner.spawn(io_task(watchdog, dispatcher)), "I/O");
    spawn_or_reboot(spawner.spawn(hid_bridge_task(watchdog, bridge_rx)), "HID bridge");

    info!("Startup complete");
    core::future::pending().await
}

/// Method to spawn tasks.
///
/// Using the Spawner object to spawn can fail, because too many instances of
/// that task are already running.  We handle that by rebooting - but it
/// shouldn't happen as tasks are only spawned at start of day.
///
/// Example:
/// ```ignore
/// spawn_or_reboot(spawner.spawn(my_task()), "my_task");
/// ```
pub fn spawn_or_reboot<T, E: defmt::Format>(spawn_result: Result<T, E>, task_name: &str) {
    match spawn_result {
        Ok(_) => debug!("Spawned task {}", task_name),
        Err(e) => {
            error!("Failed to spawn task: {}, error: {}", task_name, e);
            reboot_normal();
        }
    }
}

/// Logs the panic and reboots.
pub fn panic_handler(info: &core::panic::PanicInfo) -> ! {
    error!("Panic: {}", defmt::Display2Format(info));
    reboot_normal()
}

/// Handles defmt::panic!() and friends.
pub fn defmt_panic_handler() -> ! {
    error!("defmt panic");
    reboot_normal()
}
