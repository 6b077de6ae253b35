//! Infrastructure modules for pico-userio - the watchdog, the status LED
//! and pin allocation.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub(crate) mod display;
pub(crate) mod gpio;
pub(crate) mod watchdog;
