//! The firmware's hardware glue, implementing the traits the portable
//! modules are written against.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub mod bridge;
pub mod host;
pub mod io;
pub mod link;
pub mod sdcard;
