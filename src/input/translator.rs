//! The keyboard state machine.
//!
//! Each accepted HID report is diffed against the previous one, and the
//! differences become make and break [`Event`]s in the active core's code
//! space.  The route a key takes (core, OSD, emulation, or nowhere) is
//! decided when it goes down and remembered until it comes up, so every make
//! sent anywhere is matched by exactly one break to the same place, even if
//! the OSD or emulation mode changes while the key is held.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use embassy_time::Instant;
use heapless::Vec;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::emulation::{EmulationMode, EmulationStateMachine};
use super::keycodes::{KEY_MENU, KEY_UPSTROKE, KeyCode, osd_code};
use super::profile::CoreProfile;
use super::remap::RemapTable;
use super::{Event, HidReport, JoyState, KbdLeds, Modifiers, ResetRequest};
use crate::config::Config;
use crate::constants::{HID_MAX_KEYS, MAX_EVENTS};

/// Events produced by a single pass.
pub type Events = Vec<Event, MAX_EVENTS>;

/// Keyboard reset combinations, selected by index.  The low byte is the
/// modifier mask, 0x100 is the Delete key.
const RESET_COMBOS: [u16; 3] = [0x45, 0x89, 0x105];

const RESET_DELETE: u16 = 0x100;
const USB_DELETE: u8 = 0x4c;

/// Modifiers which become buttons while emulation is active.
const EMULATION_BUTTONS: Modifiers = Modifiers::LCTRL
    .union(Modifiers::LSHIFT)
    .union(Modifiers::LALT)
    .union(Modifiers::LGUI);

/// Where a key's make went, so its break can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// To the core, optionally echoed to the OSD.
    Core(KeyCode, Option<u8>),

    /// Claimed for keyboard emulation.
    Emulation(JoyState),

    /// To the OSD only.
    Osd(u8),

    /// The OSD open key.
    OsdOpen,

    /// Consumed, or no mapping.
    None,
}

pub struct InputTranslator {
    profile: Option<&'static CoreProfile>,
    remap: RemapTable,
    menu_as_rgui: bool,
    reset_combo: u16,

    // Arbitration between keyboards.
    last_priority: u8,

    // The last accepted report, after remapping, and where each of its
    // keys was routed.
    pressed: HidReport,
    routes: Vec<(u8, Route), HID_MAX_KEYS>,

    // Modifiers whose make has been sent to the core.
    forwarded: Modifiers,

    reset_held: Option<ResetRequest>,
    osd_visible: bool,
    caps_lock: bool,
    emulation: EmulationStateMachine,
}

impl InputTranslator {
    pub fn new(config: &Config) -> Self {
        let reset_combo = RESET_COMBOS
            .get(config.reset_combo as usize)
            .copied()
            .unwrap_or(RESET_COMBOS[0]);
        Self {
            profile: None,
            remap: config.key_remap.clone(),
            menu_as_rgui: config.key_menu_as_rgui,
            reset_combo,
            last_priority: u8::MAX,
            pressed: HidReport::default(),
            routes: Vec::new(),
            forwarded: Modifiers::empty(),
            reset_held: None,
            osd_visible: false,
            caps_lock: false,
            emulation: EmulationStateMachine::new(),
        }
    }

    /// Switches to a new core.  Key state is forgotten without sending any
    /// breaks, as the new core never saw the makes.
    pub fn set_profile(&mut self, profile: Option<&'static CoreProfile>) {
        self.profile = profile;
        self.pressed = HidReport::default();
        self.routes.clear();
        self.forwarded = Modifiers::empty();
        self.last_priority = u8::MAX;
        self.osd_visible = false;
    }

    pub fn osd_visible(&self) -> bool {
        self.osd_visible
    }

    /// Records the OSD being opened or closed other than from the keyboard.
    pub fn set_osd_visible(&mut self, visible: bool) {
        self.osd_visible = visible;
    }

    pub fn emulation_mode(&self) -> EmulationMode {
        self.emulation.mode()
    }

    /// Whether the core reset combination is held.
    pub fn reset_held(&self) -> bool {
        self.reset_held == Some(ResetRequest::Core(true))
    }

    /// Runs the periodic part of keyboard emulation.
    pub fn tick(&mut self, now: Instant) -> Option<Event> {
        if self.osd_visible {
            return None;
        }
        self.emulation.tick(now)
    }

    /// Processes a keyboard report from an input source with the given
    /// priority (lower wins).
    pub fn apply(&mut self, report: &HidReport, priority: u8, now: Instant) -> Events {
        let mut events = Events::new();

        // An idle report from a lower priority keyboard mustn't release keys
        // held on a higher priority one.
        if report.is_empty() && priority > self.last_priority {
            trace!("Ignoring idle report priority {}", priority);
            return events;
        }
        self.last_priority = priority;

        self.check_reset(report, &mut events);

        // Remapping can map two keys onto one, and each key needs exactly
        // one route.
        let mut report = *report;
        self.remap.apply(&mut report);
        report.dedup();

        let Some(profile) = self.profile.filter(|p| p.keymap.is_some()) else {
            self.pressed = report;
            return events;
        };

        self.modifiers(profile, report.modifiers, &mut events);

        let released: Vec<u8, HID_MAX_KEYS> = self
            .pressed
            .pressed()
            .filter(|k| !report.contains(*k))
            .collect();
        for key in released {
            let route = match self.routes.iter().position(|(k, _)| *k == key) {
                Some(index) => self.routes.swap_remove(index).1,
                None => Route::None,
            };
            self.key_break(route, &mut events);
        }

        let made: Vec<u8, HID_MAX_KEYS> = report
            .pressed()
            .filter(|k| !self.pressed.contains(*k))
            .collect();
        for key in made {
            if self.routes.is_full() {
                warn!("No route for key 0x{:02x}", key);
                continue;
            }
            let route = self.key_make(profile, key, now, &mut events);
            if self.routes.push((key, route)).is_err() {
                warn!("Lost route for key 0x{:02x}", key);
            }
        }

        self.pressed = report;
        events
    }

    fn check_reset(&mut self, report: &HidReport, events: &mut Events) {
        let mut keys = (report.modifiers - Modifiers::LSHIFT).bits() as u16;
        if report.contains(USB_DELETE) {
            keys |= RESET_DELETE;
        }

        if keys == self.reset_combo {
            if self.reset_held.is_none() {
                let request = if report.modifiers.contains(Modifiers::LSHIFT) {
                    ResetRequest::Firmware
                } else {
                    ResetRequest::Core(true)
                };
                info!("Reset combination {}", request);
                self.reset_held = Some(request);
                let _ = events.push(Event::Reset(request));
            }
        } else if let Some(held) = self.reset_held.take() {
            if held == ResetRequest::Core(true) {
                let _ = events.push(Event::Reset(ResetRequest::Core(false)));
            }
        }
    }

    fn modifiers(&mut self, profile: &CoreProfile, modifiers: Modifiers, events: &mut Events) {
        let emulating = self.emulation.is_active() && !self.osd_visible;
        let buttons = if emulating {
            modifiers & EMULATION_BUTTONS
        } else {
            Modifiers::empty()
        };
        let (mouse, joystick) = self.emulation.set_buttons(buttons);
        for event in [mouse, joystick].into_iter().flatten() {
            let _ = events.push(event);
        }

        // While the OSD is up, held modifiers are released but nothing new
        // is pressed.
        let wanted = if self.osd_visible {
            self.forwarded & modifiers
        } else {
            modifiers - buttons
        };

        let Some(keymap) = profile.keymap else {
            return;
        };
        for bit in 0..8 {
            let mask = Modifiers::from_bits_retain(1 << bit);
            let was = self.forwarded.contains(mask);
            let now = wanted.contains(mask);
            if was == now {
                continue;
            }
            let code = keymap.modifier(bit);
            if !code.is_miss() {
                let _ = events.push(Event::Key { code, make: now });
            }
        }
        self.forwarded = wanted;
    }

    fn key_make(
        &mut self,
        profile: &CoreProfile,
        key: u8,
        now: Instant,
        events: &mut Events,
    ) -> Route {
        if !self.osd_visible {
            if let Some(bits) = self.emulation.claims(key) {
                if let Some(event) = self.emulation.press(bits) {
                    let _ = events.push(event);
                }
                return Route::Emulation(bits);
            }
        }

        let Some(keymap) = profile.keymap else {
            return Route::None;
        };
        let code = keymap.lookup(key, self.menu_as_rgui);

        if code.opens_osd() && code.code() == 0 {
            self.osd_visible = !self.osd_visible;
            debug!("OSD visible {}", self.osd_visible);
            let _ = events.push(Event::OsdVisible(self.osd_visible));
            let _ = events.push(Event::OsdKey(KEY_MENU));
            return Route::OsdOpen;
        }

        if let Some(selector) = code.emulation_select() {
            let old = self.emulation.mode();
            let mode = self.emulation.select(selector, now);
            if let Some(event) = self.emulation.exit_event(old) {
                let _ = events.push(event);
            }
            let (num, scroll) = mode.leds();
            let _ = events.push(Event::Led {
                leds: KbdLeds::NUM_LOCK,
                on: num,
            });
            let _ = events.push(Event::Led {
                leds: KbdLeds::SCROLL_LOCK,
                on: scroll,
            });
            return Route::None;
        }

        let osd = if self.osd_visible { osd_code(key) } else { None };
        if self.osd_visible && profile.osd_captures_keys {
            return match osd {
                Some(code) => {
                    let _ = events.push(Event::OsdKey(code));
                    Route::Osd(code)
                }
                None => Route::None,
            };
        }
        if let Some(osd) = osd {
            let _ = events.push(Event::OsdKey(osd));
        }

        if code.is_caps_toggle() {
            // The core sees caps lock as a toggle.
            self.caps_lock = !self.caps_lock;
            let _ = events.push(Event::Key {
                code,
                make: self.caps_lock,
            });
            let _ = events.push(Event::Led {
                leds: KbdLeds::CAPS_LOCK,
                on: self.caps_lock,
            });
            return match osd {
                Some(osd) => Route::Osd(osd),
                None => Route::None,
            };
        }

        if code.is_miss() {
            trace!("No mapping for key 0x{:02x}", key);
            return match osd {
                Some(osd) => Route::Osd(osd),
                None => Route::None,
            };
        }

        let _ = events.push(Event::Key { code, make: true });
        Route::Core(code, osd)
    }

    fn key_break(&mut self, route: Route, events: &mut Events) {
        match route {
            Route::Core(code, osd) => {
                let _ = events.push(Event::Key { code, make: false });
                if let Some(osd) = osd {
                    let _ = events.push(Event::OsdKey(osd | KEY_UPSTROKE));
                }
            }
            Route::Emulation(bits) => {
                if let Some(event) = self.emulation.release(bits) {
                    let _ = events.push(event);
                }
            }
            Route::Osd(code) => {
                let _ = events.push(Event::OsdKey(code | KEY_UPSTROKE));
            }
            Route::OsdOpen => {
                let _ = events.push(Event::OsdKey(KEY_MENU | KEY_UPSTROKE));
            }
            Route::None => (),
        }
    }
}
