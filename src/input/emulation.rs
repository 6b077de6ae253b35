//! Keyboard driven mouse and joystick emulation.
//!
//! When emulation is active the cursor keys become directions and the left
//! hand modifiers become buttons.  In mouse mode a step is sent every
//! [`EMU_MOUSE_INTERVAL`] while a direction is held; in the joystick modes
//! each change of state is sent straight away.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use embassy_time::Instant;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::{Event, JoyState, Modifiers};
use crate::constants::EMU_MOUSE_INTERVAL;

/// USB usages of the cursor keys, right, left, down and up.
const DIRECTION_KEYS: [(u8, JoyState); 4] = [
    (0x4f, JoyState::RIGHT),
    (0x50, JoyState::LEFT),
    (0x51, JoyState::DOWN),
    (0x52, JoyState::UP),
];

/// What the keyboard is currently emulating.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmulationMode {
    #[default]
    None,
    Mouse,
    Joystick0,
    Joystick1,
}

impl EmulationMode {
    /// The next mode in the cycle.
    pub fn next(self) -> Self {
        match self {
            EmulationMode::None => EmulationMode::Mouse,
            EmulationMode::Mouse => EmulationMode::Joystick0,
            EmulationMode::Joystick0 => EmulationMode::Joystick1,
            EmulationMode::Joystick1 => EmulationMode::None,
        }
    }

    /// The physical joystick port emulated, if a joystick mode.
    pub fn joystick_port(self) -> Option<u8> {
        match self {
            EmulationMode::Joystick0 => Some(0),
            EmulationMode::Joystick1 => Some(1),
            _ => None,
        }
    }

    /// The (num lock, scroll lock) LED states that show this mode.
    pub fn leds(self) -> (bool, bool) {
        match self {
            EmulationMode::None => (false, false),
            EmulationMode::Mouse => (true, true),
            EmulationMode::Joystick0 => (true, false),
            EmulationMode::Joystick1 => (false, true),
        }
    }
}

/// The emulation state machine.
#[derive(Debug, Default)]
pub struct EmulationStateMachine {
    mode: EmulationMode,
    state: JoyState,
    next_step: Option<Instant>,
}

impl EmulationStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> EmulationMode {
        self.mode
    }

    pub fn state(&self) -> JoyState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.mode != EmulationMode::None
    }

    /// Changes mode.  `selector` 1-4 picks mouse, joystick 0, joystick 1 or
    /// none, anything else moves to the next mode.
    pub fn select(&mut self, selector: u8, now: Instant) -> EmulationMode {
        self.mode = match selector {
            1 => EmulationMode::Mouse,
            2 => EmulationMode::Joystick0,
            3 => EmulationMode::Joystick1,
            4 => EmulationMode::None,
            _ => self.mode.next(),
        };
        if self.mode == EmulationMode::Mouse {
            self.next_step = Some(now + EMU_MOUSE_INTERVAL);
        }
        info!("Keyboard emulation mode {}", self.mode);
        self.mode
    }

    /// After a mode change, the event that releases whatever the `old` mode
    /// still had held, so the core isn't left with it.
    pub fn exit_event(&self, old: EmulationMode) -> Option<Event> {
        if old == self.mode {
            return None;
        }
        match old {
            EmulationMode::Mouse => self
                .state
                .intersects(JoyState::BTN1 | JoyState::BTN2)
                .then_some(Event::Mouse {
                    buttons: 0,
                    dx: 0,
                    dy: 0,
                }),
            _ => old
                .joystick_port()
                .filter(|_| !self.state.is_empty())
                .map(|port| Event::Joystick {
                    port,
                    state: JoyState::empty(),
                }),
        }
    }

    /// The direction a key is claimed for, if emulation is active and the
    /// key is a cursor key.
    pub fn claims(&self, usb: u8) -> Option<JoyState> {
        if !self.is_active() {
            return None;
        }
        DIRECTION_KEYS
            .iter()
            .find(|(key, _)| *key == usb)
            .map(|(_, dir)| *dir)
    }

    /// A claimed key went down.
    pub fn press(&mut self, bits: JoyState) -> Option<Event> {
        self.state |= bits;
        self.joystick_event()
    }

    /// A claimed key went up.  Also used for keys claimed before emulation
    /// was switched off, so the bit is always cleared.
    pub fn release(&mut self, bits: JoyState) -> Option<Event> {
        self.state &= !bits;
        self.joystick_event()
    }

    /// Updates the buttons from the left hand modifiers (ctrl, shift, alt,
    /// gui are buttons 1-4).  Returns the events for any change.
    pub fn set_buttons(&mut self, modifiers: Modifiers) -> (Option<Event>, Option<Event>) {
        let last = self.state;
        let mut buttons = JoyState::empty();
        for (bit, button) in [
            (Modifiers::LCTRL, JoyState::BTN1),
            (Modifiers::LSHIFT, JoyState::BTN2),
            (Modifiers::LALT, JoyState::BTN3),
            (Modifiers::LGUI, JoyState::BTN4),
        ] {
            if modifiers.contains(bit) {
                buttons |= button;
            }
        }
        self.state = (self.state - JoyState::BUTTONS) | buttons;

        let mouse_buttons = JoyState::BTN1 | JoyState::BTN2;
        let mouse = (self.mode == EmulationMode::Mouse
            && (last & mouse_buttons) != (self.state & mouse_buttons))
            .then(|| Event::Mouse {
                buttons: self.state.mouse_buttons(),
                dx: 0,
                dy: 0,
            });
        let joystick = if (last & JoyState::BUTTONS) != (self.state & JoyState::BUTTONS) {
            self.joystick_event()
        } else {
            None
        };
        (mouse, joystick)
    }

    /// Moves the emulated mouse, if it is due.
    pub fn tick(&mut self, now: Instant) -> Option<Event> {
        if self.mode != EmulationMode::Mouse {
            return None;
        }
        if let Some(next) = self.next_step {
            if now < next {
                return None;
            }
        }
        self.next_step = Some(now + EMU_MOUSE_INTERVAL);

        if !self.state.intersects(JoyState::MOVE) {
            return None;
        }
        let (dx, dy) = self.state.mouse_step();
        Some(Event::Mouse {
            buttons: self.state.mouse_buttons(),
            dx,
            dy,
        })
    }

    fn joystick_event(&self) -> Option<Event> {
        self.mode.joystick_port().map(|port| Event::Joystick {
            port,
            state: self.state,
        })
    }
}
