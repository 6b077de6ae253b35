//! The front panel buttons and switches, and the video options they
//! control.
//!
//! The buttons and switches are read through the ADC, and sent to the core
//! as a single bitmap whenever it changes.  Holding the menu button toggles
//! the scandoubler, and pressing the user button while the menu button is
//! held toggles YPbPr output.  A short click of the menu button opens the
//! OSD.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use bitflags::bitflags;
use embassy_time::Instant;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::constants::MENU_LONG_PRESS;

bitflags! {
    /// Raw panel state, one bit per ADC channel.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Panel: u8 {
        const SWITCH2 = 0x01;
        const SWITCH1 = 0x02;
        const MENU = 0x04;
        const USER = 0x08;
    }
}

/// Panel ADC channels.
pub const CH_SWITCH2: usize = 0;
pub const CH_SWITCH1: usize = 1;
pub const CH_MENU: usize = 2;
pub const CH_USER: usize = 3;

impl Panel {
    /// Updates one channel from an 8-bit ADC sample.  Low means pressed,
    /// and a sample exactly mid-scale leaves the channel unchanged.
    pub fn with_sample(mut self, channel: usize, sample: u8) -> Self {
        let Some(bit) = Panel::from_bits(1 << (channel & 0x03)) else {
            return self;
        };
        if sample < 128 {
            self.insert(bit);
        } else if sample > 128 {
            self.remove(bit);
        }
        self
    }
}

bitflags! {
    /// The button and switch map sent to the core.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ButtonMap: u8 {
        const BUTTON1 = 0x01;
        const BUTTON2 = 0x02;
        const SWITCH1 = 0x04;
        const SWITCH2 = 0x08;
        const SCANDOUBLER_DISABLE = 0x10;
        const YPBPR = 0x20;
    }
}

/// What [`Buttons::update`] wants done.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ButtonUpdate {
    /// A map to send to the core.
    pub send: Option<ButtonMap>,

    /// The menu button was clicked.
    pub menu_click: bool,
}

#[derive(Debug)]
pub struct Buttons {
    scandoubler_disable: bool,
    ypbpr: bool,
    sent: Option<ButtonMap>,

    // When the menu button went down, and whether that press has been used
    // for a video option toggle.
    menu_down: Option<Instant>,
    menu_used: bool,
    ypbpr_latch: bool,
}

impl Buttons {
    pub fn new(scandoubler_disable: bool, ypbpr: bool) -> Self {
        Self {
            scandoubler_disable,
            ypbpr,
            sent: None,
            menu_down: None,
            menu_used: false,
            ypbpr_latch: false,
        }
    }

    pub fn scandoubler_disable(&self) -> bool {
        self.scandoubler_disable
    }

    pub fn ypbpr(&self) -> bool {
        self.ypbpr
    }

    /// Forces the map to be sent on the next update, for example to a
    /// newly detected core.
    pub fn resend(&mut self) {
        self.sent = None;
    }

    /// Processes the panel state.  `kbd_reset` holds the core's reset
    /// button while the keyboard reset combination is down.
    pub fn update(&mut self, panel: Panel, kbd_reset: bool, now: Instant) -> ButtonUpdate {
        let mut update = ButtonUpdate::default();
        let mut force = false;

        if panel.contains(Panel::MENU) {
            let down = *self.menu_down.get_or_insert(now);
            if !self.menu_used && now >= down + MENU_LONG_PRESS {
                self.scandoubler_disable = !self.scandoubler_disable;
                info!("Scandoubler disable {}", self.scandoubler_disable);
                self.menu_used = true;
                force = true;
            }

            if panel.contains(Panel::USER) {
                if !self.ypbpr_latch {
                    self.ypbpr = !self.ypbpr;
                    info!("YPbPr {}", self.ypbpr);
                    self.ypbpr_latch = true;
                    self.menu_used = true;
                    force = true;
                }
            } else {
                self.ypbpr_latch = false;
            }
        } else {
            update.menu_click = self.menu_down.is_some() && !self.menu_used;
            self.menu_down = None;
            self.menu_used = false;
            self.ypbpr_latch = false;
        }

        let map = self.map(panel, kbd_reset);
        if force || self.sent != Some(map) {
            self.sent = Some(map);
            update.send = Some(map);
        }
        update
    }

    fn map(&self, panel: Panel, kbd_reset: bool) -> ButtonMap {
        let mut map = ButtonMap::empty();
        map.set(ButtonMap::SWITCH2, panel.contains(Panel::SWITCH2));
        map.set(ButtonMap::SWITCH1, panel.contains(Panel::SWITCH1));
        if panel.contains(Panel::MENU) {
            map |= ButtonMap::BUTTON1;
        } else if panel.contains(Panel::USER) {
            map |= ButtonMap::BUTTON2;
        }
        if kbd_reset {
            map |= ButtonMap::BUTTON2;
        }
        map.set(ButtonMap::SCANDOUBLER_DISABLE, self.scandoubler_disable);
        map.set(ButtonMap::YPBPR, self.ypbpr);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn sent_on_change_only() {
        let mut buttons = Buttons::new(false, true);
        let first = buttons.update(Panel::empty(), false, at(0));
        assert_eq!(first.send, Some(ButtonMap::YPBPR));
        assert_eq!(buttons.update(Panel::empty(), false, at(1)).send, None);
        assert_eq!(
            buttons.update(Panel::SWITCH1, false, at(2)).send,
            Some(ButtonMap::YPBPR | ButtonMap::SWITCH1)
        );
        buttons.resend();
        assert!(buttons.update(Panel::SWITCH1, false, at(3)).send.is_some());
    }

    #[test]
    fn keyboard_reset_holds_button2() {
        let mut buttons = Buttons::new(false, false);
        assert_eq!(
            buttons.update(Panel::empty(), true, at(0)).send,
            Some(ButtonMap::BUTTON2)
        );
        assert_eq!(
            buttons.update(Panel::empty(), false, at(1)).send,
            Some(ButtonMap::empty())
        );
    }

    #[test]
    fn long_press_toggles_scandoubler() {
        let mut buttons = Buttons::new(false, false);
        buttons.update(Panel::MENU, false, at(0));
        assert!(!buttons.scandoubler_disable());
        let update = buttons.update(Panel::MENU, false, at(1000));
        assert_eq!(
            update.send,
            Some(ButtonMap::BUTTON1 | ButtonMap::SCANDOUBLER_DISABLE)
        );
        // Only once per press, and no click on release
        buttons.update(Panel::MENU, false, at(3000));
        assert!(buttons.scandoubler_disable());
        assert!(!buttons.update(Panel::empty(), false, at(3001)).menu_click);
    }

    #[test]
    fn menu_and_user_toggle_ypbpr() {
        let mut buttons = Buttons::new(false, false);
        buttons.update(Panel::MENU, false, at(0));
        buttons.update(Panel::MENU | Panel::USER, false, at(10));
        buttons.update(Panel::MENU | Panel::USER, false, at(20));
        assert!(buttons.ypbpr());
        buttons.update(Panel::MENU, false, at(30));
        buttons.update(Panel::MENU | Panel::USER, false, at(40));
        assert!(!buttons.ypbpr());
        assert!(!buttons.scandoubler_disable());
    }

    #[test]
    fn short_press_is_click() {
        let mut buttons = Buttons::new(false, false);
        assert!(!buttons.update(Panel::MENU, false, at(0)).menu_click);
        assert!(buttons.update(Panel::empty(), false, at(200)).menu_click);
        assert!(!buttons.update(Panel::empty(), false, at(300)).menu_click);
    }

    #[test]
    fn adc_threshold() {
        let panel = Panel::empty().with_sample(2, 10);
        assert_eq!(panel, Panel::MENU);
        assert_eq!(panel.with_sample(2, 128), Panel::MENU);
        assert_eq!(panel.with_sample(2, 200), Panel::empty());
        assert_eq!(panel.with_sample(0, 0), Panel::MENU | Panel::SWITCH2);
    }
}
