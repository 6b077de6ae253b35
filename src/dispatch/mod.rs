//! The I/O loop's work, independent of the hardware.
//!
//! The [`Dispatcher`] owns every component: the core registry, the input
//! translation state, the keyboard rate limiter, the mouse accumulator, the
//! panel buttons, the LED sync and the SD card emulation with its cache.
//! The firmware's I/O task calls [`Dispatcher::poll`] every iteration, and
//! [`Dispatcher::handle_hid`] for each event from the HID bridge, so there
//! is a single owner of all of the state.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub mod encode;

use embassy_time::Instant;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::constants::{ADC_INTERVAL, IKBD_RATE_INTERVAL, KBD_RATE_INTERVAL, MAX_JOYSTICKS, NUM_DB9_PORTS};
use crate::host::Host;
use crate::input::bridge::HidInput;
use crate::input::buttons::Buttons;
use crate::input::joystick::{Db9Ports, analog, renumber, usb_slot};
use crate::input::keycodes::KeyCode;
use crate::input::leds::KbdLedSync;
use crate::input::mouse::{ArchieButtons, MouseAccumulator, MouseFormat, MousePacket};
use crate::input::profile::{CoreProfile, KeyboardLink, MouseStyle};
use crate::input::ratelimit::KeyboardRateLimiter;
use crate::input::translator::InputTranslator;
use crate::input::{Event, JoyState, ResetRequest};
use crate::link::opcodes::*;
use crate::link::{CoreLink, UserIo};
use crate::registry::{CoreState, CoreTypeRegistry};
use crate::storage::{FileSystem, SdAction, SdBlockCache, SdEmulator, SectorStore};
use crate::types::CoreType;
use encode::{ikbd_joystick, minimig_code, minimig_is_osd, ps2_sequence, serial_code};

/// What the I/O task should do after a poll.
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// A core with user I/O is running.
    Running,

    /// No core we can talk to.
    Idle,

    /// A new core is being loaded.
    Reloading,

    /// The firmware must restart.
    Restart,
}

// IKBD joystick event headers, for joysticks 0 and 1.
const IKBD_JOYSTICK: u8 = 0xfe;

pub struct Dispatcher<L, S, FS, H>
where
    L: CoreLink,
    S: SectorStore,
    FS: FileSystem,
    H: Host,
{
    link: L,
    fs: FS,
    host: H,
    config: Config,

    registry: CoreTypeRegistry,
    profile: Option<&'static CoreProfile>,
    translator: InputTranslator,
    limiter: KeyboardRateLimiter,
    mouse: Option<MouseAccumulator>,
    archie_buttons: ArchieButtons,
    db9: Db9Ports,
    osd_was_visible: bool,
    usb_joysticks: u8,
    buttons: Buttons,
    next_adc: Option<Instant>,
    leds: KbdLedSync,

    sd: SdEmulator,
    cache: SdBlockCache<S, FS::File>,

    restart: bool,
}

impl<L, S, FS, H> Dispatcher<L, S, FS, H>
where
    L: CoreLink,
    S: SectorStore,
    FS: FileSystem,
    H: Host,
{
    pub fn new(link: L, store: S, fs: FS, host: H, config: Config) -> Self {
        Self {
            link,
            fs,
            host,
            translator: InputTranslator::new(&config),
            buttons: Buttons::new(config.scandoubler_disable, config.ypbpr),
            config,
            registry: CoreTypeRegistry::new(),
            profile: None,
            limiter: KeyboardRateLimiter::new(KBD_RATE_INTERVAL),
            mouse: None,
            archie_buttons: ArchieButtons::new(),
            db9: Db9Ports::new(),
            osd_was_visible: false,
            usb_joysticks: 0,
            next_adc: None,
            leds: KbdLedSync::new(),
            sd: SdEmulator::new(),
            cache: SdBlockCache::new(store),
            restart: false,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn registry(&self) -> &CoreTypeRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &SdBlockCache<S, FS::File> {
        &self.cache
    }

    pub fn core(&self) -> CoreType {
        self.registry.core()
    }

    /// Detects the core, and sets everything up to talk to it.
    pub fn start(&mut self) -> CoreType {
        let core = self
            .registry
            .detect(&mut self.link, &mut self.sd, &mut self.cache, &mut self.fs);
        self.set_profile(self.registry.profile());
        core
    }

    fn set_profile(&mut self, profile: Option<&'static CoreProfile>) {
        self.profile = profile;
        self.translator.set_profile(profile);

        let interval = match profile.map(|p| p.keyboard) {
            Some(KeyboardLink::Ikbd) => IKBD_RATE_INTERVAL,
            _ => KBD_RATE_INTERVAL,
        };
        self.limiter = KeyboardRateLimiter::new(interval);

        self.mouse = profile.and_then(|p| match p.mouse {
            MouseStyle::Minimig => Some(MouseFormat::Minimig),
            MouseStyle::Ps2 => Some(MouseFormat::Ps2),
            MouseStyle::Ikbd => Some(MouseFormat::Ikbd),
            MouseStyle::Archie => Some(MouseFormat::Archie),
            MouseStyle::None => None,
        })
        .map(MouseAccumulator::new);

        self.archie_buttons = ArchieButtons::new();
        self.buttons.resend();
    }

    /// One iteration of the I/O loop.
    pub fn poll(&mut self, now: Instant) -> LoopState {
        if self.restart {
            return LoopState::Restart;
        }

        match self.registry.poll(&mut self.link) {
            CoreState::Active | CoreState::Mismatch(_) => (),
            CoreState::Reloading => return LoopState::Reloading,
            CoreState::Restart => return LoopState::Restart,
        }

        let Some(profile) = self.profile else {
            return LoopState::Idle;
        };

        if profile.sd_emulation {
            if let SdAction::Failed(e) =
                self.sd
                    .poll(&mut self.link, &mut self.cache, &mut self.host)
            {
                debug!("SD request failed: {}", e);
            }
        }

        if let Some(value) = self.limiter.poll(now) {
            self.send_serial(profile, value);
        }

        if let Some(event) = self.translator.tick(now) {
            self.handle_event(event, now);
        }

        if let Some(packet) = self.mouse.as_mut().and_then(|m| m.poll(now)) {
            self.send_mouse(profile, packet, now);
        }

        // DB9 changes are held back while the OSD is up, so bring the core
        // up to date once it closes.
        let osd_visible = self.translator.osd_visible();
        if self.osd_was_visible && !osd_visible {
            debug!("OSD closed - resending DB9 state");
            self.db9.resend();
        }
        self.osd_was_visible = osd_visible;

        for port in 0..NUM_DB9_PORTS {
            let state = self.host.read_db9(port);
            if let Some(state) = self.db9.sample(port, state) {
                trace!("DB9 port {} 0x{:02x}", port, state.bits());
                let slot = renumber(port as u8, self.usb_joysticks, self.config.joystick0_prefer_db9);
                self.joystick(profile, slot, state, now);
            }
        }
        self.db9.sampled();

        self.poll_buttons(profile, now);

        if self.leds.due(now) {
            let byte = self.link.kbd_led_status();
            for (leds, on) in self.leds.update(byte) {
                self.host.set_kbd_led(leds, on);
            }
        }

        if self.restart {
            LoopState::Restart
        } else {
            LoopState::Running
        }
    }

    fn poll_buttons(&mut self, profile: &CoreProfile, now: Instant) {
        if self.next_adc.is_some_and(|next| now < next) {
            return;
        }
        self.next_adc = Some(now + ADC_INTERVAL);

        let panel = self.host.read_panel();
        let kbd_reset = self.translator.reset_held() && !profile.osd_reset;
        let update = self.buttons.update(panel, kbd_reset, now);
        if let Some(map) = update.send {
            trace!("Buttons 0x{:02x}", map.bits());
            self.link.cmd8(UIO_BUT_SW, map.bits());
        }
        if update.menu_click {
            let visible = !self.translator.osd_visible();
            self.translator.set_osd_visible(visible);
            self.host.osd_visible(visible);
        }
    }

    /// Processes an event from the HID bridge.
    pub fn handle_hid(&mut self, input: HidInput, now: Instant) {
        match input {
            HidInput::Keyboard { priority, report } => {
                for event in self.translator.apply(&report, priority, now) {
                    self.handle_event(event, now);
                }
            }
            HidInput::Mouse { buttons, dx, dy } => {
                self.handle_event(Event::Mouse { buttons, dx, dy }, now)
            }
            HidInput::Joystick { index, state } => {
                if let Some(profile) = self.profile {
                    self.joystick(profile, usb_slot(index), state, now);
                }
            }
            HidInput::JoystickCount(count) => {
                info!("{} USB joysticks", count);
                self.usb_joysticks = count;
            }
        }
    }

    /// Records the OSD being opened or closed by the menu system.
    pub fn set_osd_visible(&mut self, visible: bool) {
        self.translator.set_osd_visible(visible);
    }

    fn handle_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Reset(request) => self.reset(request),
            Event::OsdKey(code) => self.host.osd_key(code),
            Event::OsdVisible(visible) => self.host.osd_visible(visible),
            Event::Led { leds, on } => {
                let forward = self.leds.set(leds, on);
                if !forward.is_empty() {
                    self.host.set_kbd_led(forward, on);
                }
            }
            event => {
                let Some(profile) = self.profile else {
                    return;
                };
                match event {
                    Event::Key { code, make } => self.key(profile, code, make, now),
                    Event::Mouse { buttons, dx, dy } => {
                        if profile.mouse == MouseStyle::Archie {
                            for (key, make) in self.archie_buttons.update(buttons) {
                                self.key(profile, KeyCode::new(key as u16), make, now);
                            }
                        }
                        if let Some(mouse) = self.mouse.as_mut() {
                            mouse.add(buttons, dx, dy);
                        }
                    }
                    Event::Joystick { port, state } => {
                        let slot =
                            renumber(port, self.usb_joysticks, self.config.joystick0_prefer_db9);
                        self.joystick(profile, slot, state, now);
                    }
                    _ => (),
                }
            }
        }
    }

    fn reset(&mut self, request: ResetRequest) {
        match request {
            ResetRequest::Firmware => self.restart = true,
            ResetRequest::Core(true) => {
                if self.profile.is_some_and(|p| p.osd_reset) {
                    self.host.osd_reset();
                }
            }
            // Released - the buttons stop holding the core in reset.
            ResetRequest::Core(false) => (),
        }
    }

    fn key(&mut self, profile: &CoreProfile, code: KeyCode, make: bool, now: Instant) {
        match profile.keyboard {
            KeyboardLink::Amiga => {
                if let Some(value) = self.limiter.submit(minimig_code(code, make), now) {
                    self.send_serial(profile, value);
                }
            }
            KeyboardLink::Ikbd | KeyboardLink::Archie => {
                if let Some(value) = self.limiter.submit(serial_code(code, make) as u16, now) {
                    self.send_serial(profile, value);
                }
            }
            KeyboardLink::Ps2 => {
                let seq = ps2_sequence(code, make);
                if !seq.is_empty() {
                    self.link.cmd_bytes(UIO_KEYBOARD, &seq);
                }
            }
            KeyboardLink::None => (),
        }
    }

    // Sends a value which has come through the rate limiter.
    fn send_serial(&mut self, profile: &CoreProfile, value: u16) {
        let cmd = match profile.keyboard {
            KeyboardLink::Amiga if minimig_is_osd(value) => UIO_KBD_OSD,
            KeyboardLink::Ikbd => UIO_IKBD_OUT,
            _ => UIO_KEYBOARD,
        };
        self.link.cmd8(cmd, value as u8);
    }

    // Queues a byte for the IKBD link.
    fn ikbd(&mut self, profile: &CoreProfile, byte: u8, now: Instant) {
        if let Some(value) = self.limiter.submit(byte as u16, now) {
            self.send_serial(profile, value);
        }
    }

    fn send_mouse(&mut self, profile: &CoreProfile, packet: MousePacket, now: Instant) {
        if profile.mouse == MouseStyle::Ikbd {
            for byte in packet {
                self.ikbd(profile, byte, now);
            }
        } else {
            self.link.cmd_bytes(UIO_MOUSE, &packet);
        }
    }

    fn joystick(&mut self, profile: &CoreProfile, slot: u8, state: JoyState, now: Instant) {
        if slot >= MAX_JOYSTICKS {
            return;
        }
        if self.translator.osd_visible() {
            trace!("OSD visible - joystick {} not sent", slot);
            return;
        }

        if profile.ikbd_joysticks && slot < 2 {
            self.ikbd(profile, IKBD_JOYSTICK + slot, now);
            self.ikbd(profile, ikbd_joystick(state), now);
        } else {
            let cmd = if slot < 2 {
                UIO_JOYSTICK0 + slot
            } else {
                UIO_JOYSTICK2 + slot - 2
            };
            self.link.cmd8(cmd, state.bits());
        }

        self.link.cmd32(UIO_JOYSTICK0_EXT + slot, state.bits() as u32);

        if profile.analog_joystick {
            let (x, y) = analog(state);
            self.link.cmd_cont(UIO_ASTICK);
            self.link.write_bytes(&[slot, x as u8, y as u8]);
            self.link.deselect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::buttons::Panel;
    use crate::input::{HidReport, KbdLeds, Modifiers};
    use crate::link::Target;
    use crate::test::{MemStore, MockFs, MockHost, MockLink};

    type TestDispatcher = Dispatcher<MockLink, MemStore, MockFs, MockHost>;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn dispatcher(id: u8, config: Config) -> TestDispatcher {
        let mut link = MockLink::new();
        link.set_core_id(id);
        let mut d = Dispatcher::new(link, MemStore::new(64), MockFs::new(), MockHost::new(), config);
        d.start();
        d.link_mut().take_frames();
        d
    }

    fn key(d: &mut TestDispatcher, mods: Modifiers, keys: &[u8], now: Instant) {
        d.handle_hid(
            HidInput::Keyboard {
                priority: 0,
                report: HidReport::new(mods, keys),
            },
            now,
        );
    }

    #[test]
    fn minimig_keys_rate_limited() {
        let mut d = dispatcher(0xa1, Config::default());
        key(&mut d, Modifiers::empty(), &[0x04, 0x05], at(0));
        // One sent straight away, one queued
        assert_eq!(d.link().frames_for(UIO_KEYBOARD), vec![vec![UIO_KEYBOARD, 0x20]]);
        d.poll(at(5));
        assert_eq!(d.link().frames_for(UIO_KEYBOARD).len(), 1);
        d.poll(at(10));
        assert_eq!(
            d.link().frames_for(UIO_KEYBOARD),
            vec![vec![UIO_KEYBOARD, 0x20], vec![UIO_KEYBOARD, 0x35]]
        );
    }

    #[test]
    fn minimig_osd_keys_on_osd_channel() {
        let mut d = dispatcher(0xa5, Config::default());
        key(&mut d, Modifiers::empty(), &[0x4a], at(0));
        assert_eq!(d.link().frames_for(UIO_KBD_OSD), vec![vec![UIO_KBD_OSD, 0x6c]]);
    }

    #[test]
    fn ps2_frames() {
        let mut d = dispatcher(0xa4, Config::default());
        key(&mut d, Modifiers::empty(), &[0x52], at(0));
        key(&mut d, Modifiers::empty(), &[], at(1));
        assert_eq!(
            d.link().frames_for(UIO_KEYBOARD),
            vec![vec![UIO_KEYBOARD, 0xe0, 0x75], vec![UIO_KEYBOARD, 0xe0, 0xf0, 0x75]]
        );
    }

    #[test]
    fn ikbd_keys_and_mouse() {
        let mut d = dispatcher(0xa3, Config::default());
        key(&mut d, Modifiers::empty(), &[0x04], at(0));
        assert_eq!(d.link().frames_for(UIO_IKBD_OUT), vec![vec![UIO_IKBD_OUT, 0x1e]]);

        d.handle_hid(
            HidInput::Mouse {
                buttons: 1,
                dx: 3,
                dy: 4,
            },
            at(1),
        );
        for ms in 2..20 {
            d.poll(at(ms));
        }
        let bytes: Vec<u8> = d
            .link()
            .frames_for(UIO_IKBD_OUT)
            .iter()
            .map(|f| f[1])
            .collect();
        assert_eq!(bytes, vec![0x1e, 0xfa, 3, 4]);
    }

    #[test]
    fn minimig_mouse_accumulated() {
        let mut d = dispatcher(0xa1, Config::default());
        for _ in 0..3 {
            d.handle_hid(
                HidInput::Mouse {
                    buttons: 0,
                    dx: 100,
                    dy: 0,
                },
                at(0),
            );
        }
        for ms in 0..100 {
            d.poll(at(ms));
        }
        assert_eq!(
            d.link().frames_for(UIO_MOUSE),
            vec![
                vec![UIO_MOUSE, 127, 0, 0],
                vec![UIO_MOUSE, 127, 0, 0],
                vec![UIO_MOUSE, 46, 0, 0]
            ]
        );
    }

    #[test]
    fn archie_mouse_buttons_are_keys() {
        let mut d = dispatcher(0xa6, Config::default());
        d.handle_hid(
            HidInput::Mouse {
                buttons: 1,
                dx: 0,
                dy: 0,
            },
            at(0),
        );
        assert_eq!(d.link().frames_for(UIO_KEYBOARD), vec![vec![UIO_KEYBOARD, 0x70]]);
    }

    #[test]
    fn db9_renumbered_with_usb_stick() {
        let mut d = dispatcher(0xa4, Config::default());
        d.handle_hid(HidInput::JoystickCount(1), at(0));
        d.host_mut().db9[1] = JoyState::UP;
        d.poll(at(0));
        // Physical port 1 becomes joystick 0 with one USB stick
        assert_eq!(d.link().frames_for(UIO_JOYSTICK0), vec![vec![UIO_JOYSTICK0, 0x08]]);
        assert_eq!(
            d.link().frames_for(UIO_JOYSTICK0_EXT),
            vec![vec![UIO_JOYSTICK0_EXT, 0x08, 0, 0, 0]]
        );
        // 8-bit cores get analog too
        assert_eq!(d.link().frames_for(UIO_ASTICK), vec![vec![UIO_ASTICK, 0, 0, 0x80]]);

        // Unchanged - not sent again
        d.poll(at(1));
        assert_eq!(d.link().frames_for(UIO_JOYSTICK0).len(), 1);
    }

    #[test]
    fn usb_joysticks_on_high_slots() {
        let mut d = dispatcher(0xa2, Config::default());
        d.handle_hid(
            HidInput::Joystick {
                index: 3,
                state: JoyState::BTN1,
            },
            at(0),
        );
        assert_eq!(d.link().frames_for(UIO_JOYSTICK2 + 1), vec![vec![0x11, 0x10]]);
        d.handle_hid(
            HidInput::Joystick {
                index: 6,
                state: JoyState::BTN1,
            },
            at(0),
        );
        assert!(d.link().frames_for(UIO_JOYSTICK0_EXT + 6).is_empty());
    }

    #[test]
    fn atari_joysticks_over_ikbd() {
        let mut d = dispatcher(0xa3, Config::default());
        d.handle_hid(
            HidInput::Joystick {
                index: 0,
                state: JoyState::UP | JoyState::BTN1,
            },
            at(0),
        );
        d.poll(at(5));
        let bytes: Vec<u8> = d
            .link()
            .frames_for(UIO_IKBD_OUT)
            .iter()
            .map(|f| f[1])
            .collect();
        assert_eq!(bytes, vec![0xff, 0x81]);
        assert!(d.link().frames_for(UIO_ASTICK).is_empty());
    }

    #[test]
    fn joysticks_held_back_while_osd_visible() {
        let mut d = dispatcher(0xa4, Config::default());
        key(&mut d, Modifiers::empty(), &[0x45], at(0));
        assert_eq!(d.host().osd_visible, vec![true]);
        d.handle_hid(
            HidInput::Joystick {
                index: 0,
                state: JoyState::UP,
            },
            at(1),
        );
        assert!(d.link().frames_for(UIO_JOYSTICK1).is_empty());
    }

    #[test]
    fn db9_resent_when_osd_closes() {
        let mut d = dispatcher(0xa2, Config::default());
        d.host_mut().db9[1] = JoyState::UP;
        d.poll(at(0));
        assert_eq!(d.link().frames_for(UIO_JOYSTICK1), vec![vec![UIO_JOYSTICK1, 0x08]]);

        // Released while the OSD is up - held back
        d.set_osd_visible(true);
        d.poll(at(1));
        d.host_mut().db9[1] = JoyState::empty();
        d.poll(at(2));
        assert_eq!(d.link().frames_for(UIO_JOYSTICK1).len(), 1);

        d.set_osd_visible(false);
        d.poll(at(3));
        assert_eq!(
            d.link().frames_for(UIO_JOYSTICK1),
            vec![vec![UIO_JOYSTICK1, 0x08], vec![UIO_JOYSTICK1, 0]]
        );
        assert_eq!(d.link().frames_for(UIO_JOYSTICK0), vec![vec![UIO_JOYSTICK0, 0]]);

        // Only once
        d.poll(at(4));
        assert_eq!(d.link().frames_for(UIO_JOYSTICK1).len(), 2);
    }

    #[test]
    fn sd_requests_only_for_8bit() {
        let mut d = dispatcher(0xa1, Config::default());
        d.link_mut().respond(UIO_GET_SDSTAT, &[0x61, 0, 0, 0, 0, 1]);
        d.poll(at(0));
        assert!(d.link().frames_for(UIO_GET_SDSTAT).is_empty());

        let mut d = dispatcher(0xa4, Config::default());
        d.link_mut().respond(UIO_GET_SDSTAT, &[0x61, 0, 0, 0, 0, 1]);
        d.poll(at(0));
        assert_eq!(d.link().frames_for(UIO_SECTOR_RD).len(), 1);
        assert_eq!(d.cache().cached(), Some((0, 2)));
    }

    #[test]
    fn invalid_sd_status_no_traffic() {
        let mut d = dispatcher(0xa4, Config::default());
        d.link_mut().respond(UIO_GET_SDSTAT, &[0x31, 0, 0, 0, 0, 1]);
        d.poll(at(0));
        assert!(d.link().frames_for(UIO_SECTOR_RD).is_empty());
        assert!(d.link().frames_for(UIO_SECTOR_WR).is_empty());
    }

    #[test]
    fn minimig_reset_through_osd() {
        let mut d = dispatcher(0xa1, Config::default());
        key(&mut d, Modifiers::LCTRL | Modifiers::LALT | Modifiers::RALT, &[], at(0));
        assert_eq!(d.host().osd_resets, 1);
    }

    #[test]
    fn reset_holds_button2() {
        let mut d = dispatcher(0xa4, Config::default());
        d.poll(at(0));
        key(&mut d, Modifiers::LCTRL | Modifiers::LALT | Modifiers::RALT, &[], at(1));
        d.poll(at(25));
        key(&mut d, Modifiers::empty(), &[], at(30));
        d.poll(at(50));
        assert_eq!(
            d.link().frames_for(UIO_BUT_SW),
            vec![vec![UIO_BUT_SW, 0x00], vec![UIO_BUT_SW, 0x02], vec![UIO_BUT_SW, 0x00]]
        );
        assert_eq!(d.host().osd_resets, 0);
    }

    #[test]
    fn firmware_restart_combo() {
        let mut d = dispatcher(0xa4, Config::default());
        let combo = Modifiers::LCTRL | Modifiers::LALT | Modifiers::RALT | Modifiers::LSHIFT;
        key(&mut d, combo, &[], at(0));
        assert_eq!(d.poll(at(1)), LoopState::Restart);
    }

    #[test]
    fn menu_click_toggles_osd() {
        let mut d = dispatcher(0xa4, Config::default());
        d.host_mut().panel = Panel::MENU;
        d.poll(at(0));
        d.host_mut().panel = Panel::empty();
        d.poll(at(25));
        assert_eq!(d.host().osd_visible, vec![true]);
    }

    #[test]
    fn led_sync_from_core() {
        let mut d = dispatcher(0xa4, Config::default());
        // Core controls caps lock, and wants it lit
        d.link_mut().respond(UIO_GET_KBD_LED, &[0x43]);
        d.poll(at(0));
        assert_eq!(d.host().leds, vec![(KbdLeds::CAPS_LOCK, true)]);

        // Num lock is the firmware's
        key(&mut d, Modifiers::empty(), &[0x6c], at(1));
        assert!(d.host().leds.contains(&(KbdLeds::NUM_LOCK, true)));
    }

    #[test]
    fn unknown_core_idle() {
        let mut d = dispatcher(0x12, Config::default());
        key(&mut d, Modifiers::empty(), &[0x04], at(0));
        assert_eq!(d.poll(at(0)), LoopState::Idle);
        assert!(d
            .link()
            .frames()
            .iter()
            .all(|(t, f)| *t == Target::Io && f == &vec![0xff]));
    }

    #[test]
    fn reload_then_restart() {
        let mut d = dispatcher(0xa1, Config::default());
        d.link_mut().set_core_id(0x00);
        let mut state = LoopState::Running;
        for ms in 0..300 {
            state = d.poll(at(ms));
        }
        assert_eq!(state, LoopState::Reloading);
        d.link_mut().set_core_id(0xa4);
        assert_eq!(d.poll(at(300)), LoopState::Restart);
    }
}
