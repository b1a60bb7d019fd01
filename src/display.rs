//! Host display capabilities the reader depends on.
//!
//! The reader never talks to the windowing system directly. It asks a
//! [`DisplayEnvironment`] for fullscreen changes and pulls key presses through
//! a subscription token, so tests can drive it with a fake host.

use eframe::egui;
use log::debug;
use std::collections::HashSet;

/// Keys the reader claims. Everything else is left to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKey {
    ArrowRight,
    ArrowLeft,
    Space,
    Escape,
}

impl ReaderKey {
    fn from_egui(key: egui::Key) -> Option<Self> {
        match key {
            egui::Key::ArrowRight => Some(ReaderKey::ArrowRight),
            egui::Key::ArrowLeft => Some(ReaderKey::ArrowLeft),
            egui::Key::Space => Some(ReaderKey::Space),
            egui::Key::Escape => Some(ReaderKey::Escape),
            _ => None,
        }
    }
}

/// Removes the reader's key presses from `events`, returned in press order.
/// Removing them keeps a focused slider or button from reacting to the same press.
fn take_reader_keys(events: &mut Vec<egui::Event>) -> Vec<ReaderKey> {
    let mut keys = Vec::new();
    events.retain(|event| {
        let egui::Event::Key {
            key,
            pressed: true,
            modifiers,
            ..
        } = event
        else {
            return true;
        };
        match ReaderKey::from_egui(*key).filter(|_| modifiers.is_none()) {
            Some(reader_key) => {
                keys.push(reader_key);
                false
            }
            None => true,
        }
    });
    keys
}

/// Handle for an attached key listener. Not `Clone`: one token, one detach.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct KeySubscription(u64);

impl KeySubscription {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

pub trait DisplayEnvironment {
    fn request_fullscreen(&mut self);
    fn exit_fullscreen(&mut self);
    fn is_fullscreen_active(&self) -> bool;
    fn subscribe_keydown(&mut self) -> KeySubscription;
    fn unsubscribe_keydown(&mut self, subscription: KeySubscription);
    /// Key presses delivered to `subscription` since the last poll.
    fn poll_keys(&mut self, subscription: &KeySubscription) -> Vec<ReaderKey>;
}

/// [`DisplayEnvironment`] backed by the egui viewport.
pub struct EguiDisplay {
    ctx: egui::Context,
    subscribers: HashSet<u64>,
    next_id: u64,
}

impl EguiDisplay {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            subscribers: HashSet::new(),
            next_id: 0,
        }
    }

    #[cfg(test)]
    pub fn active_listeners(&self) -> usize {
        self.subscribers.len()
    }
}

impl DisplayEnvironment for EguiDisplay {
    fn request_fullscreen(&mut self) {
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Fullscreen(true));
    }

    fn exit_fullscreen(&mut self) {
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Fullscreen(false));
    }

    fn is_fullscreen_active(&self) -> bool {
        self.ctx
            .input(|i| i.viewport().fullscreen.unwrap_or(false))
    }

    fn subscribe_keydown(&mut self) -> KeySubscription {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.insert(id);
        debug!("Key listener {} attached", id);
        KeySubscription::new(id)
    }

    fn unsubscribe_keydown(&mut self, subscription: KeySubscription) {
        if self.subscribers.remove(&subscription.id()) {
            debug!("Key listener {} detached", subscription.id());
        }
    }

    fn poll_keys(&mut self, subscription: &KeySubscription) -> Vec<ReaderKey> {
        if !self.subscribers.contains(&subscription.id()) {
            return Vec::new();
        }
        self.ctx.input_mut(|i| take_reader_keys(&mut i.events))
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeDisplay;
    use super::*;

    #[test]
    fn egui_display_hands_out_distinct_subscriptions() {
        let mut display = EguiDisplay::new(egui::Context::default());
        let a = display.subscribe_keydown();
        let b = display.subscribe_keydown();
        assert_ne!(a.id(), b.id());
        display.unsubscribe_keydown(a);
        assert_eq!(display.active_listeners(), 1);
    }

    #[test]
    fn egui_display_ignores_detached_subscription() {
        let mut display = EguiDisplay::new(egui::Context::default());
        let sub = display.subscribe_keydown();
        let stale = KeySubscription::new(sub.id());
        display.unsubscribe_keydown(sub);
        assert!(display.poll_keys(&stale).is_empty());
    }

    #[test]
    fn egui_display_starts_windowed() {
        let display = EguiDisplay::new(egui::Context::default());
        assert!(!display.is_fullscreen_active());
    }

    #[test]
    fn fake_only_delivers_to_live_listeners() {
        let mut display = FakeDisplay::default();
        let sub = display.subscribe_keydown();
        display.press(ReaderKey::Space);
        assert_eq!(display.poll_keys(&sub), vec![ReaderKey::Space]);

        let stale = KeySubscription::new(sub.id());
        display.unsubscribe_keydown(sub);
        display.press(ReaderKey::Escape);
        assert!(display.poll_keys(&stale).is_empty());
        assert_eq!(display.active_listeners(), 0);
    }

    fn press(key: egui::Key) -> egui::Event {
        egui::Event::Key {
            key,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers: egui::Modifiers::NONE,
        }
    }

    #[test]
    fn keys_come_out_in_press_order_once_each() {
        let mut events = vec![
            press(egui::Key::ArrowRight),
            press(egui::Key::ArrowRight),
            press(egui::Key::ArrowLeft),
            press(egui::Key::Space),
        ];
        assert_eq!(
            take_reader_keys(&mut events),
            vec![
                ReaderKey::ArrowRight,
                ReaderKey::ArrowRight,
                ReaderKey::ArrowLeft,
                ReaderKey::Space,
            ]
        );
        assert!(events.is_empty());
    }

    #[test]
    fn other_events_are_left_for_egui() {
        let mut release = press(egui::Key::Escape);
        if let egui::Event::Key { pressed, .. } = &mut release {
            *pressed = false;
        }
        let mut with_ctrl = press(egui::Key::ArrowRight);
        if let egui::Event::Key { modifiers, .. } = &mut with_ctrl {
            *modifiers = egui::Modifiers::CTRL;
        }
        let mut events = vec![
            press(egui::Key::A),
            release,
            with_ctrl,
            egui::Event::Text(" ".to_owned()),
            press(egui::Key::Escape),
        ];

        assert_eq!(take_reader_keys(&mut events), vec![ReaderKey::Escape]);
        assert_eq!(events.len(), 4);
    }
}
