//! Reading session for a single manga.
//!
//! `PageViewer` owns the transient reader state: which page is shown, whether
//! auto-advance is running, whether the control overlay is visible and the
//! local mirror of the host fullscreen state. It has no knowledge of egui;
//! rendering lives in `render` and host access goes through
//! [`DisplayEnvironment`].

use crate::display::{DisplayEnvironment, KeySubscription, ReaderKey};
use crate::timer::RepeatingTask;
use crate::types::MangaItem;
use log::{debug, info};
use std::time::{Duration, Instant};

/// Auto-advance state. The repeating task lives inside `Playing`, so leaving
/// that state is the only way to drop it and entering it the only way to
/// create one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayState {
    Paused,
    Playing(RepeatingTask),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSettings {
    pub auto_advance: Duration,
    pub show_controls_on_open: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            auto_advance: Duration::from_millis(3000),
            show_controls_on_open: true,
        }
    }
}

pub struct PageViewer {
    manga: MangaItem,
    on_close: Box<dyn FnMut()>,
    keys: KeySubscription,
    settings: ReaderSettings,
    current_index: usize,
    play: PlayState,
    show_controls: bool,
    is_fullscreen: bool,
}

impl PageViewer {
    /// Starts a session on the first page and attaches the key listener.
    pub fn mount(
        manga: MangaItem,
        on_close: Box<dyn FnMut()>,
        env: &mut dyn DisplayEnvironment,
        settings: ReaderSettings,
    ) -> Self {
        info!(
            "Reader mounted: '{}' ({} pages)",
            manga.title(),
            manga.pages().len()
        );
        Self {
            keys: env.subscribe_keydown(),
            manga,
            on_close,
            settings,
            current_index: 0,
            play: PlayState::Paused,
            show_controls: settings.show_controls_on_open,
            is_fullscreen: false,
        }
    }

    /// Like [`PageViewer::mount`], but opens on `start_index` (clamped). Used when
    /// the user picked one image out of a folder.
    pub fn mount_at(
        manga: MangaItem,
        start_index: usize,
        on_close: Box<dyn FnMut()>,
        env: &mut dyn DisplayEnvironment,
        settings: ReaderSettings,
    ) -> Self {
        let mut viewer = Self::mount(manga, on_close, env, settings);
        viewer.seek(start_index);
        viewer
    }

    /// Detaches the key listener and drops any running auto-advance.
    pub fn unmount(mut self, env: &mut dyn DisplayEnvironment) {
        self.play = PlayState::Paused;
        env.unsubscribe_keydown(self.keys);
        info!("Reader unmounted: '{}'", self.manga.title());
    }

    pub fn manga(&self) -> &MangaItem {
        &self.manga
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_page(&self) -> &str {
        &self.manga.pages()[self.current_index]
    }

    pub fn page_count(&self) -> usize {
        self.manga.pages().len()
    }

    pub fn is_first(&self) -> bool {
        self.current_index == 0
    }

    pub fn is_last(&self) -> bool {
        self.current_index == self.manga.last_index()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.play, PlayState::Playing(_))
    }

    pub fn show_controls(&self) -> bool {
        self.show_controls
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    pub fn advance(&mut self) {
        self.set_index((self.current_index + 1).min(self.manga.last_index()));
    }

    pub fn retreat(&mut self) {
        self.set_index(self.current_index.saturating_sub(1));
    }

    /// Jumps straight to `index`; the slider range already matches the pages.
    pub fn seek(&mut self, index: usize) {
        self.set_index(index.min(self.manga.last_index()));
    }

    pub fn toggle_play(&mut self, now: Instant) {
        self.play = match self.play {
            PlayState::Paused => {
                let task = RepeatingTask::start(self.settings.auto_advance, now);
                info!(
                    "Auto-advance started (every {} ms)",
                    task.interval().as_millis()
                );
                PlayState::Playing(task)
            }
            PlayState::Playing(_) => {
                info!("Auto-advance paused");
                PlayState::Paused
            }
        };
    }

    pub fn toggle_controls(&mut self) {
        self.show_controls = !self.show_controls;
    }

    pub fn toggle_fullscreen(&mut self, env: &mut dyn DisplayEnvironment) {
        if env.is_fullscreen_active() {
            env.exit_fullscreen();
            self.is_fullscreen = false;
        } else {
            env.request_fullscreen();
            self.is_fullscreen = true;
        }
    }

    /// Adopts the host's fullscreen state, e.g. after a window-manager gesture.
    pub fn sync_fullscreen(&mut self, env: &dyn DisplayEnvironment) {
        let active = env.is_fullscreen_active();
        if active != self.is_fullscreen {
            debug!("Fullscreen mirror resynced to {}", active);
            self.is_fullscreen = active;
        }
    }

    pub fn close(&mut self) {
        (self.on_close)();
    }

    pub fn handle_key(&mut self, key: ReaderKey, env: &mut dyn DisplayEnvironment) {
        match key {
            ReaderKey::ArrowRight | ReaderKey::Space => self.advance(),
            ReaderKey::ArrowLeft => self.retreat(),
            ReaderKey::Escape => {
                if env.is_fullscreen_active() {
                    env.exit_fullscreen();
                    self.is_fullscreen = false;
                } else {
                    self.close();
                }
            }
        }
    }

    /// Drains the key listener and applies every pending press.
    pub fn handle_pending_keys(&mut self, env: &mut dyn DisplayEnvironment) {
        for key in env.poll_keys(&self.keys) {
            self.handle_key(key, env);
        }
    }

    /// Runs every auto-advance firing that is due at `now`.
    pub fn tick(&mut self, now: Instant) {
        loop {
            let PlayState::Playing(task) = &mut self.play else {
                return;
            };
            if !task.fire_if_due(now) {
                return;
            }
            if !self.is_last() {
                self.advance();
            }
            if self.is_last() {
                info!("Auto-advance reached the last page");
                self.play = PlayState::Paused;
            }
        }
    }

    /// Time until the next auto-advance firing, if playing.
    pub fn next_tick_in(&self, now: Instant) -> Option<Duration> {
        match &self.play {
            PlayState::Playing(task) => Some(task.remaining(now)),
            PlayState::Paused => None,
        }
    }

    fn set_index(&mut self, index: usize) {
        if index != self.current_index {
            debug!("Page {} -> {}", self.current_index + 1, index + 1);
            self.current_index = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::fake::FakeDisplay;
    use std::cell::Cell;
    use std::rc::Rc;

    const TICK: Duration = Duration::from_millis(3000);

    fn manga(pages: usize) -> MangaItem {
        let pages: Vec<String> = (0..pages).map(|i| format!("p{}", i)).collect();
        MangaItem::new("test", "Test", pages[0].clone(), pages).unwrap()
    }

    fn mount(pages: usize, env: &mut FakeDisplay) -> (PageViewer, Rc<Cell<usize>>) {
        let closes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&closes);
        let viewer = PageViewer::mount(
            manga(pages),
            Box::new(move || counter.set(counter.get() + 1)),
            env,
            ReaderSettings::default(),
        );
        (viewer, closes)
    }

    #[test]
    fn starts_on_first_page_paused_with_controls() {
        let mut env = FakeDisplay::default();
        let (viewer, _) = mount(3, &mut env);
        assert_eq!(viewer.current_index(), 0);
        assert_eq!(viewer.current_page(), "p0");
        assert!(!viewer.is_playing());
        assert!(viewer.show_controls());
        assert!(!viewer.is_fullscreen());
        assert_eq!(env.subscribes, 1);
    }

    #[test]
    fn advance_clamps_at_last_page() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        let mut seen = vec![viewer.current_index()];
        for _ in 0..3 {
            viewer.advance();
            seen.push(viewer.current_index());
        }
        assert_eq!(seen, vec![0, 1, 2, 2]);
        assert!(viewer.is_last());
    }

    #[test]
    fn retreat_clamps_at_first_page() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        viewer.retreat();
        assert_eq!(viewer.current_index(), 0);
        assert!(viewer.is_first());
    }

    #[test]
    fn mixed_navigation_stays_in_bounds() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(4, &mut env);
        let steps = [1, 1, 1, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 1, 1];
        for step in steps {
            if step == 1 {
                viewer.advance();
            } else {
                viewer.retreat();
            }
            assert!(viewer.current_index() < viewer.page_count());
        }
    }

    #[test]
    fn seek_sets_index_exactly() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(5, &mut env);
        for i in [4, 0, 2, 3] {
            viewer.seek(i);
            assert_eq!(viewer.current_index(), i);
        }
    }

    #[test]
    fn seek_then_retreat() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        viewer.seek(1);
        viewer.retreat();
        assert_eq!(viewer.current_index(), 0);
    }

    #[test]
    fn seek_past_end_lands_on_last_page() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        viewer.seek(10);
        assert_eq!(viewer.current_index(), 2);
    }

    #[test]
    fn tick_before_last_page_advances_and_stops_on_arrival() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        let start = Instant::now();
        viewer.seek(1);
        viewer.toggle_play(start);
        assert!(viewer.is_playing());

        viewer.tick(start + TICK);
        assert_eq!(viewer.current_index(), 2);
        assert!(!viewer.is_playing());
        assert_eq!(viewer.next_tick_in(start + TICK), None);
    }

    #[test]
    fn playing_from_last_page_stops_after_one_tick() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        let start = Instant::now();
        viewer.seek(2);
        viewer.toggle_play(start);
        viewer.tick(start + TICK);
        assert_eq!(viewer.current_index(), 2);
        assert!(!viewer.is_playing());
    }

    #[test]
    fn tick_waits_for_the_interval() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(5, &mut env);
        let start = Instant::now();
        viewer.toggle_play(start);
        viewer.tick(start + Duration::from_millis(2999));
        assert_eq!(viewer.current_index(), 0);
        assert_eq!(
            viewer.next_tick_in(start + Duration::from_millis(2999)),
            Some(Duration::from_millis(1))
        );

        viewer.tick(start + TICK);
        assert_eq!(viewer.current_index(), 1);
        viewer.tick(start + TICK * 2);
        assert_eq!(viewer.current_index(), 2);
        assert!(viewer.is_playing());
    }

    #[test]
    fn stalled_frame_never_runs_past_last_page() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        let start = Instant::now();
        viewer.toggle_play(start);
        viewer.tick(start + TICK * 10);
        assert_eq!(viewer.current_index(), 2);
        assert!(!viewer.is_playing());
    }

    #[test]
    fn toggling_play_twice_drops_the_timer() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(5, &mut env);
        let start = Instant::now();
        viewer.toggle_play(start);
        viewer.toggle_play(start);
        assert_eq!(viewer.play, PlayState::Paused);
        viewer.tick(start + TICK * 3);
        assert_eq!(viewer.current_index(), 0);
    }

    #[test]
    fn restarting_play_rearms_from_now() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(5, &mut env);
        let start = Instant::now();
        viewer.toggle_play(start);
        viewer.toggle_play(start + Duration::from_millis(2000));
        viewer.toggle_play(start + Duration::from_millis(2500));
        viewer.tick(start + TICK);
        assert_eq!(viewer.current_index(), 0);
        viewer.tick(start + Duration::from_millis(5500));
        assert_eq!(viewer.current_index(), 1);
    }

    #[test]
    fn toggle_controls_touches_nothing_else() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        let start = Instant::now();
        viewer.advance();
        viewer.toggle_play(start);
        viewer.toggle_controls();
        assert!(!viewer.show_controls());
        assert_eq!(viewer.current_index(), 1);
        assert!(viewer.is_playing());
        viewer.toggle_controls();
        assert!(viewer.show_controls());
    }

    #[test]
    fn controls_hidden_on_open_when_configured() {
        let mut env = FakeDisplay::default();
        let viewer = PageViewer::mount(
            manga(2),
            Box::new(|| {}),
            &mut env,
            ReaderSettings {
                show_controls_on_open: false,
                ..ReaderSettings::default()
            },
        );
        assert!(!viewer.show_controls());
    }

    #[test]
    fn right_and_space_stop_at_last_page() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(2, &mut env);
        viewer.handle_key(ReaderKey::ArrowRight, &mut env);
        assert_eq!(viewer.current_index(), 1);
        viewer.handle_key(ReaderKey::ArrowRight, &mut env);
        viewer.handle_key(ReaderKey::Space, &mut env);
        assert_eq!(viewer.current_index(), 1);
    }

    #[test]
    fn left_stops_at_first_page() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(2, &mut env);
        viewer.handle_key(ReaderKey::ArrowLeft, &mut env);
        assert_eq!(viewer.current_index(), 0);
    }

    #[test]
    fn escape_without_fullscreen_closes_once() {
        let mut env = FakeDisplay::default();
        let (mut viewer, closes) = mount(3, &mut env);
        viewer.handle_key(ReaderKey::Escape, &mut env);
        assert_eq!(closes.get(), 1);
        assert_eq!(env.fullscreen_exits, 0);
    }

    #[test]
    fn escape_in_fullscreen_exits_without_closing() {
        let mut env = FakeDisplay::default();
        let (mut viewer, closes) = mount(3, &mut env);
        viewer.toggle_fullscreen(&mut env);
        assert!(viewer.is_fullscreen());

        viewer.handle_key(ReaderKey::Escape, &mut env);
        assert_eq!(closes.get(), 0);
        assert_eq!(env.fullscreen_exits, 1);
        assert!(!env.fullscreen);
        assert!(!viewer.is_fullscreen());
    }

    #[test]
    fn toggle_fullscreen_follows_host_state() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        viewer.toggle_fullscreen(&mut env);
        assert_eq!(env.fullscreen_requests, 1);
        viewer.toggle_fullscreen(&mut env);
        assert_eq!(env.fullscreen_exits, 1);
        assert!(!viewer.is_fullscreen());
    }

    #[test]
    fn sync_fullscreen_repairs_desync() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        viewer.toggle_fullscreen(&mut env);
        // Host left fullscreen on its own.
        env.fullscreen = false;
        viewer.sync_fullscreen(&env);
        assert!(!viewer.is_fullscreen());
    }

    #[test]
    fn pending_keys_are_applied_in_order() {
        let mut env = FakeDisplay::default();
        let (mut viewer, closes) = mount(4, &mut env);
        env.press(ReaderKey::ArrowRight);
        env.press(ReaderKey::Space);
        env.press(ReaderKey::ArrowLeft);
        viewer.handle_pending_keys(&mut env);
        assert_eq!(viewer.current_index(), 1);
        assert_eq!(closes.get(), 0);
    }

    #[test]
    fn close_invokes_callback() {
        let mut env = FakeDisplay::default();
        let (mut viewer, closes) = mount(1, &mut env);
        viewer.close();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn unmount_detaches_listener_once() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        viewer.toggle_play(Instant::now());
        assert_eq!(env.active_listeners(), 1);
        viewer.unmount(&mut env);
        assert_eq!(env.unsubscribes, 1);
        assert_eq!(env.active_listeners(), 0);
    }

    #[test]
    fn remount_starts_a_fresh_session() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(3, &mut env);
        viewer.advance();
        viewer.toggle_controls();
        viewer.unmount(&mut env);

        let (viewer, _) = mount(3, &mut env);
        assert_eq!(viewer.current_index(), 0);
        assert!(viewer.show_controls());
        assert_eq!(env.active_listeners(), 1);
    }

    #[test]
    fn single_page_manga_is_first_and_last() {
        let mut env = FakeDisplay::default();
        let (mut viewer, _) = mount(1, &mut env);
        assert!(viewer.is_first());
        assert!(viewer.is_last());
        viewer.advance();
        viewer.retreat();
        assert_eq!(viewer.current_index(), 0);
    }

    #[test]
    fn mount_at_opens_on_the_requested_page() {
        let mut env = FakeDisplay::default();
        let settings = ReaderSettings::default();
        let viewer = PageViewer::mount_at(manga(4), 2, Box::new(|| {}), &mut env, settings);
        assert_eq!(viewer.current_index(), 2);
        assert_eq!(viewer.current_page(), "p2");
        assert!(!viewer.is_playing());
    }

    #[test]
    fn mount_at_clamps_past_the_end() {
        let mut env = FakeDisplay::default();
        let settings = ReaderSettings::default();
        let viewer = PageViewer::mount_at(manga(3), 9, Box::new(|| {}), &mut env, settings);
        assert_eq!(viewer.current_index(), 2);
        assert!(viewer.is_last());
    }
}
