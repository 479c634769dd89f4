/// Looping background track manager
///
/// Owns at most one track handle bound to a category and drives the cycle
/// play → end → gap → next track for as long as the category stays selected.
/// Looping is done by hand instead of with a native loop so that a silence
/// gap can be inserted and the track rotated between iterations.
///
/// Every command cancels the pending gap timer and the running fade before it
/// changes anything. Completions (track end, gap timer, fade step) carry the
/// identity of the handle, timer or fade they were issued for and do nothing
/// when that identity is no longer current.
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::backend::{HandleId, PlaybackHandle, TrackBackend};
use super::category::{Category, SharedRegistry};
use super::fade::{self, Fade, FadeId};
use super::timer::{TimerId, TimerQueue};
use crate::config::LoopSettings;
use crate::state::{BgmStatus, LoopPhase};

/// Events the manager schedules for itself
#[derive(Debug, Clone, Copy)]
pub enum TimerEvent {
    GapElapsed { category: Category },
    FadeStep { fade: FadeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveTrack {
    category: Category,
    index: usize,
}

struct LiveHandle<H> {
    id: HandleId,
    inner: H,
}

/// A stopped handle finishing its fade-out
struct Trailing<H> {
    handle: LiveHandle<H>,
    fade: Fade,
}

fn release<H: PlaybackHandle>(mut handle: LiveHandle<H>) {
    handle.inner.stop();
    tracing::debug!("Released track handle {}", handle.id);
}

/// Uniform pick; when `previous` is given and there is a choice, never repeat it
fn pick_index<R: Rng>(rng: &mut R, len: usize, previous: Option<usize>) -> usize {
    let mut index = rng.gen_range(0..len);
    if let Some(previous) = previous {
        if len > 1 {
            while index == previous {
                index = rng.gen_range(0..len);
            }
        }
    }
    index
}

/// Background music state machine
pub struct LoopingTrackManager<B: TrackBackend> {
    backend: B,
    registry: SharedRegistry,
    settings: LoopSettings,
    timers: TimerQueue<TimerEvent>,
    rng: StdRng,
    next_handle: u64,
    next_fade: u64,

    active: Option<ActiveTrack>,
    handle: Option<LiveHandle<B::Handle>>,
    gap_timer: Option<TimerId>,
    fade: Option<Fade>,
    trailing: Option<Trailing<B::Handle>>,
    playing: bool,
    muted: bool,
    volume: f32,
}

impl<B: TrackBackend> LoopingTrackManager<B> {
    pub fn new(backend: B, registry: SharedRegistry, settings: LoopSettings) -> Self {
        Self::with_rng(backend, registry, settings, StdRng::from_entropy(), Instant::now())
    }

    /// Build with an explicit random source and start time
    pub fn with_rng(
        backend: B,
        registry: SharedRegistry,
        settings: LoopSettings,
        rng: StdRng,
        now: Instant,
    ) -> Self {
        Self {
            backend,
            registry,
            settings,
            timers: TimerQueue::new(now),
            rng,
            next_handle: 1,
            next_fade: 1,
            active: None,
            handle: None,
            gap_timer: None,
            fade: None,
            trailing: None,
            playing: false,
            muted: false,
            volume: 1.0,
        }
    }

    /// Start looping `category`. A no-op when it is already playing.
    pub fn play(&mut self, category: Category) {
        if self.playing && self.current_category() == Some(category) {
            tracing::debug!("Category {} already playing", category);
            return;
        }

        let tracks = self.registry.read().tracks(category);
        let tracks = match tracks {
            Ok(tracks) => tracks,
            Err(e) => {
                tracing::warn!("Cannot play {}: {}", category, e);
                return;
            }
        };

        self.teardown();
        let index = pick_index(&mut self.rng, tracks.len(), None);
        self.start_first_playable(category, &tracks, index, None);
    }

    /// Start looping the category named `name`
    pub fn play_named(&mut self, name: &str) {
        match name.parse::<Category>() {
            Ok(category) => self.play(category),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    /// Start the battle music for a quiz topic
    pub fn play_for_topic(&mut self, topic: &str) {
        let category = Category::for_topic(topic);
        tracing::debug!("Topic {:?} uses category {}", topic, category);
        self.play(category);
    }

    /// Fade out and forget the current category
    pub fn stop(&mut self) {
        self.cancel_gap_timer();
        self.cancel_fade();

        let active = self.active.take();
        let was_playing = std::mem::replace(&mut self.playing, false);

        if let Some(handle) = self.handle.take() {
            self.release_trailing();
            if was_playing {
                let from = handle.inner.volume();
                match self.begin_fade(from, 0.0) {
                    Some(fade) => self.trailing = Some(Trailing { handle, fade }),
                    None => release(handle),
                }
            } else {
                release(handle);
            }
        }

        if let Some(active) = active {
            tracing::info!("Stopped background music ({})", active.category);
        }
    }

    pub fn pause(&mut self) {
        if self.active.is_none() {
            return;
        }
        self.cancel_gap_timer();
        self.cancel_fade();
        if let Some(handle) = self.handle.as_mut() {
            handle.inner.pause();
        }
        self.playing = false;
        tracing::debug!("Background music paused");
    }

    /// Resume a paused handle. Stays paused while muted. With no handle
    /// (paused between tracks, or the track ran out while paused) the next
    /// track follows after a gap.
    pub fn resume(&mut self) {
        if self.muted {
            tracing::debug!("Muted, staying paused");
            return;
        }
        let Some(active) = self.active else {
            return;
        };
        if self.playing {
            return;
        }

        if self.handle.is_none() {
            self.playing = true;
            self.schedule_gap(active);
            return;
        }
        let from = match self.handle.as_mut() {
            Some(handle) => {
                handle.inner.play();
                handle.inner.volume()
            }
            None => return,
        };
        self.playing = true;
        self.fade_active_to(from, self.loop_volume());
        tracing::debug!("Background music resumed ({})", active.category);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if muted {
            self.release_trailing();
            self.pause();
        } else {
            self.resume();
        }
        tracing::info!("Background music {}", if muted { "muted" } else { "unmuted" });
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.set_muted(!self.muted);
        self.muted
    }

    /// Set the global loop volume (0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            tracing::warn!("Ignoring NaN background volume");
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);

        let target = self.loop_volume();
        if let Some(fade) = self.fade.as_mut() {
            fade.retarget(target);
        } else if self.playing {
            if let Some(handle) = self.handle.as_mut() {
                handle.inner.set_volume(target);
            }
        }
    }

    pub fn set_fade_duration(&mut self, duration: Duration) {
        self.settings.fade_ms = duration.as_millis() as u64;
    }

    /// Engine callback: the track behind `id` played to its end
    pub fn on_track_end(&mut self, id: HandleId) {
        if self.trailing.as_ref().map(|t| t.handle.id) == Some(id) {
            self.release_trailing();
            return;
        }
        if self.handle.as_ref().map(|h| h.id) != Some(id) {
            tracing::trace!("Ignoring end of stale handle {}", id);
            return;
        }
        let Some(active) = self.active else {
            return;
        };

        self.cancel_fade();
        if let Some(handle) = self.handle.take() {
            release(handle);
        }

        if self.playing {
            self.schedule_gap(active);
        } else {
            tracing::debug!("Track {} of {} ended while paused", active.index, active.category);
        }
    }

    fn schedule_gap(&mut self, active: ActiveTrack) {
        let timer = self
            .timers
            .schedule(self.settings.gap(), TimerEvent::GapElapsed { category: active.category });
        self.gap_timer = Some(timer);
        tracing::debug!(
            "Track {} of {} done, next in {}ms",
            active.index,
            active.category,
            self.settings.gap_ms
        );
    }

    /// Move the clock to `now` and fire every due timer
    pub fn advance_to(&mut self, now: Instant) {
        // Walk deadline by deadline so rescheduled steps keep their spacing
        while let Some(deadline) = self.timers.next_deadline().filter(|d| *d <= now) {
            self.timers.set_now(deadline);
            while let Some((timer, event)) = self.timers.pop_due() {
                self.on_timer(timer, event);
            }
        }
        self.timers.set_now(now);
    }

    /// Move the clock forward by `elapsed`
    pub fn advance(&mut self, elapsed: Duration) {
        let now = self.timers.now() + elapsed;
        self.advance_to(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    fn on_timer(&mut self, timer: TimerId, event: TimerEvent) {
        match event {
            TimerEvent::GapElapsed { category } => self.on_gap_elapsed(timer, category),
            TimerEvent::FadeStep { fade } => self.on_fade_step(timer, fade),
        }
    }

    fn on_gap_elapsed(&mut self, timer: TimerId, category: Category) {
        if self.gap_timer != Some(timer) {
            tracing::trace!("Ignoring stale gap timer for {}", category);
            return;
        }
        self.gap_timer = None;

        let previous = match self.active {
            Some(active) if active.category == category && self.playing => active.index,
            _ => return,
        };

        let tracks = self.registry.read().tracks(category);
        match tracks {
            Ok(tracks) => {
                let index = pick_index(&mut self.rng, tracks.len(), Some(previous));
                self.start_first_playable(category, &tracks, index, Some(previous));
            }
            Err(e) => {
                tracing::warn!("Cannot continue {}: {}", category, e);
                self.active = None;
                self.playing = false;
            }
        }
    }

    fn on_fade_step(&mut self, timer: TimerId, id: FadeId) {
        let interval = self.step_interval();

        if let Some(mut fade) = self.fade.filter(|f| f.id == id && f.timer == timer) {
            let volume = fade.advance();
            if let Some(handle) = self.handle.as_mut() {
                handle.inner.set_volume(volume);
            }
            if fade.is_complete() {
                self.fade = None;
            } else {
                fade.timer = self.timers.schedule(interval, TimerEvent::FadeStep { fade: id });
                self.fade = Some(fade);
            }
            return;
        }

        if let Some(mut trailing) = self.trailing.take() {
            if trailing.fade.id == id && trailing.fade.timer == timer {
                let volume = trailing.fade.advance();
                trailing.handle.inner.set_volume(volume);
                if trailing.fade.is_complete() {
                    release(trailing.handle);
                    return;
                }
                trailing.fade.timer = self.timers.schedule(interval, TimerEvent::FadeStep { fade: id });
            }
            self.trailing = Some(trailing);
            return;
        }

        tracing::trace!("Ignoring stale fade step");
    }

    /// Start `first`, falling back to the other tracks in list order and to
    /// `previous` last. Goes idle only when nothing loads.
    fn start_first_playable(
        &mut self,
        category: Category,
        tracks: &[String],
        first: usize,
        previous: Option<usize>,
    ) {
        let len = tracks.len();
        let mut order: Vec<usize> = (0..len).map(|offset| (first + offset) % len).collect();
        order.sort_by_key(|index| Some(*index) == previous);

        for index in order {
            if self.start_track(category, index, &tracks[index]) {
                return;
            }
        }

        tracing::warn!("No playable track in {}", category);
        self.active = None;
        self.playing = false;
    }

    fn start_track(&mut self, category: Category, index: usize, locator: &str) -> bool {
        let id = HandleId(self.next_handle);
        self.next_handle += 1;

        let mut inner = match self.backend.open_track(id, locator) {
            Ok(inner) => inner,
            Err(e) => {
                tracing::warn!("Failed to load {} for {}: {}", locator, category, e);
                return false;
            }
        };

        inner.set_volume(0.0);
        self.active = Some(ActiveTrack { category, index });

        if self.muted {
            self.handle = Some(LiveHandle { id, inner });
            self.playing = false;
            tracing::info!("Loaded {} for {} (muted, paused)", locator, category);
            return true;
        }

        inner.play();
        self.handle = Some(LiveHandle { id, inner });
        self.playing = true;
        self.fade_active_to(0.0, self.loop_volume());
        tracing::info!("Playing {} for {}", locator, category);
        true
    }

    /// Fade the live handle from `from` to `to`, or jump when fades are off
    fn fade_active_to(&mut self, from: f32, to: f32) {
        self.cancel_fade();
        if (from - to).abs() <= f32::EPSILON {
            return;
        }
        match self.begin_fade(from, to) {
            Some(fade) => self.fade = Some(fade),
            None => {
                if let Some(handle) = self.handle.as_mut() {
                    handle.inner.set_volume(to);
                }
            }
        }
    }

    fn begin_fade(&mut self, from: f32, to: f32) -> Option<Fade> {
        if self.settings.fade().is_zero() {
            return None;
        }
        let id = FadeId(self.next_fade);
        self.next_fade += 1;
        let timer = self
            .timers
            .schedule(self.step_interval(), TimerEvent::FadeStep { fade: id });
        Some(Fade {
            id,
            from,
            to,
            steps: self.settings.fade_steps.max(1),
            step: 0,
            timer,
        })
    }

    fn step_interval(&self) -> Duration {
        fade::step_interval(self.settings.fade(), self.settings.fade_steps)
    }

    fn cancel_gap_timer(&mut self) {
        if let Some(timer) = self.gap_timer.take() {
            self.timers.cancel(timer);
        }
    }

    fn cancel_fade(&mut self) {
        if let Some(fade) = self.fade.take() {
            self.timers.cancel(fade.timer);
        }
    }

    fn release_trailing(&mut self) {
        if let Some(trailing) = self.trailing.take() {
            self.timers.cancel(trailing.fade.timer);
            release(trailing.handle);
        }
    }

    /// Drop everything immediately, no fade
    fn teardown(&mut self) {
        self.cancel_gap_timer();
        self.cancel_fade();
        self.release_trailing();
        if let Some(handle) = self.handle.take() {
            release(handle);
        }
        self.active = None;
        self.playing = false;
    }

    /// Release all handles; used when the audio thread shuts down
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    pub fn phase(&self) -> LoopPhase {
        match self.active {
            None => LoopPhase::Idle,
            Some(ActiveTrack { category, index }) => {
                if self.gap_timer.is_some() {
                    LoopPhase::GapWaiting { category, index }
                } else if self.playing {
                    LoopPhase::Playing { category, index }
                } else {
                    LoopPhase::Paused { category, index }
                }
            }
        }
    }

    pub fn current_category(&self) -> Option<Category> {
        self.active.map(|a| a.category)
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Global loop volume as set by the user
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Level a fully faded-in track plays at
    pub fn loop_volume(&self) -> f32 {
        self.settings.base_volume * self.volume
    }

    pub fn live_handle(&self) -> Option<HandleId> {
        self.handle.as_ref().map(|h| h.id)
    }

    pub fn is_fading_out(&self) -> bool {
        self.trailing.is_some()
    }

    pub fn status(&self) -> BgmStatus {
        BgmStatus {
            phase: self.phase(),
            muted: self.muted,
            volume: self.volume,
        }
    }
}

impl<B: TrackBackend> Drop for LoopingTrackManager<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::category::{shared, BuiltInTopic, CategoryRegistry};
    use crate::audio_system::recording::{HandleState, RecordingBackend};
    use approx::assert_relative_eq;

    const AI: Category = Category::Battle(BuiltInTopic::Ai);

    fn settings() -> LoopSettings {
        LoopSettings {
            base_volume: 0.4,
            gap_ms: 2000,
            fade_ms: 1000,
            fade_steps: 10,
        }
    }

    fn manager_with(registry: CategoryRegistry) -> (LoopingTrackManager<RecordingBackend>, RecordingBackend) {
        let backend = RecordingBackend::new();
        let manager = LoopingTrackManager::with_rng(
            backend.clone(),
            shared(registry),
            settings(),
            StdRng::seed_from_u64(7),
            Instant::now(),
        );
        (manager, backend)
    }

    fn manager() -> (LoopingTrackManager<RecordingBackend>, RecordingBackend) {
        manager_with(CategoryRegistry::with_defaults())
    }

    #[test]
    fn test_pick_index_never_repeats_previous() {
        let mut rng = StdRng::seed_from_u64(1);
        for previous in 0..3 {
            for _ in 0..200 {
                assert_ne!(pick_index(&mut rng, 3, Some(previous)), previous);
            }
        }
        assert_eq!(pick_index(&mut rng, 1, Some(0)), 0);
    }

    #[test]
    fn test_play_starts_silent_and_fades_in() {
        let (mut manager, backend) = manager();
        manager.play(AI);

        let id = manager.live_handle().unwrap();
        assert!(manager.phase().is_playing());
        assert_eq!(backend.handle_state(id), Some(HandleState::Playing));
        assert_eq!(backend.handle_volume(id), Some(0.0));

        manager.advance(Duration::from_millis(500));
        let halfway = backend.handle_volume(id).unwrap();
        assert!(halfway > 0.0 && halfway < 0.4);

        manager.advance(Duration::from_millis(500));
        assert_relative_eq!(backend.handle_volume(id).unwrap(), 0.4, epsilon = 1e-6);
        assert!(manager.next_deadline().is_none());
    }

    #[test]
    fn test_play_same_category_is_idempotent() {
        let (mut manager, backend) = manager();
        manager.play(AI);
        let first = manager.live_handle();
        manager.play(AI);

        assert_eq!(manager.live_handle(), first);
        assert_eq!(backend.live_handles().len(), 1);
        assert_eq!(backend.opened().len(), 1);
    }

    #[test]
    fn test_unknown_or_empty_category_is_rejected() {
        let mut registry = CategoryRegistry::with_defaults();
        registry.replace(Category::Custom, Vec::new());
        let (mut manager, backend) = manager_with(registry);

        manager.play_named("battle_history");
        manager.play(Category::Custom);

        assert!(manager.phase().is_idle());
        assert!(backend.opened().is_empty());
    }

    #[test]
    fn test_rejected_switch_keeps_current_track() {
        let mut registry = CategoryRegistry::with_defaults();
        registry.replace(Category::Custom, Vec::new());
        let (mut manager, _backend) = manager_with(registry);

        manager.play(Category::Menu);
        manager.play(Category::Custom);
        assert_eq!(manager.current_category(), Some(Category::Menu));
    }

    #[test]
    fn test_switch_releases_old_handle_first() {
        let (mut manager, backend) = manager();
        manager.play(Category::Menu);
        let old = manager.live_handle().unwrap();

        manager.play(AI);

        assert_eq!(backend.handle_state(old), Some(HandleState::Stopped));
        assert_eq!(backend.live_handles(), vec![manager.live_handle().unwrap()]);
        assert_eq!(manager.current_category(), Some(AI));
    }

    #[test]
    fn test_track_end_waits_gap_then_rotates() {
        let (mut manager, backend) = manager();
        manager.play(AI);
        manager.advance(Duration::from_secs(1));

        let first = manager.live_handle().unwrap();
        let first_index = manager.phase().track_index().unwrap();
        manager.on_track_end(first);

        assert!(manager.phase().is_gap_waiting());
        assert!(manager.live_handle().is_none());
        assert!(backend.live_handles().is_empty());

        manager.advance(Duration::from_millis(1999));
        assert!(manager.phase().is_gap_waiting());

        manager.advance(Duration::from_millis(1));
        let second = manager.live_handle().unwrap();
        assert_ne!(second, first);
        assert_ne!(manager.phase().track_index(), Some(first_index));
        assert_eq!(backend.handle_volume(second), Some(0.0));
        assert!(manager.phase().is_playing());
    }

    #[test]
    fn test_single_track_category_replays_same_track() {
        let (mut manager, backend) = manager();
        manager.play(Category::Menu);
        let first = manager.live_handle().unwrap();
        manager.on_track_end(first);
        manager.advance(Duration::from_secs(2));

        let second = manager.live_handle().unwrap();
        assert_eq!(backend.handle_locator(second).as_deref(), Some("menu/menu_1.mp3"));
    }

    #[test]
    fn test_stop_fades_out_then_releases() {
        let (mut manager, backend) = manager();
        manager.play(AI);
        manager.advance(Duration::from_secs(1));
        let id = manager.live_handle().unwrap();

        manager.stop();
        assert!(manager.phase().is_idle());
        assert!(manager.is_fading_out());
        assert_eq!(backend.handle_state(id), Some(HandleState::Playing));

        manager.advance(Duration::from_secs(1));
        assert!(!manager.is_fading_out());
        assert_eq!(backend.handle_state(id), Some(HandleState::Stopped));
        assert_eq!(backend.handle_volume(id), Some(0.0));
    }

    #[test]
    fn test_stop_then_play_never_overlaps_handles() {
        let (mut manager, backend) = manager();
        manager.play(AI);
        manager.advance(Duration::from_secs(1));
        manager.stop();
        manager.play(Category::Menu);

        assert_eq!(backend.live_handles().len(), 1);
        manager.advance(Duration::from_secs(3));
        assert_eq!(backend.live_handles(), vec![manager.live_handle().unwrap()]);
        assert_eq!(manager.current_category(), Some(Category::Menu));
    }

    #[test]
    fn test_stop_during_gap_cancels_timer() {
        let (mut manager, backend) = manager();
        manager.play(AI);
        manager.on_track_end(manager.live_handle().unwrap());
        manager.stop();

        manager.advance(Duration::from_secs(10));
        assert!(manager.phase().is_idle());
        assert!(backend.live_handles().is_empty());
        assert_eq!(backend.opened().len(), 1);
    }

    #[test]
    fn test_late_track_end_after_switch_is_ignored() {
        let (mut manager, _backend) = manager();
        manager.play(AI);
        let stale = manager.live_handle().unwrap();

        manager.play(Category::Menu);
        manager.on_track_end(stale);

        assert!(manager.phase().is_playing());
        assert_eq!(manager.current_category(), Some(Category::Menu));
    }

    #[test]
    fn test_late_track_end_after_stop_is_ignored() {
        let (mut manager, _backend) = manager();
        manager.set_fade_duration(Duration::ZERO);
        manager.play(AI);
        let stale = manager.live_handle().unwrap();

        manager.stop();
        manager.on_track_end(stale);
        manager.advance(Duration::from_secs(5));

        assert!(manager.phase().is_idle());
    }

    #[test]
    fn test_pause_and_resume() {
        let (mut manager, backend) = manager();
        manager.play(AI);
        manager.advance(Duration::from_millis(300));
        let id = manager.live_handle().unwrap();

        manager.pause();
        assert!(manager.phase().is_paused());
        assert_eq!(backend.handle_state(id), Some(HandleState::Paused));
        assert!(manager.next_deadline().is_none());

        manager.resume();
        assert!(manager.phase().is_playing());
        assert_eq!(backend.handle_state(id), Some(HandleState::Playing));
        manager.advance(Duration::from_secs(1));
        assert_relative_eq!(backend.handle_volume(id).unwrap(), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_mute_during_gap_suppresses_rotation() {
        let (mut manager, backend) = manager();
        manager.play(AI);
        manager.on_track_end(manager.live_handle().unwrap());

        manager.set_muted(true);
        manager.advance(Duration::from_secs(5));
        assert!(manager.phase().is_paused());
        assert_eq!(backend.opened().len(), 1);

        manager.set_muted(false);
        assert!(manager.phase().is_gap_waiting());
        assert!(manager.live_handle().is_none());

        manager.advance(Duration::from_secs(2));
        assert!(manager.phase().is_playing());
        assert_eq!(backend.opened().len(), 2);
    }

    #[test]
    fn test_track_ending_while_paused_continues_on_resume() {
        let (mut manager, backend) = manager();
        manager.play(AI);
        let id = manager.live_handle().unwrap();

        manager.pause();
        manager.on_track_end(id);
        assert!(manager.phase().is_paused());
        assert!(backend.live_handles().is_empty());

        manager.resume();
        assert!(manager.phase().is_gap_waiting());
        manager.advance(Duration::from_secs(60));

        assert!(manager.phase().is_playing());
        let next = manager.live_handle().unwrap();
        assert_ne!(next, id);
        assert_eq!(backend.handle_state(next), Some(HandleState::Playing));
    }

    #[test]
    fn test_track_ending_while_muted_continues_on_unmute() {
        let (mut manager, backend) = manager();
        manager.play(Category::Menu);
        let id = manager.live_handle().unwrap();

        manager.set_muted(true);
        manager.on_track_end(id);
        manager.set_muted(false);
        manager.advance(Duration::from_secs(2));

        let next = manager.live_handle().unwrap();
        assert_eq!(backend.handle_locator(next).as_deref(), Some("menu/menu_1.mp3"));
        assert!(manager.phase().is_playing());
    }

    #[test]
    fn test_rotation_skips_unloadable_track() {
        let mut registry = CategoryRegistry::new();
        registry.replace(
            Category::Custom,
            vec!["custom/a.mp3".to_string(), "custom/b.mp3".to_string(), "custom/c.mp3".to_string()],
        );
        let (mut manager, backend) = manager_with(registry);
        manager.play(Category::Custom);

        let first = manager.live_handle().unwrap();
        let first_locator = backend.handle_locator(first).unwrap();
        let others: Vec<&str> = ["custom/a.mp3", "custom/b.mp3", "custom/c.mp3"]
            .into_iter()
            .filter(|l| *l != first_locator)
            .collect();
        backend.fail_locator(others[0]);

        manager.on_track_end(first);
        manager.advance(Duration::from_secs(2));

        let next = manager.live_handle().unwrap();
        assert_eq!(backend.handle_locator(next).as_deref(), Some(others[1]));
        assert!(manager.phase().is_playing());
    }

    #[test]
    fn test_rotation_falls_back_to_previous_track() {
        let (mut manager, backend) = manager();
        manager.play(AI);
        let first = manager.live_handle().unwrap();
        let first_locator = backend.handle_locator(first).unwrap();
        let other = if first_locator.ends_with("battle_1.mp3") {
            "battle_ai/battle_2.mp3"
        } else {
            "battle_ai/battle_1.mp3"
        };
        backend.fail_locator(other);

        manager.on_track_end(first);
        manager.advance(Duration::from_secs(2));

        let next = manager.live_handle().unwrap();
        assert_eq!(backend.handle_locator(next), Some(first_locator));
    }

    #[test]
    fn test_resume_while_muted_stays_paused() {
        let (mut manager, _backend) = manager();
        manager.play(Category::Menu);
        assert!(manager.toggle_mute());
        manager.resume();
        assert!(manager.phase().is_paused());
        assert!(!manager.toggle_mute());
        assert!(manager.phase().is_playing());
    }

    #[test]
    fn test_play_while_muted_loads_paused() {
        let (mut manager, backend) = manager();
        manager.set_muted(true);
        manager.play(Category::Menu);

        let id = manager.live_handle().unwrap();
        assert!(manager.phase().is_paused());
        assert_eq!(backend.handle_state(id), Some(HandleState::Loaded));

        manager.set_muted(false);
        manager.advance(Duration::from_secs(1));
        assert_eq!(backend.handle_state(id), Some(HandleState::Playing));
        assert_relative_eq!(backend.handle_volume(id).unwrap(), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_set_volume_clamps_and_scales() {
        let (mut manager, backend) = manager();
        manager.play(Category::Menu);
        manager.advance(Duration::from_secs(1));
        let id = manager.live_handle().unwrap();

        manager.set_volume(0.5);
        assert_relative_eq!(manager.loop_volume(), 0.2, epsilon = 1e-6);
        assert_relative_eq!(backend.handle_volume(id).unwrap(), 0.2, epsilon = 1e-6);

        manager.set_volume(7.0);
        assert_eq!(manager.volume(), 1.0);
        manager.set_volume(-1.0);
        assert_eq!(manager.volume(), 0.0);
        manager.set_volume(f32::NAN);
        assert_eq!(manager.volume(), 0.0);
    }

    #[test]
    fn test_set_volume_during_fade_retargets() {
        let (mut manager, backend) = manager();
        manager.play(Category::Menu);
        manager.advance(Duration::from_millis(500));
        manager.set_volume(0.25);
        manager.advance(Duration::from_millis(500));

        let id = manager.live_handle().unwrap();
        assert_relative_eq!(backend.handle_volume(id).unwrap(), 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_stopped_handle_fade_is_cut_by_mute() {
        let (mut manager, backend) = manager();
        manager.play(Category::Menu);
        let id = manager.live_handle().unwrap();
        manager.stop();
        manager.set_muted(true);

        assert_eq!(backend.handle_state(id), Some(HandleState::Stopped));
        assert!(!manager.is_fading_out());
    }

    #[test]
    fn test_failed_load_returns_to_idle() {
        let mut registry = CategoryRegistry::new();
        registry.replace(Category::Custom, vec!["custom/broken.mp3".to_string()]);
        let (mut manager, backend) = manager_with(registry);
        backend.fail_locator("custom/broken.mp3");

        manager.play(Category::Custom);
        assert!(manager.phase().is_idle());
        assert!(backend.live_handles().is_empty());
    }

    #[test]
    fn test_play_for_topic_uses_custom_list_at_call_time() {
        let registry = shared(CategoryRegistry::with_defaults());
        let backend = RecordingBackend::new();
        let mut manager = LoopingTrackManager::with_rng(
            backend.clone(),
            std::sync::Arc::clone(&registry),
            settings(),
            StdRng::seed_from_u64(3),
            Instant::now(),
        );

        registry
            .write()
            .replace(Category::Custom, vec!["custom/late.mp3".to_string()]);
        manager.play_for_topic("Marine Biology");

        let id = manager.live_handle().unwrap();
        assert_eq!(backend.handle_locator(id).as_deref(), Some("custom/late.mp3"));
    }

    #[test]
    fn test_drop_releases_everything() {
        let backend = RecordingBackend::new();
        {
            let mut manager = LoopingTrackManager::with_rng(
                backend.clone(),
                shared(CategoryRegistry::with_defaults()),
                settings(),
                StdRng::seed_from_u64(9),
                Instant::now(),
            );
            manager.play(Category::Menu);
        }
        assert!(backend.live_handles().is_empty());
    }
}
