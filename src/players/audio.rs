use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::media_element::{media_error_kind, ElementEvent, MediaElement, MediaElementHost};
use super::{
    CancellationToken, Lifecycle, MediaPlayer, PlayerEvent, PlayerEvents, PlayerState,
    ResourceSlot,
};
use crate::errors::PlayerError;
use crate::models::{MediaItem, MediaType, PlayOptions, TimeRange, TICKS_PER_SECOND};
use crate::settings::Settings;

pub const AUDIO_PLAYER_ID: &str = "htmlaudioplayer";

const FADE_STEP: f64 = 0.15;
const FADE_INTERVAL: Duration = Duration::from_millis(100);
/// Treated as silent; absorbs float drift from repeated steps.
const FADE_FLOOR: f64 = 1e-6;

#[derive(Default)]
struct AudioState {
    element: Option<Arc<dyn MediaElement>>,
    current_src: Option<String>,
    current_item: Option<MediaItem>,
    /// Last position reported by the element, in seconds.
    current_time: Option<f64>,
    /// Seconds to seek to on the first `playing` event.
    start_position: f64,
    started: bool,
    fading_out: bool,
}

/// State shared with the element's event handler.
struct AudioShared {
    lifecycle: Lifecycle,
    events: PlayerEvents,
    settings: Arc<Settings>,
    state: Mutex<AudioState>,
}

impl AudioShared {
    fn element(&self) -> Option<Arc<dyn MediaElement>> {
        self.state.lock().element.clone()
    }

    fn handle_element_event(&self, event: ElementEvent) {
        let Some(element) = self.element() else {
            return;
        };

        match event {
            ElementEvent::TimeUpdate => {
                let mut state = self.state.lock();
                if state.fading_out {
                    return;
                }
                state.current_time = Some(element.current_time());
                drop(state);
                self.events.emit(PlayerEvent::TimeUpdate);
            }
            ElementEvent::VolumeChange => {
                if self.state.lock().fading_out {
                    return;
                }
                self.settings.save_volume(element.volume());
                self.events.emit(PlayerEvent::VolumeChange);
            }
            ElementEvent::Playing => {
                let seek_to = {
                    let mut state = self.state.lock();
                    if state.started {
                        None
                    } else {
                        state.started = true;
                        Some(state.start_position)
                    }
                };

                // Some platforms ignore the `#t=` fragment
                if let Some(seconds) = seek_to {
                    if seconds > 0.0 && element.current_time() == 0.0 {
                        log::debug!("[AudioPlayer] Seeking to start position {}s", seconds);
                        element.set_current_time(seconds);
                    }
                }

                self.lifecycle.transition(PlayerState::Playing);
                self.events.emit(PlayerEvent::Playing);
            }
            ElementEvent::Play => {
                self.lifecycle.transition(PlayerState::Playing);
                self.events.emit(PlayerEvent::Unpause);
            }
            ElementEvent::Pause => {
                self.lifecycle.transition(PlayerState::Paused);
                self.events.emit(PlayerEvent::Pause);
            }
            ElementEvent::Waiting => self.events.emit(PlayerEvent::Waiting),
            ElementEvent::Ended => {
                self.reset_src(&element);
                self.lifecycle.transition(PlayerState::Ready);
                self.events.emit(PlayerEvent::Ended);
            }
            ElementEvent::Error { code, message } => match media_error_kind(code) {
                Some(kind) => {
                    log::error!(
                        "[AudioPlayer] Media element error {}: {} ({})",
                        code,
                        kind,
                        message
                    );
                    self.events.emit(PlayerEvent::Error(kind));
                }
                None => log::debug!("[AudioPlayer] Ignoring media error {}: {}", code, message),
            },
        }
    }

    /// Forgets the source. Returns false if there was none.
    fn reset_src(&self, element: &Arc<dyn MediaElement>) -> bool {
        let had_src = {
            let mut state = self.state.lock();
            state.current_time = None;
            state.current_src.take().is_some()
        };
        if had_src {
            element.clear_src();
        }
        had_src
    }
}

/// Plays audio through a single native element provided by the shell.
pub struct AudioPlayer {
    host: Arc<dyn MediaElementHost>,
    slot: Arc<ResourceSlot>,
    enable_fade_out: bool,
    shared: Arc<AudioShared>,
}

impl AudioPlayer {
    pub fn new(
        host: Arc<dyn MediaElementHost>,
        slot: Arc<ResourceSlot>,
        settings: Arc<Settings>,
        enable_fade_out: bool,
    ) -> Self {
        Self {
            host,
            slot,
            enable_fade_out,
            shared: Arc::new(AudioShared {
                lifecycle: Lifecycle::new("AudioPlayer"),
                events: PlayerEvents::new(),
                settings,
                state: Mutex::new(AudioState::default()),
            }),
        }
    }

    /// Reuses the element from an earlier `play()` unless it was destroyed.
    fn create_media_element(&self) -> Arc<dyn MediaElement> {
        if let Some(element) = self.shared.element() {
            return element;
        }

        let element = self.host.audio_element();
        element.set_volume(self.shared.settings.saved_volume());

        let shared = Arc::downgrade(&self.shared);
        element.attach_handler(Arc::new(move |event| {
            if let Some(shared) = shared.upgrade() {
                shared.handle_element_event(event);
            }
        }));

        self.shared.state.lock().element = Some(element.clone());
        element
    }

    async fn load(
        &self,
        element: &Arc<dyn MediaElement>,
        options: &PlayOptions,
        token: &CancellationToken,
    ) -> Result<(), PlayerError> {
        let item = options.first_item().cloned();
        let base = options
            .url
            .clone()
            .or_else(|| item.as_ref().and_then(|i| i.path.clone()))
            .ok_or_else(|| PlayerError::Load("no stream url".to_string()))?;

        let seconds = options.start_position_seconds();
        let src = if seconds > 0.0 {
            format!("{}#t={}", base, seconds)
        } else {
            base
        };

        {
            let mut state = self.shared.state.lock();
            state.started = false;
            state.current_time = None;
            state.start_position = seconds;
            state.current_item = item;
        }

        let cross_origin = options.media_source.as_ref().and_then(|s| s.cross_origin.clone());
        element.set_cross_origin(cross_origin);

        log::info!("[AudioPlayer] Loading {}", src);
        element.load(&src).await?;
        if let Err(e) = token.check() {
            // Stopped mid-load; a newer load may already own the element
            if element.src().as_deref() == Some(src.as_str()) {
                element.clear_src();
            }
            return Err(e);
        }

        self.shared.state.lock().current_src = Some(src);
        element.play();
        Ok(())
    }

    async fn fade_out(&self, element: &Arc<dyn MediaElement>) {
        self.shared.state.lock().fading_out = true;

        let mut volume = element.volume();
        loop {
            volume -= FADE_STEP;
            if volume <= FADE_FLOOR {
                element.set_volume(0.0);
                break;
            }
            element.set_volume(volume);
            tokio::time::sleep(FADE_INTERVAL).await;
        }

        self.shared.state.lock().fading_out = false;
    }

    fn active_element(&self) -> Option<Arc<dyn MediaElement>> {
        if self.shared.lifecycle.is_active() {
            self.shared.element()
        } else {
            None
        }
    }
}

#[async_trait]
impl MediaPlayer for AudioPlayer {
    fn id(&self) -> &str {
        AUDIO_PLAYER_ID
    }

    fn name(&self) -> &str {
        "Html Audio Player"
    }

    fn priority(&self) -> i32 {
        1
    }

    fn can_play_media_type(&self, media_type: &MediaType) -> bool {
        *media_type == MediaType::Audio
    }

    async fn play(&self, options: PlayOptions) -> Result<(), PlayerError> {
        self.slot.acquire(AUDIO_PLAYER_ID)?;
        let token = self.shared.lifecycle.begin_load();
        let element = self.create_media_element();

        match self.load(&element, &options, &token).await {
            Ok(()) => self.shared.lifecycle.commit(&token, PlayerState::Playing),
            Err(e) => {
                if !token.is_cancelled() {
                    log::error!("[AudioPlayer] Failed to play: {}", e);
                    self.shared.lifecycle.fail(&token);
                    self.shared.reset_src(&element);
                    self.slot.release(AUDIO_PLAYER_ID);
                }
                Err(e)
            }
        }
    }

    async fn stop(&self, destroy_player: bool) {
        self.shared.lifecycle.stop();

        let element = self.shared.element();
        if let Some(element) = element {
            let has_src = self.shared.state.lock().current_src.is_some();
            if has_src {
                if destroy_player && self.enable_fade_out && self.host.supports_fade() {
                    let original = element.volume();
                    self.fade_out(&element).await;
                    element.pause();
                    element.set_volume(original);
                } else {
                    element.pause();
                }

                self.shared.reset_src(&element);
                self.shared.events.emit(PlayerEvent::Stopped);
            }

            if destroy_player {
                element.detach_handler();
                let mut state = self.shared.state.lock();
                state.element = None;
                state.current_item = None;
            }
        }

        self.slot.release(AUDIO_PLAYER_ID);
    }

    fn state(&self) -> PlayerState {
        self.shared.lifecycle.state()
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.shared.events.subscribe()
    }

    fn current_item(&self) -> Option<MediaItem> {
        self.shared.state.lock().current_item.clone()
    }

    fn current_src(&self) -> Option<String> {
        self.shared.state.lock().current_src.clone()
    }

    fn pause(&self) {
        if let Some(element) = self.active_element() {
            element.pause();
        }
    }

    fn unpause(&self) {
        if let Some(element) = self.active_element() {
            element.play();
        }
    }

    fn paused(&self) -> bool {
        self.active_element().is_some_and(|e| e.paused())
    }

    fn set_volume(&self, volume: u32) {
        if let Some(element) = self.active_element() {
            element.set_volume(volume.min(100) as f64 / 100.0);
        }
    }

    fn volume(&self) -> u32 {
        self.active_element()
            .map(|e| ((e.volume() * 100.0).round() as u32).min(100))
            .unwrap_or(0)
    }

    fn set_mute(&self, mute: bool) {
        if let Some(element) = self.active_element() {
            element.set_muted(mute);
        }
    }

    fn is_muted(&self) -> bool {
        self.active_element().is_some_and(|e| e.muted())
    }

    fn current_time(&self) -> f64 {
        let Some(element) = self.active_element() else {
            return 0.0;
        };
        let cached = self.shared.state.lock().current_time;
        cached.unwrap_or_else(|| element.current_time()) * 1000.0
    }

    fn set_current_time(&self, ms: f64) {
        if let Some(element) = self.active_element() {
            element.set_current_time(ms.max(0.0) / 1000.0);
        }
    }

    fn duration(&self) -> Option<f64> {
        self.active_element()
            .and_then(|e| e.duration())
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d * 1000.0)
    }

    fn seekable(&self) -> bool {
        self.active_element()
            .and_then(|e| e.seekable())
            .is_some_and(|range| range.end - range.start > 0.0)
    }

    fn buffered_ranges(&self) -> Vec<TimeRange> {
        let Some(element) = self.active_element() else {
            return Vec::new();
        };
        let ticks = TICKS_PER_SECOND as f64;
        element
            .buffered()
            .into_iter()
            .filter(|r| r.end > r.start)
            .map(|r| TimeRange {
                start: r.start * ticks,
                end: r.end * ticks,
            })
            .collect()
    }

    fn set_playback_rate(&self, rate: f64) {
        if let Some(element) = self.active_element() {
            element.set_playback_rate(rate);
        }
    }

    fn playback_rate(&self) -> Option<f64> {
        self.active_element().map(|e| e.playback_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::headless::{HeadlessElementHost, HeadlessMediaElement};
    use crate::players::MediaErrorKind;
    use tokio::sync::Notify;

    struct Fixture {
        player: AudioPlayer,
        element: Arc<HeadlessMediaElement>,
        slot: Arc<ResourceSlot>,
        settings: Arc<Settings>,
    }

    fn fixture(enable_fade_out: bool) -> Fixture {
        let element = Arc::new(HeadlessMediaElement::new());
        let host = Arc::new(HeadlessElementHost::new(element.clone()));
        let slot = Arc::new(ResourceSlot::new());
        let settings = Arc::new(Settings::in_memory());
        let player = AudioPlayer::new(host, slot.clone(), settings.clone(), enable_fade_out);
        Fixture {
            player,
            element,
            slot,
            settings,
        }
    }

    fn song() -> PlayOptions {
        PlayOptions {
            url: Some("http://server/Audio/1/stream".to_string()),
            ..PlayOptions::for_item(MediaItem::new("1", MediaType::Audio))
        }
    }

    #[tokio::test]
    async fn test_play_sets_src_and_acquires_slot() {
        let f = fixture(false);
        f.player.play(song()).await.unwrap();

        assert_eq!(f.player.state(), PlayerState::Playing);
        assert_eq!(f.player.current_src().as_deref(), Some("http://server/Audio/1/stream"));
        assert_eq!(f.slot.owner().as_deref(), Some(AUDIO_PLAYER_ID));
        assert!(!f.player.paused());
        assert_eq!(f.player.current_item().map(|i| i.id), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_start_position_is_a_time_fragment() {
        let f = fixture(false);
        let options = PlayOptions {
            start_position_ticks: 25 * TICKS_PER_SECOND,
            ..song()
        };
        f.player.play(options).await.unwrap();

        assert_eq!(f.player.current_src().as_deref(), Some("http://server/Audio/1/stream#t=25"));
        assert_eq!(f.player.current_time(), 25_000.0);
    }

    #[tokio::test]
    async fn test_start_position_seeks_when_fragment_ignored() {
        let f = fixture(false);
        f.element.set_honor_time_fragment(false);
        let options = PlayOptions {
            start_position_ticks: 12 * TICKS_PER_SECOND,
            ..song()
        };
        f.player.play(options).await.unwrap();

        assert_eq!(f.element.current_time(), 12.0);
    }

    #[tokio::test]
    async fn test_load_failure_rejects_and_frees_slot() {
        let f = fixture(false);
        f.element.fail_next_load(MediaErrorKind::MediaNotSupported);

        let result = f.player.play(song()).await;

        assert_eq!(result, Err(PlayerError::Media(MediaErrorKind::MediaNotSupported)));
        assert_eq!(f.player.state(), PlayerState::Idle);
        assert_eq!(f.slot.owner(), None);
        assert_eq!(f.player.current_src(), None);
    }

    #[tokio::test]
    async fn test_missing_url_rejects() {
        let f = fixture(false);
        let options = PlayOptions::for_item(MediaItem::new("1", MediaType::Audio));
        let result = f.player.play(options).await;
        assert!(matches!(result, Err(PlayerError::Load(_))));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let f = fixture(false);
        let mut events = f.player.subscribe();
        f.player.play(song()).await.unwrap();

        f.player.stop(false).await;
        f.player.stop(false).await;
        f.player.stop(true).await;

        assert_eq!(f.player.state(), PlayerState::Idle);
        assert_eq!(f.slot.owner(), None);
        assert_eq!(f.element.src(), None);

        let mut stopped = 0;
        while let Ok(event) = events.try_recv() {
            if event == PlayerEvent::Stopped {
                stopped += 1;
            }
        }
        assert_eq!(stopped, 1);
    }

    #[tokio::test]
    async fn test_transport_is_inert_when_idle() {
        let f = fixture(false);
        f.player.set_volume(80);
        f.player.set_current_time(5000.0);

        assert_eq!(f.player.volume(), 0);
        assert_eq!(f.player.current_time(), 0.0);
        assert_eq!(f.player.duration(), None);
        assert!(!f.player.paused());
    }

    #[tokio::test]
    async fn test_volume_steps_are_clamped() {
        let f = fixture(false);
        f.player.play(song()).await.unwrap();

        f.player.set_volume(99);
        f.player.volume_up();
        f.player.volume_up();
        assert_eq!(f.player.volume(), 100);

        f.player.set_volume(1);
        f.player.volume_down();
        assert_eq!(f.player.volume(), 0);
    }

    #[tokio::test]
    async fn test_volume_changes_are_saved() {
        let f = fixture(false);
        f.player.play(song()).await.unwrap();

        f.player.set_volume(30);
        assert_eq!(f.settings.saved_volume(), 0.3);
    }

    #[tokio::test]
    async fn test_new_element_starts_at_saved_volume() {
        let f = fixture(false);
        f.settings.save_volume(0.8);
        f.player.play(song()).await.unwrap();
        assert_eq!(f.player.volume(), 80);
    }

    #[tokio::test]
    async fn test_pause_and_unpause_follow_element_events() {
        let f = fixture(false);
        let mut events = f.player.subscribe();
        f.player.play(song()).await.unwrap();

        f.player.pause();
        assert_eq!(f.player.state(), PlayerState::Paused);
        assert!(f.player.paused());

        f.player.unpause();
        assert_eq!(f.player.state(), PlayerState::Playing);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&PlayerEvent::Pause));
        assert!(seen.contains(&PlayerEvent::Unpause));
    }

    #[tokio::test]
    async fn test_element_errors_are_mapped() {
        let f = fixture(false);
        let mut events = f.player.subscribe();
        f.player.play(song()).await.unwrap();
        while events.try_recv().is_ok() {}

        f.element.raise_error(1);
        f.element.raise_error(3);

        assert_eq!(events.try_recv(), Ok(PlayerEvent::Error(MediaErrorKind::MediaDecodeError)));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_natural_end_clears_src() {
        let f = fixture(false);
        let mut events = f.player.subscribe();
        f.player.play(song()).await.unwrap();

        f.element.finish();

        assert_eq!(f.player.current_src(), None);
        let mut ended = false;
        while let Ok(event) = events.try_recv() {
            ended |= event == PlayerEvent::Ended;
        }
        assert!(ended);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroying_stop_fades_out_and_restores_volume() {
        let f = fixture(true);
        f.settings.save_volume(0.6);
        f.player.play(song()).await.unwrap();

        let started = tokio::time::Instant::now();
        f.player.stop(true).await;

        // 0.6 -> 0.45 -> 0.30 -> 0.15 -> 0.0, sleeping between steps
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert!(f.element.paused());
        assert_eq!(f.element.volume(), 0.6);
        assert_eq!(f.settings.saved_volume(), 0.6);
        assert_eq!(f.slot.owner(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_stop_does_not_fade() {
        let f = fixture(true);
        f.player.play(song()).await.unwrap();

        let started = tokio::time::Instant::now();
        f.player.stop(false).await;

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(f.element.paused());
    }

    #[tokio::test]
    async fn test_stop_before_any_play_is_quiet() {
        let f = fixture(true);
        let mut events = f.player.subscribe();

        f.player.stop(false).await;
        f.player.stop(true).await;

        assert_eq!(f.player.state(), PlayerState::Idle);
        assert_eq!(f.slot.owner(), None);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_during_load_drops_the_source() {
        let f = fixture(false);
        let gate = Arc::new(Notify::new());
        f.element.hold_loads(gate.clone());

        let (result, ()) = tokio::join!(f.player.play(song()), async {
            while f.player.state() != PlayerState::Loading {
                tokio::task::yield_now().await;
            }
            f.player.stop(false).await;
            gate.notify_one();
        });

        assert_eq!(result, Err(PlayerError::Cancelled));
        assert_eq!(f.player.state(), PlayerState::Idle);
        assert_eq!(f.element.src(), None);
        assert_eq!(f.player.current_src(), None);
        assert_eq!(f.slot.owner(), None);
    }
}
