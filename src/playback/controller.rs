use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::{PlayQueue, PlaybackManager};
use crate::config::AppConfig;
use crate::errors::PlayerError;
use crate::models::{MediaItem, MediaType, PlayOptions, RepeatMode, StreamType};
use crate::players::{MediaPlayer, PlayerEvent, PlayerRegistry, PlayerState};

/// Pressing previous further in than this restarts the item instead.
const RESTART_THRESHOLD_MS: f64 = 5000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    Auto,
    Cover,
    Fill,
}

impl AspectRatio {
    pub fn next(self) -> Self {
        match self {
            AspectRatio::Auto => AspectRatio::Cover,
            AspectRatio::Cover => AspectRatio::Fill,
            AspectRatio::Fill => AspectRatio::Auto,
        }
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        AspectRatio::Auto
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DisplayState {
    pub aspect_ratio: AspectRatio,
    pub fullscreen: bool,
    pub mirroring: bool,
    pub audio_stream_index: Option<u32>,
    pub subtitle_stream_index: Option<u32>,
}

struct ControllerInner {
    registry: Arc<PlayerRegistry>,
    active: Mutex<Option<Arc<dyn MediaPlayer>>>,
    queue: Mutex<PlayQueue>,
    /// The request the queue was built from.
    request: Mutex<Option<PlayOptions>>,
    /// Serialises ownership changes between players.
    transfer: tokio::sync::Mutex<()>,
    /// Bumped by every stop. Transfers that began earlier give up.
    stops: AtomicU64,
    watcher: Mutex<Option<JoinHandle<()>>>,
    display: Mutex<DisplayState>,
    fast_forward_ms: f64,
    rewind_ms: f64,
}

/// Picks a player per request and forwards transport commands to whichever
/// player is active.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<ControllerInner>,
}

impl PlaybackController {
    pub fn new(registry: Arc<PlayerRegistry>, config: &AppConfig) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                registry,
                active: Mutex::new(None),
                queue: Mutex::new(PlayQueue::new()),
                request: Mutex::new(None),
                transfer: tokio::sync::Mutex::new(()),
                stops: AtomicU64::new(0),
                watcher: Mutex::new(None),
                display: Mutex::new(DisplayState::default()),
                fast_forward_ms: config.fast_forward_ms as f64,
                rewind_ms: config.rewind_ms as f64,
            }),
        }
    }

    fn from_weak(inner: &Weak<ControllerInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub fn registry(&self) -> Arc<PlayerRegistry> {
        self.inner.registry.clone()
    }

    pub fn active_player(&self) -> Option<Arc<dyn MediaPlayer>> {
        self.inner.active.lock().clone()
    }

    pub fn current_item(&self) -> Option<MediaItem> {
        self.inner.queue.lock().get_current_item()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.inner.queue.lock().repeat
    }

    pub fn display_state(&self) -> DisplayState {
        self.inner.display.lock().clone()
    }

    /// Starts a new request, replacing the queue.
    pub async fn play(&self, request: PlayOptions) -> Result<(), PlayerError> {
        let generation = self.inner.stops.load(Ordering::SeqCst);
        let _transfer = self.inner.transfer.lock().await;
        self.ensure_not_stopped(generation)?;

        let item = request
            .first_item()
            .cloned()
            .ok_or_else(|| PlayerError::NoCompatiblePlayer("empty request".to_string()))?;
        let player = self.select_player(&item).await?;

        self.inner
            .queue
            .lock()
            .set_items(request.items.clone(), request.start_index);
        *self.inner.request.lock() = Some(request.clone());

        self.start(player, request, generation).await
    }

    /// Plays whatever the queue currently points at.
    async fn play_current_item(&self) -> Result<(), PlayerError> {
        let generation = self.inner.stops.load(Ordering::SeqCst);
        let _transfer = self.inner.transfer.lock().await;
        self.ensure_not_stopped(generation)?;

        let (item, request) = {
            let queue = self.inner.queue.lock();
            let item = queue
                .get_current_item()
                .ok_or_else(|| PlayerError::Internal("queue is empty".to_string()))?;
            let mut request = PlayOptions {
                items: queue.items().to_vec(),
                start_index: queue.current_index().unwrap_or(0),
                ..Default::default()
            };

            // Stream details only describe the item they were requested for
            if let Some(original) = self.inner.request.lock().as_ref() {
                if original.first_item().map(|i| &i.id) == Some(&item.id) {
                    request.url = original.url.clone();
                    request.media_source = original.media_source.clone();
                }
            }
            (item, request)
        };

        let player = self.select_player(&item).await?;
        self.start(player, request, generation).await
    }

    fn ensure_not_stopped(&self, generation: u64) -> Result<(), PlayerError> {
        if self.inner.stops.load(Ordering::SeqCst) == generation {
            Ok(())
        } else {
            Err(PlayerError::Cancelled)
        }
    }

    async fn select_player(&self, item: &MediaItem) -> Result<Arc<dyn MediaPlayer>, PlayerError> {
        let media_type = item.media_type.clone().unwrap_or(MediaType::Unknown);
        self.inner
            .registry
            .select_player(&media_type, item)
            .await
            .ok_or_else(|| PlayerError::NoCompatiblePlayer(format!("{} ({})", item.id, media_type)))
    }

    async fn start(
        &self,
        player: Arc<dyn MediaPlayer>,
        request: PlayOptions,
        generation: u64,
    ) -> Result<(), PlayerError> {
        let previous = self.inner.active.lock().take();
        if let Some(previous) = previous {
            if previous.id() != player.id() {
                log::info!(
                    "[PlaybackController] Stopping {} before handing over to {}",
                    previous.id(),
                    player.id()
                );
                previous.stop(true).await;
            }
        }

        {
            let mut display = self.inner.display.lock();
            let source = request.media_source.as_ref();
            display.audio_stream_index = source.and_then(|s| {
                s.default_audio_stream_index
                    .or_else(|| s.stream_indexes(StreamType::Audio).first().copied())
            });
            display.subtitle_stream_index = None;
        }

        *self.inner.active.lock() = Some(player.clone());
        self.watch(&player);

        log::info!("[PlaybackController] Playing with {}", player.id());
        let result = match self.ensure_not_stopped(generation) {
            Ok(()) => player.play(request).await,
            Err(e) => Err(e),
        };

        // A stop that landed after the player finished loading
        let result = match result.and_then(|()| self.ensure_not_stopped(generation)) {
            Err(PlayerError::Cancelled) if player.state() != PlayerState::Idle => {
                player.stop(true).await;
                Err(PlayerError::Cancelled)
            }
            result => result,
        };

        if let Err(e) = result {
            match &e {
                PlayerError::Cancelled => {
                    log::info!("[PlaybackController] {} was stopped while loading", player.id())
                }
                _ => log::error!("[PlaybackController] {} failed to play: {}", player.id(), e),
            }
            let mut active = self.inner.active.lock();
            if active.as_ref().is_some_and(|a| Arc::ptr_eq(a, &player)) {
                active.take();
            }
            return Err(e);
        }
        Ok(())
    }

    /// Follows the active player's events until it is replaced.
    fn watch(&self, player: &Arc<dyn MediaPlayer>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let mut events = player.subscribe();
        let player_id = player.id().to_string();
        let controller = Arc::downgrade(&self.inner);

        let task = runtime.spawn(async move {
            loop {
                match events.recv().await {
                    Ok(PlayerEvent::Ended) => {
                        if let Some(controller) = Self::from_weak(&controller) {
                            controller.on_ended();
                        }
                    }
                    Ok(PlayerEvent::Error(kind)) => {
                        log::error!("[PlaybackController] {} reported {}", player_id, kind);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!(
                            "[PlaybackController] Missed {} events from {}",
                            skipped,
                            player_id
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = self.inner.watcher.lock().replace(task) {
            previous.abort();
        }
    }

    fn on_ended(&self) {
        let next = self.inner.queue.lock().get_next_item(false);
        match next {
            Some(item) => {
                log::info!("[PlaybackController] Advancing to {}", item.id);
                let controller = self.clone();
                self.spawn("advance", async move { controller.play_current_item().await });
            }
            None => log::info!("[PlaybackController] Reached the end of the queue"),
        }
    }

    /// Stops the active player and forgets it. A load in flight is cancelled
    /// rather than waited for.
    pub async fn stop_playback(&self) {
        self.inner.stops.fetch_add(1, Ordering::SeqCst);

        // The loading player is still inside `transfer`
        let loading = self.inner.active.lock().take();
        if let Some(player) = loading {
            log::info!("[PlaybackController] Stopping {}", player.id());
            player.stop(true).await;
        }

        let _transfer = self.inner.transfer.lock().await;

        if let Some(task) = self.inner.watcher.lock().take() {
            task.abort();
        }
        let active = self.inner.active.lock().take();
        if let Some(player) = active {
            log::info!("[PlaybackController] Stopping {}", player.id());
            player.stop(true).await;
        }
    }

    fn spawn<F>(&self, what: &'static str, work: F)
    where
        F: Future<Output = Result<(), PlayerError>> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = work.await {
                        log::error!("[PlaybackController] {} failed: {}", what, e);
                    }
                });
            }
            Err(_) => log::warn!("[PlaybackController] No runtime to run {}", what),
        }
    }

    fn skip(&self, item: Option<MediaItem>) {
        if item.is_none() {
            log::debug!("[PlaybackController] Nothing to skip to");
            return;
        }
        let controller = self.clone();
        self.spawn("skip", async move { controller.play_current_item().await });
    }

    fn with_active(&self, f: impl FnOnce(&dyn MediaPlayer)) {
        let active = self.active_player();
        match active {
            Some(player) => f(player.as_ref()),
            None => log::debug!("[PlaybackController] No active player"),
        }
    }

    fn seek_by(&self, delta_ms: f64) {
        self.with_active(|player| {
            if !player.seekable() {
                return;
            }
            let mut target = (player.current_time() + delta_ms).max(0.0);
            if let Some(duration) = player.duration() {
                target = target.min(duration);
            }
            player.set_current_time(target);
        });
    }

    fn cycle_stream(&self, stream_type: StreamType) -> Option<Vec<u32>> {
        let streams = self
            .inner
            .request
            .lock()
            .as_ref()
            .and_then(|r| r.media_source.as_ref())
            .map(|s| s.stream_indexes(stream_type))
            .unwrap_or_default();
        (!streams.is_empty()).then_some(streams)
    }
}

impl PlaybackManager for PlaybackController {
    fn next_track(&self) {
        let next = self.inner.queue.lock().get_next_item(true);
        self.skip(next);
    }

    fn previous_track(&self) {
        if let Some(player) = self.active_player() {
            if player.seekable() && player.current_time() >= RESTART_THRESHOLD_MS {
                player.set_current_time(0.0);
                return;
            }
        }
        let previous = self.inner.queue.lock().get_prev_item();
        self.skip(previous);
    }

    fn next_chapter(&self) {
        self.with_active(|player| player.next_chapter());
    }

    fn previous_chapter(&self) {
        self.with_active(|player| player.previous_chapter());
    }

    fn channel_up(&self) {
        self.next_track();
    }

    fn channel_down(&self) {
        self.previous_track();
    }

    fn pause(&self) {
        self.with_active(|player| player.pause());
    }

    fn unpause(&self) {
        self.with_active(|player| player.unpause());
    }

    fn play_pause(&self) {
        self.with_active(|player| {
            if player.paused() {
                player.unpause();
            } else {
                player.pause();
            }
        });
    }

    fn stop(&self) {
        let controller = self.clone();
        self.spawn("stop", async move {
            controller.stop_playback().await;
            Ok(())
        });
    }

    fn set_mute(&self, mute: bool) {
        self.with_active(|player| player.set_mute(mute));
    }

    fn toggle_mute(&self) {
        self.with_active(|player| player.set_mute(!player.is_muted()));
    }

    fn volume_up(&self) {
        self.with_active(|player| player.volume_up());
    }

    fn volume_down(&self) {
        self.with_active(|player| player.volume_down());
    }

    fn fast_forward(&self) {
        self.seek_by(self.inner.fast_forward_ms);
    }

    fn rewind(&self) {
        self.seek_by(-self.inner.rewind_ms);
    }

    fn toggle_aspect_ratio(&self) {
        let mut display = self.inner.display.lock();
        display.aspect_ratio = display.aspect_ratio.next();
        log::info!("[PlaybackController] Aspect ratio: {:?}", display.aspect_ratio);
    }

    fn change_audio_stream(&self) {
        let Some(streams) = self.cycle_stream(StreamType::Audio) else {
            log::debug!("[PlaybackController] No audio streams to switch between");
            return;
        };

        let mut display = self.inner.display.lock();
        let next = display
            .audio_stream_index
            .and_then(|current| streams.iter().position(|i| *i == current))
            .map_or(0, |pos| (pos + 1) % streams.len());
        display.audio_stream_index = Some(streams[next]);
        log::info!("[PlaybackController] Audio stream {}", streams[next]);
    }

    fn change_subtitle_stream(&self) {
        let Some(streams) = self.cycle_stream(StreamType::Subtitle) else {
            log::debug!("[PlaybackController] No subtitle streams to switch between");
            return;
        };

        // Off, then each subtitle stream in turn, then off again
        let mut display = self.inner.display.lock();
        display.subtitle_stream_index = match display.subtitle_stream_index {
            None => streams.first().copied(),
            Some(current) => streams
                .iter()
                .position(|i| *i == current)
                .and_then(|pos| streams.get(pos + 1).copied()),
        };
        log::info!("[PlaybackController] Subtitle stream {:?}", display.subtitle_stream_index);
    }

    fn toggle_fullscreen(&self) {
        let mut display = self.inner.display.lock();
        display.fullscreen = !display.fullscreen;
    }

    fn enable_display_mirroring(&self, enabled: bool) {
        self.inner.display.lock().mirroring = enabled;
    }

    fn toggle_display_mirroring(&self) {
        let mut display = self.inner.display.lock();
        display.mirroring = !display.mirroring;
    }

    fn set_repeat_mode(&self, mode: RepeatMode) {
        log::info!("[PlaybackController] Repeat mode: {:?}", mode);
        self.inner.queue.lock().repeat = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::headless::{
        HeadlessBookRenderer, HeadlessDialogs, HeadlessElementHost, HeadlessMediaElement,
    };
    use crate::models::{MediaSource, MediaStream};
    use crate::players::audio::AUDIO_PLAYER_ID;
    use crate::players::book::{
        BookLayout, BookPlayerOptions, BookRenderer, RenderOptions, Rendition, BOOK_PLAYER_ID,
    };
    use crate::players::media_element::MediaElement;
    use crate::players::{AudioPlayer, BookPlayer, ResourceSlot};
    use crate::settings::Settings;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Fixture {
        controller: PlaybackController,
        element: Arc<HeadlessMediaElement>,
        slot: Arc<ResourceSlot>,
        audio: Arc<AudioPlayer>,
    }

    /// Holds `open` until released.
    struct GatedRenderer {
        inner: HeadlessBookRenderer,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl BookRenderer for GatedRenderer {
        async fn open(
            &self,
            url: &str,
            options: RenderOptions,
        ) -> anyhow::Result<Arc<dyn Rendition>> {
            self.gate.notified().await;
            self.inner.open(url, options).await
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(HeadlessBookRenderer::new(10))).await
    }

    async fn fixture_with(renderer: Arc<dyn BookRenderer>) -> Fixture {
        let config = AppConfig::default();
        let slot = Arc::new(ResourceSlot::new());
        let element = Arc::new(HeadlessMediaElement::new());
        let audio = Arc::new(AudioPlayer::new(
            Arc::new(HeadlessElementHost::new(element.clone())),
            slot.clone(),
            Arc::new(Settings::in_memory()),
            false,
        ));
        let book = BookPlayer::new(
            Arc::new(HeadlessDialogs::new()),
            renderer,
            slot.clone(),
            BookPlayerOptions {
                server_url: config.server_url.clone(),
                location_chars: config.book_location_chars,
                layout: BookLayout::Paginated,
            },
        );

        let registry = Arc::new(PlayerRegistry::new());
        registry.register_player(audio.clone()).await;
        registry.register_player(book).await;

        Fixture {
            controller: PlaybackController::new(registry, &config),
            element,
            slot,
            audio,
        }
    }

    fn songs(count: usize) -> PlayOptions {
        PlayOptions {
            items: (1..=count)
                .map(|i| {
                    MediaItem::new(i.to_string(), MediaType::Audio)
                        .with_path(format!("/music/{}.flac", i))
                })
                .collect(),
            ..Default::default()
        }
    }

    fn book() -> PlayOptions {
        PlayOptions::for_item(MediaItem::new("b", MediaType::Book).with_path("/books/book.epub"))
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("condition never became true");
    }

    #[tokio::test]
    async fn test_epub_goes_to_book_player_not_audio() {
        let f = fixture().await;
        let epub = MediaItem::new("b", MediaType::Book).with_path("/books/book.epub");
        let registry = f.controller.registry();

        let chosen = registry.select_player(&MediaType::Book, &epub).await.unwrap();
        assert_eq!(chosen.id(), BOOK_PLAYER_ID);
        let audio = registry.get_player(AUDIO_PLAYER_ID).await.unwrap();
        assert!(!audio.can_play_media_type(&MediaType::Book));
    }

    #[tokio::test]
    async fn test_unplayable_request_is_rejected() {
        let f = fixture().await;
        let pdf = PlayOptions::for_item(
            MediaItem::new("x", MediaType::Book).with_path("/books/x.pdf"),
        );

        let result = f.controller.play(pdf).await;
        assert!(matches!(result, Err(PlayerError::NoCompatiblePlayer(_))));
        assert!(matches!(
            f.controller.play(PlayOptions::default()).await,
            Err(PlayerError::NoCompatiblePlayer(_))
        ));
        assert!(f.controller.active_player().is_none());
    }

    #[tokio::test]
    async fn test_switching_players_stops_previous_first() {
        let f = fixture().await;
        f.controller.play(songs(1)).await.unwrap();
        assert_eq!(f.slot.owner().as_deref(), Some(AUDIO_PLAYER_ID));

        f.controller.play(book()).await.unwrap();

        assert_eq!(f.audio.state(), PlayerState::Idle);
        assert_eq!(f.element.src(), None);
        assert_eq!(f.slot.owner().as_deref(), Some(BOOK_PLAYER_ID));
        assert_eq!(
            f.controller.active_player().map(|p| p.id().to_string()),
            Some(BOOK_PLAYER_ID.into())
        );
    }

    #[tokio::test]
    async fn test_slot_rejects_second_owner() {
        let f = fixture().await;
        f.controller.play(songs(1)).await.unwrap();

        let book_player = f.controller.registry().get_player(BOOK_PLAYER_ID).await.unwrap();
        let result = book_player.play(book()).await;

        assert_eq!(result, Err(PlayerError::SlotBusy(AUDIO_PLAYER_ID.to_string())));
        assert_eq!(book_player.state(), PlayerState::Idle);
    }

    #[tokio::test]
    async fn test_volume_up_twice_through_manager() {
        let f = fixture().await;
        f.controller.play(songs(1)).await.unwrap();
        f.audio.set_volume(50);

        f.controller.volume_up();
        f.controller.volume_up();
        assert_eq!(f.audio.volume(), 54);

        f.audio.set_volume(99);
        f.controller.volume_up();
        assert_eq!(f.audio.volume(), 100);
    }

    #[tokio::test]
    async fn test_transport_without_player_is_harmless() {
        let f = fixture().await;
        f.controller.pause();
        f.controller.volume_up();
        f.controller.fast_forward();
        f.controller.next_track();
        f.controller.stop_playback().await;
        f.controller.stop_playback().await;
        assert!(f.controller.active_player().is_none());
    }

    #[tokio::test]
    async fn test_seek_steps_are_clamped() {
        let f = fixture().await;
        f.controller.play(songs(1)).await.unwrap();

        f.controller.fast_forward();
        assert_eq!(f.audio.current_time(), 30_000.0);
        f.controller.rewind();
        assert_eq!(f.audio.current_time(), 20_000.0);
        f.controller.rewind();
        f.controller.rewind();
        assert_eq!(f.audio.current_time(), 0.0);
    }

    #[tokio::test]
    async fn test_play_pause_toggles() {
        let f = fixture().await;
        f.controller.play(songs(1)).await.unwrap();

        f.controller.play_pause();
        assert!(f.audio.paused());
        f.controller.play_pause();
        assert!(!f.audio.paused());
    }

    #[tokio::test]
    async fn test_ended_advances_queue() {
        let f = fixture().await;
        f.controller.play(songs(2)).await.unwrap();
        assert_eq!(f.audio.current_src().as_deref(), Some("/music/1.flac"));

        f.element.finish();

        wait_for(|| f.audio.current_src().as_deref() == Some("/music/2.flac")).await;
        assert_eq!(f.controller.current_item().map(|i| i.id), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_repeat_one_replays_on_end() {
        let f = fixture().await;
        f.controller.set_repeat_mode(RepeatMode::RepeatOne);
        f.controller.play(songs(2)).await.unwrap();
        assert_eq!(f.controller.repeat_mode(), RepeatMode::RepeatOne);

        f.element.finish();

        wait_for(|| f.audio.current_src().is_some()).await;
        assert_eq!(f.controller.current_item().map(|i| i.id), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_previous_restarts_after_threshold() {
        let f = fixture().await;
        let mut request = songs(2);
        request.start_index = 1;
        f.controller.play(request).await.unwrap();

        f.audio.set_current_time(8000.0);
        f.controller.previous_track();
        assert_eq!(f.audio.current_time(), 0.0);
        assert_eq!(f.controller.current_item().map(|i| i.id), Some("2".to_string()));

        f.controller.previous_track();
        wait_for(|| f.audio.current_src().as_deref() == Some("/music/1.flac")).await;
    }

    #[tokio::test]
    async fn test_manager_stop_runs_in_background() {
        let f = fixture().await;
        f.controller.play(songs(1)).await.unwrap();

        PlaybackManager::stop(&f.controller);

        wait_for(|| f.slot.owner().is_none()).await;
        assert_eq!(f.audio.state(), PlayerState::Idle);
    }

    #[tokio::test]
    async fn test_manager_stop_cancels_a_load_in_flight() {
        let gate = Arc::new(Notify::new());
        let f = fixture_with(Arc::new(GatedRenderer {
            inner: HeadlessBookRenderer::new(10),
            gate: gate.clone(),
        }))
        .await;
        let book_player = f.controller.registry().get_player(BOOK_PLAYER_ID).await.unwrap();

        let loading = tokio::spawn({
            let controller = f.controller.clone();
            async move { controller.play(book()).await }
        });
        wait_for(|| book_player.state() == PlayerState::Loading).await;

        PlaybackManager::stop(&f.controller);
        wait_for(|| book_player.state() == PlayerState::Idle).await;
        gate.notify_one();

        assert_eq!(loading.await.unwrap(), Err(PlayerError::Cancelled));
        assert_eq!(book_player.state(), PlayerState::Idle);
        assert!(f.controller.active_player().is_none());
        assert_eq!(f.slot.owner(), None);
    }

    #[tokio::test]
    async fn test_stop_before_a_queued_play_cancels_it() {
        let f = fixture().await;
        let transfer = f.controller.inner.transfer.lock().await;

        let queued = tokio::spawn({
            let controller = f.controller.clone();
            async move { controller.play(songs(1)).await }
        });
        tokio::task::yield_now().await;
        let stopping = tokio::spawn({
            let controller = f.controller.clone();
            async move { controller.stop_playback().await }
        });
        tokio::task::yield_now().await;
        drop(transfer);

        assert_eq!(queued.await.unwrap(), Err(PlayerError::Cancelled));
        stopping.await.unwrap();
        assert_eq!(f.audio.state(), PlayerState::Idle);
        assert_eq!(f.slot.owner(), None);
    }

    #[tokio::test]
    async fn test_display_state_cycles() {
        let f = fixture().await;
        let source = MediaSource {
            media_streams: vec![
                MediaStream { index: 1, stream_type: StreamType::Audio, language: None },
                MediaStream { index: 2, stream_type: StreamType::Audio, language: None },
                MediaStream { index: 3, stream_type: StreamType::Subtitle, language: None },
            ],
            ..Default::default()
        };
        let request = PlayOptions {
            media_source: Some(source),
            ..songs(1)
        };
        f.controller.play(request).await.unwrap();

        f.controller.toggle_aspect_ratio();
        f.controller.toggle_aspect_ratio();
        f.controller.toggle_display_mirroring();
        f.controller.toggle_fullscreen();
        f.controller.change_audio_stream();
        f.controller.change_subtitle_stream();

        let display = f.controller.display_state();
        assert_eq!(display.aspect_ratio, AspectRatio::Fill);
        assert!(display.mirroring);
        assert!(display.fullscreen);
        assert_eq!(display.audio_stream_index, Some(2));
        assert_eq!(display.subtitle_stream_index, Some(3));

        f.controller.toggle_aspect_ratio();
        f.controller.change_audio_stream();
        f.controller.change_subtitle_stream();
        let display = f.controller.display_state();
        assert_eq!(display.aspect_ratio, AspectRatio::Auto);
        assert_eq!(display.audio_stream_index, Some(1));
        assert_eq!(display.subtitle_stream_index, None);
    }
}
