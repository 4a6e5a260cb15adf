use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::slideshow::{Slideshow, SlideshowOptions};
use super::{Lifecycle, MediaPlayer, PlayerEvent, PlayerEvents, PlayerState, ResourceSlot};
use crate::errors::PlayerError;
use crate::host::{on_dismissed, DialogHost, ElementId};
use crate::input::CommandListeners;
use crate::models::{MediaItem, MediaType, PlayOptions};

pub const PHOTO_PLAYER_ID: &str = "photoplayer";

pub struct PhotoPlayer {
    me: Weak<PhotoPlayer>,
    dialogs: Arc<dyn DialogHost>,
    listeners: Arc<CommandListeners>,
    slot: Arc<ResourceSlot>,
    interval_ms: u64,
    osd_hide_delay_ms: u64,
    lifecycle: Lifecycle,
    events: PlayerEvents,
    slideshow: Mutex<Option<Arc<Slideshow>>>,
    dismiss_watch: Mutex<Option<JoinHandle<()>>>,
}

impl PhotoPlayer {
    pub fn new(
        dialogs: Arc<dyn DialogHost>,
        listeners: Arc<CommandListeners>,
        slot: Arc<ResourceSlot>,
        interval_ms: u64,
        osd_hide_delay_ms: u64,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            dialogs,
            listeners,
            slot,
            interval_ms,
            osd_hide_delay_ms,
            lifecycle: Lifecycle::new("PhotoPlayer"),
            events: PlayerEvents::new(),
            slideshow: Mutex::new(None),
            dismiss_watch: Mutex::new(None),
        })
    }

    pub fn slideshow(&self) -> Option<Arc<Slideshow>> {
        self.slideshow.lock().clone()
    }

    fn watch_dismissal(&self, dismissed: broadcast::Receiver<ElementId>, slideshow: &Slideshow) {
        let Some(dialog) = slideshow.dialog() else {
            return;
        };

        let player = self.me.clone();
        let watch = on_dismissed(dismissed, dialog, move || async move {
            if let Some(player) = player.upgrade() {
                log::info!("[PhotoPlayer] Slideshow closed by the user");
                player.dismiss_watch.lock().take();
                player.stop(false).await;
            }
        });
        if let Some(previous) = std::mem::replace(&mut *self.dismiss_watch.lock(), watch) {
            previous.abort();
        }
    }
}

#[async_trait]
impl MediaPlayer for PhotoPlayer {
    fn id(&self) -> &str {
        PHOTO_PLAYER_ID
    }

    fn name(&self) -> &str {
        "Photo Player"
    }

    fn priority(&self) -> i32 {
        1
    }

    fn can_play_media_type(&self, media_type: &MediaType) -> bool {
        *media_type == MediaType::Photo
    }

    async fn play(&self, options: PlayOptions) -> Result<(), PlayerError> {
        if options.items.is_empty() {
            return Err(PlayerError::Load("no photos to show".to_string()));
        }

        self.slot.acquire(PHOTO_PLAYER_ID)?;
        let token = self.lifecycle.begin_load();

        let slideshow = Arc::new(Slideshow::new(
            self.dialogs.clone(),
            self.listeners.clone(),
            SlideshowOptions {
                items: options.items,
                start_index: options.start_index,
                interval_ms: self.interval_ms,
                osd_hide_delay_ms: self.osd_hide_delay_ms,
                // Opens on the chosen photo; play starts the timer
                autoplay: false,
            },
        ));
        let previous = self.slideshow.lock().replace(slideshow.clone());
        if let Some(previous) = previous {
            previous.hide().await;
        }

        let dismissed = self.dialogs.dismissed();
        slideshow.show().await;
        if let Err(e) = self.lifecycle.commit(&token, PlayerState::Playing) {
            slideshow.hide().await;
            return Err(e);
        }
        self.watch_dismissal(dismissed, &slideshow);

        self.events.emit(PlayerEvent::Playing);
        Ok(())
    }

    async fn stop(&self, _destroy_player: bool) {
        self.lifecycle.stop();
        if let Some(watch) = self.dismiss_watch.lock().take() {
            watch.abort();
        }

        let slideshow = self.slideshow.lock().take();
        if let Some(slideshow) = slideshow {
            slideshow.hide().await;
            self.events.emit(PlayerEvent::Stopped);
        }
        self.slot.release(PHOTO_PLAYER_ID);
    }

    fn state(&self) -> PlayerState {
        self.lifecycle.state()
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    fn current_item(&self) -> Option<MediaItem> {
        self.slideshow().and_then(|s| s.current_item().cloned())
    }

    fn pause(&self) {
        if self.lifecycle.transition(PlayerState::Paused) {
            if let Some(slideshow) = self.slideshow() {
                slideshow.pause();
            }
            self.events.emit(PlayerEvent::Pause);
        }
    }

    fn unpause(&self) {
        if self.lifecycle.transition(PlayerState::Playing) {
            if let Some(slideshow) = self.slideshow() {
                slideshow.play();
            }
            self.events.emit(PlayerEvent::Unpause);
        }
    }

    fn paused(&self) -> bool {
        self.lifecycle.is_active() && self.slideshow().is_some_and(|s| !s.is_autoplaying())
    }

    fn next_chapter(&self) {
        if let Some(slideshow) = self.slideshow() {
            slideshow.next();
        }
    }

    fn previous_chapter(&self) {
        if let Some(slideshow) = self.slideshow() {
            slideshow.previous();
        }
    }
}
