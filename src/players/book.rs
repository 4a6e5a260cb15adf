use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{
    CancellationToken, Lifecycle, MediaPlayer, PlayerEvent, PlayerEvents, PlayerState,
    ResourceSlot,
};
use crate::errors::PlayerError;
use crate::host::{on_dismissed, DialogHost, DialogOptions, ElementId};
use crate::models::{MediaItem, MediaType, PlayOptions, TimeRange, TICKS_PER_SECOND};

pub const BOOK_PLAYER_ID: &str = "bookplayer";

const BOOK_DIALOG_ID: &str = "bookPlayer";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookLayout {
    /// One page at a time.
    #[default]
    Paginated,
    /// Continuous vertical scroll, used on small screens.
    Scrolled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadingDirection {
    Ltr,
    Rtl,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderOptions {
    pub target: ElementId,
    pub layout: BookLayout,
}

/// Parses and paginates e-books.
#[async_trait]
pub trait BookRenderer: Send + Sync {
    async fn open(&self, url: &str, options: RenderOptions) -> anyhow::Result<Arc<dyn Rendition>>;
}

/// An opened book rendered into a dialog. Locations are CFI strings.
#[async_trait]
pub trait Rendition: Send + Sync {
    /// Shows `target`, or the start of the book.
    async fn display(&self, target: Option<&str>) -> anyhow::Result<()>;

    /// Splits the book into locations of `chars` characters each. Required
    /// before any percentage conversion.
    async fn generate_locations(&self, chars: usize) -> anyhow::Result<()>;

    fn cfi_from_percentage(&self, percentage: f64) -> Option<String>;
    fn percentage_from_cfi(&self, cfi: &str) -> f64;

    /// Turns a page and returns the new location.
    fn next(&self) -> Option<String>;
    fn prev(&self) -> Option<String>;

    fn direction(&self) -> ReadingDirection;
    fn set_visible(&self, visible: bool);
    fn destroy(&self);
}

/// Where the client downloads an item's original file from.
pub fn download_url(server_url: &str, item_id: &str) -> String {
    format!(
        "{}/Items/{}/Download",
        server_url.trim_end_matches('/'),
        urlencoding::encode(item_id)
    )
}

#[derive(Default)]
struct BookState {
    dialog: Option<ElementId>,
    rendition: Option<Arc<dyn Rendition>>,
    current_item: Option<MediaItem>,
    current_src: Option<String>,
    /// 0.0 - 1.0
    progress: f64,
    toc_open: bool,
    dismiss_watch: Option<JoinHandle<()>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookPlayerOptions {
    pub server_url: String,
    pub location_chars: usize,
    pub layout: BookLayout,
}

/// Reads EPUB books in a fullscreen dialog.
pub struct BookPlayer {
    me: Weak<BookPlayer>,
    dialogs: Arc<dyn DialogHost>,
    renderer: Arc<dyn BookRenderer>,
    slot: Arc<ResourceSlot>,
    options: BookPlayerOptions,
    lifecycle: Lifecycle,
    events: PlayerEvents,
    state: Mutex<BookState>,
}

impl BookPlayer {
    pub fn new(
        dialogs: Arc<dyn DialogHost>,
        renderer: Arc<dyn BookRenderer>,
        slot: Arc<ResourceSlot>,
        options: BookPlayerOptions,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            dialogs,
            renderer,
            slot,
            options,
            lifecycle: Lifecycle::new("BookPlayer"),
            events: PlayerEvents::new(),
            state: Mutex::new(BookState::default()),
        })
    }

    async fn create_media_element(&self) -> ElementId {
        if let Some(dialog) = self.state.lock().dialog.clone() {
            return dialog;
        }

        let dialog = self.dialogs.create_dialog(DialogOptions {
            id: Some(BOOK_DIALOG_ID.to_string()),
            fullscreen: true,
            auto_focus: false,
            scroll_y: false,
            remove_on_close: true,
        });
        let dismissed = self.dialogs.dismissed();
        self.state.lock().dialog = Some(dialog.clone());
        self.dialogs.open(&dialog).await;

        let player = self.me.clone();
        let watch = on_dismissed(dismissed, dialog.clone(), move || async move {
            if let Some(player) = player.upgrade() {
                log::info!("[BookPlayer] Reader closed by the user");
                // Detach first so stop() doesn't abort this task
                player.state.lock().dismiss_watch.take();
                player.stop(false).await;
            }
        });
        if let Some(previous) = std::mem::replace(&mut self.state.lock().dismiss_watch, watch) {
            previous.abort();
        }
        dialog
    }

    async fn load(
        &self,
        options: &PlayOptions,
        token: &CancellationToken,
    ) -> Result<(), PlayerError> {
        let item = options
            .first_item()
            .cloned()
            .ok_or_else(|| PlayerError::Load("no item to read".to_string()))?;
        let url = download_url(&self.options.server_url, &item.id);

        {
            let mut state = self.state.lock();
            state.progress = 0.0;
            state.current_item = Some(item);
            state.current_src = Some(url.clone());
        }

        let dialog = self.create_media_element().await;
        token.check()?;

        log::info!("[BookPlayer] Opening {}", url);
        let render_options = RenderOptions {
            target: dialog,
            layout: self.options.layout,
        };
        let rendition = self
            .renderer
            .open(&url, render_options)
            .await
            .map_err(|e| PlayerError::Load(format!("failed to open book: {}", e)))?;
        if token.is_cancelled() {
            rendition.destroy();
            return Err(PlayerError::Cancelled);
        }
        self.state.lock().rendition = Some(rendition.clone());

        rendition
            .display(None)
            .await
            .map_err(|e| PlayerError::Load(format!("failed to display book: {}", e)))?;
        token.check()?;

        // Hidden until locations exist so a resume doesn't flash page one
        rendition.set_visible(false);
        rendition
            .generate_locations(self.options.location_chars)
            .await
            .map_err(|e| PlayerError::Load(format!("failed to paginate book: {}", e)))?;
        token.check()?;

        // Books carry their resume percentage where other media carry a time
        let percentage = options.start_position_ticks as f64 / TICKS_PER_SECOND as f64;
        if percentage != 0.0 {
            if let Some(cfi) = rendition.cfi_from_percentage(percentage) {
                rendition.display(Some(&cfi)).await?;
                token.check()?;
            }
            self.state.lock().progress = percentage;
        }

        rendition.set_visible(true);
        Ok(())
    }

    fn rendition(&self) -> Option<Arc<dyn Rendition>> {
        if self.lifecycle.is_active() {
            self.state.lock().rendition.clone()
        } else {
            None
        }
    }

    pub fn next_page(&self) {
        self.turn_page(true);
    }

    pub fn previous_page(&self) {
        self.turn_page(false);
    }

    fn turn_page(&self, forward: bool) {
        let Some(rendition) = self.rendition() else {
            return;
        };

        let forward = match rendition.direction() {
            ReadingDirection::Ltr => forward,
            ReadingDirection::Rtl => !forward,
        };
        let location = if forward { rendition.next() } else { rendition.prev() };

        if let Some(cfi) = location {
            self.state.lock().progress = rendition.percentage_from_cfi(&cfi);
            self.events.emit(PlayerEvent::TimeUpdate);
        }
    }

    pub fn open_table_of_contents(&self) {
        if self.lifecycle.is_active() {
            self.state.lock().toc_open = true;
        }
    }

    pub fn close_table_of_contents(&self) {
        self.state.lock().toc_open = false;
    }

    pub fn toggle_table_of_contents(&self) {
        if self.state.lock().toc_open {
            self.close_table_of_contents();
        } else {
            self.open_table_of_contents();
        }
    }

    pub fn table_of_contents_open(&self) -> bool {
        self.state.lock().toc_open
    }

    /// Keyboard handling while the reader is open. Returns whether the key
    /// was consumed.
    pub async fn handle_key(&self, key: &str) -> bool {
        if !self.lifecycle.is_active() {
            return false;
        }

        match key {
            "l" | "ArrowRight" | "Right" => self.next_page(),
            "j" | "ArrowLeft" | "Left" => self.previous_page(),
            "Escape" => {
                if self.table_of_contents_open() {
                    self.close_table_of_contents();
                } else {
                    self.stop(false).await;
                }
            }
            _ => return false,
        }
        true
    }
}

#[async_trait]
impl MediaPlayer for BookPlayer {
    fn id(&self) -> &str {
        BOOK_PLAYER_ID
    }

    fn name(&self) -> &str {
        "Book Player"
    }

    fn priority(&self) -> i32 {
        1
    }

    fn can_play_media_type(&self, media_type: &MediaType) -> bool {
        *media_type == MediaType::Book
    }

    fn can_play_item(&self, item: &MediaItem) -> bool {
        item.path.as_deref().is_some_and(|p| p.ends_with("epub"))
    }

    async fn play(&self, options: PlayOptions) -> Result<(), PlayerError> {
        self.slot.acquire(BOOK_PLAYER_ID)?;
        let token = self.lifecycle.begin_load();
        self.dialogs.show_loading();

        let result = self.load(&options, &token).await;
        self.dialogs.hide_loading();

        match result.and_then(|()| self.lifecycle.commit(&token, PlayerState::Playing)) {
            Ok(()) => {
                self.events.emit(PlayerEvent::Playing);
                Ok(())
            }
            Err(e) => {
                if !token.is_cancelled() {
                    log::error!("[BookPlayer] Failed to open book: {}", e);
                    self.stop(false).await;
                }
                Err(e)
            }
        }
    }

    async fn stop(&self, _destroy_player: bool) {
        self.lifecycle.stop();

        let (dialog, rendition) = {
            let mut state = self.state.lock();
            state.toc_open = false;
            state.current_src = None;
            if let Some(watch) = state.dismiss_watch.take() {
                watch.abort();
            }
            (state.dialog.take(), state.rendition.take())
        };
        let had_resources = dialog.is_some() || rendition.is_some();

        if let Some(dialog) = dialog {
            self.dialogs.close(&dialog).await;
        }
        if let Some(rendition) = rendition {
            rendition.destroy();
        }

        if had_resources {
            self.dialogs.hide_loading();
            self.events.emit(PlayerEvent::Stopped);
        }
        self.slot.release(BOOK_PLAYER_ID);
    }

    fn state(&self) -> PlayerState {
        self.lifecycle.state()
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    fn current_item(&self) -> Option<MediaItem> {
        self.state.lock().current_item.clone()
    }

    fn current_src(&self) -> Option<String> {
        self.state.lock().current_src.clone()
    }

    fn volume(&self) -> u32 {
        if self.lifecycle.is_active() {
            100
        } else {
            0
        }
    }

    fn current_time(&self) -> f64 {
        if self.lifecycle.is_active() {
            self.state.lock().progress * 1000.0
        } else {
            0.0
        }
    }

    fn duration(&self) -> Option<f64> {
        self.lifecycle.is_active().then_some(1000.0)
    }

    fn seekable(&self) -> bool {
        self.lifecycle.is_active()
    }

    fn buffered_ranges(&self) -> Vec<TimeRange> {
        if self.lifecycle.is_active() {
            vec![TimeRange {
                start: 0.0,
                end: 10_000_000.0,
            }]
        } else {
            Vec::new()
        }
    }

    fn next_chapter(&self) {
        self.next_page();
    }

    fn previous_chapter(&self) {
        self.previous_page();
    }
}
