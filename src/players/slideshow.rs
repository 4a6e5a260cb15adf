//! Fullscreen photo slideshow with autoplay and an on-screen display.
//!
//! While shown it listens to commands at the root scope so remote keys
//! reveal the OSD and drive autoplay without the slideshow having focus.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::host::{DialogHost, DialogOptions, ElementId, Scope};
use crate::input::{Command, CommandEvent, CommandListeners, ListenerId};
use crate::models::MediaItem;

const SLIDESHOW_DIALOG_ID: &str = "slideshow";

#[derive(Clone, Debug)]
pub struct SlideshowOptions {
    pub items: Vec<MediaItem>,
    pub start_index: usize,
    pub interval_ms: u64,
    pub osd_hide_delay_ms: u64,
    /// Autoplay starts on open.
    pub autoplay: bool,
}

#[derive(Default)]
struct SlideState {
    index: usize,
    autoplay: bool,
    osd_visible: bool,
    /// Bumped on every OSD show so stale hide timers do nothing.
    osd_generation: u64,
}

struct SlideshowShared {
    item_count: usize,
    osd_hide_delay: Duration,
    state: Mutex<SlideState>,
}

impl SlideshowShared {
    fn handle_command(self: &Arc<Self>, event: &mut CommandEvent) {
        match event.command() {
            Some(Command::Up | Command::Down | Command::Select | Command::Menu | Command::Info) => {
                self.show_osd();
            }
            Some(Command::Play) => self.set_autoplay(true),
            Some(Command::Pause) => self.set_autoplay(false),
            Some(Command::PlayPause) => {
                let autoplay = self.state.lock().autoplay;
                self.set_autoplay(!autoplay);
            }
            Some(Command::Left) => {
                self.step(false);
                event.cancel();
            }
            Some(Command::Right) => {
                self.step(true);
                event.cancel();
            }
            _ => {}
        }
    }

    fn show_osd(self: &Arc<Self>) {
        let generation = {
            let mut state = self.state.lock();
            state.osd_visible = true;
            state.osd_generation += 1;
            state.osd_generation
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::debug!("[Slideshow] No runtime, OSD stays visible");
            return;
        };
        let shared = Arc::downgrade(self);
        let delay = self.osd_hide_delay;
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                let mut state = shared.state.lock();
                if state.osd_generation == generation {
                    state.osd_visible = false;
                }
            }
        });
    }

    fn set_autoplay(&self, enabled: bool) {
        self.state.lock().autoplay = enabled;
        log::debug!("[Slideshow] Autoplay {}", if enabled { "on" } else { "off" });
    }

    /// Returns false at either end.
    fn step(&self, forward: bool) -> bool {
        let mut state = self.state.lock();
        let next = if forward {
            state.index + 1
        } else {
            match state.index.checked_sub(1) {
                Some(i) => i,
                None => return false,
            }
        };
        if next >= self.item_count {
            return false;
        }
        state.index = next;
        true
    }
}

pub struct Slideshow {
    dialogs: Arc<dyn DialogHost>,
    listeners: Arc<CommandListeners>,
    items: Vec<MediaItem>,
    interval: Duration,
    shared: Arc<SlideshowShared>,
    dialog: Mutex<Option<ElementId>>,
    listener: Mutex<Option<ListenerId>>,
    autoplay_task: Mutex<Option<JoinHandle<()>>>,
}

impl Slideshow {
    pub fn new(
        dialogs: Arc<dyn DialogHost>,
        listeners: Arc<CommandListeners>,
        options: SlideshowOptions,
    ) -> Self {
        let index = options.start_index.min(options.items.len().saturating_sub(1));
        Self {
            dialogs,
            listeners,
            interval: Duration::from_millis(options.interval_ms),
            shared: Arc::new(SlideshowShared {
                item_count: options.items.len(),
                osd_hide_delay: Duration::from_millis(options.osd_hide_delay_ms),
                state: Mutex::new(SlideState {
                    index,
                    autoplay: options.autoplay,
                    ..Default::default()
                }),
            }),
            items: options.items,
            dialog: Mutex::new(None),
            listener: Mutex::new(None),
            autoplay_task: Mutex::new(None),
        }
    }

    pub async fn show(&self) {
        let dialog = self.dialogs.create_dialog(DialogOptions {
            id: Some(SLIDESHOW_DIALOG_ID.to_string()),
            fullscreen: true,
            auto_focus: false,
            scroll_y: false,
            remove_on_close: true,
        });
        *self.dialog.lock() = Some(dialog.clone());

        self.dialogs.set_page_scroll(false);

        let shared = self.shared.clone();
        let id = self
            .listeners
            .on(Scope::Root, move |event| shared.handle_command(event));
        *self.listener.lock() = Some(id);

        self.start_autoplay_timer();
        self.dialogs.open(&dialog).await;
        log::info!("[Slideshow] Showing {} items", self.items.len());
    }

    fn start_autoplay_timer(&self) {
        let shared = Arc::downgrade(&self.shared);
        let interval = self.interval;
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                let autoplay = shared.state.lock().autoplay;
                if autoplay && !shared.step(true) {
                    // Last slide; stays there until the user moves
                    shared.state.lock().autoplay = false;
                }
            }
        });

        if let Some(previous) = self.autoplay_task.lock().replace(task) {
            previous.abort();
        }
    }

    /// Closes the dialog and restores the page. Safe to call twice.
    pub async fn hide(&self) {
        if let Some(task) = self.autoplay_task.lock().take() {
            task.abort();
        }
        if let Some(id) = self.listener.lock().take() {
            self.listeners.off(&Scope::Root, id);
        }

        let dialog = self.dialog.lock().take();
        if let Some(dialog) = dialog {
            self.dialogs.close(&dialog).await;
            self.dialogs.set_page_scroll(true);
        }
    }

    /// The open dialog, until `hide()`.
    pub fn dialog(&self) -> Option<ElementId> {
        self.dialog.lock().clone()
    }

    pub fn play(&self) {
        self.shared.set_autoplay(true);
    }

    pub fn pause(&self) {
        self.shared.set_autoplay(false);
    }

    pub fn is_autoplaying(&self) -> bool {
        self.shared.state.lock().autoplay
    }

    pub fn osd_visible(&self) -> bool {
        self.shared.state.lock().osd_visible
    }

    pub fn next(&self) -> bool {
        self.shared.step(true)
    }

    pub fn previous(&self) -> bool {
        self.shared.step(false)
    }

    pub fn current_index(&self) -> usize {
        self.shared.state.lock().index
    }

    pub fn current_item(&self) -> Option<&MediaItem> {
        self.items.get(self.current_index())
    }
}
