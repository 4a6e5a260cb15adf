//! In-process shell used by the binary and by tests.
//!
//! Nothing here renders anything. Each type keeps just enough state to
//! behave like its browser counterpart and exposes it for inspection.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};

use super::{
    AppHost, AppRouter, DialogHost, DialogOptions, Document, ElementId, FocusManager,
    FEATURE_EXIT,
};
use crate::models::TimeRange;
use crate::players::book::{BookRenderer, ReadingDirection, RenderOptions, Rendition};
use crate::players::media_element::{ElementEvent, ElementHandler, MediaElement, MediaElementHost};
use crate::players::MediaErrorKind;

const MAX_TREE_DEPTH: usize = 256;

#[derive(Default)]
struct DocumentState {
    parents: HashMap<ElementId, Option<ElementId>>,
    active: Option<ElementId>,
    open_dialog: Option<ElementId>,
    clicks: Vec<ElementId>,
}

#[derive(Default)]
pub struct HeadlessDocument {
    state: Mutex<DocumentState>,
}

impl HeadlessDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_element(&self, id: &str, parent: Option<&str>) {
        self.state
            .lock()
            .parents
            .insert(ElementId::new(id), parent.map(ElementId::new));
    }

    pub fn focus(&self, id: &str) {
        self.state.lock().active = Some(ElementId::new(id));
    }

    pub fn set_open_dialog(&self, id: Option<&str>) {
        self.state.lock().open_dialog = id.map(ElementId::new);
    }

    pub fn clicks(&self) -> Vec<ElementId> {
        self.state.lock().clicks.clone()
    }
}

impl Document for HeadlessDocument {
    fn active_element(&self) -> Option<ElementId> {
        self.state.lock().active.clone()
    }

    fn open_dialog(&self) -> Option<ElementId> {
        self.state.lock().open_dialog.clone()
    }

    fn contains(&self, ancestor: &ElementId, element: &ElementId) -> bool {
        let state = self.state.lock();
        let mut current = Some(element.clone());
        for _ in 0..MAX_TREE_DEPTH {
            let Some(id) = current else {
                return false;
            };
            if &id == ancestor {
                return true;
            }
            current = state.parents.get(&id).cloned().flatten();
        }
        false
    }

    fn parent(&self, element: &ElementId) -> Option<ElementId> {
        self.state.lock().parents.get(element).cloned().flatten()
    }

    fn click(&self, element: &ElementId) {
        log::info!("[Headless] click {}", element);
        self.state.lock().clicks.push(element.clone());
    }
}

pub struct HeadlessFocus {
    document: Arc<HeadlessDocument>,
    focusable: Mutex<HashSet<ElementId>>,
    moves: Mutex<Vec<(String, Option<ElementId>)>>,
}

impl HeadlessFocus {
    pub fn new(document: Arc<HeadlessDocument>) -> Self {
        Self {
            document,
            focusable: Mutex::new(HashSet::new()),
            moves: Mutex::new(Vec::new()),
        }
    }

    pub fn set_focusable(&self, id: &str) {
        self.focusable.lock().insert(ElementId::new(id));
    }

    pub fn moves(&self) -> Vec<(String, Option<ElementId>)> {
        self.moves.lock().clone()
    }

    fn record(&self, direction: &str, from: Option<&ElementId>) {
        log::info!("[Headless] focus {} from {:?}", direction, from);
        self.moves.lock().push((direction.to_string(), from.cloned()));
    }
}

impl FocusManager for HeadlessFocus {
    fn move_up(&self, from: Option<&ElementId>) {
        self.record("up", from);
    }

    fn move_down(&self, from: Option<&ElementId>) {
        self.record("down", from);
    }

    fn move_left(&self, from: Option<&ElementId>) {
        self.record("left", from);
    }

    fn move_right(&self, from: Option<&ElementId>) {
        self.record("right", from);
    }

    fn focusable_parent(&self, element: &ElementId) -> Option<ElementId> {
        let focusable = self.focusable.lock();
        let mut current = Some(element.clone());
        for _ in 0..MAX_TREE_DEPTH {
            let id = current?;
            if focusable.contains(&id) {
                return Some(id);
            }
            current = self.document.parent(&id);
        }
        None
    }
}

#[derive(Default)]
pub struct HeadlessNavigator {
    history: Mutex<Vec<String>>,
}

impl HeadlessNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    fn show(&self, page: &str) {
        log::info!("[Headless] navigate to {}", page);
        self.history.lock().push(page.to_string());
    }
}

impl AppRouter for HeadlessNavigator {
    fn go_home(&self) {
        self.show("home");
    }

    fn back(&self) {
        if let Some(page) = self.history.lock().pop() {
            log::info!("[Headless] back from {}", page);
        }
    }

    fn can_go_back(&self) -> bool {
        !self.history.lock().is_empty()
    }

    fn show_settings(&self) {
        self.show("settings");
    }

    fn show_search(&self) {
        self.show("search");
    }

    fn show_favorites(&self) {
        self.show("favorites");
    }

    fn show_guide(&self) {
        self.show("guide");
    }

    fn show_live_tv(&self) {
        self.show("livetv");
    }

    fn show_recorded_tv(&self) {
        self.show("recordedtv");
    }

    fn show_now_playing(&self) {
        self.show("nowplaying");
    }
}

pub struct HeadlessHost {
    supports_exit: AtomicBool,
    exited: AtomicBool,
}

impl HeadlessHost {
    pub fn new(supports_exit: bool) -> Self {
        Self {
            supports_exit: AtomicBool::new(supports_exit),
            exited: AtomicBool::new(false),
        }
    }

    pub fn set_supports_exit(&self, supported: bool) {
        self.supports_exit.store(supported, Ordering::SeqCst);
    }

    pub fn exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

impl AppHost for HeadlessHost {
    fn supports(&self, feature: &str) -> bool {
        feature == FEATURE_EXIT && self.supports_exit.load(Ordering::SeqCst)
    }

    fn exit(&self) {
        log::info!("[Headless] exit requested");
        self.exited.store(true, Ordering::SeqCst);
    }
}

struct DialogState {
    open: Vec<ElementId>,
    created: HashMap<ElementId, DialogOptions>,
    next_id: u64,
    page_scroll_visible: bool,
    loading: bool,
}

pub struct HeadlessDialogs {
    state: Mutex<DialogState>,
    dismissed: broadcast::Sender<ElementId>,
}

impl HeadlessDialogs {
    pub fn new() -> Self {
        let (dismissed, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(DialogState {
                open: Vec::new(),
                created: HashMap::new(),
                next_id: 0,
                page_scroll_visible: true,
                loading: false,
            }),
            dismissed,
        }
    }

    pub fn open_dialogs(&self) -> Vec<ElementId> {
        self.state.lock().open.clone()
    }

    pub fn dialog_options(&self, dialog: &ElementId) -> Option<DialogOptions> {
        self.state.lock().created.get(dialog).cloned()
    }

    /// The user closes `dialog`, as with the back button or a close icon.
    pub fn dismiss(&self, dialog: &ElementId) {
        let was_open = {
            let mut state = self.state.lock();
            let before = state.open.len();
            state.open.retain(|d| d != dialog);
            state.open.len() != before
        };
        if was_open {
            log::info!("[Headless] dialog {} dismissed", dialog);
            let _ = self.dismissed.send(dialog.clone());
        }
    }

    pub fn page_scroll_visible(&self) -> bool {
        self.state.lock().page_scroll_visible
    }

    pub fn loading(&self) -> bool {
        self.state.lock().loading
    }
}

impl Default for HeadlessDialogs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DialogHost for HeadlessDialogs {
    fn create_dialog(&self, options: DialogOptions) -> ElementId {
        let mut state = self.state.lock();
        let id = match &options.id {
            Some(id) => ElementId::new(id.clone()),
            None => {
                state.next_id += 1;
                ElementId::new(format!("dialog-{}", state.next_id))
            }
        };
        state.created.entry(id.clone()).or_insert(options);
        id
    }

    async fn open(&self, dialog: &ElementId) {
        let mut state = self.state.lock();
        if !state.open.contains(dialog) {
            log::info!("[Headless] dialog {} opened", dialog);
            state.open.push(dialog.clone());
        }
    }

    async fn close(&self, dialog: &ElementId) {
        let mut state = self.state.lock();
        let before = state.open.len();
        state.open.retain(|d| d != dialog);
        if state.open.len() != before {
            log::info!("[Headless] dialog {} closed", dialog);
        }
    }

    fn set_page_scroll(&self, visible: bool) {
        self.state.lock().page_scroll_visible = visible;
    }

    fn show_loading(&self) {
        self.state.lock().loading = true;
    }

    fn hide_loading(&self) {
        self.state.lock().loading = false;
    }

    fn dismissed(&self) -> broadcast::Receiver<ElementId> {
        self.dismissed.subscribe()
    }
}

/// Length reported for every loaded source, in seconds.
pub const HEADLESS_DURATION_SECS: f64 = 180.0;

struct ElementState {
    src: Option<String>,
    cross_origin: Option<String>,
    paused: bool,
    volume: f64,
    muted: bool,
    current_time: f64,
    duration: Option<f64>,
    playback_rate: f64,
    honor_time_fragment: bool,
    fail_next_load: Option<MediaErrorKind>,
    load_gate: Option<Arc<Notify>>,
}

/// A media element whose clock only moves when told to.
pub struct HeadlessMediaElement {
    state: Mutex<ElementState>,
    handler: Mutex<Option<ElementHandler>>,
}

impl HeadlessMediaElement {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ElementState {
                src: None,
                cross_origin: None,
                paused: true,
                volume: 1.0,
                muted: false,
                current_time: 0.0,
                duration: None,
                playback_rate: 1.0,
                honor_time_fragment: true,
                fail_next_load: None,
                load_gate: None,
            }),
            handler: Mutex::new(None),
        }
    }

    /// Some platforms ignore `#t=` in the source url.
    pub fn set_honor_time_fragment(&self, honor: bool) {
        self.state.lock().honor_time_fragment = honor;
    }

    pub fn fail_next_load(&self, kind: MediaErrorKind) {
        self.state.lock().fail_next_load = Some(kind);
    }

    /// Every later `load()` waits for a permit from `gate`.
    pub fn hold_loads(&self, gate: Arc<Notify>) {
        self.state.lock().load_gate = Some(gate);
    }

    /// Moves the playhead forward while playing, ending at the duration.
    pub fn advance(&self, seconds: f64) {
        let ended = {
            let mut state = self.state.lock();
            if state.paused || state.src.is_none() {
                return;
            }
            let end = state.duration.unwrap_or(f64::MAX);
            state.current_time = (state.current_time + seconds * state.playback_rate).min(end);
            if state.current_time >= end {
                state.paused = true;
            }
            state.paused
        };
        self.emit(if ended {
            ElementEvent::Ended
        } else {
            ElementEvent::TimeUpdate
        });
    }

    /// Plays to the end of the source.
    pub fn finish(&self) {
        {
            let mut state = self.state.lock();
            if state.src.is_none() {
                return;
            }
            state.current_time = state.duration.unwrap_or(state.current_time);
            state.paused = true;
        }
        self.emit(ElementEvent::Ended);
    }

    pub fn raise_error(&self, code: u16) {
        self.emit(ElementEvent::Error {
            code,
            message: format!("headless error {}", code),
        });
    }

    pub fn cross_origin(&self) -> Option<String> {
        self.state.lock().cross_origin.clone()
    }

    fn emit(&self, event: ElementEvent) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }
}

impl Default for HeadlessMediaElement {
    fn default() -> Self {
        Self::new()
    }
}

fn time_fragment(src: &str) -> f64 {
    src.split_once("#t=")
        .and_then(|(_, t)| t.parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[async_trait]
impl MediaElement for HeadlessMediaElement {
    fn attach_handler(&self, handler: ElementHandler) {
        *self.handler.lock() = Some(handler);
    }

    fn detach_handler(&self) {
        self.handler.lock().take();
    }

    async fn load(&self, src: &str) -> Result<(), MediaErrorKind> {
        let gate = self.state.lock().load_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        if let Some(kind) = state.fail_next_load.take() {
            return Err(kind);
        }
        if src.is_empty() {
            return Err(MediaErrorKind::MediaNotSupported);
        }

        state.current_time = if state.honor_time_fragment {
            time_fragment(src)
        } else {
            0.0
        };
        state.src = Some(src.to_string());
        state.duration = Some(HEADLESS_DURATION_SECS);
        state.paused = true;
        Ok(())
    }

    fn clear_src(&self) {
        let mut state = self.state.lock();
        state.src = None;
        state.duration = None;
        state.current_time = 0.0;
        state.paused = true;
    }

    fn src(&self) -> Option<String> {
        self.state.lock().src.clone()
    }

    fn set_cross_origin(&self, value: Option<String>) {
        self.state.lock().cross_origin = value;
    }

    fn play(&self) {
        {
            let mut state = self.state.lock();
            if state.src.is_none() || !state.paused {
                return;
            }
            state.paused = false;
        }
        self.emit(ElementEvent::Play);
        self.emit(ElementEvent::Playing);
    }

    fn pause(&self) {
        {
            let mut state = self.state.lock();
            if state.paused {
                return;
            }
            state.paused = true;
        }
        self.emit(ElementEvent::Pause);
    }

    fn paused(&self) -> bool {
        self.state.lock().paused
    }

    fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    fn set_volume(&self, volume: f64) {
        let changed = {
            let mut state = self.state.lock();
            let volume = volume.clamp(0.0, 1.0);
            let changed = state.volume != volume;
            state.volume = volume;
            changed
        };
        if changed {
            self.emit(ElementEvent::VolumeChange);
        }
    }

    fn muted(&self) -> bool {
        self.state.lock().muted
    }

    fn set_muted(&self, muted: bool) {
        let changed = std::mem::replace(&mut self.state.lock().muted, muted) != muted;
        if changed {
            self.emit(ElementEvent::VolumeChange);
        }
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        {
            let mut state = self.state.lock();
            let end = state.duration.unwrap_or(0.0);
            state.current_time = seconds.clamp(0.0, end);
        }
        self.emit(ElementEvent::TimeUpdate);
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn seekable(&self) -> Option<TimeRange> {
        self.state
            .lock()
            .duration
            .map(|end| TimeRange { start: 0.0, end })
    }

    fn buffered(&self) -> Vec<TimeRange> {
        let state = self.state.lock();
        match state.duration {
            Some(end) => vec![TimeRange { start: 0.0, end }],
            None => Vec::new(),
        }
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().playback_rate
    }

    fn set_playback_rate(&self, rate: f64) {
        self.state.lock().playback_rate = rate;
    }
}

pub struct HeadlessElementHost {
    element: Arc<HeadlessMediaElement>,
}

impl HeadlessElementHost {
    pub fn new(element: Arc<HeadlessMediaElement>) -> Self {
        Self { element }
    }
}

impl MediaElementHost for HeadlessElementHost {
    fn audio_element(&self) -> Arc<dyn MediaElement> {
        self.element.clone()
    }
}

#[derive(Default)]
struct RendererStats {
    live: AtomicUsize,
    last_location_chars: Mutex<Option<usize>>,
}

/// Opens every url as a book with a fixed number of pages.
pub struct HeadlessBookRenderer {
    pages: usize,
    direction: ReadingDirection,
    stats: Arc<RendererStats>,
}

impl HeadlessBookRenderer {
    /// A zero page book fails to open.
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            direction: ReadingDirection::Ltr,
            stats: Arc::new(RendererStats::default()),
        }
    }

    pub fn right_to_left(mut self) -> Self {
        self.direction = ReadingDirection::Rtl;
        self
    }

    /// Renditions opened and not yet destroyed.
    pub fn live_renditions(&self) -> usize {
        self.stats.live.load(Ordering::SeqCst)
    }

    pub fn last_location_chars(&self) -> Option<usize> {
        *self.stats.last_location_chars.lock()
    }
}

#[async_trait]
impl BookRenderer for HeadlessBookRenderer {
    async fn open(&self, url: &str, options: RenderOptions) -> anyhow::Result<Arc<dyn Rendition>> {
        if self.pages == 0 {
            anyhow::bail!("{} has no readable content", url);
        }

        log::info!("[Headless] rendering {} into {} ({:?})", url, options.target, options.layout);
        self.stats.live.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(HeadlessRendition {
            pages: self.pages,
            direction: self.direction,
            page: Mutex::new(0),
            visible: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
            stats: self.stats.clone(),
        }))
    }
}

struct HeadlessRendition {
    pages: usize,
    direction: ReadingDirection,
    page: Mutex<usize>,
    visible: AtomicBool,
    destroyed: AtomicBool,
    stats: Arc<RendererStats>,
}

impl HeadlessRendition {
    fn cfi(page: usize) -> String {
        format!("epubcfi(/6/{})", page)
    }

    fn page_of(cfi: &str) -> Option<usize> {
        cfi.strip_prefix("epubcfi(/6/")?
            .strip_suffix(')')?
            .parse()
            .ok()
    }

    fn last_page(&self) -> usize {
        self.pages - 1
    }
}

#[async_trait]
impl Rendition for HeadlessRendition {
    async fn display(&self, target: Option<&str>) -> anyhow::Result<()> {
        let page = match target {
            Some(cfi) => Self::page_of(cfi)
                .filter(|p| *p < self.pages)
                .ok_or_else(|| anyhow::anyhow!("invalid location {}", cfi))?,
            None => 0,
        };
        *self.page.lock() = page;
        Ok(())
    }

    async fn generate_locations(&self, chars: usize) -> anyhow::Result<()> {
        *self.stats.last_location_chars.lock() = Some(chars);
        Ok(())
    }

    fn cfi_from_percentage(&self, percentage: f64) -> Option<String> {
        if !(0.0..=1.0).contains(&percentage) {
            return None;
        }
        let page = (percentage * self.last_page() as f64).round() as usize;
        Some(Self::cfi(page))
    }

    fn percentage_from_cfi(&self, cfi: &str) -> f64 {
        match Self::page_of(cfi) {
            Some(page) if self.last_page() > 0 => page as f64 / self.last_page() as f64,
            _ => 0.0,
        }
    }

    fn next(&self) -> Option<String> {
        let mut page = self.page.lock();
        if *page >= self.last_page() {
            return None;
        }
        *page += 1;
        Some(Self::cfi(*page))
    }

    fn prev(&self) -> Option<String> {
        let mut page = self.page.lock();
        *page = page.checked_sub(1)?;
        Some(Self::cfi(*page))
    }

    fn direction(&self) -> ReadingDirection {
        self.direction
    }

    fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.stats.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_contains_walks_ancestors() {
        let document = HeadlessDocument::new();
        document.add_element("dialog", None);
        document.add_element("list", Some("dialog"));
        document.add_element("item", Some("list"));

        let dialog = ElementId::new("dialog");
        assert!(document.contains(&dialog, &ElementId::new("item")));
        assert!(document.contains(&dialog, &dialog));
        assert!(!document.contains(&ElementId::new("item"), &dialog));
    }

    #[test]
    fn test_focusable_parent_skips_plain_elements() {
        let document = Arc::new(HeadlessDocument::new());
        document.add_element("card", None);
        document.add_element("label", Some("card"));
        let focus = HeadlessFocus::new(document);

        assert_eq!(focus.focusable_parent(&ElementId::new("label")), None);
        focus.set_focusable("card");
        assert_eq!(focus.focusable_parent(&ElementId::new("label")), Some(ElementId::new("card")));
    }

    #[tokio::test]
    async fn test_element_events_reach_handler() {
        let element = HeadlessMediaElement::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        element.attach_handler(Arc::new(move |event| sink.lock().push(event)));

        element.load("http://server/a.mp3#t=5").await.unwrap();
        element.play();
        element.advance(2.0);
        element.set_volume(0.5);
        element.set_volume(0.5);

        assert_eq!(element.current_time(), 7.0);
        assert_eq!(
            *seen.lock(),
            vec![
                ElementEvent::Play,
                ElementEvent::Playing,
                ElementEvent::TimeUpdate,
                ElementEvent::VolumeChange,
            ]
        );
    }

    #[tokio::test]
    async fn test_rendition_pages() {
        let renderer = HeadlessBookRenderer::new(3);
        let options = RenderOptions {
            target: ElementId::new("book"),
            layout: crate::players::book::BookLayout::Paginated,
        };
        let rendition = renderer.open("book.epub", options).await.unwrap();

        assert_eq!(rendition.prev(), None);
        let cfi = rendition.next().unwrap();
        assert_eq!(rendition.percentage_from_cfi(&cfi), 0.5);
        rendition.next();
        assert_eq!(rendition.next(), None);

        rendition.destroy();
        rendition.destroy();
        assert_eq!(renderer.live_renditions(), 0);
    }
}
