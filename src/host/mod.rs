//! Collaborators owned by the surrounding shell.
//!
//! The router and the players never touch markup, navigation history or
//! dialogs directly. They go through these traits, which the shell
//! implements. [`headless`] provides in-process implementations used by the
//! binary and by tests.

pub mod headless;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Opaque handle to a focusable element or dialog in the shell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a command listener is attached. `Root` sees every bubbling event.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Root,
    Element(ElementId),
}

impl Scope {
    pub fn element(&self) -> Option<&ElementId> {
        match self {
            Scope::Root => None,
            Scope::Element(id) => Some(id),
        }
    }
}

/// Spatial focus navigation.
pub trait FocusManager: Send + Sync {
    fn move_up(&self, from: Option<&ElementId>);
    fn move_down(&self, from: Option<&ElementId>);
    fn move_left(&self, from: Option<&ElementId>);
    fn move_right(&self, from: Option<&ElementId>);

    /// Nearest focusable ancestor of `element`, including itself.
    fn focusable_parent(&self, element: &ElementId) -> Option<ElementId>;
}

/// Page navigation.
pub trait AppRouter: Send + Sync {
    fn go_home(&self);
    fn back(&self);
    fn can_go_back(&self) -> bool;
    fn show_settings(&self);
    fn show_search(&self);
    fn show_favorites(&self);
    fn show_guide(&self);
    fn show_live_tv(&self);
    fn show_recorded_tv(&self);
    fn show_now_playing(&self);
}

pub const FEATURE_EXIT: &str = "exit";

/// The native application wrapping the client.
pub trait AppHost: Send + Sync {
    fn supports(&self, feature: &str) -> bool;
    fn exit(&self);
}

/// The element tree the router resolves command sources against.
pub trait Document: Send + Sync {
    fn active_element(&self) -> Option<ElementId>;

    /// The modal dialog currently open on top, if any.
    fn open_dialog(&self) -> Option<ElementId>;

    fn contains(&self, ancestor: &ElementId, element: &ElementId) -> bool;
    fn parent(&self, element: &ElementId) -> Option<ElementId>;
    fn click(&self, element: &ElementId);
}

#[derive(Clone, Debug, PartialEq)]
pub struct DialogOptions {
    /// Fixed id so a second `create_dialog` can find an existing surface.
    pub id: Option<String>,
    pub fullscreen: bool,
    pub auto_focus: bool,
    pub scroll_y: bool,
    pub remove_on_close: bool,
}

/// Creates and tears down the visual surfaces players attach to.
#[async_trait]
pub trait DialogHost: Send + Sync {
    /// Returns the existing dialog with `options.id` or creates a new one.
    fn create_dialog(&self, options: DialogOptions) -> ElementId;

    /// Resolves once the open transition has finished.
    async fn open(&self, dialog: &ElementId);

    /// Resolves once the close transition has finished and the dialog is gone.
    async fn close(&self, dialog: &ElementId);

    /// Shows or hides the page scrollbars behind fullscreen surfaces.
    fn set_page_scroll(&self, visible: bool);

    fn show_loading(&self);
    fn hide_loading(&self);

    /// Dialogs the user dismissed. Dialogs closed through `close()` are not
    /// reported.
    fn dismissed(&self) -> broadcast::Receiver<ElementId>;
}

/// Runs `on_dismiss` once the user dismisses `dialog`. Subscribe before
/// opening the dialog so an early dismissal is not missed.
pub fn on_dismissed<F, Fut>(
    mut dismissed: broadcast::Receiver<ElementId>,
    dialog: ElementId,
    on_dismiss: F,
) -> Option<JoinHandle<()>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current().ok()?;
    Some(runtime.spawn(async move {
        loop {
            match dismissed.recv().await {
                Ok(id) if id == dialog => {
                    on_dismiss().await;
                    break;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    }))
}
