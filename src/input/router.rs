use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::clock::{Clock, MonotonicClock};
use super::keys::command_for_key;
use super::listeners::{CommandEvent, CommandListeners, ListenerId};
use super::rate_limit::RateLimiter;
use super::Command;
use crate::config::AppConfig;
use crate::host::{AppHost, AppRouter, Document, ElementId, FocusManager, Scope, FEATURE_EXIT};
use crate::models::RepeatMode;
use crate::playback::PlaybackManager;

/// Upper bound on ancestor walks, guards against a cyclic element tree.
const MAX_BUBBLE_DEPTH: usize = 256;

#[derive(Clone, Debug, Default)]
pub struct CommandOptions {
    /// The element the input originated from, e.g. a clicked button.
    pub source_element: Option<ElementId>,
}

impl CommandOptions {
    pub fn from_element(element: ElementId) -> Self {
        Self {
            source_element: Some(element),
        }
    }
}

/// Collaborators the action table calls into.
#[derive(Clone)]
pub struct RouterTargets {
    pub playback: Arc<dyn PlaybackManager>,
    pub focus: Arc<dyn FocusManager>,
    pub navigator: Arc<dyn AppRouter>,
    pub host: Arc<dyn AppHost>,
    pub document: Arc<dyn Document>,
}

/// Turns input into commands and runs at most one action per command.
pub struct InputRouter {
    clock: Arc<dyn Clock>,
    last_input_ms: AtomicU64,
    rate_limiter: RateLimiter,
    listeners: Arc<CommandListeners>,
    targets: RouterTargets,
}

impl InputRouter {
    pub fn new(
        config: &AppConfig,
        targets: RouterTargets,
        listeners: Arc<CommandListeners>,
    ) -> Self {
        Self::with_clock(config, targets, listeners, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        config: &AppConfig,
        targets: RouterTargets,
        listeners: Arc<CommandListeners>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            clock,
            last_input_ms: AtomicU64::new(now),
            rate_limiter: RateLimiter::new(config.rate_limited_set(), config.rate_limit_window_ms),
            listeners,
            targets,
        }
    }

    /// Generic activity, e.g. any click. Dispatches the `unknown` command.
    pub fn notify(&self) {
        self.touch();
        self.handle_command(Command::Unknown.as_str(), CommandOptions::default());
    }

    pub fn notify_mouse_move(&self) {
        self.touch();
    }

    /// Milliseconds since the last recorded input.
    pub fn idle_time(&self) -> u64 {
        self.clock
            .now_ms()
            .saturating_sub(self.last_input_ms.load(Ordering::Relaxed))
    }

    pub fn on<F>(&self, scope: Scope, handler: F) -> ListenerId
    where
        F: Fn(&mut CommandEvent) + Send + Sync + 'static,
    {
        self.listeners.on(scope, handler)
    }

    pub fn off(&self, scope: &Scope, id: ListenerId) {
        if !self.listeners.off(scope, id) {
            log::debug!("[InputRouter] off() for unknown listener on {:?}", scope);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.count()
    }

    pub fn listeners(&self) -> Arc<CommandListeners> {
        self.listeners.clone()
    }

    /// Activates an element as if it had been clicked.
    pub fn select(&self, element: &ElementId) {
        self.targets.document.click(element);
    }

    /// Dispatches the command bound to a key, if any. Unbound keys still
    /// count as input activity.
    pub fn handle_key(&self, key: &str) {
        match command_for_key(key) {
            Some(command) => self.handle_command(command.as_str(), CommandOptions::default()),
            None => {
                log::debug!("[InputRouter] No command bound to key '{}'", key);
                self.touch();
            }
        }
    }

    pub fn handle_command(&self, name: &str, options: CommandOptions) {
        self.touch();

        let source = self.resolve_source(&options);

        if self.listeners.count() > 0 {
            let mut event = CommandEvent::new(name, source.clone());
            let path = self.bubble_path(&source);
            if !self.listeners.dispatch(&mut event, &path) {
                log::debug!("[InputRouter] '{}' cancelled by a listener", name);
                return;
            }
        }

        let command = match name.parse::<Command>() {
            Ok(command) if command.has_action() => command,
            _ => {
                log::debug!(
                    "[InputRouter] tried to process command with no action assigned: {}",
                    name
                );
                return;
            }
        };

        if !self.rate_limiter.try_fire(command, self.clock.now_ms()) {
            log::debug!("[InputRouter] '{}' rate limited", name);
            return;
        }

        self.run_action(command, source.element());
    }

    fn touch(&self) {
        self.last_input_ms.store(self.clock.now_ms(), Ordering::Relaxed);
    }

    fn resolve_source(&self, options: &CommandOptions) -> Scope {
        if let Some(element) = options
            .source_element
            .as_ref()
            .and_then(|e| self.targets.focus.focusable_parent(e))
        {
            return Scope::Element(element);
        }

        let document = &self.targets.document;
        let active = document.active_element();

        if let Some(dialog) = document.open_dialog() {
            let inside = active
                .as_ref()
                .is_some_and(|element| document.contains(&dialog, element));
            if !inside {
                return Scope::Element(dialog);
            }
        }

        active.map(Scope::Element).unwrap_or(Scope::Root)
    }

    fn bubble_path(&self, source: &Scope) -> Vec<Scope> {
        let mut path = Vec::new();
        let mut current = source.element().cloned();

        while let Some(element) = current {
            if path.len() >= MAX_BUBBLE_DEPTH {
                log::warn!(
                    "[InputRouter] Element tree deeper than {}, truncating",
                    MAX_BUBBLE_DEPTH
                );
                break;
            }
            current = self.targets.document.parent(&element);
            path.push(Scope::Element(element));
        }

        path.push(Scope::Root);
        path
    }

    fn run_action(&self, command: Command, source: Option<&ElementId>) {
        let RouterTargets {
            playback,
            focus,
            navigator,
            host,
            ..
        } = &self.targets;

        match command {
            Command::Up => focus.move_up(source),
            Command::Down => focus.move_down(source),
            Command::Left => focus.move_left(source),
            Command::Right => focus.move_right(source),
            Command::Select => {
                if let Some(element) = source {
                    self.select(element);
                }
            }

            Command::Home => navigator.go_home(),
            Command::Settings => navigator.show_settings(),
            Command::Back => {
                if navigator.can_go_back() {
                    navigator.back();
                } else if host.supports(FEATURE_EXIT) {
                    host.exit();
                }
            }
            Command::Search => navigator.show_search(),
            Command::Favorites => navigator.show_favorites(),
            Command::Guide => navigator.show_guide(),
            Command::RecordedTv => navigator.show_recorded_tv(),
            Command::LiveTv => navigator.show_live_tv(),
            Command::NowPlaying => navigator.show_now_playing(),

            Command::Play => playback.unpause(),
            Command::Pause => playback.pause(),
            Command::PlayPause => playback.play_pause(),
            Command::Stop => playback.stop(),
            Command::Next | Command::NextTrack => playback.next_track(),
            Command::Previous | Command::PreviousTrack => playback.previous_track(),
            Command::NextChapter => playback.next_chapter(),
            Command::PreviousChapter => playback.previous_chapter(),
            Command::ChannelUp => playback.channel_up(),
            Command::ChannelDown => playback.channel_down(),
            Command::VolumeUp => playback.volume_up(),
            Command::VolumeDown => playback.volume_down(),
            Command::Mute => playback.set_mute(true),
            Command::Unmute => playback.set_mute(false),
            Command::ToggleMute => playback.toggle_mute(),
            Command::FastForward => playback.fast_forward(),
            Command::Rewind => playback.rewind(),
            Command::ChangeZoom => playback.toggle_aspect_ratio(),
            Command::ChangeAudioTrack => playback.change_audio_stream(),
            Command::ChangeSubtitleTrack => playback.change_subtitle_stream(),
            Command::ToggleFullscreen => playback.toggle_fullscreen(),
            Command::EnableDisplayMirror => playback.enable_display_mirroring(true),
            Command::DisableDisplayMirror => playback.enable_display_mirroring(false),
            Command::ToggleDisplayMirror => playback.toggle_display_mirroring(),
            Command::RepeatNone => playback.set_repeat_mode(RepeatMode::RepeatNone),
            Command::RepeatAll => playback.set_repeat_mode(RepeatMode::RepeatAll),
            Command::RepeatOne => playback.set_repeat_mode(RepeatMode::RepeatOne),

            Command::Menu | Command::Info | Command::Unknown => {}
        }
    }
}
