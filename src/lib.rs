pub mod config;
pub mod errors;
pub mod host;
pub mod input;
pub mod models;
pub mod playback;
pub mod players;
pub mod settings;

use anyhow::Context;
use crossbeam_channel::TryRecvError;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::AppConfig;
use host::headless::{
    HeadlessBookRenderer, HeadlessDialogs, HeadlessDocument, HeadlessElementHost, HeadlessFocus,
    HeadlessHost, HeadlessMediaElement, HeadlessNavigator,
};
use input::{CommandListeners, CommandOptions, InputRouter, RouterTargets};
use models::{MediaItem, MediaType, PlayOptions};
use playback::PlaybackController;
use players::book::BookPlayerOptions;
use players::{AudioPlayer, BookPlayer, PhotoPlayer, PlayerRegistry, ResourceSlot};
use settings::Settings;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const PLAYHEAD_TICK: Duration = Duration::from_secs(1);
const HEADLESS_BOOK_PAGES: usize = 100;

/// One line of stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum InputLine {
    Play { path: String, media_type: MediaType },
    Key(String),
    Command(String),
    Quit,
    Empty,
}

impl std::str::FromStr for InputLine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let Some(first) = parts.next() else {
            return Ok(InputLine::Empty);
        };

        match first {
            "quit" | "exit" => Ok(InputLine::Quit),
            "key" => parts
                .next()
                .map(|key| InputLine::Key(key.to_string()))
                .ok_or_else(|| "usage: key <name>".to_string()),
            "play" => {
                let path = parts
                    .next()
                    .ok_or_else(|| "usage: play <path> [media type]".to_string())?;
                let media_type = match parts.next() {
                    Some(media_type) => media_type.parse()?,
                    None => media_type_for_path(path),
                };
                Ok(InputLine::Play {
                    path: path.to_string(),
                    media_type,
                })
            }
            command => Ok(InputLine::Command(command.to_string())),
        }
    }
}

/// Guesses the media type from a file extension.
pub fn media_type_for_path(path: &str) -> MediaType {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "epub" => MediaType::Book,
        "mp3" | "flac" | "ogg" | "opus" | "m4a" | "aac" | "wav" => MediaType::Audio,
        "jpg" | "jpeg" | "png" | "gif" | "webp" => MediaType::Photo,
        "mkv" | "mp4" | "webm" | "avi" => MediaType::Video,
        _ => MediaType::Unknown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The router, players and controller wired to the headless shell.
pub struct App {
    pub router: InputRouter,
    pub controller: PlaybackController,
    pub host: Arc<HeadlessHost>,
    pub element: Arc<HeadlessMediaElement>,
    pub book: Arc<BookPlayer>,
}

impl App {
    pub async fn headless(config: AppConfig, settings: Settings) -> Self {
        let listeners = Arc::new(CommandListeners::new());
        let slot = Arc::new(ResourceSlot::new());
        let dialogs = Arc::new(HeadlessDialogs::new());
        let element = Arc::new(HeadlessMediaElement::new());

        let audio = Arc::new(AudioPlayer::new(
            Arc::new(HeadlessElementHost::new(element.clone())),
            slot.clone(),
            Arc::new(settings),
            config.enable_fade_out,
        ));
        let book = BookPlayer::new(
            dialogs.clone(),
            Arc::new(HeadlessBookRenderer::new(HEADLESS_BOOK_PAGES)),
            slot.clone(),
            BookPlayerOptions {
                server_url: config.server_url.clone(),
                location_chars: config.book_location_chars,
                layout: config.book_layout,
            },
        );
        let photo = PhotoPlayer::new(
            dialogs,
            listeners.clone(),
            slot,
            config.slideshow_interval_ms,
            config.osd_hide_delay_ms,
        );

        let registry = Arc::new(PlayerRegistry::new());
        registry.register_player(audio).await;
        registry.register_player(book.clone()).await;
        registry.register_player(photo).await;

        let controller = PlaybackController::new(registry, &config);

        let document = Arc::new(HeadlessDocument::new());
        let host = Arc::new(HeadlessHost::new(true));
        let targets = RouterTargets {
            playback: Arc::new(controller.clone()),
            focus: Arc::new(HeadlessFocus::new(document.clone())),
            navigator: Arc::new(HeadlessNavigator::new()),
            host: host.clone(),
            document,
        };
        let router = InputRouter::new(&config, targets, listeners);

        Self {
            router,
            controller,
            host,
            element,
            book,
        }
    }

    pub async fn handle_line(&self, line: &str) -> Flow {
        let input = match line.parse::<InputLine>() {
            Ok(input) => input,
            Err(e) => {
                log::warn!("[Playhost] {}", e);
                return Flow::Continue;
            }
        };

        match input {
            InputLine::Empty => {}
            InputLine::Quit => return Flow::Quit,
            InputLine::Play { path, media_type } => {
                let name = Path::new(&path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.clone());
                let item = MediaItem::new(uuid::Uuid::new_v4().to_string(), media_type)
                    .with_path(path)
                    .with_name(name);

                if let Err(e) = self.controller.play(PlayOptions::for_item(item)).await {
                    log::error!("[Playhost] {}", e);
                }
            }
            InputLine::Key(key) => {
                // The reader grabs its own keys while it is open
                if !self.book.handle_key(&key).await {
                    self.router.handle_key(&key);
                }
            }
            InputLine::Command(name) => {
                self.router.handle_command(&name, CommandOptions::default())
            }
        }

        if self.host.exited() {
            Flow::Quit
        } else {
            Flow::Continue
        }
    }

    /// Moves the headless playhead forward once per `PLAYHEAD_TICK`.
    fn spawn_playhead(&self) -> tokio::task::JoinHandle<()> {
        let element = self.element.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PLAYHEAD_TICK);
            loop {
                ticker.tick().await;
                element.advance(PLAYHEAD_TICK.as_secs_f64());
            }
        })
    }
}

pub fn run() -> anyhow::Result<()> {
    let config = config::load_config();
    let settings = Settings::open(config::get_settings_file_path());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start the runtime")?;

    runtime.block_on(async move {
        let app = App::headless(config, settings).await;
        let playhead = app.spawn_playhead();

        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("[Playhost] Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        });

        log::info!("[Playhost] Ready. Type a command, 'key <name>', 'play <path>' or 'quit'");
        loop {
            match rx.try_recv() {
                Ok(line) => {
                    if app.handle_line(&line).await == Flow::Quit {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(TryRecvError::Disconnected) => break,
            }
        }

        playhead.abort();
        app.controller.stop_playback().await;
        log::info!("[Playhost] Bye");
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::{MediaPlayer, PlayerState};

    #[test]
    fn test_parse_input_lines() {
        assert_eq!("".parse::<InputLine>(), Ok(InputLine::Empty));
        assert_eq!("quit".parse::<InputLine>(), Ok(InputLine::Quit));
        assert_eq!("key Escape".parse::<InputLine>(), Ok(InputLine::Key("Escape".into())));
        assert_eq!("  playpause ".parse::<InputLine>(), Ok(InputLine::Command("playpause".into())));
        assert_eq!(
            "play /books/dune.epub".parse::<InputLine>(),
            Ok(InputLine::Play {
                path: "/books/dune.epub".into(),
                media_type: MediaType::Book
            })
        );
        assert_eq!(
            "play /tmp/x photo".parse::<InputLine>(),
            Ok(InputLine::Play {
                path: "/tmp/x".into(),
                media_type: MediaType::Photo
            })
        );
        assert!("key".parse::<InputLine>().is_err());
        assert!("play /tmp/x hologram".parse::<InputLine>().is_err());
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path("/music/Song.FLAC"), MediaType::Audio);
        assert_eq!(media_type_for_path("cover.jpeg"), MediaType::Photo);
        assert_eq!(media_type_for_path("README"), MediaType::Unknown);
    }

    async fn app() -> App {
        let config = AppConfig {
            enable_fade_out: false,
            ..AppConfig::default()
        };
        App::headless(config, Settings::in_memory()).await
    }

    #[tokio::test]
    async fn test_lines_drive_playback() {
        let app = app().await;

        app.handle_line("play /music/song.mp3").await;
        let player = app.controller.active_player().unwrap();
        assert_eq!(player.state(), PlayerState::Playing);

        app.handle_line("pause").await;
        assert!(player.paused());

        app.handle_line("key MediaPlayPause").await;
        assert!(!player.paused());
    }

    #[tokio::test]
    async fn test_book_keys_take_priority() {
        let app = app().await;
        app.handle_line("play /books/dune.epub").await;
        assert_eq!(app.book.state(), PlayerState::Playing);

        app.handle_line("key l").await;
        assert!((app.book.current_time() - 1000.0 / 99.0).abs() < 1e-9);

        app.handle_line("key Escape").await;
        assert_eq!(app.book.state(), PlayerState::Idle);
    }

    #[tokio::test]
    async fn test_back_with_empty_history_quits() {
        let app = app().await;
        assert_eq!(app.handle_line("settings").await, Flow::Continue);
        assert_eq!(app.handle_line("back").await, Flow::Continue);
        assert_eq!(app.handle_line("back").await, Flow::Quit);
        assert_eq!(app.handle_line("quit").await, Flow::Quit);
    }
}
