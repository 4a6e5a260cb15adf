use serde::{Deserialize, Serialize};

/// Every command the router understands, keyed by its wire name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    // Focus
    Up,
    Down,
    Left,
    Right,
    Select,

    // Navigation
    Home,
    Settings,
    Back,
    Search,
    Favorites,
    Guide,
    RecordedTv,
    LiveTv,
    NowPlaying,

    // Playback
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    NextTrack,
    Previous,
    PreviousTrack,
    NextChapter,
    PreviousChapter,
    ChannelUp,
    ChannelDown,
    VolumeUp,
    VolumeDown,
    Mute,
    Unmute,
    ToggleMute,
    FastForward,
    Rewind,
    ChangeZoom,
    ChangeAudioTrack,
    ChangeSubtitleTrack,
    ToggleFullscreen,
    EnableDisplayMirror,
    DisableDisplayMirror,
    ToggleDisplayMirror,
    RepeatNone,
    RepeatAll,
    RepeatOne,

    // Listener-only, no default action
    Menu,
    Info,
    Unknown,
}

impl Command {
    pub const ALL: [Command; 46] = [
        Command::Up,
        Command::Down,
        Command::Left,
        Command::Right,
        Command::Select,
        Command::Home,
        Command::Settings,
        Command::Back,
        Command::Search,
        Command::Favorites,
        Command::Guide,
        Command::RecordedTv,
        Command::LiveTv,
        Command::NowPlaying,
        Command::Play,
        Command::Pause,
        Command::PlayPause,
        Command::Stop,
        Command::Next,
        Command::NextTrack,
        Command::Previous,
        Command::PreviousTrack,
        Command::NextChapter,
        Command::PreviousChapter,
        Command::ChannelUp,
        Command::ChannelDown,
        Command::VolumeUp,
        Command::VolumeDown,
        Command::Mute,
        Command::Unmute,
        Command::ToggleMute,
        Command::FastForward,
        Command::Rewind,
        Command::ChangeZoom,
        Command::ChangeAudioTrack,
        Command::ChangeSubtitleTrack,
        Command::ToggleFullscreen,
        Command::EnableDisplayMirror,
        Command::DisableDisplayMirror,
        Command::ToggleDisplayMirror,
        Command::RepeatNone,
        Command::RepeatAll,
        Command::RepeatOne,
        Command::Menu,
        Command::Info,
        Command::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Up => "up",
            Command::Down => "down",
            Command::Left => "left",
            Command::Right => "right",
            Command::Select => "select",
            Command::Home => "home",
            Command::Settings => "settings",
            Command::Back => "back",
            Command::Search => "search",
            Command::Favorites => "favorites",
            Command::Guide => "guide",
            Command::RecordedTv => "recordedtv",
            Command::LiveTv => "livetv",
            Command::NowPlaying => "nowplaying",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::PlayPause => "playpause",
            Command::Stop => "stop",
            Command::Next => "next",
            Command::NextTrack => "nexttrack",
            Command::Previous => "previous",
            Command::PreviousTrack => "previoustrack",
            Command::NextChapter => "nextchapter",
            Command::PreviousChapter => "previouschapter",
            Command::ChannelUp => "channelup",
            Command::ChannelDown => "channeldown",
            Command::VolumeUp => "volumeup",
            Command::VolumeDown => "volumedown",
            Command::Mute => "mute",
            Command::Unmute => "unmute",
            Command::ToggleMute => "togglemute",
            Command::FastForward => "fastforward",
            Command::Rewind => "rewind",
            Command::ChangeZoom => "changezoom",
            Command::ChangeAudioTrack => "changeaudiotrack",
            Command::ChangeSubtitleTrack => "changesubtitletrack",
            Command::ToggleFullscreen => "togglefullscreen",
            Command::EnableDisplayMirror => "enabledisplaymirror",
            Command::DisableDisplayMirror => "disabledisplaymirror",
            Command::ToggleDisplayMirror => "toggledisplaymirror",
            Command::RepeatNone => "repeatnone",
            Command::RepeatAll => "repeatall",
            Command::RepeatOne => "repeatone",
            Command::Menu => "menu",
            Command::Info => "info",
            Command::Unknown => "unknown",
        }
    }

    /// Whether the router runs a default action for this command.
    pub fn has_action(&self) -> bool {
        !matches!(self, Command::Menu | Command::Info | Command::Unknown)
    }
}

impl std::str::FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown command: {}", s))
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
