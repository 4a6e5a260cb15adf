//! Key names from keyboards, TV remotes and OS media keys.

use super::Command;

/// Maps a DOM-style key name to the command it triggers.
pub fn command_for_key(key: &str) -> Option<Command> {
    let command = match key {
        "ArrowUp" | "Up" => Command::Up,
        "ArrowDown" | "Down" => Command::Down,
        "ArrowLeft" | "Left" => Command::Left,
        "ArrowRight" | "Right" => Command::Right,
        "Enter" | "Accept" => Command::Select,

        "Escape" | "Backspace" | "Back" | "GoBack" | "BrowserBack" => Command::Back,
        "BrowserHome" | "GoHome" => Command::Home,
        "BrowserSearch" => Command::Search,
        "BrowserFavorites" => Command::Favorites,
        "Settings" => Command::Settings,
        "Guide" => Command::Guide,
        "LiveContent" => Command::LiveTv,
        "DVR" => Command::RecordedTv,
        "ContextMenu" => Command::Menu,
        "Info" => Command::Info,

        "MediaPlay" | "Play" => Command::Play,
        "MediaPause" | "Pause" => Command::Pause,
        "MediaPlayPause" => Command::PlayPause,
        "MediaStop" => Command::Stop,
        "MediaTrackNext" | "MediaNextTrack" => Command::Next,
        "MediaTrackPrevious" | "MediaPreviousTrack" => Command::Previous,
        "MediaFastForward" => Command::FastForward,
        "MediaRewind" => Command::Rewind,
        "ChannelUp" => Command::ChannelUp,
        "ChannelDown" => Command::ChannelDown,
        "AudioVolumeUp" | "VolumeUp" => Command::VolumeUp,
        "AudioVolumeDown" | "VolumeDown" => Command::VolumeDown,
        "AudioVolumeMute" | "VolumeMute" => Command::ToggleMute,
        "ZoomToggle" => Command::ChangeZoom,
        "MediaAudioTrack" => Command::ChangeAudioTrack,
        "Subtitle" => Command::ChangeSubtitleTrack,

        _ => return None,
    };

    Some(command)
}
