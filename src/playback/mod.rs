pub mod controller;
pub mod queue;

pub use controller::PlaybackController;
pub use queue::PlayQueue;

use crate::models::RepeatMode;

/// Playback operations the input router can trigger.
///
/// Calls are fire-and-forget: implementations report their own failures.
pub trait PlaybackManager: Send + Sync {
    fn next_track(&self);
    fn previous_track(&self);
    fn next_chapter(&self);
    fn previous_chapter(&self);
    fn channel_up(&self);
    fn channel_down(&self);

    fn pause(&self);
    fn unpause(&self);
    fn play_pause(&self);
    fn stop(&self);

    fn set_mute(&self, mute: bool);
    fn toggle_mute(&self);
    fn volume_up(&self);
    fn volume_down(&self);

    fn fast_forward(&self);
    fn rewind(&self);

    fn toggle_aspect_ratio(&self);
    fn change_audio_stream(&self);
    fn change_subtitle_stream(&self);
    fn toggle_fullscreen(&self);
    fn enable_display_mirroring(&self, enabled: bool);
    fn toggle_display_mirroring(&self);
    fn set_repeat_mode(&self, mode: RepeatMode);
}
