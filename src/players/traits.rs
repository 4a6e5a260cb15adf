use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{PlayerEvent, PlayerState};
use crate::errors::PlayerError;
use crate::models::{MediaItem, MediaType, PlayOptions, TimeRange};

/// Step used by volume up/down, in percent.
pub const VOLUME_STEP: u32 = 2;

/// A playback plugin.
///
/// Transport methods only act while the player is in an active state;
/// otherwise setters do nothing and getters return the defaults below.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;

    /// Higher wins when several players can play an item.
    fn priority(&self) -> i32;

    fn can_play_media_type(&self, media_type: &MediaType) -> bool;

    fn can_play_item(&self, _item: &MediaItem) -> bool {
        true
    }

    /// Acquires the playback surface and starts the first item.
    ///
    /// Fails with `Cancelled` when `stop()` is called before loading
    /// finishes.
    async fn play(&self, options: PlayOptions) -> Result<(), PlayerError>;

    /// Releases everything `play()` acquired. Safe to call in any state.
    async fn stop(&self, destroy_player: bool);

    fn state(&self) -> PlayerState;
    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;

    fn current_item(&self) -> Option<MediaItem> {
        None
    }

    fn current_src(&self) -> Option<String> {
        None
    }

    fn pause(&self) {}

    /// Retries playback after a stall or error.
    fn resume(&self) {
        self.unpause();
    }

    fn unpause(&self) {}

    fn paused(&self) -> bool {
        false
    }

    /// 0 to 100.
    fn set_volume(&self, _volume: u32) {}

    fn volume(&self) -> u32 {
        0
    }

    fn volume_up(&self) {
        self.set_volume((self.volume() + VOLUME_STEP).min(100));
    }

    fn volume_down(&self) {
        self.set_volume(self.volume().saturating_sub(VOLUME_STEP));
    }

    fn set_mute(&self, _mute: bool) {}

    fn is_muted(&self) -> bool {
        false
    }

    /// Milliseconds.
    fn current_time(&self) -> f64 {
        0.0
    }

    fn set_current_time(&self, _ms: f64) {}

    /// Milliseconds.
    fn duration(&self) -> Option<f64> {
        None
    }

    fn seekable(&self) -> bool {
        false
    }

    /// In ticks.
    fn buffered_ranges(&self) -> Vec<TimeRange> {
        Vec::new()
    }

    fn set_playback_rate(&self, _rate: f64) {}

    fn playback_rate(&self) -> Option<f64> {
        None
    }

    fn next_chapter(&self) {}
    fn previous_chapter(&self) {}
}
