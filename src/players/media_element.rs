//! The native audio element a shell provides to [`super::AudioPlayer`].

use async_trait::async_trait;
use std::sync::Arc;

use super::MediaErrorKind;
use crate::models::TimeRange;

// Native media error codes
pub const MEDIA_ERR_ABORTED: u16 = 1;
pub const MEDIA_ERR_NETWORK: u16 = 2;
pub const MEDIA_ERR_DECODE: u16 = 3;
pub const MEDIA_ERR_SRC_NOT_SUPPORTED: u16 = 4;

/// Maps a native error code to the reported kind.
///
/// Aborted loads and unknown codes are not errors worth surfacing.
pub fn media_error_kind(code: u16) -> Option<MediaErrorKind> {
    match code {
        MEDIA_ERR_NETWORK => Some(MediaErrorKind::Network),
        MEDIA_ERR_DECODE => Some(MediaErrorKind::MediaDecodeError),
        MEDIA_ERR_SRC_NOT_SUPPORTED => Some(MediaErrorKind::MediaNotSupported),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementEvent {
    TimeUpdate,
    Play,
    Playing,
    Pause,
    Waiting,
    VolumeChange,
    Ended,
    Error { code: u16, message: String },
}

pub type ElementHandler = Arc<dyn Fn(ElementEvent) + Send + Sync>;

/// Handlers may be invoked synchronously from inside any setter, so
/// callers must not hold locks the handler needs while calling one.
#[async_trait]
pub trait MediaElement: Send + Sync {
    fn attach_handler(&self, handler: ElementHandler);
    fn detach_handler(&self);

    /// Points the element at `src` and resolves once it can start playing.
    async fn load(&self, src: &str) -> Result<(), MediaErrorKind>;
    fn clear_src(&self);
    fn src(&self) -> Option<String>;
    fn set_cross_origin(&self, value: Option<String>);

    fn play(&self);
    fn pause(&self);
    fn paused(&self) -> bool;

    /// 0.0 to 1.0
    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    fn muted(&self) -> bool;
    fn set_muted(&self, muted: bool);

    /// Seconds.
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    fn duration(&self) -> Option<f64>;
    fn seekable(&self) -> Option<TimeRange>;
    fn buffered(&self) -> Vec<TimeRange>;

    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);
}

pub trait MediaElementHost: Send + Sync {
    /// Creates the element, or returns the one already in the page.
    fn audio_element(&self) -> Arc<dyn MediaElement>;

    /// Whether volume fades are smooth on this platform.
    fn supports_fade(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(media_error_kind(MEDIA_ERR_NETWORK), Some(MediaErrorKind::Network));
        assert_eq!(media_error_kind(MEDIA_ERR_DECODE), Some(MediaErrorKind::MediaDecodeError));
        assert_eq!(
            media_error_kind(MEDIA_ERR_SRC_NOT_SUPPORTED),
            Some(MediaErrorKind::MediaNotSupported)
        );
        assert_eq!(media_error_kind(MEDIA_ERR_ABORTED), None);
        assert_eq!(media_error_kind(42), None);
    }
}
