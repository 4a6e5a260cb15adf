use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Runtime media failures, reported as events rather than errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaErrorKind {
    Network,
    MediaDecodeError,
    MediaNotSupported,
}

impl MediaErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaErrorKind::Network => "network",
            MediaErrorKind::MediaDecodeError => "mediadecodeerror",
            MediaErrorKind::MediaNotSupported => "medianotsupported",
        }
    }
}

impl std::fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    TimeUpdate,
    Pause,
    Playing,
    Unpause,
    Waiting,
    VolumeChange,
    /// The media reached its natural end.
    Ended,
    /// The player released its resource.
    Stopped,
    Error(MediaErrorKind),
}

/// Fan-out of player events to any number of observers.
pub struct PlayerEvents {
    tx: broadcast::Sender<PlayerEvent>,
}

impl PlayerEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for PlayerEvents {
    fn default() -> Self {
        Self::new()
    }
}
