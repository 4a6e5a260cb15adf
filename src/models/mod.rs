use serde::{Deserialize, Serialize};

/// Server time unit: 100ns ticks.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Audio,
    Video,
    Book,
    Photo,
    #[serde(other)]
    Unknown,
}

impl MediaType {
    pub fn as_str(&self) -> &str {
        match self {
            MediaType::Audio => "Audio",
            MediaType::Video => "Video",
            MediaType::Book => "Book",
            MediaType::Photo => "Photo",
            MediaType::Unknown => "Unknown",
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "audio" => Ok(MediaType::Audio),
            "video" => Ok(MediaType::Video),
            "book" => Ok(MediaType::Book),
            "photo" => Ok(MediaType::Photo),
            _ => Err(format!("Invalid media type: {}", s)),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item as returned by the server API. Players only read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub server_id: Option<String>,
    pub path: Option<String>,
    pub media_type: Option<MediaType>,
    pub run_time_ticks: Option<i64>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            id: id.into(),
            media_type: Some(media_type),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamType {
    Audio,
    Video,
    Subtitle,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStream {
    pub index: u32,
    #[serde(rename = "Type")]
    pub stream_type: StreamType,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSource {
    pub id: String,
    pub run_time_ticks: Option<i64>,
    /// Set when the stream is served from another origin and needs CORS.
    pub cross_origin: Option<String>,
    #[serde(default)]
    pub media_streams: Vec<MediaStream>,
    pub default_audio_stream_index: Option<u32>,
}

impl MediaSource {
    pub fn stream_indexes(&self, stream_type: StreamType) -> Vec<u32> {
        self.media_streams
            .iter()
            .filter(|s| s.stream_type == stream_type)
            .map(|s| s.index)
            .collect()
    }
}

/// A playback request handed to a player.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayOptions {
    pub items: Vec<MediaItem>,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub start_position_ticks: i64,
    /// Stream url for element based players.
    pub url: Option<String>,
    pub media_source: Option<MediaSource>,
}

impl PlayOptions {
    pub fn for_item(item: MediaItem) -> Self {
        Self {
            items: vec![item],
            ..Default::default()
        }
    }

    pub fn first_item(&self) -> Option<&MediaItem> {
        self.items.get(self.start_index).or_else(|| self.items.first())
    }

    pub fn start_position_seconds(&self) -> f64 {
        self.start_position_ticks as f64 / TICKS_PER_SECOND as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RepeatMode {
    RepeatNone,
    RepeatAll,
    RepeatOne,
}

impl Default for RepeatMode {
    fn default() -> Self {
        RepeatMode::RepeatNone
    }
}
