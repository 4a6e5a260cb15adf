use serde::Serialize;
use thiserror::Error;

use crate::players::MediaErrorKind;

#[derive(Debug, Clone, Error, Serialize, PartialEq)]
#[serde(tag = "type", content = "message")]
pub enum PlayerError {
    #[error("Load failed: {0}")]
    Load(String),

    #[error("Playback was cancelled before it was ready")]
    Cancelled,

    #[error("No player can handle: {0}")]
    NoCompatiblePlayer(String),

    #[error("Resource slot is owned by {0}")]
    SlotBusy(String),

    #[error("Media error: {0}")]
    Media(MediaErrorKind),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MediaErrorKind> for PlayerError {
    fn from(kind: MediaErrorKind) -> Self {
        PlayerError::Media(kind)
    }
}

impl From<anyhow::Error> for PlayerError {
    fn from(e: anyhow::Error) -> Self {
        PlayerError::Load(e.to_string())
    }
}

#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum ConfigError {
    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Invalid configuration: {0}")]
    Parse(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::FileSystem(e.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}
