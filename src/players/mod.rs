//! Playback plugins and the pieces they share.

pub mod audio;
pub mod book;
pub mod events;
pub mod lifecycle;
pub mod media_element;
pub mod photo;
pub mod registry;
pub mod slideshow;
pub mod slot;
pub mod traits;

pub use audio::AudioPlayer;
pub use book::{BookPlayer, BookRenderer, Rendition};
pub use events::{MediaErrorKind, PlayerEvent, PlayerEvents};
pub use lifecycle::{CancellationToken, Lifecycle, PlayerState};
pub use media_element::{MediaElement, MediaElementHost};
pub use photo::PhotoPlayer;
pub use registry::PlayerRegistry;
pub use slot::ResourceSlot;
pub use traits::MediaPlayer;
