use std::sync::Arc;
use tokio::sync::RwLock;

use super::MediaPlayer;
use crate::models::{MediaItem, MediaType};

/// Registered players in registration order.
pub struct PlayerRegistry {
    players: Arc<RwLock<Vec<Arc<dyn MediaPlayer>>>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Registering an id twice replaces the earlier player in place.
    pub async fn register_player(&self, player: Arc<dyn MediaPlayer>) {
        let mut players = self.players.write().await;
        log::info!("Registering media player: {} ({})", player.name(), player.id());
        match players.iter_mut().find(|p| p.id() == player.id()) {
            Some(existing) => *existing = player,
            None => players.push(player),
        }
    }

    pub async fn get_player(&self, id: &str) -> Option<Arc<dyn MediaPlayer>> {
        let players = self.players.read().await;
        players.iter().find(|p| p.id() == id).cloned()
    }

    pub async fn get_player_ids(&self) -> Vec<String> {
        let players = self.players.read().await;
        players.iter().map(|p| p.id().to_string()).collect()
    }

    /// The highest-priority player accepting both the media type and the
    /// item. Ties go to the earliest registered.
    pub async fn select_player(
        &self,
        media_type: &MediaType,
        item: &MediaItem,
    ) -> Option<Arc<dyn MediaPlayer>> {
        let players = self.players.read().await;
        let mut best: Option<&Arc<dyn MediaPlayer>> = None;

        for player in players.iter() {
            if !player.can_play_media_type(media_type) || !player.can_play_item(item) {
                continue;
            }
            if best.map_or(true, |b| player.priority() > b.priority()) {
                best = Some(player);
            }
        }

        best.cloned()
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
