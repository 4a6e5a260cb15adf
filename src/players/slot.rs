use parking_lot::Mutex;

use crate::errors::PlayerError;

/// The single playback surface shared by all players.
///
/// A player acquires it when `play()` starts and releases it at the end of
/// `stop()`. Acquiring while another player holds it fails.
#[derive(Default)]
pub struct ResourceSlot {
    owner: Mutex<Option<String>>,
}

impl ResourceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-acquiring by the current owner succeeds.
    pub fn acquire(&self, player_id: &str) -> Result<(), PlayerError> {
        let mut owner = self.owner.lock();
        match owner.as_deref() {
            Some(current) if current != player_id => {
                Err(PlayerError::SlotBusy(current.to_string()))
            }
            _ => {
                *owner = Some(player_id.to_string());
                Ok(())
            }
        }
    }

    /// Returns false when `player_id` did not hold the slot.
    pub fn release(&self, player_id: &str) -> bool {
        let mut owner = self.owner.lock();
        if owner.as_deref() == Some(player_id) {
            *owner = None;
            true
        } else {
            false
        }
    }

    pub fn owner(&self) -> Option<String> {
        self.owner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_owner() {
        let slot = ResourceSlot::new();
        slot.acquire("audio").unwrap();
        slot.acquire("audio").unwrap();

        assert_eq!(slot.acquire("book"), Err(PlayerError::SlotBusy("audio".into())));
        assert!(!slot.release("book"));
        assert!(slot.release("audio"));
        slot.acquire("book").unwrap();
        assert_eq!(slot.owner().as_deref(), Some("book"));
    }
}
