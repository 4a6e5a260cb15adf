use crate::models::{MediaItem, RepeatMode};

/// The items of the current playback request and the position within them.
#[derive(Default)]
pub struct PlayQueue {
    items: Vec<MediaItem>,
    current_index: Option<usize>,
    pub repeat: RepeatMode,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the items. An out of range start falls back to the first.
    pub fn set_items(&mut self, items: Vec<MediaItem>, start_index: usize) {
        self.items = items;
        self.current_index = if self.items.is_empty() {
            None
        } else if start_index < self.items.len() {
            Some(start_index)
        } else {
            Some(0)
        };
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn get_current_item(&self) -> Option<MediaItem> {
        self.current_index.and_then(|idx| self.items.get(idx).cloned())
    }

    /// Advances and returns the new current item. A manual skip ignores
    /// repeat-one.
    pub fn get_next_item(&mut self, manual_skip: bool) -> Option<MediaItem> {
        if !manual_skip && self.repeat == RepeatMode::RepeatOne {
            if let Some(item) = self.get_current_item() {
                return Some(item);
            }
        }

        let next_idx = match self.current_index {
            Some(idx) => idx + 1,
            None => 0,
        };

        if next_idx >= self.items.len() {
            if self.repeat == RepeatMode::RepeatAll && !self.items.is_empty() {
                self.current_index = Some(0);
                return self.items.first().cloned();
            }
            return None;
        }

        self.current_index = Some(next_idx);
        self.items.get(next_idx).cloned()
    }

    pub fn get_prev_item(&mut self) -> Option<MediaItem> {
        if self.items.is_empty() {
            return None;
        }

        let prev_idx = match self.current_index {
            Some(0) if self.repeat == RepeatMode::RepeatAll => self.items.len() - 1,
            Some(0) | None => 0,
            Some(idx) => idx - 1,
        };

        self.current_index = Some(prev_idx);
        self.items.get(prev_idx).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;

    fn queue(count: usize) -> PlayQueue {
        let mut queue = PlayQueue::new();
        let items = (0..count)
            .map(|i| MediaItem::new(i.to_string(), MediaType::Audio))
            .collect();
        queue.set_items(items, 0);
        queue
    }

    fn id(item: Option<MediaItem>) -> Option<String> {
        item.map(|i| i.id)
    }

    #[test]
    fn test_next_stops_at_end_without_repeat() {
        let mut queue = queue(2);
        assert_eq!(id(queue.get_next_item(true)), Some("1".into()));
        assert_eq!(id(queue.get_next_item(true)), None);
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_repeat_all_wraps_both_ways() {
        let mut queue = queue(3);
        queue.repeat = RepeatMode::RepeatAll;

        assert_eq!(id(queue.get_prev_item()), Some("2".into()));
        assert_eq!(id(queue.get_next_item(false)), Some("0".into()));
    }

    #[test]
    fn test_repeat_one_only_holds_automatic_advance() {
        let mut queue = queue(3);
        queue.repeat = RepeatMode::RepeatOne;

        assert_eq!(id(queue.get_next_item(false)), Some("0".into()));
        assert_eq!(id(queue.get_next_item(true)), Some("1".into()));
    }

    #[test]
    fn test_start_index_out_of_range() {
        let mut queue = queue(0);
        assert_eq!(queue.get_current_item(), None);
        assert_eq!(queue.get_prev_item(), None);

        queue.set_items(vec![MediaItem::new("a", MediaType::Photo)], 7);
        assert_eq!(queue.current_index(), Some(0));
    }
}
