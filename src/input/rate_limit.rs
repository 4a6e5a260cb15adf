use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::Command;

/// Drops repeats of rate-sensitive commands that arrive inside the window.
pub struct RateLimiter {
    window_ms: u64,
    limited: HashSet<Command>,
    last_fired: Mutex<HashMap<Command, u64>>,
}

impl RateLimiter {
    pub fn new(limited: HashSet<Command>, window_ms: u64) -> Self {
        Self {
            window_ms,
            limited,
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_limited(&self, command: Command) -> bool {
        self.limited.contains(&command)
    }

    /// Returns true and records `now_ms` when `command` may fire.
    /// Commands outside the limited set always fire and are not recorded.
    pub fn try_fire(&self, command: Command, now_ms: u64) -> bool {
        if !self.is_limited(command) {
            return true;
        }

        let mut last_fired = self.last_fired.lock();
        if let Some(&last) = last_fired.get(&command) {
            if now_ms.saturating_sub(last) < self.window_ms {
                return false;
            }
        }

        last_fired.insert(command, now_ms);
        true
    }
}
