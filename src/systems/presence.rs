use std::time::{Duration, SystemTime};

use log::debug;

/// Tracks whether a hand is currently in view. A hand only counts as "lost"
/// after it has been missing for longer than the timeout, so that a few
/// dropped detections do not flicker the presence state.
pub struct HandPresence {
    present: bool,
    last_seen: Option<SystemTime>,
    timeout: Duration,
}

impl HandPresence {
    pub fn new(timeout: Duration) -> Self {
        HandPresence {
            present: false,
            last_seen: None,
            timeout,
        }
    }

    #[cfg(test)]
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Returns Some(new state) only when the presence state changed
    pub fn update(&mut self, hand_seen: bool) -> Option<bool> {
        if hand_seen {
            self.last_seen = Some(SystemTime::now());
            if !self.present {
                self.present = true;
                debug!("Hand found");
                return Some(true);
            }
        } else if let Some(timestamp) = self.last_seen {
            if self.present && timestamp.elapsed().unwrap_or_default() > self.timeout {
                self.present = false;
                debug!("Hand lost");
                return Some(false);
            }
        }
        None
    }
}

impl Default for HandPresence {
    fn default() -> Self {
        HandPresence::new(Duration::from_millis(500))
    }
}
