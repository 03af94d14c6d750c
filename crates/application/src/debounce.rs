use std::time::{Duration, Instant};

/// Fires once after input has been quiet for `delay`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    last_edit: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_edit: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_edit = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_edit.is_some()
    }

    pub fn fire(&mut self, now: Instant) -> bool {
        match self.last_edit {
            Some(edit) if now.saturating_duration_since(edit) >= self.delay => {
                self.last_edit = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.last_edit = None;
    }
}
