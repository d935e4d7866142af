use std::time::{Duration, Instant};

/// Trailing-edge debounce for scroll events.
///
/// Each scroll re-arms the timer; once `delay` passes without another scroll,
/// [`poll`](Self::poll) yields the latest remaining distance exactly once.
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    delay: Duration,
    deadline: Option<Instant>,
    remaining: usize,
}

impl ScrollTrigger {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            remaining: usize::MAX,
        }
    }

    /// Record a scroll with `remaining` items left below the selection.
    pub fn on_scroll(&mut self, remaining: usize, now: Instant) {
        self.remaining = remaining;
        self.deadline = Some(now + self.delay);
    }

    pub fn poll(&mut self, now: Instant) -> Option<usize> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(self.remaining)
            }
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(120);

    #[test]
    fn fires_once_after_quiet_period() {
        let start = Instant::now();
        let mut trigger = ScrollTrigger::new(DELAY);

        trigger.on_scroll(2, start);
        assert_eq!(trigger.poll(start + Duration::from_millis(50)), None);
        assert_eq!(trigger.poll(start + DELAY), Some(2));
        assert_eq!(trigger.poll(start + DELAY * 2), None);
    }

    #[test]
    fn rapid_scrolls_coalesce_to_the_latest_position() {
        let start = Instant::now();
        let mut trigger = ScrollTrigger::new(DELAY);

        for (i, remaining) in [9, 6, 3, 1].into_iter().enumerate() {
            trigger.on_scroll(remaining, start + Duration::from_millis(40 * i as u64));
        }
        // The last scroll was at 120 ms, so nothing fires before 240 ms.
        assert_eq!(trigger.poll(start + Duration::from_millis(200)), None);
        assert_eq!(trigger.poll(start + Duration::from_millis(240)), Some(1));
    }

    #[test]
    fn cancel_disarms() {
        let start = Instant::now();
        let mut trigger = ScrollTrigger::new(DELAY);
        trigger.on_scroll(0, start);
        assert!(trigger.deadline.is_some());

        trigger.cancel();
        assert_eq!(trigger.poll(start + DELAY), None);
    }
}
