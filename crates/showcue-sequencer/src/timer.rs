//! Deadline queue polled from the periodic tick.

use std::time::Instant;

#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: Vec<(Instant, T)>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn schedule(&mut self, at: Instant, value: T) {
        self.entries.push((at, value));
    }

    /// Remove and return every entry due at `now`, earliest first.
    ///
    /// Entries with the same deadline come out in scheduling order.
    pub fn expired(&mut self, now: Instant) -> Vec<T> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|(at, _)| *at <= now);
        self.entries = pending;
        due.sort_by_key(|(at, _)| *at);
        due.into_iter().map(|(_, value)| value).collect()
    }

    /// Drop every entry matching `predicate`.
    pub fn cancel(&mut self, mut predicate: impl FnMut(&T) -> bool) {
        self.entries.retain(|(_, value)| !predicate(value));
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|(at, _)| *at).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_expired_in_deadline_order() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::default();
        timers.schedule(t0 + Duration::from_millis(300), "late");
        timers.schedule(t0 + Duration::from_millis(100), "early");
        timers.schedule(t0 + Duration::from_secs(5), "later");
        timers.schedule(t0 + Duration::from_millis(100), "early-too");

        assert!(timers.expired(t0).is_empty());
        assert_eq!(
            timers.expired(t0 + Duration::from_millis(400)),
            vec!["early", "early-too", "late"]
        );
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_cancel() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::default();
        timers.schedule(t0, 1);
        timers.schedule(t0, 2);
        timers.cancel(|v| *v == 1);
        assert_eq!(timers.expired(t0), vec![2]);
        assert!(timers.is_empty());
    }
}
