use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// How long the composer stays "typing" after the last keystroke before a
/// stop signal goes out.
pub const TYPING_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Receivers drop a typing name this long after its last start signal, as a
/// safety net against a lost stop event.
pub const TYPING_EXPIRY: Duration = Duration::from_secs(6);

/// Outbound typing signal for the active thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

/// Composer-side debounce: one start signal per idle window, one stop on
/// timeout or submit. Deadlines are plain values swept by the caller, so
/// nothing fires after a reset.
#[derive(Debug, Default)]
pub struct TypingDebounce {
    deadline: Option<Instant>,
}

impl TypingDebounce {
    pub fn new() -> Self {
        Self::default()
    }

    /// A keystroke. Emits `Start` only when no window is armed; keystrokes
    /// inside the window just push the stop deadline out.
    pub fn keystroke(&mut self, now: Instant) -> Option<TypingSignal> {
        let was_armed = self.deadline.is_some();
        self.deadline = Some(now + TYPING_IDLE_TIMEOUT);
        (!was_armed).then_some(TypingSignal::Start)
    }

    /// Message submitted: always an immediate stop, and the window disarms.
    pub fn submit(&mut self) -> TypingSignal {
        self.deadline = None;
        TypingSignal::Stop
    }

    /// Emits `Stop` once the idle window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<TypingSignal> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(TypingSignal::Stop)
            }
            _ => None,
        }
    }

    /// Disarm without emitting anything (thread change, teardown).
    pub fn reset(&mut self) {
        self.deadline = None;
    }
}

/// Receiver-side typing lists, one per thread, rebuilt independently by
/// every session. Names keep arrival order.
#[derive(Debug, Default)]
pub struct TypingRoster {
    threads: HashMap<Uuid, Vec<TypingEntry>>,
}

#[derive(Debug)]
struct TypingEntry {
    username: String,
    expires_at: Instant,
}

impl TypingRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A start signal: add the name, or refresh its expiry.
    pub fn apply_start(&mut self, thread_id: Uuid, username: &str, now: Instant) {
        let entries = self.threads.entry(thread_id).or_default();
        let expires_at = now + TYPING_EXPIRY;
        match entries.iter_mut().find(|e| e.username == username) {
            Some(entry) => entry.expires_at = expires_at,
            None => entries.push(TypingEntry {
                username: username.to_string(),
                expires_at,
            }),
        }
    }

    /// A stop signal removes the name immediately.
    pub fn apply_stop(&mut self, thread_id: Uuid, username: &str) {
        if let Some(entries) = self.threads.get_mut(&thread_id) {
            entries.retain(|e| e.username != username);
        }
    }

    /// Sweep names whose start signal has gone stale.
    pub fn expire(&mut self, now: Instant) {
        for entries in self.threads.values_mut() {
            entries.retain(|e| e.expires_at > now);
        }
        self.threads.retain(|_, entries| !entries.is_empty());
    }

    pub fn typing_in(&self, thread_id: Uuid) -> Vec<&str> {
        self.threads
            .get(&thread_id)
            .map(|entries| entries.iter().map(|e| e.username.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn clear_thread(&mut self, thread_id: Uuid) {
        self.threads.remove(&thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_sends_one_start_per_window() {
        let mut debounce = TypingDebounce::new();
        let t0 = Instant::now();

        assert_eq!(debounce.keystroke(t0), Some(TypingSignal::Start));
        assert_eq!(debounce.keystroke(t0 + Duration::from_secs(1)), None);
        assert_eq!(debounce.keystroke(t0 + Duration::from_secs(2)), None);

        // last keystroke at t0+2s, so the stop fires at t0+7s
        assert_eq!(debounce.poll(t0 + Duration::from_secs(6)), None);
        assert_eq!(
            debounce.poll(t0 + Duration::from_secs(7)),
            Some(TypingSignal::Stop)
        );

        // window disarmed: the next keystroke starts again
        assert_eq!(
            debounce.keystroke(t0 + Duration::from_secs(8)),
            Some(TypingSignal::Start)
        );
    }

    #[test]
    fn submit_stops_immediately() {
        let mut debounce = TypingDebounce::new();
        let t0 = Instant::now();

        debounce.keystroke(t0);
        assert_eq!(debounce.submit(), TypingSignal::Stop);

        // nothing left to time out
        assert_eq!(debounce.poll(t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn reset_disarms_without_emitting() {
        let mut debounce = TypingDebounce::new();
        let t0 = Instant::now();

        debounce.keystroke(t0);
        debounce.reset();
        assert_eq!(debounce.poll(t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn roster_expires_stale_names() {
        let mut roster = TypingRoster::new();
        let thread = Uuid::new_v4();
        let t0 = Instant::now();

        roster.apply_start(thread, "tim", t0);
        assert_eq!(roster.typing_in(thread), vec!["tim"]);

        // still there just before the deadline
        roster.expire(t0 + TYPING_EXPIRY - Duration::from_millis(1));
        assert_eq!(roster.typing_in(thread), vec!["tim"]);

        roster.expire(t0 + TYPING_EXPIRY);
        assert!(roster.typing_in(thread).is_empty());
    }

    #[test]
    fn repeat_start_refreshes_expiry() {
        let mut roster = TypingRoster::new();
        let thread = Uuid::new_v4();
        let t0 = Instant::now();

        roster.apply_start(thread, "tim", t0);
        roster.apply_start(thread, "tim", t0 + Duration::from_secs(4));

        roster.expire(t0 + Duration::from_secs(7));
        assert_eq!(roster.typing_in(thread), vec!["tim"]);
    }

    #[test]
    fn stop_removes_immediately_and_lists_are_per_thread() {
        let mut roster = TypingRoster::new();
        let carols = Uuid::new_v4();
        let general = Uuid::new_v4();
        let t0 = Instant::now();

        roster.apply_start(carols, "tim", t0);
        roster.apply_start(carols, "dami", t0);
        roster.apply_start(general, "tim", t0);

        roster.apply_stop(carols, "tim");
        assert_eq!(roster.typing_in(carols), vec!["dami"]);
        assert_eq!(roster.typing_in(general), vec!["tim"]);

        roster.clear_thread(general);
        assert!(roster.typing_in(general).is_empty());
    }
}
