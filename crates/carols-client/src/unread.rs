use std::collections::HashMap;

use uuid::Uuid;

/// Per-thread unread counters: seeded from the store's computed counts,
/// then incremented locally as message notifications arrive.
#[derive(Debug, Default)]
pub struct UnreadTracker {
    counts: HashMap<Uuid, u64>,
}

impl UnreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every counter with a fresh store-side computation.
    pub fn replace(&mut self, counts: HashMap<Uuid, u64>) {
        self.counts = counts;
    }

    /// Opening a thread resets its counter to zero.
    pub fn mark_viewed(&mut self, thread_id: Uuid) {
        self.counts.insert(thread_id, 0);
    }

    /// Incremental rule for an incoming message notification: any message
    /// authored by someone else bumps the thread's counter without a store
    /// round trip. The currently open thread counts too; its badge clears
    /// again on the next explicit view.
    pub fn on_message(&mut self, thread_id: Uuid, author_id: Uuid, me: Uuid) {
        if author_id != me {
            *self.counts.entry(thread_id).or_insert(0) += 1;
        }
    }

    pub fn count(&self, thread_id: Uuid) -> u64 {
        self.counts.get(&thread_id).copied().unwrap_or(0)
    }

    pub fn remove_thread(&mut self, thread_id: Uuid) {
        self.counts.remove(&thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_messages_never_count() {
        let mut tracker = UnreadTracker::new();
        let thread = Uuid::new_v4();
        let me = Uuid::new_v4();

        tracker.on_message(thread, me, me);
        assert_eq!(tracker.count(thread), 0);

        tracker.on_message(thread, Uuid::new_v4(), me);
        tracker.on_message(thread, Uuid::new_v4(), me);
        assert_eq!(tracker.count(thread), 2);
    }

    #[test]
    fn viewing_resets_to_zero() {
        let mut tracker = UnreadTracker::new();
        let thread = Uuid::new_v4();
        let me = Uuid::new_v4();

        tracker.replace(HashMap::from([(thread, 7)]));
        assert_eq!(tracker.count(thread), 7);

        tracker.mark_viewed(thread);
        assert_eq!(tracker.count(thread), 0);

        tracker.on_message(thread, Uuid::new_v4(), me);
        assert_eq!(tracker.count(thread), 1);
    }
}
