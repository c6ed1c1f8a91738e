use std::collections::HashMap;

use uuid::Uuid;

/// The online-user set, rebuilt from presence announcements. Tracked per
/// user id; the displayed list is the deduplicated set of names.
#[derive(Debug, Default)]
pub struct PresenceRoster {
    online: HashMap<Uuid, String>,
}

impl PresenceRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, user_id: Uuid, username: &str, online: bool) {
        if online {
            self.online.insert(user_id, username.to_string());
        } else {
            self.online.remove(&user_id);
        }
    }

    /// A rename only changes the display name of an already-online user.
    pub fn rename(&mut self, user_id: Uuid, username: &str) {
        if let Some(name) = self.online.get_mut(&user_id) {
            *name = username.to_string();
        }
    }

    /// Deduplicated display names, sorted for a stable listing.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.online.values().cloned().collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn count(&self) -> usize {
        self.names().len()
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.online.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_deduplicate_and_drop_on_offline() {
        let mut roster = PresenceRoster::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        roster.apply(a, "carol", true);
        roster.apply(b, "carol", true);
        assert_eq!(roster.names(), vec!["carol"]);
        assert_eq!(roster.count(), 1);

        roster.apply(a, "carol", false);
        assert_eq!(roster.names(), vec!["carol"]);

        roster.apply(b, "carol", false);
        assert!(roster.names().is_empty());
    }

    #[test]
    fn rename_only_touches_online_users() {
        let mut roster = PresenceRoster::new();
        let a = Uuid::new_v4();

        roster.rename(a, "ghost");
        assert!(roster.names().is_empty());

        roster.apply(a, "carol", true);
        roster.rename(a, "caroline");
        assert_eq!(roster.names(), vec!["caroline"]);
    }
}
