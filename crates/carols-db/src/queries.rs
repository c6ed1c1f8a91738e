use crate::Database;
use crate::models::{MessageRow, ThreadRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, is_admin: bool, created_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, is_admin, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, username, is_admin, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Overwrite a user's display name. Returns false when no such user
    /// exists. The admin flag is untouched.
    pub fn update_username(&self, id: &str, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET username = ?1 WHERE id = ?2",
                (username, id),
            )?;
            Ok(changed > 0)
        })
    }

    // -- Threads --

    pub fn list_threads(&self) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, created_by, created_at FROM threads
                 ORDER BY created_at ASC, rowid ASC",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(ThreadRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_by: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn insert_thread(&self, id: &str, name: &str, created_by: Option<&str>, created_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO threads (id, name, created_by, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, name, created_by, created_at],
            )?;
            Ok(())
        })
    }

    /// Seed the default thread list in one transaction: either every name is
    /// inserted, in order, or nothing changes. Returns `None` without
    /// inserting when any thread already exists.
    pub fn seed_threads(&self, names: &[&str], created_by: &str, created_at: &str) -> Result<Option<Vec<ThreadRow>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: i64 = tx.query_row("SELECT COUNT(*) FROM threads", [], |row| row.get(0))?;
            if existing > 0 {
                return Ok(None);
            }

            let mut rows = Vec::with_capacity(names.len());
            for name in names {
                let id = uuid::Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO threads (id, name, created_by, created_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id, name, created_by, created_at],
                )?;
                rows.push(ThreadRow {
                    id,
                    name: (*name).to_string(),
                    created_by: Some(created_by.to_string()),
                    created_at: created_at.to_string(),
                });
            }

            tx.commit()?;
            Ok(Some(rows))
        })
    }

    /// Remove a thread. Messages and thread views cascade away with it.
    /// Returns false when no such thread exists.
    pub fn delete_thread(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM threads WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, id: &str, thread_id: &str, user_id: &str, content: &str, created_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, thread_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, thread_id, user_id, content, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_messages(&self, thread_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, thread_id))
    }

    pub fn count_messages(&self, thread_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE thread_id = ?1",
                [thread_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    // -- Thread views --

    /// Record that a user has seen a thread as of `viewed_at`. Keyed by
    /// (user, thread), so repeated calls overwrite rather than duplicate.
    pub fn upsert_thread_view(&self, user_id: &str, thread_id: &str, viewed_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO thread_views (user_id, thread_id, last_viewed_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, thread_id) DO UPDATE SET last_viewed_at = excluded.last_viewed_at",
                rusqlite::params![user_id, thread_id, viewed_at],
            )?;
            Ok(())
        })
    }

    pub fn get_thread_view(&self, user_id: &str, thread_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| query_thread_view(conn, user_id, thread_id))
    }

    /// Per-thread unread counts for a user: messages strictly after the last
    /// view, or the thread's total when it has never been viewed. Each
    /// thread is computed independently.
    pub fn unread_counts(&self, user_id: &str, thread_ids: &[String]) -> Result<Vec<(String, u64)>> {
        self.with_conn(|conn| {
            let mut counts = Vec::with_capacity(thread_ids.len());
            for thread_id in thread_ids {
                let unread: i64 = match query_thread_view(conn, user_id, thread_id)? {
                    Some(last_viewed) => conn.query_row(
                        "SELECT COUNT(*) FROM messages WHERE thread_id = ?1 AND created_at > ?2",
                        (thread_id, &last_viewed),
                        |row| row.get(0),
                    )?,
                    None => conn.query_row(
                        "SELECT COUNT(*) FROM messages WHERE thread_id = ?1",
                        [thread_id],
                        |row| row.get(0),
                    )?,
                };
                counts.push((thread_id.clone(), unread as u64));
            }
            Ok(counts)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, is_admin, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                is_admin: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_thread_view(conn: &Connection, user_id: &str, thread_id: &str) -> Result<Option<String>> {
    let viewed = conn
        .query_row(
            "SELECT last_viewed_at FROM thread_views WHERE user_id = ?1 AND thread_id = ?2",
            (user_id, thread_id),
            |row| row.get(0),
        )
        .optional()?;

    Ok(viewed)
}

fn query_messages(conn: &Connection, thread_id: &str) -> Result<Vec<MessageRow>> {
    // JOIN users to fetch the author's name in a single query
    let mut stmt = conn.prepare(
        "SELECT m.id, m.thread_id, m.user_id, u.username, m.content, m.created_at
         FROM messages m
         LEFT JOIN users u ON m.user_id = u.id
         WHERE m.thread_id = ?1
         ORDER BY m.created_at ASC, m.rowid ASC",
    )?;

    let rows = stmt
        .query_map([thread_id], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                thread_id: row.get(1)?,
                user_id: row.get(2)?,
                author_username: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
                content: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: [&str; 3] = ["General", "Marina Prior", "Denis Walter"];

    fn db_with_user(user_id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(user_id, "carol", true, "2025-12-01T00:00:00.000000Z").unwrap();
        db
    }

    #[test]
    fn seed_is_all_or_nothing_and_ordered() {
        let db = db_with_user("u1");

        let rows = db.seed_threads(&DEFAULTS, "u1", "2025-12-01T00:00:01.000000Z").unwrap().unwrap();
        assert_eq!(rows.len(), 3);

        let listed = db.list_threads().unwrap();
        let names: Vec<&str> = listed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, DEFAULTS);

        // second seed refuses without touching anything
        assert!(db.seed_threads(&DEFAULTS, "u1", "2025-12-01T00:00:02.000000Z").unwrap().is_none());
        assert_eq!(db.list_threads().unwrap().len(), 3);
    }

    #[test]
    fn delete_thread_cascades_to_messages_and_views() {
        let db = db_with_user("u1");
        db.insert_thread("t1", "General", Some("u1"), "2025-12-01T00:00:01.000000Z").unwrap();
        db.insert_message("m1", "t1", "u1", "hello", "2025-12-01T00:00:02.000000Z").unwrap();
        db.upsert_thread_view("u1", "t1", "2025-12-01T00:00:03.000000Z").unwrap();

        assert!(db.delete_thread("t1").unwrap());
        assert!(!db.delete_thread("t1").unwrap()); // already gone

        assert_eq!(db.count_messages("t1").unwrap(), 0);
        assert!(db.get_thread_view("u1", "t1").unwrap().is_none());
    }

    #[test]
    fn unread_counts_are_strictly_after_last_view() {
        let db = db_with_user("u1");
        db.create_user("u2", "reader", false, "2025-12-01T00:00:00.000000Z").unwrap();
        db.insert_thread("t1", "General", Some("u1"), "2025-12-01T00:00:01.000000Z").unwrap();

        db.insert_message("m1", "t1", "u1", "before", "2025-12-01T00:00:02.000000Z").unwrap();
        db.insert_message("m2", "t1", "u1", "at view", "2025-12-01T00:00:03.000000Z").unwrap();
        db.insert_message("m3", "t1", "u1", "after", "2025-12-01T00:00:04.000000Z").unwrap();

        let ids = vec!["t1".to_string()];

        // never viewed: every message counts
        assert_eq!(db.unread_counts("u2", &ids).unwrap(), vec![("t1".to_string(), 3)]);

        // a message at exactly the viewed timestamp is not unread
        db.upsert_thread_view("u2", "t1", "2025-12-01T00:00:03.000000Z").unwrap();
        assert_eq!(db.unread_counts("u2", &ids).unwrap(), vec![("t1".to_string(), 1)]);

        // viewing again resets to zero
        db.upsert_thread_view("u2", "t1", "2025-12-01T00:00:05.000000Z").unwrap();
        assert_eq!(db.unread_counts("u2", &ids).unwrap(), vec![("t1".to_string(), 0)]);
    }

    #[test]
    fn repeated_views_overwrite_one_row() {
        let db = db_with_user("u1");
        db.insert_thread("t1", "General", Some("u1"), "2025-12-01T00:00:01.000000Z").unwrap();

        db.upsert_thread_view("u1", "t1", "2025-12-01T00:00:02.000000Z").unwrap();
        db.upsert_thread_view("u1", "t1", "2025-12-01T00:00:09.000000Z").unwrap();

        assert_eq!(
            db.get_thread_view("u1", "t1").unwrap().as_deref(),
            Some("2025-12-01T00:00:09.000000Z")
        );
    }

    #[test]
    fn messages_join_author_names_in_order() {
        let db = db_with_user("u1");
        db.create_user("u2", "tim", false, "2025-12-01T00:00:00.000000Z").unwrap();
        db.insert_thread("t1", "General", Some("u1"), "2025-12-01T00:00:01.000000Z").unwrap();

        db.insert_message("m1", "t1", "u1", "first", "2025-12-01T00:00:02.000000Z").unwrap();
        db.insert_message("m2", "t1", "u2", "second", "2025-12-01T00:00:03.000000Z").unwrap();

        let messages = db.get_messages("t1").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[0].author_username, "carol");
        assert_eq!(messages[1].author_username, "tim");
    }

    #[test]
    fn rename_preserves_admin_flag() {
        let db = db_with_user("u1");

        assert!(db.update_username("u1", "caroline").unwrap());
        let user = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.username, "caroline");
        assert!(user.is_admin);

        assert!(!db.update_username("nope", "x").unwrap());
    }
}
