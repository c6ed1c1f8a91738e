/// Row types mapping SQLite rows one to one.
/// Kept separate from the carols-types API models so the DB layer stays
/// independent of the wire shapes.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
    pub created_at: String,
}

pub struct ThreadRow {
    pub id: String,
    pub name: String,
    pub created_by: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub thread_id: String,
    pub user_id: String,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
}
