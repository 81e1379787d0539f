//! Database row types. These map directly to SQLite rows and stay separate
//! from the amity-types wire models.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

/// A pending friend request with both ends resolved to usernames.
#[derive(Debug, Clone)]
pub struct FriendRequestRow {
    pub id: String,
    pub from_username: String,
    pub to_username: String,
    pub created_at: String,
}

/// Everything needed to insert a freshly registered account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub token: String,
}
