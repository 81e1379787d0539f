use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, tokens, friendships)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE tokens (
                key         TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE friend_requests (
                id          TEXT PRIMARY KEY,
                from_user   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                to_user     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(from_user, to_user),
                CHECK(from_user <> to_user)
            );

            CREATE INDEX idx_friend_requests_to
                ON friend_requests(to_user);

            -- One row per user, created on first acceptance and never deleted.
            CREATE TABLE friend_lists (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE friend_list_members (
                list_id     TEXT NOT NULL REFERENCES friend_lists(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (list_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
