//! Friend request lifecycle and the symmetric friendship edge.
//!
//! Each public operation runs its whole check-and-mutate sequence inside one
//! transaction, so concurrent calls for the same pair of users are applied
//! one after another and a rejected call leaves no trace.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;

use amity_types::models::AuthUser;

use crate::Database;
use crate::models::UserRow;
use crate::queries::{now_timestamp, query_user_by_username};

#[derive(Debug, Error)]
pub enum FriendshipError {
    #[error("User {0} does not exist")]
    UserNotFound(String),

    #[error("You cannot add yourself as a friend")]
    SelfReference,

    #[error("You are already friends with {0}")]
    AlreadyFriends(String),

    #[error("There is no friend request from {0}")]
    NoSuchRequest(String),

    #[error("{0} is not your friend")]
    NotFriends(String),

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

pub type FriendshipResult<T> = std::result::Result<T, FriendshipError>;

/// Non-error results of [`Database::send_request`]. Each carries the
/// target's username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// A new pending request was stored.
    RequestSent(String),
    /// The target had already asked the caller, so the two became friends.
    AddedAsFriend(String),
    /// The same request is still pending; nothing changed.
    AlreadyRequested(String),
}

impl Database {
    pub fn send_request(
        &self,
        caller: &AuthUser,
        target: &str,
    ) -> FriendshipResult<SendOutcome> {
        let caller_id = caller.id.to_string();

        self.with_tx(|tx| -> FriendshipResult<SendOutcome> {
            let target = find_user(tx, target)?;
            if target.id == caller_id {
                return Err(FriendshipError::SelfReference);
            }
            if are_friends(tx, &caller_id, &target.id)? {
                return Err(FriendshipError::AlreadyFriends(target.username));
            }
            if request_exists(tx, &caller_id, &target.id)? {
                return Ok(SendOutcome::AlreadyRequested(target.username));
            }

            // Reverse request pending: finalize instead of storing a second one
            if request_exists(tx, &target.id, &caller_id)? {
                link(tx, &caller_id, &target.id)?;
                delete_request(tx, &target.id, &caller_id)?;
                return Ok(SendOutcome::AddedAsFriend(target.username));
            }

            tx.execute(
                "INSERT INTO friend_requests (id, from_user, to_user, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (Uuid::new_v4().to_string(), &caller_id, &target.id, now_timestamp()),
            )
            .map_err(anyhow::Error::from)?;
            Ok(SendOutcome::RequestSent(target.username))
        })
    }

    /// Accept the pending request `sender -> caller`. Returns the sender's username.
    pub fn accept_request(
        &self,
        caller: &AuthUser,
        sender: &str,
    ) -> FriendshipResult<String> {
        let caller_id = caller.id.to_string();

        self.with_tx(|tx| -> FriendshipResult<String> {
            let sender = find_user(tx, sender)?;
            if !request_exists(tx, &sender.id, &caller_id)? {
                return Err(FriendshipError::NoSuchRequest(sender.username));
            }

            link(tx, &sender.id, &caller_id)?;
            delete_request(tx, &sender.id, &caller_id)?;
            Ok(sender.username)
        })
    }

    /// Drop the pending request `sender -> caller` without befriending.
    pub fn reject_request(
        &self,
        caller: &AuthUser,
        sender: &str,
    ) -> FriendshipResult<String> {
        let caller_id = caller.id.to_string();

        self.with_tx(|tx| -> FriendshipResult<String> {
            let sender = find_user(tx, sender)?;
            if !delete_request(tx, &sender.id, &caller_id)? {
                return Err(FriendshipError::NoSuchRequest(sender.username));
            }
            Ok(sender.username)
        })
    }

    /// Remove the friendship edge between the caller and `target` from both sides.
    pub fn delete_friend(
        &self,
        caller: &AuthUser,
        target: &str,
    ) -> FriendshipResult<String> {
        let caller_id = caller.id.to_string();

        self.with_tx(|tx| -> FriendshipResult<String> {
            let target = find_user(tx, target)?;
            if target.id == caller_id {
                return Err(FriendshipError::SelfReference);
            }
            if !are_friends(tx, &caller_id, &target.id)? {
                return Err(FriendshipError::NotFriends(target.username));
            }

            unlink(tx, &caller_id, &target.id)?;
            Ok(target.username)
        })
    }

    pub fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        self.with_conn(|conn| are_friends(conn, a, b))
    }
}

fn find_user(conn: &Connection, username: &str) -> FriendshipResult<UserRow> {
    query_user_by_username(conn, username)?
        .ok_or_else(|| FriendshipError::UserNotFound(username.to_string()))
}

fn request_exists(conn: &Connection, from: &str, to: &str) -> Result<bool> {
    let found = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM friend_requests WHERE from_user = ?1 AND to_user = ?2)",
        [from, to],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Returns whether a row was deleted.
fn delete_request(conn: &Connection, from: &str, to: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM friend_requests WHERE from_user = ?1 AND to_user = ?2",
        [from, to],
    )?;
    Ok(deleted > 0)
}

/// Whether `peer` is in `owner`'s friend list.
fn are_friends(conn: &Connection, owner: &str, peer: &str) -> Result<bool> {
    let found = conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM friend_lists l
             JOIN friend_list_members m ON m.list_id = l.id
             WHERE l.owner_id = ?1 AND m.user_id = ?2)",
        [owner, peer],
        |row| row.get(0),
    )?;
    Ok(found)
}

fn get_or_create_list(conn: &Connection, owner: &str) -> Result<String> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM friend_lists WHERE owner_id = ?1", [owner], |row| {
            row.get(0)
        })
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO friend_lists (id, owner_id) VALUES (?1, ?2)",
        [id.as_str(), owner],
    )?;
    Ok(id)
}

/// Add each user to the other's friend list. Must run inside a transaction.
fn link(conn: &Connection, a: &str, b: &str) -> Result<()> {
    for (owner, peer) in [(a, b), (b, a)] {
        let list_id = get_or_create_list(conn, owner)?;
        conn.execute(
            "INSERT OR IGNORE INTO friend_list_members (list_id, user_id) VALUES (?1, ?2)",
            [list_id.as_str(), peer],
        )?;
    }
    Ok(())
}

/// Inverse of [`link`]. The lists themselves are kept, only emptied.
fn unlink(conn: &Connection, a: &str, b: &str) -> Result<()> {
    for (owner, peer) in [(a, b), (b, a)] {
        conn.execute(
            "DELETE FROM friend_list_members
             WHERE list_id = (SELECT id FROM friend_lists WHERE owner_id = ?1)
               AND user_id = ?2",
            [owner, peer],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegisterOutcome;
    use crate::models::NewUser;
    use std::sync::Arc;
    use std::thread;

    fn register(db: &Database, username: &str) -> AuthUser {
        let id = Uuid::new_v4();
        let outcome = db
            .register_user(&NewUser {
                id: id.to_string(),
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: "hash".to_string(),
                token: format!("token-{}", username),
            })
            .unwrap();
        assert!(matches!(outcome, RegisterOutcome::Created(_)));
        AuthUser {
            id,
            username: username.to_string(),
            email: format!("{}@example.com", username),
        }
    }

    fn pending_count(db: &Database) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM friend_requests", [], |r| r.get(0))?)
        })
        .unwrap()
    }

    fn edge_count(db: &Database) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM friend_list_members", [], |r| r.get(0))?)
        })
        .unwrap()
    }

    fn friends_both_ways(db: &Database, a: &AuthUser, b: &AuthUser) -> bool {
        let (a, b) = (a.id.to_string(), b.id.to_string());
        db.are_friends(&a, &b).unwrap() && db.are_friends(&b, &a).unwrap()
    }

    #[test]
    fn send_stores_pending_request_without_edge() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");

        let outcome = db.send_request(&alice, "bob").unwrap();
        assert_eq!(outcome, SendOutcome::RequestSent("bob".into()));
        assert_eq!(pending_count(&db), 1);
        assert_eq!(edge_count(&db), 0);

        let sent = db.sent_requests(&alice.id.to_string()).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from_username, "alice");
        assert_eq!(sent[0].to_username, "bob");
        assert_eq!(db.received_requests(&bob.id.to_string()).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_send_is_informational() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice");
        register(&db, "bob");

        db.send_request(&alice, "bob").unwrap();
        let again = db.send_request(&alice, "bob").unwrap();
        assert_eq!(again, SendOutcome::AlreadyRequested("bob".into()));
        assert_eq!(pending_count(&db), 1);
    }

    #[test]
    fn reverse_send_auto_resolves() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");

        db.send_request(&alice, "bob").unwrap();
        let outcome = db.send_request(&bob, "alice").unwrap();

        assert_eq!(outcome, SendOutcome::AddedAsFriend("alice".into()));
        assert_eq!(pending_count(&db), 0);
        assert_eq!(edge_count(&db), 2);
        assert!(friends_both_ways(&db, &alice, &bob));
        assert_eq!(db.friend_usernames(&alice.id.to_string()).unwrap(), vec!["bob"]);
        assert_eq!(db.friend_usernames(&bob.id.to_string()).unwrap(), vec!["alice"]);
        assert!(db.sent_requests(&alice.id.to_string()).unwrap().is_empty());
    }

    #[test]
    fn rejected_sends_leave_no_trace() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");

        assert!(matches!(
            db.send_request(&alice, "alice"),
            Err(FriendshipError::SelfReference)
        ));
        assert!(matches!(
            db.send_request(&alice, "nobody"),
            Err(FriendshipError::UserNotFound(name)) if name == "nobody"
        ));
        assert_eq!(pending_count(&db), 0);

        db.send_request(&alice, "bob").unwrap();
        db.accept_request(&bob, "alice").unwrap();

        assert!(matches!(
            db.send_request(&alice, "bob"),
            Err(FriendshipError::AlreadyFriends(name)) if name == "bob"
        ));
        assert!(matches!(
            db.send_request(&bob, "alice"),
            Err(FriendshipError::AlreadyFriends(_))
        ));
        assert_eq!(pending_count(&db), 0);
        assert_eq!(edge_count(&db), 2);
    }

    #[test]
    fn accept_links_both_sides_and_consumes_request() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");

        db.send_request(&alice, "bob").unwrap();
        assert_eq!(db.accept_request(&bob, "alice").unwrap(), "alice");

        assert_eq!(pending_count(&db), 0);
        assert!(friends_both_ways(&db, &alice, &bob));

        assert!(matches!(
            db.accept_request(&bob, "alice"),
            Err(FriendshipError::NoSuchRequest(name)) if name == "alice"
        ));
    }

    #[test]
    fn accept_requires_request_in_callers_direction() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice");
        register(&db, "bob");

        db.send_request(&alice, "bob").unwrap();
        // alice cannot accept her own outgoing request
        assert!(matches!(
            db.accept_request(&alice, "bob"),
            Err(FriendshipError::NoSuchRequest(_))
        ));
        assert!(matches!(
            db.accept_request(&alice, "ghost"),
            Err(FriendshipError::UserNotFound(_))
        ));
        assert_eq!(pending_count(&db), 1);
        assert_eq!(edge_count(&db), 0);
    }

    #[test]
    fn reject_deletes_request_without_linking() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");

        db.send_request(&alice, "bob").unwrap();
        assert_eq!(db.reject_request(&bob, "alice").unwrap(), "alice");
        assert_eq!(pending_count(&db), 0);
        assert!(!friends_both_ways(&db, &alice, &bob));
        assert_eq!(edge_count(&db), 0);

        assert!(matches!(
            db.reject_request(&bob, "alice"),
            Err(FriendshipError::NoSuchRequest(_))
        ));
    }

    #[test]
    fn delete_is_symmetric_and_allows_resend() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");

        db.send_request(&alice, "bob").unwrap();
        db.accept_request(&bob, "alice").unwrap();

        assert_eq!(db.delete_friend(&bob, "alice").unwrap(), "alice");
        assert_eq!(edge_count(&db), 0);
        assert!(db.friend_usernames(&alice.id.to_string()).unwrap().is_empty());

        // Lists are emptied, not dropped
        let lists: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM friend_lists", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(lists, 2);

        assert_eq!(
            db.send_request(&alice, "bob").unwrap(),
            SendOutcome::RequestSent("bob".into())
        );
    }

    #[test]
    fn delete_rejects_self_strangers_and_unknowns() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice");
        register(&db, "bob");

        assert!(matches!(
            db.delete_friend(&alice, "alice"),
            Err(FriendshipError::SelfReference)
        ));
        assert!(matches!(
            db.delete_friend(&alice, "bob"),
            Err(FriendshipError::NotFriends(name)) if name == "bob"
        ));
        assert!(matches!(
            db.delete_friend(&alice, "ghost"),
            Err(FriendshipError::UserNotFound(_))
        ));
    }

    #[test]
    fn concurrent_crossed_requests_converge_to_one_edge() {
        for _ in 0..20 {
            let db = Arc::new(Database::open_in_memory().unwrap());
            let alice = register(&db, "alice");
            let bob = register(&db, "bob");

            let handles: Vec<_> = [(alice.clone(), "bob"), (bob.clone(), "alice")]
                .into_iter()
                .map(|(caller, target)| {
                    let db = db.clone();
                    thread::spawn(move || db.send_request(&caller, target).unwrap())
                })
                .collect();

            let mut outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            outcomes.sort_by_key(|o| matches!(o, SendOutcome::AddedAsFriend(_)));

            assert!(matches!(outcomes[0], SendOutcome::RequestSent(_)));
            assert!(matches!(outcomes[1], SendOutcome::AddedAsFriend(_)));
            assert_eq!(pending_count(&db), 0);
            assert_eq!(edge_count(&db), 2);
            assert!(friends_both_ways(&db, &alice, &bob));
        }
    }
}
