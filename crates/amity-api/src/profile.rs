use axum::{Extension, Json, extract::State};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use amity_db::models::FriendRequestRow;
use amity_types::api::{FriendRequestView, ProfileResponse, UserEntry};
use amity_types::models::AuthUser;

use crate::auth::{AppState, db_task};
use crate::error::ApiError;

/// GET /accounts/profile/: the caller's account, friends, pending requests in
/// both directions, and token.
pub async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id = user.id.to_string();

    let (friends, sent, received, token) = db_task(&state, move |db| {
        Ok((
            db.friend_usernames(&user_id)?,
            db.sent_requests(&user_id)?,
            db.received_requests(&user_id)?,
            db.get_token_for_user(&user_id)?,
        ))
    })
    .await?;

    Ok(Json(ProfileResponse {
        username: user.username,
        email: user.email,
        friends: friends
            .into_iter()
            .map(|username| UserEntry { username })
            .collect(),
        friend_requests_sent: sent.into_iter().map(request_view).collect(),
        friend_requests_received: received.into_iter().map(request_view).collect(),
        token,
    }))
}

fn request_view(row: FriendRequestRow) -> FriendRequestView {
    let timestamp = parse_timestamp(&row.created_at).unwrap_or_else(|| {
        warn!("Corrupt created_at '{}' on friend request '{}'", row.created_at, row.id);
        DateTime::default()
    });

    FriendRequestView {
        from_user: row.from_username,
        to_user: row.to_username,
        timestamp,
    }
}

/// Accepts RFC 3339 and SQLite's `datetime('now')` format, which carries no
/// timezone and is UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}
