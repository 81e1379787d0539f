use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use amity_db::SendOutcome;
use amity_types::api::{Outcome, OutcomeResponse, TargetUserRequest};
use amity_types::models::AuthUser;

use crate::auth::{AppState, db_task};
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::validation;

fn reply(status: StatusCode, outcome: Outcome, message: String) -> impl IntoResponse {
    (status, Json(OutcomeResponse { outcome, message }))
}

/// POST /send_request_to/
///
/// Stores a pending request, or befriends immediately when the target has
/// already asked the caller. Repeating a pending request is reported with 200
/// and changes nothing.
pub async fn send_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<TargetUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = validation::target_username(&req).map_err(ApiError::Validation)?;

    let caller = user.clone();
    let outcome = db_task(&state, move |db| Ok(db.send_request(&caller, &target)?)).await?;

    Ok(match outcome {
        SendOutcome::RequestSent(name) => {
            info!("{} sent a friend request to {}", user.username, name);
            reply(
                StatusCode::CREATED,
                Outcome::RequestSent,
                format!("Friend request sent to {}", name),
            )
        }
        SendOutcome::AddedAsFriend(name) => {
            info!("{} and {} are now friends", user.username, name);
            reply(
                StatusCode::CREATED,
                Outcome::AddedAsFriend,
                format!("You added {} as a friend", name),
            )
        }
        SendOutcome::AlreadyRequested(name) => reply(
            StatusCode::OK,
            Outcome::RequestExists,
            format!("A friend request to {} already exists", name),
        ),
    })
}

/// POST /accept_request_from/
pub async fn accept_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<TargetUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sender = validation::target_username(&req).map_err(ApiError::Validation)?;

    let caller = user.clone();
    let name = db_task(&state, move |db| Ok(db.accept_request(&caller, &sender)?)).await?;

    info!("{} accepted the friend request from {}", user.username, name);
    Ok(reply(
        StatusCode::CREATED,
        Outcome::RequestAccepted,
        format!("You added {} as a friend", name),
    ))
}

/// POST /reject_request_from/
pub async fn reject_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<TargetUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sender = validation::target_username(&req).map_err(ApiError::Validation)?;

    let caller = user.clone();
    let name = db_task(&state, move |db| Ok(db.reject_request(&caller, &sender)?)).await?;

    info!("{} rejected the friend request from {}", user.username, name);
    Ok(reply(
        StatusCode::CREATED,
        Outcome::RequestRejected,
        format!("You rejected the friend request from {}", name),
    ))
}

/// POST /delete_friend/
pub async fn delete_friend(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<TargetUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = validation::target_username(&req).map_err(ApiError::Validation)?;

    let caller = user.clone();
    let name = db_task(&state, move |db| Ok(db.delete_friend(&caller, &target)?)).await?;

    info!("{} removed {} from friends", user.username, name);
    Ok(reply(
        StatusCode::CREATED,
        Outcome::FriendRemoved,
        format!("You removed {} from your friends", name),
    ))
}
