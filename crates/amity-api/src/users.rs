use axum::{Extension, Json, extract::State};

use amity_types::api::{GreetingResponse, UserEntry};
use amity_types::models::AuthUser;

use crate::auth::{AppState, db_task};
use crate::error::ApiError;

pub async fn greeting() -> Json<GreetingResponse> {
    Json(GreetingResponse {
        message: "Welcome to the Amity friends API".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// GET /all_users/: every registered username except the caller's.
pub async fn all_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<UserEntry>>, ApiError> {
    let user_id = user.id.to_string();
    let names = db_task(&state, move |db| Ok(db.list_usernames_except(&user_id)?)).await?;

    Ok(Json(
        names
            .into_iter()
            .map(|username| UserEntry { username })
            .collect(),
    ))
}
