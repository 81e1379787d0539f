use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use amity_db::FriendshipError;
use amity_types::api::{DetailResponse, ErrorKind, ErrorResponse, FieldErrors};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input")]
    Validation(FieldErrors),

    #[error("Unable to log in with provided credentials.")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error(transparent)]
    Friendship(#[from] FriendshipError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Status code and wire kind for a workflow failure.
    fn friendship_status(err: &FriendshipError) -> (StatusCode, ErrorKind) {
        match err {
            FriendshipError::UserNotFound(_) => (StatusCode::BAD_REQUEST, ErrorKind::UserNotFound),
            FriendshipError::NoSuchRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::NoSuchRequest),
            FriendshipError::SelfReference => (StatusCode::BAD_REQUEST, ErrorKind::SelfReference),
            FriendshipError::AlreadyFriends(_) => (StatusCode::CONFLICT, ErrorKind::AlreadyFriends),
            FriendshipError::NotFriends(_) => (StatusCode::CONFLICT, ErrorKind::NotFriends),
            FriendshipError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal)
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: ErrorKind::Internal,
            message: "Internal server error".into(),
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(fields) => (StatusCode::BAD_REQUEST, Json(fields)).into_response(),
            ApiError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "non_field_errors": [ApiError::InvalidCredentials.to_string()] })),
            )
                .into_response(),
            ApiError::Unauthorized(detail) => {
                let mut res = (
                    StatusCode::UNAUTHORIZED,
                    Json(DetailResponse {
                        detail: detail.to_string(),
                    }),
                )
                    .into_response();
                res.headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Token"));
                res
            }
            ApiError::Friendship(FriendshipError::Database(e)) => {
                error!("Friendship storage failure: {:#}", e);
                internal_error()
            }
            ApiError::Friendship(err) => {
                let (status, kind) = Self::friendship_status(&err);
                (
                    status,
                    Json(ErrorResponse {
                        error: kind,
                        message: err.to_string(),
                    }),
                )
                    .into_response()
            }
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                internal_error()
            }
        }
    }
}
