use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use amity_db::models::UserRow;
use amity_types::models::AuthUser;

use crate::auth::{AppState, db_task};
use crate::error::ApiError;

const NOT_PROVIDED: &str = "Authentication credentials were not provided.";
const INVALID_TOKEN: &str = "Invalid token.";

/// Resolve `Authorization: Token <key>` to a user and attach it to the request
/// as an [`AuthUser`] extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = match req.headers().get(header::AUTHORIZATION) {
        None => return Err(ApiError::Unauthorized(NOT_PROVIDED)),
        Some(value) => {
            let value = value.to_str().map_err(|_| ApiError::Unauthorized(INVALID_TOKEN))?;
            parse_token_header(value)?.to_string()
        }
    };

    let row = db_task(&state, move |db| Ok(db.get_user_by_token(&key)?))
        .await?
        .ok_or_else(|| {
            warn!("Rejected request with unknown token");
            ApiError::Unauthorized(INVALID_TOKEN)
        })?;

    req.extensions_mut().insert(auth_user(row)?);
    Ok(next.run(req).await)
}

/// Extract the key from a `Token <key>` header value. Other schemes count as
/// no credentials at all.
fn parse_token_header(value: &str) -> Result<&str, ApiError> {
    let mut parts = value.split_whitespace();
    match parts.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case("token") => {}
        _ => return Err(ApiError::Unauthorized(NOT_PROVIDED)),
    }

    match (parts.next(), parts.next()) {
        (Some(key), None) => Ok(key),
        _ => Err(ApiError::Unauthorized(INVALID_TOKEN)),
    }
}

fn auth_user(row: UserRow) -> Result<AuthUser, ApiError> {
    let id: Uuid = row
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("Corrupt user id '{}': {}", row.id, e))?;

    Ok(AuthUser {
        id,
        username: row.username,
        email: row.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_scheme_case_insensitively() {
        assert_eq!(parse_token_header("Token abc123").unwrap(), "abc123");
        assert_eq!(parse_token_header("token   abc123 ").unwrap(), "abc123");
    }

    #[test]
    fn rejects_malformed_headers() {
        for (value, detail) in [
            ("Bearer abc123", NOT_PROVIDED),
            ("", NOT_PROVIDED),
            ("Token", INVALID_TOKEN),
            ("Token abc 123", INVALID_TOKEN),
        ] {
            match parse_token_header(value) {
                Err(ApiError::Unauthorized(got)) => assert_eq!(got, detail, "header {:?}", value),
                other => panic!("expected Unauthorized for {:?}, got {:?}", value, other),
            }
        }
    }
}
