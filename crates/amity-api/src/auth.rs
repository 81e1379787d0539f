use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rand::RngCore;
use tracing::{error, info, warn};
use uuid::Uuid;

use amity_db::models::NewUser;
use amity_db::{Database, RegisterOutcome};
use amity_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::validation;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
}

impl AppStateInner {
    pub fn new(db: Database) -> AppState {
        Arc::new(Self { db })
    }
}

/// Length in bytes of an identity token before hex encoding.
const TOKEN_BYTES: usize = 20;

const SALT_BYTES: usize = 16;

/// Run blocking work (password hashing, SQLite) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed"))
    })?
}

pub(crate) async fn db_task<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    blocking(move || f(&state.db)).await
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = validation::validate_registration(&req).map_err(ApiError::Validation)?;

    let password = fields.password;
    let password_hash = blocking(move || Ok(hash_password(&password)?)).await?;

    let new_user = NewUser {
        id: Uuid::new_v4().to_string(),
        username: fields.username,
        email: fields.email,
        password_hash,
        token: generate_token(),
    };
    let token = new_user.token.clone();

    match db_task(&state, move |db| Ok(db.register_user(&new_user)?)).await? {
        RegisterOutcome::Created(user) => {
            info!("Registered user {}", user.username);
            Ok((
                StatusCode::CREATED,
                Json(RegisterResponse {
                    username: user.username,
                    email: user.email,
                    token,
                }),
            ))
        }
        RegisterOutcome::Conflict {
            username_taken,
            email_taken,
        } => Err(ApiError::Validation(validation::uniqueness_errors(
            username_taken,
            email_taken,
        ))),
    }
}

/// Exchange username and password for the user's token. The token is the one
/// issued at registration; a new one is minted only if it was removed.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (username, password) = validation::login_fields(&req).map_err(ApiError::Validation)?;

    let lookup = username.clone();
    let Some(user) = db_task(&state, move |db| Ok(db.get_user_by_username(&lookup)?)).await? else {
        warn!("Login for unknown user {}", username);
        return Err(ApiError::InvalidCredentials);
    };

    let stored_hash = user.password.clone();
    let verified = blocking(move || Ok(verify_password(&password, &stored_hash))).await?;
    if !verified {
        warn!("Wrong password for {}", username);
        return Err(ApiError::InvalidCredentials);
    }

    let candidate = generate_token();
    let user_id = user.id;
    let token = db_task(&state, move |db| Ok(db.ensure_token(&user_id, &candidate)?)).await?;

    Ok(Json(LoginResponse { token }))
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let mut salt_bytes = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| anyhow::anyhow!("Salt encoding failed: {}", e))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Corrupt password hash: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// New random identity token: 40 lowercase hex characters.
pub fn generate_token() -> String {
    let mut key = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut key);
    hex::encode(key)
}
