pub mod auth;
pub mod error;
pub mod extract;
pub mod friends;
pub mod middleware;
pub mod profile;
pub mod users;
pub mod validation;

use axum::{
    Router,
    routing::{get, post},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Build the full route table. Transport layers (CORS, tracing) are added by
/// the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(users::greeting))
        .route("/register/", post(auth::register))
        .route("/api-token-auth/", post(auth::login));

    let protected_routes = Router::new()
        .route("/accounts/profile/", get(profile::profile))
        .route("/all_users/", get(users::all_users))
        .route("/send_request_to/", post(friends::send_request))
        .route("/accept_request_from/", post(friends::accept_request))
        .route("/reject_request_from/", post(friends::reject_request))
        .route("/delete_friend/", post(friends::delete_friend))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
