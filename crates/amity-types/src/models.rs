use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The caller resolved from an `Authorization: Token <key>` header.
///
/// Passed explicitly from the auth middleware into every handler and down
/// into the friendship workflow; there is no ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}
