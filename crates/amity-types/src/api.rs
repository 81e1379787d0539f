use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Auth --

/// Registration body. Fields are optional at the wire level so that a missing
/// field is reported as a field error instead of a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub username: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Field name -> list of human readable problems with that field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

// -- Directory / profile --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestView {
    pub from_user: String,
    pub to_user: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    pub friends: Vec<UserEntry>,
    pub friend_requests_sent: Vec<FriendRequestView>,
    pub friend_requests_received: Vec<FriendRequestView>,
    /// `None` when the user has no token yet; not an error.
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GreetingResponse {
    pub message: String,
    pub version: String,
}

// -- Friendship workflow --

/// Body shared by every friendship endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TargetUserRequest {
    #[serde(default)]
    pub username: Option<String>,
}

/// Successful result of a friendship endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    RequestSent,
    AddedAsFriend,
    RequestExists,
    RequestAccepted,
    RequestRejected,
    FriendRemoved,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutcomeResponse {
    pub outcome: Outcome,
    pub message: String,
}

/// Failure kinds surfaced by the friendship endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UserNotFound,
    SelfReference,
    AlreadyFriends,
    NoSuchRequest,
    NotFriends,
    Internal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub message: String,
}

/// Body of a 401 response.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}
