//! Profile and authentication DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::User;

/// A user profile. `tag` is empty when the user has not chosen one.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    /// User id.
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// Normalized tag, or `""`.
    pub tag: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id.get(),
            name: user.name,
            tag: user.tag.map(|t| t.as_str().to_string()).unwrap_or_default(),
        }
    }
}

/// Request body for `POST /user`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateNameRequest {
    /// Target user; the session user when absent.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// New display name.
    #[serde(default)]
    pub name: String,
}

/// Response body for `POST /user`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateNameResponse {
    /// User id.
    pub user_id: i64,
    /// Stored display name.
    pub name: String,
}

/// Request body for `POST /user/tag`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetTagRequest {
    /// Target user; the session user when absent.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Desired tag, any case.
    #[serde(default)]
    pub tag: String,
}

/// Response body for `POST /user/tag`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagResponse {
    /// The stored, normalized tag.
    pub tag: String,
}

/// Request body for `POST /user/password`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    /// Target user; the session user when absent.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// New password, at least six characters after trimming.
    #[serde(default)]
    pub password: String,
}

/// Request body for `POST /auth/register`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Tag, any case.
    #[serde(default)]
    pub tag: String,
    /// Password, at least six characters after trimming.
    #[serde(default)]
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Tag, any case.
    #[serde(default)]
    pub tag: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}
