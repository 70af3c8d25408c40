//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Explicit user selection on read endpoints (`?id=` or `?user_id=`).
///
/// Values are parsed leniently: anything that is not a positive integer
/// counts as absent and identity falls through to the session.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdentityQuery {
    /// User id.
    #[param(value_type = Option<i64>)]
    pub id: Option<String>,
    /// Alias of `id`, consulted when `id` is absent.
    #[param(value_type = Option<i64>)]
    pub user_id: Option<String>,
}

impl IdentityQuery {
    /// The explicit id, if one was given.
    #[must_use]
    pub fn explicit(&self) -> Option<i64> {
        self.id
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .or(self.user_id.as_deref())
            .and_then(|raw| raw.trim().parse().ok())
    }
}

/// Acknowledgement for writes that return nothing else.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SavedResponse {
    /// Always `true`.
    pub saved: bool,
}

impl SavedResponse {
    /// `{"saved": true}`.
    #[must_use]
    pub const fn ok() -> Self {
        Self { saved: true }
    }
}
