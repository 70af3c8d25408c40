//! Balance and transfer DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::dto::IdentityQuery;
use crate::domain::{Balances, TransferRecord};

/// Response body for `GET /balances`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalancesResponse {
    /// User id.
    pub user_id: i64,
    /// Amount per symbol; every symbol is present.
    #[schema(value_type = Object)]
    pub balances: Balances,
}

/// Request body for `POST /balances`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SaveBalancesRequest {
    /// Target user; the session user when absent.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Amount per symbol. Omitted symbols are stored as zero.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub balances: Balances,
}

/// Response body for `POST /balances`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveBalancesResponse {
    /// User id.
    pub user_id: i64,
    /// Always `true`.
    pub saved: bool,
}

/// Request body for `POST /transfer`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TransferBody {
    /// Sender; the session user when absent.
    #[serde(default)]
    pub from_user_id: Option<i64>,
    /// Recipient tag, any case.
    #[serde(default)]
    pub to_tag: String,
    /// Asset symbol, e.g. `"USDT"`.
    #[serde(default)]
    pub symbol: String,
    /// Amount to send.
    #[serde(default)]
    pub amount: f64,
}

/// Query parameters for `GET /transfers`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// User id.
    #[param(value_type = Option<i64>)]
    pub id: Option<String>,
    /// Alias of `id`.
    #[param(value_type = Option<i64>)]
    pub user_id: Option<String>,
    /// Page size, 1..=100. Defaults to 20.
    #[param(value_type = Option<u32>)]
    pub limit: Option<String>,
}

impl HistoryQuery {
    /// The user selection part of the query.
    #[must_use]
    pub fn identity(&self) -> IdentityQuery {
        IdentityQuery {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
        }
    }

    /// The requested page size, if it parses.
    #[must_use]
    pub fn limit(&self) -> Option<u32> {
        self.limit.as_deref().and_then(|raw| raw.trim().parse().ok())
    }
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferDto {
    /// Record id.
    pub id: i64,
    /// Sender.
    pub from_user_id: i64,
    /// Recipient.
    pub to_user_id: i64,
    /// Asset symbol.
    pub symbol: String,
    /// Amount moved.
    pub amount: f64,
    /// When the transfer committed.
    pub date: DateTime<Utc>,
}

impl From<TransferRecord> for TransferDto {
    fn from(record: TransferRecord) -> Self {
        Self {
            id: record.id,
            from_user_id: record.from.get(),
            to_user_id: record.to.get(),
            symbol: record.asset.symbol().to_string(),
            amount: record.amount,
            date: record.created_at,
        }
    }
}

/// Response body for `GET /transfers`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferHistoryResponse {
    /// User id.
    pub user_id: i64,
    /// Newest first.
    pub transfers: Vec<TransferDto>,
}
