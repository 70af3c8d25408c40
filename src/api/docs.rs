//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use crate::api::dto::{
    BalancesResponse, LoginRequest, RatesResponse, RegisterRequest, SaveBalancesRequest,
    SaveBalancesResponse, SavedResponse, SetPasswordRequest, SetTagRequest, TagResponse,
    TransferBody, TransferDto, TransferHistoryResponse, UpdateNameRequest, UpdateNameResponse,
    UserResponse,
};
use crate::api::handlers::{auth, balances, rates, system, transfer, user};
use crate::error::ErrorResponse;

/// Generated OpenAPI specification.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "Blink Wallet API", description = "Rates, profiles, balances and transfers"),
    paths(
        rates::get_rates,
        user::get_user,
        user::update_name,
        user::set_tag,
        user::set_password,
        auth::register,
        auth::login,
        auth::me,
        balances::get_balances,
        balances::save_balances,
        transfer::create_transfer,
        transfer::list_transfers,
        system::health_handler,
    ),
    components(schemas(
        RatesResponse,
        UserResponse,
        UpdateNameRequest,
        UpdateNameResponse,
        SetTagRequest,
        TagResponse,
        SetPasswordRequest,
        SavedResponse,
        RegisterRequest,
        LoginRequest,
        BalancesResponse,
        SaveBalancesRequest,
        SaveBalancesResponse,
        TransferBody,
        TransferDto,
        TransferHistoryResponse,
        system::HealthResponse,
        ErrorResponse,
    )),
    tags(
        (name = "Rates", description = "Price snapshots"),
        (name = "Users", description = "Profiles and credentials"),
        (name = "Auth", description = "Registration and sessions"),
        (name = "Balances", description = "Per-user ledger"),
        (name = "Transfers", description = "Peer-to-peer transfers"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/rates",
            "/user",
            "/user/tag",
            "/user/password",
            "/auth/register",
            "/auth/login",
            "/auth/me",
            "/balances",
            "/transfer",
            "/transfers",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
