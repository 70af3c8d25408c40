//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Endpoints are mounted at the root, where the mini-app front end expects
//! them.

pub mod docs;
pub mod dto;
pub mod handlers;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .merge(handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
        )
    };

    router
}

/// CORS for the front-end origins: credentialed, `GET`/`POST`/`OPTIONS`,
/// `content-type` only. Origins that are not valid header values are
/// skipped with a warning.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// The router with request tracing and CORS applied, bound to `state`.
pub fn build_app(state: AppState, cors_origins: &[String]) -> Router {
    build_router()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::PersistenceMode;
    use crate::domain::{AssetMap, RateSnapshot};
    use crate::persistence::memory::MemoryPersistence;
    use crate::persistence::rate_file::RateFile;
    use crate::persistence::{Persistence, RateRepository};
    use crate::service::{PasswordHasher, RateStore, WalletServices};

    struct Harness {
        app: Router,
        store: MemoryPersistence,
        file: RateFile,
        _dir: tempfile::TempDir,
    }

    fn harness(mode: PersistenceMode) -> Harness {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let file = RateFile::new(dir.path().join("rates.json"));
        let store = MemoryPersistence::new();
        let shared: Option<Arc<dyn Persistence>> = match mode {
            PersistenceMode::Disabled => None,
            _ => Some(Arc::new(store.clone())),
        };
        let state = AppState {
            rates: Arc::new(RateStore::new(shared.clone(), file.clone())),
            wallet: shared
                .map(|db| Arc::new(WalletServices::new(db, PasswordHasher::new(4), "Alex"))),
            persistence: mode,
        };
        let origins = vec!["http://localhost:5500".to_string()];
        Harness {
            app: build_app(state, &origins),
            store,
            file,
            _dir: dir,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let Ok(response) = app.clone().oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let Ok(collected) = response.into_body().collect().await else {
            panic!("body failed");
        };
        let bytes = collected.to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, cookie, body)
    }

    fn get(uri: &str) -> Request<Body> {
        let Ok(request) = Request::get(uri).body(Body::empty()) else {
            panic!("request");
        };
        request
    }

    fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
        let Ok(request) = Request::get(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
        else {
            panic!("request");
        };
        request
    }

    fn post(uri: &str, body: &Value) -> Request<Body> {
        let Ok(request) = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
        else {
            panic!("request");
        };
        request
    }

    fn cookie_pair(set_cookie: &str) -> String {
        set_cookie
            .split(';')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let h = harness(PersistenceMode::Memory);
        let (status, _, body) = send(&h.app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["persistence"], "memory");
    }

    #[tokio::test]
    async fn register_sets_cookie_and_duplicate_tag_conflicts() {
        let h = harness(PersistenceMode::Memory);
        let (status, cookie, body) = send(
            &h.app,
            post(
                "/auth/register",
                &json!({"name": "Alice", "tag": "alice1", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tag"], "alice1");
        let Some(cookie) = cookie else {
            panic!("Set-Cookie expected");
        };
        assert!(cookie.starts_with("bw_session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=2592000"));

        let (status, _, body) =
            send(&h.app, get_with_cookie("/auth/me", &cookie_pair(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Alice");

        let (status, _, body) = send(
            &h.app,
            post(
                "/auth/register",
                &json!({"name": "Other", "tag": "ALICE1", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "tag already taken");
    }

    #[tokio::test]
    async fn login_then_session_identifies_caller() {
        let h = harness(PersistenceMode::Memory);
        let _ = send(
            &h.app,
            post(
                "/auth/register",
                &json!({"name": "Bob", "tag": "bob", "password": "hunter22"}),
            ),
        )
        .await;

        let (status, _, body) = send(
            &h.app,
            post("/auth/login", &json!({"tag": "bob", "password": "nope-nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid credentials");

        let (status, cookie, body) = send(
            &h.app,
            post("/auth/login", &json!({"tag": "BOB", "password": "hunter22"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let user_id = body["user_id"].clone();
        let Some(cookie) = cookie else {
            panic!("Set-Cookie expected");
        };

        let (status, _, body) =
            send(&h.app, get_with_cookie("/balances", &cookie_pair(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], user_id);
    }

    #[tokio::test]
    async fn me_without_cookie_is_unauthorized() {
        let h = harness(PersistenceMode::Memory);
        let (status, _, body) = send(&h.app, get("/auth/me")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "not authenticated");
    }

    #[tokio::test]
    async fn transfer_moves_balance_and_records_history() {
        let h = harness(PersistenceMode::Memory);
        let (_, _, sender) = send(
            &h.app,
            post(
                "/auth/register",
                &json!({"name": "Alice", "tag": "alice", "password": "secret1"}),
            ),
        )
        .await;
        let (_, _, recipient) = send(
            &h.app,
            post(
                "/auth/register",
                &json!({"name": "Bob", "tag": "bob", "password": "secret1"}),
            ),
        )
        .await;
        let sender_id = sender["user_id"].as_i64().unwrap_or_default();
        let recipient_id = recipient["user_id"].as_i64().unwrap_or_default();

        let (status, _, _) = send(
            &h.app,
            post(
                "/balances",
                &json!({"user_id": sender_id, "balances": {"USDT": 100.0}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) = send(
            &h.app,
            post(
                "/transfer",
                &json!({
                    "from_user_id": sender_id,
                    "to_tag": "Bob",
                    "symbol": "USDT",
                    "amount": 40
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], true);

        let (_, _, body) = send(&h.app, get(&format!("/balances?id={sender_id}"))).await;
        assert_eq!(body["balances"]["USDT"], 60.0);
        assert_eq!(body["balances"]["BTC"], 0.0);
        let (_, _, body) =
            send(&h.app, get(&format!("/balances?user_id={recipient_id}"))).await;
        assert_eq!(body["balances"]["USDT"], 40.0);

        let (status, _, body) =
            send(&h.app, get(&format!("/transfers?id={recipient_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        let Some(transfers) = body["transfers"].as_array() else {
            panic!("transfers array expected");
        };
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0]["symbol"], "USDT");
        assert_eq!(transfers[0]["from_user_id"], sender_id);
    }

    #[tokio::test]
    async fn transfer_errors_map_to_statuses() {
        let h = harness(PersistenceMode::Memory);
        let _ = send(
            &h.app,
            post(
                "/auth/register",
                &json!({"name": "Alice", "tag": "alice", "password": "secret1"}),
            ),
        )
        .await;

        let (_, _, bob) = send(
            &h.app,
            post(
                "/auth/register",
                &json!({"name": "Bob", "tag": "bob", "password": "secret1"}),
            ),
        )
        .await;
        let bob_id = bob["user_id"].as_i64().unwrap_or_default();
        let (status, _, _) = send(
            &h.app,
            post("/balances", &json!({"user_id": bob_id, "balances": {"USDT": 5.0}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let cases = [
            (
                json!({"from_user_id": 1, "to_tag": "ghost", "symbol": "USDT", "amount": 1}),
                StatusCode::NOT_FOUND,
                "recipient not found",
            ),
            (
                json!({"from_user_id": 1, "to_tag": "alice", "symbol": "DOGE", "amount": 1}),
                StatusCode::BAD_REQUEST,
                "unsupported currency",
            ),
            (
                json!({"from_user_id": 1, "to_tag": "alice", "symbol": "USDT", "amount": 0}),
                StatusCode::BAD_REQUEST,
                "invalid amount",
            ),
            (
                json!({"from_user_id": 1, "to_tag": "alice", "symbol": "USDT", "amount": 1}),
                StatusCode::BAD_REQUEST,
                "invalid recipient",
            ),
            (
                json!({"to_tag": "alice", "symbol": "USDT", "amount": 1}),
                StatusCode::BAD_REQUEST,
                "invalid user",
            ),
            (
                json!({"from_user_id": bob_id, "to_tag": "alice", "symbol": "USDT", "amount": 6}),
                StatusCode::BAD_REQUEST,
                "insufficient balance",
            ),
            (
                json!({"from_user_id": 42, "to_tag": "alice", "symbol": "USDT", "amount": 1}),
                StatusCode::NOT_FOUND,
                "balance not found",
            ),
        ];
        for (body, expected_status, expected_error) in cases {
            let (status, _, response) = send(&h.app, post("/transfer", &body)).await;
            assert_eq!(status, expected_status, "{body}");
            assert_eq!(response["error"], expected_error, "{body}");
        }
    }

    #[tokio::test]
    async fn malformed_json_is_bad_json() {
        let h = harness(PersistenceMode::Memory);
        let Ok(request) = Request::post("/transfer")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
        else {
            panic!("request");
        };
        let (status, _, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad json");
    }

    #[tokio::test]
    async fn profile_is_created_lazily_and_renamed() {
        let h = harness(PersistenceMode::Memory);
        let (status, _, body) = send(&h.app, get("/user?id=7")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"user_id": 7, "name": "Alex", "tag": ""}));

        let (status, _, body) =
            send(&h.app, post("/user", &json!({"user_id": 7, "name": " Zed "}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"user_id": 7, "name": "Zed"}));

        let (status, _, body) = send(&h.app, post("/user", &json!({"user_id": 7}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "name required");

        let (_, _, body) = send(&h.app, get("/user")).await;
        assert_eq!(body["user_id"], 1);
    }

    #[tokio::test]
    async fn tag_and_password_endpoints() {
        let h = harness(PersistenceMode::Memory);
        let _ = send(&h.app, get("/user?id=3")).await;
        let (status, _, body) =
            send(&h.app, post("/user/tag", &json!({"user_id": 3, "tag": " Zed.3 "}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tag"], "zed.3");

        let (status, _, body) = send(
            &h.app,
            post("/user/password", &json!({"user_id": 3, "password": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "password too short");

        let (status, _, body) = send(
            &h.app,
            post("/user/password", &json!({"user_id": 3, "password": "long-enough"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], true);

        let (status, _, _) = send(
            &h.app,
            post("/auth/login", &json!({"tag": "zed.3", "password": "long-enough"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn negative_balance_is_rejected() {
        let h = harness(PersistenceMode::Memory);
        let (status, _, body) = send(
            &h.app,
            post("/balances", &json!({"user_id": 2, "balances": {"ETH": -1.0}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid balances");
    }

    #[tokio::test]
    async fn rates_fall_back_to_file_when_database_is_down() {
        let h = harness(PersistenceMode::Memory);
        let prices = AssetMap::from_fn(|a| a.fixed_price().unwrap_or(123.0));
        let _ = h.file.write(&prices).await;
        h.store.set_available(false);

        let (status, _, body) = send(&h.app, get("/rates")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current"], body["daily"]);
        assert_eq!(body["roi"], json!({}));
        assert_eq!(body["current"]["BLINK"], 100.0);
    }

    #[tokio::test]
    async fn rates_from_database_include_roi() {
        let h = harness(PersistenceMode::Memory);
        let now = chrono::Utc::now();
        for (hours, btc) in [(26, 100.0), (0, 150.0)] {
            let _ = h
                .store
                .insert_rates(&RateSnapshot {
                    taken_at: now - chrono::Duration::hours(hours),
                    prices: AssetMap::from_fn(|a| a.fixed_price().unwrap_or(btc)),
                })
                .await;
        }
        let (status, _, body) = send(&h.app, get("/rates")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["roi"]["BTC"], 50.0);
        assert_eq!(body["daily"]["BTC"], 100.0);
    }

    #[tokio::test]
    async fn unreachable_store_is_503() {
        let h = harness(PersistenceMode::Memory);
        h.store.set_available(false);
        for request in [
            get("/balances?id=1"),
            get("/user?id=1"),
            post("/balances", &json!({"user_id": 1, "balances": {"USDT": 1.0}})),
        ] {
            let (status, _, body) = send(&h.app, request).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body["error"], "db unavailable");
        }

        h.store.set_available(true);
        let (status, _, _) = send(&h.app, get("/balances?id=1")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn no_rates_anywhere_is_503() {
        let h = harness(PersistenceMode::Memory);
        let (status, _, body) = send(&h.app, get("/rates")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "no rates");
    }

    #[tokio::test]
    async fn disabled_persistence_is_503_except_rates() {
        let h = harness(PersistenceMode::Disabled);
        for request in [
            get("/user"),
            get("/balances"),
            get("/transfers"),
            get("/auth/me"),
            post("/transfer", &json!({})),
            post("/auth/register", &json!({})),
        ] {
            let (status, _, body) = send(&h.app, request).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body["error"], "db disabled");
        }

        let _ = h.file.write(&AssetMap::from_fn(|_| 2.0)).await;
        let (status, _, _) = send(&h.app, get("/rates")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origin_with_credentials() {
        let h = harness(PersistenceMode::Memory);
        let Ok(request) = Request::builder()
            .method(Method::OPTIONS)
            .uri("/transfer")
            .header(header::ORIGIN, "http://localhost:5500")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
        else {
            panic!("request");
        };
        let Ok(response) = h.app.clone().oneshot(request).await else {
            panic!("router failed");
        };
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:5500"))
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            Some(&HeaderValue::from_static("true"))
        );
    }
}
