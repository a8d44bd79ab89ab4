mod auth;
mod dao;
mod handlers;
mod interaction;
mod model;
mod routes;
mod utils;

use auth::auth;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{serve, Router};
use dao::SqliteLinkStore;
use dotenvy::dotenv;
use routes::{health, interact, AppState};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use utils::{get_env, get_env_or, parse_max_connections};

const DEFAULT_TRACING_LEVEL: &str = "linkbox=debug";
const DEFAULT_DATABASE_URL: &str = "sqlite://links.db";
const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 8;

#[tokio::main]
async fn main() {
    _ = dotenv();
    let database_url = get_env_or("DATABASE_URL", DEFAULT_DATABASE_URL);
    let server_address = get_env_or("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS);
    let dispatcher_key_hash = get_env("DISPATCHER_KEY_SHA3");
    let max_connections = parse_max_connections(&get_env_or(
        "DATABASE_MAX_CONNECTIONS",
        &DEFAULT_DATABASE_MAX_CONNECTIONS.to_string(),
    ))
    .expect("DATABASE_MAX_CONNECTIONS must be a positive integer");
    configure_tracing();
    let db_connection_pool = create_db_connection_pool(&database_url, max_connections).await;
    let store = SqliteLinkStore::new(db_connection_pool);
    store.migrate().await.expect("Running database migrations failed");
    let listener = create_listener(&server_address).await;
    let router = create_router(AppState {
        store: Arc::new(store),
        dispatcher_key_hash: dispatcher_key_hash.into(),
    });
    serve(listener, router)
        .await
        .expect("Server failed to start");
}

fn configure_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or(DEFAULT_TRACING_LEVEL.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn create_db_connection_pool(database_url: &str, max_connections: u32) -> Pool<Sqlite> {
    let connect_options = SqliteConnectOptions::from_str(database_url)
        .expect("Invalid DATABASE_URL")
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_options)
        .await
        .expect("Creating database connection pool failed")
}

async fn create_listener(server_address: &str) -> TcpListener {
    let listener = TcpListener::bind(&server_address)
        .await
        .expect("Creating tcp listener failed");
    tracing::info!("Listening on address: {}", server_address);
    listener
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/interactions",
            post(interact).route_layer(from_fn_with_state(state.clone(), auth)),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_key, API_KEY_HEADER};
    use crate::dao::{LinkStore, StoreError};
    use crate::model::{Link, NewLink};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const KEY: &str = "dispatcher-secret";

    async fn test_router() -> Router {
        create_router(AppState {
            store: Arc::new(dao::memory_store().await),
            dispatcher_key_hash: hash_key(KEY.as_bytes()).into(),
        })
    }

    struct PanickingStore;

    #[async_trait]
    impl LinkStore for PanickingStore {
        async fn create(&self, _: &NewLink) -> Result<i64, StoreError> {
            panic!("store blew up")
        }

        async fn list(&self, _: Option<&str>, _: u32) -> Result<Vec<Link>, StoreError> {
            panic!("store blew up")
        }

        async fn get(&self, _: i64) -> Result<Option<Link>, StoreError> {
            panic!("store blew up")
        }

        async fn delete(&self, _: i64) -> Result<Option<Link>, StoreError> {
            panic!("store blew up")
        }
    }

    fn invocation(body: Value) -> Request<Body> {
        Request::post("/interactions")
            .header("content-type", "application/json")
            .header(API_KEY_HEADER, KEY)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn health_is_ok() {
        let router = test_router().await;
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn interactions_require_dispatcher_key() {
        let router = test_router().await;
        let request = Request::post("/interactions")
            .header("content-type", "application/json")
            .header(API_KEY_HEADER, "wrong")
            .body(Body::from(json!({"caller": {"id": 1, "name": "a"}, "command": {"name": "list"}}).to_string()))
            .unwrap();

        let (status, _) = send(&router, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn save_then_get_then_remove() {
        let router = test_router().await;

        let (status, saved) = send(
            &router,
            invocation(json!({
                "caller": {"id": 7, "name": "alice"},
                "command": {"name": "save", "url": "https://docs.rs", "title": "Docs", "tags": "Rust, Docs"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(saved["kind"], "saved");
        assert_eq!(saved["ephemeral"], false);
        assert_eq!(saved["label"], "Docs");
        assert_eq!(saved["tags"], "rust,docs");
        assert!(saved["interactionId"].is_string());
        let id = saved["id"].as_i64().unwrap();

        let (status, detail) = send(
            &router,
            invocation(json!({"caller": {"id": 8, "name": "bob"}, "command": {"name": "get", "id": id}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["addedByName"], "alice");
        assert_eq!(detail["url"], "https://docs.rs");

        let (status, denied) = send(
            &router,
            invocation(json!({"caller": {"id": 8, "name": "bob"}, "command": {"name": "remove", "id": id}})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(denied["reason"], "permissionDenied");
        assert_eq!(denied["ephemeral"], true);

        let (status, removed) = send(
            &router,
            invocation(json!({
                "caller": {"id": 9, "name": "mod", "capability": "moderator"},
                "command": {"name": "remove", "id": id}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(removed["label"], "Docs");
        assert_eq!(removed["ephemeral"], false);

        let (status, missing) = send(
            &router,
            invocation(json!({"caller": {"id": 7, "name": "alice"}, "command": {"name": "get", "id": id}})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(missing["reason"], "notFound");
    }

    #[tokio::test]
    async fn invalid_url_is_a_public_bad_request() {
        let router = test_router().await;

        let (status, body) = send(
            &router,
            invocation(json!({"caller": {"id": 1, "name": "a"}, "command": {"name": "save", "url": "hello"}})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "invalidUrl");
        assert_eq!(body["ephemeral"], false);
    }

    #[tokio::test]
    async fn empty_list_is_no_results() {
        let router = test_router().await;

        let (status, body) = send(
            &router,
            invocation(json!({"caller": {"id": 1, "name": "a"}, "command": {"name": "list"}})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["reason"], "noResults");
    }

    #[tokio::test]
    async fn crashed_handler_fails_only_its_own_request() {
        let router = create_router(AppState {
            store: Arc::new(PanickingStore),
            dispatcher_key_hash: hash_key(KEY.as_bytes()).into(),
        });

        let (status, _) = send(
            &router,
            invocation(json!({"caller": {"id": 1, "name": "a"}, "command": {"name": "get", "id": 1}})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let response = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, _) = send(
            &router,
            invocation(json!({"caller": {"id": 1, "name": "a"}, "command": {"name": "save", "url": "bad"}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
