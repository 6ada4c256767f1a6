//! # Server Module
//!
//! HTTP server setup and route configuration for the Bookshelf server.

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::get,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{
    credentials::CredentialStore,
    jwt::TokenService,
    middleware::AuthMiddleware,
    revocation::InMemoryRevocationStore,
};
use crate::config::{Config, StorageBackend};
use crate::database::{BookStore, DatabaseConfig, DatabaseConnection, MemoryStore, UserStore};
use crate::routes::{self, health::ping};
use crate::services::BookRepository;

/// Application state shared across all route handlers
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub credentials: Arc<CredentialStore>,
    pub books: Arc<BookRepository>,
}

impl AppState {
    /// Wire the services on top of the given stores
    pub fn new(
        users: Arc<dyn UserStore>,
        books: Arc<dyn BookStore>,
        tokens: TokenService,
    ) -> Result<Self> {
        Ok(Self {
            tokens: Arc::new(tokens),
            credentials: Arc::new(CredentialStore::new(users)?),
            books: Arc::new(BookRepository::new(books)),
        })
    }
}

/// Build the router. Everything except `/ping`, `/register` and `/login` sits
/// behind the auth middleware.
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    let protected_routes = Router::new()
        .merge(routes::books::create_book_routes())
        .merge(routes::auth::create_session_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), AuthMiddleware::validate_token));

    Router::new()
        .route("/ping", get(ping))
        .merge(routes::auth::create_auth_routes())
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ]))
}

/// Open the configured storage. Connection or migration failures abort startup.
async fn open_storage(config: &Config) -> Result<(Arc<dyn UserStore>, Arc<dyn BookStore>)> {
    match &config.database.backend {
        StorageBackend::Postgres { url } => {
            let db = DatabaseConnection::new(DatabaseConfig::new(url.clone(), config.database.max_connections))
                .await
                .context("Failed to connect to database")?;
            db.migrate().await?;

            let db = Arc::new(db);
            let users: Arc<dyn UserStore> = db.clone();
            let books: Arc<dyn BookStore> = db;
            Ok((users, books))
        }
        StorageBackend::Memory => {
            tracing::warn!("⚠️  Using in-memory storage; all data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            let users: Arc<dyn UserStore> = store.clone();
            let books: Arc<dyn BookStore> = store;
            Ok((users, books))
        }
    }
}

/// Starts the Bookshelf HTTP server and serves until the process is terminated.
pub async fn start(config: Config) -> Result<()> {
    let (users, books) = open_storage(&config).await?;

    // Revocations live for the lifetime of the process
    let tokens = TokenService::new(
        &config.auth.jwt_secret,
        config.auth.token_ttl,
        Arc::new(InMemoryRevocationStore::new()),
    );

    let state = AppState::new(users, books, tokens)?;
    let app = create_router(state, cors_layer(&config.server.cors_allowed_origins)?);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(addr.as_str())
        .await
        .with_context(|| format!("Failed to bind to {} - port may already be in use", addr))?;

    tracing::info!("🚀 Bookshelf Server starting...");
    tracing::info!("📡 Listening on http://{}", addr);
    tracing::info!("🏥 Health check available at http://{}/ping", addr);
    tracing::info!("🔑 Token lifetime: {} minutes", config.auth.token_ttl.num_minutes());

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use chrono::Duration;
    use http_body_util::BodyExt; // for .collect().await
    use serde_json::{Value, json};
    use tower::util::ServiceExt; // for `oneshot`

    const SECRET: &str = "test-secret-key-that-is-at-least-32-chars";
    const FORM: &str = "application/x-www-form-urlencoded";

    fn app_with_ttl(ttl: Duration) -> Router {
        let store = Arc::new(MemoryStore::new());
        let tokens = TokenService::new(SECRET, ttl, Arc::new(InMemoryRevocationStore::new()));
        let state = AppState::new(store.clone(), store, tokens).unwrap();
        create_router(state, CorsLayer::new())
    }

    fn test_app() -> Router {
        app_with_ttl(Duration::minutes(15))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        form: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match form {
            Some(form) => {
                builder = builder.header("content-type", FORM);
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };

        let response: Response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register_and_login(app: &Router, username: &str, password: &str) -> String {
        let form = format!("username={}&password={}", username, password);
        let (status, _) = send(app, "POST", "/register", None, Some(&form)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app, "POST", "/login", None, Some(&form)).await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn ping_needs_no_token() {
        let (status, body) = send(&test_app(), "GET", "/ping", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "pong" }));
    }

    #[tokio::test]
    async fn register_validates_and_rejects_duplicates() {
        let app = test_app();

        let (status, body) = send(&app, "POST", "/register", None, Some("username=alice&password=pw")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "User registered successfully" }));

        let (status, body) = send(&app, "POST", "/register", None, Some("username=alice&password=other")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "User already exists" }));

        let (status, body) = send(&app, "POST", "/register", None, Some("username=bob")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Username and password are required" }));

        let (status, _) = send(&app, "POST", "/register", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_failures_share_one_response() {
        let app = test_app();
        send(&app, "POST", "/register", None, Some("username=alice&password=pw")).await;

        let wrong_password = send(&app, "POST", "/login", None, Some("username=alice&password=wrong")).await;
        let unknown_user = send(&app, "POST", "/login", None, Some("username=nobody&password=pw")).await;

        assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.1, json!({ "error": "Invalid credentials" }));
        assert_eq!(wrong_password, unknown_user);

        let (status, _) = send(&app, "POST", "/login", None, Some("username=alice")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_returns_bearer_token() {
        let app = test_app();
        send(&app, "POST", "/register", None, Some("username=alice&password=pw")).await;

        let (status, body) = send(&app, "POST", "/login", None, Some("username=alice&password=pw")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 15 * 60);
        assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let app = test_app();

        for (method, uri) in [
            ("GET", "/books"),
            ("POST", "/books"),
            ("GET", "/books/1"),
            ("PUT", "/books/1"),
            ("PATCH", "/books/1"),
            ("DELETE", "/books/1"),
            ("POST", "/logout"),
        ] {
            let (status, body) = send(&app, method, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
            assert_eq!(body, json!({ "error": "Missing Authorization Header" }));
        }

        let (status, body) = send(&app, "GET", "/books", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Invalid token" }));
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let app = app_with_ttl(Duration::seconds(-30));
        let token = register_and_login(&app, "alice", "pw").await;

        let (status, body) = send(&app, "GET", "/books", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Token has expired" }));
    }

    #[tokio::test]
    async fn book_lifecycle() {
        let app = test_app();
        let token = register_and_login(&app, "alice", "pw").await;

        let (status, body) = send(&app, "GET", "/books", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "No books found" }));

        let (status, body) = send(&app, "POST", "/books", Some(&token), Some("title=Dune")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Title and author are required" }));

        let (status, body) = send(&app, "POST", "/books", Some(&token), Some("title=Dune&author=Herbert")).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["book"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/books/{}", id),
            Some(&token),
            Some("title=Dune+Messiah&author=Frank+Herbert"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], format!("Book {} updated", id));
        assert_eq!(
            body["book"],
            json!({ "id": id, "title": "Dune Messiah", "author": "Frank Herbert", "read": false })
        );

        let (status, body) = send(&app, "PATCH", &format!("/books/{}", id), Some(&token), Some("read=maybe")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid read status" }));

        let (status, body) = send(&app, "PATCH", &format!("/books/{}", id), Some(&token), Some("read=true")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": format!("Book {} status updated", id), "read": true }));

        let (status, body) = send(&app, "GET", "/books", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{ "id": id, "title": "Dune Messiah", "author": "Frank Herbert", "read": true }])
        );

        let (status, body) = send(&app, "PATCH", "/books/9999", Some(&token), Some("read=false")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Book not found" }));

        let (status, _) = send(&app, "GET", "/books/not-a-number", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn users_cannot_touch_each_others_books() {
        let app = test_app();
        let alice = register_and_login(&app, "alice", "pw").await;
        let bob = register_and_login(&app, "bob", "pw").await;

        let (_, body) = send(&app, "POST", "/books", Some(&alice), Some("title=Emma&author=Austen")).await;
        let uri = format!("/books/{}", body["book"]["id"].as_i64().unwrap());

        assert_eq!(send(&app, "GET", "/books", Some(&bob), None).await.0, StatusCode::NOT_FOUND);
        assert_eq!(send(&app, "GET", &uri, Some(&bob), None).await.0, StatusCode::NOT_FOUND);
        assert_eq!(
            send(&app, "PUT", &uri, Some(&bob), Some("title=Mine&author=Bob")).await.0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(send(&app, "PATCH", &uri, Some(&bob), Some("read=true")).await.0, StatusCode::NOT_FOUND);
        assert_eq!(send(&app, "DELETE", &uri, Some(&bob), None).await.0, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "GET", &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Emma");
        assert_eq!(body["author"], "Austen");
        assert_eq!(body["read"], false);
    }

    #[tokio::test]
    async fn end_to_end_session() {
        let app = test_app();

        let (status, _) = send(&app, "POST", "/register", None, Some("username=alice&password=pw")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "POST", "/register", None, Some("username=alice&password=pw")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "POST", "/login", None, Some("username=alice&password=pw")).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap().to_string();
        let (status, _) = send(&app, "POST", "/login", None, Some("username=alice&password=wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, "POST", "/books", Some(&token), Some("title=1984&author=Orwell")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body,
            json!({
                "message": "Book added",
                "book": { "id": 1, "title": "1984", "author": "Orwell", "read": false }
            })
        );

        let (status, body) = send(&app, "GET", "/books/1", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": 1, "title": "1984", "author": "Orwell", "read": false }));

        let (status, body) = send(&app, "DELETE", "/books/1", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Book 1 deleted" }));

        let (status, _) = send(&app, "GET", "/books/1", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "POST", "/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Token revoked" }));

        for (method, uri) in [("GET", "/books"), ("GET", "/books/1"), ("POST", "/logout")] {
            let (status, body) = send(&app, method, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, json!({ "error": "Token has been revoked" }));
        }
    }

    #[tokio::test]
    async fn logout_revokes_only_the_presented_token() {
        let app = test_app();
        let first = register_and_login(&app, "alice", "pw").await;
        let (_, body) = send(&app, "POST", "/login", None, Some("username=alice&password=pw")).await;
        let second = body["access_token"].as_str().unwrap().to_string();

        send(&app, "POST", "/logout", Some(&first), None).await;

        assert_eq!(send(&app, "GET", "/books", Some(&first), None).await.0, StatusCode::UNAUTHORIZED);
        // Still authenticated; the empty list is reported as 404
        assert_eq!(send(&app, "GET", "/books", Some(&second), None).await.0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn cors_rejects_invalid_origins() {
        assert!(cors_layer(&["http://localhost:3001".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
