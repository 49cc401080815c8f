use std::sync::Arc;

use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    routing::{get, post, put},
};
use time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::Key};

pub mod auth;
pub mod categories;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod database;
pub mod domain;
pub mod goals;
pub mod models;
pub mod password_reset;
pub mod profile;
pub mod store;
pub mod transactions;
pub mod utils;

use config::Config;
use constants::{SESSION_EXPIRY_DAYS, SESSION_NAME};
use database::Db;

/// Shared handler state: the users registry and the loaded configuration.
/// Per-user databases are opened on demand under `config.data_path`.
#[derive(Clone)]
pub struct AppState {
    pub main_db: Db,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(main_db: Db, config: Config) -> Self {
        Self {
            main_db,
            config: Arc::new(config),
        }
    }
}

/// All routes with sessions, CORS and request tracing applied.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let key = Key::try_from(state.config.session_secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid session secret: {}", e))?;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_name(SESSION_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_EXPIRY_DAYS)))
        .with_signed(key);

    let cors_layer = CorsLayer::new()
        .allow_origin(state.config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let tracing_layer = TraceLayer::new_for_http().make_span_with(|req: &Request| {
        let method = req.method();
        let uri = req.uri();
        let matched_path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|matched_path| matched_path.as_str());

        tracing::debug_span!("request", %method, %uri, matched_path)
    });

    let router = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route(
            "/user/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/reset-password", post(password_reset::request_reset))
        .route(
            "/reset-password/check/{token}",
            get(password_reset::check_token),
        )
        .route(
            "/reset-password/reset/{token}",
            post(password_reset::reset_password),
        )
        .route(
            "/categories",
            get(categories::get_categories).post(categories::create_category),
        )
        .route(
            "/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route(
            "/transactions",
            get(transactions::get_transactions).post(transactions::create_transaction),
        )
        .route(
            "/transactions/{id}",
            get(transactions::get_transaction)
                .put(transactions::update_transaction)
                .delete(transactions::delete_transaction),
        )
        .route("/goals", get(goals::get_goals).post(goals::create_goal))
        .route(
            "/goals/{id}",
            get(goals::get_goal)
                .put(goals::update_goal)
                .delete(goals::delete_goal),
        )
        .route("/goals/{id}/progress", get(goals::get_goal_progress))
        .route(
            "/goals/{id}/transactions",
            get(goals::get_goal_transactions).post(goals::create_goal_transaction),
        )
        .route(
            "/goals/{id}/transactions/{transaction_id}",
            put(goals::attach_goal_transaction).delete(goals::detach_goal_transaction),
        )
        .route("/dashboard", get(dashboard::get_dashboard))
        .layer(session_layer)
        .layer(cors_layer)
        .layer(tracing_layer)
        .with_state(state);

    Ok(router)
}

async fn health() -> &'static str {
    "ok"
}
