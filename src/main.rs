//! EMS Roster Backend
//!
//! Roster REST backend with SQLite persistence and optional sync to a GitHub
//! repository used as a JSON document store.

mod api;
mod auth;
mod callsign;
mod config;
mod db;
mod errors;
mod models;
mod password;
mod remote;
mod sync;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::SessionStore;
use config::Config;
use db::RecordStore;
use sync::SyncSession;

/// Request bodies carry base64 photos of up to 5 MB.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub sync: Arc<SyncSession>,
    pub sessions: Arc<SessionStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EMS Roster Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let store = Arc::new(RecordStore::new(pool));
    store.init_defaults().await?;

    // Resume remote sync if it was enabled before
    let sync = Arc::new(SyncSession::new(
        config.github_api.clone(),
        config.sync_interval,
    ));
    sync.restore(&store).await?;
    if sync.is_enabled().await {
        tracing::info!("Remote sync restored");
    }

    // Create application state
    let state = AppState {
        store,
        sync,
        sessions: Arc::new(SessionStore::new(config.session_ttl)),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Session check for admin routes
    let sessions = state.sessions.clone();
    let require_session = middleware::from_fn(move |req, next| {
        auth::session_auth_layer(sessions.clone(), req, next)
    });

    let admin_routes = Router::new()
        .route("/auth/logout", post(api::logout))
        .route("/callsigns", get(api::get_callsigns))
        .route("/admin/credentials", put(api::update_credentials))
        // Sync
        .route("/sync/status", get(api::get_sync_status))
        .route(
            "/sync/config",
            put(api::configure_sync).delete(api::disable_sync),
        )
        .route("/sync/pull", post(api::pull))
        .route("/sync/push", post(api::push))
        .route("/sync/test", post(api::test_sync))
        .route_layer(require_session.clone());

    // Reads are public, writes need a session
    let api_routes = Router::new()
        .route("/roster", get(api::get_roster))
        .route("/departments", get(api::list_departments))
        .route("/auth/login", post(api::login))
        .route(
            "/members",
            get(api::list_members).merge(post(api::create_member).layer(require_session.clone())),
        )
        .route(
            "/members/{id}",
            get(api::get_member).merge(
                put(api::update_member)
                    .delete(api::delete_member)
                    .layer(require_session),
            ),
        )
        .merge(admin_routes);

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
