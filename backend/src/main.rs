//! Writers & Readers Hub backend
//!
//! Per-user story, engagement and activity storage over a pluggable key-value store, with
//! server-held sessions and Tantivy full-text search over published stories.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod fixtures;
mod models;
mod search;
mod session;
mod storage;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat, StorageBackend};
use db::UserDatabase;
use errors::AppError;
use search::StoryIndex;
use session::SessionPool;
use storage::{JsonStorage, KeyValueStore, MemoryStore, SqliteStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<UserDatabase>,
    pub search: Arc<StoryIndex>,
    pub sessions: Arc<Mutex<SessionPool>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Arc<UserDatabase>, search: Arc<StoryIndex>, config: Config) -> Self {
        let sessions = SessionPool::new(config.session_idle_timeout, config.max_sessions);
        Self {
            db,
            search,
            sessions: Arc::new(Mutex::new(sessions)),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    init_logging(&config);

    tracing::info!("Starting Writers & Readers Hub backend");
    tracing::info!("Storage backend: {:?}", config.storage);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (WRH_API_PSK). Authentication is disabled!");
    }

    let backend = open_backend(&config).await?;
    let storage = JsonStorage::new(backend).with_quota(config.storage_quota_bytes);
    let db = Arc::new(UserDatabase::new(storage));

    if config.seed_demo {
        fixtures::seed_demo(&db).await?;
    }

    let registry = db.reconcile_registry().await?;
    tracing::info!("Registry lists {} users", registry.total_users);

    let search = Arc::new(match config.storage {
        StorageBackend::Sqlite => StoryIndex::open(&config.index_path)?,
        StorageBackend::Memory => StoryIndex::in_memory()?,
    });

    tracing::info!("Building search index...");
    let stories = db.all_stories().await?;
    let indexed = search.rebuild(&stories).await?;
    tracing::info!("Search index built with {} of {} stories", indexed, stories.len());

    let bind_addr = config.bind_addr;
    let state = AppState::new(db, search, config);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_backend(config: &Config) -> Result<Arc<dyn KeyValueStore>, AppError> {
    match config.storage {
        StorageBackend::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            Ok(Arc::new(SqliteStore::open(&config.db_path).await?))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Registry
        .route("/registry", get(api::get_registry))
        // Users
        .route("/users", post(api::create_user))
        .route("/users/{id}", delete(api::delete_user))
        .route(
            "/users/{id}/profile",
            get(api::get_profile).put(api::update_profile),
        )
        .route("/users/{id}/export", get(api::export_user))
        .route("/users/{id}/dashboard", get(api::get_dashboard))
        // Stories
        .route(
            "/users/{id}/stories",
            get(api::list_stories).post(api::create_story),
        )
        .route(
            "/users/{id}/stories/{story_id}",
            put(api::update_story).delete(api::delete_story),
        )
        .route(
            "/users/{id}/stories/{story_id}/views",
            post(api::record_view),
        )
        // Engagement
        .route("/users/{id}/bookmarks", get(api::list_bookmarks))
        .route(
            "/users/{id}/bookmarks/{story_id}",
            put(api::add_bookmark).delete(api::remove_bookmark),
        )
        .route("/users/{id}/likes", get(api::list_likes))
        .route("/users/{id}/likes/{story_id}", post(api::toggle_like))
        .route(
            "/users/{id}/comments",
            get(api::list_comments).post(api::create_comment),
        )
        // Social
        .route("/users/{id}/following", get(api::list_following))
        .route(
            "/users/{id}/following/{target_id}",
            put(api::follow).delete(api::unfollow),
        )
        .route("/users/{id}/followers", get(api::list_followers))
        .route(
            "/users/{id}/followers/recount",
            post(api::recount_followers),
        )
        // Activity
        .route(
            "/users/{id}/activity",
            get(api::list_activity).post(api::log_activity),
        )
        // Search
        .route("/search", get(api::search_stories))
        // Sessions
        .route("/sessions/{user_id}", get(api::get_session))
        .route("/sessions/{user_id}/actions", post(api::dispatch_action))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
